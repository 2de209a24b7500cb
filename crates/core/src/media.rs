//! `data:` URI handling for inline images.
//!
//! Image flows receive selfies as `data:<mime>;base64,<payload>` strings and
//! return generated images in the same form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::FlowError;

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DataUri {
    /// Parse a base64 `data:` URI.
    pub fn parse(uri: &str) -> Result<Self, FlowError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| FlowError::InvalidDataUri("missing 'data:' prefix".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| FlowError::InvalidDataUri("missing ',' separator".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| FlowError::InvalidDataUri("only base64 payloads are supported".into()))?;
        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(FlowError::InvalidDataUri(format!(
                "invalid mime type '{mime_type}'"
            )));
        }
        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| FlowError::InvalidDataUri(e.to_string()))?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data,
        })
    }

    /// Split a `data:` URI into its mime type and the still-encoded payload,
    /// without decoding.
    pub fn split(uri: &str) -> Option<(&str, &str)> {
        let rest = uri.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        Some((mime, payload))
    }

    /// Build a `data:` URI from a mime type and an already base64-encoded payload.
    pub fn from_base64(mime_type: &str, payload: &str) -> String {
        format!("data:{mime_type};base64,{payload}")
    }

    /// Encode this value back into URI form.
    pub fn to_uri(&self) -> String {
        Self::from_base64(&self.mime_type, &STANDARD.encode(&self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_png_uri() {
        let uri = DataUri::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(uri.mime_type, "image/png");
        assert_eq!(uri.data, b"hello");
        assert_eq!(uri.to_uri(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn rejects_plain_urls() {
        assert!(DataUri::parse("https://example.com/cat.png").is_err());
    }

    #[test]
    fn rejects_non_base64_uris() {
        assert!(DataUri::parse("data:text/plain,hello").is_err());
        assert!(DataUri::parse("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn split_without_decoding() {
        let (mime, payload) = DataUri::split("data:image/jpeg;base64,AAAA").unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(payload, "AAAA");
        assert!(DataUri::split("https://x").is_none());
    }
}
