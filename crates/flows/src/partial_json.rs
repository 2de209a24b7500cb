//! Best-effort parsing of truncated JSON.
//!
//! Streaming structured output arrives as a growing JSON prefix. To show
//! progress, the prefix is closed off at the last point where it can be
//! made valid: open strings in value position are terminated, dangling
//! keys, colons and commas are dropped, and every open array and object
//! is closed.

use serde_json::Value;

#[derive(Debug, Clone, Copy)]
enum Frame {
    Object { expect_key: bool },
    Array,
}

/// A prefix length that becomes valid JSON once `stack` is closed.
#[derive(Debug, Clone)]
struct Checkpoint {
    end: usize,
    stack: Vec<Frame>,
}

/// Parse a possibly truncated JSON document.
///
/// Returns `None` when no object or array has started yet.
pub fn repair_partial_json(input: &str) -> Option<Value> {
    let text = strip_fence(input);
    let start = text.find(['{', '['])?;
    let text = &text[start..];

    let mut stack: Vec<Frame> = Vec::new();
    let mut checkpoint: Option<Checkpoint> = None;
    let mut in_string = false;
    let mut string_is_key = false;
    let mut string_start = 0;
    let mut escaped = false;
    let mut scalar_start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                if !string_is_key {
                    checkpoint = Some(Checkpoint {
                        end: i + 1,
                        stack: stack.clone(),
                    });
                }
            }
            continue;
        }

        let is_scalar_char = !matches!(c, '{' | '}' | '[' | ']' | '"' | ':' | ',') && !c.is_whitespace();
        if is_scalar_char {
            scalar_start.get_or_insert(i);
            continue;
        }
        if let Some(s) = scalar_start.take()
            && serde_json::from_str::<Value>(&text[s..i]).is_ok()
        {
            checkpoint = Some(Checkpoint {
                end: i,
                stack: stack.clone(),
            });
        }

        match c {
            '{' | '[' => {
                stack.push(if c == '{' {
                    Frame::Object { expect_key: true }
                } else {
                    Frame::Array
                });
                checkpoint = Some(Checkpoint {
                    end: i + 1,
                    stack: stack.clone(),
                });
            }
            '}' | ']' => {
                stack.pop();
                if stack.is_empty() {
                    return serde_json::from_str(&text[..=i]).ok();
                }
                checkpoint = Some(Checkpoint {
                    end: i + 1,
                    stack: stack.clone(),
                });
            }
            '"' => {
                in_string = true;
                string_start = i;
                string_is_key = matches!(stack.last(), Some(Frame::Object { expect_key: true }));
            }
            ':' => {
                if let Some(Frame::Object { expect_key }) = stack.last_mut() {
                    *expect_key = false;
                }
            }
            ',' => {
                if let Some(Frame::Object { expect_key }) = stack.last_mut() {
                    *expect_key = true;
                }
            }
            _ => {}
        }
    }

    // Prefer keeping the partially streamed tail when it can be completed.
    if in_string && !string_is_key {
        let body = trim_incomplete_escape(&text[string_start + 1..]);
        let candidate = format!(
            "{}{}\"{}",
            &text[..=string_start],
            body,
            closers(&stack)
        );
        if let Ok(value) = serde_json::from_str(&candidate) {
            return Some(value);
        }
    }
    if let Some(s) = scalar_start
        && serde_json::from_str::<Value>(&text[s..]).is_ok()
    {
        let candidate = format!("{}{}", text, closers(&stack));
        if let Ok(value) = serde_json::from_str(&candidate) {
            return Some(value);
        }
    }

    let checkpoint = checkpoint?;
    let candidate = format!("{}{}", &text[..checkpoint.end], closers(&checkpoint.stack));
    serde_json::from_str(&candidate).ok()
}

fn closers(stack: &[Frame]) -> String {
    stack
        .iter()
        .rev()
        .map(|f| match f {
            Frame::Object { .. } => '}',
            Frame::Array => ']',
        })
        .collect()
}

/// Drop a trailing backslash or an unfinished `\uXXXX` escape.
fn trim_incomplete_escape(body: &str) -> &str {
    let Some(pos) = body.rfind('\\') else {
        return body;
    };
    let preceding = body[..pos].chars().rev().take_while(|c| *c == '\\').count();
    if preceding % 2 == 1 {
        // The backslash itself is escaped.
        return body;
    }
    let tail = &body[pos + 1..];
    match tail.chars().next() {
        None => &body[..pos],
        Some('u') if tail.len() < 5 => &body[..pos],
        _ => body,
    }
}

fn strip_fence(input: &str) -> &str {
    let trimmed = input.trim_start();
    match trimmed.strip_prefix("```") {
        Some(rest) => rest.split_once('\n').map_or("", |(_, body)| body),
        None => trimmed,
    }
}
