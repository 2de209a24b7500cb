//! Storage for Flowdeck flows: chat session history and a local vector index.

pub mod history;
pub mod local_vec;
pub mod vector;

pub use history::{HistoryStore, InMemoryHistory};
pub use local_vec::LocalVectorStore;
pub use vector::{VectorEntry, cosine_similarity, rank_by_similarity};
