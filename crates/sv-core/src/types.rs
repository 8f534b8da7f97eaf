use serde::{Deserialize, Serialize};
use std::fmt;

/// What an embedding will be used for. Retrieval models embed stored
/// documents and search queries asymmetrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedPurpose {
    /// Text that will be stored and searched over.
    Document,
    /// Text used to search the stored documents.
    Query,
}

impl fmt::Display for EmbedPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "retrieval_document"),
            Self::Query => write!(f, "retrieval_query"),
        }
    }
}
