//! The five-field record carried by every data line, and its tokenizer.

mod stage;
mod tokenizer;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use stage::TokenizeStage;
pub use tokenizer::{LineTokenizer, FIELD_COUNT};

/// One parsed data row.
///
/// The wire form is a JSON object keyed `id`, `title`, `description`,
/// `completed` and `userId`, which is what the downstream consumer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    #[serde(rename = "userId")]
    pub owner_id: String,
}

impl Record {
    /// Serialize to the message body published on the channel.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}
