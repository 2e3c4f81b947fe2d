use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::AppError;

/// Text of a single page, as produced by the PDF extractor.
///
/// `page` is 0-based, matching the page numbering the extractor reports in chunk metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// An uploaded document after text extraction. Lives only while the index is being built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub pages: Vec<PageText>,
}

impl Document {
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pages: vec![PageText {
                page: 0,
                text: text.into(),
            }],
        }
    }
}

/// A bounded window of document text plus its provenance.
///
/// Notes:
/// - `ordinal` is the reading order within `source` across all of its pages.
/// - `start_index` is the character (not byte) offset of `text` within its page.
/// - `chunk_id` is content-derived, so rebuilding from identical input yields identical ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source: String,
    pub page: u32,
    pub ordinal: u32,
    pub start_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub at: String, // RFC3339
}

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("CLOCK_FORMAT_FAILED", "Failed to format time").with_details(e.to_string())
    })
}
