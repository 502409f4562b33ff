//! Raw pipeline input parsing.
//!
//! Input arrives as newline-delimited records: an image URL, a product
//! name, then any number of tags, comma-separated.

use serde::{Deserialize, Serialize};

/// One parsed input record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub url: String,
    pub name: String,
    pub tags: Vec<String>,
}

/// Parse newline-delimited `url,name,tags...` records.
///
/// Blank lines are skipped and fields are trimmed; empty trailing tags
/// are dropped. Missing fields parse to empty strings — the worker
/// scripts own content validation.
pub fn parse_records(csv_data: &str) -> Vec<InputRecord> {
    csv_data
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let url = fields.next().unwrap_or_default().to_string();
            let name = fields.next().unwrap_or_default().to_string();
            let tags = fields
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect();
            InputRecord { url, name, tags }
        })
        .collect()
}
