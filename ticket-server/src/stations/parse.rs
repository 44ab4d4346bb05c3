//! Parsing of the `station_name.js` script.
//!
//! The script is a single assignment:
//!
//! ```text
//! var station_names ='@bjb|北京北|VAP|beijingbei|bjb|0|0357|北京|||@bjd|北京东|BOP|…';
//! ```
//!
//! Items are separated by `@` and fields by `|`: abbreviation, name,
//! telecode, full pinyin, short pinyin, index, and (in newer scripts) the
//! city the station belongs to.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::StationCode;

use super::error::StationError;

const ASSIGNMENT: &str = "station_names";

/// One station from the station script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationEntry {
    pub name: String,
    pub code: StationCode,
    pub pinyin: String,
    pub abbr: String,
    pub city: String,
}

/// Parse the station script into entries.
///
/// Items with fewer than five fields or an invalid telecode are skipped;
/// repeated telecodes keep their first entry.
pub fn parse_station_script(text: &str) -> Result<Vec<StationEntry>, StationError> {
    let payload = extract_payload(text)
        .ok_or_else(|| StationError::Parse("station_names assignment not found".to_string()))?;

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for item in payload.split('@').filter(|s| !s.is_empty()) {
        let fields: Vec<&str> = item.split('|').map(str::trim).collect();
        if fields.len() < 5 {
            continue;
        }
        let Ok(code) = StationCode::parse(fields[2]) else {
            continue;
        };
        let name = fields[1];
        if name.is_empty() || !seen.insert(code) {
            continue;
        }

        let city = fields
            .get(7)
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .unwrap_or_else(|| name.chars().take(2).collect());
        let abbr = if fields[4].is_empty() {
            fields[0]
        } else {
            fields[4]
        };

        entries.push(StationEntry {
            name: name.to_string(),
            code,
            pinyin: fields[3].to_string(),
            abbr: abbr.to_string(),
            city,
        });
    }

    if entries.is_empty() {
        return Err(StationError::Parse(
            "station script contains no stations".to_string(),
        ));
    }
    Ok(entries)
}

/// The quoted right-hand side of `station_names = '…'`.
fn extract_payload(text: &str) -> Option<&str> {
    let start = text.find(ASSIGNMENT)? + ASSIGNMENT.len();
    let rest = text[start..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &rest[quote.len_utf8()..];
    let end = body.find(quote)?;
    Some(&body[..end])
}
