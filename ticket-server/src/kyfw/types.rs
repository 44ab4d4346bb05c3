//! Response envelopes for the left-ticket query API.

use std::collections::HashMap;

use serde::Deserialize;

use super::error::KyfwError;

/// Maximum number of body characters kept in error messages.
const BODY_SNIPPET_CHARS: usize = 500;

/// Characters of an anti-crawl page kept for diagnostics.
const ANTI_CRAWL_SNIPPET_CHARS: usize = 200;

/// Top-level envelope of `/otn/leftTicket/query*`.
///
/// ```json
/// {"httpstatus":200,"data":{"result":["…|…"],"flag":"1","map":{"BJP":"北京"}},"messages":"","status":true}
/// ```
#[derive(Debug, Deserialize)]
pub struct LeftTicketResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub httpstatus: Option<u16>,
    #[serde(default)]
    pub data: Option<MaybeData>,
    /// Either a string or an array of strings.
    #[serde(default)]
    pub messages: serde_json::Value,
    /// Set when the query endpoint has moved (e.g. `leftTicket/queryZ`).
    #[serde(default)]
    pub c_url: Option<String>,
}

/// The `data` member is an object on success but may be `""` on failure.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MaybeData {
    Data(LeftTicketData),
    Other(serde_json::Value),
}

#[derive(Debug, Default, Deserialize)]
pub struct LeftTicketData {
    /// One `|`-separated record per train.
    #[serde(default)]
    pub result: Vec<String>,
    /// Telecode → station name for every code appearing in `result`.
    #[serde(default)]
    pub map: HashMap<String, String>,
    #[serde(default)]
    pub flag: Option<String>,
}

/// Raw records from one query, plus the page's own code → name map.
#[derive(Debug, Clone, Default)]
pub struct LeftTicketPage {
    pub records: Vec<String>,
    pub station_map: HashMap<String, String>,
}

impl LeftTicketPage {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of decoding a query body.
#[derive(Debug)]
pub enum Decoded {
    Page(LeftTicketPage),
    /// The API asked us to use another endpoint path.
    Moved(String),
}

/// Decode a left-ticket query body.
pub fn decode_left_ticket_body(body: &str) -> Result<Decoded, KyfwError> {
    let response: LeftTicketResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            if looks_like_html(body) {
                return Err(KyfwError::AntiCrawl {
                    snippet: body.chars().take(ANTI_CRAWL_SNIPPET_CHARS).collect(),
                });
            }
            return Err(KyfwError::Json {
                message: e.to_string(),
                body: Some(body.chars().take(BODY_SNIPPET_CHARS).collect()),
            });
        }
    };

    if !response.status {
        if let Some(c_url) = response.c_url.filter(|u| !u.trim().is_empty()) {
            return Ok(Decoded::Moved(c_url.trim().trim_start_matches('/').to_string()));
        }
        let message = messages_text(&response.messages);
        return Err(KyfwError::Api {
            message: if message.is_empty() {
                "unknown error".to_string()
            } else {
                message
            },
        });
    }

    let page = match response.data {
        Some(MaybeData::Data(data)) => LeftTicketPage {
            records: data.result,
            station_map: data.map,
        },
        _ => LeftTicketPage::default(),
    };
    Ok(Decoded::Page(page))
}

/// Whether a body is an HTML page rather than an API response.
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(512).collect::<String>().to_ascii_lowercase();
    head.trim_start().starts_with('<')
        || head.contains("<!doctype html")
        || body.contains("网络可能存在问题")
}

fn messages_text(messages: &serde_json::Value) -> String {
    match messages {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
