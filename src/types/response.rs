use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MIME_TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Serialize, Deserialize)]
pub struct CommonResponse {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A list of rendered resources, with links for navigating between pages.
#[derive(Debug, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(rename = "resourceType")]
    pub resource_type: String,

    pub links: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,

    pub data: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "continue")]
    pub continue_token: Option<String>,

    pub total: usize,
}
