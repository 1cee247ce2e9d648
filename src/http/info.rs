//! Response info side channel.
//!
//! Every response carries a JSON key/value map describing it (`url`,
//! `http_code`, `total_time`, ...). Filters can add their own keys. When a
//! filter replaces the underlying response, the info of the replaced one is
//! appended to `previous_info` so the history of a logical response is kept.

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value metadata of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseInfo(Map<String, Value>);

impl ResponseInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn http_code(&self) -> Option<u16> {
        self.get("http_code")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }

    pub fn url(&self) -> Option<&str> {
        self.get("url").and_then(Value::as_str)
    }

    pub fn is_canceled(&self) -> bool {
        self.get("canceled").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Infos of the underlying responses replaced so far, oldest first.
    pub fn previous_info(&self) -> Vec<ResponseInfo> {
        match self.get("previous_info") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_object().cloned().map(ResponseInfo))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn push_previous(&mut self, previous: ResponseInfo) {
        let entry = self
            .0
            .entry("previous_info")
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(Value::Object(previous.0)),
            other => *other = Value::Array(vec![Value::Object(previous.0)]),
        }
    }

    /// This info layered on top of `base`: keys present here win.
    pub fn merged_over(&self, base: &ResponseInfo) -> ResponseInfo {
        let mut merged = base.0.clone();
        for (key, value) in &self.0 {
            merged.insert(key.clone(), value.clone());
        }
        ResponseInfo(merged)
    }

    pub(crate) fn record_status(&mut self, status: StatusCode, headers: &HeaderMap) {
        self.set("http_code", status.as_u16());
        let lines: Vec<Value> = headers
            .iter()
            .map(|(name, value)| {
                Value::String(format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())))
            })
            .collect();
        self.set("response_headers", Value::Array(lines));
    }
}

impl From<ResponseInfo> for Value {
    fn from(info: ResponseInfo) -> Self {
        Value::Object(info.0)
    }
}
