//! Request Key Module
//!
//! Identity of a request for caching and in-flight deduplication.

use std::fmt;

use reqwest::Method;
use serde_json::Value;

// == Request Key ==
/// `(method, endpoint, serialized body)` triple identifying a request.
///
/// Two calls with equal keys are the same request: concurrent GETs collapse
/// onto one underlying network call, and a completed GET can serve later
/// calls from the cache under this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: Method,
    endpoint: String,
    body: String,
}

impl RequestKey {
    /// Builds a key from the request parts. The body is canonicalized via
    /// its JSON serialization ("null" when absent).
    pub fn new(method: &Method, endpoint: &str, body: Option<&Value>) -> Self {
        let body = match body {
            Some(value) => value.to_string(),
            None => "null".to_string(),
        };
        Self {
            method: method.clone(),
            endpoint: endpoint.to_string(),
            body,
        }
    }

    /// Only GET responses are memoized; mutations always hit the network.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.method, self.endpoint, self.body)
    }
}
