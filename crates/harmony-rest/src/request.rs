//! Request and response values

use crate::error::RestResult;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One API call, independent of retries
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path below the versioned base URL, with leading slash and optional query
    pub path: String,
    pub body: Option<Value>,
    /// Attach `Authorization: Bot <token>`; callback-style endpoints go without
    pub needs_auth: bool,
    /// Sent as `X-Audit-Log-Reason`
    pub audit_reason: Option<String>,
}

impl Request {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            method,
            path,
            body: None,
            needs_auth: true,
            audit_reason: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json(mut self, body: &impl Serialize) -> RestResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn without_auth(mut self) -> Self {
        self.needs_auth = false;
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.audit_reason = Some(reason.into());
        self
    }

    /// Whether the method writes and therefore carries a JSON content type
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// A successful response with its body fully read
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RestResponse {
    /// Decode the body; an empty body decodes as JSON `null`
    pub fn json<T: DeserializeOwned>(&self) -> RestResult<T> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let request = Request::post("channels/1/messages")
            .json(&json!({"content": "hi"}))
            .unwrap()
            .reason("cleanup")
            .without_auth();

        assert_eq!(request.path, "/channels/1/messages");
        assert_eq!(request.body, Some(json!({"content": "hi"})));
        assert_eq!(request.audit_reason.as_deref(), Some("cleanup"));
        assert!(!request.needs_auth);
        assert!(request.is_write());
        assert!(!Request::get("/gateway").is_write());
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let response = RestResponse {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        assert_eq!(response.json::<Option<u32>>().unwrap(), None);
    }
}
