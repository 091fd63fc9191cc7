//! Request and response wrappers handed to handlers.
//!
//! [`HttpRequest`] is immutable and shared for the whole chain;
//! [`HttpResponse`] accumulates status, headers and body until the engine
//! turns it into an [`http::Response`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Parameters extracted from the request path.
pub type PathParams = HashMap<String, String>;

// =============================================================================
// Verb
// =============================================================================

/// HTTP method a route answers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    /// Every method.
    All,
    /// A single method.
    Exact(Method),
}

impl HttpVerb {
    /// Name understood by path matchers (`"ALL"` or the method name).
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "ALL",
            Self::Exact(method) => method.as_str(),
        }
    }

    /// Returns `true` if `method` is accepted.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            Self::All => true,
            Self::Exact(expected) => expected == method,
        }
    }
}

impl Default for HttpVerb {
    fn default() -> Self {
        Self::Exact(Method::GET)
    }
}

impl From<Method> for HttpVerb {
    fn from(method: Method) -> Self {
        Self::Exact(method)
    }
}

impl FromStr for HttpVerb {
    type Err = http::method::InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ALL") {
            return Ok(Self::All);
        }
        Method::from_bytes(s.to_ascii_uppercase().as_bytes()).map(Self::Exact)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Request
// =============================================================================

/// Body of a request together with its declared content type.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Raw body.
    pub data: Bytes,
}

/// The incoming request plus the path parameters of the matched route.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: PathParams,
}

impl HttpRequest {
    /// Wraps a buffered request.
    pub fn new(request: http::Request<Bytes>, params: PathParams) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// All path parameters.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// A path parameter of the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        self.queries()
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    /// All query parameters in order of appearance.
    pub fn queries(&self) -> Vec<(String, String)> {
        let query = self.uri.query().unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
    }

    /// A header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the body as text.
    pub fn text(&self) -> Result<String, HttpError> {
        Ok(std::str::from_utf8(&self.body)?.to_owned())
    }

    /// Returns the raw body.
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(&self.body).into_owned().collect()
    }

    /// Returns the body together with its content type.
    pub fn blob(&self) -> Blob {
        Blob {
            content_type: self.header(CONTENT_TYPE.as_str()).map(str::to_owned),
            data: self.body.clone(),
        }
    }
}

// =============================================================================
// Response
// =============================================================================

/// The response being built by the chain.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

impl HttpResponse {
    /// An empty `200 OK` response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status code.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Sets a header, replacing previous values.
    pub fn header(&mut self, name: &str, value: &str) -> Result<&mut Self, HttpError> {
        let invalid = || HttpError::InvalidHeader {
            name: name.to_owned(),
        };
        let key = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        self.headers.insert(key, value);
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Replaces the body with `value` encoded as JSON.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, HttpError> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Replaces the body with plain text.
    pub fn text(&mut self, value: impl Into<String>) -> &mut Self {
        self.body = Bytes::from(value.into());
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self
    }

    /// Replaces the body with raw bytes without touching the content type.
    pub fn body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Materializes the final response.
    pub fn into_response(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, body: &'static str) -> HttpRequest {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();
        let params = PathParams::from([("id".to_string(), "42".to_string())]);
        HttpRequest::new(request, params)
    }

    #[test]
    fn test_request_accessors() {
        let req = request("/users/42?sort=name&tag=a&tag=b%20c", "name=Ada+Lovelace&age=36");

        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.param("missing"), None);
        assert_eq!(req.query("tag").as_deref(), Some("a"));
        assert_eq!(req.queries().len(), 3);
        assert_eq!(req.queries()[2].1, "b c");
        assert_eq!(req.header("Content-Type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.form().get("name").map(String::as_str), Some("Ada Lovelace"));
        assert_eq!(req.text().unwrap(), "name=Ada+Lovelace&age=36");
        assert!(req.json::<serde_json::Value>().is_err());
    }

    #[test]
    fn test_response_into_response() {
        let mut res = HttpResponse::new();
        res.status(StatusCode::CREATED)
            .header("x-request-id", "7")
            .unwrap()
            .json(&serde_json::json!({ "ok": true }))
            .unwrap();

        let response = res.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-request-id"], "7");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.body().as_ref(), br#"{"ok":true}"#);
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let mut res = HttpResponse::new();
        assert!(matches!(
            res.header("bad header", "x"),
            Err(HttpError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_verb_parsing() {
        assert_eq!("all".parse::<HttpVerb>().unwrap(), HttpVerb::All);
        assert_eq!("post".parse::<HttpVerb>().unwrap(), HttpVerb::Exact(Method::POST));
        assert!(HttpVerb::All.accepts(&Method::DELETE));
        assert!(!HttpVerb::default().accepts(&Method::POST));
    }
}
