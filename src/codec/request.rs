//! Snapshot of an inbound HTTP request.
//!
//! # Responsibilities
//! - Buffer the request body exactly once
//! - Materialize query and form values before the body is recorded
//! - Hand the caller back an equivalent request with a replayable body

use std::collections::BTreeMap;
use std::future::poll_fn;
use std::net::SocketAddr;
use std::pin::Pin;

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, request::Parts, HeaderMap, Method, Request, Version};
use bytes::BytesMut;

use crate::codec::CodecError;

/// Ordered multimap used for headers, form values and trailers.
pub type Multimap = BTreeMap<String, Vec<String>>;

/// Parsed request target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedUrl {
    pub scheme: Option<String>,
    /// Authority (`host[:port]`) when the request target carried one.
    pub host: Option<String>,
    pub path: String,
    pub query: Option<String>,
}

impl ForwardedUrl {
    /// Path plus query, as used on a replayed request line.
    pub fn path_and_query(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        match &self.query {
            Some(q) => format!("{}?{}", path, q),
            None => path.to_string(),
        }
    }
}

impl std::fmt::Display for ForwardedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(scheme), Some(host)) = (&self.scheme, &self.host) {
            write!(f, "{}://{}", scheme, host)?;
        }
        write!(f, "{}", self.path_and_query())
    }
}

/// Everything the client needs to replay a request against a local service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedRequest {
    pub method: String,
    pub url: ForwardedUrl,
    pub proto_major: u8,
    pub proto_minor: u8,
    pub headers: Multimap,
    pub body: Bytes,
    /// `None` when the sender did not declare a length.
    pub content_length: Option<u64>,
    pub transfer_encoding: Vec<String>,
    pub host: String,
    pub form: Multimap,
    pub post_form: Multimap,
    pub trailer: Multimap,
    pub remote_addr: String,
    pub request_uri: String,
}

impl ForwardedRequest {
    /// Protocol string such as `HTTP/1.1`.
    pub fn proto(&self) -> String {
        match (self.proto_major, self.proto_minor) {
            (major, 0) if major >= 2 => format!("HTTP/{}", major),
            (major, minor) => format!("HTTP/{}.{}", major, minor),
        }
    }

    /// Capture `request` and return it again with an in-memory body.
    ///
    /// The body is read once, bounded by `body_limit`. Form values are parsed
    /// from the buffered bytes, so the returned request still carries the full
    /// body for the caller. Trailer fields are recorded in the snapshot only.
    pub async fn capture(
        request: Request<Body>,
        remote_addr: Option<SocketAddr>,
        body_limit: usize,
    ) -> Result<(Self, Request<Body>), CodecError> {
        let (parts, body) = request.into_parts();

        if let Some(declared) = declared_length(&parts.headers) {
            if declared > body_limit as u64 {
                return Err(CodecError::BodyTooLarge { limit: body_limit });
            }
        }
        let (body, trailers) = read_body(body, body_limit).await?;

        let post_form = parse_post_form(&parts, &body).await;
        let mut form = post_form.clone();
        if let Some(query) = parts.uri.query() {
            extend_urlencoded(&mut form, query.as_bytes());
        }

        let (proto_major, proto_minor) = version_pair(parts.version);
        let snapshot = Self {
            method: parts.method.to_string(),
            url: ForwardedUrl {
                scheme: parts.uri.scheme_str().map(str::to_string),
                host: parts.uri.authority().map(|a| a.to_string()),
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(str::to_string),
            },
            proto_major,
            proto_minor,
            headers: header_multimap(&parts.headers),
            body: body.clone(),
            content_length: declared_length(&parts.headers),
            transfer_encoding: list_header(&parts.headers, header::TRANSFER_ENCODING),
            host: request_host(&parts),
            form,
            post_form,
            trailer: trailer_multimap(&parts.headers, &trailers),
            remote_addr: remote_addr.map(|a| a.to_string()).unwrap_or_default(),
            request_uri: parts.uri.to_string(),
        };

        Ok((snapshot, Request::from_parts(parts, Body::from(body))))
    }
}

/// Buffers the data frames under `limit` and keeps any trailer section.
async fn read_body(mut body: Body, limit: usize) -> Result<(Bytes, HeaderMap), CodecError> {
    let mut buf = BytesMut::new();
    let mut trailers = HeaderMap::new();
    while let Some(frame) = poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await {
        let frame = frame.map_err(|e| CodecError::BodyRead(e.to_string()))?;
        match frame.into_data() {
            Ok(chunk) => {
                if buf.len() + chunk.len() > limit {
                    return Err(CodecError::BodyTooLarge { limit });
                }
                buf.extend_from_slice(&chunk);
            }
            Err(frame) => {
                if let Ok(received) = frame.into_trailers() {
                    for (name, value) in &received {
                        trailers.append(name, value.clone());
                    }
                }
            }
        }
    }
    Ok((buf.freeze(), trailers))
}

async fn parse_post_form(parts: &Parts, body: &Bytes) -> Multimap {
    let mut post_form = Multimap::new();
    if !matches!(parts.method, Method::POST | Method::PUT | Method::PATCH) {
        return post_form;
    }

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/x-www-form-urlencoded" => extend_urlencoded(&mut post_form, body),
        "multipart/form-data" => {
            if let Err(e) = extend_multipart(&mut post_form, content_type, body.clone()).await {
                tracing::debug!(error = %e, "Ignoring malformed multipart body");
            }
        }
        _ => {}
    }
    post_form
}

fn extend_urlencoded(map: &mut Multimap, input: &[u8]) {
    for (key, value) in url::form_urlencoded::parse(input) {
        map.entry(key.into_owned()).or_default().push(value.into_owned());
    }
}

async fn extend_multipart(
    map: &mut Multimap,
    content_type: &str,
    body: Bytes,
) -> Result<(), axum::extract::multipart::MultipartError> {
    let Ok(request) = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
    else {
        return Ok(());
    };
    let Ok(mut multipart) = Multipart::from_request(request, &()).await else {
        return Ok(());
    };

    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field.text().await?;
        map.entry(name).or_default().push(value);
    }
    Ok(())
}

fn header_multimap(headers: &HeaderMap) -> Multimap {
    let mut map = Multimap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

/// Declared trailer names, lowercased, filled with whatever values arrived.
fn trailer_multimap(headers: &HeaderMap, received: &HeaderMap) -> Multimap {
    let mut map: Multimap = list_header(headers, header::TRAILER)
        .into_iter()
        .map(|name| (name.to_ascii_lowercase(), Vec::new()))
        .collect();
    for (name, value) in received {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

fn list_header(headers: &HeaderMap, name: header::HeaderName) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn request_host(parts: &Parts) -> String {
    parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

fn version_pair(version: Version) -> (u8, u8) {
    match version {
        Version::HTTP_09 => (0, 9),
        Version::HTTP_10 => (1, 0),
        Version::HTTP_2 => (2, 0),
        Version::HTTP_3 => (3, 0),
        _ => (1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(uri: &str, content_type: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::HOST, "abcd1234.relay.test:8080")
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn capture_keeps_body_usable() {
        let request = post("/hook?source=ci", "application/json", r#"{"ok":true}"#);
        let remote: SocketAddr = "10.0.0.7:5555".parse().unwrap();

        let (snapshot, request) = ForwardedRequest::capture(request, Some(remote), 1024)
            .await
            .unwrap();

        assert_eq!(snapshot.method, "POST");
        assert_eq!(snapshot.url.path, "/hook");
        assert_eq!(snapshot.url.query.as_deref(), Some("source=ci"));
        assert_eq!(snapshot.host, "abcd1234.relay.test:8080");
        assert_eq!(snapshot.remote_addr, "10.0.0.7:5555");
        assert_eq!(snapshot.request_uri, "/hook?source=ci");
        assert_eq!(snapshot.content_length, Some(11));
        assert_eq!(snapshot.proto(), "HTTP/1.1");
        assert_eq!(snapshot.form.get("source"), Some(&vec!["ci".to_string()]));
        assert!(snapshot.post_form.is_empty());

        let replayed = axum::body::to_bytes(request.into_body(), 1024).await.unwrap();
        assert_eq!(replayed, snapshot.body);
        assert_eq!(&replayed[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn urlencoded_body_fills_post_form_before_query() {
        let request = post(
            "/hook?name=query",
            "application/x-www-form-urlencoded; charset=utf-8",
            "name=body&id=42",
        );
        let (snapshot, _) = ForwardedRequest::capture(request, None, 1024).await.unwrap();

        assert_eq!(snapshot.post_form.get("id"), Some(&vec!["42".to_string()]));
        assert_eq!(
            snapshot.form.get("name"),
            Some(&vec!["body".to_string(), "query".to_string()])
        );
        assert_eq!(&snapshot.body[..], b"name=body&id=42");
    }

    #[tokio::test]
    async fn multipart_text_fields_are_materialized() {
        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"event\"\r\n\r\n\
            push\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            file contents\r\n\
            --XYZ--\r\n";
        let request = post("/", "multipart/form-data; boundary=XYZ", body);
        let (snapshot, _) = ForwardedRequest::capture(request, None, 4096).await.unwrap();

        assert_eq!(snapshot.post_form.get("event"), Some(&vec!["push".to_string()]));
        assert!(!snapshot.post_form.contains_key("upload"));
        assert_eq!(snapshot.body.len(), body.len());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let request = post("/", "text/plain", "0123456789");
        let err = ForwardedRequest::capture(request, None, 4).await.unwrap_err();
        assert!(matches!(err, CodecError::BodyTooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn chunked_request_has_no_declared_length() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(header::TRANSFER_ENCODING, "gzip, chunked")
            .header(header::TRAILER, "x-checksum")
            .body(Body::from("abc"))
            .unwrap();
        let (snapshot, _) = ForwardedRequest::capture(request, None, 1024).await.unwrap();

        assert_eq!(snapshot.content_length, None);
        assert_eq!(snapshot.transfer_encoding, vec!["gzip", "chunked"]);
        assert_eq!(snapshot.trailer.get("x-checksum"), Some(&Vec::new()));
    }

    #[test]
    fn url_display() {
        let url = ForwardedUrl {
            scheme: None,
            host: None,
            path: "/a/b".into(),
            query: Some("x=1".into()),
        };
        assert_eq!(url.to_string(), "/a/b?x=1");
        assert_eq!(ForwardedUrl::default().path_and_query(), "/");
    }
}
