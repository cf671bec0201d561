//! Field selection for printing relayed requests.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::client::ClientError;
use crate::codec::{ForwardedRequest, Multimap};

/// One printable field of a relayed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestField {
    Method,
    Url,
    Proto,
    ProtoMajor,
    ProtoMinor,
    Header,
    Body,
    ContentLength,
    TransferEncoding,
    Host,
    Form,
    PostForm,
    Trailer,
    RemoteAddr,
    RequestUri,
}

impl RequestField {
    pub const ALL: [RequestField; 15] = [
        RequestField::Method,
        RequestField::Url,
        RequestField::Proto,
        RequestField::ProtoMajor,
        RequestField::ProtoMinor,
        RequestField::Header,
        RequestField::Body,
        RequestField::ContentLength,
        RequestField::TransferEncoding,
        RequestField::Host,
        RequestField::Form,
        RequestField::PostForm,
        RequestField::Trailer,
        RequestField::RemoteAddr,
        RequestField::RequestUri,
    ];

    /// Printed when no fields are named on the command line.
    pub const DEFAULT: [RequestField; 3] =
        [RequestField::Method, RequestField::Header, RequestField::Body];

    pub fn name(&self) -> &'static str {
        match self {
            RequestField::Method => "Method",
            RequestField::Url => "URL",
            RequestField::Proto => "Proto",
            RequestField::ProtoMajor => "ProtoMajor",
            RequestField::ProtoMinor => "ProtoMinor",
            RequestField::Header => "Header",
            RequestField::Body => "Body",
            RequestField::ContentLength => "ContentLength",
            RequestField::TransferEncoding => "TransferEncoding",
            RequestField::Host => "Host",
            RequestField::Form => "Form",
            RequestField::PostForm => "PostForm",
            RequestField::Trailer => "Trailer",
            RequestField::RemoteAddr => "RemoteAddr",
            RequestField::RequestUri => "RequestURI",
        }
    }

    /// Comma-separated list of every field name.
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(RequestField::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse command-line field names. An empty list selects the defaults.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<RequestField>, ClientError> {
        if names.is_empty() {
            return Ok(Self::DEFAULT.to_vec());
        }
        names.iter().map(|name| name.as_ref().parse()).collect()
    }

    /// This field's value in `request`.
    pub fn value(&self, request: &ForwardedRequest) -> String {
        match self {
            RequestField::Method => request.method.clone(),
            RequestField::Url => request.url.to_string(),
            RequestField::Proto => request.proto(),
            RequestField::ProtoMajor => request.proto_major.to_string(),
            RequestField::ProtoMinor => request.proto_minor.to_string(),
            RequestField::Header => multimap(&request.headers),
            RequestField::Body => String::from_utf8_lossy(&request.body).into_owned(),
            RequestField::ContentLength => request
                .content_length
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            RequestField::TransferEncoding => format!("[{}]", request.transfer_encoding.join(", ")),
            RequestField::Host => request.host.clone(),
            RequestField::Form => multimap(&request.form),
            RequestField::PostForm => multimap(&request.post_form),
            RequestField::Trailer => multimap(&request.trailer),
            RequestField::RemoteAddr => request.remote_addr.clone(),
            RequestField::RequestUri => request.request_uri.clone(),
        }
    }
}

impl FromStr for RequestField {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ClientError::UnknownField {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}

impl std::fmt::Display for RequestField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Render the selected fields, one `Name :value` block each.
pub fn render(fields: &[RequestField], request: &ForwardedRequest) -> String {
    let mut out = String::new();
    for field in fields {
        let _ = write!(out, "\n{} :{}\n", field.name(), field.value(request));
    }
    out
}

fn multimap(map: &Multimap) -> String {
    let entries: Vec<String> = map
        .iter()
        .map(|(k, vs)| format!("{}: [{}]", k, vs.join(", ")))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ForwardedUrl;

    fn sample() -> ForwardedRequest {
        let mut request = ForwardedRequest {
            method: "POST".into(),
            url: ForwardedUrl {
                path: "/hook".into(),
                query: Some("a=1".into()),
                ..Default::default()
            },
            proto_major: 1,
            proto_minor: 1,
            body: "hello".into(),
            content_length: Some(5),
            host: "abc.relay.dev".into(),
            request_uri: "/hook?a=1".into(),
            ..Default::default()
        };
        request
            .headers
            .insert("content-type".into(), vec!["text/plain".into()]);
        request
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("method".parse::<RequestField>().unwrap(), RequestField::Method);
        assert_eq!("RequestURI".parse::<RequestField>().unwrap(), RequestField::RequestUri);
        assert_eq!("url".parse::<RequestField>().unwrap(), RequestField::Url);
    }

    #[test]
    fn unknown_name_lists_available_fields() {
        let err = "Cookies".parse::<RequestField>().unwrap_err();
        match err {
            ClientError::UnknownField { name, available } => {
                assert_eq!(name, "Cookies");
                assert!(available.starts_with("Method, URL, Proto"));
                assert!(available.ends_with("RequestURI"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_selection_uses_defaults() {
        let none: [&str; 0] = [];
        assert_eq!(RequestField::parse_list(&none).unwrap(), RequestField::DEFAULT);
        assert!(RequestField::parse_list(&["Body", "Nope"]).is_err());
    }

    #[test]
    fn renders_selected_fields_in_order() {
        let out = render(&RequestField::DEFAULT, &sample());
        assert_eq!(
            out,
            "\nMethod :POST\n\nHeader :{content-type: [text/plain]}\n\nBody :hello\n"
        );
    }

    #[test]
    fn renders_scalars() {
        let request = sample();
        assert_eq!(RequestField::Url.value(&request), "/hook?a=1");
        assert_eq!(RequestField::Proto.value(&request), "HTTP/1.1");
        assert_eq!(RequestField::ContentLength.value(&request), "5");
        assert_eq!(RequestField::TransferEncoding.value(&request), "[]");
    }
}
