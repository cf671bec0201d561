//! Binary wire format for [`ForwardedRequest`].

use axum::body::Bytes;
use bytes::{Buf, BufMut, BytesMut};

use crate::codec::request::{ForwardedRequest, ForwardedUrl, Multimap};
use crate::codec::CodecError;

/// Leading tag of every encoded request.
pub const WIRE_VERSION: u8 = 1;

/// Encode `request` into a self-contained message.
pub fn encode(request: &ForwardedRequest) -> Bytes {
    let mut buf = BytesMut::with_capacity(256 + request.body.len());
    buf.put_u8(WIRE_VERSION);

    put_str(&mut buf, &request.method);
    put_url(&mut buf, &request.url);
    buf.put_u8(request.proto_major);
    buf.put_u8(request.proto_minor);
    put_multimap(&mut buf, &request.headers);
    put_blob(&mut buf, &request.body);
    buf.put_i64(
        request
            .content_length
            .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX)),
    );
    put_list(&mut buf, &request.transfer_encoding);
    put_str(&mut buf, &request.host);
    put_multimap(&mut buf, &request.form);
    put_multimap(&mut buf, &request.post_form);
    put_multimap(&mut buf, &request.trailer);
    put_str(&mut buf, &request.remote_addr);
    put_str(&mut buf, &request.request_uri);

    buf.freeze()
}

/// Decode a message produced by [`encode`].
pub fn decode(input: &[u8]) -> Result<ForwardedRequest, CodecError> {
    let mut r = Reader { buf: input };

    let version = r.u8("version")?;
    if version != WIRE_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let request = ForwardedRequest {
        method: r.string("method")?,
        url: r.url()?,
        proto_major: r.u8("proto_major")?,
        proto_minor: r.u8("proto_minor")?,
        headers: r.multimap("headers")?,
        body: Bytes::copy_from_slice(r.blob("body")?),
        content_length: u64::try_from(r.i64("content_length")?).ok(),
        transfer_encoding: r.list("transfer_encoding")?,
        host: r.string("host")?,
        form: r.multimap("form")?,
        post_form: r.multimap("post_form")?,
        trailer: r.multimap("trailer")?,
        remote_addr: r.string("remote_addr")?,
        request_uri: r.string("request_uri")?,
    };

    if r.buf.has_remaining() {
        return Err(CodecError::TrailingBytes(r.buf.remaining()));
    }
    Ok(request)
}

fn put_len(buf: &mut BytesMut, len: usize) {
    buf.put_u32(u32::try_from(len).unwrap_or(u32::MAX));
}

fn put_blob(buf: &mut BytesMut, data: &[u8]) {
    put_len(buf, data.len());
    buf.put_slice(data);
}

fn put_str(buf: &mut BytesMut, s: &str) {
    put_blob(buf, s.as_bytes());
}

fn put_opt_str(buf: &mut BytesMut, s: Option<&str>) {
    match s {
        Some(s) => {
            buf.put_u8(1);
            put_str(buf, s);
        }
        None => buf.put_u8(0),
    }
}

fn put_list(buf: &mut BytesMut, items: &[String]) {
    put_len(buf, items.len());
    for item in items {
        put_str(buf, item);
    }
}

fn put_multimap(buf: &mut BytesMut, map: &Multimap) {
    put_len(buf, map.len());
    for (key, values) in map {
        put_str(buf, key);
        put_list(buf, values);
    }
}

fn put_url(buf: &mut BytesMut, url: &ForwardedUrl) {
    put_opt_str(buf, url.scheme.as_deref());
    put_opt_str(buf, url.host.as_deref());
    put_str(buf, &url.path);
    put_opt_str(buf, url.query.as_deref());
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn need(&self, n: usize, field: &'static str) -> Result<(), CodecError> {
        if self.buf.remaining() < n {
            Err(CodecError::Truncated { field })
        } else {
            Ok(())
        }
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        self.need(1, field)?;
        Ok(self.buf.get_u8())
    }

    fn len(&mut self, field: &'static str) -> Result<usize, CodecError> {
        self.need(4, field)?;
        Ok(self.buf.get_u32() as usize)
    }

    fn i64(&mut self, field: &'static str) -> Result<i64, CodecError> {
        self.need(8, field)?;
        Ok(self.buf.get_i64())
    }

    fn blob(&mut self, field: &'static str) -> Result<&'a [u8], CodecError> {
        let len = self.len(field)?;
        self.need(len, field)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn string(&mut self, field: &'static str) -> Result<String, CodecError> {
        let raw = self.blob(field)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8 { field })
    }

    fn opt_string(&mut self, field: &'static str) -> Result<Option<String>, CodecError> {
        match self.u8(field)? {
            0 => Ok(None),
            _ => self.string(field).map(Some),
        }
    }

    fn list(&mut self, field: &'static str) -> Result<Vec<String>, CodecError> {
        let count = self.len(field)?;
        // Every element costs at least its length prefix.
        self.need(count.saturating_mul(4), field)?;
        (0..count).map(|_| self.string(field)).collect()
    }

    fn multimap(&mut self, field: &'static str) -> Result<Multimap, CodecError> {
        let count = self.len(field)?;
        self.need(count.saturating_mul(8), field)?;
        let mut map = Multimap::new();
        for _ in 0..count {
            let key = self.string(field)?;
            let values = self.list(field)?;
            map.insert(key, values);
        }
        Ok(map)
    }

    fn url(&mut self) -> Result<ForwardedUrl, CodecError> {
        Ok(ForwardedUrl {
            scheme: self.opt_string("url.scheme")?,
            host: self.opt_string("url.host")?,
            path: self.string("url.path")?,
            query: self.opt_string("url.query")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ForwardedRequest {
        let mut headers = Multimap::new();
        headers.insert("content-type".into(), vec!["application/json".into()]);
        headers.insert("x-multi".into(), vec!["a".into(), "b".into()]);
        let mut form = Multimap::new();
        form.insert("id".into(), vec!["7".into()]);

        ForwardedRequest {
            method: "PATCH".into(),
            url: ForwardedUrl {
                scheme: Some("http".into()),
                host: Some("abcd1234.relay.test".into()),
                path: "/events".into(),
                query: Some("id=7".into()),
            },
            proto_major: 1,
            proto_minor: 1,
            headers,
            body: Bytes::from_static(b"{\"event\":\"push\"}"),
            content_length: Some(16),
            transfer_encoding: vec!["chunked".into()],
            host: "abcd1234.relay.test".into(),
            form,
            post_form: Multimap::new(),
            trailer: Multimap::new(),
            remote_addr: "192.0.2.1:40000".into(),
            request_uri: "/events?id=7".into(),
        }
    }

    #[test]
    fn decode_reproduces_every_field() {
        let original = sample();
        let decoded = decode(&encode(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_body_decodes_to_empty_buffer() {
        let original = ForwardedRequest {
            method: "POST".into(),
            content_length: None,
            ..Default::default()
        };
        let decoded = decode(&encode(&original)).unwrap();
        assert!(decoded.body.is_empty());
        assert_eq!(decoded.content_length, None);
        assert_eq!(decoded, original);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let encoded = encode(&sample());
        for cut in [0, 1, 5, encoded.len() / 2, encoded.len() - 1] {
            assert!(decode(&encoded[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = encode(&sample()).to_vec();
        encoded.extend_from_slice(&[0, 0]);
        assert!(matches!(decode(&encoded), Err(CodecError::TrailingBytes(2))));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut encoded = encode(&sample()).to_vec();
        encoded[0] = 9;
        assert!(matches!(decode(&encoded), Err(CodecError::UnsupportedVersion(9))));
    }

    #[test]
    fn huge_declared_counts_do_not_allocate() {
        let mut buf = BytesMut::new();
        buf.put_u8(WIRE_VERSION);
        buf.put_u32(u32::MAX);
        assert!(matches!(decode(&buf), Err(CodecError::Truncated { field: "method" })));
    }
}
