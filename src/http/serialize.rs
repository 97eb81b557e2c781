//! HTTP/1.x text and record forms of messages
//!
//! The text form is the familiar start-line, CRLF-terminated header lines,
//! blank line, body. Header lines starting with a space or tab continue the
//! previous value and are folded into it with a single space. Parsed
//! messages get a body that is a window over the input, starting right
//! after the blank line.
//!
//! The record form maps a message onto an [`InputValue`] tree, for callers
//! that store messages as structured data.

use super::headers::HeaderBag;
use super::marshal::InputValue;
use super::message::{BaseMessage, Message, Request, Response};
use super::stream::{Body, RelativeStream};
use super::uri::Uri;
use super::{Error, Result, CRLF};
use indexmap::IndexMap;

/// Find the next CRLF in a buffer
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse a request line
///
/// Format: `METHOD SP request-target SP HTTP/version`
pub fn parse_request_line(line: &str) -> Result<(String, String, String)> {
    let parts: Vec<&str> = line.split(' ').collect();

    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(Error::UnexpectedPayload(format!(
            "invalid request line: {:?}",
            line
        )));
    }

    let version = parts[2].strip_prefix("HTTP/").ok_or_else(|| {
        Error::UnexpectedPayload(format!("invalid protocol in request line: {:?}", line))
    })?;

    Ok((parts[0].to_string(), parts[1].to_string(), version.to_string()))
}

/// Parse a status line
///
/// Format: `HTTP/version SP status [SP reason]`
pub fn parse_status_line(line: &str) -> Result<(String, u16, Option<String>)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::UnexpectedPayload(format!(
            "invalid status line: {:?}",
            line
        )));
    }

    let version = parts[0].strip_prefix("HTTP/").ok_or_else(|| {
        Error::UnexpectedPayload(format!("invalid protocol in status line: {:?}", line))
    })?;
    let code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::UnexpectedPayload(format!("invalid status code: {:?}", parts[1])))?;
    let reason = parts
        .get(2)
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok((version.to_string(), code, reason))
}

/// Head of a parsed message: start line, headers, body offset
struct Head {
    start_line: String,
    headers: HeaderBag,
    body_offset: usize,
}

/// Split the head off a serialized message
fn parse_head(buf: &[u8]) -> Result<Head> {
    let line_at = |pos: usize| -> Result<(String, usize)> {
        let rest = &buf[pos..];
        let end = find_crlf(rest).ok_or_else(|| {
            Error::UnexpectedPayload("message head is not terminated by CRLF".to_string())
        })?;
        let line = std::str::from_utf8(&rest[..end])
            .map_err(|_| Error::UnexpectedPayload("message head is not UTF-8".to_string()))?;
        Ok((line.to_string(), pos + end + 2))
    };

    let (start_line, mut pos) = line_at(0)?;
    let mut pairs: Vec<(String, String)> = Vec::new();

    loop {
        let (line, next) = line_at(pos)?;
        pos = next;

        if line.is_empty() {
            break;
        }

        if line.starts_with([' ', '\t']) {
            let Some((_, value)) = pairs.last_mut() else {
                return Err(Error::UnexpectedPayload(format!(
                    "continuation line without a header: {:?}",
                    line
                )));
            };
            let continued = line.trim_matches(|c: char| c == ' ' || c == '\t');
            if !continued.is_empty() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(continued);
            }
            continue;
        }

        pairs.push(HeaderBag::parse_header_line(&line)?);
    }

    Ok(Head {
        start_line,
        headers: HeaderBag::from_pairs(pairs)?,
        body_offset: pos,
    })
}

/// Body over the bytes following the head
fn body_after_head(buf: &[u8], offset: usize) -> Body {
    Body::new(RelativeStream::new(Body::from_bytes(buf), offset as u64))
}

fn write_head(out: &mut Vec<u8>, start_line: &str, headers: &HeaderBag) {
    out.extend_from_slice(start_line.as_bytes());
    out.extend_from_slice(CRLF.as_bytes());
    out.extend_from_slice(headers.to_string().as_bytes());
    out.extend_from_slice(CRLF.as_bytes());
}

/// Serialize a request, including the synthesized `Host` header
pub fn request_to_bytes(request: &Request) -> Vec<u8> {
    let start_line = format!(
        "{} {} HTTP/{}",
        request.method(),
        request.request_target(),
        request.protocol_version()
    );

    let mut out = Vec::new();
    write_head(&mut out, &start_line, &request.headers());
    out.extend_from_slice(&request.body().to_bytes());
    out
}

pub fn request_to_string(request: &Request) -> String {
    String::from_utf8_lossy(&request_to_bytes(request)).into_owned()
}

/// Serialize a response; an empty reason phrase leaves no trailing space
pub fn response_to_bytes(response: &Response) -> Vec<u8> {
    let mut start_line = format!(
        "HTTP/{} {}",
        response.protocol_version(),
        response.status_code()
    );
    if !response.reason_phrase().is_empty() {
        start_line.push(' ');
        start_line.push_str(response.reason_phrase());
    }

    let mut out = Vec::new();
    write_head(&mut out, &start_line, &response.headers());
    out.extend_from_slice(&response.body().to_bytes());
    out
}

pub fn response_to_string(response: &Response) -> String {
    String::from_utf8_lossy(&response_to_bytes(response)).into_owned()
}

/// URI implied by a request target
///
/// Absolute and origin forms are parsed; `*` and authority forms leave
/// the URI empty and rely on the explicit request target.
fn uri_from_target(target: &str) -> Result<Uri> {
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || target.starts_with('/') {
        Uri::parse(target)
    } else {
        Ok(Uri::new())
    }
}

/// Parse a serialized request
pub fn request_from_bytes(buf: &[u8]) -> Result<Request> {
    let head = parse_head(buf)?;
    let (method, target, version) = parse_request_line(&head.start_line)?;
    let uri = uri_from_target(&target)?;

    let base = BaseMessage::new(head.headers, body_after_head(buf, head.body_offset))
        .with_protocol_version(&version)?;
    Request::from_parts(base, &method, uri)?.with_request_target(&target)
}

pub fn request_from_string(message: &str) -> Result<Request> {
    request_from_bytes(message.as_bytes())
}

/// Parse a serialized response
pub fn response_from_bytes(buf: &[u8]) -> Result<Response> {
    let head = parse_head(buf)?;
    let (version, code, reason) = parse_status_line(&head.start_line)?;

    let base = BaseMessage::new(head.headers, body_after_head(buf, head.body_offset))
        .with_protocol_version(&version)?;
    Response::new(code)?
        .with_status(code, reason.as_deref())
        .map(|response| response.with_base(base))
}

pub fn response_from_string(message: &str) -> Result<Response> {
    response_from_bytes(message.as_bytes())
}

fn scalar(value: impl Into<String>) -> InputValue {
    InputValue::Scalar(value.into())
}

fn headers_to_record(headers: &HeaderBag) -> InputValue {
    InputValue::Map(
        headers
            .iter()
            .map(|(name, values)| {
                let values = values.iter().map(|v| scalar(v.as_str())).collect();
                (name.to_string(), InputValue::List(values))
            })
            .collect(),
    )
}

/// Request as a record: `method`, `request_target`, `uri`,
/// `protocol_version`, `headers`, `body`
pub fn request_to_record(request: &Request) -> InputValue {
    let mut record = IndexMap::new();
    record.insert("method".to_string(), scalar(request.method()));
    record.insert("request_target".to_string(), scalar(request.request_target()));
    record.insert("uri".to_string(), scalar(request.uri().to_string()));
    record.insert(
        "protocol_version".to_string(),
        scalar(request.protocol_version()),
    );
    record.insert("headers".to_string(), headers_to_record(&request.headers()));
    record.insert("body".to_string(), scalar(body_text(request.body())));
    InputValue::Map(record)
}

/// Response as a record: `status_code`, `reason_phrase`,
/// `protocol_version`, `headers`, `body`
pub fn response_to_record(response: &Response) -> InputValue {
    let mut record = IndexMap::new();
    record.insert(
        "status_code".to_string(),
        scalar(response.status_code().to_string()),
    );
    record.insert("reason_phrase".to_string(), scalar(response.reason_phrase()));
    record.insert(
        "protocol_version".to_string(),
        scalar(response.protocol_version()),
    );
    record.insert("headers".to_string(), headers_to_record(&response.headers()));
    record.insert("body".to_string(), scalar(body_text(response.body())));
    InputValue::Map(record)
}

fn body_text(body: &Body) -> String {
    String::from_utf8_lossy(&body.to_bytes()).into_owned()
}

fn field<'a>(record: &'a InputValue, name: &str) -> Result<&'a InputValue> {
    record
        .get(name)
        .ok_or_else(|| Error::UnexpectedPayload(format!("missing {:?} field", name)))
}

fn text_field<'a>(record: &'a InputValue, name: &str) -> Result<&'a str> {
    field(record, name)?
        .as_str()
        .ok_or_else(|| Error::UnexpectedPayload(format!("{:?} field is not a string", name)))
}

fn headers_from_record(record: &InputValue) -> Result<HeaderBag> {
    let InputValue::Map(entries) = field(record, "headers")? else {
        return Err(Error::UnexpectedPayload(
            "\"headers\" field is not a map".to_string(),
        ));
    };

    let mut pairs = Vec::new();
    for (name, values) in entries {
        let values = match values {
            InputValue::Scalar(v) => vec![v.clone()],
            InputValue::List(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        Error::UnexpectedPayload(format!("nested value in header {:?}", name))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            InputValue::Map(_) => {
                return Err(Error::UnexpectedPayload(format!(
                    "map value in header {:?}",
                    name
                )))
            }
        };
        pairs.push((name.clone(), values));
    }
    HeaderBag::from_pairs(pairs)
}

/// Rebuild a request from its record form
pub fn request_from_record(record: &InputValue) -> Result<Request> {
    let method = text_field(record, "method")?;
    let target = text_field(record, "request_target")?;
    let uri = Uri::parse(text_field(record, "uri")?)?;
    let version = text_field(record, "protocol_version")?;
    let headers = headers_from_record(record)?;
    let body = Body::from_bytes(text_field(record, "body")?);

    let base = BaseMessage::new(headers, body).with_protocol_version(version)?;
    Request::from_parts(base, method, uri)?.with_request_target(target)
}

/// Rebuild a response from its record form
pub fn response_from_record(record: &InputValue) -> Result<Response> {
    let code = text_field(record, "status_code")?;
    let code = code
        .parse::<u16>()
        .map_err(|_| Error::UnexpectedPayload(format!("invalid status code {:?}", code)))?;
    let reason = text_field(record, "reason_phrase")?;
    let version = text_field(record, "protocol_version")?;
    let headers = headers_from_record(record)?;
    let body = Body::from_bytes(text_field(record, "body")?);

    let base = BaseMessage::new(headers, body).with_protocol_version(version)?;
    Ok(Response::new(code)?
        .with_status(code, Some(reason))?
        .with_base(base))
}
