//! Eligibility check for form conversion.

use axum::http::{header, HeaderMap, Method};

const URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Encoding of an eligible form body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    UrlEncoded,
    Multipart,
}

/// Classify a request by method and `Content-Type`.
///
/// Returns `None` for anything that should pass through untouched: non-POST
/// methods, a missing or unreadable content type, or a content type that
/// does not start with one of the two form media types. Parameters after
/// the media type (`; boundary=...`, `; charset=...`) are ignored.
pub fn classify(method: &Method, headers: &HeaderMap) -> Option<FormKind> {
    if *method != Method::POST {
        return None;
    }

    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;

    if content_type.starts_with(URLENCODED) {
        Some(FormKind::UrlEncoded)
    } else if content_type.starts_with(MULTIPART) {
        Some(FormKind::Multipart)
    } else {
        None
    }
}
