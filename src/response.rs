//! Helpers for writing common responses through a [`ResponseWriter`].

use std::io;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;

use crate::error::Error;
use crate::writer::ResponseWriter;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Writes `value` as one JSON document followed by a newline.
///
/// Sets `content-type: application/json` unless the handler already chose a
/// content type. Does not write a status; the sink applies its default.
pub fn encode_json<T>(w: &mut dyn ResponseWriter, value: &T) -> Result<(), Error>
where
    T: Serialize + ?Sized,
{
    let mut body = serde_json::to_vec(value)?;
    body.push(b'\n');

    w.headers_mut()
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(APPLICATION_JSON));
    w.write_all(&body)?;
    Ok(())
}

/// Replies with `status` and the plain-text body `text`.
///
/// Headers the handler already set are kept, except `content-length`, which
/// would not match the error body. The caller should not write anything else
/// to `w` afterwards.
pub fn http_error(w: &mut dyn ResponseWriter, text: &str, status: StatusCode) -> io::Result<()> {
    set_error_headers(w.headers_mut());
    w.write_header(status);
    w.write_all(text.as_bytes())?;
    w.write_all(b"\n")
}

/// Canonical reason phrase for `status`, e.g. `"Not Found"`. Empty for
/// unregistered codes.
pub fn status_text(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

pub(crate) fn set_error_headers(headers: &mut HeaderMap) {
    headers.remove(CONTENT_LENGTH);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
}
