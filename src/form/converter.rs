//! Form-to-JSON request conversion.
//!
//! # Responsibilities
//! - Decode the form body under the configured memory limit
//! - Build the ordered part list (text values, then base64 files)
//! - Remove temporary files before the request moves on
//! - Serialize parts into a pooled buffer and splice the new body/headers
//!
//! # Design Decisions
//! - Steps run strictly in order; nothing is retried
//! - Limits are read once per conversion from an atomically swappable
//!   snapshot, so reloads never affect in-flight requests
//! - The JSON is copied out of the pooled buffer, so the buffer can be
//!   reused as soon as the request is rebuilt

use std::io::{self, Write};
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request},
};
use base64::{engine::general_purpose::STANDARD, write::EncoderStringWriter};
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::config::FormConfig;
use crate::form::error::{ConvertError, ParseError};
use crate::form::gate::FormKind;
use crate::form::parser::{FileHeader, FormData};
use crate::form::part::Part;
use crate::form::pool::BufferPool;
use crate::form::{CONTENT_TYPE_CLASS, CONTENT_TYPE_CLASS_HEADER};
use crate::observability::metrics;

/// Read size when streaming file content through the encoder.
/// A multiple of 3 keeps base64 output free of carried-over bytes per chunk.
const ENCODE_CHUNK: usize = 48 * 1024;

/// The form-to-JSON converter shared by all requests.
///
/// Cheap to clone; clones share limits and the buffer pool.
#[derive(Clone)]
pub struct Form2Json {
    inner: Arc<Inner>,
}

struct Inner {
    config: ArcSwap<FormConfig>,
    pool: BufferPool,
}

impl Form2Json {
    /// Create a converter. Non-positive limits fall back to their defaults.
    pub fn new(config: FormConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: ArcSwap::from_pointee(config.normalized()),
                pool: BufferPool::default(),
            }),
        }
    }

    /// Current limits.
    pub fn config(&self) -> Arc<FormConfig> {
        self.inner.config.load_full()
    }

    /// Swap in new limits for subsequent conversions.
    pub fn reload(&self, config: FormConfig) {
        let config = config.normalized();
        tracing::info!(
            memory_limit = config.memory_limit,
            max_form_size = config.max_form_size,
            "Form limits reloaded"
        );
        self.inner.config.store(Arc::new(config));
    }

    pub fn pool(&self) -> &BufferPool {
        &self.inner.pool
    }

    /// Convert an eligible request into one carrying a JSON array of parts.
    ///
    /// On success the returned request has a new body and updated
    /// `Content-Type`, `Content-Type-Class` and `Content-Length` headers.
    pub async fn convert(&self, request: Request<Body>, kind: FormKind) -> Result<Request<Body>, ConvertError> {
        let config = self.config();
        let (mut parts, body) = request.into_parts();

        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .ok_or(ParseError::MissingContentType)?
            .to_owned();

        // the incoming body is consumed here and never read again
        let form = FormData::parse(body, &content_type, kind, &config).await?;

        let spilled = form.spilled_count();
        if spilled > 0 {
            metrics::record_spilled_files(spilled);
        }

        let converted = collect_parts(form).await?;

        let json = self.serialize(&converted)?;
        metrics::record_parts(&converted);
        tracing::debug!(parts = converted.len(), spilled, bytes = json.len(), "Form converted to JSON");
        drop(converted);

        let length = json.len();
        parts.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        parts
            .headers
            .insert(HeaderName::from_static(CONTENT_TYPE_CLASS_HEADER), HeaderValue::from_static(CONTENT_TYPE_CLASS));
        parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        parts.headers.remove(header::TRANSFER_ENCODING);

        Ok(Request::from_parts(parts, Body::from(json)))
    }

    fn serialize(&self, converted: &[Part]) -> Result<Bytes, ConvertError> {
        let mut buf = self.inner.pool.take();
        serde_json::to_writer(&mut *buf, converted)?;
        Ok(Bytes::copy_from_slice(&buf))
    }
}

/// Build the part list and remove temporary files, whichever way encoding ends.
///
/// When encoding fails the encode error wins; a cleanup failure on that path
/// is only logged.
async fn collect_parts(mut form: FormData) -> Result<Vec<Part>, ConvertError> {
    let converted = match build_parts(&mut form).await {
        Ok(converted) => converted,
        Err(e) => {
            if let Err(cleanup) = form.remove_all() {
                tracing::error!(error = %cleanup, "Failed to remove temporary form files");
            }
            return Err(e);
        }
    };

    form.remove_all().map_err(ConvertError::Cleanup)?;
    Ok(converted)
}

/// Text parts first, then files; per-name order is kept.
async fn build_parts(form: &mut FormData) -> Result<Vec<Part>, ConvertError> {
    let text_count: usize = form.values.values().map(Vec::len).sum();
    let file_count: usize = form.files.values().map(Vec::len).sum();
    let mut converted = Vec::with_capacity(text_count + file_count);

    for (name, values) in std::mem::take(&mut form.values) {
        for value in values {
            converted.push(Part::text(name.clone(), value));
        }
    }

    for (name, files) in &form.files {
        for file in files {
            let encoded = encode_file(file).await.map_err(|source| ConvertError::Encode {
                field: name.clone(),
                file_name: file.file_name.clone(),
                source,
            })?;
            converted.push(Part::file(
                name.clone(),
                encoded,
                file.content_type.clone(),
                file.file_name.clone(),
            ));
        }
    }

    Ok(converted)
}

/// Stream file content through a base64 encoder into a string.
async fn encode_file(file: &FileHeader) -> io::Result<String> {
    let mut reader = file.open().await?;
    let mut encoder = EncoderStringWriter::new(&STANDARD);
    let mut chunk = vec![0u8; ENCODE_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        encoder.write_all(&chunk[..n])?;
    }

    Ok(encoder.into_inner())
}
