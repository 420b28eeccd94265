//! Form body decoding.
//!
//! # Responsibilities
//! - Decode `multipart/form-data` (via multer) and urlencoded bodies
//! - Group values and files by field name, keeping per-name order
//! - Keep uploaded files in memory up to the configured budget, spill the
//!   rest to temporary files
//! - Remove temporary files on request
//!
//! # Design Decisions
//! - Text values share a separate budget of `memory_limit + 10 MiB`
//! - A file is spilled as a whole once it would overflow the remaining
//!   in-memory budget; spilled files do not consume that budget
//! - Temp files delete themselves on drop, so an abandoned parse leaves
//!   nothing behind; `remove_all` is the explicit, checked path

use std::collections::HashMap;
use std::io;
use std::path::Path;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::config::FormConfig;
use crate::form::error::{ConvertError, ParseError};
use crate::form::gate::FormKind;

/// Extra in-memory allowance for non-file parts on top of `memory_limit`.
const VALUE_ALLOWANCE: u64 = 10 * 1024 * 1024;

const SPILL_PREFIX: &str = "form2json-";

/// A decoded form: text values and uploaded files by field name.
#[derive(Debug, Default)]
pub struct FormData {
    pub values: HashMap<String, Vec<String>>,
    pub files: HashMap<String, Vec<FileHeader>>,
}

/// An uploaded file and where its content lives.
#[derive(Debug)]
pub struct FileHeader {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: u64,
    content: FileContent,
}

#[derive(Debug)]
enum FileContent {
    Memory(Bytes),
    Disk(NamedTempFile),
}

impl FileHeader {
    pub fn in_memory(file_name: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            size: data.len() as u64,
            content: FileContent::Memory(data),
        }
    }

    /// Whether the content was written to a temporary file.
    pub fn is_spilled(&self) -> bool {
        matches!(self.content, FileContent::Disk(_))
    }

    /// Path of the temporary file backing this upload, if spilled.
    pub fn spill_path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::Disk(tmp) => Some(tmp.path()),
            FileContent::Memory(_) => None,
        }
    }

    /// Open the file content for reading from the start.
    pub async fn open(&self) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        match &self.content {
            FileContent::Memory(data) => Ok(Box::new(io::Cursor::new(data.clone()))),
            FileContent::Disk(tmp) => {
                let file = tokio::fs::File::open(tmp.path()).await?;
                Ok(Box::new(file))
            }
        }
    }
}

impl FormData {
    /// Decode a request body of the given kind.
    ///
    /// `content_type` is the raw `Content-Type` header; multipart bodies take
    /// their boundary from it. The body is consumed.
    pub async fn parse(
        body: Body,
        content_type: &str,
        kind: FormKind,
        config: &FormConfig,
    ) -> Result<Self, ConvertError> {
        match kind {
            FormKind::UrlEncoded => Ok(Self::parse_urlencoded(body, config.max_form_size).await?),
            FormKind::Multipart => Self::parse_multipart(body, content_type, config).await,
        }
    }

    async fn parse_urlencoded(body: Body, limit: usize) -> Result<Self, ParseError> {
        let mut stream = body.into_data_stream();
        let mut raw = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if raw.len() + chunk.len() > limit {
                return Err(ParseError::TooLarge { limit });
            }
            raw.extend_from_slice(&chunk);
        }

        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&raw)?;
        let mut form = FormData::default();
        for (name, value) in pairs {
            form.values.entry(name).or_default().push(value);
        }
        Ok(form)
    }

    async fn parse_multipart(
        body: Body,
        content_type: &str,
        config: &FormConfig,
    ) -> Result<Self, ConvertError> {
        let boundary = multer::parse_boundary(content_type).map_err(ParseError::from)?;
        let mut multipart = multer::Multipart::new(body.into_data_stream(), boundary);

        let mut form = FormData::default();
        let mut file_budget = config.memory_budget();
        let value_limit = file_budget.saturating_add(VALUE_ALLOWANCE);
        let mut value_budget = value_limit;

        while let Some(mut field) = multipart.next_field().await.map_err(ParseError::from)? {
            let name = match field.name() {
                Some(name) if !name.is_empty() => name.to_owned(),
                _ => continue,
            };
            let file_name = field
                .file_name()
                .filter(|file_name| !file_name.is_empty())
                .map(str::to_owned);

            let Some(file_name) = file_name else {
                let mut data = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(ParseError::from)? {
                    value_budget = value_budget.checked_sub(chunk.len() as u64).ok_or(
                        ParseError::TooLarge {
                            limit: usize::try_from(value_limit).unwrap_or(usize::MAX),
                        },
                    )?;
                    data.extend_from_slice(&chunk);
                }
                form.values
                    .entry(name)
                    .or_default()
                    .push(String::from_utf8_lossy(&data).into_owned());
                continue;
            };

            let content_type = field.content_type().map(|mime| mime.to_string());
            let (content, size) =
                read_file(&mut field, &mut file_budget, config.temp_dir.as_deref()).await?;

            if matches!(content, FileContent::Disk(_)) {
                tracing::debug!(field = %name, file_name = %file_name, size, "Spilled upload to disk");
            }

            form.files.entry(name).or_default().push(FileHeader {
                file_name,
                content_type,
                size,
                content,
            });
        }

        Ok(form)
    }

    /// Number of uploaded files kept in temporary files.
    pub fn spilled_count(&self) -> usize {
        self.files.values().flatten().filter(|file| file.is_spilled()).count()
    }

    /// Delete every temporary file created while parsing.
    ///
    /// All files are attempted; the first failure is returned.
    pub fn remove_all(self) -> io::Result<()> {
        let mut first_err = None;
        for file in self.files.into_values().flatten() {
            if let FileContent::Disk(tmp) = file.content {
                if let Err(e) = tmp.close() {
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Read one file part, in memory while it fits `budget`, spilled otherwise.
async fn read_file(
    field: &mut multer::Field<'_>,
    budget: &mut u64,
    temp_dir: Option<&Path>,
) -> Result<(FileContent, u64), ConvertError> {
    let mut buffered = BytesMut::new();
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(ParseError::from)? {
        size += chunk.len() as u64;
        if size > *budget {
            let tmp = spill(field, &buffered, &chunk, &mut size, temp_dir).await?;
            return Ok((FileContent::Disk(tmp), size));
        }
        buffered.extend_from_slice(&chunk);
    }

    *budget -= size;
    Ok((FileContent::Memory(buffered.freeze()), size))
}

/// Move an oversized upload to a temporary file and stream the rest of it there.
async fn spill(
    field: &mut multer::Field<'_>,
    buffered: &[u8],
    pending: &[u8],
    size: &mut u64,
    temp_dir: Option<&Path>,
) -> Result<NamedTempFile, ConvertError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SPILL_PREFIX);
    let tmp = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(ConvertError::Spill)?;

    let handle = tmp.as_file().try_clone().map_err(ConvertError::Spill)?;
    let mut file = tokio::fs::File::from_std(handle);
    file.write_all(buffered).await.map_err(ConvertError::Spill)?;
    file.write_all(pending).await.map_err(ConvertError::Spill)?;

    while let Some(chunk) = field.chunk().await.map_err(ParseError::from)? {
        *size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(ConvertError::Spill)?;
    }
    file.flush().await.map_err(ConvertError::Spill)?;

    Ok(tmp)
}
