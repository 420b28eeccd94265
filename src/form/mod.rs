//! Form-to-JSON conversion subsystem.
//!
//! # Data Flow
//! ```text
//! POST request
//!     → gate.rs (method + content-type check)
//!         → not eligible: passthrough to next handler
//!     → parser.rs (multipart / urlencoded decode, spill large files to disk)
//!     → converter.rs (build parts, base64 files, remove temp files)
//!     → pool.rs (serialize parts into a reusable buffer)
//!     → request body and headers replaced, next handler runs
//! ```
//!
//! # Design Decisions
//! - Output is a JSON array of parts, so duplicate field names survive
//! - Text parts come first, then file parts; order across different names
//!   follows `HashMap` iteration and is not stable
//! - Temp files are owned by the request that created them and removed
//!   before the request moves on
//! - Malformed input is a 400, everything else that fails is a 500

pub mod converter;
pub mod error;
pub mod gate;
pub mod parser;
pub mod part;
pub mod pool;

pub use converter::Form2Json;
pub use error::{ConvertError, ParseError};
pub use gate::{classify, FormKind};
pub use parser::{FileHeader, FormData};
pub use part::{Part, PartKind};
pub use pool::{BufferPool, PooledBuffer};

/// Header marking requests produced by the converter.
pub const CONTENT_TYPE_CLASS_HEADER: &str = "content-type-class";

/// Marker written to `Content-Type-Class` on converted requests.
pub const CONTENT_TYPE_CLASS: &str = "caddy_post_json_v1";

/// Default in-memory budget for decoding form payloads (2 MiB).
pub const DEFAULT_MEMORY_LIMIT: i64 = 2 * 1024 * 1024;

/// Default maximum size of an urlencoded body (10 MiB).
pub const DEFAULT_MAX_FORM_SIZE: usize = 10 * 1024 * 1024;
