//! Form-to-JSON request transform.
//!
//! Rewrites POSTed `application/x-www-form-urlencoded` and
//! `multipart/form-data` bodies into a JSON array of parts before the next
//! handler runs. Usable as an axum middleware ([`http::middleware::form2json`])
//! or as a standalone server ([`HttpServer`]).

pub mod config;
pub mod form;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::Form2JsonConfig;
pub use form::Form2Json;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
