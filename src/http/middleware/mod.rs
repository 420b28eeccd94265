//! Request middleware.

pub mod form2json;

pub use form2json::form2json;
