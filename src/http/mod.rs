//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign request ID)
//!     → middleware/form2json.rs (convert eligible form posts)
//!     → server.rs next stage (forward upstream or echo)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
