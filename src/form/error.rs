//! Conversion errors and their HTTP mapping.

use std::io;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Client-attributable failures while decoding a form body.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing or unreadable Content-Type header")]
    MissingContentType,

    #[error("multipart: {0}")]
    Multipart(#[from] multer::Error),

    #[error("urlencoded: {0}")]
    UrlEncoded(#[from] serde_urlencoded::de::Error),

    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("form body too large (limit {limit} bytes)")]
    TooLarge { limit: usize },
}

/// Everything that can abort a conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("malformed form body: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to spill uploaded file to temporary storage: {0}")]
    Spill(#[source] io::Error),

    #[error("failed to encode file `{file_name}` of field `{field}`: {source}")]
    Encode {
        field: String,
        file_name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize converted form: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to remove temporary form files: {0}")]
    Cleanup(#[source] io::Error),
}

impl ConvertError {
    /// HTTP status reported for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ConvertError::Parse(_) => StatusCode::BAD_REQUEST,
            ConvertError::Spill(_)
            | ConvertError::Encode { .. }
            | ConvertError::Serialize(_)
            | ConvertError::Cleanup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ConvertError::Parse(_) => "parse",
            ConvertError::Spill(_) => "spill",
            ConvertError::Encode { .. } => "encode",
            ConvertError::Serialize(_) => "serialize",
            ConvertError::Cleanup(_) => "cleanup",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_client_error() {
            (status, self.to_string()).into_response()
        } else {
            // internal causes stay in the logs
            let reason = status.canonical_reason().unwrap_or("Internal Server Error");
            (status, reason).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let parse = ConvertError::Parse(ParseError::TooLarge { limit: 10 });
        assert_eq!(parse.status(), StatusCode::BAD_REQUEST);
        assert!(parse.is_client_error());

        let encode = ConvertError::Encode {
            field: "avatar".into(),
            file_name: "a.png".into(),
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "short read"),
        };
        assert_eq!(encode.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let cleanup = ConvertError::Cleanup(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(cleanup.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(cleanup.label(), "cleanup");

        let spill = ConvertError::Spill(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(spill.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_cause_is_carried() {
        let err = ConvertError::Parse(ParseError::Multipart(multer::Error::IncompleteStream));
        assert!(err.to_string().contains("multipart"));

        let err = ConvertError::Cleanup(io::Error::new(io::ErrorKind::Other, "busy"));
        let source = std::error::Error::source(&err).expect("cause attached");
        assert_eq!(source.to_string(), "busy");
    }

    #[test]
    fn test_response_status() {
        let response = ConvertError::Parse(ParseError::MissingContentType).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ConvertError::Cleanup(io::Error::new(io::ErrorKind::Other, "x")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
