use thiserror::Error;

/// Convenient result alias for the DSS client.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A required environment variable was not set.
    #[error("{0} environment variable is required")]
    MissingConfig(&'static str),

    /// The connection check against the instance failed.
    #[error("Failed to connect to DSS at {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: Box<Error>,
    },

    /// The DSS API answered with a non-success status.
    #[error("DSS API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A response did not have the shape the client expected.
    #[error("invalid response from DSS: {0}")]
    InvalidResponse(String),

    /// A lookup by name or index found nothing.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Wrapper for JSON errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for errors while parsing sampled rows.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(err) => err.status().map(|s| s.as_u16()),
            Error::Connection { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Whether the remote side reported that the object already exists.
    pub fn is_already_exists(&self) -> bool {
        self.to_string().to_lowercase().contains("already exists")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_names_host() {
        let err = Error::Connection {
            host: "https://dss.local".into(),
            source: Box::new(Error::Api {
                status: 401,
                message: "bad key".into(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to connect to DSS at https://dss.local"));
        assert!(msg.contains("bad key"));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn already_exists_is_detected_from_message() {
        let err = Error::Api {
            status: 400,
            message: "Project TARGET already exists".into(),
        };
        assert!(err.is_already_exists());
        assert!(!Error::MissingConfig("DSS_HOST").is_already_exists());
    }
}
