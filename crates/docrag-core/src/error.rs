use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No indexed context is available to answer the question")]
    NoContext,

    #[error("{service} call failed: {message}")]
    ExternalService {
        service: String,
        message: String,
        retryable: bool,
    },

    #[error("Ingest of document '{doc_id}' failed: {source}")]
    Ingest {
        doc_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService { service: service.into(), message: message.into(), retryable: false }
    }

    /// Failure worth another attempt: timeouts, connection errors, 429 and 5xx.
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService { service: service.into(), message: message.into(), retryable: true }
    }

    pub fn ingest(doc_id: impl Into<String>, source: Error) -> Self {
        Self::Ingest { doc_id: doc_id.into(), source: Box::new(source) }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService { retryable: true, .. })
    }

    /// Stable machine-readable label used in HTTP error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::NoContext => "no_context",
            Self::ExternalService { .. } => "external_service_error",
            Self::Ingest { .. } => "ingest_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// HTTP status the error maps to when surfaced to a caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) | Self::NoContext => 404,
            Self::ExternalService { .. } => 502,
            Self::Ingest { source, .. } => match source.as_ref() {
                Self::Validation(_) => 400,
                Self::ExternalService { .. } => 502,
                _ => 500,
            },
            Self::InvalidConfig(_) | Self::Storage(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_external_errors_are_retryable() {
        assert!(Error::transient("embedding", "timeout").is_retryable());
        assert!(!Error::external("embedding", "400 bad request").is_retryable());
        assert!(!Error::validation("empty").is_retryable());
    }

    #[test]
    fn ingest_status_follows_its_cause() {
        let external = Error::ingest("doc1", Error::external("embedding", "boom"));
        assert_eq!(external.status_code(), 502);
        let storage = Error::ingest("doc1", Error::Storage("disk full".into()));
        assert_eq!(storage.status_code(), 500);
        assert_eq!(Error::not_found("doc1").status_code(), 404);
        assert_eq!(Error::NoContext.kind(), "no_context");
    }
}
