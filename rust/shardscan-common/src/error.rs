use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns `true` for the normal-termination condition raised when pulling
    /// from a finished scroller or an exhausted partition iterator.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind(), ErrorKind::Exhausted { .. })
    }

    /// Returns `true` if the failed operation left no trace on the backend
    /// session and may be retried as is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport { .. }
                | ErrorKind::Backend { .. }
                | ErrorKind::Cancelled {
                    phase: CancelPhase::BeforeSend
                }
        )
    }

    pub fn config(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Config {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn transport<E>(context: impl Into<String>, source: E) -> Error
    where
        E: Into<StdErrorBoxed>,
    {
        Error(
            ErrorKind::Transport {
                context: context.into(),
                source: source.into(),
            }
            .into(),
        )
    }

    pub fn cancelled(phase: CancelPhase) -> Error {
        Error(ErrorKind::Cancelled { phase }.into())
    }

    pub fn backend(
        status: u16,
        error_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Error {
        Error(
            ErrorKind::Backend {
                status,
                error_type: error_type.into(),
                reason: reason.into(),
            }
            .into(),
        )
    }

    pub fn invalid_response(context: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidResponse {
                context: context.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn exhausted(what: impl Into<String>) -> Error {
        Error(ErrorKind::Exhausted { what: what.into() }.into())
    }

    pub fn aborted(what: impl Into<String>) -> Error {
        Error(ErrorKind::Aborted { what: what.into() }.into())
    }

    pub fn coercion(
        column: impl Into<String>,
        expected: impl Into<String>,
        raw: impl Into<String>,
    ) -> Error {
        Error(
            ErrorKind::Coercion {
                column: column.into(),
                expected: expected.into(),
                raw: raw.into(),
            }
            .into(),
        )
    }

    pub fn invalid_format(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn arrow<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Arrow {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }
}

/// Point in a request's life at which a cancellation or deadline was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelPhase {
    /// Nothing was sent; the backend session is untouched.
    BeforeSend,
    /// The request reached the wire but no response was consumed.
    InFlight,
}

impl fmt::Display for CancelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelPhase::BeforeSend => f.write_str("before send"),
            CancelPhase::InFlight => f.write_str("in flight"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("transport error for '{context}': {source}")]
    Transport {
        context: String,
        source: StdErrorBoxed,
    },

    #[error("request cancelled ({phase})")]
    Cancelled { phase: CancelPhase },

    #[error("[{status}] {error_type}: {reason}")]
    Backend {
        status: u16,
        error_type: String,
        reason: String,
    },

    #[error("invalid response for '{context}': {message}")]
    InvalidResponse { context: String, message: String },

    #[error("{what} exhausted")]
    Exhausted { what: String },

    /// Pull from a session that was abandoned before it was drained.
    #[error("{what} aborted")]
    Aborted { what: String },

    #[error("column '{column}' could not be parsed as {expected}, was: {raw}")]
    Coercion {
        column: String,
        expected: String,
        raw: String,
    },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("invalid format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("Arrow error: {context}")]
    Arrow {
        context: String,
        source: StdErrorBoxed,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::invalid_response("json", e.to_string())
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(_: std::convert::Infallible) -> Self {
        Error::invalid_operation("conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = Error::backend(404, "index_not_found_exception", "no such index [edsm]");
        assert_eq!(
            err.to_string(),
            "[404] index_not_found_exception: no such index [edsm]"
        );
        assert!(err.is_retryable());
        assert!(!err.is_exhausted());
    }

    #[test]
    fn test_exhausted_is_distinct() {
        let err = Error::exhausted("partition iterator");
        assert!(err.is_exhausted());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "partition iterator exhausted");
    }

    #[test]
    fn test_aborted_is_not_exhausted() {
        let err = Error::aborted("scroller for shard 3");
        assert!(!err.is_exhausted());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "scroller for shard 3 aborted");
    }

    #[test]
    fn test_cancel_phase_retryability() {
        assert!(Error::cancelled(CancelPhase::BeforeSend).is_retryable());
        assert!(!Error::cancelled(CancelPhase::InFlight).is_retryable());
    }

    #[test]
    fn test_coercion_message_names_column_and_value() {
        let err = Error::coercion("date", "time with format %Y-%m-%d", "\"not-a-date\"");
        let msg = err.to_string();
        assert!(msg.contains("date"));
        assert!(msg.contains("not-a-date"));
    }
}
