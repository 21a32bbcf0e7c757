//! Utilities for converting shardscan errors to Arrow errors.
//!
//! Used by the Arrow-facing readers, whose iterator items are
//! `Result<RecordBatch, ArrowError>`.

use arrow_schema::ArrowError;
use shardscan_common::error::{Error, ErrorKind};

/// Trait for converting types into an [`ArrowError`].
pub trait ToArrowError {
    fn to_arrow_err(self) -> ArrowError;
}

/// Trait for converting results with custom errors into Arrow-compatible results.
pub trait ToArrowResult {
    type Success;

    fn to_arrow_res(self) -> Result<Self::Success, ArrowError>;
}

impl<T, E> ToArrowResult for Result<T, E>
where
    E: ToArrowError,
{
    type Success = T;

    fn to_arrow_res(self) -> Result<Self::Success, ArrowError> {
        self.map_err(|e| e.to_arrow_err())
    }
}

impl ToArrowError for Error {
    /// Maps argument and coercion failures to their Arrow counterparts and
    /// wraps everything else as `ArrowError::ExternalError`.
    fn to_arrow_err(self) -> ArrowError {
        match self.kind() {
            ErrorKind::InvalidArgument { name, message } => {
                ArrowError::InvalidArgumentError(format!("{name}: {message}"))
            }
            ErrorKind::Coercion { .. } => ArrowError::CastError(self.to_string()),
            _ => ArrowError::ExternalError(self.into()),
        }
    }
}
