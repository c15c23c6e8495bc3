//! Error taxonomy shared by every entry point.

use std::fmt;

/// The five error categories from the external contract. Every fallible
/// operation's structured error belongs to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidArgs,
    Syntax,
    Schema,
    Validation,
    Resolution,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::InvalidArgs => "Invalid argument",
            ErrorCategory::Syntax => "Syntax",
            ErrorCategory::Schema => "Schema",
            ErrorCategory::Validation => "Validation",
            ErrorCategory::Resolution => "Resolution",
            ErrorCategory::Internal => "Internal",
        };
        f.write_str(s)
    }
}

/// A schema compile-time error code, per the enumeration in the compiler's
/// per-keyword semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    Syntax,
    TypeFormat,
    TypeValue,
    BoundFormat,
    BoundValue,
    LengthFormat,
    LengthValue,
    Pattern,
    Items,
    AdditionalItems,
    Properties,
    PatternProperties,
    Required,
    AdditionalProperties,
    Enum,
    Combinator,
    Definitions,
    MultipleOf,
    Title,
    Description,
}

/// A runtime validation failure code, per the validator's closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    NotNull,
    NotNumber,
    NumberTooSmall,
    NumberTooBig,
    NotInteger,
    NotBoolean,
    NotString,
    StringTooShort,
    StringTooLong,
    NotArray,
    ArrayTooShort,
    ArrayTooLong,
    ArrayHasDuplicates,
    NotObject,
    NotEnoughKeys,
    TooManyKeys,
    MissingRequiredKey,
    ObjectPropertyNotAllowed,
    TypeNotAllowed,
    UnexpectedValue,
    NotEveryAllOf,
    NeitherOfAny,
    MoreThanOneOf,
}

/// The resolver's per-request outcome (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    Resolved,
    NotFound,
    IoError,
    Invalid,
    GenericError,
}

/// A structured error value: category plus a human-readable message, plus an
/// optional code drawn from whichever enumeration the category implies.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub category: ErrorCategory,
    pub message: String,
    pub schema_code: Option<SchemaErrorCode>,
    pub validation_code: Option<ValidationCode>,
}

impl ErrorDetail {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        ErrorDetail {
            category,
            message: message.into(),
            schema_code: None,
            validation_code: None,
        }
    }

    pub fn schema(code: SchemaErrorCode, message: impl Into<String>) -> Self {
        ErrorDetail {
            category: ErrorCategory::Schema,
            message: message.into(),
            schema_code: Some(code),
            validation_code: None,
        }
    }

    pub fn validation(code: ValidationCode, message: impl Into<String>) -> Self {
        ErrorDetail {
            category: ErrorCategory::Validation,
            message: message.into(),
            schema_code: None,
            validation_code: Some(code),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error. {}", self.category, self.message)
    }
}

/// The crate-wide error type. `thiserror` derives `Display`/`std::error::Error`
/// the same way the rest of the ambient stack expects structured context on
/// every variant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument error. {0}")]
    InvalidArgs(String),

    #[error("Syntax error. {0}")]
    Syntax(String),

    #[error("Schema error. {message}")]
    Schema {
        code: SchemaErrorCode,
        message: String,
    },

    #[error("Validation error. {message}")]
    Validation {
        code: ValidationCode,
        message: String,
    },

    #[error("Resolution error. {0}")]
    Resolution(String),

    #[error("Internal error. {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidArgs(_) => ErrorCategory::InvalidArgs,
            Error::Syntax(_) => ErrorCategory::Syntax,
            Error::Schema { .. } => ErrorCategory::Schema,
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::Resolution(_) => ErrorCategory::Resolution,
            Error::Internal(_) => ErrorCategory::Internal,
            Error::Io(_) => ErrorCategory::Internal,
        }
    }

    pub fn to_detail(&self) -> ErrorDetail {
        let mut detail = ErrorDetail::new(self.category(), self.to_string());
        match self {
            Error::Schema { code, .. } => detail.schema_code = Some(*code),
            Error::Validation { code, .. } => detail.validation_code = Some(*code),
            _ => {}
        }
        detail
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display_matches_contract_shape() {
        let err = Error::Validation {
            code: ValidationCode::NumberTooSmall,
            message: "value below minimum".into(),
        };
        assert_eq!(err.to_string(), "Validation error. value below minimum");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn detail_carries_validation_code() {
        let err = Error::Validation {
            code: ValidationCode::ArrayHasDuplicates,
            message: "duplicate entries".into(),
        };
        let detail = err.to_detail();
        assert_eq!(detail.validation_code, Some(ValidationCode::ArrayHasDuplicates));
        assert!(detail.schema_code.is_none());
    }
}
