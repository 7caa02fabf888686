use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// A docID, position or offset arrived out of order. This is a fatal
    /// format-invariant violation: the segment write cannot continue.
    pub fn order_violation(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::OrderViolation {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn value_too_large(element: impl Into<String>, length: u64, limit: u64) -> Error {
        Error(
            ErrorKind::ValueTooLarge {
                element: element.into(),
                length,
                limit,
            }
            .into(),
        )
    }

    pub fn unsupported_scale(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::UnsupportedScale {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_format(name: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: name.into(),
                message: Default::default(),
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

    pub fn checksum_mismatch(element: impl Into<String>) -> Error {
        Error(
            ErrorKind::ChecksumMismatch {
                element: element.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Backs [`verify_arg!`](crate::verify_arg).
    #[inline]
    pub fn require_arg(ok: bool, name: &str, condition: &str) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(Self::arg_check_failed(name, condition))
        }
    }

    /// Backs [`verify_data!`](crate::verify_data).
    #[inline]
    pub fn require_data(ok: bool, element: &str, condition: &str) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(Self::data_check_failed(element, condition))
        }
    }

    #[cold]
    fn arg_check_failed(name: &str, condition: &str) -> Error {
        Error::invalid_arg(name, condition)
    }

    #[cold]
    fn data_check_failed(element: &str, condition: &str) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.to_string(),
                message: condition.to_string(),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("ordering violation in {element}: {message}")]
    OrderViolation { element: String, message: String },

    #[error("value of {length} bytes in '{element}' exceeds the limit of {limit}")]
    ValueTooLarge {
        element: String,
        length: u64,
        limit: u64,
    },

    #[error("'{element}' is beyond the supported scale: {message}")]
    UnsupportedScale { element: String, message: String },

    #[error("checksum mismatch for '{element}'")]
    ChecksumMismatch { element: String },

    #[error("invalid stream format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

/// Verifies an argument-level precondition, failing the enclosing function
/// with `InvalidArgument` that carries the stringified condition.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $cond:expr) => {
        $crate::error::Error::require_arg($cond, stringify!($name), stringify!($cond))?
    };
}

/// Verifies a data-level invariant, failing the enclosing function with
/// `InvalidFormat` that carries the stringified condition.
#[macro_export]
macro_rules! verify_data {
    ($name:expr, $cond:expr) => {
        $crate::error::Error::require_data($cond, stringify!($name), stringify!($cond))?
    };
}
