use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

/// Decode failures, split the way the original format handlers report them:
/// `IoError` means the buffer ran out before an expected field (truncation),
/// `ParsingError` means a field value violates a structural invariant, and
/// `Unsupported` means the data is well-formed but not something we decode.
#[derive(Debug)]
pub enum IlbmError {
    IoError(io::Error),
    ParsingError(String),
    Unsupported(String),
}

impl Error for IlbmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IlbmError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for IlbmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IlbmError::IoError(err) => write!(f, "I/O error: {}", err),
            IlbmError::ParsingError(msg) => write!(f, "Parsing error: {}", msg),
            IlbmError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
        }
    }
}

impl From<io::Error> for IlbmError {
    fn from(error: io::Error) -> Self {
        IlbmError::IoError(error)
    }
}

// Result type alias for decoder operations
pub type IlbmResult<T> = Result<T, IlbmError>;
