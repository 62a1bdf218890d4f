//! Errors generated by the netlist tools.
use crate::Id;

/// Convenience wrapper to represent success or a meaningful tool error.
pub type BractResult<T> = std::result::Result<T, Error>;

/// Errors generated while building or transforming netlists.
#[derive(Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    post_msg: Option<String>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(post) = &self.post_msg {
            write!(f, "\n{}", post)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::MalformedStructure(msg.to_string())),
            post_msg: None,
        }
    }
    pub fn pass_assumption<S: ToString, M: ToString>(pass: S, msg: M) -> Self {
        Self {
            kind: Box::new(ErrorKind::PassAssumption(
                pass.to_string(),
                msg.to_string(),
            )),
            post_msg: None,
        }
    }
    pub fn undefined<S: ToString>(name: Id, typ: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::Undefined(name, typ.to_string())),
            post_msg: None,
        }
    }
    pub fn already_bound<S: ToString>(name: Id, typ: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::AlreadyBound(name, typ.to_string())),
            post_msg: None,
        }
    }
    pub fn parse_error<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::Parse),
            post_msg: Some(msg.to_string()),
        }
    }
    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::InvalidFile(msg.to_string())),
            post_msg: None,
        }
    }
    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::WriteError(msg.to_string())),
            post_msg: None,
        }
    }
    pub fn misc<S: ToString>(msg: S) -> Self {
        Self {
            kind: Box::new(ErrorKind::Misc(msg.to_string())),
            post_msg: None,
        }
    }
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Standard error type for bract errors.
#[derive(Clone)]
enum ErrorKind {
    /// The netlist structure is malformed.
    MalformedStructure(String),
    /// Requirement of a pass was not satisfied.
    PassAssumption(String, String),
    /// The name has not been bound.
    Undefined(Id, String),
    /// The name has already been bound.
    AlreadyBound(Id, String),
    /// Failed to parse the input netlist.
    Parse,
    /// The input file is invalid.
    InvalidFile(String),
    /// Failed to write the output.
    WriteError(String),
    /// Miscellaneous error message.
    Misc(String),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedStructure(msg) => {
                write!(f, "Malformed structure: {}", msg)
            }
            ErrorKind::PassAssumption(pass, msg) => {
                write!(f, "Pass `{}' assumption violated: {}", pass, msg)
            }
            ErrorKind::Undefined(name, typ) => {
                write!(f, "Undefined {} `{}'", typ, name)
            }
            ErrorKind::AlreadyBound(name, typ) => {
                write!(f, "{} `{}' is already bound", typ, name)
            }
            ErrorKind::Parse => write!(f, "Parse error"),
            ErrorKind::InvalidFile(msg) => write!(f, "{}", msg),
            ErrorKind::WriteError(msg) => write!(f, "{}", msg),
            ErrorKind::Misc(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::invalid_file(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::parse_error(e.to_string())
    }
}
