use std::fmt;

#[derive(Debug)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    InvalidArgument,
    Internal,
    InvalidState,
    /// No worker endpoint was available to route a write to.
    NoAliveWorker,
    /// A per-endpoint RPC failed during a broadcast operation.
    RpcFailure,
    /// Dialing a worker endpoint did not complete within the bound.
    DialTimeout,
    /// The service registry itself could not be reached or returned an error.
    RegistryFailure,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error { kind: ErrorKind::Io, context: err.to_string() }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error { kind: ErrorKind::Parse, context: err.to_string() }
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error { kind: ErrorKind::Io, context: format!("sled error: {}", err) }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
