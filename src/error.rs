use std::path::PathBuf;

/// All ways loading, instantiating or driving an artifact can fail.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read artifact `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid module: {0}")]
    InvalidModule(#[source] wasmi::Error),
    #[error("instantiation failed: {0}")]
    Instantiate(#[source] wasmi::Error),
    #[error("undefined export: {0}")]
    UndefinedExport(String),
    #[error("call trapped: {0}")]
    Call(#[source] wasmi::Error),
    #[error("memory operation failed: {0}")]
    Memory(wasmi::errors::MemoryError),
    #[error("linear memory no longer fits a 32-bit address")]
    AddressSpaceExhausted,
}

impl Error {
    /// File-read failure while loading `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

// wasmi's `MemoryError` implements Display but not `std::error::Error`,
// so the conversion is written out instead of derived.
impl From<wasmi::errors::MemoryError> for Error {
    fn from(err: wasmi::errors::MemoryError) -> Self {
        Error::Memory(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
