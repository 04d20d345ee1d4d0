use std::io;
use std::time::Duration;
use thiserror::Error;

pub type LinkResult<T> = Result<T, LinkError>;

// Failures of the underlying byte channels. These are the only conditions that
// abort an exchange; everything else is a `Fault` recorded on the outcome.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Serial Error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("Error {0}: Caused by: ({1})")]
    Chain(String, #[source] Box<LinkError>),
}

impl LinkError {
    pub fn chain(self, message: impl Into<String>) -> Self {
        LinkError::Chain(message.into(), Box::new(self))
    }
}

// Non-fatal conditions handled by local policy (truncate, ignore, skip).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("frame filled the {capacity} byte buffer and was truncated")]
    BufferOverflow { capacity: usize },
    #[error("nothing captured within {0:?}")]
    Timeout(Duration),
    #[error("fill-wait exchange reached its {0:?} ceiling")]
    UnboundedWait(Duration),
    #[error("decoder reported no valid location")]
    InvalidFix,
}
