use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no bus configured on pin {0}")]
    BusNotFound(u8),
    #[error("bus handle is already borrowed")]
    Busy,
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("device {0} did not respond")]
    NotPresent(String),
    #[error("CRC mismatch reading {0}")]
    Crc(String),
    #[error("invalid reading: {0}")]
    InvalidReading(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}
