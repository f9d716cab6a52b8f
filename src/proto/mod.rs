pub mod codec;
pub mod command;

#[cfg(test)]
pub(crate) mod fake;

use thiserror::Error;

/// Fatal failures of the serial link.
///
/// A silent balance is not listed here: timeouts are an expected idle
/// state and are reported as `Ok(None)` by [`crate::Device::poll`].
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The framed stream ended, the link to the balance is gone.
    #[error("connection to the balance was lost")]
    Abort,
}

pub type Result<T> = std::result::Result<T, DeviceError>;
