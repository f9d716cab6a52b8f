use futures::{SinkExt, StreamExt};
use std::{pin::Pin, time::Duration};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::Decoder;

use crate::proto::codec::LineCodec;
use crate::proto::command::Command;
use crate::proto::{DeviceError, Result};

trait AsyncReadWrite<S>: futures::Sink<S> + futures::Stream + Send {}

impl<T, S> AsyncReadWrite<S> for T where T: futures::Sink<S> + futures::Stream + Send {}

/// Serial link to the balance.
///
/// Owns the framed port exclusively. [`Device::poll`] is the only read
/// primitive and never blocks longer than its timeout.
#[allow(clippy::type_complexity)]
pub struct Device {
    stream: Pin<
        Box<
            dyn AsyncReadWrite<
                Command,
                Error = std::io::Error,
                Item = std::result::Result<String, std::io::Error>,
            >,
        >,
    >,
    open: bool,
}

impl Device {
    pub fn new(com: impl AsRef<str>, baudrate: u32) -> Result<Self> {
        let mut port = tokio_serial::new(com.as_ref(), baudrate).open_native_async()?;

        #[cfg(unix)]
        port.set_exclusive(false)
            .expect("Unable to set serial port exclusive to false");

        let stream = LineCodec::default().framed(port);

        Ok(Self {
            stream: Box::pin(stream),
            open: true,
        })
    }

    /// Faked device that replays `data` and then reports a closed link.
    #[cfg(test)]
    pub fn new_faked(data: Vec<u8>) -> Self {
        let stream = LineCodec::default().framed(crate::proto::fake::FakeBuffer::new(data));

        Self {
            stream: Box::pin(stream),
            open: true,
        }
    }

    /// Faked device that replays `data` and then stays silent, like a
    /// balance that stopped transmitting.
    #[cfg(test)]
    pub fn new_faked_silent(data: Vec<u8>) -> Self {
        let stream = LineCodec::default().framed(crate::proto::fake::FakeBuffer::silent(data));

        Self {
            stream: Box::pin(stream),
            open: true,
        }
    }

    /// Send one read-out command and wait for the reply frame.
    ///
    /// `Ok(None)` means the balance stayed silent for `timeout`; the
    /// caller decides whether to poll again. I/O failures and a closed
    /// stream are fatal, there is no retry at this layer.
    pub async fn poll(&mut self, command: Command, timeout: Duration) -> Result<Option<String>> {
        if let Err(ioerr) = self.stream.send(command).await {
            self.open = false;
            return Err(ioerr.into());
        }
        match tokio::time::timeout(timeout, self.stream.next()).await {
            Err(_elapsed) => Ok(None),
            Ok(Some(Ok(frame))) => Ok(Some(frame)),
            Ok(Some(Err(ioerr))) => {
                self.open = false;
                Err(ioerr.into())
            }
            Ok(None) => {
                self.open = false;
                Err(DeviceError::Abort)
            }
        }
    }

    /// Whether the link has seen a fatal failure yet.
    pub fn is_open(&self) -> bool {
        self.open
    }
}
