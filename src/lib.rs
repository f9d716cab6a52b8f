//!
//! This library logs weight readings from a Kern FCB bench balance over
//! the RS232 port.
//!
//! <br>
//!
//! # Details
//!
//! - The balance must be switched to remote read-out: baud rate
//!   (parameter `bAUd`) matching [`DEFAULT_BAUDRATE`] and data transfer
//!   mode (parameter `PR`) set to `rE CR`.
//!
//! - Basic setup and a single poll
//!
//!   ```no_run
//!   use fcblog::proto::command::Command;
//!   use fcblog::{Device, DEFAULT_BAUDRATE, DEFAULT_POLL_TIMEOUT};
//!   #[tokio::main]
//!   async fn main() -> fcblog::Result<()> {
//!       let mut device = Device::new("/dev/ttyUSB0", DEFAULT_BAUDRATE)?;
//!       if let Some(frame) = device.poll(Command::Weight, DEFAULT_POLL_TIMEOUT).await? {
//!           println!("Balance says: {frame}");
//!       }
//!       Ok(())
//!   }
//!   ```
//!
//! # Supported devices
//!
//!  * Kern FCB series (tested against the FCB 8K0.1)
//!  * any balance transmitting `value [unit]` lines, where the unit is
//!    omitted while the readout is unstable
//!

pub mod acquisition;
pub mod device;
pub mod logbook;
pub mod proto;
pub mod reading;

pub use device::Device;
pub use proto::Result;

use std::time::Duration;

#[cfg(unix)]
pub const DEFAULT_TTY: &str = "/dev/ttyUSB0";
#[cfg(windows)]
pub const DEFAULT_TTY: &str = "COM1";

/// Factory baudrate of the FCB RS232 port.
pub const DEFAULT_BAUDRATE: u32 = 19200;

/// Default poll timeout, tuned below the balance's inter-sample
/// interval so the loop follows the instrument's own cadence without
/// busy-spinning.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(500);
