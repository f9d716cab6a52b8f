use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::device::Device;
use crate::logbook::{LogRecord, Logbook};
use crate::proto::command::Command;
use crate::proto::DeviceError;
use crate::reading::Reading;

/// Live view of a running session, published for the control surface.
#[derive(Debug, Clone, Default)]
pub struct Status {
    /// Seconds since acquisition start.
    pub elapsed: f64,
    /// Last successfully parsed reading.
    pub last: Option<Reading>,
    pub records: u64,
    pub dropped: u64,
    pub connected: bool,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self
            .last
            .as_ref()
            .map_or_else(|| "-".to_string(), Reading::to_string);
        let link = if self.connected { "online" } else { "offline" };
        write!(
            f,
            "{:8.3}  {:<16} [{} logged, {} dropped, {}]",
            self.elapsed, last, self.records, self.dropped, link
        )
    }
}

/// Totals of one completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub records: u64,
    pub dropped: u64,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("writing the log failed: {0}")]
    Log(#[from] csv::Error),
}

/// One acquisition run.
///
/// Exclusive owner of the serial link and the log sink from start until
/// stop or a fatal link failure; the control surface only ever touches
/// the stop flag and the status channel.
pub struct Session {
    device: Device,
    logbook: Logbook,
    command: Command,
    timeout: Duration,
    stop: watch::Receiver<bool>,
    status: watch::Sender<Status>,
    dropped: u64,
}

impl Session {
    pub fn new(
        device: Device,
        logbook: Logbook,
        command: Command,
        timeout: Duration,
        stop: watch::Receiver<bool>,
        status: watch::Sender<Status>,
    ) -> Self {
        Self {
            device,
            logbook,
            command,
            timeout,
            stop,
            status,
            dropped: 0,
        }
    }

    /// Poll, parse and append until the stop flag is raised or the link
    /// fails.
    ///
    /// The stop flag is re-checked once per iteration, so a pending poll
    /// unblocks at its timeout boundary and shutdown latency stays
    /// within one timeout plus one append. A frame that does not parse
    /// is counted and skipped; the balance paces the loop, a silent
    /// interval produces nothing at all.
    pub async fn run(mut self) -> Result<Summary, RunError> {
        let started = Instant::now();
        self.publish(0.0, None);

        let result = loop {
            if *self.stop.borrow() {
                break Ok(());
            }
            match self.device.poll(self.command, self.timeout).await {
                // Balance is silent, not an error.
                Ok(None) => continue,
                Ok(Some(frame)) => {
                    // Timestamp before parsing, so processing time does
                    // not skew the logged time.
                    let elapsed = started.elapsed().as_secs_f64();
                    match Reading::parse(&frame) {
                        Ok(reading) => {
                            self.logbook.append(&LogRecord::new(elapsed, &reading))?;
                            self.publish(elapsed, Some(reading));
                        }
                        Err(err) => {
                            self.dropped += 1;
                            warn!(%err, ?frame, "dropped frame");
                            self.publish(elapsed, None);
                        }
                    }
                }
                Err(err) => {
                    self.publish(started.elapsed().as_secs_f64(), None);
                    break Err(err);
                }
            }
        };

        let summary = Summary {
            records: self.logbook.records(),
            dropped: self.dropped,
        };
        result?;
        Ok(summary)
    }

    fn publish(&self, elapsed: f64, reading: Option<Reading>) {
        self.status.send_modify(|status| {
            status.elapsed = elapsed;
            if let Some(reading) = reading {
                status.last = Some(reading);
            }
            status.records = self.logbook.records();
            status.dropped = self.dropped;
            status.connected = self.device.is_open();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> (
        watch::Sender<bool>,
        watch::Receiver<bool>,
        watch::Sender<Status>,
        watch::Receiver<Status>,
    ) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(Status::default());
        (stop_tx, stop_rx, status_tx, status_rx)
    }

    #[tokio::test]
    async fn frames_are_logged_in_order_and_bad_frames_only_counted() {
        let dir = tempfile::tempdir().expect("no tempdir");
        let path = dir.path().join("run.txt");
        let (_stop_tx, stop_rx, status_tx, status_rx) = channels();

        let device = Device::new_faked(b"12.345 g\r---\r8.02\r".to_vec());
        let logbook = Logbook::create(&path).expect("create failed");
        let session = Session::new(
            device,
            logbook,
            Command::Weight,
            Duration::from_millis(100),
            stop_rx,
            status_tx,
        );

        // The faked stream closes after the last frame, which ends the
        // run with a link failure.
        let err = session.run().await.expect_err("run should fail");
        assert!(matches!(err, RunError::Device(DeviceError::Abort)));

        let contents = std::fs::read_to_string(&path).expect("log not readable");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time [sec]\tweight\tunit");
        assert!(lines[1].ends_with("\t12.345\tg"));
        assert!(lines[2].ends_with("\t8.02\t"));

        let t1: f64 = lines[1].split('\t').next().expect("no field").parse().expect("no time");
        let t2: f64 = lines[2].split('\t').next().expect("no field").parse().expect("no time");
        assert!(t1 <= t2);

        let status = status_rx.borrow();
        assert_eq!(status.records, 2);
        assert_eq!(status.dropped, 1);
        assert!(!status.connected);
    }

    #[tokio::test]
    async fn stop_flag_ends_the_run_cleanly() {
        let dir = tempfile::tempdir().expect("no tempdir");
        let (stop_tx, stop_rx, status_tx, _status_rx) = channels();
        stop_tx.send(true).expect("send failed");

        let device = Device::new_faked_silent(Vec::new());
        let logbook = Logbook::create(dir.path().join("run.txt")).expect("create failed");
        let session = Session::new(
            device,
            logbook,
            Command::Weight,
            Duration::from_millis(10),
            stop_rx,
            status_tx,
        );

        let summary = session.run().await.expect("run failed");
        assert_eq!(
            summary,
            Summary {
                records: 0,
                dropped: 0,
            }
        );
    }

    #[tokio::test]
    async fn timeouts_produce_no_records_and_no_drops() {
        let dir = tempfile::tempdir().expect("no tempdir");
        let path = dir.path().join("run.txt");
        let (stop_tx, stop_rx, status_tx, _status_rx) = channels();

        // One valid frame, then silence: the loop keeps polling into
        // timeouts until stopped.
        let device = Device::new_faked_silent(b"5.00 g\r".to_vec());
        let logbook = Logbook::create(&path).expect("create failed");
        let session = Session::new(
            device,
            logbook,
            Command::Weight,
            Duration::from_millis(10),
            stop_rx,
            status_tx,
        );

        let task = tokio::spawn(session.run());
        tokio::time::sleep(Duration::from_millis(60)).await;
        stop_tx.send(true).expect("send failed");

        let summary = task
            .await
            .expect("task panicked")
            .expect("run failed");
        assert_eq!(
            summary,
            Summary {
                records: 1,
                dropped: 0,
            }
        );
    }

    #[tokio::test]
    async fn link_failure_preserves_previously_appended_records() {
        let dir = tempfile::tempdir().expect("no tempdir");
        let path = dir.path().join("run.txt");
        let (_stop_tx, stop_rx, status_tx, _status_rx) = channels();

        let device = Device::new_faked(b"1.0 g\r2.0 g\r".to_vec());
        let logbook = Logbook::create(&path).expect("create failed");
        let session = Session::new(
            device,
            logbook,
            Command::Weight,
            Duration::from_millis(100),
            stop_rx,
            status_tx,
        );
        session.run().await.expect_err("run should fail");

        let contents = std::fs::read_to_string(&path).expect("log not readable");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("\t1.0\tg"));
        assert!(lines[2].ends_with("\t2.0\tg"));
    }
}
