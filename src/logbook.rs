use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

use crate::reading::Reading;

/// One line of the output log.
///
/// `unit` is the empty string while the balance withholds it (unstable
/// readout), keeping the column count fixed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Seconds since acquisition start.
    pub time: f64,
    pub value: f64,
    pub unit: String,
}

impl LogRecord {
    pub fn new(time: f64, reading: &Reading) -> Self {
        Self {
            // Millisecond resolution, matching the cadence of the
            // balance's transmissions.
            time: (time * 1000.0).round() / 1000.0,
            value: reading.value,
            unit: reading.unit.clone().unwrap_or_default(),
        }
    }
}

const HEADER: [&str; 3] = ["time [sec]", "weight", "unit"];

/// Append-only record sink.
///
/// Every record is flushed individually; an aborted run loses at most
/// the record being written. Records leave in arrival order, there is no
/// batching.
pub struct Logbook {
    writer: csv::Writer<File>,
    records: u64,
}

impl Logbook {
    /// Open `path` in append mode, creating parent directories and the
    /// file as needed. The header line is only written into a fresh
    /// (empty) file, so restarted runs accumulate records below the
    /// existing ones.
    pub fn create(path: impl AsRef<Path>) -> csv::Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        let fresh = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        Ok(Self { writer, records: 0 })
    }

    /// Append one record and flush it to disk.
    pub fn append(&mut self, record: &LogRecord) -> csv::Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    /// Records appended during this run.
    pub fn records(&self) -> u64 {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stable(value: f64, unit: &str) -> Reading {
        Reading {
            value,
            unit: Some(unit.to_string()),
            stable: true,
        }
    }

    fn unstable(value: f64) -> Reading {
        Reading {
            value,
            unit: None,
            stable: false,
        }
    }

    #[test]
    fn records_are_tab_delimited_with_empty_unit_column() {
        let dir = tempfile::tempdir().expect("no tempdir");
        let path = dir.path().join("run.txt");

        let mut logbook = Logbook::create(&path).expect("create failed");
        logbook
            .append(&LogRecord::new(0.1234, &stable(12.345, "g")))
            .expect("append failed");
        logbook
            .append(&LogRecord::new(0.9, &unstable(8.02)))
            .expect("append failed");
        assert_eq!(logbook.records(), 2);

        // Read back while the writer is still alive: each record must
        // already be on disk.
        let contents = fs::read_to_string(&path).expect("log not readable");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec!["time [sec]\tweight\tunit", "0.123\t12.345\tg", "0.9\t8.02\t"]
        );
    }

    #[test]
    fn reopening_appends_after_existing_records() {
        let dir = tempfile::tempdir().expect("no tempdir");
        let path = dir.path().join("run.txt");

        let mut logbook = Logbook::create(&path).expect("create failed");
        logbook
            .append(&LogRecord::new(1.0, &stable(1.0, "g")))
            .expect("append failed");
        drop(logbook);

        let mut logbook = Logbook::create(&path).expect("re-create failed");
        logbook
            .append(&LogRecord::new(2.0, &stable(2.0, "g")))
            .expect("append failed");

        let contents = fs::read_to_string(&path).expect("log not readable");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec!["time [sec]\tweight\tunit", "1.0\t1.0\tg", "2.0\t2.0\tg"]
        );
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempfile::tempdir().expect("no tempdir");
        let path = dir.path().join("logs").join("run.txt");
        Logbook::create(&path).expect("create failed");
        assert!(path.exists());
    }
}
