//! CSV persistence for one sequencer run.
//!
//! - `<dir>/<run>_RAW.csv`: one row per poll, created fresh for the run.
//! - `<dir>/FILE_MAIN.csv`: one row per repetition, appended across runs.
//!   The header is written only when the file is created.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::WrapErr;
use fan_core::{FanError, RecordSink, RunRecord, SampleRecord};

pub const RAW_HEADER: [&str; 6] = [
    "TIMESTAMP",
    "PHASE",
    "REPETITION",
    "DURATION_MIN",
    "PWM_PCT",
    "RPM",
];
pub const MAIN_HEADER: [&str; 7] = [
    "RUN",
    "PHASE",
    "REPETITION",
    "DURATION_MIN",
    "PWM_PCT",
    "AVG_RPM",
    "CANCELLED",
];
pub const MAIN_FILE: &str = "FILE_MAIN.csv";

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct CsvRecordSink {
    run_id: String,
    raw_path: PathBuf,
    raw: csv::Writer<File>,
    main: csv::Writer<File>,
}

impl CsvRecordSink {
    /// Create the run's raw file and open the summary file in `dir`.
    pub fn create(dir: &Path) -> eyre::Result<Self> {
        fs::create_dir_all(dir).wrap_err_with(|| format!("create output dir {dir:?}"))?;
        let (run_id, raw_file, raw_path) = create_raw_file(dir, unix_now())?;

        let main_path = dir.join(MAIN_FILE);
        let main_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&main_path)
            .wrap_err_with(|| format!("open {main_path:?}"))?;
        let fresh = main_file
            .metadata()
            .map(|m| m.len() == 0)
            .wrap_err_with(|| format!("stat {main_path:?}"))?;

        let mut raw = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(raw_file);
        raw.write_record(RAW_HEADER)?;
        raw.flush()?;

        let mut main = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(main_file);
        if fresh {
            main.write_record(MAIN_HEADER)?;
            main.flush()?;
        }

        tracing::info!(run = %run_id, raw = ?raw_path, summary = ?main_path, "recording run");
        Ok(Self {
            run_id,
            raw_path,
            raw,
            main,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[cfg(test)]
    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    /// Flush both files. Also happens on drop, without error reporting.
    pub fn finish(mut self) -> eyre::Result<()> {
        self.raw.flush().wrap_err("flush raw csv")?;
        self.main.flush().wrap_err("flush summary csv")?;
        tracing::info!(run = %self.run_id, raw = ?self.raw_path, "run recorded");
        Ok(())
    }
}

/// `<ts>_RAW.csv`, or `<ts>-N_RAW.csv` when a run already claimed that second.
fn create_raw_file(dir: &Path, ts: u64) -> eyre::Result<(String, File, PathBuf)> {
    for n in 1u32.. {
        let run_id = if n == 1 {
            ts.to_string()
        } else {
            format!("{ts}-{n}")
        };
        let path = dir.join(format!("{run_id}_RAW.csv"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => return Ok((run_id, f, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e).wrap_err_with(|| format!("create {path:?}")),
        }
    }
    eyre::bail!("no free raw file name in {dir:?}")
}

fn record_err(e: impl std::fmt::Display) -> eyre::Report {
    eyre::Report::new(FanError::Record(e.to_string()))
}

impl RecordSink for CsvRecordSink {
    fn sample(&mut self, rec: &SampleRecord) -> fan_core::Result<()> {
        self.raw
            .write_record([
                unix_now().to_string(),
                (rec.phase_index + 1).to_string(),
                (rec.repetition_index + 1).to_string(),
                rec.duration_minutes.to_string(),
                rec.duty_percent.to_string(),
                format!("{:.1}", rec.rpm),
            ])
            .map_err(record_err)?;
        self.raw.flush().map_err(record_err)?;
        Ok(())
    }

    fn run(&mut self, rec: &RunRecord) -> fan_core::Result<()> {
        self.main
            .write_record([
                self.run_id.clone(),
                (rec.phase_index + 1).to_string(),
                (rec.repetition_index + 1).to_string(),
                rec.duration_minutes.to_string(),
                rec.duty_percent.to_string(),
                format!("{:.0}", rec.avg_rpm.round()),
                rec.cancelled.to_string(),
            ])
            .map_err(record_err)?;
        self.main.flush().map_err(record_err)?;
        Ok(())
    }
}

impl Drop for CsvRecordSink {
    fn drop(&mut self) {
        if let Err(e) = self.raw.flush().and(self.main.flush()) {
            tracing::warn!(error = %e, "flush on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(rpm: f64) -> SampleRecord {
        SampleRecord {
            phase_index: 0,
            repetition_index: 1,
            duration_minutes: 5,
            duty_percent: 40,
            elapsed: Duration::from_secs(40),
            rpm,
            settled: true,
        }
    }

    #[test]
    fn writes_raw_rows_and_appends_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvRecordSink::create(dir.path()).unwrap();
        sink.sample(&sample(1499.5)).unwrap();
        sink.run(&RunRecord {
            phase_index: 0,
            repetition_index: 1,
            duration_minutes: 5,
            duty_percent: 40,
            avg_rpm: 1499.6,
            cancelled: false,
        })
        .unwrap();
        let raw_path = sink.raw_path().to_path_buf();
        let run_id = sink.run_id().to_string();
        sink.finish().unwrap();

        let raw = fs::read_to_string(&raw_path).unwrap();
        let mut lines = raw.lines();
        assert_eq!(
            lines.next(),
            Some("TIMESTAMP,PHASE,REPETITION,DURATION_MIN,PWM_PCT,RPM")
        );
        assert!(lines.next().unwrap().ends_with(",1,2,5,40,1499.5"));

        // A second run in the same directory appends without a second header.
        let second = CsvRecordSink::create(dir.path()).unwrap();
        assert_ne!(second.run_id(), run_id);
        second.finish().unwrap();
        let main = fs::read_to_string(dir.path().join(MAIN_FILE)).unwrap();
        assert_eq!(
            main,
            format!(
                "RUN,PHASE,REPETITION,DURATION_MIN,PWM_PCT,AVG_RPM,CANCELLED\n{run_id},1,2,5,40,1500,false\n"
            )
        );
    }
}
