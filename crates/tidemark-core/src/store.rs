//! Flat-file storage engine.
//!
//! Minimal default implementation of the engine capabilities: each device
//! directory holds an append-only `samples.csv` with one record per line
//! (`<rfc3339>,<v0>,<v1>,...`), already in timestamp order because the write
//! path only ever appends non-decreasing timestamps.
//!
//! Reads scan the file lazily through a buffered reader; the file handle
//! lives inside the returned iterator and is closed when the iterator is
//! dropped, however far the consumer got.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::engine::{EngineError, EngineResult, ReadHandle, SampleIter, StorageEngine, WriteHandle};
use crate::sample::Sample;

/// Per-device sample log filename.
pub const SAMPLES_FILENAME: &str = "samples.csv";

/// Storage engine keeping one append-only record file per device directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatFileEngine;

impl StorageEngine for FlatFileEngine {
    fn reader(&self, device_dir: &Path) -> EngineResult<Box<dyn ReadHandle>> {
        Ok(Box::new(FlatFileReader {
            path: device_dir.join(SAMPLES_FILENAME),
        }))
    }

    fn writer(&self, device_dir: &Path) -> EngineResult<Box<dyn WriteHandle>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(device_dir.join(SAMPLES_FILENAME))?;

        Ok(Box::new(FlatFileWriter {
            out: BufWriter::new(file),
            last: None,
        }))
    }
}

struct FlatFileReader {
    path: PathBuf,
}

impl ReadHandle for FlatFileReader {
    fn query_interval(
        self: Box<Self>,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        step: Option<u32>,
    ) -> EngineResult<SampleIter> {
        // A device that has never been written to has no log yet; that is an
        // empty result, not an error.
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty()));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Box::new(IntervalScan {
            lines: BufReader::new(file).lines(),
            start,
            stop,
            step: step.unwrap_or(1).max(1) as usize,
            seen: 0,
        }))
    }
}

/// Lazy scan over a sample log, filtered to `[start, stop)` and decimated.
struct IntervalScan {
    lines: Lines<BufReader<File>>,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    step: usize,
    /// Samples of the interval seen so far; the stride keeps every
    /// `step`-th one.
    seen: usize,
}

impl Iterator for IntervalScan {
    type Item = EngineResult<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };

            let sample = match Sample::parse_record(&line) {
                Ok(sample) => sample,
                Err(err) => return Some(Err(err)),
            };

            if sample.timestamp < self.start {
                continue;
            }
            if sample.timestamp >= self.stop {
                // Records are time-ordered; nothing further can match.
                return None;
            }

            let keep = self.seen % self.step == 0;
            self.seen += 1;
            if keep {
                return Some(Ok(sample));
            }
        }
    }
}

struct FlatFileWriter {
    out: BufWriter<File>,
    last: Option<DateTime<Utc>>,
}

impl WriteHandle for FlatFileWriter {
    fn append(&mut self, timestamp: DateTime<Utc>, values: &[f64]) -> EngineResult<()> {
        if let Some(last) = self.last {
            if timestamp < last {
                return Err(EngineError::OutOfOrder);
            }
        }

        let record = Sample::new(timestamp, values.to_vec()).to_record();
        writeln!(self.out, "{record}")?;
        self.last = Some(timestamp);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> EngineResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, min, 0).unwrap()
    }

    fn write_samples(dir: &Path, minutes: &[u32]) {
        let engine = FlatFileEngine;
        let mut writer = engine.writer(dir).unwrap();
        for &minute in minutes {
            writer.append(ts(minute), &[minute as f64, -1.0]).unwrap();
        }
        writer.finish().unwrap();
    }

    fn collect(dir: &Path, start: u32, stop: u32, step: Option<u32>) -> Vec<Sample> {
        let engine = FlatFileEngine;
        let reader = engine.reader(dir).unwrap();
        reader
            .query_interval(ts(start), ts(stop), step)
            .unwrap()
            .collect::<EngineResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn query_respects_interval_bounds() {
        let dir = TempDir::new().unwrap();
        write_samples(dir.path(), &[0, 10, 20, 30, 40]);

        // Half-open: start inclusive, stop exclusive.
        let samples = collect(dir.path(), 10, 30, None);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].timestamp, ts(10));
        assert_eq!(samples[1].timestamp, ts(20));
    }

    #[test]
    fn query_is_time_ordered() {
        let dir = TempDir::new().unwrap();
        write_samples(dir.path(), &[0, 5, 10, 15]);

        let samples = collect(dir.path(), 0, 59, None);
        let timestamps: Vec<_> = samples.iter().map(|s| s.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn step_decimates() {
        let dir = TempDir::new().unwrap();
        write_samples(dir.path(), &[0, 1, 2, 3, 4, 5]);

        let samples = collect(dir.path(), 0, 59, Some(2));
        let minutes: Vec<_> = samples.iter().map(|s| s.values[0] as u32).collect();
        assert_eq!(minutes, vec![0, 2, 4]);
    }

    #[test]
    fn unwritten_device_queries_empty() {
        let dir = TempDir::new().unwrap();
        let samples = collect(dir.path(), 0, 59, None);
        assert!(samples.is_empty());
    }

    #[test]
    fn appends_accumulate_across_handles() {
        let dir = TempDir::new().unwrap();
        write_samples(dir.path(), &[0, 1]);
        write_samples(dir.path(), &[2, 3]);

        let samples = collect(dir.path(), 0, 59, None);
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn out_of_order_append_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = FlatFileEngine;
        let mut writer = engine.writer(dir.path()).unwrap();
        writer.append(ts(10), &[1.0]).unwrap();

        let err = writer.append(ts(5), &[2.0]).unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrder));

        // Equal timestamps are non-decreasing and pass through.
        writer.append(ts(10), &[3.0]).unwrap();
    }

    #[test]
    fn corrupt_record_surfaces_mid_scan() {
        let dir = TempDir::new().unwrap();
        write_samples(dir.path(), &[0]);
        std::fs::write(
            dir.path().join(SAMPLES_FILENAME),
            "2021-01-01T00:00:00+00:00,1.0\ngarbage\n",
        )
        .unwrap();

        let engine = FlatFileEngine;
        let reader = engine.reader(dir.path()).unwrap();
        let results: Vec<_> = reader.query_interval(ts(0), ts(59), None).unwrap().collect();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(EngineError::Corrupt(_))));
    }
}
