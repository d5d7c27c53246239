//! Dry-run CSV report: one row per object with the tags a real run would touch.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use omerotag_core::Result;

use crate::evaluate::TagDecision;

const HEADER: [&str; 3] = ["Slide Name", "True Tags", "False Tags"];

pub struct DryRunReport {
    writer: csv::Writer<Box<dyn Write + Send>>,
    rows: usize,
}

impl DryRunReport {
    /// Open `path` for appending. A header row is written on every open.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        tracing::info!("Writing dry-run report to {}", path.as_ref().display());
        Self::new(Box::new(file))
    }

    pub fn new(sink: Box<dyn Write + Send>) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(HEADER).map_err(std::io::Error::from)?;
        Ok(Self { writer, rows: 0 })
    }

    /// Tag sets are joined with ", " in sorted order.
    pub fn record(&mut self, name: &str, decision: &TagDecision) -> Result<()> {
        let joined = |tags: &std::collections::BTreeSet<String>| {
            tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
        };
        self.writer
            .write_record([
                name,
                &joined(&decision.true_tags),
                &joined(&decision.false_tags),
            ])
            .map_err(std::io::Error::from)?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far, header excluded.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
