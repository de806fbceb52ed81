//! Masked, reorderable CSV emission for one output table.
//!
//! [`CsvSink`] owns the column policy for a single table write:
//!
//! - **Usage tracking**: an optional column only appears in the output if at
//!   least one row carries a non-empty value for it; columns declared
//!   required are always kept. Usage is monotonic for the lifetime of the
//!   sink and is never reset.
//! - **Reordering**: a caller-supplied preference list places explicitly
//!   named columns first (in preference order); remaining used columns keep
//!   their original relative order. Omission still applies to reordered
//!   columns.
//! - **Two operating modes**: *buffered* ([`push_row`](CsvSink::push_row) +
//!   [`flush`](CsvSink::flush)), where the sink collects rows, derives usage
//!   and writes everything at the end; and *streaming*
//!   ([`record_usage`](CsvSink::record_usage) over a first pass, then
//!   [`write_header`](CsvSink::write_header) +
//!   [`write_raw`](CsvSink::write_raw)), where rows are written immediately
//!   and never retained. Streaming keeps memory bounded for tables with
//!   millions of rows.
//!
//! The header and every row go through the same projection, so cell
//! positions always line up with the header exactly.

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::io::Write;

/// CSV writer for one table with data-driven column omission.
///
/// Create one sink per output table; it is not reusable across tables.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    used: Vec<bool>,
    order: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
    // Output position -> schema position, fixed once the header is written.
    projection: Option<Vec<usize>>,
}

impl<W: Write> CsvSink<W> {
    /// Wrap an output stream in a new sink.
    pub fn new(out: W) -> Self {
        CsvSink {
            writer: csv::WriterBuilder::new().from_writer(out),
            columns: Vec::new(),
            index: HashMap::new(),
            used: Vec::new(),
            order: HashMap::new(),
            rows: Vec::new(),
            projection: None,
        }
    }

    /// Declare the full candidate column list and the subset that may never
    /// be omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if a required name is not a member of `columns`;
    /// a required column the schema does not know about is a configuration
    /// bug, not something to ignore.
    pub fn set_schema(&mut self, columns: Vec<String>, required: &[&str]) -> Result<()> {
        self.used = vec![false; columns.len()];
        self.index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        self.columns = columns;

        for req in required {
            match self.index.get(*req) {
                Some(&i) => self.used[i] = true,
                None => bail!("required column {req} is not part of the schema"),
            }
        }
        Ok(())
    }

    /// Set a preferred output order. Names not in the schema are skipped;
    /// the rest get consecutive ranks in preference order.
    ///
    /// Only meaningful before the header has been written.
    pub fn set_order(&mut self, preferred: &[String]) {
        let mut rank = 0;
        for name in preferred {
            if self.index.contains_key(name) {
                self.order.insert(name.clone(), rank);
                rank += 1;
            }
        }
    }

    /// Mark every column with a non-empty cell in `row` as used.
    pub fn record_usage(&mut self, row: &[String]) {
        for (i, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                self.used[i] = true;
            }
        }
    }

    /// Buffer one row for a later [`flush`](CsvSink::flush), updating usage.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.record_usage(&row);
        self.rows.push(row);
    }

    /// Stable-sort the buffered rows lexicographically on their first
    /// `depth` cells. Rows that tie keep their original relative order.
    pub fn sort_by_prefix(&mut self, depth: usize) {
        self.rows.sort_by(|a, b| {
            let a = &a[..depth.min(a.len())];
            let b = &b[..depth.min(b.len())];
            a.cmp(b)
        });
    }

    /// Finalize the projection from the current usage vector and write the
    /// masked, reordered header. Subsequent usage changes have no effect.
    pub fn write_header(&mut self) -> Result<()> {
        if self.projection.is_some() {
            return Ok(());
        }
        let projection = self.build_projection();
        let header: Vec<&str> = projection
            .iter()
            .map(|&i| self.columns[i].as_str())
            .collect();
        self.writer.write_record(&header)?;
        self.projection = Some(projection);
        Ok(())
    }

    /// Write one row immediately through the finalized projection.
    ///
    /// Streaming contract: the caller must have finalized usage (a full
    /// usage-recording pass) and written the header first; rows written
    /// before that would be masked against an incomplete usage vector.
    pub fn write_raw(&mut self, row: Vec<String>) -> Result<()> {
        debug_assert!(
            self.projection.is_some(),
            "write_raw called before write_header"
        );
        let masked = self.mask(row);
        self.writer.write_record(&masked)?;
        Ok(())
    }

    /// Write the header and any buffered rows, then flush the underlying
    /// stream and release the buffer.
    ///
    /// In streaming mode the header and rows are already on the wire, so
    /// this only flushes.
    pub fn flush(&mut self) -> Result<()> {
        self.write_header()?;
        for row in std::mem::take(&mut self.rows) {
            let masked = self.mask(row);
            self.writer.write_record(&masked)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and unwrap the underlying stream.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("unwrap csv writer: {e}"))
    }

    /// Compute output positions: used columns only, explicitly ranked ones
    /// first, the rest in original relative order.
    fn build_projection(&self) -> Vec<usize> {
        let mut ranked: Vec<usize> = Vec::new();
        let mut rest: Vec<usize> = Vec::new();
        for (i, col) in self.columns.iter().enumerate() {
            if !self.used[i] {
                continue;
            }
            if self.order.contains_key(col) {
                ranked.push(i);
            } else {
                rest.push(i);
            }
        }
        ranked.sort_by_key(|&i| self.order[&self.columns[i]]);
        ranked.extend(rest);
        ranked
    }

    fn mask(&self, mut row: Vec<String>) -> Vec<String> {
        let projection = self.projection.as_ref().expect("projection finalized");
        projection
            .iter()
            .map(|&i| std::mem::take(&mut row[i]))
            .collect()
    }
}
