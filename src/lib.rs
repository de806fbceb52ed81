//! # gtfs-writer
//!
//! A writer for [GTFS](https://gtfs.org) static feeds: it serializes an
//! in-memory [`Feed`] into the standard family of comma-separated `.txt`
//! tables, either as loose files in a directory or packed into a single zip
//! archive.
//!
//! ## Key behaviors
//!
//! - **Data-driven column omission**: an optional column appears in a
//!   table's header only if at least one row actually carries a value for
//!   it; required columns are always present. The schema of every output
//!   file is decided by the data, not by a fixed template.
//! - **Caller column orders**: a feed read from an existing file set can
//!   be written back with its original column order preserved.
//! - **Deterministic output**: sorted mode produces a stable total order
//!   per table, refining (never disturbing) within-trip and within-shape
//!   sequence order.
//! - **Bounded memory**: the two child-expanded tables (`shapes.txt`,
//!   `stop_times.txt`) stream row-by-row using a two-pass protocol that
//!   discovers column usage first and never buffers the table.
//! - **Extension columns**: arbitrary per-entity extra fields are carried
//!   through to the output next to the fixed schema.
//!
//! ## Quick start
//!
//! ```no_run
//! use gtfs_writer::{Agency, Feed, FeedWriter};
//! # fn main() -> anyhow::Result<()> {
//! let mut feed = Feed::new();
//! feed.agencies.push(Agency {
//!     id: "A1".into(),
//!     name: "Metro".into(),
//!     url: "https://metro.example".into(),
//!     timezone: "Europe/Berlin".into(),
//!     ..Agency::default()
//! });
//!
//! let writer = FeedWriter { sorted: true, ..FeedWriter::default() };
//! // An existing directory gets loose files; any other path becomes a
//! // zip archive.
//! writer.write(&feed, "feed.zip".as_ref())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! All fallible operations return [`anyhow::Result`]. A failure while a
//! table is being written aborts the remaining tables and carries the
//! offending table's file name in its context chain.

pub mod encode;
pub mod feed;
pub mod sink;
pub mod target;
pub mod writer;

pub use feed::{
    Agency, Attribution, ColumnOrders, ExtraFields, FareAttribute, FareRule, Feed, FeedInfo,
    Frequency, Level, Pathway, Route, Service, ServiceDate, Shape, ShapePoint, Stop, StopTime,
    Time, Transfer, Trip,
};
pub use sink::CsvSink;
pub use target::{Compression, WriteTarget};
pub use writer::FeedWriter;
