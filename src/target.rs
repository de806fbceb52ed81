//! Output destinations: a directory of loose `.txt` files or a single zip
//! archive.
//!
//! The destination kind is decided once, from the path: an existing
//! directory gets loose files, anything else becomes a zip archive created
//! at that path. Exactly one table stream is open at a time; the sequencer
//! acquires a [`TableStream`] per table and drops it before starting the
//! next, so a failed run never leaves a dangling file handle.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

/// Deflate setting for archive output. Ignored in directory mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    /// Deflate with the library default level.
    Default,
    /// Store entries uncompressed.
    None,
    /// Deflate with an explicit level, 1 (fastest) to 9 (best).
    Level(u32),
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Default
    }
}

impl Compression {
    fn file_options(self) -> Result<FileOptions> {
        let options = FileOptions::default();
        Ok(match self {
            Compression::Default => options.compression_method(CompressionMethod::Deflated),
            Compression::None => options.compression_method(CompressionMethod::Stored),
            Compression::Level(level) => {
                if !(1..=9).contains(&level) {
                    bail!("compression level {level} out of range 1-9");
                }
                options
                    .compression_method(CompressionMethod::Deflated)
                    .compression_level(Some(level as i32))
            }
        })
    }
}

/// One feed write destination.
pub enum WriteTarget {
    Dir(PathBuf),
    Archive {
        zip: ZipWriter<BufWriter<File>>,
        options: FileOptions,
    },
}

impl WriteTarget {
    /// Open a destination. An existing directory receives loose files;
    /// any other path becomes a zip archive (created or truncated here).
    ///
    /// # Errors
    ///
    /// Fails when the archive file cannot be created or the compression
    /// level is out of range.
    pub fn open(path: &Path, compression: Compression) -> Result<Self> {
        if path.is_dir() {
            return Ok(WriteTarget::Dir(path.to_path_buf()));
        }
        let file =
            File::create(path).with_context(|| format!("create archive {}", path.display()))?;
        Ok(WriteTarget::Archive {
            zip: ZipWriter::new(BufWriter::new(file)),
            options: compression.file_options()?,
        })
    }

    /// Begin one table, returning its output stream.
    pub fn start_table(&mut self, name: &str) -> Result<TableStream<'_>> {
        match self {
            WriteTarget::Dir(dir) => {
                let path = dir.join(name);
                let file =
                    File::create(&path).with_context(|| format!("create {}", path.display()))?;
                Ok(TableStream::File(BufWriter::new(file)))
            }
            WriteTarget::Archive { zip, options } => {
                zip.start_file(name, *options)
                    .with_context(|| format!("start archive entry {name}"))?;
                Ok(TableStream::Archive(zip))
            }
        }
    }

    /// Remove a leftover file from an earlier run. Archives start empty, so
    /// this only applies in directory mode.
    pub fn remove_stale(&mut self, name: &str) -> Result<()> {
        if let WriteTarget::Dir(dir) = self {
            let path = dir.join(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("remove stale {}", path.display()))?;
            }
        }
        Ok(())
    }

    /// Finalize the destination. Archives get their central directory
    /// written here; directory mode has nothing left to do.
    pub fn finish(self) -> Result<()> {
        if let WriteTarget::Archive { mut zip, .. } = self {
            let mut inner = zip.finish().context("finalize archive")?;
            inner.flush().context("flush archive")?;
        }
        Ok(())
    }
}

/// The output stream for one table, closed when dropped.
pub enum TableStream<'a> {
    File(BufWriter<File>),
    Archive(&'a mut ZipWriter<BufWriter<File>>),
}

impl Write for TableStream<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            TableStream::File(w) => w.write(buf),
            TableStream::Archive(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            TableStream::File(w) => w.flush(),
            TableStream::Archive(w) => w.flush(),
        }
    }
}
