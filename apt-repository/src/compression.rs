//! Compression support for APT repository files.

use crate::{AptRepositoryError, Result};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Supported compression formats for APT repository files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Bzip2 compression.
    Bzip2,
}

impl Compression {
    /// Get the file extension for this compression format.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
        }
    }

    /// Wrap a writer in an encoder for this format at the default level.
    pub fn writer<W: Write>(self, writer: W) -> Encoder<W> {
        match self {
            Compression::None => Encoder::None(writer),
            Compression::Gzip => Encoder::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            )),
            Compression::Bzip2 => Encoder::Bzip2(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            )),
        }
    }

    /// Create a decompressor that implements Read.
    pub fn reader<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Compression::None => Box::new(reader),
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        }
    }

    /// Compress data using this compression format.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = self.writer(Vec::new());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    /// Decompress data using this compression format.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decompressed = Vec::new();
        self.reader(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| AptRepositoryError::Compression(format!("{}: {}", self, e)))?;
        Ok(decompressed)
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
        }
    }
}

impl FromStr for Compression {
    type Err = AptRepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "bzip2" | "bz2" => Ok(Compression::Bzip2),
            _ => Err(AptRepositoryError::Compression(format!(
                "unknown compression format: {}",
                s
            ))),
        }
    }
}

/// An encoder for one of the supported formats.
///
/// Dropping an encoder finishes the stream but swallows any error, so callers
/// must call [`Encoder::finish`] to learn whether the trailer was written.
pub enum Encoder<W: Write> {
    /// Pass-through.
    None(W),
    /// Gzip stream.
    Gzip(flate2::write::GzEncoder<W>),
    /// Bzip2 stream.
    Bzip2(bzip2::write::BzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Write the trailer and return the underlying writer.
    pub fn finish(self) -> std::io::Result<W> {
        match self {
            Encoder::None(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Encoder::Gzip(e) => e.finish(),
            Encoder::Bzip2(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Encoder::None(w) => w.write(buf),
            Encoder::Gzip(e) => e.write(buf),
            Encoder::Bzip2(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Encoder::None(w) => w.flush(),
            Encoder::Gzip(e) => e.flush(),
            Encoder::Bzip2(e) => e.flush(),
        }
    }
}

/// Compress `input` into `output` without exposing a partial file.
///
/// The compressed stream is written to a temporary file next to `output`
/// and renamed into place only once the encoder has been finished.
pub fn compress_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    compression: Compression,
) -> Result<()> {
    let output = output.as_ref();
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut reader = BufReader::new(File::open(input.as_ref())?);
    let mut tmp = crate::repository::output_tempfile(dir)?;
    let mut encoder = compression.writer(tmp.as_file_mut());
    std::io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;
    tmp.as_file().sync_all()?;
    tmp.persist(output).map_err(|e| e.error)?;

    log::debug!("Wrote {} ({})", output.display(), compression);
    Ok(())
}
