//! Transparent compression for file-backed sources.
//!
//! Exported result files are often compressed. Codecs are detected from the
//! file extension first and, failing that, from the magic bytes at the start
//! of the stream. Each codec sits behind its own feature:
//!
//! - **Gzip** (`.gz`) - `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - `zstd` (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - `bzip2` (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - `xz2` (feature: `compression-xz`)
//!
//! Compressed streams cannot seek, so a range read over a compressed file
//! decodes from the beginning and skips rows until it reaches its start.
//!
//! ```no_run
//! use shardflow::io::compression::open_decoded;
//! use std::io::Read;
//! # fn main() -> anyhow::Result<()> {
//! let mut text = String::new();
//! open_decoded("result.jsonl.gz")?.read_to_string(&mut text)?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Built-in compression formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    #[cfg(feature = "compression-gzip")]
    Gzip,
    #[cfg(feature = "compression-zstd")]
    Zstd,
    #[cfg(feature = "compression-bzip2")]
    Bzip2,
    #[cfg(feature = "compression-xz")]
    Xz,
}

impl Codec {
    /// Every codec compiled into this build.
    pub const ALL: &'static [Codec] = &[
        #[cfg(feature = "compression-gzip")]
        Codec::Gzip,
        #[cfg(feature = "compression-zstd")]
        Codec::Zstd,
        #[cfg(feature = "compression-bzip2")]
        Codec::Bzip2,
        #[cfg(feature = "compression-xz")]
        Codec::Xz,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => "gzip",
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => "zstd",
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => "bzip2",
            #[cfg(feature = "compression-xz")]
            Codec::Xz => "xz",
        }
    }

    /// Lowercase extensions, leading dot included.
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => &[".gz", ".gzip"],
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => &[".zst", ".zstd"],
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => &[".bz2", ".bzip2"],
            #[cfg(feature = "compression-xz")]
            Codec::Xz => &[".xz"],
        }
    }

    #[must_use]
    pub fn magic_bytes(self) -> &'static [u8] {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => &[0x1f, 0x8b],
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => &[0x42, 0x5a, 0x68],
            #[cfg(feature = "compression-xz")]
            Codec::Xz => &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00],
        }
    }

    /// Codec matching the extension of `path`, case-insensitively.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Codec> {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
    }

    /// Codec whose signature starts `head`.
    #[must_use]
    pub fn from_magic(head: &[u8]) -> Option<Codec> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| head.starts_with(c.magic_bytes()))
    }

    fn decoder<'a>(self, reader: Box<dyn Read + 'a>) -> std::io::Result<Box<dyn Read + 'a>> {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(reader)?)),
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader))),
            #[cfg(feature = "compression-xz")]
            Codec::Xz => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader))),
        }
    }

    fn encoder<'a>(self, writer: Box<dyn Write + 'a>) -> std::io::Result<Box<dyn Write + 'a>> {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Ok(Box::new(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            ))),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Ok(Box::new(
                zstd::stream::write::Encoder::new(writer, 3)?.auto_finish(),
            )),
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => Ok(Box::new(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            ))),
            #[cfg(feature = "compression-xz")]
            Codec::Xz => Ok(Box::new(xz2::write::XzEncoder::new(writer, 6))),
        }
    }
}

/// Wrap `reader` with a decoder picked from `path_hint` or the stream's magic bytes.
///
/// Streams without a recognized codec are returned as-is (buffered).
///
/// # Errors
/// Returns an error if peeking the stream or building the decoder fails.
pub fn decode_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    if let Some(codec) = Codec::from_path(&path_hint) {
        return codec
            .decoder(Box::new(reader))
            .with_context(|| format!("set up {} decoder", codec.name()));
    }
    let mut buffered = BufReader::new(reader);
    let head = buffered.fill_buf().context("peek stream header")?;
    match Codec::from_magic(head) {
        Some(codec) => codec
            .decoder(Box::new(buffered))
            .with_context(|| format!("set up {} decoder", codec.name())),
        None => Ok(Box::new(buffered)),
    }
}

/// Open `path` for reading, decompressing when needed.
///
/// # Errors
/// Returns an error if the file cannot be opened or its decoder set up.
pub fn open_decoded(path: impl AsRef<Path>) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    decode_reader(file, path).with_context(|| format!("set up decompression for {}", path.display()))
}

/// Create `path` for writing, compressing according to its extension.
///
/// # Errors
/// Returns an error if the file cannot be created or its encoder set up.
pub fn create_encoded(path: impl AsRef<Path>) -> Result<Box<dyn Write>> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let buffered: Box<dyn Write> = Box::new(BufWriter::new(file));
    match Codec::from_path(path) {
        Some(codec) => codec
            .encoder(buffered)
            .with_context(|| format!("set up {} encoder for {}", codec.name(), path.display())),
        None => Ok(buffered),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_files_pass_through() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rows.txt");
        {
            let mut w = create_encoded(&path)?;
            w.write_all(b"plain\n")?;
            w.flush()?;
        }
        let mut out = String::new();
        open_decoded(&path)?.read_to_string(&mut out)?;
        assert_eq!(out, "plain\n");
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_round_trip_and_magic_detection() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rows.txt.gz");
        {
            let mut w = create_encoded(&path)?;
            w.write_all(b"hello\nworld\n")?;
            w.flush()?;
        }
        let mut out = String::new();
        open_decoded(&path)?.read_to_string(&mut out)?;
        assert_eq!(out, "hello\nworld\n");

        // Same bytes under a misleading name are still detected.
        let renamed = dir.path().join("rows.bin");
        std::fs::copy(&path, &renamed)?;
        let mut out = String::new();
        open_decoded(&renamed)?.read_to_string(&mut out)?;
        assert_eq!(out, "hello\nworld\n");
        Ok(())
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        #[cfg(feature = "compression-zstd")]
        assert_eq!(Codec::from_path("A.JSONL.ZST"), Some(Codec::Zstd));
        assert_eq!(Codec::from_path("a.jsonl"), None);
    }
}
