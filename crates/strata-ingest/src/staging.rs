//! Local staging area for the encoded artifact.
//!
//! A staged artifact is a scoped resource: temporary files are removed when
//! the staged value is dropped, on success and failure paths alike.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;

/// Where encoded artifacts are held between encoding and publishing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StagingArea {
    /// Keep the artifact in memory.
    #[default]
    Memory,
    /// Write the artifact to a temporary file inside this directory.
    Directory(PathBuf),
}

impl StagingArea {
    pub(crate) fn create(&self) -> io::Result<StagedWriter> {
        match self {
            Self::Memory => Ok(StagedWriter::Memory(Vec::new())),
            Self::Directory(dir) => tempfile::Builder::new()
                .prefix("strata-")
                .suffix(".parquet")
                .tempfile_in(dir)
                .map(StagedWriter::File),
        }
    }
}

/// Sink the encoder writes into.
#[derive(Debug)]
pub(crate) enum StagedWriter {
    Memory(Vec<u8>),
    File(NamedTempFile),
}

impl StagedWriter {
    /// Completes staging, returning the body and its size in bytes.
    pub(crate) fn finish(self) -> io::Result<(StagedBody, u64)> {
        match self {
            Self::Memory(buf) => {
                let size = buf.len() as u64;
                Ok((StagedBody::Memory(Bytes::from(buf)), size))
            }
            Self::File(mut file) => {
                file.flush()?;
                let size = file.as_file().metadata()?.len();
                Ok((StagedBody::File(file), size))
            }
        }
    }
}

impl Write for StagedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Memory(vec) => vec.write(buf),
            Self::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::File(file) => file.flush(),
        }
    }
}

/// Finished artifact bytes held by the staging area.
#[derive(Debug)]
pub(crate) enum StagedBody {
    Memory(Bytes),
    File(NamedTempFile),
}

impl StagedBody {
    pub(crate) async fn read(&self) -> io::Result<Bytes> {
        match self {
            Self::Memory(bytes) => Ok(bytes.clone()),
            Self::File(file) => tokio::fs::read(file.path()).await.map(Bytes::from),
        }
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            Self::File(file) => Some(file.path()),
        }
    }
}
