//! Raw file acquisition
//!
//! Reads a whole file into an owned byte image in one go. The image is
//! allocated for the size the file system reports, and a read that comes
//! up short is an error rather than a truncated image.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

/// File acquisition errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("short read of {}: expected {expected} bytes, got {read}", path.display())]
    ReadIncomplete {
        path: PathBuf,
        expected: u64,
        read: u64,
    },

    #[error("cannot allocate {0} bytes for the file image")]
    Allocation(u64),

    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read the complete contents of `path`
pub fn read_file_image(path: &Path) -> Result<Vec<u8>, SourceError> {
    let io_error = |source: io::Error| SourceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
        _ => io_error(e),
    })?;

    let expected = file.metadata().map_err(io_error)?.len();
    let capacity = usize::try_from(expected).map_err(|_| SourceError::Allocation(expected))?;

    let mut image = Vec::new();
    image
        .try_reserve_exact(capacity)
        .map_err(|_| SourceError::Allocation(expected))?;

    let mut reader = file.take(expected);
    reader.read_to_end(&mut image).map_err(io_error)?;

    let read = image.len() as u64;
    if read != expected {
        return Err(SourceError::ReadIncomplete {
            path: path.to_path_buf(),
            expected,
            read,
        });
    }

    debug!("Read {} bytes from {}", read, path.display());
    Ok(image)
}
