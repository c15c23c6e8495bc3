//! File-backed input helper (§6.1): opens a path and hands back a byte
//! buffer the lexer can feed from, without the caller needing to know
//! whether the bytes came from a memory map or a heap copy.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::Error;

/// An opened input file. Memory-mapped files return [`InputBuffer::Mapped`];
/// zero-length files (which most platforms refuse to map) fall back to
/// [`InputBuffer::Owned`] with an empty buffer.
pub enum InputBuffer {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl InputBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            InputBuffer::Mapped(mmap) => mmap,
            InputBuffer::Owned(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens `path` for reading and memory-maps its contents. Dropping the
/// returned [`InputBuffer`] unmaps the file — there is no explicit
/// `close()`, matching the rest of this crate's RAII-over-explicit-release
/// posture.
pub fn open(path: impl AsRef<Path>) -> Result<InputBuffer, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(Error::Io)?;
    let metadata = file.metadata().map_err(Error::Io)?;
    if metadata.len() == 0 {
        return Ok(InputBuffer::Owned(Vec::new()));
    }
    // SAFETY: the mapping is read-only and this process does not rely on
    // the file staying unmodified for correctness beyond normal parsing;
    // a concurrent truncation can only shorten what we read, which the
    // lexer already treats as a truncated document.
    let mmap = unsafe { Mmap::map(&file) }.map_err(Error::Io)?;
    Ok(InputBuffer::Mapped(mmap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn opens_and_maps_a_nonempty_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"a":1}"#).unwrap();
        let buf = open(file.path()).unwrap();
        assert_eq!(buf.as_bytes(), br#"{"a":1}"#);
    }

    #[test]
    fn falls_back_to_owned_for_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let buf = open(file.path()).unwrap();
        assert!(buf.is_empty());
        assert!(matches!(buf, InputBuffer::Owned(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(open("/nonexistent/path/does-not-exist.json").is_err());
    }
}
