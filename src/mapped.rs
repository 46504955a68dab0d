//! Read-only memory maps of whole files.

use crate::error::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// A file mapped into memory for the duration of one comparison.
///
/// The mapping is released when this is dropped. Zero-length files are not
/// mapped at all and read as an empty slice.
///
/// The contents are only stable while no other process modifies or truncates
/// the file; a concurrent truncation can fault the reading thread.
pub struct MappedFile {
    map: Option<Mmap>,
    origin: PathBuf,
}

impl MappedFile {
    /// Opens and maps `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_file(&file, path)
    }

    /// Maps an already-open file. Errors name `origin` as the file.
    ///
    /// The handle can be closed afterwards; the mapping stays valid.
    pub fn from_file(file: &File, origin: impl Into<PathBuf>) -> Result<Self> {
        let origin = origin.into();
        let len = file.metadata().map_err(|e| Error::io(&origin, e))?.len();
        if len == 0 {
            return Ok(Self { map: None, origin });
        }

        // Safety: the map is only ever read, and comparisons treat the file as
        // immutable for their duration.
        let map = unsafe { Mmap::map(file) }.map_err(|e| Error::io(&origin, e))?;
        log::trace!("Mapped {} bytes of {:?}", map.len(), origin);

        Ok(Self {
            map: Some(map),
            origin,
        })
    }

    /// Path used when reporting errors for this file.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// The mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::MappedFile;
    use crate::Error;
    use std::io::Write;

    #[test]
    fn maps_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Lorem ipsum dolor sit amet").unwrap();
        let mapped = MappedFile::open(file.path()).unwrap();
        assert_eq!(&*mapped, b"Lorem ipsum dolor sit amet");
    }

    #[test]
    fn empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mapped = MappedFile::open(file.path()).unwrap();
        assert!(mapped.is_empty());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = MappedFile::open(dir.path().join("missing"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }
}
