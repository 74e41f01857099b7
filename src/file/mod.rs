//! A random-access byte store with typed read/write, truncate, extend and
//! clear — the one POSIX-facing abstraction every other component builds
//! on.
//!
//! All multi-byte values use host byte order; portability across hosts is
//! a non-goal, matching the rest of the engine.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{DbError, Result};

/// Byte offset into the file.
pub type Offset = u64;

/// A value that can be written to and read from a fixed-width byte span.
pub trait FileValue: Sized + Copy {
    const WIDTH: usize;
    fn to_le_bytes_vec(&self) -> Vec<u8>;
    fn from_le_bytes_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_file_value {
    ($t:ty, $w:expr) => {
        impl FileValue for $t {
            const WIDTH: usize = $w;
            fn to_le_bytes_vec(&self) -> Vec<u8> {
                self.to_le_bytes().to_vec()
            }
            fn from_le_bytes_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $w];
                buf.copy_from_slice(&bytes[..$w]);
                <$t>::from_le_bytes(buf)
            }
        }
    };
}

impl_file_value!(u8, 1);
impl_file_value!(u16, 2);
impl_file_value!(u32, 4);
impl_file_value!(u64, 8);
impl_file_value!(i32, 4);
impl_file_value!(i64, 8);
impl_file_value!(f32, 4);
impl_file_value!(f64, 8);

impl FileValue for bool {
    const WIDTH: usize = 1;
    fn to_le_bytes_vec(&self) -> Vec<u8> {
        vec![if *self { 1 } else { 0 }]
    }
    fn from_le_bytes_slice(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Random-access byte-addressable storage backed by a single OS file.
#[derive(Debug)]
pub struct File {
    handle: std::fs::File,
    size: u64,
}

impl File {
    /// Opens `path`, creating it if absent. `read_only` disables every
    /// mutating method (they return `DbError::Io` of kind `PermissionDenied`).
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self> {
        let handle = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .create(!read_only)
            .open(path)?;
        let size = handle.metadata()?.len();
        Ok(File { handle, size })
    }

    /// Current logical size of the file in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn ensure_readable(&self, offset: Offset, count: usize) -> Result<()> {
        if offset.saturating_add(count as u64) > self.size {
            return Err(DbError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("read past end of file at offset {offset}, count {count}"),
            )));
        }
        Ok(())
    }

    /// Reads `count` raw bytes starting at `offset`.
    pub fn read_bytes(&mut self, offset: Offset, count: usize) -> Result<Vec<u8>> {
        self.ensure_readable(offset, count)?;
        let mut buf = vec![0u8; count];
        self.handle.seek(SeekFrom::Start(offset))?;
        self.handle.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes `bytes` starting at `offset`, growing the logical size if the
    /// write extends past the current end.
    pub fn write_bytes(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        self.handle.seek(SeekFrom::Start(offset))?;
        self.handle.write_all(bytes)?;
        let end = offset + bytes.len() as u64;
        if end > self.size {
            self.size = end;
        }
        Ok(())
    }

    /// Typed read of a fixed-width value at `offset`.
    pub fn read<T: FileValue>(&mut self, offset: Offset) -> Result<T> {
        let bytes = self.read_bytes(offset, T::WIDTH)?;
        Ok(T::from_le_bytes_slice(&bytes))
    }

    /// Typed write of a fixed-width value at `offset`.
    pub fn write<T: FileValue>(&mut self, offset: Offset, value: T) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes_vec())
    }

    /// Reads `count` bytes at `offset` and interprets them as UTF-8.
    pub fn read_string(&mut self, offset: Offset, count: usize) -> Result<String> {
        let bytes = self.read_bytes(offset, count)?;
        String::from_utf8(bytes)
            .map_err(|e| DbError::Structure(format!("string payload is not valid UTF-8: {e}")))
    }

    /// Writes `s`'s raw bytes at `offset` (no length prefix — callers that
    /// need one write it themselves, see `types::object::Str`).
    pub fn write_string(&mut self, offset: Offset, s: &str) -> Result<()> {
        self.write_bytes(offset, s.as_bytes())
    }

    /// Grows the file by `by` bytes, zero-filling the new region.
    pub fn extend(&mut self, by: u64) -> Result<()> {
        let new_size = self.size + by;
        self.handle.set_len(new_size)?;
        self.size = new_size;
        Ok(())
    }

    /// Shrinks the file so its logical size becomes `to`.
    pub fn truncate(&mut self, to: u64) -> Result<()> {
        self.handle.set_len(to)?;
        self.size = to;
        Ok(())
    }

    /// Empties the file entirely.
    pub fn clear(&mut self) -> Result<()> {
        self.handle.set_len(0)?;
        self.handle.seek(SeekFrom::Start(0))?;
        self.size = 0;
        Ok(())
    }

    /// Flushes pending writes to durable storage.
    pub fn sync(&self) -> Result<()> {
        self.handle.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn temp_file() -> (NamedTempFile, File) {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::open(tmp.path(), false).unwrap();
        (tmp, file)
    }

    #[test]
    fn fresh_file_is_empty() {
        let (_tmp, file) = temp_file();
        assert_eq!(file.size(), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_tmp, mut file) = temp_file();
        file.write::<u64>(0, 0xDEADBEEF).unwrap();
        assert_eq!(file.read::<u64>(0).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn write_extends_size() {
        let (_tmp, mut file) = temp_file();
        file.write::<u32>(100, 7).unwrap();
        assert_eq!(file.size(), 104);
    }

    #[test]
    fn read_past_end_is_io_error() {
        let (_tmp, mut file) = temp_file();
        file.extend(4).unwrap();
        let err = file.read::<u64>(0).unwrap_err();
        assert!(matches!(err, DbError::Io(_)));
    }

    #[test]
    fn string_round_trip() {
        let (_tmp, mut file) = temp_file();
        file.write_string(0, "hello world").unwrap();
        assert_eq!(file.read_string(0, 11).unwrap(), "hello world");
    }

    #[test]
    fn extend_grows_by_amount() {
        let (_tmp, mut file) = temp_file();
        file.extend(4096).unwrap();
        assert_eq!(file.size(), 4096);
        file.extend(4096).unwrap();
        assert_eq!(file.size(), 8192);
    }

    #[test]
    fn truncate_shrinks() {
        let (_tmp, mut file) = temp_file();
        file.extend(100).unwrap();
        file.truncate(10).unwrap();
        assert_eq!(file.size(), 10);
    }

    #[test]
    fn clear_resets_to_zero() {
        let (_tmp, mut file) = temp_file();
        file.extend(100).unwrap();
        file.clear().unwrap();
        assert_eq!(file.size(), 0);
    }

    #[test]
    fn bool_round_trip() {
        let (_tmp, mut file) = temp_file();
        file.write::<bool>(0, true).unwrap();
        file.write::<bool>(1, false).unwrap();
        assert!(file.read::<bool>(0).unwrap());
        assert!(!file.read::<bool>(1).unwrap());
    }
}
