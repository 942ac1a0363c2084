//! Pending mutations and the sources new entry data comes from.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::codec::CompressionMethod;
use crate::crypto::{EncryptionMethod, Password};
use crate::{Error, Result};

/// Where the data of an added or replaced entry comes from.
///
/// Sources are read at commit time. A file source is validated when it is
/// journaled, but the file must still be there when the session closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Bytes held in memory.
    Buffer(Vec<u8>),
    /// A region of a file on disk.
    File {
        /// Path of the file.
        path: PathBuf,
        /// Offset of the first byte.
        offset: u64,
        /// Number of bytes, or `None` for everything up to the end.
        length: Option<u64>,
    },
    /// No data: a directory placeholder.
    Directory,
}

impl EntrySource {
    /// A source covering a whole file.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            offset: 0,
            length: None,
        }
    }

    /// A source covering `length` bytes of a file starting at `offset`.
    pub fn file_region(path: impl AsRef<Path>, offset: u64, length: u64) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            offset,
            length: Some(length),
        }
    }

    /// Checks that the source is readable and pins down its length.
    ///
    /// For files this stats the path and turns an open-ended region into a
    /// fixed one, so that a file growing before commit does not change the
    /// entry.
    pub(crate) fn resolve(self) -> Result<Self> {
        match self {
            Self::File {
                path,
                offset,
                length,
            } => {
                let file_len = std::fs::metadata(&path)
                    .map_err(|e| match e.kind() {
                        io::ErrorKind::NotFound => {
                            Error::NotFound(crate::Missing::Archive(path.clone()))
                        }
                        _ => Error::Io(e),
                    })?
                    .len();
                if offset > file_len {
                    return Err(Error::InvalidArgument(format!(
                        "offset {} is past the end of '{}' ({} bytes)",
                        offset,
                        path.display(),
                        file_len
                    )));
                }
                let available = file_len - offset;
                let length = match length {
                    Some(len) if len > available => {
                        return Err(Error::InvalidArgument(format!(
                            "region of {} bytes at {} exceeds '{}' ({} bytes)",
                            len,
                            offset,
                            path.display(),
                            file_len
                        )));
                    }
                    Some(len) => len,
                    None => available,
                };
                if length > u32::MAX as u64 {
                    return Err(Error::UnsupportedFeature {
                        feature: "entries larger than 4 GiB (ZIP64)",
                    });
                }
                Ok(Self::File {
                    path,
                    offset,
                    length: Some(length),
                })
            }
            Self::Buffer(data) if data.len() as u64 > u32::MAX as u64 => {
                Err(Error::UnsupportedFeature {
                    feature: "entries larger than 4 GiB (ZIP64)",
                })
            }
            other => Ok(other),
        }
    }

    /// Uncompressed length of the data.
    pub fn len(&self) -> u64 {
        match self {
            Self::Buffer(data) => data.len() as u64,
            Self::File { length, .. } => length.unwrap_or(0),
            Self::Directory => 0,
        }
    }

    /// Returns true if the source yields no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a reader over the source's bytes.
    pub(crate) fn open(&self) -> Result<Box<dyn Read + Send + '_>> {
        match self {
            Self::Buffer(data) => Ok(Box::new(data.as_slice())),
            Self::File { .. } => self.open_owned(),
            Self::Directory => Ok(Box::new(io::empty())),
        }
    }

    /// Opens a reader that does not borrow the source.
    pub(crate) fn open_owned(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            Self::Buffer(data) => Ok(Box::new(Cursor::new(data.clone()))),
            Self::File {
                path,
                offset,
                length,
            } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(*offset))?;
                Ok(Box::new(file.take(length.unwrap_or(u64::MAX))))
            }
            Self::Directory => Ok(Box::new(io::empty())),
        }
    }
}

/// A pending modification of one entry.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Add a new entry.
    Add {
        /// Raw name.
        name: Vec<u8>,
        /// Data source.
        source: EntrySource,
        /// Compression method.
        compression: CompressionMethod,
    },
    /// Replace the data of an entry, keeping its name and position.
    Replace {
        /// New data source.
        source: EntrySource,
    },
    /// Remove an entry.
    Remove,
    /// Rename an entry.
    Rename {
        /// New raw name.
        name: Vec<u8>,
    },
    /// Change the compression method.
    SetCompression {
        /// New method.
        method: CompressionMethod,
        /// Level 1-9, or 0 for the codec default.
        level: u32,
    },
    /// Change the encryption method.
    SetEncryption {
        /// New method.
        method: EncryptionMethod,
        /// Entry-specific password; `None` falls back to the archive default.
        password: Option<Password>,
    },
    /// Set or clear the entry comment.
    SetComment {
        /// New comment; `None` clears it.
        comment: Option<Vec<u8>>,
    },
    /// Set the modification time.
    SetModTime {
        /// Seconds since the Unix epoch.
        mtime: u32,
    },
}

impl Operation {
    /// Returns whether the operation touches only directory metadata.
    ///
    /// Entries with only such changes are copied without decoding at commit.
    pub fn is_header_only(&self) -> bool {
        matches!(
            self,
            Operation::Remove
                | Operation::Rename { .. }
                | Operation::SetComment { .. }
                | Operation::SetModTime { .. }
        )
    }

    /// Returns the operation type as a string.
    pub fn operation_type(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Replace { .. } => "replace",
            Operation::Remove => "remove",
            Operation::Rename { .. } => "rename",
            Operation::SetCompression { .. } => "set-compression",
            Operation::SetEncryption { .. } => "set-encryption",
            Operation::SetComment { .. } => "set-comment",
            Operation::SetModTime { .. } => "set-mtime",
        }
    }
}

/// A journaled operation and the index it targets.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// Target index; for [`Operation::Add`], the newly allocated one.
    pub index: usize,
    /// The operation.
    pub op: Operation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_operation_classification() {
        assert!(Operation::Remove.is_header_only());
        assert!(Operation::Rename { name: b"x".to_vec() }.is_header_only());
        assert!(
            !Operation::SetCompression {
                method: CompressionMethod::Store,
                level: 0
            }
            .is_header_only()
        );
        assert_eq!(
            Operation::Replace {
                source: EntrySource::Directory
            }
            .operation_type(),
            "replace"
        );
    }

    #[test]
    fn test_file_region_resolves_and_reads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let source = EntrySource::file_region(file.path(), 2, 5).resolve().unwrap();
        assert_eq!(source.len(), 5);
        let mut out = Vec::new();
        source.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"23456");

        let whole = EntrySource::file(file.path()).resolve().unwrap();
        assert_eq!(whole.len(), 10);
    }

    #[test]
    fn test_file_region_out_of_bounds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let err = EntrySource::file_region(file.path(), 1, 5)
            .resolve()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = EntrySource::file("/nonexistent/zipsession/source")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_owned_buffer_reader() {
        let source = EntrySource::Buffer(b"owned".to_vec());
        let mut out = String::new();
        source.open_owned().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "owned");
        assert!(EntrySource::Directory.is_empty());
    }
}
