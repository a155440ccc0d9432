use crate::core::models::structure::Structure;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Defines the interface for reading and writing multi-frame structure files.
///
/// Implementors handle the format-specific parsing and serialization; the
/// path-based helpers are provided on top of the reader/writer methods.
pub trait StructureFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every frame from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if any frame fails to parse or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error>;

    /// Writes the frames, in order, to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the writer fails.
    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads every frame from a file path.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Structure>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes the frames to a file path.
    ///
    /// Output goes to a temporary sibling first and is renamed over `path`
    /// only after every frame has been written, so a failed write leaves
    /// any existing file untouched.
    fn write_to_path<P: AsRef<Path>>(structures: &[Structure], path: P) -> Result<(), Self::Error> {
        let path = path.as_ref();
        let staging = staging_path(path);
        let result = (|| {
            let file = File::create(&staging)?;
            let mut writer = BufWriter::new(file);
            Self::write_to(structures, &mut writer)?;
            writer.flush()?;
            Ok::<(), Self::Error>(())
        })();
        match result {
            Ok(()) => Ok(fs::rename(&staging, path)?),
            Err(err) => {
                let _ = fs::remove_file(&staging);
                Err(err)
            }
        }
    }
}

/// Hidden sibling used to stage a write to `path`.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}
