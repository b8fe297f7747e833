use super::error::DocumentError;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Reading and writing a self-describing configuration file.
///
/// Implementors provide the stream-level operations; the path-level helpers attach the file
/// path to any error so that a failed load names the offending file.
pub trait ConfigFile: Sized {
    /// Parses and validates a document from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be read, does not parse, or fails validation.
    fn read_from(reader: &mut impl BufRead) -> Result<Self, DocumentError>;

    /// Serializes the document to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    fn write_to(&self, writer: &mut impl Write) -> Result<(), DocumentError>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| DocumentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader).map_err(|e| match e {
            DocumentError::Parse(source) => DocumentError::Toml {
                path: path.to_string_lossy().to_string(),
                source,
            },
            DocumentError::Stream(source) => DocumentError::Io {
                path: path.to_string_lossy().to_string(),
                source,
            },
            other => other,
        })
    }

    fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| DocumentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
