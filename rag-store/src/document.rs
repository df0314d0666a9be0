//! Plain-text document loading.

use std::path::Path;

use tracing::debug;

use crate::errors::RagError;

/// A loaded text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where the text came from (file path or caller-chosen label).
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Reads a UTF-8 text file as a single document.
///
/// # Errors
/// [`RagError::Io`] if the file cannot be read or is not valid UTF-8.
pub fn load_text_document(path: impl AsRef<Path>) -> Result<Document, RagError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), chars = text.chars().count(), "document loaded");
    Ok(Document {
        source: path.display().to_string(),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_file_with_path_as_source() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "Loam is fertile.").unwrap();
        let doc = load_text_document(f.path()).unwrap();
        assert_eq!(doc.text, "Loam is fertile.");
        assert_eq!(doc.source, f.path().display().to_string());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_text_document("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, RagError::Io(_)));
    }
}
