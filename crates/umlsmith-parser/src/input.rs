//! Raw input media handed to the normalizer.

use std::{fmt, fs, path::Path};

use log::debug;

use crate::error::ParseError;

/// The syntax an input medium is expected to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Comma-separated rows with a header line.
    Csv,
    /// A JSON document.
    Json,
    /// A YAML document.
    Yaml,
    /// Free text, or an unknown format.
    Text,
}

impl InputFormat {
    /// Picks a format from a file extension; unknown extensions are [`InputFormat::Text`].
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => InputFormat::Csv,
            Some("json") => InputFormat::Json,
            Some("yaml" | "yml") => InputFormat::Yaml,
            _ => InputFormat::Text,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Csv => write!(f, "csv"),
            InputFormat::Json => write!(f, "json"),
            InputFormat::Yaml => write!(f, "yaml"),
            InputFormat::Text => write!(f, "text"),
        }
    }
}

/// A decoded input medium: a display name, its format and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInput {
    name: String,
    format: InputFormat,
    text: String,
}

impl RawInput {
    /// Creates an input from text that is already decoded.
    pub fn new(name: impl Into<String>, format: InputFormat, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        };
        Self {
            name: name.into(),
            format,
            text,
        }
    }

    /// Decodes bytes as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Encoding`] when the bytes are not valid UTF-8.
    pub fn from_bytes(
        name: impl Into<String>,
        format: InputFormat,
        bytes: Vec<u8>,
    ) -> Result<Self, ParseError> {
        let name = name.into();
        match String::from_utf8(bytes) {
            Ok(text) => Ok(Self::new(name, format, text)),
            Err(err) => Err(ParseError::Encoding {
                offset: err.utf8_error().valid_up_to(),
                name,
            }),
        }
    }

    /// Reads a file, choosing the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] when the file cannot be read and
    /// [`ParseError::Encoding`] when it is not valid UTF-8.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let format = InputFormat::from_path(path);
        debug!(path = path.display().to_string(), format:% = format; "Read input medium");
        Self::from_bytes(path.display().to_string(), format, bytes)
    }

    /// Returns the display name, usually the file path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared format.
    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// Returns the decoded text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(InputFormat::from_path("cmdb.CSV"), InputFormat::Csv);
        assert_eq!(InputFormat::from_path("cmdb.yml"), InputFormat::Yaml);
        assert_eq!(InputFormat::from_path("notes"), InputFormat::Text);
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let err = RawInput::from_bytes("bad.csv", InputFormat::Csv, vec![b'i', b'd', 0xff])
            .unwrap_err();
        assert!(matches!(err, ParseError::Encoding { offset: 2, .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RawInput::from_path("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let input = RawInput::new("bom.csv", InputFormat::Csv, "\u{feff}id\nA");
        assert_eq!(input.text(), "id\nA");
    }
}
