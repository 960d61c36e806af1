use eyre::Result;
use std::path::{Path, PathBuf};

/// Decoded document handed to the reading session.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedFile {
    pub path: String,
    pub display_name: String,
    pub content: String,
}

/// Where documents come from. `Ok(None)` means the user cancelled.
pub trait FileSource {
    fn open_file(&mut self) -> Result<Option<OpenedFile>>;
}

/// A document prepared up front; yields it once.
impl FileSource for Option<OpenedFile> {
    fn open_file(&mut self) -> Result<Option<OpenedFile>> {
        Ok(self.take())
    }
}

/// Reads a single path from disk.
pub struct FsSource {
    path: Option<PathBuf>,
}

impl FsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    pub fn read(path: &Path) -> Result<OpenedFile> {
        let bytes = std::fs::read(path)
            .map_err(|err| eyre::eyre!("Could not read {}: {}", path.display(), err))?;
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(OpenedFile {
            path: path.to_string_lossy().to_string(),
            display_name,
            content: decode_text(&bytes),
        })
    }
}

impl FileSource for FsSource {
    fn open_file(&mut self) -> Result<Option<OpenedFile>> {
        match self.path.take() {
            Some(path) => Self::read(&path).map(Some),
            None => Ok(None),
        }
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) => {
            log::warn!("document is not valid UTF-8 ({}), decoding lossily", err);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
