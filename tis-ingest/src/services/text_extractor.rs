//! Raw text extraction from scanned transcripts
//!
//! Runs external OCR tools: `tesseract <file> stdout` for images and
//! `pdftotext -layout <file> -` for PDFs.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use tis_common::config::OcrConfig;

use super::ExtractionError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract raw text; an empty string means nothing was recognized
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Shells out to the configured OCR commands
pub struct CommandTextExtractor {
    image_command: String,
    pdf_command: String,
}

impl CommandTextExtractor {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            image_command: config.image_command.clone(),
            pdf_command: config.pdf_command.clone(),
        }
    }

    async fn run(&self, program: &str, args: &[&OsStr]) -> Result<String, ExtractionError> {
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::CommandFailed {
                command: program.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ExtractionError::CommandFailed {
                command: program.to_string(),
                message: format!(
                    "exit status {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TextExtractor for CommandTextExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let extension = extension_of(path);
        debug!(path = %path.display(), extension = %extension, "OCR: extracting text");

        let text = if extension == "pdf" {
            self.run(
                &self.pdf_command,
                &[OsStr::new("-layout"), path.as_os_str(), OsStr::new("-")],
            )
            .await?
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            self.run(&self.image_command, &[path.as_os_str(), OsStr::new("stdout")])
                .await?
        } else {
            return Err(ExtractionError::UnsupportedFileType(extension));
        };

        Ok(text.trim().to_string())
    }
}

/// Lowercased extension, empty if none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn extractor() -> CommandTextExtractor {
        CommandTextExtractor::new(&OcrConfig {
            image_command: "tesseract".to_string(),
            pdf_command: "pdftotext".to_string(),
        })
    }

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(extension_of(&PathBuf::from("/tmp/SCAN.PNG")), "png");
        assert_eq!(extension_of(&PathBuf::from("/tmp/noext")), "");
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_rejected() {
        let result = extractor().extract_text(&PathBuf::from("/tmp/notes.docx")).await;
        assert!(matches!(result, Err(ExtractionError::UnsupportedFileType(ext)) if ext == "docx"));
    }

    #[tokio::test]
    async fn test_missing_command_is_reported() {
        let extractor = CommandTextExtractor::new(&OcrConfig {
            image_command: "tis-no-such-ocr-binary".to_string(),
            pdf_command: "tis-no-such-pdf-binary".to_string(),
        });
        let result = extractor.extract_text(&PathBuf::from("/tmp/scan.png")).await;
        assert!(matches!(result, Err(ExtractionError::CommandFailed { .. })));
    }
}
