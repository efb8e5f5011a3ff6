//! Text extraction seam.
//!
//! Raw file parsing is an external concern; the pipeline only depends on
//! this trait. Plain text is decoded in-process, pdf/docx are handed to
//! whatever extractor implementation the deployment wires in.

use async_trait::async_trait;

use crate::errors::ApiError;

/// File types accepted by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "docx" => Some(FileType::Docx),
            "txt" => Some(FileType::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileType::Txt => "text/plain",
        }
    }
}

/// Turns raw file bytes into plain text.
///
/// Failures surface as `ApiError::Extraction` and fail the whole ingest;
/// the pipeline never catches-and-continues past an unreadable source.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], file_type: FileType) -> Result<String, ApiError>;
}

/// Default extractor: decodes `txt` in-process, rejects binary formats.
///
/// Deployments with pdf/docx support substitute an implementation that
/// shells out to a real parser; the pipeline contract stays the same.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8], file_type: FileType) -> Result<String, ApiError> {
        match file_type {
            FileType::Txt => String::from_utf8(bytes.to_vec())
                .map_err(|e| ApiError::Extraction(format!("invalid UTF-8 in text file: {e}"))),
            FileType::Pdf | FileType::Docx => Err(ApiError::Extraction(format!(
                "no extractor configured for {} files",
                file_type.as_str()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_plain_text() {
        let extractor = PlainTextExtractor;
        let text = extractor
            .extract("hello".as_bytes(), FileType::Txt)
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn rejects_invalid_utf8() {
        let extractor = PlainTextExtractor;
        let err = extractor.extract(&[0xff, 0xfe], FileType::Txt).await;
        assert!(matches!(err, Err(ApiError::Extraction(_))));
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(FileType::from_extension("PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_extension("txt"), Some(FileType::Txt));
        assert_eq!(FileType::from_extension("exe"), None);
    }
}
