//! Input loading: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! Every failure here is a [`FileError`]: one unreadable upload must not stop
//! the rest of the batch. The file type is decided from magic bytes, not the
//! extension, because phone uploads are often misnamed.

use crate::error::FileError;
use image::ImageFormat;
use std::path::Path;
use tracing::{debug, info};

/// What an uploaded file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(ImageFormat),
}

/// One uploaded file, read fully into memory.
#[derive(Clone)]
pub struct SourceDocument {
    /// Display name (file name or last URL segment), used in every report.
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .field("kind", &self.kind)
            .finish()
    }
}

impl SourceDocument {
    /// Wrap in-memory bytes (e.g. from an upload widget), detecting the kind.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, FileError> {
        let name = name.into();
        let kind = detect_kind(&bytes).ok_or_else(|| FileError::UnsupportedFormat {
            file: name.clone(),
        })?;
        Ok(Self { name, bytes, kind })
    }

    pub fn is_pdf(&self) -> bool {
        self.kind == DocumentKind::Pdf
    }
}

/// Detect PDF or a supported image format from the leading bytes.
pub fn detect_kind(bytes: &[u8]) -> Option<DocumentKind> {
    if bytes.starts_with(b"%PDF") {
        return Some(DocumentKind::Pdf);
    }
    match image::guess_format(bytes) {
        Ok(fmt @ (ImageFormat::Png | ImageFormat::Jpeg)) => Some(DocumentKind::Image(fmt)),
        _ => None,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load one input (local path or URL).
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<SourceDocument, FileError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

async fn load_local(path_str: &str) -> Result<SourceDocument, FileError> {
    let path = Path::new(path_str);
    let name = display_name(path_str);

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FileError::NotFound { file: name.clone() },
        _ => FileError::ReadFailed {
            file: name.clone(),
            detail: e.to_string(),
        },
    })?;

    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    SourceDocument::from_bytes(name, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, FileError> {
    info!("Downloading sheet from: {}", url);
    let name = url_file_name(url);
    let failed = |detail: String| FileError::DownloadFailed {
        file: name.clone(),
        detail,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    debug!("Downloaded {} ({} bytes)", url, bytes.len());
    SourceDocument::from_bytes(name, bytes.to_vec())
}

/// Name used in reports for an input before it has been loaded.
pub fn input_name(input: &str) -> String {
    if is_url(input) {
        url_file_name(input)
    } else {
        display_name(input)
    }
}

/// File-name component of a local path, or the path itself.
fn display_name(path_str: &str) -> String {
    Path::new(path_str)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string())
}

/// Last path segment of a URL, or the URL itself.
fn url_file_name(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/sheet.jpg"));
        assert!(is_url("http://example.com/sheet.pdf"));
        assert!(!is_url("/tmp/sheet.pdf"));
        assert!(!is_url("sheet.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn detects_pdf_and_png() {
        assert_eq!(detect_kind(b"%PDF-1.7\n..."), Some(DocumentKind::Pdf));
        assert_eq!(
            detect_kind(&png_bytes()),
            Some(DocumentKind::Image(ImageFormat::Png))
        );
        assert_eq!(detect_kind(b"hello world"), None);
        assert_eq!(detect_kind(b""), None);
    }

    #[test]
    fn from_bytes_rejects_unknown() {
        let err = SourceDocument::from_bytes("notes.txt", b"plain text".to_vec()).unwrap_err();
        assert_eq!(
            err,
            FileError::UnsupportedFormat {
                file: "notes.txt".into()
            }
        );
    }

    #[test]
    fn names() {
        assert_eq!(display_name("/scans/2024/sheet_01.jpg"), "sheet_01.jpg");
        assert_eq!(display_name("sheet.png"), "sheet.png");
        assert_eq!(url_file_name("https://host/a/b/scan.pdf?x=1"), "scan.pdf");
        assert_eq!(url_file_name("https://host/"), "https://host/");
        assert_eq!(input_name("https://host/fichas/f1.jpg"), "f1.jpg");
        assert_eq!(input_name("./fichas/f2.jpg"), "f2.jpg");
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let err = load_document("/definitely/not/here/sheet.jpg", 5)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FileError::NotFound {
                file: "sheet.jpg".into()
            }
        );
    }

    #[tokio::test]
    async fn local_png_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ficha.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let doc = load_document(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.name, "ficha.png");
        assert_eq!(doc.kind, DocumentKind::Image(ImageFormat::Png));
        assert!(!doc.is_pdf());
    }
}
