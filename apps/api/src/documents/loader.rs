use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use thiserror::Error;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::documents::uploads::StoredFile;
use crate::documents::Document;

/// Extensions read straight as text.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "json", "html", "htm", "rtf", "tex",
];

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to extract text from PDF '{file}': {message}")]
    Pdf { file: String, message: String },

    #[error("failed to extract text from Word document '{file}': {message}")]
    Docx { file: String, message: String },

    #[error("unsupported file format: '{0}'")]
    UnsupportedFormat(String),

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Loads a stored upload into documents tagged with its display name.
///
/// A file with no extractable text yields no documents rather than an error;
/// scanned PDFs often look like that and the chat should still answer.
pub async fn load_document(file: &StoredFile) -> Result<Vec<Document>, LoaderError> {
    let text = extract_text(&file.path, &file.display_name).await?;
    let text = normalize_whitespace(&text);

    if text.is_empty() {
        warn!("No text extracted from {}", file.display_name);
        return Ok(Vec::new());
    }

    debug!(
        "Extracted {} characters from {}",
        text.chars().count(),
        file.display_name
    );
    Ok(vec![Document::new(text, file.display_name.clone())])
}

async fn extract_text(path: &Path, display_name: &str) -> Result<String, LoaderError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "pdf" => extract_pdf(path.to_path_buf(), display_name.to_string()).await,
        "docx" => {
            let bytes = tokio::fs::read(path).await?;
            extract_docx(bytes, display_name.to_string()).await
        }
        // Legacy binary .doc is only readable when it is really a renamed .docx
        "doc" => {
            let bytes = tokio::fs::read(path).await?;
            if !bytes.starts_with(b"PK") {
                return Err(LoaderError::UnsupportedFormat(display_name.to_string()));
            }
            extract_docx(bytes, display_name.to_string()).await
        }
        "" => Ok(String::from_utf8_lossy(&tokio::fs::read(path).await?).into_owned()),
        ext if TEXT_EXTENSIONS.contains(&ext) => {
            Ok(String::from_utf8_lossy(&tokio::fs::read(path).await?).into_owned())
        }
        _ => {
            let bytes = tokio::fs::read(path).await?;
            String::from_utf8(bytes)
                .map_err(|_| LoaderError::UnsupportedFormat(display_name.to_string()))
        }
    }
}

async fn extract_pdf(path: PathBuf, display_name: String) -> Result<String, LoaderError> {
    // pdf-extract is synchronous and CPU-bound
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text(&path).map_err(|e| LoaderError::Pdf {
            file: display_name,
            message: e.to_string(),
        })
    })
    .await
    .map_err(|e| LoaderError::Task(e.to_string()))?
}

async fn extract_docx(bytes: Vec<u8>, display_name: String) -> Result<String, LoaderError> {
    tokio::task::spawn_blocking(move || {
        docx_text(&bytes).map_err(|message| LoaderError::Docx {
            file: display_name,
            message,
        })
    })
    .await
    .map_err(|e| LoaderError::Task(e.to_string()))?
}

/// Pulls the body text out of `word/document.xml`: one line per paragraph,
/// `w:tab` as a tab and `w:br` as a line break.
fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a docx archive: {e}"))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("read word/document.xml: {e}"))?;

    let mut reader = XmlReader::from_str(&xml);
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let chunk = e.unescape().map_err(|e| format!("bad text node: {e}"))?;
                text.push_str(&chunk);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("malformed document.xml: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Collapses runs of spaces and blank lines left behind by PDF extraction.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !out.is_empty() {
                out.push('\n');
            }
            continue;
        }
        blank_run = 0;
        out.push_str(&collapsed);
        out.push('\n');
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::uploads::UploadDir;

    #[test]
    fn test_normalize_whitespace_collapses_spaces_and_blank_lines() {
        let raw = "  Jane   Doe \n\n\n\nSenior\tEngineer\n   \n";
        assert_eq!(normalize_whitespace(raw), "Jane Doe\n\nSenior Engineer");
    }

    #[tokio::test]
    async fn test_text_file_loads_with_display_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir
            .save("jane.txt", b"Jane Doe\nRust, Kubernetes")
            .await
            .unwrap();

        let docs = load_document(&stored).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name, "jane.txt");
        assert!(docs[0].text.contains("Kubernetes"));
    }

    #[tokio::test]
    async fn test_empty_file_yields_no_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir.save("blank.md", b"   \n\n").await.unwrap();

        assert!(load_document(&stored).await.unwrap().is_empty());
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    const RESUME_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Skills: </w:t></w:r><w:r><w:t>Rust &amp; Go</w:t></w:r></w:p>
    <w:p><w:r><w:t>Led</w:t><w:tab/><w:t>5 engineers</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_docx_text_reads_paragraphs_runs_and_entities() {
        let text = docx_text(&docx_bytes(RESUME_XML)).unwrap();
        assert_eq!(text, "Jane Doe\nSkills: Rust & Go\nLed\t5 engineers\n");
    }

    #[tokio::test]
    async fn test_docx_upload_loads_text() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir.save("resume.docx", &docx_bytes(RESUME_XML)).await.unwrap();

        let docs = load_document(&stored).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name, "resume.docx");
        assert_eq!(docs[0].text, "Jane Doe\nSkills: Rust & Go\nLed 5 engineers");
    }

    #[tokio::test]
    async fn test_renamed_docx_with_doc_extension_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir.save("resume.doc", &docx_bytes(RESUME_XML)).await.unwrap();

        let docs = load_document(&stored).await.unwrap();
        assert!(docs[0].text.starts_with("Jane Doe"));
    }

    #[tokio::test]
    async fn test_legacy_binary_doc_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir
            .save("old.doc", &[0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1])
            .await
            .unwrap();

        let err = load_document(&stored).await.unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedFormat(name) if name == "old.doc"));
    }

    #[tokio::test]
    async fn test_corrupt_docx_reports_docx_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir.save("broken.docx", b"PK\x03\x04 truncated").await.unwrap();

        let err = load_document(&stored).await.unwrap_err();
        assert!(matches!(err, LoaderError::Docx { .. }));
    }

    #[tokio::test]
    async fn test_unknown_binary_format_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir
            .save("photo.png", &[0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe])
            .await
            .unwrap();

        let err = load_document(&stored).await.unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedFormat(name) if name == "photo.png"));
    }

    #[tokio::test]
    async fn test_unknown_extension_with_utf8_content_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir.save("cv.yaml", b"name: Jane").await.unwrap();

        let docs = load_document(&stored).await.unwrap();
        assert_eq!(docs[0].text, "name: Jane");
    }

    #[tokio::test]
    async fn test_corrupt_pdf_reports_pdf_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::open(tmp.path()).await.unwrap();
        let stored = dir.save("broken.pdf", b"not really a pdf").await.unwrap();

        let err = load_document(&stored).await.unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Pdf { .. } | LoaderError::Task(_)
        ));
    }
}
