//! Plain-text extraction for uploaded documents.
//!
//! The document kind is decided by file extension. PDF goes through
//! `pdf-extract`; DOCX is a ZIP whose `word/document.xml` text runs
//! (`<w:t>`) are collected with `quick-xml`, one paragraph (`<w:p>`) per
//! blank-line separated block so the chunker can split on them.

use std::io::Read;
use std::path::Path;

use docchat_core::store::IngestError;

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "md" | "markdown" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Text => "text/plain",
        }
    }
}

/// Extracts UTF-8 text from `bytes` of the given kind.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String, IngestError> {
    match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| IngestError::Extraction(format!("pdf: {}", e))),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, IngestError> {
    let docx_err = |e: &dyn std::fmt::Display| IngestError::Extraction(format!("docx: {}", e));

    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| docx_err(&e))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| docx_err(&"word/document.xml not found"))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| docx_err(&e))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(docx_err(&"word/document.xml exceeds size limit"));
    }

    paragraphs_from_document_xml(&xml).map_err(|e| docx_err(&e))
}

fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, quick_xml::Error> {
    use quick_xml::events::Event;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let para = current.trim();
                    if !para.is_empty() {
                        paragraphs.push(para.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Text(te) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }
    Ok(paragraphs.join("\n\n"))
}
