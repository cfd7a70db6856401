//! Local text extraction: plain-text decoding and offline DOCX parsing.

use std::io::Read;

use thiserror::Error;

/// Extensions decoded directly as text without any extraction service.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "py", "js", "java", "c", "cpp", "h", "cs", "ts", "tsx", "html", "css", "json", "md",
];

/// Extensions classified as source code for the analysis stage.
const CODE_EXTENSIONS: &[&str] = &["py", "js", "java", "cpp", "ts", "tsx", "cs"];

/// Cap on the decompressed size of the DOCX body entry (zip-bomb protection).
const MAX_DOCUMENT_XML_BYTES: u64 = 50 * 1024 * 1024;

/// Errors raised while extracting text locally.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Payload was not a readable DOCX archive.
    #[error("failed to open document archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// The archive did not contain the expected document body.
    #[error("word/document.xml not found in archive")]
    MissingBody,
    /// Reading or parsing the document body failed.
    #[error("failed to parse document body: {0}")]
    Body(String),
}

/// Coarse classification of a source file passed to the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Source code file.
    Code,
    /// Prose document.
    Document,
}

impl SourceKind {
    /// Wire label used by the analysis prompt.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Document => "doc",
        }
    }
}

/// Classify a file extension as code or document for the analysis stage.
pub fn classify(extension: &str) -> SourceKind {
    if CODE_EXTENSIONS.contains(&extension) {
        SourceKind::Code
    } else {
        SourceKind::Document
    }
}

/// Whether the extension names a plain-text or code format decoded locally.
pub fn is_plain_text(extension: &str) -> bool {
    TEXT_EXTENSIONS.contains(&extension)
}

/// Whether the extension names a structured format with a local extractor.
pub fn is_local_document(extension: &str) -> bool {
    extension == "docx"
}

/// Decode raw bytes as UTF-8, falling back to EUC-KR with undecodable bytes discarded.
///
/// Uploads predate any encoding declaration, so a lossy legacy decode is preferred over
/// failing the task on the first non-UTF-8 byte.
pub fn decode_text_bytes(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let (decoded, _, had_errors) = encoding_rs::EUC_KR.decode(bytes);
    if had_errors {
        tracing::debug!("Legacy decode dropped undecodable bytes");
        decoded.chars().filter(|c| *c != '\u{FFFD}').collect()
    } else {
        decoded.into_owned()
    }
}

/// Extract the text runs from a DOCX payload without any network dependency.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    let mut body_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| ExtractError::MissingBody)?;
        entry
            .take(MAX_DOCUMENT_XML_BYTES)
            .read_to_end(&mut body_xml)
            .map_err(|err| ExtractError::Body(err.to_string()))?;
    }
    if body_xml.len() as u64 >= MAX_DOCUMENT_XML_BYTES {
        return Err(ExtractError::Body(
            "document body exceeds size limit".to_string(),
        ));
    }

    collect_text_runs(&body_xml)
}

/// Walk the document XML and join `w:t` runs, with paragraph breaks for `w:p`.
fn collect_text_runs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut out = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"w:t" => in_text_run = true,
                b"w:p" if !out.is_empty() => out.push('\n'),
                _ => {}
            },
            Ok(Event::End(element)) => {
                if element.name().as_ref() == b"w:t" {
                    in_text_run = false;
                }
            }
            Ok(Event::Text(text)) if in_text_run => {
                let run = text
                    .unescape()
                    .map_err(|err| ExtractError::Body(err.to_string()))?;
                out.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(ExtractError::Body(err.to_string())),
        }
        buf.clear();
    }

    Ok(out)
}
