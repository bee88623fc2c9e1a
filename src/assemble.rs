//! Pure transforms from extracted chapter content to a document payload and a
//! collision-safe file name.

/// Characters that are illegal in file names on at least one common filesystem.
const ILLEGAL_FILE_NAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

pub const DOCUMENT_EXTENSION: &str = "md";

/// A structured document ready for a sink: one heading plus ordered body blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    pub heading: String,
    pub blocks: Vec<String>,
}

/// Strip filesystem-illegal characters from a path component.
///
/// Idempotent, and never introduces characters it strips.
pub fn sanitize_file_name_component(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !ILLEGAL_FILE_NAME_CHARS.contains(ch))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// File name for a series chapter.
///
/// The sequence-number prefix disambiguates chapters with identical titles, so
/// names are distinct across a series regardless of title collisions.
pub fn chapter_file_name(sequence_number: u32, title: &str) -> String {
    let sanitized = sanitize_file_name_component(title);
    if sanitized.is_empty() {
        format!("chapter_{sequence_number:03}.{DOCUMENT_EXTENSION}")
    } else {
        format!("chapter_{sequence_number:03}_{sanitized}.{DOCUMENT_EXTENSION}")
    }
}

/// Assemble a series chapter into a document payload and file name.
///
/// Body blocks map one-to-one onto source paragraphs. Inputs are not mutated;
/// paragraph cleanup happens at extraction time.
pub fn assemble(title: &str, paragraphs: &[String], sequence_number: u32) -> (DocumentPayload, String) {
    let payload = DocumentPayload {
        heading: format!("Chapter {sequence_number}: {title}"),
        blocks: paragraphs.to_vec(),
    };
    (payload, chapter_file_name(sequence_number, title))
}

/// Assemble a chapter downloaded outside any series context: bare title as the
/// heading, no sequence prefix in the file name.
pub fn assemble_standalone(title: &str, paragraphs: &[String]) -> (DocumentPayload, String) {
    let payload = DocumentPayload {
        heading: title.to_owned(),
        blocks: paragraphs.to_vec(),
    };
    let sanitized = sanitize_file_name_component(title);
    let file_name = if sanitized.is_empty() {
        format!("untitled.{DOCUMENT_EXTENSION}")
    } else {
        format!("{sanitized}.{DOCUMENT_EXTENSION}")
    };
    (payload, file_name)
}
