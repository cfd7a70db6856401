//! Typed chunk model and the total coercion mapping applied at the analysis boundary.
//!
//! The language model returns loosely shaped JSON. Every field is coerced into its
//! declared shape exactly once, here, so the index writer only ever sees values the
//! index schema can accept.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of structured content produced by the analyzer, destined for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Chunk {
    /// Unique identifier within a run.
    pub id: String,
    /// Groups chunks derived from the same source document.
    pub parent_id: String,
    /// Primary chunk body.
    pub content: String,
    /// Document-level summary shared by sibling chunks.
    pub parent_summary: String,
    /// Summary of this chunk alone.
    pub chunk_summary: String,
    /// Narrative explanation of code behavior.
    pub code_explanation: String,
    /// Captured design intent.
    pub design_intent: String,
    /// Handover/operational notes.
    pub handover_notes: String,
    /// Comment strings lifted from the source.
    pub code_comments: Vec<String>,
    /// Timestamp assigned during indexing when absent.
    pub processed_date: Option<String>,
    /// PARA-style category label.
    pub para_category: String,
    /// Source file type label.
    pub file_type: String,
    /// Programming or natural language.
    pub language: String,
    /// Framework association.
    pub framework: String,
    /// Service-domain tag.
    pub service_domain: String,
    /// Whether the source is archived material.
    pub is_archived: bool,
    /// Free-form tag list.
    pub tags: Vec<String>,
    /// Related document sections.
    pub related_section: Vec<String>,
    /// Source file name.
    pub file_name: String,
    /// Source file path.
    pub file_path: String,
    /// Origin URL of the stored payload.
    pub url: String,
    /// Opaque serialized chunk metadata, forwarded untouched.
    pub chunk_meta: String,
    /// Opaque serialized code metadata, forwarded untouched.
    pub code_metadata: String,
    /// Opaque serialized people list, forwarded untouched.
    pub involved_people: String,
    /// Raw code body, forwarded untouched.
    pub raw_code: String,
    /// Related file list.
    pub related_files: Vec<String>,
}

/// Pipeline-provided defaults applied when the analyzer omits identity fields.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    /// Parent identifier grouping every chunk of this run (the task id).
    pub parent_id: String,
    /// Original source file name.
    pub file_name: String,
}

impl Chunk {
    /// Build a typed chunk from one loosely shaped analyzer item.
    ///
    /// Total: every input maps to a valid chunk. Idempotent: feeding a serialized chunk
    /// back through yields an equal chunk.
    pub fn from_value(value: &Value, context: &ChunkContext) -> Self {
        let field = |name: &str| value.get(name);

        let mut id = coerce_string(field("id"));
        if id.trim().is_empty() {
            id = uuid::Uuid::new_v4().to_string();
        }
        let mut parent_id = coerce_string(field("parentId"));
        if parent_id.trim().is_empty() {
            parent_id = context.parent_id.clone();
        }
        let mut file_name = coerce_string(field("fileName"));
        if file_name.trim().is_empty() {
            file_name = context.file_name.clone();
        }

        Self {
            id,
            parent_id,
            content: coerce_string(field("content")),
            parent_summary: coerce_string(field("parentSummary")),
            chunk_summary: coerce_string(field("chunkSummary")),
            code_explanation: coerce_string(field("codeExplanation")),
            design_intent: coerce_string(field("designIntent")),
            handover_notes: coerce_string(field("handoverNotes")),
            code_comments: coerce_string_list(field("codeComments")),
            processed_date: coerce_optional_string(field("processedDate")),
            para_category: coerce_string(field("paraCategory")),
            file_type: coerce_string(field("fileType")),
            language: coerce_string(field("language")),
            framework: coerce_string(field("framework")),
            service_domain: coerce_string(field("serviceDomain")),
            is_archived: coerce_bool(field("isArchived")),
            tags: coerce_string_list(field("tags")),
            related_section: coerce_string_list(field("relatedSection")),
            file_name,
            file_path: coerce_string(field("filePath")),
            url: coerce_string(field("url")),
            chunk_meta: coerce_opaque(field("chunkMeta")),
            code_metadata: coerce_opaque(field("codeMetadata")),
            involved_people: coerce_opaque(field("involvedPeople")),
            raw_code: coerce_string(field("rawCode")),
            related_files: coerce_string_list(field("relatedFiles")),
        }
    }
}

/// Coerce any JSON value into a scalar string; null and absence become empty.
fn coerce_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn coerce_optional_string(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Coerce any JSON value into a list of strings.
///
/// Arrays stringify each element; comma-separated strings split on the commas; any other
/// scalar wraps into a single-element list.
fn coerce_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(stringify_element).collect(),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else if trimmed.contains(',') {
                trimmed
                    .split(',')
                    .map(|part| part.trim().to_string())
                    .collect()
            } else {
                vec![text.clone()]
            }
        }
        Some(other) => vec![other.to_string()],
    }
}

fn stringify_element(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Opaque payload fields: strings pass through verbatim, structured values are carried
/// as their compact JSON serialization, never interpreted.
fn coerce_opaque(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
