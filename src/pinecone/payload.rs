//! Helpers for constructing and reading Pinecone vector metadata.

use crate::processing::Chunk;
use serde_json::{Map, Value};
use time::{OffsetDateTime, macros::format_description};
use uuid::Uuid;

/// Metadata key under which chunk text is stored.
pub const TEXT_KEY: &str = "text";

/// Build the metadata object stored alongside each indexed chunk.
pub(crate) fn build_metadata(chunk: &Chunk) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(TEXT_KEY.into(), Value::String(chunk.text.clone()));
    metadata.insert("chunk_index".into(), Value::from(chunk.chunk_index));
    metadata.insert(
        "upload_date".into(),
        Value::String(chunk.upload_date.clone()),
    );
    metadata
}

/// Pull the chunk text back out of a match's metadata.
pub(crate) fn extract_text(metadata: Option<&Map<String, Value>>) -> Option<String> {
    match metadata?.get(TEXT_KEY)? {
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

/// Current timestamp formatted as `YYYY-MM-DD HH:MM:SS.ffffff` (UTC).
pub fn upload_timestamp() -> String {
    let format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_else(|_| "1970-01-01 00:00:00.000000".to_string())
}

/// Construct an identifier for a new vector.
pub(crate) fn generate_vector_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_carries_text_index_and_date() {
        let chunk = Chunk {
            text: "sample".into(),
            chunk_index: 4,
            upload_date: "2025-01-01 00:00:00.000000".into(),
        };
        let metadata = build_metadata(&chunk);
        assert_eq!(metadata["text"], "sample");
        assert_eq!(metadata["chunk_index"], 4);
        assert_eq!(metadata["upload_date"], "2025-01-01 00:00:00.000000");
    }

    #[test]
    fn text_is_extracted_only_when_it_is_a_string() {
        let mut metadata = Map::new();
        metadata.insert("text".into(), Value::from(12));
        assert_eq!(extract_text(Some(&metadata)), None);
        assert_eq!(extract_text(None), None);

        metadata.insert("text".into(), Value::String("body".into()));
        assert_eq!(extract_text(Some(&metadata)).as_deref(), Some("body"));
    }

    #[test]
    fn timestamp_has_microsecond_precision() {
        let ts = upload_timestamp();
        assert_eq!(ts.len(), "2025-01-01 00:00:00.000000".len());
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn vector_ids_are_unique() {
        assert_ne!(generate_vector_id(), generate_vector_id());
    }
}
