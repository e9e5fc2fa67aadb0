//! Canonical metadata schema for evidence payloads.
//!
//! Corpora written by different ingestion runs use different names for the same concept. Every
//! synonym is collapsed here so downstream stages only read the canonical keys.

use serde_json::{Map, Value};

pub const VALID_UNTIL: &str = "valid_until";

pub const ID_KEYS: [&str; 4] = ["uuid", "id", "doc_id", "document_id"];
pub const CONTENT_KEYS: [&str; 3] = ["page_content", "content", "text"];
pub const DEADLINE_KEYS: [&str; 6] = [
	"Pateikti_projekta_iki",
	"Pasiulyma_pateikti_iki",
	"pateikti_iki",
	VALID_UNTIL,
	"deadline",
	"expires_on",
];

#[derive(Debug, Default, PartialEq)]
pub struct Normalized {
	pub id: Option<String>,
	pub content: Option<String>,
	pub metadata: Map<String, Value>,
}

/// Collapses synonymous keys. `id_field` is the identifier field the store filters on and wins
/// over the generic identifier synonyms.
pub fn normalize(mut raw: Map<String, Value>, id_field: &str) -> Normalized {
	let id = std::iter::once(id_field)
		.chain(ID_KEYS)
		.find_map(|key| raw.get(key).and_then(identifier));
	let mut content = None;

	for key in CONTENT_KEYS {
		if let Some(value) = raw.remove(key)
			&& content.is_none()
			&& let Value::String(text) = value
		{
			content = Some(text);
		}
	}

	let mut deadline = None;

	for key in DEADLINE_KEYS {
		if let Some(value) = raw.remove(key)
			&& deadline.is_none()
			&& !value.is_null()
		{
			deadline = Some(value);
		}
	}

	if let Some(value) = deadline {
		raw.insert(VALID_UNTIL.to_string(), value);
	}

	Normalized { id, content, metadata: raw }
}

fn identifier(value: &Value) -> Option<String> {
	match value {
		Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}
