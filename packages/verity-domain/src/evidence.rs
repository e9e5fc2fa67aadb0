use serde_json::{Map, Value};
use time::Date;

use crate::{expiry, metadata};

/// Named similarity-search corpora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corpus {
	/// Short summaries, searched by similarity and graded.
	Summary,
	/// Full documents, fetched by identifier after grading.
	Full,
}
impl Corpus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Summary => "summary",
			Self::Full => "full",
		}
	}
}

/// Validity deadline as derived from canonical metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deadline {
	On(Date),
	/// Present but not in any accepted date format. Never causes expiry.
	Unparseable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceItem {
	pub id: String,
	pub content: String,
	pub metadata: Map<String, Value>,
	pub validity_deadline: Option<Deadline>,
}
impl EvidenceItem {
	/// Builds an item from already-normalized metadata.
	pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: Map<String, Value>) -> Self {
		let validity_deadline = deadline_from_metadata(&metadata);

		Self { id: id.into(), content: content.into(), metadata, validity_deadline }
	}

	/// Builds an item from a raw store payload, collapsing synonymous keys first.
	///
	/// `id_field` is tried before the generic identifier synonyms; `fallback_id` is used when the
	/// payload carries no identifier at all.
	pub fn from_payload(
		id_field: &str,
		fallback_id: Option<String>,
		payload: Map<String, Value>,
	) -> Option<Self> {
		let normalized = metadata::normalize(payload, id_field);
		let id = normalized.id.or(fallback_id)?;

		Some(Self::new(id, normalized.content.unwrap_or_default(), normalized.metadata))
	}

	pub fn is_expired(&self, today: Date) -> bool {
		matches!(self.validity_deadline, Some(Deadline::On(deadline)) if deadline < today)
	}
}

fn deadline_from_metadata(metadata: &Map<String, Value>) -> Option<Deadline> {
	match metadata.get(metadata::VALID_UNTIL)? {
		Value::Null => None,
		Value::String(raw) if raw.trim().is_empty() => None,
		Value::String(raw) => Some(
			expiry::parse_deadline(raw)
				.map(Deadline::On)
				.unwrap_or_else(|| Deadline::Unparseable(raw.clone())),
		),
		other => Some(Deadline::Unparseable(other.to_string())),
	}
}
