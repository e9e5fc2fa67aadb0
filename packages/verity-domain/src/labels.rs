use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A closed set of labels a classifier may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSchema {
	pub name: &'static str,
	pub labels: &'static [&'static str],
}
impl LabelSchema {
	/// Maps a raw classifier reply onto the schema after one normalization pass.
	///
	/// The pass trims whitespace, quotes and trailing periods, lowercases, and unwraps a JSON
	/// object holding exactly one string value (for example `{"binary_score": "yes"}`).
	pub fn resolve(&self, raw: &str) -> Option<&'static str> {
		let candidate = unwrap_json_label(raw).unwrap_or_else(|| raw.to_string());
		let normalized = normalize_label(&candidate);

		self.labels.iter().copied().find(|label| *label == normalized)
	}
}

pub const INTENT: LabelSchema =
	LabelSchema { name: "intent", labels: &["chit_chat", "work_related"] };

pub const RELEVANCE: LabelSchema = LabelSchema {
	name: "relevance",
	labels: &["yes", "no", "relevant", "not_relevant", "true", "false", "1", "0", "taip", "ne"],
};

pub const GROUNDEDNESS: LabelSchema =
	LabelSchema { name: "groundedness", labels: &["grounded", "not_grounded"] };

const AFFIRMATIVE: [&str; 5] = ["yes", "relevant", "true", "1", "taip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	ChitChat,
	WorkRelated,
}
impl Intent {
	pub fn from_label(label: &str) -> Option<Self> {
		match label {
			"chit_chat" => Some(Self::ChitChat),
			"work_related" => Some(Self::WorkRelated),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
	Grounded,
	NotGrounded,
}
impl Verdict {
	pub fn from_label(label: &str) -> Option<Self> {
		match label {
			"grounded" => Some(Self::Grounded),
			"not_grounded" => Some(Self::NotGrounded),
			_ => None,
		}
	}
}

/// Whether a relevance label keeps the graded item.
pub fn is_affirmative(label: &str) -> bool {
	AFFIRMATIVE.contains(&normalize_label(label).as_str())
}

fn normalize_label(raw: &str) -> String {
	raw.trim().trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.') || c.is_whitespace()).to_lowercase()
}

fn unwrap_json_label(raw: &str) -> Option<String> {
	let Value::Object(map) = serde_json::from_str::<Value>(raw.trim()).ok()? else {
		return None;
	};

	if map.len() != 1 {
		return None;
	}

	map.into_iter().next().and_then(|(_, value)| match value {
		Value::String(text) => Some(text),
		Value::Bool(flag) => Some(flag.to_string()),
		_ => None,
	})
}
