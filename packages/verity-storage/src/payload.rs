use std::collections::HashMap;

use qdrant_client::qdrant::{PointId, Value, point_id::PointIdOptions, value::Kind};
use serde_json::{Map, Number, Value as JsonValue};

use verity_domain::EvidenceItem;

/// Converts a stored point into an evidence item, normalizing its metadata keys.
///
/// The identifier comes from `id_field` when present so that it matches what
/// [`crate::qdrant::QdrantStore::get_by_ids`] filters on.
pub fn evidence_from_point(
	id_field: &str,
	point_id: Option<&PointId>,
	payload: HashMap<String, Value>,
) -> Option<EvidenceItem> {
	let fallback_id = point_id.and_then(point_id_to_string);
	let item = EvidenceItem::from_payload(id_field, fallback_id, payload_to_json(payload));

	if item.is_none() {
		tracing::warn!("Stored point has no usable identifier.");
	}

	item
}

pub fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		None => None,
	}
}

pub fn payload_to_json(payload: HashMap<String, Value>) -> Map<String, JsonValue> {
	payload.into_iter().map(|(key, value)| (key, value_to_json(value))).collect()
}

fn value_to_json(value: Value) -> JsonValue {
	match value.kind {
		None | Some(Kind::NullValue(_)) => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(number).map(JsonValue::Number).unwrap_or(JsonValue::Null),
		Some(Kind::StringValue(text)) => JsonValue::String(text),
		Some(Kind::ListValue(list)) =>
			JsonValue::Array(list.values.into_iter().map(value_to_json).collect()),
		Some(Kind::StructValue(object)) => JsonValue::Object(payload_to_json(object.fields)),
	}
}
