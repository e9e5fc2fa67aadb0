use std::collections::BTreeSet;

use serde_json::{Map, Value, json};
use time::macros::date;

use verity_domain::{Deadline, EvidenceItem, expiry, small_talk};

fn item(id: &str, deadline: Option<&str>) -> EvidenceItem {
	let mut payload = Map::new();

	payload.insert("uuid".to_string(), Value::String(id.to_string()));
	payload.insert("page_content".to_string(), Value::String(format!("Objektas {id}")));

	if let Some(deadline) = deadline {
		payload.insert("Pasiulyma_pateikti_iki".to_string(), Value::String(deadline.to_string()));
	}

	EvidenceItem::from_payload("uuid", None, payload).expect("Payload must carry an identifier.")
}

fn surviving(items: &[EvidenceItem]) -> BTreeSet<String> {
	let today = date!(2025 - 06 - 01);

	items.iter().filter(|item| !item.is_expired(today)).map(|item| item.id.clone()).collect()
}

#[test]
fn expiration_is_order_independent() {
	let a = item("a", Some("2025-05-31"));
	let b = item("b", Some("01.06.2025"));
	let c = item("c", None);
	let forward = surviving(&[a.clone(), b.clone(), c.clone()]);
	let rotated = surviving(&[c, a, b]);

	assert_eq!(forward, rotated);
	assert_eq!(forward, BTreeSet::from(["b".to_string(), "c".to_string()]));
}

#[test]
fn unparseable_deadlines_fail_open() {
	for raw in ["rugsėjo 5 d.", "31/31/31", "ASAP", "2025.13.01"] {
		let evidence = item("x", Some(raw));

		assert!(
			matches!(evidence.validity_deadline, Some(Deadline::Unparseable(_))),
			"{raw} must be kept as unparseable"
		);
		assert!(!evidence.is_expired(date!(2099 - 12 - 31)), "{raw} must never expire");
	}
}

#[test]
fn payload_synonyms_reach_the_canonical_deadline() {
	let mut payload = json!({ "id": "p-1", "content": "Fasado šiltinimas", "pateikti_iki": "2024/12/31" })
		.as_object()
		.cloned()
		.expect("Payload must be an object.");

	payload.insert("city".to_string(), json!("Vilnius"));

	let evidence = EvidenceItem::from_payload("uuid", None, payload).expect("Payload must carry an id.");

	assert_eq!(evidence.id, "p-1");
	assert_eq!(evidence.content, "Fasado šiltinimas");
	assert_eq!(evidence.validity_deadline, Some(Deadline::On(date!(2024 - 12 - 31))));
	assert!(evidence.is_expired(date!(2025 - 01 - 01)));
}

#[test]
fn today_is_a_real_date() {
	let today = expiry::today();

	assert!(today.year() >= 2024);
}

#[test]
fn greeting_is_recognized_as_small_talk() {
	assert_eq!(small_talk::match_pattern("labas"), Some("labas"));
	assert!(small_talk::canned_reply("labas").is_some());
}
