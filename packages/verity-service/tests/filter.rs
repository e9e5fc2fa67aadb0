use std::{
	collections::BTreeSet,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use verity_domain::{EvidenceItem, LabelSchema};
use verity_providers::{ChatMessage, ModelSpec};
use verity_service::{BoxFuture, CapabilityGateway, DocumentFilter, Error, Result};
use verity_testkit::{ScriptedGateway, item, item_with_deadline, last_user};

fn spec() -> ModelSpec {
	ModelSpec { model: "helper-model".to_string(), temperature: 0.0, max_tokens: 16 }
}

fn filter_with(
	gateway: Arc<dyn CapabilityGateway>,
	batch_size: u32,
	max_concurrency: u32,
) -> DocumentFilter {
	let cfg = verity_config::Filter { batch_size, max_concurrency, min_evidence: 4 };

	DocumentFilter::new(gateway, &cfg, 1_000)
}

fn ids(outcome_ids: &BTreeSet<String>) -> Vec<&str> {
	outcome_ids.iter().map(String::as_str).collect()
}

/// Relevant when the document mentions a roof.
fn roof_grader() -> ScriptedGateway {
	ScriptedGateway::new().on_classify(|_, messages| {
		Ok(if last_user(messages).contains("stogas") { "yes" } else { "no" })
	})
}

struct InFlightGateway {
	current: AtomicUsize,
	peak: AtomicUsize,
}
impl CapabilityGateway for InFlightGateway {
	fn complete<'a>(
		&'a self,
		_spec: &'a ModelSpec,
		_messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(String::new()) })
	}

	fn classify<'a>(
		&'a self,
		_spec: &'a ModelSpec,
		_messages: &'a [ChatMessage],
		_schema: &'a LabelSchema,
	) -> BoxFuture<'a, Result<&'static str>> {
		Box::pin(async move {
			let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;

			self.peak.fetch_max(now, Ordering::SeqCst);

			tokio::time::sleep(Duration::from_millis(20)).await;

			self.current.fetch_sub(1, Ordering::SeqCst);

			Ok("yes")
		})
	}
}

#[tokio::test]
async fn expiry_filtering_is_order_independent() {
	let a = item_with_deadline("a", "stogas A", "2001-01-01");
	let b = item_with_deadline("b", "stogas B", "2999-12-31");
	let c = item_with_deadline("c", "stogas C", "31.12.2999");
	let filter = filter_with(Arc::new(roof_grader()), 3, 10);
	let cancel = CancellationToken::new();
	let forward = filter.filter("stogai", vec![a.clone(), b.clone(), c.clone()], &spec(), &cancel).await;
	let shuffled = filter.filter("stogai", vec![c, a, b], &spec(), &cancel).await;

	assert_eq!(forward.ids, shuffled.ids);
	assert_eq!(ids(&forward.ids), vec!["b", "c"]);
}

#[tokio::test]
async fn unparseable_deadline_is_retained() {
	let gateway = Arc::new(roof_grader());
	let filter = filter_with(gateway.clone(), 3, 10);
	let items = vec![
		item_with_deadline("garbled", "stogas", "iki kovo pabaigos"),
		item_with_deadline("expired", "stogas", "2001-01-01"),
	];
	let outcome = filter.filter("stogai", items, &spec(), &CancellationToken::new()).await;

	assert_eq!(ids(&outcome.ids), vec!["garbled"]);
	// The expired item never reaches the grader.
	assert_eq!(gateway.classify_count(), 1);
}

#[tokio::test]
async fn batching_does_not_change_the_retained_set() {
	let items = (0..7)
		.map(|idx| {
			let content = if idx % 2 == 0 { format!("stogas {idx}") } else { format!("langai {idx}") };

			item(&format!("doc-{idx}"), &content)
		})
		.collect::<Vec<_>>();
	let single = filter_with(Arc::new(roof_grader()), 7, 10)
		.filter("stogai", items.clone(), &spec(), &CancellationToken::new())
		.await;

	for batch_size in [1, 2, 3, 4] {
		let batched = filter_with(Arc::new(roof_grader()), batch_size, 2)
			.filter("stogai", items.clone(), &spec(), &CancellationToken::new())
			.await;

		assert_eq!(batched.ids, single.ids, "batch size {batch_size}");
	}

	assert_eq!(ids(&single.ids), vec!["doc-0", "doc-2", "doc-4", "doc-6"]);
}

#[tokio::test]
async fn supplemental_search_flag_follows_minimum() {
	let three = (0..3).map(|idx| item(&format!("d{idx}"), "stogas")).collect::<Vec<_>>();
	let four = (0..4).map(|idx| item(&format!("d{idx}"), "stogas")).collect::<Vec<_>>();
	let filter = filter_with(Arc::new(roof_grader()), 3, 10);
	let cancel = CancellationToken::new();

	assert!(filter.filter("stogai", three, &spec(), &cancel).await.needs_supplemental_search);
	assert!(!filter.filter("stogai", four, &spec(), &cancel).await.needs_supplemental_search);
	assert!(filter.filter("stogai", Vec::new(), &spec(), &cancel).await.needs_supplemental_search);
}

#[tokio::test]
async fn grading_failure_drops_only_that_item() {
	let gateway = ScriptedGateway::new().on_classify(|_, messages| {
		if last_user(messages).contains("broken") {
			return Err(Error::Classification { message: "Label maybe is not allowed.".to_string() });
		}

		Ok("taip")
	});
	let items = vec![item("a", "stogas"), item("b", "broken"), item("c", "stogas")];
	let outcome = filter_with(Arc::new(gateway), 3, 10)
		.filter("stogai", items, &spec(), &CancellationToken::new())
		.await;

	assert_eq!(ids(&outcome.ids), vec!["a", "c"]);
	assert_eq!(outcome.retained.iter().map(|item| item.id.as_str()).collect::<Vec<_>>(), ["a", "c"]);
}

#[tokio::test]
async fn grading_timeout_drops_the_item() {
	let gateway = ScriptedGateway::new().with_delay(Duration::from_millis(300));
	let cfg = verity_config::Filter { batch_size: 3, max_concurrency: 10, min_evidence: 4 };
	let filter = DocumentFilter::new(Arc::new(gateway), &cfg, 20);
	let outcome = filter
		.filter("stogai", vec![item("a", "stogas"), item("b", "stogas")], &spec(), &CancellationToken::new())
		.await;

	assert!(outcome.ids.is_empty());
	assert!(!outcome.cancelled);
	assert!(outcome.needs_supplemental_search);
}

#[tokio::test]
async fn in_flight_grading_calls_respect_the_pool_width() {
	let gateway = Arc::new(InFlightGateway { current: AtomicUsize::new(0), peak: AtomicUsize::new(0) });
	let items = (0..12).map(|idx| item(&format!("d{idx}"), "stogas")).collect::<Vec<_>>();
	let outcome = filter_with(gateway.clone(), 1, 3)
		.filter("stogai", items, &spec(), &CancellationToken::new())
		.await;

	assert_eq!(outcome.ids.len(), 12);
	assert!(gateway.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn cancellation_returns_what_was_collected() {
	let gateway = ScriptedGateway::new().with_delay(Duration::from_secs(5));
	let filter = filter_with(Arc::new(gateway), 1, 10);
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();

	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(50)).await;
		trigger.cancel();
	});

	let items = (0..5).map(|idx| item(&format!("d{idx}"), "stogas")).collect::<Vec<_>>();
	let outcome = tokio::time::timeout(
		Duration::from_secs(2),
		filter.filter("stogai", items, &spec(), &cancel),
	)
	.await
	.expect("Cancelled filtering must return promptly.");

	assert!(outcome.cancelled);
	assert!(outcome.ids.is_empty());
}

#[tokio::test]
async fn sub_question_pairs_use_their_own_question() {
	let gateway = ScriptedGateway::new().on_classify(|_, messages| {
		let prompt = last_user(messages);
		let relevant = (prompt.contains("Question: langai") && prompt.contains("Langų keitimas"))
			|| (prompt.contains("Question: stogai") && prompt.contains("Stogo dangos"));

		Ok(if relevant { "yes" } else { "no" })
	});
	let windows = item("w", "Langų keitimas mokykloje");
	let roof = item("r", "Stogo dangos remontas");
	let pairs: Vec<(String, EvidenceItem)> = vec![
		("langai".to_string(), windows.clone()),
		("stogai".to_string(), windows.clone()),
		("stogai".to_string(), roof.clone()),
		("langai".to_string(), roof),
	];
	let outcome = filter_with(Arc::new(gateway), 3, 10)
		.filter_pairs(pairs, &spec(), &CancellationToken::new())
		.await;

	assert_eq!(ids(&outcome.ids), vec!["r", "w"]);
	assert_eq!(outcome.retained.len(), 2);
	assert_eq!(outcome.retained[0], windows);
}

#[tokio::test]
async fn grader_sees_location_metadata() {
	let gateway = ScriptedGateway::new().on_classify(|_, messages| {
		Ok(if last_user(messages).contains("Vieta: Klaipėda") { "yes" } else { "no" })
	});
	let located = |id: &str, city: &str| {
		let mut metadata = Map::new();

		metadata.insert("Vieta".to_string(), Value::String(city.to_string()));

		EvidenceItem::new(id, "Stogo remontas", metadata)
	};
	let outcome = filter_with(Arc::new(gateway), 3, 10)
		.filter(
			"stogai Klaipėdoje",
			vec![located("k", "Klaipėda"), located("v", "Vilnius")],
			&spec(),
			&CancellationToken::new(),
		)
		.await;

	assert_eq!(ids(&outcome.ids), vec!["k"]);
}
