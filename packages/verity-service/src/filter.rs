use std::{collections::BTreeSet, sync::Arc};

use time::Date;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use verity_domain::{Deadline, EvidenceItem, expiry, labels};
use verity_providers::ModelSpec;

use crate::{CapabilityGateway, Error, bounded, prompts};

const STAGE: &str = "filter_evidence";

/// Result of one filtering call.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
	pub ids: BTreeSet<String>,
	/// Retained items in input order, one per identifier.
	pub retained: Vec<EvidenceItem>,
	pub needs_supplemental_search: bool,
	/// Set when cancellation cut grading short. The outcome then holds what was collected.
	pub cancelled: bool,
}

/// Expiry filtering plus concurrent relevance grading.
///
/// Every call builds its own pool: a semaphore bounding in-flight grading calls and a join set of
/// batch tasks. Nothing is shared across calls.
pub struct DocumentFilter {
	gateway: Arc<dyn CapabilityGateway>,
	batch_size: usize,
	max_concurrency: usize,
	min_evidence: usize,
	classify_timeout_ms: u64,
}
impl DocumentFilter {
	pub fn new(
		gateway: Arc<dyn CapabilityGateway>,
		cfg: &verity_config::Filter,
		classify_timeout_ms: u64,
	) -> Self {
		Self {
			gateway,
			batch_size: cfg.batch_size.max(1) as usize,
			max_concurrency: cfg.max_concurrency.max(1) as usize,
			min_evidence: cfg.min_evidence as usize,
			classify_timeout_ms,
		}
	}

	pub async fn filter(
		&self,
		question: &str,
		items: Vec<EvidenceItem>,
		spec: &ModelSpec,
		cancel: &CancellationToken,
	) -> FilterOutcome {
		let pairs = items.into_iter().map(|item| (question.to_string(), item)).collect();

		self.filter_pairs(pairs, spec, cancel).await
	}

	/// Filters `(question, item)` pairs. Each pair is graded against its own question.
	pub async fn filter_pairs(
		&self,
		pairs: Vec<(String, EvidenceItem)>,
		spec: &ModelSpec,
		cancel: &CancellationToken,
	) -> FilterOutcome {
		let today = expiry::today();
		let total = pairs.len();
		let survivors = pairs
			.into_iter()
			.enumerate()
			.filter(|(_, (_, item))| keep_unexpired(item, today))
			.map(|(idx, (question, item))| Graded { idx, question, item })
			.collect::<Vec<_>>();

		tracing::info!(total, unexpired = survivors.len(), "Expiry pass finished.");

		let (mut retained, cancelled) = self.grade(survivors, spec, cancel).await;

		retained.sort_by_key(|graded| graded.idx);

		let mut ids = BTreeSet::new();
		let retained = retained
			.into_iter()
			.filter(|graded| ids.insert(graded.item.id.clone()))
			.map(|graded| graded.item)
			.collect::<Vec<_>>();
		let needs_supplemental_search = ids.len() < self.min_evidence;

		tracing::info!(
			retained = ids.len(),
			min_evidence = self.min_evidence,
			needs_supplemental_search,
			cancelled,
			"Relevance grading finished."
		);

		FilterOutcome { ids, retained, needs_supplemental_search, cancelled }
	}

	async fn grade(
		&self,
		survivors: Vec<Graded>,
		spec: &ModelSpec,
		cancel: &CancellationToken,
	) -> (Vec<Graded>, bool) {
		let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
		let mut tasks = JoinSet::new();
		let mut survivors = survivors.into_iter().peekable();

		while survivors.peek().is_some() {
			let batch = survivors.by_ref().take(self.batch_size).collect::<Vec<_>>();
			let worker = BatchWorker {
				gateway: self.gateway.clone(),
				semaphore: semaphore.clone(),
				spec: spec.clone(),
				cancel: cancel.clone(),
				timeout_ms: self.classify_timeout_ms,
			};

			tasks.spawn(worker.run(batch));
		}

		let mut retained = Vec::new();

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					tasks.abort_all();

					tracing::warn!(
						collected = retained.len(),
						"Relevance grading cancelled, keeping collected items."
					);

					return (retained, true);
				},
				joined = tasks.join_next() => match joined {
					Some(Ok(kept)) => retained.extend(kept),
					Some(Err(err)) => tracing::error!(error = %err, "Grading batch task failed."),
					None => break,
				},
			}
		}

		(retained, false)
	}
}

/// Drops items whose deadline is strictly before `today`. Unparseable deadlines are kept.
pub fn drop_expired(items: Vec<EvidenceItem>, today: Date) -> Vec<EvidenceItem> {
	items.into_iter().filter(|item| keep_unexpired(item, today)).collect()
}

fn keep_unexpired(item: &EvidenceItem, today: Date) -> bool {
	if let Some(Deadline::Unparseable(raw)) = &item.validity_deadline {
		tracing::warn!(item_id = %item.id, deadline = %raw, "Unparseable deadline, keeping item.");
	}

	!item.is_expired(today)
}

struct Graded {
	idx: usize,
	question: String,
	item: EvidenceItem,
}

struct BatchWorker {
	gateway: Arc<dyn CapabilityGateway>,
	semaphore: Arc<Semaphore>,
	spec: ModelSpec,
	cancel: CancellationToken,
	timeout_ms: u64,
}
impl BatchWorker {
	async fn run(self, batch: Vec<Graded>) -> Vec<Graded> {
		let mut kept = Vec::with_capacity(batch.len());

		for graded in batch {
			let Ok(_permit) = self.semaphore.acquire().await else {
				break;
			};

			match self.grade_one(&graded).await {
				Ok(true) => kept.push(graded),
				Ok(false) => {},
				Err(Error::Cancelled { .. }) => break,
				Err(err) => {
					tracing::error!(
						item_id = %graded.item.id,
						error = %err,
						"Relevance grading failed, dropping item."
					);
				},
			}
		}

		kept
	}

	async fn grade_one(&self, graded: &Graded) -> crate::Result<bool> {
		let messages = prompts::relevance(&graded.question, &graded.item);
		let label = bounded(
			STAGE,
			self.timeout_ms,
			&self.cancel,
			self.gateway.classify(&self.spec, &messages, &labels::RELEVANCE),
		)
		.await?;

		Ok(labels::is_affirmative(label))
	}
}
