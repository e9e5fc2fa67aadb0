use std::{collections::HashSet, sync::Arc};

use verity_domain::{Corpus, EvidenceItem};

use crate::{
	DocumentFilter, Error, EvidenceStore, Result, RunContext, SessionState, StateUpdate, bounded,
};

/// Summary-corpus similarity search, fanned out per sub-question when a decomposition exists.
pub struct EvidenceRetriever {
	store: Arc<dyn EvidenceStore>,
	summary_k: u32,
	timeout_ms: u64,
}
impl EvidenceRetriever {
	pub fn new(store: Arc<dyn EvidenceStore>, summary_k: u32, timeout_ms: u64) -> Self {
		Self { store, summary_k, timeout_ms }
	}

	pub async fn run(&self, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		let mut degraded = false;
		let sub_questions =
			state.sub_questions.as_deref().filter(|questions| !questions.is_empty());
		let (candidates, decomposed) = match sub_questions {
			Some(questions) => {
				let limit = self.summary_k.div_ceil(2);
				let mut pairs = Vec::new();

				for question in questions {
					let items = self.search(question, limit, ctx, &mut degraded).await?;

					pairs.extend(items.into_iter().map(|item| (question.clone(), item)));
				}

				let mut seen = HashSet::new();
				let candidates = pairs
					.iter()
					.filter(|(_, item)| seen.insert(item.id.clone()))
					.map(|(_, item)| item.clone())
					.collect();

				(candidates, Some(pairs))
			},
			None => (self.search(&state.question, self.summary_k, ctx, &mut degraded).await?, None),
		};

		tracing::info!(
			candidates = candidates.len(),
			sub_questions = sub_questions.map(<[String]>::len).unwrap_or(0),
			degraded,
			"Summary evidence retrieved."
		);

		Ok(StateUpdate {
			candidate_evidence: Some(candidates),
			decomposed_evidence: Some(decomposed),
			evidence_degraded: Some(state.evidence_degraded || degraded),
			..Default::default()
		})
	}

	async fn search(
		&self,
		query: &str,
		limit: u32,
		ctx: &RunContext,
		degraded: &mut bool,
	) -> Result<Vec<EvidenceItem>> {
		let res = bounded(
			"retrieve_evidence",
			self.timeout_ms,
			&ctx.cancel,
			self.store.search(Corpus::Summary, query, limit),
		)
		.await;

		degrade(res, degraded)
	}
}

/// Grades the current candidates.
pub struct EvidenceFilterStage {
	filter: DocumentFilter,
}
impl EvidenceFilterStage {
	pub fn new(filter: DocumentFilter) -> Self {
		Self { filter }
	}

	pub async fn run(&self, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		let outcome = match &state.decomposed_evidence {
			Some(pairs) => self.filter.filter_pairs(pairs.clone(), &ctx.helper, &ctx.cancel).await,
			None =>
				self.filter
					.filter(&state.question, state.candidate_evidence.clone(), &ctx.helper, &ctx.cancel)
					.await,
		};

		Ok(StateUpdate {
			filtered_evidence_ids: Some(outcome.ids),
			filtered_evidence_preview: Some(outcome.retained),
			needs_supplemental_search: Some(outcome.needs_supplemental_search),
			..Default::default()
		})
	}
}

/// Fetches full documents for the retained summary identifiers.
pub struct FullEvidenceResolver {
	store: Arc<dyn EvidenceStore>,
	timeout_ms: u64,
}
impl FullEvidenceResolver {
	pub fn new(store: Arc<dyn EvidenceStore>, timeout_ms: u64) -> Self {
		Self { store, timeout_ms }
	}

	pub async fn run(&self, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		if state.filtered_evidence_ids.is_empty() {
			return Ok(StateUpdate { resolved_evidence: Some(Vec::new()), ..Default::default() });
		}

		let ids = state
			.filtered_evidence_preview
			.iter()
			.map(|item| item.id.clone())
			.filter(|id| state.filtered_evidence_ids.contains(id))
			.collect::<Vec<_>>();
		let mut degraded = false;
		let res = bounded(
			"resolve_full_evidence",
			self.timeout_ms,
			&ctx.cancel,
			self.store.get_by_ids(Corpus::Full, &ids),
		)
		.await;
		let resolved = degrade(res, &mut degraded)?;

		tracing::info!(requested = ids.len(), resolved = resolved.len(), "Full evidence resolved.");

		Ok(StateUpdate {
			resolved_evidence: Some(resolved),
			evidence_degraded: Some(state.evidence_degraded || degraded),
			..Default::default()
		})
	}
}

/// Turns retrieval failures into an empty result. Cancellation still ends the request.
fn degrade(res: Result<Vec<EvidenceItem>>, degraded: &mut bool) -> Result<Vec<EvidenceItem>> {
	match res {
		Ok(items) => Ok(items),
		Err(err @ Error::Cancelled { .. }) => Err(err),
		Err(err) => {
			tracing::warn!(error = %err, "Evidence retrieval degraded to no evidence.");

			*degraded = true;

			Ok(Vec::new())
		},
	}
}
