use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use verity_domain::{EvidenceItem, Verdict, labels};
use verity_providers::ModelSpec;

use crate::{
	CapabilityGateway, Error, Result, RunContext, SessionState, StateUpdate, bounded, prompts,
};

/// Judges whether an answer is grounded in the evidence it was built from.
pub struct Validator {
	gateway: Arc<dyn CapabilityGateway>,
	timeout_ms: u64,
	evidence_chars: usize,
}
impl Validator {
	pub fn new(gateway: Arc<dyn CapabilityGateway>, timeout_ms: u64, evidence_chars: u32) -> Self {
		Self { gateway, timeout_ms, evidence_chars: evidence_chars as usize }
	}

	/// Gateway failures propagate.
	pub async fn validate(
		&self,
		question: &str,
		answer: &str,
		evidence: &[EvidenceItem],
		spec: &ModelSpec,
		cancel: &CancellationToken,
	) -> Result<Verdict> {
		let messages = prompts::validation(question, answer, evidence, self.evidence_chars);
		let label = bounded(
			"validate",
			self.timeout_ms,
			cancel,
			self.gateway.classify(spec, &messages, &labels::GROUNDEDNESS),
		)
		.await?;

		Verdict::from_label(label).ok_or_else(|| Error::Classification {
			message: format!("Unexpected groundedness label {label}."),
		})
	}

	/// A failed validation call counts as `not_grounded`.
	pub async fn run(&self, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		let answer = state.answer.as_deref().unwrap_or_default();
		let res = self
			.validate(&state.question, answer, &state.resolved_evidence, &ctx.helper, &ctx.cancel)
			.await;
		let verdict = match res {
			Ok(verdict) => verdict,
			Err(err @ Error::Cancelled { .. }) => return Err(err),
			Err(err) => {
				tracing::warn!(error = %err, "Validation failed, treating answer as not_grounded.");

				Verdict::NotGrounded
			},
		};

		tracing::info!(
			verdict = ?verdict,
			retry_count = state.retry_count,
			synthesize_count = state.synthesize_count,
			"Answer validated."
		);

		Ok(StateUpdate { validated: Some(verdict == Verdict::Grounded), ..Default::default() })
	}
}
