use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use verity_domain::EvidenceItem;
use verity_providers::{ChatMessage, ModelSpec};

use crate::{
	CapabilityGateway, Error, Result, RunContext, SessionState, StateUpdate, bounded, prompts,
};

const STAGE: &str = "synthesize";

/// Produces an answer from resolved evidence.
pub struct Synthesizer {
	gateway: Arc<dyn CapabilityGateway>,
	timeout_ms: u64,
	no_evidence: String,
	dont_know: String,
}
impl Synthesizer {
	pub fn new(
		gateway: Arc<dyn CapabilityGateway>,
		timeout_ms: u64,
		answers: &verity_config::Answers,
	) -> Self {
		Self {
			gateway,
			timeout_ms,
			no_evidence: answers.no_evidence.clone(),
			dont_know: answers.dont_know.clone(),
		}
	}

	/// Empty evidence yields the no-evidence sentinel without a gateway call. The generated
	/// text is returned as is.
	pub async fn synthesize(
		&self,
		question: &str,
		evidence: &[EvidenceItem],
		prior_turns: &[ChatMessage],
		spec: &ModelSpec,
		cancel: &CancellationToken,
	) -> Result<String> {
		if evidence.is_empty() {
			tracing::info!("No evidence to answer from, returning sentinel.");

			return Ok(self.no_evidence.clone());
		}

		let messages = prompts::answer(question, evidence, prior_turns, &self.dont_know);

		bounded(STAGE, self.timeout_ms, cancel, self.gateway.complete(spec, &messages)).await
	}

	pub async fn run(&self, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		let answer = self
			.synthesize(
				&state.question,
				&state.resolved_evidence,
				&state.prior_turns,
				&ctx.generator,
				&ctx.cancel,
			)
			.await
			.map_err(|err| match err {
				Error::Cancelled { .. } => err,
				other => Error::Stage { stage: STAGE, source: Box::new(other) },
			})?;

		Ok(StateUpdate {
			answer: Some(answer),
			retry_count: Some(state.retry_count + 1),
			synthesize_count: Some(state.synthesize_count + 1),
			validated: Some(false),
			..Default::default()
		})
	}
}
