use std::sync::Arc;

use crate::{
	CapabilityGateway, Error, Result, RunContext, SessionState, StateUpdate, bounded, prompts,
};

const STAGE: &str = "rewrite_query";

/// Rewrites the question for a fresh retrieval pass.
pub struct QueryRewriter {
	gateway: Arc<dyn CapabilityGateway>,
	timeout_ms: u64,
}
impl QueryRewriter {
	pub fn new(gateway: Arc<dyn CapabilityGateway>, timeout_ms: u64) -> Self {
		Self { gateway, timeout_ms }
	}

	/// Resets the pass counter and drops any sub-question decomposition, which belonged to the
	/// previous wording.
	pub async fn run(&self, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		let messages = prompts::rewrite(&state.question);
		let rewritten = bounded(
			STAGE,
			self.timeout_ms,
			&ctx.cancel,
			self.gateway.complete(&ctx.generator, &messages),
		)
		.await
		.map_err(|err| match err {
			Error::Cancelled { .. } => err,
			other => Error::Stage { stage: STAGE, source: Box::new(other) },
		})?;
		let rewritten = rewritten.trim();
		let question = if rewritten.is_empty() {
			tracing::warn!("Query rewrite returned nothing, keeping the current question.");

			state.question.clone()
		} else {
			rewritten.to_string()
		};

		tracing::info!(question = %question, "Query rewritten.");

		Ok(StateUpdate {
			question: Some(question),
			sub_questions: Some(None),
			retry_count: Some(0),
			..Default::default()
		})
	}
}
