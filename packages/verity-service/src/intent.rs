use std::sync::Arc;

use verity_domain::{Intent, labels, small_talk};

use crate::{
	CapabilityGateway, Error, Result, RunContext, SessionState, StateUpdate, bounded, prompts,
};

/// Routes small talk away from retrieval.
pub struct IntentClassifier {
	gateway: Arc<dyn CapabilityGateway>,
	timeout_ms: u64,
}
impl IntentClassifier {
	pub fn new(gateway: Arc<dyn CapabilityGateway>, timeout_ms: u64) -> Self {
		Self { gateway, timeout_ms }
	}

	/// Dictionary match first, then the helper model. Any failure other than cancellation
	/// resolves to [`Intent::WorkRelated`].
	pub async fn run(&self, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		let intent = self.classify(&state.question, ctx).await?;

		tracing::info!(intent = ?intent, "Intent classified.");

		Ok(StateUpdate { intent: Some(intent), ..Default::default() })
	}

	async fn classify(&self, question: &str, ctx: &RunContext) -> Result<Intent> {
		if let Some(pattern) = small_talk::match_pattern(question) {
			tracing::debug!(pattern, "Small-talk dictionary matched.");

			return Ok(Intent::ChitChat);
		}

		let messages = prompts::intent(question);
		let res = bounded(
			"classify_intent",
			self.timeout_ms,
			&ctx.cancel,
			self.gateway.classify(&ctx.helper, &messages, &labels::INTENT),
		)
		.await;

		match res {
			Ok(label) => Ok(Intent::from_label(label).unwrap_or(Intent::WorkRelated)),
			Err(err @ Error::Cancelled { .. }) => Err(err),
			Err(err) => {
				tracing::warn!(error = %err, "Intent classification failed, assuming work_related.");

				Ok(Intent::WorkRelated)
			},
		}
	}
}

/// Answers small talk without touching the evidence store.
pub struct ChitChatResponder {
	gateway: Arc<dyn CapabilityGateway>,
	timeout_ms: u64,
	fallback: String,
}
impl ChitChatResponder {
	pub fn new(gateway: Arc<dyn CapabilityGateway>, timeout_ms: u64, fallback: String) -> Self {
		Self { gateway, timeout_ms, fallback }
	}

	pub async fn run(&self, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		if let Some(reply) = small_talk::canned_reply(&state.question) {
			return Ok(StateUpdate { answer: Some(reply.to_string()), ..Default::default() });
		}

		let messages = prompts::chit_chat(&state.question, &state.prior_turns);
		let res = bounded(
			"answer_chit_chat",
			self.timeout_ms,
			&ctx.cancel,
			self.gateway.complete(&ctx.generator, &messages),
		)
		.await;
		let answer = match res {
			Ok(reply) => reply,
			Err(err @ Error::Cancelled { .. }) => return Err(err),
			Err(err) => {
				tracing::warn!(error = %err, "Chit-chat reply failed, using fallback.");

				self.fallback.clone()
			},
		};

		Ok(StateUpdate { answer: Some(answer), ..Default::default() })
	}
}
