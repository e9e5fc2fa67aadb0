use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use verity_config::Config;
use verity_domain::Intent;
use verity_providers::ModelSpec;

use crate::{
	CapabilityGateway, DocumentFilter, Error, EvidenceStore, Result, SessionState, StateUpdate,
	intent::{ChitChatResponder, IntentClassifier},
	retrieve::{EvidenceFilterStage, EvidenceRetriever, FullEvidenceResolver},
	rewrite::QueryRewriter,
	synthesize::Synthesizer,
	validate::Validator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
	Start,
	ClassifyIntent,
	AnswerChitChat,
	RetrieveEvidence,
	FilterEvidence,
	ResolveFullEvidence,
	Synthesize,
	Validate,
	RewriteQuery,
	Done,
}
impl Node {
	pub fn name(self) -> &'static str {
		match self {
			Self::Start => "start",
			Self::ClassifyIntent => "classify_intent",
			Self::AnswerChitChat => "answer_chit_chat",
			Self::RetrieveEvidence => "retrieve_evidence",
			Self::FilterEvidence => "filter_evidence",
			Self::ResolveFullEvidence => "resolve_full_evidence",
			Self::Synthesize => "synthesize",
			Self::Validate => "validate",
			Self::RewriteQuery => "rewrite_query",
			Self::Done => "done",
		}
	}
}

/// Per-request inputs shared by every node.
#[derive(Debug, Clone)]
pub struct RunContext {
	/// Synthesis, chit-chat and rewrite.
	pub generator: ModelSpec,
	/// Intent, grading and validation.
	pub helper: ModelSpec,
	pub cancel: CancellationToken,
}

/// The stage topology. Nodes are built once and reused across requests.
pub struct Graph {
	intent: IntentClassifier,
	chit_chat: ChitChatResponder,
	retriever: EvidenceRetriever,
	filter: EvidenceFilterStage,
	resolver: FullEvidenceResolver,
	synthesizer: Synthesizer,
	validator: Validator,
	rewriter: QueryRewriter,
	retry_bound: u32,
	max_synthesize: u32,
}
impl Graph {
	pub fn new(
		cfg: &Config,
		store: Arc<dyn EvidenceStore>,
		gateway: Arc<dyn CapabilityGateway>,
	) -> Self {
		let workflow = &cfg.workflow;

		Self {
			intent: IntentClassifier::new(gateway.clone(), workflow.classify_timeout_ms),
			chit_chat: ChitChatResponder::new(
				gateway.clone(),
				workflow.generation_timeout_ms,
				cfg.answers.chit_chat_fallback.clone(),
			),
			retriever: EvidenceRetriever::new(
				store.clone(),
				cfg.retrieval.summary_k,
				workflow.retrieval_timeout_ms,
			),
			filter: EvidenceFilterStage::new(DocumentFilter::new(
				gateway.clone(),
				&cfg.filter,
				workflow.classify_timeout_ms,
			)),
			resolver: FullEvidenceResolver::new(store, workflow.retrieval_timeout_ms),
			synthesizer: Synthesizer::new(
				gateway.clone(),
				workflow.generation_timeout_ms,
				&cfg.answers,
			),
			validator: Validator::new(
				gateway.clone(),
				workflow.classify_timeout_ms,
				workflow.validation_evidence_chars,
			),
			rewriter: QueryRewriter::new(gateway, workflow.generation_timeout_ms),
			retry_bound: workflow.retry_bound,
			max_synthesize: workflow.max_synthesize,
		}
	}

	/// Runs `state` from [`Node::Start`] to [`Node::Done`].
	///
	/// Nodes run one at a time. The cancellation token is checked before each node.
	pub async fn run(&self, mut state: SessionState, ctx: &RunContext) -> Result<SessionState> {
		let mut node = Node::Start;

		while node != Node::Done {
			if ctx.cancel.is_cancelled() {
				tracing::warn!(stage = node.name(), "Request cancelled.");

				return Err(Error::Cancelled { stage: node.name() });
			}

			let update = self.step(node, &state, ctx).await?;

			state.apply(node.name(), update);

			let next = self.route(node, &state);

			if node == Node::Validate && next == Node::Done && !state.validated {
				tracing::warn!(
					synthesize_count = state.synthesize_count,
					max_synthesize = self.max_synthesize,
					"Synthesis cap reached without a grounded answer."
				);

				state.retry_bound_exceeded = true;
			}

			tracing::debug!(from = node.name(), to = next.name(), "Stage transition.");

			node = next;
		}

		Ok(state)
	}

	async fn step(&self, node: Node, state: &SessionState, ctx: &RunContext) -> Result<StateUpdate> {
		match node {
			Node::Start => Ok(StateUpdate { retry_count: Some(0), ..Default::default() }),
			Node::ClassifyIntent => self.intent.run(state, ctx).await,
			Node::AnswerChitChat => self.chit_chat.run(state, ctx).await,
			Node::RetrieveEvidence => self.retriever.run(state, ctx).await,
			Node::FilterEvidence => self.filter.run(state, ctx).await,
			Node::ResolveFullEvidence => self.resolver.run(state, ctx).await,
			Node::Synthesize => self.synthesizer.run(state, ctx).await,
			Node::Validate => self.validator.run(state, ctx).await,
			Node::RewriteQuery => self.rewriter.run(state, ctx).await,
			Node::Done => Ok(StateUpdate::default()),
		}
	}

	/// Outgoing edge of `from` given the merged state.
	pub fn route(&self, from: Node, state: &SessionState) -> Node {
		match from {
			Node::Start => Node::ClassifyIntent,
			Node::ClassifyIntent => match state.intent {
				Some(Intent::ChitChat) => Node::AnswerChitChat,
				_ => Node::RetrieveEvidence,
			},
			Node::AnswerChitChat => Node::Done,
			Node::RetrieveEvidence => Node::FilterEvidence,
			Node::FilterEvidence => Node::ResolveFullEvidence,
			Node::ResolveFullEvidence => Node::Synthesize,
			Node::Synthesize => Node::Validate,
			Node::Validate if state.validated => Node::Done,
			Node::Validate if state.synthesize_count >= self.max_synthesize => Node::Done,
			Node::Validate if state.retry_count > self.retry_bound => Node::RewriteQuery,
			Node::Validate => Node::Synthesize,
			Node::RewriteQuery => Node::RetrieveEvidence,
			Node::Done => Node::Done,
		}
	}
}
