use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use verity_domain::EvidenceItem;
use verity_providers::{ChatMessage, ModelSpec};

use crate::{Error, Result, RunContext, SessionState, VerityService};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
	pub question: String,
	#[serde(default)]
	pub conversation_id: Option<String>,
	/// Generator model override. Must be one of the configured models.
	#[serde(default)]
	pub model_selector: Option<String>,
	#[serde(default)]
	pub prior_turns: Vec<ChatMessage>,
	#[serde(default)]
	pub sub_questions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
	pub answer: String,
	pub conversation_id: String,
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	/// Resolved full documents.
	pub evidence: Vec<EvidenceView>,
	/// Graded summaries.
	pub summary_evidence: Vec<EvidenceView>,
	pub trace: Vec<String>,
	pub validated: bool,
	pub retry_bound_exceeded: bool,
	pub needs_supplemental_search: bool,
	pub evidence_degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceView {
	pub content: String,
	pub metadata: Map<String, Value>,
}
impl From<EvidenceItem> for EvidenceView {
	fn from(item: EvidenceItem) -> Self {
		Self { content: item.content, metadata: item.metadata }
	}
}

impl VerityService {
	pub async fn ask(&self, req: AskRequest) -> Result<AskResponse> {
		self.ask_with_cancel(req, CancellationToken::new()).await
	}

	/// Answers one question. Cancelling `cancel` stops the request at the next suspension point.
	pub async fn ask_with_cancel(
		&self,
		req: AskRequest,
		cancel: CancellationToken,
	) -> Result<AskResponse> {
		let AskRequest { question, conversation_id, model_selector, prior_turns, sub_questions } =
			req;
		let question = question.trim().to_string();

		if question.is_empty() {
			return Err(Error::InvalidRequest { message: "question must be non-empty.".to_string() });
		}

		let generator = self.generator_spec(model_selector.as_deref())?;
		let helper = ModelSpec::from_config(&self.cfg.providers.helper);
		let conversation_id = conversation_id
			.filter(|id| !id.trim().is_empty())
			.unwrap_or_else(|| Uuid::new_v4().to_string());
		let sub_questions = sub_questions.map(|questions| {
			questions
				.into_iter()
				.map(|question| question.trim().to_string())
				.filter(|question| !question.is_empty())
				.collect::<Vec<_>>()
		});
		let ctx = RunContext { generator, helper, cancel };

		tracing::info!(
			conversation_id = %conversation_id,
			model = %ctx.generator.model,
			"Answering question."
		);

		let state = SessionState::new(question, prior_turns, sub_questions);
		let state = self.graph.run(state, &ctx).await?;

		Ok(AskResponse {
			answer: state.answer.unwrap_or_default(),
			conversation_id,
			timestamp: OffsetDateTime::now_utc(),
			evidence: state.resolved_evidence.into_iter().map(EvidenceView::from).collect(),
			summary_evidence: state
				.filtered_evidence_preview
				.into_iter()
				.map(EvidenceView::from)
				.collect(),
			trace: state.execution_trace,
			validated: state.validated,
			retry_bound_exceeded: state.retry_bound_exceeded,
			needs_supplemental_search: state.needs_supplemental_search,
			evidence_degraded: state.evidence_degraded,
		})
	}

	fn generator_spec(&self, selector: Option<&str>) -> Result<ModelSpec> {
		let mut spec = ModelSpec::from_config(&self.cfg.providers.generator);
		let Some(selector) = selector.map(str::trim).filter(|value| !value.is_empty()) else {
			return Ok(spec);
		};

		if !self.models().iter().any(|model| model == selector) {
			return Err(Error::InvalidRequest {
				message: format!("model_selector {selector} is not an available model."),
			});
		}

		spec.model = selector.to_string();

		Ok(spec)
	}
}
