use std::collections::BTreeSet;

use verity_domain::{EvidenceItem, Intent};
use verity_providers::ChatMessage;

/// The record threaded through every stage of one request.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
	/// The question as submitted. Never rewritten.
	pub original_question: String,
	/// The question for the current pass.
	pub question: String,
	pub sub_questions: Option<Vec<String>>,
	pub prior_turns: Vec<ChatMessage>,
	/// Stage names in visiting order. Only ever appended to.
	pub execution_trace: Vec<String>,
	pub intent: Option<Intent>,
	pub candidate_evidence: Vec<EvidenceItem>,
	/// `(sub-question, item)` pairs produced by fan-out retrieval.
	pub decomposed_evidence: Option<Vec<(String, EvidenceItem)>>,
	pub filtered_evidence_ids: BTreeSet<String>,
	pub filtered_evidence_preview: Vec<EvidenceItem>,
	pub resolved_evidence: Vec<EvidenceItem>,
	pub needs_supplemental_search: bool,
	pub answer: Option<String>,
	/// Synthesis attempts in the current pass.
	pub retry_count: u32,
	/// Synthesis attempts over the whole request.
	pub synthesize_count: u32,
	pub validated: bool,
	pub retry_bound_exceeded: bool,
	pub evidence_degraded: bool,
}
impl SessionState {
	pub fn new(
		question: impl Into<String>,
		prior_turns: Vec<ChatMessage>,
		sub_questions: Option<Vec<String>>,
	) -> Self {
		let question = question.into();

		Self {
			original_question: question.clone(),
			question,
			sub_questions,
			prior_turns,
			..Default::default()
		}
	}

	/// Records `stage` in the trace, then replaces every field the update carries.
	pub fn apply(&mut self, stage: &str, update: StateUpdate) {
		self.execution_trace.push(stage.to_string());

		let StateUpdate {
			question,
			sub_questions,
			intent,
			candidate_evidence,
			decomposed_evidence,
			filtered_evidence_ids,
			filtered_evidence_preview,
			resolved_evidence,
			needs_supplemental_search,
			answer,
			retry_count,
			synthesize_count,
			validated,
			evidence_degraded,
		} = update;

		replace(&mut self.question, question);
		replace(&mut self.sub_questions, sub_questions);
		replace(&mut self.intent, intent.map(Some));
		replace(&mut self.candidate_evidence, candidate_evidence);
		replace(&mut self.decomposed_evidence, decomposed_evidence);
		replace(&mut self.filtered_evidence_ids, filtered_evidence_ids);
		replace(&mut self.filtered_evidence_preview, filtered_evidence_preview);
		replace(&mut self.resolved_evidence, resolved_evidence);
		replace(&mut self.needs_supplemental_search, needs_supplemental_search);
		replace(&mut self.answer, answer.map(Some));
		replace(&mut self.retry_count, retry_count);
		replace(&mut self.synthesize_count, synthesize_count);
		replace(&mut self.validated, validated);
		replace(&mut self.evidence_degraded, evidence_degraded);
	}
}

/// A partial [`SessionState`]. `None` leaves the field untouched.
#[derive(Debug, Default)]
pub struct StateUpdate {
	pub question: Option<String>,
	pub sub_questions: Option<Option<Vec<String>>>,
	pub intent: Option<Intent>,
	pub candidate_evidence: Option<Vec<EvidenceItem>>,
	pub decomposed_evidence: Option<Option<Vec<(String, EvidenceItem)>>>,
	pub filtered_evidence_ids: Option<BTreeSet<String>>,
	pub filtered_evidence_preview: Option<Vec<EvidenceItem>>,
	pub resolved_evidence: Option<Vec<EvidenceItem>>,
	pub needs_supplemental_search: Option<bool>,
	pub answer: Option<String>,
	pub retry_count: Option<u32>,
	pub synthesize_count: Option<u32>,
	pub validated: Option<bool>,
	pub evidence_degraded: Option<bool>,
}

fn replace<T>(slot: &mut T, value: Option<T>) {
	if let Some(value) = value {
		*slot = value;
	}
}
