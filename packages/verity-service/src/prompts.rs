use serde_json::{Map, Value};

use verity_domain::EvidenceItem;
use verity_providers::ChatMessage;

const INTENT_SYSTEM: &str = "You separate construction work questions from small talk. Questions \
about construction objects, projects, tenders, contractors or works in a city are work_related. \
Greetings, questions about wellbeing, weather, trivia and anything unrelated to construction \
work are chit_chat. Reply with exactly one word: chit_chat or work_related.";

const CHIT_CHAT_SYSTEM: &str = "You are a friendly assistant for a construction tender search \
service. Reply briefly and politely in the language of the user. If the user seems to need work \
information, invite them to ask about construction objects or projects.";

const RELEVANCE_SYSTEM: &str = "You grade whether a document is relevant to a question. When the \
question names a city, the document address must be in that city. When it names an object type \
or kind of work, the document must mention it too. If the question names something the document \
lacks, the document is not relevant. Addresses look like \"Keramiku g. 20, Vilnius\", where the \
city is the last part. Reply with a JSON object with a single key binary_score whose value is \
yes or no.";

const ANSWER_SYSTEM: &str = "You answer questions about construction objects and projects using \
only the supplied evidence. Do not add facts that are not in the evidence. Answer in the \
language of the question. List every matching object with its key details.";

const VALIDATION_SYSTEM: &str = "You check whether an answer is grounded. An answer is grounded \
when it responds to the question and every claim it makes is supported by the evidence. Reply \
with exactly one word: grounded or not_grounded.";

const REWRITE_SYSTEM: &str = "You rewrite search questions for a vector search over construction \
tender summaries. Keep the city, object type and kind of work. Remove filler words. Reply with \
the rewritten question only, in the language of the original question.";

pub(crate) fn intent(question: &str) -> Vec<ChatMessage> {
	vec![ChatMessage::system(INTENT_SYSTEM), ChatMessage::user(format!("User query: {question}"))]
}

pub(crate) fn chit_chat(question: &str, prior_turns: &[ChatMessage]) -> Vec<ChatMessage> {
	with_history(CHIT_CHAT_SYSTEM, prior_turns, question.to_string())
}

pub(crate) fn relevance(question: &str, item: &EvidenceItem) -> Vec<ChatMessage> {
	vec![
		ChatMessage::system(RELEVANCE_SYSTEM),
		ChatMessage::user(format!("Question: {question}\n\nDocument:\n{}", render_item(item, None))),
	]
}

pub(crate) fn answer(
	question: &str,
	evidence: &[EvidenceItem],
	prior_turns: &[ChatMessage],
	dont_know: &str,
) -> Vec<ChatMessage> {
	let system = format!(
		"{ANSWER_SYSTEM} If the evidence does not answer the question, reply exactly: {dont_know}"
	);
	let user = format!("Evidence:\n{}\n\nQuestion: {question}", render_evidence(evidence, None));

	with_history(&system, prior_turns, user)
}

pub(crate) fn validation(
	question: &str,
	answer: &str,
	evidence: &[EvidenceItem],
	max_chars: usize,
) -> Vec<ChatMessage> {
	vec![
		ChatMessage::system(VALIDATION_SYSTEM),
		ChatMessage::user(format!(
			"Evidence:\n{}\n\nQuestion: {question}\n\nAnswer: {answer}",
			render_evidence(evidence, Some(max_chars))
		)),
	]
}

pub(crate) fn rewrite(question: &str) -> Vec<ChatMessage> {
	vec![ChatMessage::system(REWRITE_SYSTEM), ChatMessage::user(question.to_string())]
}

fn with_history(system: &str, prior_turns: &[ChatMessage], user: String) -> Vec<ChatMessage> {
	let mut messages = Vec::with_capacity(prior_turns.len() + 2);

	messages.push(ChatMessage::system(system));
	messages.extend(prior_turns.iter().cloned());
	messages.push(ChatMessage::user(user));

	messages
}

fn render_evidence(evidence: &[EvidenceItem], max_chars: Option<usize>) -> String {
	evidence
		.iter()
		.enumerate()
		.map(|(idx, item)| format!("[{}] {}", idx + 1, render_item(item, max_chars)))
		.collect::<Vec<_>>()
		.join("\n\n")
}

/// Content followed by one `key: value` line per metadata entry. Only the content is truncated.
fn render_item(item: &EvidenceItem, max_chars: Option<usize>) -> String {
	let content = match max_chars {
		Some(limit) => truncate_chars(&item.content, limit),
		None => item.content.as_str(),
	};
	let details = render_metadata(&item.metadata);

	if details.is_empty() { content.to_string() } else { format!("{content}\n{details}") }
}

fn render_metadata(metadata: &Map<String, Value>) -> String {
	metadata
		.iter()
		.filter_map(|(key, value)| {
			let text = match value {
				Value::Null => return None,
				Value::String(text) if text.trim().is_empty() => return None,
				Value::String(text) => text.trim().to_string(),
				other => other.to_string(),
			};

			Some(format!("{key}: {text}"))
		})
		.collect::<Vec<_>>()
		.join("\n")
}

fn truncate_chars(text: &str, limit: usize) -> &str {
	match text.char_indices().nth(limit) {
		Some((end, _)) => &text[..end],
		None => text,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn located(content: &str) -> EvidenceItem {
		let metadata = json!({
			"Vieta": "Taikos pr. 1, Klaipėda",
			"valid_until": "2030-01-01",
			"score": null,
		});

		EvidenceItem::new("a", content, metadata.as_object().cloned().unwrap_or_default())
	}

	#[test]
	fn truncates_on_char_boundaries() {
		assert_eq!(truncate_chars("ąčęėį", 3), "ąčę");
		assert_eq!(truncate_chars("abc", 10), "abc");
	}

	#[test]
	fn history_sits_between_system_and_question() {
		let turns = vec![ChatMessage::user("labas"), ChatMessage::assistant("Sveiki!")];
		let item = EvidenceItem::new("a", "Stogo remontas Vilniuje", Map::new());
		let messages = answer("Kokie objektai?", &[item], &turns, "Nežinau.");

		assert_eq!(messages.len(), 4);
		assert_eq!(messages[1], turns[0]);
		assert!(messages[3].content.ends_with("Question: Kokie objektai?"));
		assert!(messages[0].content.contains("Nežinau."));
	}

	#[test]
	fn validation_embeds_truncated_evidence() {
		let item = EvidenceItem::new("a", "x".repeat(50), Map::new());
		let messages = validation("q", "a", &[item], 10);

		assert!(messages[1].content.contains(&format!("[1] {}\n", "x".repeat(10))));
	}

	#[test]
	fn metadata_reaches_every_evidence_prompt() {
		let item = located("Stogo remontas");
		let relevance = relevance("stogai Klaipėdoje", &item);
		let answer = answer("stogai Klaipėdoje", &[item.clone()], &[], "Nežinau.");
		let validation = validation("stogai Klaipėdoje", "Yra vienas.", &[item], 100);

		for prompt in [&relevance[1].content, &answer[1].content, &validation[1].content] {
			assert!(prompt.contains("Vieta: Taikos pr. 1, Klaipėda"), "Missing location: {prompt}");
			assert!(prompt.contains("valid_until: 2030-01-01"), "Missing deadline: {prompt}");
			assert!(!prompt.contains("score"), "Null metadata leaked: {prompt}");
		}
	}

	#[test]
	fn truncation_keeps_metadata() {
		let messages = validation("q", "a", &[located(&"x".repeat(50))], 10);

		assert!(messages[1].content.contains(&format!("[1] {}\nVieta:", "x".repeat(10))));
	}
}
