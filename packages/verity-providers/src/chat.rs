use std::time::Duration;

use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

use crate::{ChatMessage, Error, ModelSpec, Result};

/// Runs one chat completion, retrying transient failures with exponential backoff.
///
/// At most `cfg.max_attempts` requests are sent. Client errors other than 408 and 429 are
/// returned immediately.
pub async fn complete(
	cfg: &verity_config::LlmProviderConfig,
	spec: &ModelSpec,
	messages: &[ChatMessage],
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
	let body = serde_json::json!({
		"model": spec.model,
		"temperature": spec.temperature,
		"max_tokens": spec.max_tokens,
		"messages": messages,
	});
	let mut backoff = Duration::from_millis(cfg.backoff_ms);
	let mut attempt = 1;

	loop {
		match send(&client, &url, headers.clone(), &body).await {
			Ok(content) => return Ok(content),
			Err(err) if attempt < cfg.max_attempts && err.is_retryable() => {
				tracing::warn!(
					error = %err,
					attempt,
					max_attempts = cfg.max_attempts,
					model = %spec.model,
					"Chat completion failed, retrying."
				);

				tokio::time::sleep(backoff).await;

				backoff = backoff.saturating_mul(2);
				attempt += 1;
			},
			Err(err) => return Err(err),
		}
	}
}

async fn send(client: &Client, url: &str, headers: HeaderMap, body: &Value) -> Result<String> {
	let res = client.post(url).headers(headers).json(body).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion(json)
}

fn parse_completion(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat completion response is missing message content.".to_string(),
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_first_choice_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "role": "assistant", "content": "Vilniuje yra 3 objektai." } },
				{ "message": { "role": "assistant", "content": "ignored" } }
			]
		});

		assert_eq!(parse_completion(json).expect("parse failed"), "Vilniuje yra 3 objektai.");
	}

	#[test]
	fn keeps_content_verbatim() {
		let json = serde_json::json!({
			"choices": [{ "message": { "content": "  spaced answer \n" } }]
		});

		assert_eq!(parse_completion(json).expect("parse failed"), "  spaced answer \n");
	}

	#[test]
	fn missing_content_is_an_invalid_response() {
		let json = serde_json::json!({ "choices": [] });
		let err = parse_completion(json).expect_err("Expected invalid response.");

		assert!(matches!(err, Error::InvalidResponse { .. }));
		assert!(err.is_retryable());
	}
}
