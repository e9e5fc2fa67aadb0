use verity_domain::LabelSchema;

use crate::{ChatMessage, Error, ModelSpec, Result, chat};

/// Runs a completion and maps the reply onto `schema`.
///
/// Transport retries happen inside [`chat::complete`]. A reply outside the schema is not retried.
pub async fn classify(
	cfg: &verity_config::LlmProviderConfig,
	spec: &ModelSpec,
	messages: &[ChatMessage],
	schema: &LabelSchema,
) -> Result<&'static str> {
	let raw = chat::complete(cfg, spec, messages).await?;

	schema.resolve(&raw).ok_or(Error::Label { schema: schema.name, label: raw })
}
