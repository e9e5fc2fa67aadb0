mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Answers, Config, EmbeddingProviderConfig, Filter, LlmProviderConfig, Providers, Qdrant,
	Retrieval, Service, Storage, Workflow,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	for (label, value) in [
		("storage.qdrant.url", &cfg.storage.qdrant.url),
		("storage.qdrant.summary_collection", &cfg.storage.qdrant.summary_collection),
		("storage.qdrant.full_collection", &cfg.storage.qdrant.full_collection),
		("storage.qdrant.id_field", &cfg.storage.qdrant.id_field),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("generator", &cfg.providers.generator.api_key),
		("helper", &cfg.providers.helper.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	for (label, llm) in [("generator", &cfg.providers.generator), ("helper", &cfg.providers.helper)]
	{
		if !llm.temperature.is_finite() || !(0.0..=2.0).contains(&llm.temperature) {
			return Err(Error::Validation {
				message: format!("providers.{label}.temperature must be in the range 0.0-2.0."),
			});
		}
		if llm.max_attempts == 0 {
			return Err(Error::Validation {
				message: format!("providers.{label}.max_attempts must be greater than zero."),
			});
		}
		if llm.max_tokens == 0 {
			return Err(Error::Validation {
				message: format!("providers.{label}.max_tokens must be greater than zero."),
			});
		}
	}

	if cfg.retrieval.summary_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.summary_k must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("filter.batch_size", cfg.filter.batch_size),
		("filter.max_concurrency", cfg.filter.max_concurrency),
		("filter.min_evidence", cfg.filter.min_evidence),
		("workflow.max_synthesize", cfg.workflow.max_synthesize),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}
	for (label, value) in [
		("workflow.retrieval_timeout_ms", cfg.workflow.retrieval_timeout_ms),
		("workflow.classify_timeout_ms", cfg.workflow.classify_timeout_ms),
		("workflow.generation_timeout_ms", cfg.workflow.generation_timeout_ms),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	for (label, value) in [
		("answers.no_evidence", &cfg.answers.no_evidence),
		("answers.dont_know", &cfg.answers.dont_know),
		("answers.chit_chat_fallback", &cfg.answers.chit_chat_fallback),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}

	cfg.storage.qdrant.id_field = cfg.storage.qdrant.id_field.trim().to_string();

	for llm in [&mut cfg.providers.generator, &mut cfg.providers.helper] {
		llm.selectable_models.retain(|model| !model.trim().is_empty());
	}
}
