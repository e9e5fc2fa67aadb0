//! In-memory collaborators for driving the orchestration core in tests.

use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value};

use verity_config::{
	Answers, Config, EmbeddingProviderConfig, Filter, LlmProviderConfig, Providers, Qdrant,
	Retrieval, Service, Storage, Workflow,
};
use verity_domain::{Corpus, EvidenceItem, LabelSchema};
use verity_providers::{ChatMessage, ModelSpec, Role};
use verity_service::{BoxFuture, CapabilityGateway, Error, EvidenceStore, Result};

pub const GENERATOR_MODEL: &str = "generator-model";
pub const ALT_GENERATOR_MODEL: &str = "generator-model-large";
pub const HELPER_MODEL: &str = "helper-model";

type CompleteFn = dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync;
type ClassifyFn = dyn Fn(&LabelSchema, &[ChatMessage]) -> Result<&'static str> + Send + Sync;

/// One recorded gateway call.
#[derive(Debug, Clone)]
pub struct GatewayCall {
	/// `complete`, or the label schema name for classifications.
	pub kind: String,
	pub model: String,
	/// Last user message.
	pub prompt: String,
	pub message_count: usize,
}

/// Gateway whose replies come from closures.
///
/// Defaults answer every completion with a fixed text, classify intent as `work_related`, grade
/// every item relevant and judge every answer grounded.
pub struct ScriptedGateway {
	complete: Box<CompleteFn>,
	classify: Box<ClassifyFn>,
	delay: Option<Duration>,
	complete_calls: AtomicUsize,
	classify_calls: AtomicUsize,
	calls: Mutex<Vec<GatewayCall>>,
}
impl ScriptedGateway {
	pub fn new() -> Self {
		Self {
			complete: Box::new(|_: &[ChatMessage]| {
				Ok("Vilniuje yra vienas tinkamas objektas.".to_string())
			}),
			classify: Box::new(|schema: &LabelSchema, _: &[ChatMessage]| {
				Ok(match schema.name {
					"intent" => "work_related",
					"groundedness" => "grounded",
					_ => "yes",
				})
			}),
			delay: None,
			complete_calls: AtomicUsize::new(0),
			classify_calls: AtomicUsize::new(0),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn on_complete<F>(mut self, f: F) -> Self
	where
		F: Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
	{
		self.complete = Box::new(f);

		self
	}

	pub fn on_classify<F>(mut self, f: F) -> Self
	where
		F: Fn(&LabelSchema, &[ChatMessage]) -> Result<&'static str> + Send + Sync + 'static,
	{
		self.classify = Box::new(f);

		self
	}

	/// Sleeps before every reply.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn complete_count(&self) -> usize {
		self.complete_calls.load(Ordering::SeqCst)
	}

	pub fn classify_count(&self) -> usize {
		self.classify_calls.load(Ordering::SeqCst)
	}

	pub fn calls(&self) -> Vec<GatewayCall> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	/// Calls of one kind, in order.
	pub fn calls_of(&self, kind: &str) -> Vec<GatewayCall> {
		self.calls().into_iter().filter(|call| call.kind == kind).collect()
	}

	fn record(&self, kind: &str, spec: &ModelSpec, messages: &[ChatMessage]) {
		let call = GatewayCall {
			kind: kind.to_string(),
			model: spec.model.clone(),
			prompt: last_user(messages).to_string(),
			message_count: messages.len(),
		};

		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(call);
	}
}
impl Default for ScriptedGateway {
	fn default() -> Self {
		Self::new()
	}
}
impl CapabilityGateway for ScriptedGateway {
	fn complete<'a>(
		&'a self,
		spec: &'a ModelSpec,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			self.complete_calls.fetch_add(1, Ordering::SeqCst);
			self.record("complete", spec, messages);

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			(self.complete)(messages)
		})
	}

	fn classify<'a>(
		&'a self,
		spec: &'a ModelSpec,
		messages: &'a [ChatMessage],
		schema: &'a LabelSchema,
	) -> BoxFuture<'a, Result<&'static str>> {
		Box::pin(async move {
			self.classify_calls.fetch_add(1, Ordering::SeqCst);
			self.record(schema.name, spec, messages);

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			(self.classify)(schema, messages)
		})
	}
}

/// Two in-memory corpora.
///
/// `search` returns the items registered for the exact query, or the first `limit` summary items.
#[derive(Default)]
pub struct MemoryEvidenceStore {
	summary: Vec<EvidenceItem>,
	full: Vec<EvidenceItem>,
	by_query: HashMap<String, Vec<EvidenceItem>>,
	unavailable: AtomicBool,
	search_calls: AtomicUsize,
	get_calls: AtomicUsize,
	scroll_calls: AtomicUsize,
	queries: Mutex<Vec<(String, u32)>>,
}
impl MemoryEvidenceStore {
	pub fn new(summary: Vec<EvidenceItem>, full: Vec<EvidenceItem>) -> Self {
		Self { summary, full, ..Default::default() }
	}

	pub fn with_query_results(mut self, query: &str, items: Vec<EvidenceItem>) -> Self {
		self.by_query.insert(query.to_string(), items);

		self
	}

	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	pub fn search_count(&self) -> usize {
		self.search_calls.load(Ordering::SeqCst)
	}

	pub fn get_count(&self) -> usize {
		self.get_calls.load(Ordering::SeqCst)
	}

	pub fn scroll_count(&self) -> usize {
		self.scroll_calls.load(Ordering::SeqCst)
	}

	/// `(query, limit)` for every search, in order.
	pub fn queries(&self) -> Vec<(String, u32)> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn check_available(&self) -> Result<()> {
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(Error::StoreUnavailable { message: "Memory store is offline.".to_string() });
		}

		Ok(())
	}
}
impl EvidenceStore for MemoryEvidenceStore {
	fn search<'a>(
		&'a self,
		corpus: Corpus,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>>> {
		Box::pin(async move {
			self.search_calls.fetch_add(1, Ordering::SeqCst);
			self.queries
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.push((query.to_string(), limit));
			self.check_available()?;

			let pool = match (corpus, self.by_query.get(query)) {
				(_, Some(items)) => items,
				(Corpus::Summary, None) => &self.summary,
				(Corpus::Full, None) => &self.full,
			};

			Ok(pool.iter().take(limit as usize).cloned().collect())
		})
	}

	fn get_by_ids<'a>(
		&'a self,
		corpus: Corpus,
		ids: &'a [String],
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>>> {
		Box::pin(async move {
			self.get_calls.fetch_add(1, Ordering::SeqCst);
			self.check_available()?;

			let pool = match corpus {
				Corpus::Summary => &self.summary,
				Corpus::Full => &self.full,
			};

			Ok(ids
				.iter()
				.flat_map(|id| pool.iter().filter(move |item| &item.id == id))
				.cloned()
				.collect())
		})
	}

	fn scroll<'a>(&'a self, corpus: Corpus) -> BoxFuture<'a, Result<Vec<EvidenceItem>>> {
		Box::pin(async move {
			self.scroll_calls.fetch_add(1, Ordering::SeqCst);
			self.check_available()?;

			Ok(match corpus {
				Corpus::Summary => self.summary.clone(),
				Corpus::Full => self.full.clone(),
			})
		})
	}
}

pub fn item(id: &str, content: &str) -> EvidenceItem {
	EvidenceItem::new(id, content, Map::new())
}

/// Item whose canonical `valid_until` metadata holds `deadline` verbatim.
pub fn item_with_deadline(id: &str, content: &str, deadline: &str) -> EvidenceItem {
	let mut metadata = Map::new();

	metadata.insert("valid_until".to_string(), Value::String(deadline.to_string()));

	EvidenceItem::new(id, content, metadata)
}

/// Content of the last user message, which carries the question in every prompt.
pub fn last_user(messages: &[ChatMessage]) -> &str {
	messages
		.iter()
		.rev()
		.find(|message| message.role == Role::User)
		.map(|message| message.content.as_str())
		.unwrap_or_default()
}

pub fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				api_key: None,
				summary_collection: "summaries".to_string(),
				full_collection: "documents".to_string(),
				id_field: "uuid".to_string(),
				vector_dim: 4,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "embed".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			generator: llm_config(GENERATOR_MODEL, vec![ALT_GENERATOR_MODEL.to_string()]),
			helper: llm_config(HELPER_MODEL, Vec::new()),
		},
		retrieval: Retrieval::default(),
		filter: Filter::default(),
		workflow: Workflow::default(),
		answers: Answers::default(),
	}
}

fn llm_config(model: &str, selectable_models: Vec<String>) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: model.to_string(),
		temperature: 0.0,
		max_tokens: 256,
		timeout_ms: 1_000,
		max_attempts: 1,
		backoff_ms: 1,
		selectable_models,
		default_headers: Map::new(),
	}
}
