pub mod ask;
pub mod catalog;
pub mod filter;
pub mod graph;
pub mod intent;
pub mod retrieve;
pub mod rewrite;
pub mod state;
pub mod synthesize;
pub mod validate;

mod error;
mod prompts;

pub use ask::{AskRequest, AskResponse, EvidenceView};
pub use catalog::ProjectView;
pub use error::{Error, Result};
pub use filter::{DocumentFilter, FilterOutcome};
pub use graph::{Graph, Node, RunContext};
pub use state::{SessionState, StateUpdate};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use verity_config::Config;
use verity_domain::{Corpus, EvidenceItem, LabelSchema};
use verity_providers::{ChatMessage, ModelSpec, chat, classify, embedding};
use verity_storage::qdrant::QdrantStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only access to the summary and full-document corpora.
///
/// Implementations report an unreachable backend as [`Error::StoreUnavailable`], never as an
/// empty result.
pub trait EvidenceStore
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		corpus: Corpus,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>>>;

	/// Missing identifiers are omitted from the result.
	fn get_by_ids<'a>(
		&'a self,
		corpus: Corpus,
		ids: &'a [String],
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>>>;

	/// Every item of a corpus in stored order.
	fn scroll<'a>(&'a self, corpus: Corpus) -> BoxFuture<'a, Result<Vec<EvidenceItem>>>;
}

/// Free-text completion and closed-label classification.
///
/// `complete` serves the generator model and `classify` the helper model.
pub trait CapabilityGateway
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		spec: &'a ModelSpec,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<String>>;

	fn classify<'a>(
		&'a self,
		spec: &'a ModelSpec,
		messages: &'a [ChatMessage],
		schema: &'a LabelSchema,
	) -> BoxFuture<'a, Result<&'static str>>;
}

/// OpenAI-compatible gateway backed by `verity-providers`.
pub struct HttpGateway {
	cfg: Arc<Config>,
}
impl HttpGateway {
	pub fn new(cfg: Arc<Config>) -> Self {
		Self { cfg }
	}
}
impl CapabilityGateway for HttpGateway {
	fn complete<'a>(
		&'a self,
		spec: &'a ModelSpec,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			chat::complete(&self.cfg.providers.generator, spec, messages)
				.await
				.map_err(|err| Error::Generation { message: err.to_string() })
		})
	}

	fn classify<'a>(
		&'a self,
		spec: &'a ModelSpec,
		messages: &'a [ChatMessage],
		schema: &'a LabelSchema,
	) -> BoxFuture<'a, Result<&'static str>> {
		Box::pin(async move {
			classify::classify(&self.cfg.providers.helper, spec, messages, schema)
				.await
				.map_err(|err| Error::Classification { message: err.to_string() })
		})
	}
}

/// Qdrant store that embeds queries with the configured instruction prefix.
pub struct QdrantEvidenceStore {
	cfg: Arc<Config>,
	store: QdrantStore,
}
impl QdrantEvidenceStore {
	pub fn new(cfg: Arc<Config>) -> Result<Self> {
		let store = QdrantStore::new(&cfg.storage.qdrant)?;

		Ok(Self { cfg, store })
	}
}
impl EvidenceStore for QdrantEvidenceStore {
	fn search<'a>(
		&'a self,
		corpus: Corpus,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>>> {
		Box::pin(async move {
			let text = embedding::instruct_query(&self.cfg.retrieval.task_description, query);
			let vectors = embedding::embed(&self.cfg.providers.embedding, &[text])
				.await
				.map_err(|err| Error::StoreUnavailable { message: err.to_string() })?;
			let Some(vector) = vectors.into_iter().next() else {
				return Err(Error::StoreUnavailable {
					message: "Embedding provider returned no vectors.".to_string(),
				});
			};

			Ok(self.store.search(corpus, vector, u64::from(limit)).await?)
		})
	}

	fn get_by_ids<'a>(
		&'a self,
		corpus: Corpus,
		ids: &'a [String],
	) -> BoxFuture<'a, Result<Vec<EvidenceItem>>> {
		Box::pin(async move { Ok(self.store.get_by_ids(corpus, ids).await?) })
	}

	fn scroll<'a>(&'a self, corpus: Corpus) -> BoxFuture<'a, Result<Vec<EvidenceItem>>> {
		Box::pin(async move { Ok(self.store.scroll_all(corpus).await?) })
	}
}

pub struct VerityService {
	pub cfg: Arc<Config>,
	pub graph: Graph,
	store: Arc<dyn EvidenceStore>,
}
impl VerityService {
	pub fn new(cfg: Arc<Config>, store: Arc<dyn EvidenceStore>) -> Self {
		let gateway = Arc::new(HttpGateway::new(cfg.clone()));

		Self::with_gateway(cfg, store, gateway)
	}

	pub fn with_gateway(
		cfg: Arc<Config>,
		store: Arc<dyn EvidenceStore>,
		gateway: Arc<dyn CapabilityGateway>,
	) -> Self {
		let graph = Graph::new(&cfg, store.clone(), gateway);

		Self { cfg, graph, store }
	}

	/// Generator models a request may select. The configured default comes first.
	pub fn models(&self) -> Vec<String> {
		let generator = &self.cfg.providers.generator;
		let mut models = vec![generator.model.clone()];

		for model in &generator.selectable_models {
			if !models.contains(model) {
				models.push(model.clone());
			}
		}

		models
	}
}

/// Awaits `fut` unless the request is cancelled or the call outlives `timeout_ms`.
pub(crate) async fn bounded<T>(
	stage: &'static str,
	timeout_ms: u64,
	cancel: &CancellationToken,
	fut: impl Future<Output = Result<T>>,
) -> Result<T> {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled { stage }),
		res = tokio::time::timeout(Duration::from_millis(timeout_ms), fut) => match res {
			Ok(inner) => inner,
			Err(_) => Err(Error::Timeout { stage, timeout_ms }),
		},
	}
}
