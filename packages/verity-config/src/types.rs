use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub filter: Filter,
	#[serde(default)]
	pub workflow: Workflow,
	#[serde(default)]
	pub answers: Answers,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub api_key: Option<String>,
	pub summary_collection: String,
	pub full_collection: String,
	/// Payload field that carries the stable evidence identifier in both collections.
	#[serde(default = "default_id_field")]
	pub id_field: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	/// Answers, chit-chat replies and query rewrites.
	pub generator: LlmProviderConfig,
	/// Intent, relevance and groundedness classification.
	pub helper: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_backoff_ms")]
	pub backoff_ms: u64,
	/// Models a request may select instead of `model`. Empty means only `model` is offered.
	#[serde(default)]
	pub selectable_models: Vec<String>,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub summary_k: u32,
	pub task_description: String,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			summary_k: 10,
			task_description: "Atrask aktualiausius objektus iš duombazės, jei miestas ar tipas, ar darbo pobūdis paminėti, užtikrink kad jie būtų grąžinti kaip tinkamiausi".to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Filter {
	pub batch_size: u32,
	pub max_concurrency: u32,
	pub min_evidence: u32,
}
impl Default for Filter {
	fn default() -> Self {
		Self { batch_size: 3, max_concurrency: 10, min_evidence: 4 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Workflow {
	/// Direct re-synthesis attempts allowed before escalating to a query rewrite.
	pub retry_bound: u32,
	pub max_synthesize: u32,
	pub retrieval_timeout_ms: u64,
	pub classify_timeout_ms: u64,
	pub generation_timeout_ms: u64,
	pub validation_evidence_chars: u32,
}
impl Default for Workflow {
	fn default() -> Self {
		Self {
			retry_bound: 1,
			max_synthesize: 6,
			retrieval_timeout_ms: 10_000,
			classify_timeout_ms: 15_000,
			generation_timeout_ms: 60_000,
			validation_evidence_chars: 2_000,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Answers {
	pub no_evidence: String,
	pub dont_know: String,
	pub chit_chat_fallback: String,
}
impl Default for Answers {
	fn default() -> Self {
		Self {
			no_evidence: "Nėra galiojančių projektų, pagal šią užklausą".to_string(),
			dont_know: "Atsiprašau, nežinau atsakymo į jūsų klausimą.".to_string(),
			chit_chat_fallback: "Atsiprašau, įvyko klaida. Kuo galėčiau padėti?".to_string(),
		}
	}
}

fn default_id_field() -> String {
	"uuid".to_string()
}

fn default_max_tokens() -> u32 {
	1_000
}

fn default_max_attempts() -> u32 {
	3
}

fn default_backoff_ms() -> u64 {
	250
}
