use qdrant_client::{
	Qdrant,
	qdrant::{Condition, Filter, PointId, Query, QueryPointsBuilder, ScrollPointsBuilder},
};

use uuid::Uuid;

use verity_domain::{Corpus, EvidenceItem};

use crate::{Error, Result, payload};

const SCROLL_PAGE_SIZE: u32 = 256;

pub struct QdrantStore {
	pub client: Qdrant,
	pub summary_collection: String,
	pub full_collection: String,
	pub id_field: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &verity_config::Qdrant) -> Result<Self> {
		let mut builder = Qdrant::from_url(&cfg.url);

		if let Some(key) = cfg.api_key.as_deref() {
			builder = builder.api_key(key);
		}

		let client = builder.build()?;

		Ok(Self {
			client,
			summary_collection: cfg.summary_collection.clone(),
			full_collection: cfg.full_collection.clone(),
			id_field: cfg.id_field.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub fn collection(&self, corpus: Corpus) -> &str {
		match corpus {
			Corpus::Summary => &self.summary_collection,
			Corpus::Full => &self.full_collection,
		}
	}

	/// Nearest-neighbour search. Points without a usable identifier are skipped.
	pub async fn search(
		&self,
		corpus: Corpus,
		vector: Vec<f32>,
		limit: u64,
	) -> Result<Vec<EvidenceItem>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, expected {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let query = QueryPointsBuilder::new(self.collection(corpus))
			.query(Query::new_nearest(vector))
			.with_payload(true)
			.limit(limit);
		let response = self.client.query(query).await?;

		Ok(response
			.result
			.into_iter()
			.filter_map(|point| {
				payload::evidence_from_point(&self.id_field, point.id.as_ref(), point.payload)
			})
			.collect())
	}

	/// Fetches every point whose identifier field matches one of `ids`.
	///
	/// UUID-shaped identifiers also match point ids, since items without an identifier field are
	/// keyed by their point id. Unknown identifiers are omitted. Results follow the order of `ids`;
	/// several points sharing one identifier keep their stored order.
	pub async fn get_by_ids(&self, corpus: Corpus, ids: &[String]) -> Result<Vec<EvidenceItem>> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}

		let mut items = self.scroll(corpus, Some(id_filter(&self.id_field, ids))).await?;

		items.sort_by_key(|item| ids.iter().position(|id| id == &item.id).unwrap_or(ids.len()));

		tracing::debug!(
			corpus = corpus.as_str(),
			requested = ids.len(),
			found = items.len(),
			"Fetched evidence by identifier."
		);

		Ok(items)
	}

	/// Every point of a corpus in stored order.
	pub async fn scroll_all(&self, corpus: Corpus) -> Result<Vec<EvidenceItem>> {
		let items = self.scroll(corpus, None).await?;

		tracing::debug!(corpus = corpus.as_str(), found = items.len(), "Scrolled corpus.");

		Ok(items)
	}

	async fn scroll(&self, corpus: Corpus, filter: Option<Filter>) -> Result<Vec<EvidenceItem>> {
		let mut offset: Option<PointId> = None;
		let mut items = Vec::new();

		loop {
			let mut scroll = ScrollPointsBuilder::new(self.collection(corpus))
				.with_payload(true)
				.limit(SCROLL_PAGE_SIZE);

			if let Some(filter) = filter.as_ref() {
				scroll = scroll.filter(filter.clone());
			}
			if let Some(offset) = offset.take() {
				scroll = scroll.offset(offset);
			}

			let response = self.client.scroll(scroll).await?;

			items.extend(response.result.into_iter().filter_map(|point| {
				payload::evidence_from_point(&self.id_field, point.id.as_ref(), point.payload)
			}));

			match response.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		Ok(items)
	}
}

fn id_filter(id_field: &str, ids: &[String]) -> Filter {
	let point_ids = ids
		.iter()
		.filter_map(|id| Uuid::parse_str(id).ok())
		.map(|id| PointId::from(id.to_string()))
		.collect::<Vec<_>>();
	let mut conditions = vec![Condition::matches(id_field.to_string(), ids.to_vec())];

	if !point_ids.is_empty() {
		conditions.push(Condition::has_id(point_ids));
	}

	Filter::should(conditions)
}
