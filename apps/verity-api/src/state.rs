use std::sync::Arc;

use verity_service::{QdrantEvidenceStore, VerityService};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<VerityService>,
}
impl AppState {
	pub fn new(config: verity_config::Config) -> color_eyre::Result<Self> {
		let config = Arc::new(config);
		let store = QdrantEvidenceStore::new(config.clone())?;
		let service = VerityService::new(config, Arc::new(store));

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: VerityService) -> Self {
		Self { service: Arc::new(service) }
	}
}
