use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use verity_service::{AskRequest, AskResponse, Error, ProjectView};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/ask", post(ask))
		.route("/v1/models", get(models))
		.route("/v1/cities", get(cities))
		.route("/v1/recent-projects", get(recent_projects))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn ask(
	State(state): State<AppState>,
	Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
	let response = state.service.ask(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
	default: String,
	models: Vec<String>,
}

async fn models(State(state): State<AppState>) -> Json<ModelsResponse> {
	Json(ModelsResponse {
		default: state.service.cfg.providers.generator.model.clone(),
		models: state.service.models(),
	})
}

#[derive(Debug, Serialize)]
struct CitiesResponse {
	cities: Vec<String>,
}

async fn cities(State(state): State<AppState>) -> Result<Json<CitiesResponse>, ApiError> {
	let cities = state.service.cities().await?;

	Ok(Json(CitiesResponse { cities }))
}

#[derive(Debug, Deserialize)]
struct RecentProjectsQuery {
	city: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProjectsResponse {
	projects: Vec<ProjectView>,
}

async fn recent_projects(
	State(state): State<AppState>,
	Query(query): Query<RecentProjectsQuery>,
) -> Result<Json<ProjectsResponse>, ApiError> {
	let projects = state.service.recent_projects(query.city.as_deref()).await?;

	Ok(Json(ProjectsResponse { projects }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let (status, error_code) = match err.root() {
			Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
			Error::Cancelled { .. } => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
			Error::Generation { .. } => (StatusCode::BAD_GATEWAY, "GENERATION_FAILED"),
			Error::Classification { .. } => (StatusCode::BAD_GATEWAY, "CLASSIFICATION_FAILED"),
			Error::Timeout { .. } => (StatusCode::BAD_GATEWAY, "TIMEOUT"),
			Error::StoreUnavailable { .. } | Error::Stage { .. } =>
				(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
		};

		if status.is_server_error() {
			tracing::error!(error = %err, error_code, "Request failed.");
		}

		Self { status, error_code, message: err.to_string() }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
