use std::sync::Arc;

use axum::{
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt;

use verity_api::{routes, state::AppState};
use verity_service::{Error, VerityService};
use verity_domain::EvidenceItem;
use verity_testkit::{
	ALT_GENERATOR_MODEL, GENERATOR_MODEL, MemoryEvidenceStore, ScriptedGateway, item_with_deadline,
	test_config,
};

fn app(gateway: ScriptedGateway) -> axum::Router {
	let summary = vec![item_with_deadline("a", "Stogo remontas, Vilnius", "2999-01-01")];
	let store = MemoryEvidenceStore::new(summary.clone(), summary);
	let service =
		VerityService::with_gateway(Arc::new(test_config()), Arc::new(store), Arc::new(gateway));

	routes::router(AppState::from_service(service))
}

async fn call(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.oneshot(request).await.expect("Failed to call router.");
	let status = response.status();
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");
	let json = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Body must be JSON.")
	};

	(status, json)
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Failed to build request.")
}

fn project(id: &str, location: &str, deadline: &str) -> EvidenceItem {
	let mut item = item_with_deadline(id, &format!("Objektas {id}"), deadline);

	item.metadata.insert("Vieta".to_string(), Value::String(location.to_string()));

	item
}

fn browsing_app(store: MemoryEvidenceStore) -> axum::Router {
	let service = VerityService::with_gateway(
		Arc::new(test_config()),
		Arc::new(store),
		Arc::new(ScriptedGateway::new()),
	);

	routes::router(AppState::from_service(service))
}

fn ask(payload: Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/v1/ask")
		.header("content-type", "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

#[tokio::test]
async fn health_ok() {
	let request = Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request.");
	let (status, _) = call(app(ScriptedGateway::new()), request).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn lists_generator_models() {
	let request =
		Request::builder().uri("/v1/models").body(Body::empty()).expect("Failed to build request.");
	let (status, json) = call(app(ScriptedGateway::new()), request).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["default"], GENERATOR_MODEL);
	assert_eq!(json["models"], serde_json::json!([GENERATOR_MODEL, ALT_GENERATOR_MODEL]));
}

#[tokio::test]
async fn answers_greetings() {
	let (status, json) =
		call(app(ScriptedGateway::new()), ask(serde_json::json!({ "question": "labas" }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["answer"], "Labas! Kuo galėčiau padėti?");
	assert_eq!(json["trace"], serde_json::json!(["start", "classify_intent", "answer_chit_chat"]));
	assert!(json["conversation_id"].as_str().is_some_and(|id| !id.is_empty()));
	assert!(json["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn answers_work_questions_with_evidence() {
	let payload = serde_json::json!({
		"question": "Kokie stogo darbai Vilniuje?",
		"conversation_id": "conv-1",
		"prior_turns": [{ "role": "user", "content": "Sveiki" }]
	});
	let (status, json) = call(app(ScriptedGateway::new()), ask(payload)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["conversation_id"], "conv-1");
	assert_eq!(json["evidence"][0]["content"], "Stogo remontas, Vilnius");
	assert_eq!(json["summary_evidence"].as_array().map(Vec::len), Some(1));
	assert_eq!(json["needs_supplemental_search"], true);
	assert_eq!(json["validated"], true);
}

#[tokio::test]
async fn rejects_blank_questions() {
	let (status, json) =
		call(app(ScriptedGateway::new()), ask(serde_json::json!({ "question": "  " }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn maps_generation_failures_to_bad_gateway() {
	let gateway = ScriptedGateway::new()
		.on_complete(|_| Err(Error::Generation { message: "upstream 503".to_string() }));
	let (status, json) = call(
		app(gateway),
		ask(serde_json::json!({ "question": "Kokie stogo darbai Vilniuje?" })),
	)
	.await;

	assert_eq!(status, StatusCode::BAD_GATEWAY);
	assert_eq!(json["error_code"], "GENERATION_FAILED");
	assert!(json["message"].as_str().is_some_and(|message| message.contains("upstream 503")));
}

#[tokio::test]
async fn lists_unique_cities() {
	let summary = vec![
		project("a", "Vilnius, Žirmūnai", "2999-01-01"),
		project("b", "Kaunas", "2001-01-01"),
		project("c", "Vilnius", "2999-01-01"),
	];
	let (status, json) =
		call(browsing_app(MemoryEvidenceStore::new(summary, Vec::new())), get("/v1/cities")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["cities"], serde_json::json!(["Kaunas", "Vilnius"]));
}

#[tokio::test]
async fn recent_projects_are_unexpired_and_filtered_by_city() {
	let summary = vec![
		project("later", "Taikos pr. 1, Klaipėda", "2999-06-01"),
		project("expired", "Klaipėda", "2001-01-01"),
		project("sooner", "Klaipėda", "01.02.2999"),
		project("elsewhere", "Vilnius", "2999-01-01"),
	];
	let app = browsing_app(MemoryEvidenceStore::new(summary, Vec::new()));
	let (status, json) = call(app, get("/v1/recent-projects?city=klaip%C4%97da")).await;

	assert_eq!(status, StatusCode::OK);

	let ids = json["projects"]
		.as_array()
		.map(|projects| {
			projects.iter().filter_map(|project| project["id"].as_str()).collect::<Vec<_>>()
		})
		.unwrap_or_default();

	assert_eq!(ids, vec!["sooner", "later"]);
	assert_eq!(json["projects"][0]["deadline"], "01.02.2999");
	assert_eq!(json["projects"][0]["deadline_date"], "2999-02-01");
	assert_eq!(json["projects"][0]["location"], "Klaipėda");
}

#[tokio::test]
async fn browsing_an_unavailable_store_is_an_internal_error() {
	let store = MemoryEvidenceStore::new(vec![project("a", "Vilnius", "2999-01-01")], Vec::new());

	store.set_unavailable(true);

	let (status, json) = call(browsing_app(store), get("/v1/recent-projects")).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(json["error_code"], "INTERNAL_ERROR");
}
