//! Project browsing over the summary corpus.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use time::Date;
use tokio_util::sync::CancellationToken;

use verity_domain::{Corpus, Deadline, EvidenceItem, expiry, metadata};

use crate::{Result, VerityService, bounded};

pub const RECENT_PROJECTS_LIMIT: usize = 20;

const LOCATION_KEYS: [&str; 2] = ["Vieta", "vieta"];
const TITLE_KEYS: [&str; 2] = ["Projekto_pavadinimas", "pavadinimas"];
const SUMMARY_PREVIEW_CHARS: usize = 200;
const MIN_CITY_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectView {
	pub id: String,
	pub title: String,
	/// Deadline as stored.
	pub deadline: String,
	/// Parsed deadline in `YYYY-MM-DD` form.
	pub deadline_date: String,
	pub location: String,
	pub summary: String,
}

impl VerityService {
	pub async fn cities(&self) -> Result<Vec<String>> {
		let items = self.browse().await?;

		Ok(cities(&items))
	}

	pub async fn recent_projects(&self, city: Option<&str>) -> Result<Vec<ProjectView>> {
		let items = self.browse().await?;

		Ok(recent_projects(items, city, expiry::today(), RECENT_PROJECTS_LIMIT))
	}

	async fn browse(&self) -> Result<Vec<EvidenceItem>> {
		let items = bounded(
			"browse",
			self.cfg.workflow.retrieval_timeout_ms,
			&CancellationToken::new(),
			self.store.scroll(Corpus::Summary),
		)
		.await?;

		tracing::info!(items = items.len(), "Loaded summary corpus for browsing.");

		Ok(items)
	}
}

/// Sorted unique city names. The city is the location text before the first comma.
pub fn cities(items: &[EvidenceItem]) -> Vec<String> {
	items
		.iter()
		.filter_map(|item| text_of(&item.metadata, &LOCATION_KEYS))
		.filter_map(|location| {
			let city = location.split(',').next().unwrap_or_default().trim();

			(city.chars().count() >= MIN_CITY_CHARS).then(|| city.to_string())
		})
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect()
}

/// Unexpired projects with a parseable deadline, soonest first.
///
/// `city` matches case-insensitively anywhere in the location. Items whose deadline is missing or
/// unparseable are not listed.
pub fn recent_projects(
	items: Vec<EvidenceItem>,
	city: Option<&str>,
	today: Date,
	limit: usize,
) -> Vec<ProjectView> {
	let city = city.map(str::trim).filter(|city| !city.is_empty()).map(str::to_lowercase);
	let mut projects = items
		.into_iter()
		.filter_map(|item| {
			let date = match &item.validity_deadline {
				Some(Deadline::On(date)) if *date >= today => *date,
				_ => return None,
			};

			let location = text_of(&item.metadata, &LOCATION_KEYS).unwrap_or_default();

			if let Some(city) = city.as_deref()
				&& !location.to_lowercase().contains(city)
			{
				return None;
			}

			Some((date, view(&item, date, location)))
		})
		.collect::<Vec<_>>();

	projects.sort_by_key(|(date, _)| *date);

	projects.into_iter().take(limit).map(|(_, project)| project).collect()
}

fn view(item: &EvidenceItem, date: Date, location: String) -> ProjectView {
	let deadline = match item.metadata.get(metadata::VALID_UNTIL) {
		Some(Value::String(raw)) => raw.clone(),
		Some(other) => other.to_string(),
		None => String::new(),
	};

	ProjectView {
		id: item.id.clone(),
		title: text_of(&item.metadata, &TITLE_KEYS).unwrap_or_default(),
		deadline,
		deadline_date: date.to_string(),
		location,
		summary: preview(&item.content),
	}
}

fn preview(content: &str) -> String {
	match content.char_indices().nth(SUMMARY_PREVIEW_CHARS) {
		Some((end, _)) => format!("{}...", &content[..end]),
		None => content.to_string(),
	}
}

fn text_of(metadata: &Map<String, Value>, keys: &[&str]) -> Option<String> {
	keys.iter().find_map(|key| match metadata.get(*key) {
		Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
		_ => None,
	})
}
