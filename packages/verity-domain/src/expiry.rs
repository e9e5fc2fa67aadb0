use std::sync::LazyLock;

use regex::Regex;
use time::{
	Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
};

/// Accepted deadline layouts. The first layout that parses wins.
const DEADLINE_FORMATS: [&[BorrowedFormatItem<'static>]; 4] = [
	format_description!("[year]-[month padding:none]-[day padding:none]"),
	format_description!("[day padding:none].[month padding:none].[year]"),
	format_description!("[year]/[month padding:none]/[day padding:none]"),
	format_description!("[day padding:none]-[month padding:none]-[year]"),
];

static LEADING_DATE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"^\d{1,4}[./-]\d{1,2}[./-]\d{1,4}").ok());

/// Parses a deadline string, ignoring any time-of-day suffix.
///
/// Returns `None` when no accepted layout matches.
pub fn parse_deadline(raw: &str) -> Option<Date> {
	let part = date_part(raw);

	if part.is_empty() {
		return None;
	}

	DEADLINE_FORMATS.iter().find_map(|format| Date::parse(part, format).ok())
}

/// Today's date on the server clock. Falls back to UTC when the local offset is unknown.
pub fn today() -> Date {
	OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()).date()
}

fn date_part(raw: &str) -> &str {
	let trimmed = raw.trim();

	if let Some(found) = LEADING_DATE.as_ref().and_then(|re| re.find(trimmed)) {
		return found.as_str();
	}

	match trimmed.split_once(',') {
		Some((head, _)) => head.trim(),
		None => trimmed.split_whitespace().next().unwrap_or_default(),
	}
}

#[cfg(test)]
mod tests {
	use time::macros::date;

	use super::*;

	#[test]
	fn parses_every_accepted_layout() {
		assert_eq!(parse_deadline("2025-03-14"), Some(date!(2025 - 03 - 14)));
		assert_eq!(parse_deadline("14.03.2025"), Some(date!(2025 - 03 - 14)));
		assert_eq!(parse_deadline("2025/03/14"), Some(date!(2025 - 03 - 14)));
		assert_eq!(parse_deadline("14-03-2025"), Some(date!(2025 - 03 - 14)));
	}

	#[test]
	fn ignores_time_of_day_suffixes() {
		assert_eq!(parse_deadline("2025-03-14 10:00"), Some(date!(2025 - 03 - 14)));
		assert_eq!(parse_deadline("2025-03-14, 10 val."), Some(date!(2025 - 03 - 14)));
		assert_eq!(parse_deadline("2025-03-14T10:00:00+02:00"), Some(date!(2025 - 03 - 14)));
	}

	#[test]
	fn accepts_unpadded_day_and_month() {
		assert_eq!(parse_deadline("4.3.2025"), Some(date!(2025 - 03 - 04)));
	}

	#[test]
	fn rejects_unknown_layouts() {
		assert_eq!(parse_deadline("March 14, 2025"), None);
		assert_eq!(parse_deadline("2025-13-40"), None);
		assert_eq!(parse_deadline("soon"), None);
		assert_eq!(parse_deadline(""), None);
	}
}
