//! Fast-path dictionary for greetings and small talk.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

pub const PATTERNS: [&str; 11] = [
	"labas",
	"hi",
	"hello",
	"sveiki",
	"laba diena",
	"kaip sekasi",
	"how are you",
	"sveikas",
	"heyo",
	"hey",
	"hola",
];

const CANNED_REPLIES: [(&str, &str); 7] = [
	("labas", "Labas! Kuo galėčiau padėti?"),
	("hi", "Hi! How can I assist you?"),
	("hello", "Hello! How can I help you today?"),
	("sveiki", "Sveiki! Kuo galėčiau jums padėti?"),
	("laba diena", "Laba diena! Kuo galėčiau padėti?"),
	("kaip sekasi", "Man sekasi puikiai! O kaip jums? Kuo galėčiau padėti?"),
	("how are you", "I'm doing well, thank you! How can I assist you?"),
];

/// Words outside any pattern that an utterance may carry and still count as small talk.
const MAX_OTHER_WORDS: usize = 2;

/// Returns the first small-talk pattern found in the utterance on word boundaries.
///
/// Only utterances that are mostly small talk match, so "labas, kokie stogo darbai Vilniuje?" is
/// left to the intent classifier.
pub fn match_pattern(utterance: &str) -> Option<&'static str> {
	let words = words(utterance);
	let mut covered = vec![false; words.len()];
	let mut first = None;

	for pattern in PATTERNS {
		let needle = words_of(pattern);

		if needle.is_empty() || needle.len() > words.len() {
			continue;
		}

		for start in 0..=words.len() - needle.len() {
			let end = start + needle.len();

			if words[start..end] == needle[..] {
				covered[start..end].fill(true);

				if first.is_none() {
					first = Some(pattern);
				}
			}
		}
	}

	let other_words = covered.iter().filter(|covered| !**covered).count();

	first.filter(|_| other_words <= MAX_OTHER_WORDS)
}

/// Returns a canned reply when the whole utterance is a known greeting.
pub fn canned_reply(utterance: &str) -> Option<&'static str> {
	let words = words(utterance);

	CANNED_REPLIES
		.iter()
		.find(|(greeting, _)| words_of(greeting) == words)
		.map(|(_, reply)| *reply)
}

fn words(text: &str) -> Vec<String> {
	let normalized: String = text.nfc().collect::<String>().to_lowercase();

	normalized.unicode_words().map(str::to_string).collect()
}

fn words_of(pattern: &str) -> Vec<String> {
	pattern.unicode_words().map(str::to_string).collect()
}
