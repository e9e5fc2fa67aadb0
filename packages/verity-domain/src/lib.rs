pub mod evidence;
pub mod expiry;
pub mod labels;
pub mod metadata;
pub mod small_talk;

pub use evidence::{Corpus, Deadline, EvidenceItem};
pub use labels::{Intent, LabelSchema, Verdict};
