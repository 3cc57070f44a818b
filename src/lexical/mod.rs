//! Lexical signal extraction
//!
//! Scores free text against Korean and English keyword dictionaries, with an
//! optional remote classifier consulted first.

pub mod analyzer;
pub mod dictionary;
pub mod normalize;
pub mod remote;
pub mod stream;

pub use analyzer::{LexicalJudgment, LexicalSignalExtractor};
pub use normalize::{detect_language, normalize};
pub use remote::{parse_classifier_response, ClassifierRequest, RemoteClassifier};
pub use stream::DebouncedAnalyzer;

#[cfg(feature = "remote")]
pub use remote::HttpClassifier;
