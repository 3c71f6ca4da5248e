//! Everything the analysis phase computes from stored posts: category
//! labels, term frequencies and engagement statistics.

pub mod analyzer;
pub mod classifier;
pub mod clean;
pub mod engagement;

pub use analyzer::{Stopwords, TermFrequency, TextAnalyzer};
pub use classifier::{CategoryRule, CategoryTally, Classifier};
pub use clean::clean_text;
pub use engagement::{influence_scores, top_influential, CrawlSummary, RankedPost};
