use crate::clean::clean_text;
use jieba_rs::Jieba;
use postpulse_core::{AnalysisConfig, Post};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Words excluded from term counting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stopwords {
    words: HashSet<String>,
}

impl Stopwords {
    /// One word per line; surrounding whitespace and blank lines are ignored.
    pub fn parse(content: &str) -> Self {
        let mut stopwords = Self::default();
        stopwords.extend(content.lines());
        stopwords
    }

    /// Read a stopword file. A missing or unreadable file is not an error:
    /// analysis proceeds with an empty set.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                let stopwords = Self::parse(&content);
                info!(
                    "Loaded {} stopwords from {}",
                    stopwords.len(),
                    path.display()
                );
                stopwords
            }
            Err(e) => {
                warn!(
                    "Could not read stopword file {}: {}; continuing without it",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            let word = word.as_ref().trim();
            if !word.is_empty() {
                self.words.insert(word.to_string());
            }
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Token counts across a corpus, kept in first-encountered order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFrequency {
    index: HashMap<String, usize>,
    terms: Vec<(String, usize)>,
}

impl TermFrequency {
    pub fn add(&mut self, term: &str) {
        match self.index.get(term) {
            Some(&slot) => self.terms[slot].1 += 1,
            None => {
                self.index.insert(term.to_string(), self.terms.len());
                self.terms.push((term.to_string(), 1));
            }
        }
    }

    pub fn count(&self, term: &str) -> usize {
        self.index
            .get(term)
            .map(|&slot| self.terms[slot].1)
            .unwrap_or(0)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn total(&self) -> usize {
        self.terms.iter().map(|(_, count)| count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.terms.iter().map(|(term, count)| (term.as_str(), *count))
    }

    /// The `n` most frequent terms; ties keep first-encountered order.
    pub fn top(&self, n: usize) -> Vec<(String, usize)> {
        let mut ranked = self.terms.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Segments post text with jieba and counts the surviving tokens.
pub struct TextAnalyzer {
    jieba: Jieba,
    min_token_chars: usize,
}

impl TextAnalyzer {
    pub fn new(min_token_chars: usize) -> Self {
        debug!("Loading segmentation dictionary");
        Self {
            jieba: Jieba::new(),
            min_token_chars: min_token_chars.max(1),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.min_token_chars)
    }

    /// Cleaned, segmented and filtered tokens of one text, in order.
    pub fn tokens(&self, text: &str, stopwords: &Stopwords) -> Vec<String> {
        let cleaned = clean_text(text);
        self.jieba
            .cut(&cleaned, true)
            .into_iter()
            .map(str::trim)
            .filter(|token| keep_token(token, self.min_token_chars, stopwords))
            .map(str::to_string)
            .collect()
    }

    pub fn analyze(&self, posts: &[Post], stopwords: &Stopwords) -> TermFrequency {
        let mut frequency = TermFrequency::default();
        for post in posts {
            for token in self.tokens(&post.text, stopwords) {
                frequency.add(&token);
            }
        }

        info!(
            "Found {} distinct terms ({} tokens) in {} posts",
            frequency.len(),
            frequency.total(),
            posts.len()
        );
        frequency
    }
}

fn keep_token(token: &str, min_chars: usize, stopwords: &Stopwords) -> bool {
    token.chars().count() >= min_chars
        && token.chars().any(char::is_alphanumeric)
        && !stopwords.contains(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_stopwords_parse_trims_and_skips_blanks() {
        let stopwords = Stopwords::parse("的\n  了 \n\n\t\nhttp\n");
        assert_eq!(stopwords.len(), 3);
        assert!(stopwords.contains("了"));
        assert!(stopwords.contains("http"));
        assert!(!stopwords.contains(""));
    }

    #[test]
    fn test_stopwords_load_from_file_and_merge_extras() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "我们\n你们").unwrap();

        let mut stopwords = Stopwords::load(file.path());
        stopwords.extend(["微博", " 转发 ", ""]);

        assert_eq!(stopwords.len(), 4);
        assert!(stopwords.contains("转发"));
    }

    #[test]
    fn test_missing_stopword_file_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let stopwords = Stopwords::load(dir.path().join("missing.txt"));
        assert!(stopwords.is_empty());
    }

    #[test]
    fn test_token_filter() {
        let stopwords = Stopwords::parse("微博");
        assert!(keep_token("法院", 2, &stopwords));
        assert!(keep_token("11年", 2, &stopwords));
        assert!(!keep_token("的", 2, &stopwords));
        assert!(!keep_token("——", 2, &stopwords));
        assert!(!keep_token("  ", 1, &stopwords));
        assert!(!keep_token("微博", 2, &stopwords));
        assert!(keep_token("a", 1, &stopwords));
    }

    #[test]
    fn test_counts_aggregate_across_posts_and_ignore_stopwords() {
        let analyzer = TextAnalyzer::new(2);
        let stopwords = Stopwords::parse("noise");
        let posts = vec![
            Post::new("1", "rust tokio noise a"),
            Post::new("2", "tokio serde"),
            Post::new("3", "法院 判决 法院"),
        ];

        let frequency = analyzer.analyze(&posts, &stopwords);

        assert_eq!(frequency.count("tokio"), 2);
        assert_eq!(frequency.count("rust"), 1);
        assert_eq!(frequency.count("法院"), 2);
        assert_eq!(frequency.count("noise"), 0);
        assert_eq!(frequency.count("a"), 0);
        for (term, _) in frequency.iter() {
            assert!(term.chars().count() >= 2, "short term {term:?} kept");
            assert!(!stopwords.contains(term));
        }
    }

    #[test]
    fn test_top_breaks_ties_by_first_occurrence() {
        let analyzer = TextAnalyzer::new(2);
        let posts = vec![Post::new("1", "beta alpha gamma alpha beta delta")];

        let top = analyzer.analyze(&posts, &Stopwords::default()).top(3);

        assert_eq!(
            top,
            vec![
                ("beta".to_string(), 2),
                ("alpha".to_string(), 2),
                ("gamma".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_cleaning_happens_before_segmentation() {
        let analyzer = TextAnalyzer::new(2);
        let tokens = analyzer.tokens(
            "<span>hello</span> [doge] #topic# https://t.cn/abc world",
            &Stopwords::default(),
        );
        assert_eq!(tokens, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn test_post_made_only_of_stopwords_contributes_nothing() {
        let analyzer = TextAnalyzer::new(2);
        let stopwords = Stopwords::parse("rust\ntokio");
        let posts = vec![Post::new("1", "rust tokio rust")];

        assert!(analyzer.analyze(&posts, &stopwords).is_empty());
    }

    #[test]
    fn test_empty_corpus() {
        let analyzer = TextAnalyzer::new(2);
        let frequency = analyzer.analyze(&[], &Stopwords::default());
        assert!(frequency.is_empty());
        assert!(frequency.top(10).is_empty());
    }
}
