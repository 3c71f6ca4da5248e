use crate::clean::clean_text;
use postpulse_core::{AnalysisConfig, CategoryConfig, Post};
use tracing::debug;

/// A label and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub label: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(label: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            label: label.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && text.contains(keyword.as_str()))
    }
}

impl From<&CategoryConfig> for CategoryRule {
    fn from(config: &CategoryConfig) -> Self {
        Self {
            label: config.label.clone(),
            keywords: config.keywords.clone(),
        }
    }
}

/// Keyword classifier. Rules are tried in order and the first match wins.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CategoryRule>,
    fallback: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl Classifier {
    pub fn new(rules: Vec<CategoryRule>, fallback: impl Into<String>) -> Self {
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.categories.iter().map(CategoryRule::from).collect(),
            config.fallback_category.clone(),
        )
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn classify(&self, text: &str) -> &str {
        let cleaned = clean_text(text);
        self.rules
            .iter()
            .find(|rule| rule.matches(&cleaned))
            .map(|rule| rule.label.as_str())
            .unwrap_or(self.fallback.as_str())
    }

    /// Label every post. Returns labelled copies in input order and the tally.
    pub fn classify_all(&self, posts: &[Post]) -> (Vec<Post>, CategoryTally) {
        let mut tally = CategoryTally::default();
        let labelled = posts
            .iter()
            .map(|post| {
                let label = self.classify(&post.text);
                tally.record(label);
                post.categorized(label)
            })
            .collect();

        debug!(
            "Classified {} posts into {} categories",
            posts.len(),
            tally.len()
        );
        (labelled, tally)
    }
}

/// Post count per label, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTally {
    counts: Vec<(String, usize)>,
}

impl CategoryTally {
    pub fn record(&mut self, label: &str) {
        match self.counts.iter_mut().find(|(l, _)| l == label) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((label.to_string(), 1)),
        }
    }

    pub fn get(&self, label: &str) -> usize {
        self.counts
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.counts
    }

    /// Largest first; equal counts keep first-seen order.
    pub fn sorted_desc(&self) -> Vec<(String, usize)> {
        let mut sorted = self.counts.clone();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
    }

    /// `(label, count, percent of total)`, largest first.
    pub fn percentages(&self) -> Vec<(String, usize, f64)> {
        let total = self.total();
        self.sorted_desc()
            .into_iter()
            .map(|(label, count)| {
                let percent = if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                };
                (label, count, percent)
            })
            .collect()
    }
}
