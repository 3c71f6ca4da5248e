//! One run of the tool: crawl a topic into the records file, analyze the
//! records file into a report, or both in sequence.

use clap::ValueEnum;
use collector::{Collector, CollectorConfig, CrawlReport};
use postpulse_core::{
    AnalysisConfig, AppConfig, CrawlConfig, PipelineError, ReportConfig, Stage,
};
use records_store::{load_records, RecordsWriter};
use report::{write_report, EchartsRenderer, Reporter};
use std::path::PathBuf;
use text_analysis::{
    clean_text, top_influential, CategoryTally, Classifier, CrawlSummary, Stopwords, TextAnalyzer,
};
use tokio::time::sleep;
use tracing::{info, warn};
use weibo_client::{PageSource, WeiboApiClient};

const PREVIEW_CHARS: usize = 150;
const LOGGED_TOP_POSTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Crawl,
    Analyze,
    #[value(name = "full")]
    CrawlThenAnalyze,
    #[value(skip)]
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Crawling,
    Crawled,
    Analyzing,
    Reported,
    Aborted,
}

/// Everything a run needs, resolved from the config file, flags and menu.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub topic: String,
    pub pages: u32,
    pub records_path: PathBuf,
    pub stopwords_path: PathBuf,
    pub report_path: PathBuf,
    pub crawl: CrawlConfig,
    pub analysis: AnalysisConfig,
    pub report: ReportConfig,
}

impl RunConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            topic: config.crawl.keyword.clone(),
            pages: config.crawl.pages,
            records_path: config.paths.records.clone(),
            stopwords_path: config.paths.stopwords.clone(),
            report_path: config.paths.report.clone(),
            crawl: config.crawl.clone(),
            analysis: config.analysis.clone(),
            report: config.report.clone(),
        }
    }
}

/// Result of a finished analysis.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub posts: usize,
    pub tally: CategoryTally,
    pub top_terms: Vec<(String, usize)>,
    pub report_path: PathBuf,
}

impl AnalysisOutcome {
    fn log(&self) {
        let terms: Vec<&str> = self
            .top_terms
            .iter()
            .take(10)
            .map(|(term, _)| term.as_str())
            .collect();
        info!(
            "Analyzed {} posts in {} categories; hot terms: {}",
            self.posts,
            self.tally.len(),
            terms.join(" ")
        );
        info!("Report saved to {}", self.report_path.display());
    }
}

pub struct Pipeline {
    config: RunConfig,
    state: RunState,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            state: RunState::Idle,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RunConfig {
        &mut self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self, action: Action) -> Result<(), PipelineError> {
        match action {
            Action::Exit => Ok(()),
            Action::Analyze => {
                let outcome = self.analyze()?;
                outcome.log();
                self.state = RunState::Idle;
                Ok(())
            }
            Action::Crawl | Action::CrawlThenAnalyze => {
                let client = WeiboApiClient::from_config(&self.config.crawl)
                    .map_err(|e| PipelineError::new(Stage::Configuring, e))?;
                if action == Action::Crawl {
                    self.crawl(client).await?;
                } else {
                    self.crawl_then_analyze(client).await?.log();
                }
                self.state = RunState::Idle;
                Ok(())
            }
        }
    }

    pub async fn crawl_then_analyze<S: PageSource>(
        &mut self,
        source: S,
    ) -> Result<AnalysisOutcome, PipelineError> {
        self.crawl(source).await?;

        let delay = self.config.analysis.analyze_delay();
        if !delay.is_zero() {
            info!("Starting analysis in {:?}", delay);
            sleep(delay).await;
        }
        self.analyze()
    }

    /// Crawl into a fresh records file. Pages stored before an abort stay on
    /// disk.
    pub async fn crawl<S: PageSource>(&mut self, source: S) -> Result<CrawlReport, PipelineError> {
        self.state = RunState::Crawling;
        let result = self.collect(source).await;
        self.state = match result {
            Ok(_) => RunState::Crawled,
            Err(_) => RunState::Aborted,
        };
        result
    }

    async fn collect<S: PageSource>(&self, source: S) -> Result<CrawlReport, PipelineError> {
        let path = &self.config.records_path;

        let mut writer = RecordsWriter::create(path)
            .map_err(|e| PipelineError::new(Stage::Crawling, e))?;
        let collector = Collector::new(source, CollectorConfig::from_crawl(&self.config.crawl));
        let report = collector
            .collect(&self.config.topic, self.config.pages, &mut writer)
            .await
            .map_err(|e| PipelineError::new(Stage::Crawling, e))?;
        writer
            .finish()
            .map_err(|e| PipelineError::new(Stage::Crawling, e))?;

        match load_records(path) {
            Ok(posts) => info!("Crawl summary: {}", CrawlSummary::from_posts(&posts)),
            Err(e) => warn!("Could not summarize {}: {}", path.display(), e),
        }
        info!("Records saved to {}", path.display());
        Ok(report)
    }

    /// Classify and analyze the records file and write the report page.
    pub fn analyze(&mut self) -> Result<AnalysisOutcome, PipelineError> {
        self.state = RunState::Analyzing;
        let result = self.build_report();
        self.state = match result {
            Ok(_) => RunState::Reported,
            Err(_) => RunState::Aborted,
        };
        result
    }

    fn build_report(&self) -> Result<AnalysisOutcome, PipelineError> {
        let analysis = &self.config.analysis;

        let posts = load_records(&self.config.records_path)
            .map_err(|e| PipelineError::new(Stage::LoadingRecords, e))?;

        let (posts, tally) = Classifier::from_config(analysis).classify_all(&posts);
        for (label, count, percent) in tally.percentages() {
            info!("{}: {} posts ({:.1}%)", label, count, percent);
        }

        let mut stopwords = Stopwords::load(&self.config.stopwords_path);
        stopwords.extend(&analysis.extra_stopwords);
        let top_terms = TextAnalyzer::from_config(analysis)
            .analyze(&posts, &stopwords)
            .top(analysis.top_terms);

        let influential = top_influential(&posts, analysis.top_posts);
        for (rank, ranked) in influential.iter().take(LOGGED_TOP_POSTS).enumerate() {
            let preview: String = clean_text(&ranked.post.text)
                .chars()
                .take(PREVIEW_CHARS)
                .collect();
            info!(
                "Top {} (score {:.3}, {} comments, {} reposts, {} likes): {}",
                rank + 1,
                ranked.score,
                ranked.post.comment_count,
                ranked.post.repost_count,
                ranked.post.like_count,
                preview
            );
        }

        let renderer = EchartsRenderer::from_config(&self.config.report)
            .map_err(|e| PipelineError::new(Stage::Reporting, e))?;
        let html = Reporter::with_renderer(renderer)
            .render(&tally, &top_terms, &influential)
            .map_err(|e| PipelineError::new(Stage::Reporting, e))?;
        write_report(&self.config.report_path, &html)
            .map_err(|e| PipelineError::new(Stage::Reporting, e))?;

        Ok(AnalysisOutcome {
            posts: posts.len(),
            tally,
            top_terms,
            report_path: self.config.report_path.clone(),
        })
    }
}
