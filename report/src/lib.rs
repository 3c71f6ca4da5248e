//! Report page: category distribution, hot terms and the engagement of the
//! most influential posts, as one HTML file. Chart scripts are linked from
//! the CDN unless `[report]` points at local copies or inlines them.

pub mod charts;
pub mod render;

pub use charts::{category_pie, engagement_bar, term_cloud, Chart};
pub use render::{ChartRenderer, EchartsRenderer, ScriptSource};

use postpulse_core::ReportError;
use std::fs;
use std::path::Path;
use text_analysis::{CategoryTally, RankedPost};
use tracing::info;

const PAGE_TITLE: &str = "微博话题分析报告";

pub struct Reporter<R = EchartsRenderer> {
    renderer: R,
    title: String,
}

impl Default for Reporter<EchartsRenderer> {
    fn default() -> Self {
        Self::with_renderer(EchartsRenderer::default())
    }
}

impl<R: ChartRenderer> Reporter<R> {
    pub fn with_renderer(renderer: R) -> Self {
        Self {
            renderer,
            title: PAGE_TITLE.to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Build the three charts and render them into one page.
    pub fn render(
        &self,
        tally: &CategoryTally,
        terms: &[(String, usize)],
        engagement: &[RankedPost<'_>],
    ) -> Result<String, ReportError> {
        if tally.total() == 0 {
            return Err(ReportError::EmptyInput {
                reason: "no posts were classified".to_string(),
            });
        }

        let charts = [
            category_pie(tally),
            term_cloud(terms),
            engagement_bar(engagement),
        ];
        self.renderer.render_page(&self.title, &charts)
    }
}

/// Write the page, replacing any earlier report at `path`.
pub fn write_report(path: impl AsRef<Path>, html: &str) -> Result<(), ReportError> {
    let path = path.as_ref();
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, html)
    };
    write().map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Report written to {} ({} bytes)", path.display(), html.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use postpulse_core::Post;
    use tempfile::TempDir;

    struct Recording;

    impl ChartRenderer for Recording {
        fn render_page(&self, title: &str, charts: &[Chart]) -> Result<String, ReportError> {
            let ids: Vec<&str> = charts.iter().map(|c| c.id.as_str()).collect();
            Ok(format!("{}|{}", title, ids.join(",")))
        }
    }

    #[test]
    fn test_render_passes_three_charts_to_renderer() {
        let mut tally = CategoryTally::default();
        tally.record("a");
        let posts = vec![Post::new("1", "x")];
        let ranked = text_analysis::top_influential(&posts, 10);

        let page = Reporter::with_renderer(Recording)
            .with_title("T")
            .render(&tally, &[("词".to_string(), 1)], &ranked)
            .unwrap();

        assert_eq!(page, "T|category-pie,term-cloud,engagement-bar");
    }

    #[test]
    fn test_render_rejects_empty_tally() {
        let result = Reporter::<EchartsRenderer>::default().render(&CategoryTally::default(), &[], &[]);
        assert!(matches!(result, Err(ReportError::EmptyInput { .. })));
    }

    #[test]
    fn test_write_report_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.html");

        write_report(&path, "<p>first</p>").unwrap();
        write_report(&path, "<p>second</p>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>second</p>");
    }

    #[test]
    fn test_write_report_failure_names_path() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be overwritten with a file.
        let err = write_report(dir.path(), "x").unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }
}
