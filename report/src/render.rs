use crate::charts::Chart;
use maud::{html, PreEscaped, DOCTYPE};
use postpulse_core::{ReportConfig, ReportError};
use std::fs;
use std::path::Path;
use tracing::info;

const ECHARTS_CDN: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";
const WORDCLOUD_CDN: &str =
    "https://cdn.jsdelivr.net/npm/echarts-wordcloud@2/dist/echarts-wordcloud.min.js";

/// Turns chart definitions into a finished HTML document.
pub trait ChartRenderer {
    fn render_page(&self, title: &str, charts: &[Chart]) -> Result<String, ReportError>;
}

/// How a script reaches the page: a `src` link or the code itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Link(String),
    Inline(String),
}

impl ScriptSource {
    /// Read a local script so the page carries it.
    pub fn inline_file(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let code = fs::read_to_string(path).map_err(|source| ReportError::ScriptRead {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Embedding {} ({} bytes)", path.display(), code.len());
        Ok(ScriptSource::Inline(code.replace("</script", "<\\/script")))
    }
}

/// Renders charts with the browser-side ECharts library.
#[derive(Debug, Clone)]
pub struct EchartsRenderer {
    pub echarts: ScriptSource,
    pub wordcloud: ScriptSource,
    pub width: u32,
    pub height: u32,
}

impl Default for EchartsRenderer {
    fn default() -> Self {
        Self {
            echarts: ScriptSource::Link(ECHARTS_CDN.to_string()),
            wordcloud: ScriptSource::Link(WORDCLOUD_CDN.to_string()),
            width: 900,
            height: 500,
        }
    }
}

impl EchartsRenderer {
    /// Script sources from the `[report]` section; unset ones link the CDN.
    pub fn from_config(config: &ReportConfig) -> Result<Self, ReportError> {
        let source = |configured: &Option<String>, cdn: &str| match configured {
            Some(path) if config.inline_scripts => ScriptSource::inline_file(path),
            Some(src) => Ok(ScriptSource::Link(src.clone())),
            None => Ok(ScriptSource::Link(cdn.to_string())),
        };

        Ok(Self {
            echarts: source(&config.echarts_script, ECHARTS_CDN)?,
            wordcloud: source(&config.wordcloud_script, WORDCLOUD_CDN)?,
            ..Self::default()
        })
    }

    fn init_script(&self, charts: &[Chart]) -> Result<String, ReportError> {
        let mut script = String::new();
        for chart in charts {
            let encode = |value: &serde_json::Value| {
                serde_json::to_string(value)
                    .map(|json| script_safe(&json))
                    .map_err(|e| ReportError::ChartEncoding {
                        chart: chart.id.clone(),
                        details: e.to_string(),
                    })
            };
            let id = encode(&serde_json::Value::String(chart.id.clone()))?;
            let option = encode(&chart.option)?;
            script.push_str(&format!(
                "echarts.init(document.getElementById({id})).setOption({option});\n"
            ));
        }
        Ok(script)
    }
}

impl ChartRenderer for EchartsRenderer {
    fn render_page(&self, title: &str, charts: &[Chart]) -> Result<String, ReportError> {
        let script = self.init_script(charts)?;
        let chart_style = format!(
            "width:{}px;height:{}px;margin:24px auto;",
            self.width, self.height
        );

        let page = html! {
            (DOCTYPE)
            html lang="zh-CN" {
                head {
                    meta charset="utf-8";
                    title { (title) }
                    @for source in [&self.echarts, &self.wordcloud] {
                        @match source {
                            ScriptSource::Link(src) => { script src=(src) {} }
                            ScriptSource::Inline(code) => { script { (PreEscaped(code)) } }
                        }
                    }
                }
                body {
                    @for chart in charts {
                        div id=(chart.id) class="chart" title=(chart.title) style=(chart_style) {}
                    }
                    script { (PreEscaped(script)) }
                }
            }
        };
        Ok(page.into_string())
    }
}

/// JSON is embedded in a `<script>` element; `</` must not close it early.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chart(id: &str, option: serde_json::Value) -> Chart {
        Chart {
            id: id.to_string(),
            title: "t".to_string(),
            option,
        }
    }

    #[test]
    fn test_page_has_container_and_init_per_chart() {
        let renderer = EchartsRenderer::default();
        let html = renderer
            .render_page(
                "报告",
                &[chart("one", json!({ "a": 1 })), chart("two", json!({ "b": 2 }))],
            )
            .unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>报告</title>"));
        assert!(html.contains(r#"id="one""#));
        assert!(html.contains(r#"id="two""#));
        assert!(html.contains(r#"document.getElementById("two")).setOption({"b":2})"#));
        assert!(html.contains(ECHARTS_CDN));
        assert!(html.contains(WORDCLOUD_CDN));
    }

    #[test]
    fn test_script_breakout_is_escaped() {
        let renderer = EchartsRenderer::default();
        let html = renderer
            .render_page("x", &[chart("c", json!({ "name": "</script><b>" }))])
            .unwrap();

        assert!(!html.contains("</script><b>"));
        assert!(html.contains(r"<\/script><b>"));
    }

    #[test]
    fn test_unset_scripts_link_the_cdn() {
        let renderer = EchartsRenderer::from_config(&ReportConfig::default()).unwrap();
        assert_eq!(renderer.echarts, ScriptSource::Link(ECHARTS_CDN.to_string()));
        assert_eq!(renderer.wordcloud, ScriptSource::Link(WORDCLOUD_CDN.to_string()));
    }

    #[test]
    fn test_local_script_paths_replace_the_cdn() {
        let config = ReportConfig {
            echarts_script: Some("vendor/echarts.min.js".to_string()),
            wordcloud_script: Some("vendor/echarts-wordcloud.min.js".to_string()),
            inline_scripts: false,
        };
        let html = EchartsRenderer::from_config(&config)
            .unwrap()
            .render_page("x", &[chart("c", json!({}))])
            .unwrap();

        assert!(html.contains(r#"<script src="vendor/echarts.min.js">"#));
        assert!(html.contains(r#"<script src="vendor/echarts-wordcloud.min.js">"#));
        assert!(!html.contains("cdn.jsdelivr.net"));
    }

    #[test]
    fn test_inlined_scripts_make_the_page_standalone() {
        let dir = tempfile::TempDir::new().unwrap();
        let echarts = dir.path().join("echarts.min.js");
        let wordcloud = dir.path().join("wordcloud.min.js");
        fs::write(&echarts, "var echarts = {}; // \"</script>\"").unwrap();
        fs::write(&wordcloud, "var wordcloud = 1;").unwrap();

        let config = ReportConfig {
            echarts_script: Some(echarts.display().to_string()),
            wordcloud_script: Some(wordcloud.display().to_string()),
            inline_scripts: true,
        };
        let html = EchartsRenderer::from_config(&config)
            .unwrap()
            .render_page("x", &[chart("c", json!({}))])
            .unwrap();

        assert!(!html.contains("<script src="));
        assert!(!html.contains("cdn.jsdelivr.net"));
        assert!(html.contains("var echarts = {};"));
        assert!(html.contains(r#""<\/script>""#));
        assert!(html.contains("var wordcloud = 1;"));
    }

    #[test]
    fn test_missing_inline_script_is_an_error() {
        let config = ReportConfig {
            echarts_script: Some("/definitely/not/here/echarts.js".to_string()),
            wordcloud_script: Some("/definitely/not/here/wordcloud.js".to_string()),
            inline_scripts: true,
        };
        let err = EchartsRenderer::from_config(&config).unwrap_err();
        assert!(matches!(err, ReportError::ScriptRead { .. }));
    }
}
