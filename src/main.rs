mod menu;
mod pipeline;

use clap::Parser;
use menu::Menu;
use pipeline::{Action, Pipeline, RunConfig};
use postpulse_core::{AppConfig, ErrorReporter, PipelineError, Stage};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "postpulse=info,collector=info,weibo_client=info,\
records_store=info,text_analysis=info,report=info";

/// Crawl Weibo search results for a topic and report on what people say.
#[derive(Debug, Parser)]
#[command(name = "postpulse", version, about)]
struct Cli {
    /// Configuration file (defaults to ./postpulse.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run one action and exit instead of showing the menu
    #[arg(long, value_enum)]
    action: Option<Action>,

    /// Number of result pages to crawl
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pages: Option<u32>,

    /// Records file to write when crawling and read when analyzing
    #[arg(long, value_name = "FILE")]
    records: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_log_filter()),
        )
        .init();

    let cli = Cli::parse();
    let reporter = ErrorReporter::new();
    info!("Starting postpulse");

    let mut app_config = match AppConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let err = PipelineError::new(Stage::Configuring, e);
            eprintln!("{}", reporter.report_pipeline_error(&err));
            return ExitCode::from(err.exit_code());
        }
    };
    app_config.apply_env();

    let mut run_config = RunConfig::from_app(&app_config);
    if let Some(pages) = cli.pages {
        run_config.pages = pages;
    }
    if let Some(records) = cli.records {
        run_config.records_path = records;
    }
    let mut pipeline = Pipeline::new(run_config);

    match cli.action {
        Some(action) => match pipeline.run(action).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", reporter.report_pipeline_error(&e));
                ExitCode::from(e.exit_code())
            }
        },
        None => match interactive(&mut pipeline, &reporter, cli.pages.is_some()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Interactive session failed: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn default_log_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_LOG_FILTER)
}

/// Menu loop. Failed actions are reported and the menu is shown again.
async fn interactive(
    pipeline: &mut Pipeline,
    reporter: &ErrorReporter,
    pages_from_flag: bool,
) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut menu = Menu::new(stdin.lock(), io::stdout());
    let crawl_records = pipeline.config().records_path.clone();

    menu.banner()?;
    loop {
        let action = menu.choose_action()?;
        match action {
            Action::Exit => {
                menu.say("感谢使用! 再见!")?;
                return Ok(());
            }
            Action::Crawl | Action::CrawlThenAnalyze => {
                pipeline.config_mut().records_path = crawl_records.clone();
                if !pages_from_flag {
                    let default = pipeline.config().pages;
                    pipeline.config_mut().pages = menu.ask_pages(default)?;
                }
            }
            Action::Analyze => {
                let default = pipeline.config().records_path.clone();
                pipeline.config_mut().records_path = menu.ask_records_path(&default)?;
            }
        }

        match pipeline.run(action).await {
            Ok(()) => {
                let config = pipeline.config();
                if action != Action::Analyze {
                    menu.say(&format!("数据已保存至 {}", config.records_path.display()))?;
                }
                if action != Action::Crawl {
                    menu.say(&format!(
                        "分析完成! 可视化结果已保存为 {}",
                        config.report_path.display()
                    ))?;
                }
            }
            Err(e) => menu.say(&reporter.report_pipeline_error(&e))?,
        }
        menu.pause()?;
    }
}
