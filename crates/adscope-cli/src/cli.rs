use adscope_browser::ChromiumLauncher;
use adscope_core::{AppConfig, RenderMode, ScrapeRequest};
use adscope_db::{scrape_jobs, Database, JobState};
use adscope_scanner::ScrapeOrchestrator;
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "adscope")]
#[command(about = "Scrape Ads Library listings into structured JSON")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Job database file (overrides config)
    #[arg(long, global = true, env = "ADSCOPE_DATABASE_PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a scrape job and wait for it to finish
    Scrape {
        /// Ads Library URL to scrape
        url: String,
        /// Result file; relative paths go under the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show the browser window
        #[arg(long)]
        visible: bool,
        /// How often to poll the job while waiting
        #[arg(long, default_value = "1000")]
        poll_interval_ms: u64,
    },

    /// Show the state of a job
    Status {
        /// Job ID returned by `scrape`
        job_id: String,
    },

    /// List recorded jobs
    List {
        /// Only jobs in this state
        #[arg(short, long, value_enum)]
        state: Option<StateFilter>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StateFilter {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl From<StateFilter> for JobState {
    fn from(filter: StateFilter) -> Self {
        match filter {
            StateFilter::Pending => Self::Pending,
            StateFilter::Running => Self::Running,
            StateFilter::Succeeded => Self::Succeeded,
            StateFilter::Failed => Self::Failed,
        }
    }
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = AppConfig::load_from(path)
                    .with_context(|| format!("failed to load config from {}", path.display()))?;
                config.apply_env();
                config.validate()?;
                config
            }
            None => AppConfig::load_with_env().context("failed to load config")?,
        };
        if let Some(path) = &self.database {
            config.jobs.database_path = Some(path.clone());
        }
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;
    let db_path = config.database_path()?;
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("failed to open job database {}", db_path.display()))?;

    match cli.command {
        Commands::Scrape {
            url,
            output,
            visible,
            poll_interval_ms,
        } => {
            let render_mode = if visible {
                RenderMode::Visible
            } else {
                RenderMode::from_headless(config.browser.headless)
            };
            let mut request = ScrapeRequest::new(url)?.with_render_mode(render_mode);
            if let Some(output) = output {
                request = request.with_output_path(output);
            }

            let launcher = ChromiumLauncher::new(config.browser.clone());
            let orchestrator = ScrapeOrchestrator::from_config(launcher, db, &config)?;

            let job_id = orchestrator.submit(request).await?;
            print_json(&serde_json::json!({
                "job_id": job_id,
                "status": "Task started",
            }))?;

            let status = orchestrator
                .wait_for(job_id.as_str(), Duration::from_millis(poll_interval_ms))
                .await?;
            print_json(&status)?;
        }

        Commands::Status { job_id } => {
            let job = scrape_jobs::get_job(db.pool(), &job_id)
                .await?
                .with_context(|| format!("scrape job not found: {job_id}"))?;
            print_json(&adscope_scanner::JobStatus::from(job))?;
        }

        Commands::List { state } => {
            let states = match state {
                Some(filter) => vec![JobState::from(filter)],
                None => vec![
                    JobState::Pending,
                    JobState::Running,
                    JobState::Succeeded,
                    JobState::Failed,
                ],
            };

            let mut summaries = Vec::new();
            for state in states {
                for job in scrape_jobs::list_jobs_in_state(db.pool(), state).await? {
                    summaries.push(serde_json::json!({
                        "job_id": job.id,
                        "state": job.state,
                        "target_url": job.target_url,
                        "created_at": job.created_at,
                        "completed_at": job.completed_at,
                        "output_file": job.output_file,
                        "error": job.error_message,
                    }));
                }
            }
            print_json(&summaries)?;
        }
    }

    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
