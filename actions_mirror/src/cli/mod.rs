use crate::analyzer;
use crate::conf::{Config, SelectorConfig};
use crate::github::{GithubClient, RunSource};
use crate::gitlab::GitlabClient;
use crate::journal::Journal;
use crate::monitor::{Monitor, Settings};
use crate::report::{short_duration, status_line};
use crate::{BUILD_COMMIT, BUILD_SEMVER};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// The file name the deployment log is appended to, inside the configured log directory.
pub const LOG_FILE_NAME: &str = "github-deployment.log";

#[derive(Debug, Parser)]
#[clap(name = "actions-mirror")]
#[clap(about = "Mirrors a GitHub Actions workflow run onto a GitLab commit status.")]
#[clap(
    long_about = "Mirrors a GitHub Actions workflow run onto a GitLab commit status.\n\n Run it from a GitLab \
    job after handing a deployment off to GitHub Actions: it finds the workflow run for your branch or commit, \
    follows it until it finishes and keeps the GitLab pipeline's external status in step the whole time."
)]
#[clap(version)]
struct Args {
    /// Set configuration path; if empty default paths are used
    #[clap(long, value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Follow a workflow run until it finishes, mirroring its status to GitLab. This is the
    /// default when no command is given.
    Monitor(MonitorArgs),

    /// Fetch a single workflow run and explain where it failed.
    Analyze {
        /// Workflow run identifier.
        run_id: u64,
    },
}

#[derive(Debug, Default, clap::Args)]
struct MonitorArgs {
    /// Follow the most recent run on this branch.
    #[clap(long, conflicts_with = "commit")]
    branch: Option<String>,

    /// Follow the most recent run for this head commit.
    #[clap(long)]
    commit: Option<String>,
}

pub struct Cli {
    args: Args,
    conf: Config,
}

impl Cli {
    pub fn new() -> Result<Self> {
        let args = Args::parse();
        let conf = Config::load(args.config_path.as_deref()).context("Could not load configuration")?;

        Ok(Self { args, conf })
    }

    /// Runs the requested command and returns the process exit code.
    pub async fn run(mut self) -> Result<i32> {
        let command = self
            .args
            .command
            .take()
            .unwrap_or(Commands::Monitor(MonitorArgs::default()));

        match command {
            Commands::Monitor(args) => self.monitor(args).await,
            Commands::Analyze { run_id } => self.analyze(run_id).await,
        }
    }

    async fn monitor(mut self, args: MonitorArgs) -> Result<i32> {
        apply_selector_flags(&mut self.conf.selector, args.branch, args.commit);
        self.conf.validate().context("Invalid configuration")?;
        let selector = self.conf.selector()?;

        let log_file = init_logging(&self.conf.general.log_level, &self.conf.general.log_dir)?;

        info!(
            semver = BUILD_SEMVER,
            commit = BUILD_COMMIT,
            repo = %self.conf.github.repo,
            selector = %selector,
            environment = %self.conf.general.environment,
            "Started actions-mirror"
        );
        info!(log_file = %log_file.display(), "Writing deployment log");

        let monitor_conf = &self.conf.monitor;
        if monitor_conf.request_timeout >= monitor_conf.poll_interval {
            warn!(
                request_timeout = %short_duration(monitor_conf.request_timeout),
                poll_interval = %short_duration(monitor_conf.poll_interval),
                "Request timeout is not shorter than the poll interval; ticks may run long"
            );
        }

        let journal = Journal::new(&self.conf.general.log_dir);
        let source = GithubClient::new(&self.conf.github, monitor_conf.request_timeout, journal.clone())
            .context("Could not create GitHub client")?;
        let publisher = GitlabClient::new(&self.conf.gitlab, monitor_conf.request_timeout)
            .context("Could not create GitLab client")?;

        let settings = Settings {
            poll_interval: monitor_conf.poll_interval,
            timeout: monitor_conf.timeout,
            search_timeout: monitor_conf.search_timeout,
            context: self.conf.status_context(),
            environment: self.conf.general.environment.clone(),
            journal: journal.path().map(Path::to_path_buf),
        };

        let outcome = Monitor::new(Box::new(source), Box::new(publisher), selector, settings)
            .run()
            .await;

        Ok(outcome.exit_code())
    }

    async fn analyze(self, run_id: u64) -> Result<i32> {
        self.conf.validate_github().context("Invalid configuration")?;
        init_logging(&self.conf.general.log_level, &self.conf.general.log_dir)?;

        let source = GithubClient::new(
            &self.conf.github,
            self.conf.monitor.request_timeout,
            Journal::disabled(),
        )
        .context("Could not create GitHub client")?;

        let run = source
            .get_run(run_id)
            .await
            .with_context(|| format!("Could not fetch workflow run {run_id}"))?;

        info!(run_id, "{}", status_line(&run));
        info!(run_id, "🔗 {}", run.html_url);

        let report = analyzer::analyze(&source, &run)
            .await
            .with_context(|| format!("Could not fetch jobs for workflow run {run_id}"))?;
        report.narrate();

        Ok(0)
    }
}

/// Flags always get final priority over all other configuration types. Setting one selector
/// clears the other so a configured branch can be overridden with a commit and vice versa.
fn apply_selector_flags(selector: &mut SelectorConfig, branch: Option<String>, commit: Option<String>) {
    if let Some(branch) = branch {
        selector.branch = Some(branch);
        selector.commit_sha = None;
    }

    if let Some(commit) = commit {
        selector.commit_sha = Some(commit);
        selector.branch = None;
    }
}

/// Sends logs to stdout, where the CI job console picks them up, and appends a plain copy to
/// `<log_dir>/github-deployment.log`. Returns the path of that file.
fn init_logging(log_level: &str, log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Could not create log directory '{}'", log_dir.display()))?;

    let path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Could not open log file '{}'", path.display()))?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("Could not parse log_level '{log_level}'"))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .try_init()
        .context("Could not initialize logging")?;

    Ok(path)
}
