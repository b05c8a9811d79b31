//! stashpush - report build events to Bitbucket Server
//!
//! ## Commands
//!
//! - `status`: post per-commit build statuses for one build event
//! - `comment`: post pull request comments for a batch of finished builds
//! - `check-config`: parse the configuration and show what would be used
//!
//! Delivery failures are logged and listed in the printed report; the exit
//! status only reflects unreadable input or invalid configuration.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use stashpush_core::{
    Build, CommentNotifier, Config, DeliveryReport, ServiceConfig, StatusNotifier, StatusOptions,
    METRICS,
};

#[derive(Parser)]
#[command(name = "stashpush")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Report build statuses and pull request comments to Bitbucket Server", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "STASHPUSH_CONFIG",
        default_value = "stashpush.toml"
    )]
    config: PathBuf,

    /// Override the configured user for every section
    #[arg(long, global = true, env = "STASHPUSH_USER")]
    user: Option<String>,

    /// Override the configured password for every section
    #[arg(long, global = true, env = "STASHPUSH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post build statuses for one build event
    Status {
        /// Build JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        build: PathBuf,
    },

    /// Post pull request comments for a batch of builds
    Comment {
        /// JSON file with a build or an array of builds, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        builds: PathBuf,
    },

    /// Validate the configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    stashpush_core::init_tracing(cli.json, level);

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;
    apply_credentials(&mut config, cli.user.as_deref(), cli.password.as_deref());

    let result = match cli.command {
        Commands::Status { build } => cmd_status(&config, &build).await,
        Commands::Comment { builds } => cmd_comment(&config, &builds).await,
        Commands::CheckConfig => cmd_check_config(&config),
    };
    METRICS.flush();
    result
}

/// Command-line credentials win over the file.
fn apply_credentials(config: &mut Config, user: Option<&str>, password: Option<&str>) {
    let mut services: Vec<&mut ServiceConfig> = Vec::new();
    if let Some(status) = config.status.as_mut() {
        services.push(&mut status.service);
    }
    if let Some(comment) = config.comment.as_mut() {
        services.push(&mut comment.service);
    }
    for service in services {
        if let Some(user) = user {
            service.user = Some(user.to_string());
        }
        if let Some(password) = password {
            service.password = Some(password.to_string());
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
    }
}

/// Accept either one build object or an array of builds.
fn parse_builds(text: &str) -> Result<Vec<Build>> {
    let value: serde_json::Value = serde_json::from_str(text).context("Input is not valid JSON")?;
    let builds = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|build| vec![build])
    };
    builds.context("Input is not a build record")
}

fn print_report(report: &DeliveryReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn cmd_status(config: &Config, input: &Path) -> Result<()> {
    let section = config
        .status
        .as_ref()
        .context("No [status] section in configuration")?;
    let build: Build = serde_json::from_str(&read_input(input)?)
        .with_context(|| format!("Invalid build record in {:?}", input))?;

    let notifier =
        StatusNotifier::from_config(section).context("Failed to set up status notifier")?;
    let report = notifier.send(&build).await;
    notifier.shutdown();

    info!(sent = report.sent(), failed = report.failed(), "status event processed");
    print_report(&report)
}

async fn cmd_comment(config: &Config, input: &Path) -> Result<()> {
    let section = config
        .comment
        .as_ref()
        .context("No [comment] section in configuration")?;
    let builds = parse_builds(&read_input(input)?)
        .with_context(|| format!("Invalid build batch in {:?}", input))?;

    let notifier =
        CommentNotifier::from_config(section).context("Failed to set up comment notifier")?;
    let report = notifier.notify(&builds).await;
    notifier.shutdown();

    info!(sent = report.sent(), failed = report.failed(), "comment batch processed");
    print_report(&report)
}

/// Warn when every builder would overwrite the same status entry.
fn shared_key_note(options: &StatusOptions) -> Option<&'static str> {
    options
        .key
        .is_static()
        .then_some("key has no property references; every builder shares one status")
}

fn cmd_check_config(config: &Config) -> Result<()> {
    if config.status.is_none() && config.comment.is_none() {
        anyhow::bail!("Configuration has neither a [status] nor a [comment] section");
    }

    if let Some(status) = &config.status {
        let options = status.options();
        println!("status:  {}", status.service.base_url);
        println!("  key:          {}", options.key);
        if let Some(note) = shared_key_note(&options) {
            println!("  note:         {note}");
        }
        if let Some(name) = &options.status_name {
            println!("  name:         {}", name);
        }
        println!("  start:        {}", options.start_description);
        println!("  end:          {}", options.end_description);
        println!("  verify TLS:   {}", status.service.verify);
    }
    if let Some(comment) = &config.comment {
        println!("comment: {}", comment.service.base_url);
        println!("  mode:         {:?}", comment.filter.mode);
        if let Some(builders) = &comment.filter.builders {
            println!("  builders:     {}", builders.join(", "));
        }
        println!("  verify TLS:   {}", comment.service.verify);
    }
    Ok(())
}
