mod exit;
mod pipeline;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use promptly_analytics::HttpAnalyticsSource;
use promptly_core::config::{AppConfig, Credentials, MAX_DAYS, MIN_DAYS};
use promptly_core::generation;
use promptly_core::Generator;
use promptly_publish::{ChatPublisher, DashboardPublisher, HttpPoster, JsonPoster};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

use exit::ErrCode;
use pipeline::Pipeline;

#[derive(Parser)]
#[command(
    name = "promptly-summary",
    about = "Generate Promptly summaries with prompting tips for developers",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/promptly-summary/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Days of analytics to summarize
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(MIN_DAYS as i64..=MAX_DAYS as i64))]
    days: Option<u32>,

    /// Override the model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, summarize and publish (default)
    Run,

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write the default configuration file
    Init,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ErrCode::InvalidArgs.into()
            } else {
                ErrCode::Success.into()
            };
        }
    };

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "promptly_summary=info,promptly_publish=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(cli).await.into()
}

async fn run(cli: Cli) -> ErrCode {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ErrCode::InvalidArgs;
        }
    };

    if let Some(Commands::Config { action }) = cli.command {
        let path = cli.config.unwrap_or_else(AppConfig::default_path);
        return match handle_config_command(action, &config, &path) {
            Ok(()) => ErrCode::Success,
            Err(e) => {
                error!("{:#}", e);
                ErrCode::Internal
            }
        };
    }

    let credentials = Credentials::from_env(&config);

    // Credentials are checked before any network call.
    let generator = match generation::from_config(&config.provider, &credentials) {
        Ok(generator) => generator,
        Err(e) if e.is_credential() => {
            error!("{}", e);
            return ErrCode::MissingApiKey;
        }
        Err(e) => {
            error!("{}", e);
            return ErrCode::Internal;
        }
    };
    if config.publish.require_chat && credentials.chat_webhook.is_none() {
        error!(
            "Missing credential: `{}` is not set",
            config.publish.chat_webhook_env
        );
        return ErrCode::MissingWebhook;
    }

    let pipeline = match build_pipeline(&config, credentials, generator) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{:#}", e);
            return ErrCode::Internal;
        }
    };

    let outcome = pipeline.run(config.days).await;
    if let Some(diagnostic) = outcome.diagnostic() {
        error!("{}", diagnostic);
    }
    outcome.exit_code()
}

/// Load the config file, apply CLI overrides, and validate.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let init = matches!(
        cli.command,
        Some(Commands::Config {
            action: Some(ConfigAction::Init)
        })
    );
    let mut config = match &cli.config {
        // `config init` creates the file, so a missing one means defaults.
        Some(path) if init && !path.exists() => AppConfig::default(),
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => AppConfig::load()?,
    };

    if let Some(days) = cli.days {
        config.days = days;
    }
    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }

    config.validate()?;
    Ok(config)
}

fn build_pipeline(
    config: &AppConfig,
    credentials: Credentials,
    generator: Arc<dyn Generator>,
) -> Result<Pipeline> {
    let source = HttpAnalyticsSource::new(&config.source)?;
    let poster: Arc<dyn JsonPoster> = Arc::new(HttpPoster::new(Duration::from_secs(
        config.publish.timeout_secs,
    ))?);

    tracing::info!(
        "Model: {}, source: {}, dashboard: {}",
        config.provider.model,
        config.source.url,
        config.publish.dashboard_url,
    );

    Ok(Pipeline::new(
        Arc::new(source),
        generator,
        Arc::new(ChatPublisher::new(credentials.chat_webhook, poster.clone())),
        Arc::new(DashboardPublisher::new(
            config.publish.dashboard_url.clone(),
            poster,
        )),
        config.selection.clone(),
    ))
}

fn handle_config_command(
    action: Option<ConfigAction>,
    config: &AppConfig,
    path: &Path,
) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save_to(path)?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", path.display());
        }
    }
    Ok(())
}
