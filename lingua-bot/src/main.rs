//! lingua - language practice bot.

#![allow(clippy::print_stdout, clippy::print_stderr)] // CLI program intentionally prints

use clap::{Args, Parser, Subcommand};
use lingua_bot::config::{
    GROQ_API_KEY_ENV, MODEL_ENV, TELEGRAM_TOKEN_ENV, TELEGRAM_TOKEN_FALLBACK_ENV, token_help,
};
use lingua_bot::error::{BotError, DisplayError, ErrorContext, Result};
use lingua_bot::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level as LogLevel;
use tracing_subscriber::EnvFilter;

/// Practice a foreign language with an AI tutor on Telegram or in the terminal.
#[derive(Parser)]
#[command(name = "lingua")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "LINGUA_BOT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot on Telegram
    Run(RunArgs),

    /// Practice in the terminal
    Chat(ChatArgs),

    /// Show configuration and environment status
    Status,

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Also accept input from this terminal
    #[arg(long)]
    cli: bool,

    /// Completion model (overrides config)
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Args)]
struct ChatArgs {
    /// Name the tutor calls you
    #[arg(short, long, env = "USER", default_value = "Learner")]
    name: String,

    /// Completion model (overrides config)
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (secrets hidden)
    Show,
    /// Show the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Check the configuration
    Validate,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", DisplayError(&e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LogLevel::INFO,
        1 => LogLevel::DEBUG,
        _ => LogLevel::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "lingua_bot={level},lingua={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => cmd_run(args, path).await,
        Commands::Chat(args) => cmd_chat(args, path).await,
        Commands::Status => cmd_status(path).await,
        Commands::Config(args) => cmd_config(args, path).await,
    }
}

async fn effective_config(path: Option<&Path>, model: Option<String>) -> Result<BotConfig> {
    let mut config = load_config(path).await?.with_env();
    if let Some(model) = model {
        config.tutor.model = model;
    }
    Ok(config)
}

fn build_gateway(config: &BotConfig) -> Result<Gateway<GroqClient>> {
    let mut builder = GroqClient::builder()
        .maybe_api_key(config.groq.api_key.clone())
        .timeout_secs(Some(config.groq.timeout_secs));
    if let Some(url) = &config.groq.base_url {
        builder = builder.base_url(url);
    }
    let provider = builder.build().context("building the Groq client")?;
    if !provider.is_available() {
        tracing::warn!("{GROQ_API_KEY_ENV} is not set; the tutor will only apologize");
    }

    let engine = TutorEngine::with_config(provider, &config.tutor);
    let store = Arc::new(SessionStore::with_config(MemoryStorage::new(), config.session));
    Ok(Gateway::new(Dispatcher::new(store, engine)))
}

fn report_issues(config: &BotConfig) {
    for issue in config.validate() {
        match issue.level {
            IssueLevel::Warning => tracing::warn!(field = %issue.field, "{}", issue.message),
            IssueLevel::Error => tracing::error!(field = %issue.field, "{}", issue.message),
        }
    }
}

/// Stop the gateway on Ctrl+C or, if given, when the terminal session ends.
fn spawn_shutdown(gateway: &Gateway<GroqClient>, cli_exit: Option<Arc<tokio::sync::Notify>>) {
    let shutdown = gateway.shutdown_handle();
    tokio::spawn(async move {
        let cli_exit = async {
            match cli_exit {
                Some(exit) => exit.notified().await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => println!("\nShutting down..."),
            () = cli_exit => {}
        }
        shutdown.notify_one();
    });
}

async fn cmd_run(args: RunArgs, path: Option<&Path>) -> Result<()> {
    let config = effective_config(path, args.model).await?;

    if let Err(e) = config.check_run(args.cli) {
        eprintln!("error: {e}");
        if matches!(e, ConfigError::Missing(_)) {
            eprintln!("{}", token_help());
        }
        return Err(e.into());
    }
    report_issues(&config);

    let gateway = build_gateway(&config)?;

    #[cfg(feature = "telegram")]
    if config.telegram.enabled {
        let token = config.telegram_token()?;
        gateway
            .register(TelegramChannel::new(TelegramChannelConfig::new(token)))
            .await;
    }
    #[cfg(not(feature = "telegram"))]
    if config.telegram.enabled {
        return Err(BotError::config(
            "built without the `telegram` feature; disable telegram and use --cli",
        ));
    }

    let cli_exit = if args.cli {
        let cli = CliChannel::with_config(CliChannelConfig::new().display_name(local_name()));
        let exit = cli.exit_signal();
        gateway.register(cli).await;
        Some(exit)
    } else {
        None
    };

    spawn_shutdown(&gateway, cli_exit);
    println!("Bot running. Press Ctrl+C to stop.\n");
    gateway.run().await
}

async fn cmd_chat(args: ChatArgs, path: Option<&Path>) -> Result<()> {
    let config = effective_config(path, args.model).await?;
    let gateway = build_gateway(&config)?;

    let cli = CliChannel::with_config(CliChannelConfig::new().display_name(args.name));
    let exit = cli.exit_signal();
    gateway.register(cli).await;

    spawn_shutdown(&gateway, Some(exit));
    println!("lingua chat | '#N' picks menu option N, 'exit' quits\n");
    gateway.run().await
}

fn local_name() -> String {
    std::env::var("USER").unwrap_or_else(|_| "Learner".to_string())
}

async fn cmd_status(path: Option<&Path>) -> Result<()> {
    let config_file = path.map_or_else(config_path, Path::to_path_buf);

    println!("lingua status\n");
    println!("Configuration:");
    println!("  Path:   {}", config_file.display());
    println!("  Exists: {}", if config_file.exists() { "yes" } else { "no" });

    match effective_config(path, None).await {
        Ok(config) => {
            let issues = config.validate();
            println!("  Valid:  {}", if config.has_errors() { "no" } else { "yes" });
            println!();
            println!("Tutor:");
            println!("  Model:     {}", config.tutor.model);
            println!(
                "  Languages: {} (explanations in {})",
                config.tutor.target_language, config.tutor.native_language
            );
            println!("  Window:    {} messages", config.tutor.history_window);
            println!("  Telegram:  {}", if config.telegram.enabled { "enabled" } else { "disabled" });
            if !issues.is_empty() {
                println!();
                println!("Issues:");
                for issue in issues {
                    println!("  {issue}");
                }
            }
        }
        Err(e) => println!("  Valid:  no ({e})"),
    }

    println!();
    println!("Environment:");
    for name in [TELEGRAM_TOKEN_ENV, TELEGRAM_TOKEN_FALLBACK_ENV, GROQ_API_KEY_ENV, MODEL_ENV] {
        let status = if std::env::var(name).is_ok() { "set" } else { "-" };
        println!("  {name}: {status}");
    }

    Ok(())
}

async fn cmd_config(args: ConfigArgs, path: Option<&Path>) -> Result<()> {
    let config_file = path.map_or_else(config_path, Path::to_path_buf);

    match args.command {
        ConfigCommands::Path => println!("{}", config_file.display()),
        ConfigCommands::Show => {
            let mut config = effective_config(path, None).await?;
            let hidden = Some("<redacted>".to_string());
            if config.telegram.token.is_some() {
                config.telegram.token.clone_from(&hidden);
            }
            if config.groq.api_key.is_some() {
                config.groq.api_key = hidden;
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Init { force } => {
            if init_config(&config_file, force).await? {
                println!("Configuration created: {}", config_file.display());
                println!();
                println!("Next steps:");
                println!("  1. export {TELEGRAM_TOKEN_ENV}=<token from @BotFather>");
                println!("  2. export {GROQ_API_KEY_ENV}=<key>");
                println!("  3. lingua run");
            } else {
                println!("Configuration already exists at: {}", config_file.display());
                println!("Use --force to overwrite.");
            }
        }
        ConfigCommands::Validate => {
            let config = effective_config(path, None).await?;
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration is valid");
            }
            for issue in &issues {
                println!("{issue}");
            }
            if config.has_errors() {
                return Err(BotError::config("configuration has errors"));
            }
        }
    }

    Ok(())
}
