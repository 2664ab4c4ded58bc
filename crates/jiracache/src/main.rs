use std::env;
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context as _};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use directories::BaseDirs;
use jiracache::channel::ServerAddr;
use jiracache::client::Client;
use jiracache::html::to_plain_text;
use jiracache::{config_store, tui};
use jiracache_core::config::ConfigFile;
use jiracache_core::paths::{compute_paths, JiracachePaths, PathInputs};
use jiracache_protocol::{Issue, Push, ResultEntry};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "jc",
    version,
    about = "jiracache: live issue search over a single backend connection"
)]
struct Cli {
    #[arg(long, global = true, value_name = "DIR", env = "JIRACACHE_DIR")]
    dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "ADDR", env = "JIRACACHE_SERVER")]
    server: Option<String>,

    #[arg(long, global = true, env = "JIRACACHE_LOG", value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive search (default).
    Tui,
    /// Run one search and print the results.
    Query {
        text: String,
        #[arg(long)]
        json: bool,
    },
    /// Fetch one issue with all fields.
    Get {
        key: String,
        #[arg(long)]
        json: bool,
    },
    /// Print push messages as they arrive.
    Watch {
        /// Search to register with the backend so it sends result updates.
        #[arg(long)]
        query: Option<String>,
    },
    Version,
    Completion {
        #[command(subcommand)]
        command: CompletionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CompletionCommand {
    Bash,
    Fish,
    Powershell,
    Zsh,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Tui);
    let paths = resolve_paths(cli.dir.as_ref())?;
    let config = config_store::load(&paths).await?;

    let enable_stderr_logging = !matches!(command, Command::Tui);
    let log_level = cli.log_level.as_deref().or(config.log_level.as_deref());
    init_logging(&paths, log_level, enable_stderr_logging)?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "jiracache starting");

    let addr = ServerAddr::parse(cli.server.as_deref().unwrap_or(config.effective_server()));
    dispatch(command, &addr, config).await
}

fn resolve_paths(dir_override: Option<&PathBuf>) -> anyhow::Result<JiracachePaths> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not determine home directory"))?;
    let home_dir = base_dirs.home_dir().to_path_buf();

    let xdg_config_home = match env::var_os("XDG_CONFIG_HOME") {
        Some(v) => Some(PathBuf::from(v)),
        None => Some(base_dirs.config_dir().to_path_buf()),
    };

    Ok(compute_paths(PathInputs {
        home_dir,
        xdg_config_home,
        dir_override: dir_override.cloned(),
    }))
}

fn init_logging(
    paths: &JiracachePaths,
    log_level: Option<&str>,
    enable_stderr_logging: bool,
) -> anyhow::Result<()> {
    let level = log_level
        .map(str::to_owned)
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_owned());

    let filter = EnvFilter::try_new(level).context("parse log level")?;

    let file_layer = match (paths.log_path.parent(), paths.log_path.file_name()) {
        (Some(dir), Some(name)) if fs::create_dir_all(dir).is_ok() => {
            tracing_appender::rolling::RollingFileAppender::builder()
                .rotation(tracing_appender::rolling::Rotation::NEVER)
                .filename_prefix(name.to_string_lossy())
                .build(dir)
                .ok()
                .map(|file_appender| {
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(file_appender)
                })
        }
        _ => None,
    };

    if enable_stderr_logging {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_writer(io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    Ok(())
}

async fn dispatch(command: Command, addr: &ServerAddr, config: ConfigFile) -> anyhow::Result<()> {
    match command {
        Command::Tui => tui::run(addr, config).await,
        Command::Query { text, json } => query(addr, &text, json).await,
        Command::Get { key, json } => get(addr, &key, json).await,
        Command::Watch { query } => watch(addr, query).await,
        Command::Version => version(),
        Command::Completion { command } => completion(command),
    }
}

async fn query(addr: &ServerAddr, text: &str, json: bool) -> anyhow::Result<()> {
    let client = Client::connect(addr).await?;
    let entries = client.query(text).await?;

    if json {
        let out = serde_json::to_string_pretty(&entries).context("serialize results")?;
        println!("{out}");
        return Ok(());
    }

    if entries.is_empty() {
        println!("No matching issues");
        return Ok(());
    }
    for entry in entries {
        match entry {
            ResultEntry::Full(issue) if !issue.is_partial() => {
                println!("{}\t{}", issue.key, issue.summary().unwrap_or(""));
            }
            other => println!("{}", other.key()),
        }
    }
    Ok(())
}

async fn get(addr: &ServerAddr, key: &str, json: bool) -> anyhow::Result<()> {
    let client = Client::connect(addr).await?;
    let Some(issue) = client.get(key).await? else {
        return Err(anyhow!("issue not found: {key}"));
    };

    if json {
        let out = serde_json::to_string_pretty(&issue).context("serialize issue")?;
        println!("{out}");
        return Ok(());
    }

    print_issue(&issue);
    Ok(())
}

fn print_issue(issue: &Issue) {
    println!("{}\t{}", issue.key, issue.summary().unwrap_or(""));
    println!("status:\t{}", issue.status().unwrap_or("-"));
    println!("assignee:\t{}", issue.assignee().unwrap_or("Unassigned"));
    if let Some(html) = issue.rendered_description() {
        let text = to_plain_text(html);
        if !text.is_empty() {
            println!();
            println!("{text}");
        }
    }
}

async fn watch(addr: &ServerAddr, query: Option<String>) -> anyhow::Result<()> {
    let mut client = Client::connect(addr).await?;
    if let Some(query) = query {
        let entries = client.query(&query).await?;
        tracing::info!(%query, results = entries.len(), "watching search");
    }

    loop {
        tokio::select! {
            push = client.next_push() => {
                let Some(push) = push else {
                    return Err(anyhow!("connection closed"));
                };
                print_push(&push);
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn print_push(push: &Push) {
    match push {
        Push::Update(issue) | Push::UpdateRaw(issue) => {
            println!("{}\t{}\t{}", push.tag(), issue.key, issue.summary().unwrap_or(""));
        }
        Push::UpdateSearch { query, entries } => {
            let keys: Vec<&str> = entries.iter().map(ResultEntry::key).collect();
            println!("{}\t{query}\t{}", push.tag(), keys.join(","));
        }
        Push::Unknown { tag } => println!("{tag}"),
    }
}

fn completion(command: CompletionCommand) -> anyhow::Result<()> {
    let shell = match command {
        CompletionCommand::Bash => Shell::Bash,
        CompletionCommand::Fish => Shell::Fish,
        CompletionCommand::Powershell => Shell::PowerShell,
        CompletionCommand::Zsh => Shell::Zsh,
    };

    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(shell, &mut cmd, "jc", &mut buf);
    match io::stdout().write_all(&buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err).context("write completion script to stdout"),
    }
}

fn version() -> anyhow::Result<()> {
    println!("{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
