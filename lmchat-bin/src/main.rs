mod server;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lmchat_core::{
    config::Config,
    model::{ChatMessage, RelayRequest},
    relay::{ChatRelay, RelaySession},
    settings::{Settings, SettingsStore},
    stats::SessionStats,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Chat with a local LM Studio server", long_about = None)]
struct Cli {
    /// JSON or TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP relay for the chat UI
    Serve {
        /// Override `listen.addr`
        #[arg(long)]
        addr: Option<String>,
    },
    /// Send one message and stream the reply
    Chat {
        /// Model id; defaults to the model currently loaded on the server
        #[arg(long)]
        model: Option<String>,
        #[arg(short, long, help = "Message from the user")]
        message: String,
        #[arg(long, help = "Inference server address (defaults to the stored setting)")]
        server: Option<String>,
        #[arg(long, help = "Use the reasoning preset and show the reasoning stream")]
        think: bool,
    },
    /// List the models the server offers
    Models {
        #[arg(long)]
        server: Option<String>,
    },
    /// Manage the stored server address
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    SetServer { url: String },
    Reset,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    });

    let cfg = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    let settings = SettingsStore::new(&cfg.settings.path, cfg.server.resolved_default_url());
    let relay = ChatRelay::from_config(&cfg)?;

    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| cfg.listen.addr.clone());
            let state = server::AppState {
                relay,
                settings: Arc::new(settings),
            };
            server::serve(&addr, state).await?;
        }
        Commands::Chat {
            model,
            message,
            server,
            think,
        } => {
            let server_url = server.unwrap_or_else(|| settings.server_url());
            let model = match model {
                Some(m) => m,
                None => relay
                    .upstream(&server_url)
                    .active_model()
                    .await?
                    .map(|m| m.id)
                    .context("no model is loaded on the server; pass --model")?,
            };
            let session = relay
                .open(RelayRequest {
                    messages: vec![ChatMessage::user(message)],
                    selected_model: model,
                    server_url,
                    enable_thinking: think,
                })
                .await?;

            let stats = print_reply(session, &mut io::stdout(), &mut io::stderr()).await?;
            println!();
            eprintln!("{}", summarize(&stats));
        }
        Commands::Models { server } => {
            let server_url = server.unwrap_or_else(|| settings.server_url());
            let list = relay.upstream(&server_url).list_models().await?;
            if list.data.is_empty() {
                eprintln!("no models available at {server_url}");
            }
            for (i, m) in list.data.iter().enumerate() {
                let marker = if i == 0 { "*" } else { " " };
                println!("{marker} {}", m.id);
            }
        }
        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                println!("{}", settings.server_url());
                eprintln!("(stored at {})", settings.path().display());
            }
            SettingsAction::SetServer { url } => {
                settings.save(&Settings { server_url: url })?;
                println!("{}", settings.server_url());
            }
            SettingsAction::Reset => {
                settings.reset()?;
                println!("{}", settings.server_url());
            }
        },
    }

    Ok(())
}

/// Write answer text to `out` and reasoning to `thinking` until the session
/// completes, then wait for the decode task and return its stats.
async fn print_reply(
    mut session: RelaySession,
    out: &mut impl Write,
    thinking: &mut impl Write,
) -> anyhow::Result<SessionStats> {
    while let Some(ev) = session.events.recv().await {
        if ev.completed {
            break;
        }
        let w: &mut dyn Write = if ev.is_thinking {
            &mut *thinking
        } else {
            &mut *out
        };
        write!(w, "{}", ev.content)?;
        w.flush().ok();
    }
    drop(session.events);
    let stats = session.handle.await.context("decode task failed")?;
    Ok(stats)
}

fn summarize(stats: &SessionStats) -> String {
    let mut parts = vec![format!(
        "{} tokens ({} reasoning, {} answer)",
        stats.total_token_count, stats.reasoning_token_count, stats.answer_token_count
    )];
    if let Some(ms) = stats.time_to_first_token_ms() {
        parts.push(format!("first token {ms} ms"));
    }
    if let Some(ms) = stats.reasoning_duration_ms() {
        parts.push(format!("reasoning {ms} ms"));
    }
    if let Some(tps) = stats.answer_tokens_per_second() {
        parts.push(format!("{tps:.1} tok/s"));
    }
    if let Some(ms) = stats.total_duration_ms() {
        parts.push(format!("total {ms} ms"));
    }
    if let Some(reason) = &stats.terminal_reason {
        parts.push(format!("stop: {reason}"));
    }
    format!("[{}]", parts.join(" | "))
}
