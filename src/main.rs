use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use content_relay::{Command, Relay, RelayConfig, Reply};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "content-relay", version, about = "Relay repository archives into a GitHub store")]
struct Cli {
    /// JSON config file; `RELAY_*` environment variables are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Fetch a repository snapshot and store it
    Upload {
        /// Repository URL or `owner/repo`
        url: String,
    },
    /// List the files in the store
    List,
    /// Delete the file at a listing index
    Delete {
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        match action {
            Action::Upload { url } => Command::Upload { source: url },
            Action::List => Command::List,
            Action::Delete { index } => Command::Delete { index },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("content_relay=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let relay = match load_config(cli.config.as_deref()).and_then(|config| Relay::from_config(&config)) {
        Ok(relay) => relay,
        Err(e) => {
            tracing::error!("startup failed: {e}");
            print_reply(&Reply::from_error(&e));
            return ExitCode::FAILURE;
        }
    };

    let reply = relay.handle(cli.command.into()).await;
    print_reply(&reply);

    if reply.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_config(path: Option<&std::path::Path>) -> content_relay::Result<RelayConfig> {
    match path {
        Some(path) => RelayConfig::load(path),
        None => RelayConfig::from_env(),
    }
}

fn print_reply(reply: &Reply) {
    match serde_json::to_string_pretty(reply) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("could not render reply: {e}"),
    }
}
