use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use napoleon_inbox::aggregate::LiveAggregator;
use napoleon_inbox::auth::oauth::Provider;
use napoleon_inbox::auth::{token_manager::TokenManager, token_store};
use napoleon_inbox::config::{Config, load_config};
use napoleon_inbox::ranking::{SystemClock, score};
use napoleon_inbox::terminal::run_dashboard;

#[derive(Parser)]
#[command(name = "napoleon")]
#[command(about = "Gmail + Slack inbox ranked by priority", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ranked-inbox dashboard (TUI)
    Dashboard,

    /// Fetch once and print the ranked list
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run the OAuth flow for a provider and store its tokens
    Login {
        /// google or slack
        provider: Provider,
    },

    /// Store an OAuth client secret in the keyring
    SetClientSecret {
        #[arg(long)]
        provider: Provider,

        #[arg(long)]
        client_id: String,
    },
}

fn config() -> Result<Config> {
    load_config().map_err(|e| anyhow!("Configuration error: {e}"))
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetClientSecret {
            provider,
            client_id,
        } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            token_store::save_client_secret(provider, &client_id, secret.trim())?;
            println!("Saved {provider} client secret for client_id {client_id}");
            Ok(())
        }

        Command::Login { provider } => {
            let cfg = config()?;
            let mgr = match provider {
                Provider::Google => TokenManager::google(&cfg.google)?,
                Provider::Slack => {
                    let slack = cfg
                        .slack
                        .as_ref()
                        .ok_or_else(|| anyhow!("no [slack] section in config"))?;
                    TokenManager::slack(slack)?
                }
            };
            mgr.login(&cfg.user_id)?;
            println!("Connected {provider} for {}", cfg.user_id);
            Ok(())
        }

        Command::List { json, limit } => {
            let cfg = config()?;
            let aggregator = LiveAggregator::from_config(&cfg, Arc::new(SystemClock));
            let gathered = aggregator.live_report(&cfg.user_id);

            let limit = limit.unwrap_or(gathered.messages.len());
            let shown = &gathered.messages[..limit.min(gathered.messages.len())];

            if json {
                println!("{}", serde_json::to_string_pretty(shown)?);
                return Ok(());
            }

            for r in &gathered.reports {
                eprintln!("{r}");
            }
            for m in shown {
                let title = m.subject.as_deref().unwrap_or(&m.text);
                println!(
                    "{:>7.2}  {:<5}  {:<24}  {}",
                    score(m, gathered.ranked_at_millis),
                    m.source,
                    truncate(&m.from, 24),
                    truncate(title, 80)
                );
            }
            Ok(())
        }

        Command::Dashboard => {
            let cfg = config()?;
            let aggregator = LiveAggregator::from_config(&cfg, Arc::new(SystemClock));
            run_dashboard(&aggregator, &cfg.user_id)
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
