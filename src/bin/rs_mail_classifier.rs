use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::time::Duration;

use rs_mail_classifier::auth::client_secrets::resolve_client;
use rs_mail_classifier::auth::oauth::GoogleAuthorizer;
use rs_mail_classifier::auth::{TokenManager, token_store};
use rs_mail_classifier::classifier::EmailClassifier;
use rs_mail_classifier::classifier::backend::create_backend;
use rs_mail_classifier::classifier::prompt::PromptOptions;
use rs_mail_classifier::config::{load_config, resolve_token_path};
use rs_mail_classifier::mail::GmailClient;
use rs_mail_classifier::pipeline::{self, RunOptions};

#[derive(Parser)]
#[command(name = "rs_mail_classifier")]
#[command(about = "Classify Gmail messages as important or unimportant with an LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate, classify old messages and print one JSON record per message (default)
    Run,

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.cmd.unwrap_or(Command::Run) {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            if secret.is_empty() {
                return Err(anyhow!("empty client secret, nothing stored"));
            }
            token_store::save_client_secret(&client_id, secret)?;
            eprintln!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::Run => run(),
    }
}

fn run() -> Result<()> {
    let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;

    let client = resolve_client(&cfg)?;
    let token_path = resolve_token_path(&cfg)?;
    let token_mgr = TokenManager::new(
        GoogleAuthorizer::new(client, cfg.redirect_uri()),
        token_path,
    );
    let session = token_mgr.authenticate().context("Authentication failed")?;

    let timeout = Duration::from_secs(cfg.llm.timeout_secs);
    let mailbox = GmailClient::new(session, cfg.gmail_api_base(), timeout)?
        .with_max_results(cfg.max_results);

    let classifier = EmailClassifier::new(
        create_backend(&cfg.llm)?,
        PromptOptions {
            few_shot: cfg.few_shot,
            max_body_chars: cfg.max_body_chars,
        },
    );

    let today = chrono::Local::now().date_naive();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    pipeline::run(
        &mailbox,
        &classifier,
        &RunOptions::from_config(&cfg),
        today,
        &mut out,
    )?;
    Ok(())
}
