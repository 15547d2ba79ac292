use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use mailmate::annotate::lexicon::Lexicon;
use mailmate::auth::{token_manager::TokenManager, token_store};
use mailmate::config::{load_config, resolve_db_path};
use mailmate::ingest;
use mailmate::mail::gmail::GmailClient;
use mailmate::server::{run_server, AppState};
use mailmate::store::repo::MailStore;
use mailmate::store::sqlite::SqliteRepo;
use mailmate::worker::AnnotationWorkers;

#[derive(Parser)]
#[command(name = "mailmate")]
#[command(about = "Personal email assistant (annotation pipeline + query API)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate a user via the browser and store their tokens
    Login,

    /// Ingest recent messages for a user
    Fetch {
        #[arg(long)]
        user: String,
    },

    /// Annotate a user's pending messages
    Process {
        #[arg(long)]
        user: String,
    },

    /// Serve the query API
    Serve,

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {}", client_id);
            Ok(())
        }

        Command::Login => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let db_path = resolve_db_path(&cfg)?;
            let mut repo = SqliteRepo::open(&db_path)?;

            let token_mgr = TokenManager::from_config(&cfg)?;
            let tokens = token_mgr.login()?;

            // the token tells us whose inbox this is
            let gmail = GmailClient::new()?;
            let profile = gmail.fetch_user_profile(&tokens.access_token)?;
            let user = repo.get_or_create_user(&profile.email, profile.name.as_deref())?;
            token_mgr.persist(&mut repo, user.id, &tokens)?;

            println!("Successfully authenticated as {}", user.email);
            Ok(())
        }

        Command::Fetch { user } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let db_path = resolve_db_path(&cfg)?;
            let mut repo = SqliteRepo::open(&db_path)?;

            let u = repo
                .get_user_by_email(&user)?
                .ok_or_else(|| anyhow!("user {user} not found, run `mailmate login` first"))?;

            let token_mgr = TokenManager::from_config(&cfg)?;
            let access = token_mgr.get_access_token(&mut repo, u.id)?;

            let gmail = GmailClient::new()?;
            let outcome = ingest::ingest_user(
                &mut repo,
                &gmail,
                &access,
                u.id,
                cfg.fetch_limit.unwrap_or(20),
            )?;
            println!(
                "Fetched {} new, {} duplicates, {} rejected",
                outcome.stored, outcome.duplicates, outcome.rejected
            );
            Ok(())
        }

        Command::Process { user } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let db_path = resolve_db_path(&cfg)?;
            let repo = SqliteRepo::open(&db_path)?;

            let u = repo
                .get_user_by_email(&user)?
                .ok_or_else(|| anyhow!("user {user} not found, run `mailmate login` first"))?;

            let lexicon = Arc::new(Lexicon::load(
                cfg.lexicon_path.as_deref().map(std::path::Path::new),
            )?);
            let workers = AnnotationWorkers::new(db_path, cfg.worker_threads.unwrap_or(4));
            let outcome = workers.run(u.id, &u.email, &lexicon)?;
            println!(
                "Processed {}, skipped {}, failed {}",
                outcome.processed, outcome.skipped, outcome.failed
            );
            Ok(())
        }

        Command::Serve => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let db_path = resolve_db_path(&cfg)?;
            // make sure the schema exists before the first request
            SqliteRepo::open(&db_path)?;

            let listen = cfg
                .listen_addr
                .clone()
                .unwrap_or_else(|| "127.0.0.1:8000".to_string());
            let state = AppState::from_config(&cfg, db_path)?;
            run_server(state, &listen)
        }
    }
}
