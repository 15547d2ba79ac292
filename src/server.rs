use anyhow::{anyhow, Result};
use log::{error, info};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;

use crate::annotate::lexicon::Lexicon;
use crate::auth::token_manager::TokenManager;
use crate::config::Config;
use crate::dossier;
use crate::ingest;
use crate::mail::gmail::GmailClient;
use crate::store::repo::MailStore;
use crate::store::sqlite::SqliteRepo;
use crate::worker::AnnotationWorkers;

pub struct AppState {
    pub db_path: PathBuf,
    pub lexicon: Arc<Lexicon>,
    pub token_mgr: TokenManager,
    pub workers: Arc<AnnotationWorkers>,
    pub fetch_limit: u32,
}

impl AppState {
    pub fn from_config(cfg: &Config, db_path: PathBuf) -> Result<Self> {
        let lexicon = Arc::new(Lexicon::load(
            cfg.lexicon_path.as_deref().map(std::path::Path::new),
        )?);
        let workers = Arc::new(AnnotationWorkers::new(
            db_path.clone(),
            cfg.worker_threads.unwrap_or(4),
        ));
        Ok(Self {
            db_path,
            lexicon,
            token_mgr: TokenManager::from_config(cfg)?,
            workers,
            fetch_limit: cfg.fetch_limit.unwrap_or(20),
        })
    }

    fn open_store(&self) -> Result<SqliteRepo> {
        SqliteRepo::open(&self.db_path)
    }
}

/// Blocking accept loop; Ctrl-C flips the flag and the loop winds down.
pub fn run_server(state: AppState, listen_addr: &str) -> Result<()> {
    let server = Server::http(listen_addr)
        .map_err(|e| anyhow!("failed to bind {listen_addr}: {e:?}"))?;
    info!("listening on http://{}", listen_addr);

    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    let state = Arc::new(state);
    while running.load(Ordering::SeqCst) {
        let request = match server.recv_timeout(Duration::from_millis(500)) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(e) => {
                error!("accept error: {e}");
                continue;
            }
        };
        handle_request(&state, request);
    }

    info!("shutting down");
    Ok(())
}

fn handle_request(state: &Arc<AppState>, request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let reply = route(state, &method, &url);
    let (status, body) = match reply {
        Ok((status, body)) => (status, body),
        Err(e) => {
            error!("{} {} failed: {:#}", method, url, e);
            (500, json!({ "message": format!("{e:#}") }))
        }
    };

    let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("static header");
    let response = Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header);
    if let Err(e) = request.respond(response) {
        error!("failed to send response: {e}");
    }
}

fn route(
    state: &Arc<AppState>,
    method: &Method,
    raw_url: &str,
) -> Result<(u16, serde_json::Value)> {
    // tiny_http hands us path+query; borrow a dummy base to parse it
    let url = Url::parse("http://localhost")
        .expect("static base url")
        .join(raw_url)
        .map_err(|e| anyhow!("bad request url: {e}"))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match (method, segments.as_slice()) {
        (Method::Get, []) => Ok((200, json!({ "message": "mailmate api" }))),

        (Method::Get, ["health"]) => {
            let store = state.open_store()?;
            store.ping()?;
            Ok((200, json!({ "status": "ok" })))
        }

        (Method::Get, ["emails", user_email]) => {
            let category = query_param(&url, "category");
            list_emails(state, user_email, category.as_deref())
        }

        (Method::Get, ["emails", user_email, "dossier"]) => {
            let q = query_param(&url, "q")
                .ok_or_else(|| anyhow!("missing required query parameter 'q'"))?;
            sender_dossier(state, user_email, &q)
        }

        (Method::Post, ["emails", user_email, "fetch"]) => fetch_emails(state, user_email),

        (Method::Post, ["emails", user_email, "process"]) => process_emails(state, user_email),

        _ => Ok((404, json!({ "message": "not found" }))),
    }
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn list_emails(
    state: &Arc<AppState>,
    user_email: &str,
    category: Option<&str>,
) -> Result<(u16, serde_json::Value)> {
    let store = state.open_store()?;
    let user = match store.get_user_by_email(user_email)? {
        Some(u) => u,
        None => return Ok((404, json!({ "message": "user not found" }))),
    };
    let messages = store.list_messages(user.id, category)?;
    Ok((200, serde_json::to_value(messages)?))
}

fn sender_dossier(
    state: &Arc<AppState>,
    user_email: &str,
    q: &str,
) -> Result<(u16, serde_json::Value)> {
    let store = state.open_store()?;
    let user = match store.get_user_by_email(user_email)? {
        Some(u) => u,
        None => return Ok((404, json!({ "message": "user not found" }))),
    };
    let since = dossier::window_start_epoch(chrono::Utc::now());
    let messages = store.messages_from_sender(user.id, q, since)?;
    let dossier = dossier::build_dossier(&messages);
    Ok((200, serde_json::to_value(dossier)?))
}

fn fetch_emails(state: &Arc<AppState>, user_email: &str) -> Result<(u16, serde_json::Value)> {
    let mut store = state.open_store()?;
    let user = match store.get_user_by_email(user_email)? {
        Some(u) => u,
        None => return Ok((404, json!({ "message": "user not found, please login first" }))),
    };

    let access_token = match state.token_mgr.get_access_token(&mut store, user.id) {
        Ok(t) => t,
        Err(e) => return Ok((401, json!({ "message": format!("cannot fetch: {e:#}") }))),
    };

    let gmail = GmailClient::new()?;
    let outcome = ingest::ingest_user(
        &mut store,
        &gmail,
        &access_token,
        user.id,
        state.fetch_limit,
    )?;
    Ok((200, serde_json::to_value(outcome)?))
}

fn process_emails(state: &Arc<AppState>, user_email: &str) -> Result<(u16, serde_json::Value)> {
    let store = state.open_store()?;
    let user = match store.get_user_by_email(user_email)? {
        Some(u) => u,
        None => return Ok((404, json!({ "message": "user not found" }))),
    };

    let pending = store.get_unannotated(user.id)?.len();
    if pending == 0 {
        return Ok((200, json!({ "message": "no new emails to process", "pending": 0 })));
    }

    // annotation is CPU-bound: hand it to the pool off the request thread
    let workers = Arc::clone(&state.workers);
    let lexicon = Arc::clone(&state.lexicon);
    let user_id = user.id;
    let owner_email = user.email.clone();
    thread::spawn(move || {
        if let Err(e) = workers.run(user_id, &owner_email, &lexicon) {
            error!("background annotation for user {} failed: {:#}", user_id, e);
        }
    });

    Ok((
        202,
        json!({
            "message": format!("started processing {} emails in the background", pending),
            "pending": pending
        }),
    ))
}
