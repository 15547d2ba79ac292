use anyhow::Result;
use log::{error, info, warn};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::annotate::lexicon::Lexicon;
use crate::annotate::orchestrator::{process_message, ProcessOutcome};
use crate::domain::message::{MessageRowId, UserId};
use crate::store::repo::MailStore;
use crate::store::sqlite::SqliteRepo;

/// Bounded annotation worker pool. Annotator calls are CPU-bound, so they
/// run on these threads instead of whatever thread serves requests. Every
/// worker opens its own store connection; queuing work and executing it are
/// decoupled in both time and failure domain.
///
/// The `inflight` set is an advisory per-message lock shared across batches:
/// a message already being annotated by another run is skipped rather than
/// written to concurrently.
pub struct AnnotationWorkers {
    db_path: PathBuf,
    threads: usize,
    inflight: Arc<Mutex<HashSet<MessageRowId>>>,
}

impl AnnotationWorkers {
    pub fn new(db_path: PathBuf, threads: usize) -> Self {
        Self {
            db_path,
            threads: threads.max(1),
            inflight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Annotates everything still pending for the user. Blocks until the
    /// batch drains; per-message failures are counted, never escalated.
    pub fn run(&self, user_id: UserId, owner_email: &str, lexicon: &Lexicon) -> Result<ProcessOutcome> {
        let ids = {
            let repo = SqliteRepo::open(&self.db_path)?;
            repo.get_unannotated(user_id)?
        };
        if ids.is_empty() {
            return Ok(ProcessOutcome::default());
        }

        info!(
            "annotating {} pending messages for user {} on {} worker(s)",
            ids.len(),
            user_id,
            self.threads.min(ids.len())
        );

        let queue = Arc::new(Mutex::new(ids.into_iter().collect::<VecDeque<_>>()));
        let workers = self.threads.min(queue.lock().unwrap().len());

        let outcome = thread::scope(|s| {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                let queue = Arc::clone(&queue);
                let inflight = Arc::clone(&self.inflight);
                let db_path = self.db_path.clone();
                handles.push(s.spawn(move || {
                    drain_queue(&db_path, queue, inflight, user_id, owner_email, lexicon)
                }));
            }

            let mut total = ProcessOutcome::default();
            for h in handles {
                match h.join() {
                    Ok(part) => {
                        total.processed += part.processed;
                        total.skipped += part.skipped;
                        total.failed += part.failed;
                    }
                    Err(_) => error!("annotation worker panicked"),
                }
            }
            total
        });

        Ok(outcome)
    }
}

fn drain_queue(
    db_path: &std::path::Path,
    queue: Arc<Mutex<VecDeque<MessageRowId>>>,
    inflight: Arc<Mutex<HashSet<MessageRowId>>>,
    user_id: UserId,
    owner_email: &str,
    lexicon: &Lexicon,
) -> ProcessOutcome {
    let mut outcome = ProcessOutcome::default();

    let mut repo = match SqliteRepo::open(db_path) {
        Ok(r) => r,
        Err(e) => {
            error!("worker could not open store: {:#}", e);
            return outcome;
        }
    };

    loop {
        let id = queue.lock().unwrap().pop_front();
        let Some(id) = id else { break };

        {
            let mut guard = inflight.lock().unwrap();
            if !guard.insert(id) {
                warn!("message {} already being annotated elsewhere, skipping", id);
                outcome.skipped += 1;
                continue;
            }
        }

        let result = process_message(&mut repo, id, owner_email, lexicon);
        inflight.lock().unwrap().remove(&id);

        match result {
            Ok(true) => outcome.processed += 1,
            Ok(false) => outcome.skipped += 1,
            Err(e) => {
                error!("failed to process message {} for user {}: {:#}", id, user_id, e);
                outcome.failed += 1;
            }
        }
    }

    outcome
}
