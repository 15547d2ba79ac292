use anyhow::Result;
use log::{info, warn};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::message::UserId;
use crate::mail::gmail::GmailClient;
use crate::mail::normalizer;
use crate::store::repo::MailStore;

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct IngestOutcome {
    /// Messages newly stored this run.
    pub stored: usize,
    /// Already-known provider ids, skipped without overwrite.
    pub duplicates: usize,
    /// Payloads the normalizer refused.
    pub rejected: usize,
    /// Per-message fetch errors (the listing itself failing is a hard error).
    pub fetch_errors: usize,
}

/// Pulls the user's recent messages from the provider and stores the ones we
/// don't have yet. One bad message never fails the batch.
pub fn ingest_user(
    store: &mut dyn MailStore,
    gmail: &GmailClient,
    access_token: &str,
    user_id: UserId,
    limit: u32,
) -> Result<IngestOutcome> {
    let ids = gmail.list_recent_message_ids(access_token, limit)?;
    let now_epoch = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

    let mut outcome = IngestOutcome::default();
    for id in &ids {
        let raw = match gmail.get_raw_message(access_token, id) {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping message {}: {:#}", id, e);
                outcome.fetch_errors += 1;
                continue;
            }
        };

        let draft = match normalizer::normalize(&raw) {
            Some(d) => d,
            None => {
                warn!("rejecting malformed payload for message {}", id);
                outcome.rejected += 1;
                continue;
            }
        };

        if store.create_message(user_id, &draft, now_epoch)? {
            outcome.stored += 1;
        } else {
            outcome.duplicates += 1;
        }
    }

    info!(
        "ingest for user {}: {} stored, {} duplicates, {} rejected, {} fetch errors",
        user_id, outcome.stored, outcome.duplicates, outcome.rejected, outcome.fetch_errors
    );
    Ok(outcome)
}
