use anyhow::{anyhow, Result};
use log::{debug, error, info};

use crate::annotate::{action, categorizer, lexicon::Lexicon, priority, summarizer};
use crate::domain::message::{MessageRowId, DEFAULT_CATEGORY};
use crate::store::repo::MailStore;

/// What happened to one batch of pending messages. One bad message never
/// fails the batch; it is counted and the rest proceed.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ProcessOutcome {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Runs the four annotation steps for one message against a single snapshot
/// read at the start, staging every write in one transaction:
///
/// - summary: computed only when unset
/// - category: computed only while still at the default
/// - priority: recomputed every run
/// - action: recomputed every run from the (possibly just-updated) category,
///   staged only when the recommender returns something
///
/// Either all staged fields commit together or none do.
pub fn process_message(
    store: &mut dyn MailStore,
    id: MessageRowId,
    owner_email: &str,
    lexicon: &Lexicon,
) -> Result<bool> {
    let msg = store
        .get_message(id)?
        .ok_or_else(|| anyhow!("message {} not found", id))?;

    let body = match msg.body.as_deref() {
        Some(b) if !b.is_empty() => b.to_string(),
        _ => {
            debug!("message {} has no body, nothing to annotate", id);
            return Ok(false);
        }
    };
    let full_text = msg.full_text();

    let mut run = store.begin_annotation()?;

    if msg.summary.is_none() {
        let summary = summarizer::summarize(&body);
        run.stage_summary(id, &summary)?;
    }

    let category = if msg.category == DEFAULT_CATEGORY {
        let cat = categorizer::categorize(&full_text, lexicon);
        if cat != DEFAULT_CATEGORY {
            run.stage_category(id, &cat)?;
        }
        cat
    } else {
        msg.category.clone()
    };

    let score = priority::score(
        msg.subject.as_deref(),
        msg.body.as_deref(),
        msg.sender.as_deref(),
        owner_email,
        lexicon,
    );
    run.stage_priority(id, score)?;

    if let Some(act) = action::recommend(&full_text, &category, lexicon) {
        run.stage_action(id, &act)?;
    }

    run.commit()?;
    Ok(true)
}

/// Serial batch driver over one store session. Each message gets its own
/// transaction; a failure rolls back that message alone and is logged.
pub fn process_batch(
    store: &mut dyn MailStore,
    ids: &[MessageRowId],
    owner_email: &str,
    lexicon: &Lexicon,
) -> ProcessOutcome {
    let mut outcome = ProcessOutcome::default();
    for &id in ids {
        match process_message(store, id, owner_email, lexicon) {
            Ok(true) => outcome.processed += 1,
            Ok(false) => outcome.skipped += 1,
            Err(e) => {
                error!("failed to process message {}: {:#}", id, e);
                outcome.failed += 1;
            }
        }
    }
    info!(
        "batch done: {} processed, {} skipped, {} failed",
        outcome.processed, outcome.skipped, outcome.failed
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::MessageDraft;
    use crate::store::sqlite::SqliteRepo;

    const OWNER: &str = "me@example.com";

    fn seed(repo: &mut SqliteRepo, message_id: &str, body: &str) -> MessageRowId {
        let user = repo.get_or_create_user(OWNER, None).unwrap();
        repo.create_message(
            user.id,
            &MessageDraft {
                message_id: message_id.to_string(),
                subject: Some("subject".to_string()),
                sender: Some("Alice <alice@example.com>".to_string()),
                body: Some(body.to_string()),
                received_at_epoch: Some(1_700_000_000),
            },
            0,
        )
        .unwrap();
        let user = repo.get_user_by_email(OWNER).unwrap().unwrap();
        *repo.get_unannotated(user.id).unwrap().last().unwrap()
    }

    #[test]
    fn second_run_keeps_summary_but_rescores_priority() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let id = seed(&mut repo, "m1", "This is urgent, can you take a look?");
        let lex = Lexicon::default();

        assert!(process_message(&mut repo, id, OWNER, &lex).unwrap());
        let first = repo.get_message(id).unwrap().unwrap();
        let summary = first.summary.clone();
        assert!(summary.is_some());
        assert_eq!(first.priority_score, 30);

        // wipe the score so the recompute is observable
        {
            let mut run = repo.begin_annotation().unwrap();
            run.stage_priority(id, 0).unwrap();
            run.commit().unwrap();
        }

        assert!(process_message(&mut repo, id, OWNER, &lex).unwrap());
        let second = repo.get_message(id).unwrap().unwrap();
        assert_eq!(second.summary, summary);
        assert_eq!(second.priority_score, 30);
    }

    #[test]
    fn category_is_not_recomputed_once_set() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let id = seed(&mut repo, "m1", "please unsubscribe me from this discount list");
        let lex = Lexicon::default();

        process_message(&mut repo, id, OWNER, &lex).unwrap();
        assert_eq!(repo.get_message(id).unwrap().unwrap().category, "Promotions");

        // pin a different category, as a user edit would
        {
            let mut run = repo.begin_annotation().unwrap();
            run.stage_category(id, "Work").unwrap();
            run.commit().unwrap();
        }

        process_message(&mut repo, id, OWNER, &lex).unwrap();
        assert_eq!(repo.get_message(id).unwrap().unwrap().category, "Work");
    }

    #[test]
    fn promotions_get_no_action_needed() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let id = seed(&mut repo, "m1", "unsubscribe for a discount, can you meet?");
        let lex = Lexicon::default();

        process_message(&mut repo, id, OWNER, &lex).unwrap();
        let msg = repo.get_message(id).unwrap().unwrap();
        assert_eq!(msg.category, "Promotions");
        assert_eq!(msg.suggested_action.as_deref(), Some("No Action Needed"));
    }

    #[test]
    fn bodyless_message_is_skipped_whole() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user(OWNER, None).unwrap();
        repo.create_message(
            user.id,
            &MessageDraft {
                message_id: "m1".to_string(),
                subject: Some("subject only".to_string()),
                sender: None,
                body: None,
                received_at_epoch: None,
            },
            0,
        )
        .unwrap();
        let id = repo.get_unannotated(user.id).unwrap()[0];
        let lex = Lexicon::default();

        assert!(!process_message(&mut repo, id, OWNER, &lex).unwrap());
        let msg = repo.get_message(id).unwrap().unwrap();
        assert!(msg.summary.is_none());
        assert_eq!(msg.priority_score, 0);
    }

    #[test]
    fn batch_counts_mixed_results() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let good = seed(&mut repo, "m1", "a perfectly ordinary note about nothing much");
        let user = repo.get_user_by_email(OWNER).unwrap().unwrap();
        repo.create_message(
            user.id,
            &MessageDraft {
                message_id: "m2".to_string(),
                subject: None,
                sender: None,
                body: None,
                received_at_epoch: None,
            },
            0,
        )
        .unwrap();
        let ids = repo.get_unannotated(user.id).unwrap();
        assert_eq!(ids.len(), 2);

        let lex = Lexicon::default();
        // include an id that doesn't exist to exercise the failure path
        let mut all = ids.clone();
        all.push(9999);
        let outcome = process_batch(&mut repo, &all, OWNER, &lex);
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.failed, 1);
        let _ = good;
    }
}
