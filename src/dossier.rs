use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::domain::message::{Dossier, DossierEntry, Message};

/// Messages older than this do not count toward a sender dossier.
pub const DOSSIER_WINDOW_DAYS: i64 = 180;

/// Start of the trailing dossier window, as an epoch bound for the store query.
pub fn window_start_epoch(now: DateTime<Utc>) -> i64 {
    (now - Duration::days(DOSSIER_WINDOW_DAYS)).timestamp()
}

/// Reduces an already-selected message set (one sender, trailing window,
/// newest first) into its dossier. An empty selection yields a zero-valued
/// dossier; the caller decides whether that means "not found".
pub fn build_dossier(messages: &[Message]) -> Dossier {
    if messages.is_empty() {
        return Dossier::default();
    }

    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut action_counts: Vec<(String, usize)> = Vec::new();
    let mut score_sum: i64 = 0;

    for msg in messages {
        *category_counts.entry(msg.category.clone()).or_insert(0) += 1;
        score_sum += msg.priority_score;

        if let Some(act) = &msg.suggested_action {
            match action_counts.iter_mut().find(|(a, _)| a == act) {
                Some((_, n)) => *n += 1,
                None => action_counts.push((act.clone(), 1)),
            }
        }
    }

    // ties break toward the first-encountered action, so only a strictly
    // higher count may displace the current best
    let mut most_common_action: Option<(&str, usize)> = None;
    for (act, n) in &action_counts {
        match most_common_action {
            Some((_, best)) if *n <= best => {}
            _ => most_common_action = Some((act, *n)),
        }
    }
    let most_common_action = most_common_action.map(|(a, _)| a.to_string());

    let average = score_sum as f64 / messages.len() as f64;
    let average_priority_score = (average * 100.0).round() / 100.0;

    let entries: Vec<DossierEntry> = messages
        .iter()
        .map(|m| DossierEntry {
            subject: m.subject.clone(),
            summary: m.summary.clone(),
            received_at_epoch: m.received_at_epoch,
            suggested_action: m.suggested_action.clone(),
        })
        .collect();

    let newest = messages.first();
    let oldest = messages.last();
    let date_range = match (
        oldest.and_then(|m| m.received_at_epoch),
        newest.and_then(|m| m.received_at_epoch),
    ) {
        (Some(a), Some(b)) => Some(format!("{} to {}", format_date(a), format_date(b))),
        _ => None,
    };

    Dossier {
        total_emails: messages.len(),
        category_counts,
        average_priority_score,
        latest_email_summary: newest.and_then(|m| m.summary.clone()),
        most_common_action,
        entries,
        date_range,
    }
}

fn format_date(epoch: i64) -> String {
    match DateTime::<Utc>::from_timestamp(epoch, 0) {
        Some(dt) => dt.format("%b %d, %Y").to_string(),
        None => epoch.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(
        id: i64,
        epoch: i64,
        category: &str,
        score: i64,
        summary: Option<&str>,
        action: Option<&str>,
    ) -> Message {
        Message {
            id,
            owner_id: 1,
            message_id: format!("m{}", id),
            subject: Some(format!("subject {}", id)),
            sender: Some("Vendor <billing@vendor.com>".to_string()),
            body: None,
            summary: summary.map(|s| s.to_string()),
            category: category.to_string(),
            priority_score: score,
            suggested_action: action.map(|s| s.to_string()),
            received_at_epoch: Some(epoch),
        }
    }

    #[test]
    fn empty_selection_yields_zero_dossier() {
        let d = build_dossier(&[]);
        assert_eq!(d.total_emails, 0);
        assert!(d.category_counts.is_empty());
        assert_eq!(d.average_priority_score, 0.0);
        assert!(d.latest_email_summary.is_none());
        assert!(d.most_common_action.is_none());
        assert!(d.entries.is_empty());
        assert!(d.date_range.is_none());
    }

    #[test]
    fn aggregates_counts_mean_and_latest() {
        // newest first, as the store returns them
        let msgs = vec![
            msg(3, 3000, "Finance", 20, Some("newest invoice"), Some("Reply Needed")),
            msg(2, 2000, "Finance", 15, Some("older invoice"), Some("Reply Needed")),
            msg(1, 1000, "Updates", 10, None, Some("No Action Needed")),
        ];
        let d = build_dossier(&msgs);

        assert_eq!(d.total_emails, 3);
        assert_eq!(d.category_counts["Finance"], 2);
        assert_eq!(d.category_counts["Updates"], 1);
        assert_eq!(d.average_priority_score, 15.0);
        assert_eq!(d.latest_email_summary.as_deref(), Some("newest invoice"));
        assert_eq!(d.most_common_action.as_deref(), Some("Reply Needed"));
        assert_eq!(d.entries.len(), 3);
        assert_eq!(d.entries[0].summary.as_deref(), Some("newest invoice"));
    }

    #[test]
    fn mean_rounds_to_two_decimals() {
        let msgs = vec![
            msg(1, 1000, "Work", 10, None, None),
            msg(2, 2000, "Work", 5, None, None),
            msg(3, 3000, "Work", 5, None, None),
        ];
        let d = build_dossier(&msgs);
        assert_eq!(d.average_priority_score, 6.67);
    }

    #[test]
    fn action_tie_breaks_to_first_encountered() {
        let msgs = vec![
            msg(2, 2000, "Work", 0, None, Some("Reply Needed")),
            msg(1, 1000, "Work", 0, None, Some("FYI")),
        ];
        let d = build_dossier(&msgs);
        assert_eq!(d.most_common_action.as_deref(), Some("Reply Needed"));
    }

    #[test]
    fn date_range_spans_oldest_to_newest() {
        // 2023-11-14 and 2023-11-15 UTC
        let msgs = vec![
            msg(2, 1_700_050_000, "Work", 0, None, None),
            msg(1, 1_699_950_000, "Work", 0, None, None),
        ];
        let d = build_dossier(&msgs);
        assert_eq!(d.date_range.as_deref(), Some("Nov 14, 2023 to Nov 15, 2023"));
    }
}
