use crate::annotate::lexicon::Lexicon;

const HIGH_URGENCY_WEIGHT: i64 = 15;
const LOW_URGENCY_WEIGHT: i64 = -10;
const NOT_FROM_SELF_WEIGHT: i64 = 10;
const QUESTION_WEIGHT: i64 = 5;

/// Weighted-rule priority score. Rules are additive, not mutually exclusive,
/// and the result is unbounded (negative scores are fine). Ordering by this
/// score descending is the sole ranking signal for message lists.
///
/// The "not from self" rule only inspects the sender text, not To/Cc.
/// Known approximation; kept to match the established scoring behavior.
pub fn score(
    subject: Option<&str>,
    body: Option<&str>,
    sender: Option<&str>,
    owner_email: &str,
    lexicon: &Lexicon,
) -> i64 {
    let text = format!(
        "{} {}",
        subject.unwrap_or_default(),
        body.unwrap_or_default()
    )
    .to_lowercase();

    let mut total = 0i64;

    if lexicon
        .high_urgency
        .iter()
        .any(|kw| text.contains(&kw.to_lowercase()))
    {
        total += HIGH_URGENCY_WEIGHT;
    }

    if lexicon
        .low_urgency
        .iter()
        .any(|kw| text.contains(&kw.to_lowercase()))
    {
        total += LOW_URGENCY_WEIGHT;
    }

    let owner = owner_email.to_lowercase();
    let from_self = sender
        .map(|s| s.to_lowercase().contains(&owner))
        .unwrap_or(false);
    if !from_self {
        total += NOT_FROM_SELF_WEIGHT;
    }

    if body.map(|b| b.contains('?')).unwrap_or(false) {
        total += QUESTION_WEIGHT;
    }

    total
}
