use crate::annotate::lexicon::Lexicon;

pub const NO_ACTION: &str = "No Action Needed";
pub const REPLY_NEEDED: &str = "Reply Needed";

/// Suggests a follow-up action for a message, or None when the field should
/// be left untouched. The category decides first: bulk-ish categories never
/// need an action, regardless of body content. Otherwise action keyword sets
/// are checked in their declared order and the first match wins.
pub fn recommend(text: &str, category: &str, lexicon: &Lexicon) -> Option<String> {
    if lexicon
        .no_action_categories
        .iter()
        .any(|c| c == category)
    {
        return Some(NO_ACTION.to_string());
    }

    let haystack = text.to_lowercase();
    for action in &lexicon.actions {
        if action
            .keywords
            .iter()
            .any(|kw| haystack.contains(&kw.to_lowercase()))
        {
            return Some(action.label.clone());
        }
    }

    if lexicon
        .reply_default_categories
        .iter()
        .any(|c| c == category)
    {
        return Some(REPLY_NEEDED.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotions_short_circuit_ignores_body() {
        let lex = Lexicon::default();
        // despite an obvious scheduling phrase, category wins
        let got = recommend("let's meet tomorrow to schedule a call", "Promotions", &lex);
        assert_eq!(got.as_deref(), Some(NO_ACTION));
    }

    #[test]
    fn schedule_event_outranks_reply_needed() {
        let lex = Lexicon::default();
        let got = recommend("can you schedule a meeting?", "Work", &lex);
        assert_eq!(got.as_deref(), Some("Schedule Event"));
    }

    #[test]
    fn work_defaults_to_reply_needed() {
        let lex = Lexicon::default();
        let got = recommend("status report attached", "Work", &lex);
        assert_eq!(got.as_deref(), Some(REPLY_NEEDED));
    }

    #[test]
    fn uncategorized_with_no_match_returns_none() {
        let lex = Lexicon::default();
        let got = recommend("status report attached", "Uncategorized", &lex);
        assert_eq!(got, None);
    }

    #[test]
    fn fyi_matches_when_earlier_sets_do_not() {
        let lex = Lexicon::default();
        let got = recommend("heads up, the office moves next month", "Uncategorized", &lex);
        assert_eq!(got.as_deref(), Some("FYI"));
    }
}
