use crate::annotate::lexicon::Lexicon;
use crate::domain::message::DEFAULT_CATEGORY;

/// Keyword-occurrence categorizer. For each category, counts how many of its
/// keyword phrases occur as case-insensitive substrings; the highest total
/// wins, ties go to the first-declared category. A zero score everywhere
/// yields the default category.
///
/// This deployment uses the keyword strategy only; its documented no-match
/// behavior is returning "Uncategorized".
pub fn categorize(text: &str, lexicon: &Lexicon) -> String {
    let haystack = text.to_lowercase();

    let mut best: Option<(&str, usize)> = None;
    for cat in &lexicon.categories {
        let score = cat
            .keywords
            .iter()
            .filter(|kw| haystack.contains(&kw.to_lowercase()))
            .count();
        if score == 0 {
            continue;
        }
        match best {
            // strictly greater keeps declaration-order tie-breaking
            Some((_, s)) if score <= s => {}
            _ => best = Some((cat.label.as_str(), score)),
        }
    }

    match best {
        Some((label, _)) => label.to_string(),
        None => DEFAULT_CATEGORY.to_string(),
    }
}
