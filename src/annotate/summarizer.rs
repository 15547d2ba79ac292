/// Inputs shorter than this are already summaries; returned verbatim.
const SHORT_INPUT_CHARS: usize = 100;
/// Longer bodies are truncated to this many chars before summarization.
/// Documented lossy behavior.
const MAX_INPUT_CHARS: usize = 1024;
const MIN_SUMMARY_CHARS: usize = 30;
const MAX_SUMMARY_CHARS: usize = 150;

/// Returned when no usable summary can be produced. Callers treat this as
/// "no summary", not as an error to retry.
pub const SUMMARY_SENTINEL: &str = "Could not generate summary";

/// Extractive summarizer: keeps leading sentences of the (truncated) input
/// until the summary is long enough, capped at `MAX_SUMMARY_CHARS`.
pub fn summarize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() < SHORT_INPUT_CHARS {
        return trimmed.to_string();
    }

    let head: String = trimmed.chars().take(MAX_INPUT_CHARS).collect();
    let flat = flatten_whitespace(&head);

    let mut out = String::new();
    for sentence in split_sentences(&flat) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(sentence);
        if out.chars().count() >= MIN_SUMMARY_CHARS {
            break;
        }
    }

    if out.trim().is_empty() {
        return SUMMARY_SENTINEL.to_string();
    }

    if out.chars().count() > MAX_SUMMARY_CHARS {
        out = truncate_on_word(&out, MAX_SUMMARY_CHARS);
    }
    out
}

/// Collapse newlines and runs of whitespace into single spaces.
fn flatten_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_sentences(s: &str) -> impl Iterator<Item = &str> {
    s.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

fn truncate_on_word(s: &str, max_chars: usize) -> String {
    // leave room for the ellipsis
    let budget = max_chars.saturating_sub(1);
    let cut: String = s.chars().take(budget).collect();
    let kept = match cut.rfind(' ') {
        Some(i) if i > 0 => &cut[..i],
        _ => cut.as_str(),
    };
    format!("{}…", kept)
}
