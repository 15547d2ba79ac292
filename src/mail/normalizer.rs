use base64::{engine::general_purpose, Engine as _};
use chrono::DateTime;
use mailparse::MailHeaderMap;

use crate::domain::message::MessageDraft;
use crate::mail::gmail::RawMessage;

/// Converts one raw provider payload into a canonical message draft.
/// Returns None when the payload is malformed; the caller skips that
/// message and keeps going.
pub fn normalize(raw: &RawMessage) -> Option<MessageDraft> {
    let encoded = raw.raw.as_deref()?;
    let bytes = decode_transport(encoded)?;
    let parsed = mailparse::parse_mail(&bytes).ok()?;

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let sender = parsed
        .headers
        .get_first_value("From")
        .map(|s| display_name(&s))
        .filter(|s| !s.is_empty());

    let received_at_epoch = parsed
        .headers
        .get_first_value("Date")
        .and_then(|d| parse_header_date(&d))
        .or_else(|| internal_date_epoch(raw));

    let body = extract_text_part(&parsed)
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());

    Some(MessageDraft {
        message_id: raw.id.clone(),
        subject,
        sender,
        body,
        received_at_epoch,
    })
}

/// Gmail hands the payload back base64url-encoded, with or without padding
/// depending on the client path. Try the url-safe alphabets first, then the
/// standard one as a last resort.
fn decode_transport(encoded: &str) -> Option<Vec<u8>> {
    general_purpose::URL_SAFE
        .decode(encoded)
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(encoded))
        .or_else(|_| general_purpose::STANDARD.decode(encoded))
        .ok()
}

/// Display-name portion of a From header ("Alice <a@b>" -> "Alice"),
/// falling back to the whole header for bare addresses.
fn display_name(from: &str) -> String {
    let name = match from.split_once('<') {
        Some((name, _)) => name.trim(),
        None => from.trim(),
    };
    if name.is_empty() {
        from.trim().trim_matches(['<', '>']).to_string()
    } else {
        name.trim_matches('"').trim().to_string()
    }
}

/// Ordered date resolution: lenient RFC-2822 parse first, then a strict
/// chrono parse after dropping a trailing "(ZONE)" comment.
fn parse_header_date(date: &str) -> Option<i64> {
    if let Ok(epoch) = mailparse::dateparse(date) {
        return Some(epoch);
    }
    let stripped = match date.rfind('(') {
        Some(i) => date[..i].trim_end(),
        None => date.trim(),
    };
    DateTime::parse_from_rfc2822(stripped)
        .ok()
        .map(|dt| dt.timestamp())
}

fn internal_date_epoch(raw: &RawMessage) -> Option<i64> {
    let ms: i64 = raw.internal_date.as_deref()?.parse().ok()?;
    Some(ms / 1000)
}

/// First plain-text body part, depth-first, skipping attachments; falls back
/// to a minimally tag-stripped HTML part when no plain part exists.
fn extract_text_part(p: &mailparse::ParsedMail) -> Option<String> {
    let mime = p.ctype.mimetype.to_ascii_lowercase();

    if mime == "text/plain" && !is_attachment(p) {
        return p.get_body().ok();
    }

    for sp in &p.subparts {
        if let Some(t) = extract_text_part(sp) {
            return Some(t);
        }
    }

    if mime == "text/html" && !is_attachment(p) {
        if let Ok(html) = p.get_body() {
            return Some(strip_html_minimal(&html));
        }
    }

    // non-multipart message with an odd content type: best effort
    if p.subparts.is_empty() && !mime.starts_with("multipart/") && !is_attachment(p) {
        return p.get_body().ok();
    }

    None
}

fn is_attachment(p: &mailparse::ParsedMail) -> bool {
    p.headers
        .get_first_value("Content-Disposition")
        .map(|d| d.to_ascii_lowercase().contains("attachment"))
        .unwrap_or(false)
}

fn strip_html_minimal(html: &str) -> String {
    // Simple best-effort: remove tags.
    let mut out = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}
