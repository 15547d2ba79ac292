use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type MessageRowId = i64;

pub const DEFAULT_CATEGORY: &str = "Uncategorized";

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
}

/// Per-user OAuth material. Replaced as a unit on refresh (see store).
#[derive(Debug, Clone)]
pub struct UserToken {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_epoch: Option<i64>,
}

/// Normalizer output: everything we know about a message before annotation.
/// `received_at_epoch` of None means the caller substitutes ingestion time.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub message_id: String,
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub body: Option<String>,
    pub received_at_epoch: Option<i64>,
}

/// One stored email with its annotation fields.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: MessageRowId,
    pub owner_id: UserId,
    pub message_id: String,
    pub subject: Option<String>,
    pub sender: Option<String>,
    #[serde(skip_serializing)]
    pub body: Option<String>,
    pub summary: Option<String>,
    pub category: String,
    pub priority_score: i64,
    pub suggested_action: Option<String>,
    pub received_at_epoch: Option<i64>,
}

impl Message {
    /// Subject and body joined, the text most annotators look at.
    pub fn full_text(&self) -> String {
        match (&self.subject, &self.body) {
            (Some(s), Some(b)) => format!("{} {}", s, b),
            (Some(s), None) => s.clone(),
            (None, Some(b)) => b.clone(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DossierEntry {
    pub subject: Option<String>,
    pub summary: Option<String>,
    pub received_at_epoch: Option<i64>,
    pub suggested_action: Option<String>,
}

/// Aggregate view of one sender's history. Computed on demand, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dossier {
    pub total_emails: usize,
    pub category_counts: std::collections::BTreeMap<String, usize>,
    pub average_priority_score: f64,
    pub latest_email_summary: Option<String>,
    pub most_common_action: Option<String>,
    pub entries: Vec<DossierEntry>,
    pub date_range: Option<String>,
}
