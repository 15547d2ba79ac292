use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Keyword reference data for the annotators. Built once at startup and
/// passed around by shared reference; never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Lexicon {
    /// Category keyword sets, in priority order for tie-breaking.
    pub categories: Vec<CategoryKeywords>,
    pub high_urgency: Vec<String>,
    pub low_urgency: Vec<String>,
    pub actions: Vec<ActionKeywords>,
    /// Categories that never need a follow-up action.
    pub no_action_categories: Vec<String>,
    /// Categories that fall back to "Reply Needed" when nothing matches.
    pub reply_default_categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryKeywords {
    pub label: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionKeywords {
    pub label: String,
    pub keywords: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        fn cat(label: &str, kws: &[&str]) -> CategoryKeywords {
            CategoryKeywords {
                label: label.to_string(),
                keywords: kws.iter().map(|s| s.to_string()).collect(),
            }
        }
        fn act(label: &str, kws: &[&str]) -> ActionKeywords {
            ActionKeywords {
                label: label.to_string(),
                keywords: kws.iter().map(|s| s.to_string()).collect(),
            }
        }
        fn strs(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Lexicon {
            categories: vec![
                cat(
                    "Promotions",
                    &[
                        "unsubscribe",
                        "discount",
                        "sale",
                        "% off",
                        "limited time",
                        "coupon",
                        "deal",
                        "offer expires",
                    ],
                ),
                cat(
                    "Updates",
                    &[
                        "your order",
                        "has shipped",
                        "delivery",
                        "receipt",
                        "confirmation",
                        "password was changed",
                        "security alert",
                    ],
                ),
                cat(
                    "Work",
                    &[
                        "meeting",
                        "deadline",
                        "project",
                        "standup",
                        "sprint",
                        "review request",
                        "timesheet",
                        "agenda",
                    ],
                ),
                cat(
                    "Personal",
                    &["birthday", "dinner", "weekend", "family", "congratulations", "see you"],
                ),
                cat(
                    "Finance",
                    &[
                        "invoice",
                        "payment",
                        "statement",
                        "balance",
                        "transaction",
                        "bank",
                        "tax",
                        "due date",
                    ],
                ),
                cat(
                    "Social",
                    &[
                        "friend request",
                        "mentioned you",
                        "commented on",
                        "liked your",
                        "new follower",
                        "tagged you",
                    ],
                ),
                cat(
                    "Newsletters",
                    &["newsletter", "weekly digest", "this week in", "roundup", "edition"],
                ),
            ],
            high_urgency: strs(&[
                "urgent",
                "asap",
                "immediately",
                "action required",
                "important",
                "deadline",
                "overdue",
                "final notice",
            ]),
            low_urgency: strs(&[
                "no rush",
                "whenever",
                "fyi",
                "no action needed",
                "just so you know",
            ]),
            actions: vec![
                act(
                    "Schedule Event",
                    &[
                        "meeting",
                        "schedule",
                        "calendar",
                        "appointment",
                        "invite",
                        "call at",
                        "let's meet",
                    ],
                ),
                act(
                    "Reply Needed",
                    &[
                        "please reply",
                        "let me know",
                        "can you",
                        "could you",
                        "what do you think",
                        "waiting for your",
                        "?",
                    ],
                ),
                act("FYI", &["fyi", "for your information", "heads up", "no reply needed"]),
            ],
            no_action_categories: strs(&["Promotions", "Newsletters", "Social", "Updates"]),
            reply_default_categories: strs(&["Work", "Personal", "Finance"]),
        }
    }
}

impl Lexicon {
    /// Load from a TOML file, useful for tuning keywords without a rebuild.
    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading lexicon file {}", path.display()))?;
        let lex: Lexicon = toml::from_str(&s)
            .with_context(|| format!("parsing lexicon file {}", path.display()))?;
        Ok(lex)
    }

    /// Built-in defaults, optionally replaced by the configured file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lexicon_declares_all_categories() {
        let lex = Lexicon::default();
        let labels: Vec<&str> = lex.categories.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Promotions",
                "Updates",
                "Work",
                "Personal",
                "Finance",
                "Social",
                "Newsletters"
            ]
        );
    }

    #[test]
    fn lexicon_parses_from_toml() {
        let toml_src = r#"
            high_urgency = ["urgent"]
            low_urgency = ["no rush"]
            no_action_categories = ["Promotions"]
            reply_default_categories = ["Work"]

            [[categories]]
            label = "Work"
            keywords = ["meeting"]

            [[actions]]
            label = "Reply Needed"
            keywords = ["please reply"]
        "#;
        let lex: Lexicon = toml::from_str(toml_src).unwrap();
        assert_eq!(lex.categories.len(), 1);
        assert_eq!(lex.actions[0].label, "Reply Needed");
    }
}
