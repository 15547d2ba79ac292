use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::domain::message::{
    Message, MessageDraft, MessageRowId, User, UserId, UserToken, DEFAULT_CATEGORY,
};
use crate::store::repo::{AnnotationRun, MailStore};

pub struct SqliteRepo {
    conn: Connection,
}

impl SqliteRepo {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.migrate()?;
        Ok(repo)
    }

    /// Private database, handy in tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.migrate()?;
        Ok(repo)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;
            PRAGMA busy_timeout=5000;

            CREATE TABLE IF NOT EXISTS users (
                id         INTEGER PRIMARY KEY,
                email      TEXT NOT NULL UNIQUE,
                full_name  TEXT
            );

            CREATE TABLE IF NOT EXISTS tokens (
                id               INTEGER PRIMARY KEY,
                user_id          INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                access_token     TEXT NOT NULL,
                refresh_token    TEXT,
                expires_at_epoch INTEGER
            );

            CREATE TABLE IF NOT EXISTS messages (
                id                INTEGER PRIMARY KEY,
                owner_id          INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message_id        TEXT NOT NULL UNIQUE,
                subject           TEXT,
                sender            TEXT,
                body              TEXT,
                summary           TEXT,
                category          TEXT NOT NULL DEFAULT 'Uncategorized',
                priority_score    INTEGER NOT NULL DEFAULT 0,
                suggested_action  TEXT,
                received_at_epoch INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_messages_rank
                ON messages(owner_id, priority_score DESC, received_at_epoch DESC);
            CREATE INDEX IF NOT EXISTS idx_messages_category
                ON messages(category);
            CREATE INDEX IF NOT EXISTS idx_tokens_user
                ON tokens(user_id);
            "#,
        )?;
        Ok(())
    }
}

fn message_from_row(r: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: r.get(0)?,
        owner_id: r.get(1)?,
        message_id: r.get(2)?,
        subject: r.get(3)?,
        sender: r.get(4)?,
        body: r.get(5)?,
        summary: r.get(6)?,
        category: r.get(7)?,
        priority_score: r.get(8)?,
        suggested_action: r.get(9)?,
        received_at_epoch: r.get(10)?,
    })
}

const MESSAGE_COLUMNS: &str = "id, owner_id, message_id, subject, sender, body, \
     summary, category, priority_score, suggested_action, received_at_epoch";

impl MailStore for SqliteRepo {
    fn get_or_create_user(&mut self, email: &str, full_name: Option<&str>) -> Result<User> {
        if let Some(u) = self.get_user_by_email(email)? {
            return Ok(u);
        }
        self.conn.execute(
            "INSERT INTO users (email, full_name) VALUES (?1, ?2)",
            params![email, full_name],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(User {
            id,
            email: email.to_string(),
            full_name: full_name.map(|s| s.to_string()),
        })
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, email, full_name FROM users WHERE email = ?1",
                params![email],
                |r| {
                    Ok(User {
                        id: r.get(0)?,
                        email: r.get(1)?,
                        full_name: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn replace_token(&mut self, token: &UserToken) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM tokens WHERE user_id = ?1",
            params![token.user_id],
        )?;
        tx.execute(
            r#"
            INSERT INTO tokens (user_id, access_token, refresh_token, expires_at_epoch)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                token.user_id,
                token.access_token,
                token.refresh_token,
                token.expires_at_epoch
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_token(&self, user_id: UserId) -> Result<Option<UserToken>> {
        let token = self
            .conn
            .query_row(
                r#"
                SELECT user_id, access_token, refresh_token, expires_at_epoch
                FROM tokens WHERE user_id = ?1
                "#,
                params![user_id],
                |r| {
                    Ok(UserToken {
                        user_id: r.get(0)?,
                        access_token: r.get(1)?,
                        refresh_token: r.get(2)?,
                        expires_at_epoch: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(token)
    }

    fn create_message(
        &mut self,
        owner_id: UserId,
        draft: &MessageDraft,
        ingested_at_epoch: i64,
    ) -> Result<bool> {
        let received = draft.received_at_epoch.unwrap_or(ingested_at_epoch);
        let changed = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO messages
                (owner_id, message_id, subject, sender, body, received_at_epoch)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                owner_id,
                draft.message_id,
                draft.subject,
                draft.sender,
                draft.body,
                received
            ],
        )?;
        Ok(changed > 0)
    }

    fn get_unannotated(&self, user_id: UserId) -> Result<Vec<MessageRowId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM messages WHERE owner_id = ?1 AND summary IS NULL ORDER BY id",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push(r.get(0)?);
        }
        Ok(out)
    }

    fn get_message(&self, id: MessageRowId) -> Result<Option<Message>> {
        let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
        let msg = self
            .conn
            .query_row(&sql, params![id], message_from_row)
            .optional()?;
        Ok(msg)
    }

    fn list_messages(&self, user_id: UserId, category: Option<&str>) -> Result<Vec<Message>> {
        let mut out = Vec::new();
        match category {
            Some(cat) => {
                let sql = format!(
                    r#"
                    SELECT {} FROM messages
                    WHERE owner_id = ?1 AND category = ?2
                    ORDER BY priority_score DESC, received_at_epoch DESC
                    "#,
                    MESSAGE_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let mut rows = stmt.query(params![user_id, cat])?;
                while let Some(r) = rows.next()? {
                    out.push(message_from_row(r)?);
                }
            }
            None => {
                let sql = format!(
                    r#"
                    SELECT {} FROM messages
                    WHERE owner_id = ?1
                    ORDER BY priority_score DESC, received_at_epoch DESC
                    "#,
                    MESSAGE_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let mut rows = stmt.query(params![user_id])?;
                while let Some(r) = rows.next()? {
                    out.push(message_from_row(r)?);
                }
            }
        }
        Ok(out)
    }

    fn messages_from_sender(
        &self,
        user_id: UserId,
        sender_query: &str,
        since_epoch: i64,
    ) -> Result<Vec<Message>> {
        let sql = format!(
            r#"
            SELECT {} FROM messages
            WHERE owner_id = ?1
              AND sender IS NOT NULL
              AND instr(lower(sender), lower(?2)) > 0
              AND received_at_epoch >= ?3
            ORDER BY received_at_epoch DESC
            "#,
            MESSAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![user_id, sender_query, since_epoch])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push(message_from_row(r)?);
        }
        Ok(out)
    }

    fn begin_annotation<'a>(&'a mut self) -> Result<Box<dyn AnnotationRun + 'a>> {
        let tx = self.conn.transaction()?;
        Ok(Box::new(SqliteAnnotationRun { tx }))
    }

    fn ping(&self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

struct SqliteAnnotationRun<'a> {
    tx: Transaction<'a>,
}

impl SqliteAnnotationRun<'_> {
    fn check_hit(id: MessageRowId, changed: usize) -> Result<()> {
        if changed == 0 {
            anyhow::bail!("message row {} vanished mid-run", id);
        }
        Ok(())
    }
}

impl AnnotationRun for SqliteAnnotationRun<'_> {
    fn stage_summary(&mut self, id: MessageRowId, summary: &str) -> Result<()> {
        let n = self.tx.execute(
            "UPDATE messages SET summary = ?1 WHERE id = ?2",
            params![summary, id],
        )?;
        Self::check_hit(id, n)
    }

    fn stage_category(&mut self, id: MessageRowId, category: &str) -> Result<()> {
        let n = self.tx.execute(
            "UPDATE messages SET category = ?1 WHERE id = ?2",
            params![category, id],
        )?;
        Self::check_hit(id, n)
    }

    fn stage_priority(&mut self, id: MessageRowId, score: i64) -> Result<()> {
        let n = self.tx.execute(
            "UPDATE messages SET priority_score = ?1 WHERE id = ?2",
            params![score, id],
        )?;
        Self::check_hit(id, n)
    }

    fn stage_action(&mut self, id: MessageRowId, action: &str) -> Result<()> {
        let n = self.tx.execute(
            "UPDATE messages SET suggested_action = ?1 WHERE id = ?2",
            params![action, id],
        )?;
        Self::check_hit(id, n)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(message_id: &str) -> MessageDraft {
        MessageDraft {
            message_id: message_id.to_string(),
            subject: Some("hello".to_string()),
            sender: Some("Alice <alice@example.com>".to_string()),
            body: Some("hi there".to_string()),
            received_at_epoch: Some(1_700_000_000),
        }
    }

    #[test]
    fn duplicate_message_id_is_a_no_op() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();

        assert!(repo.create_message(user.id, &draft("m1"), 0).unwrap());
        assert!(!repo.create_message(user.id, &draft("m1"), 0).unwrap());

        let msgs = repo.list_messages(user.id, None).unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn missing_timestamp_falls_back_to_ingestion_time() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();

        let mut d = draft("m1");
        d.received_at_epoch = None;
        repo.create_message(user.id, &d, 42).unwrap();

        let msgs = repo.list_messages(user.id, None).unwrap();
        assert_eq!(msgs[0].received_at_epoch, Some(42));
    }

    #[test]
    fn new_message_has_default_annotations() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();
        repo.create_message(user.id, &draft("m1"), 0).unwrap();

        let msg = &repo.list_messages(user.id, None).unwrap()[0];
        assert_eq!(msg.category, DEFAULT_CATEGORY);
        assert_eq!(msg.priority_score, 0);
        assert!(msg.summary.is_none());
        assert!(msg.suggested_action.is_none());
    }

    #[test]
    fn dropped_run_rolls_back_staged_writes() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();
        repo.create_message(user.id, &draft("m1"), 0).unwrap();
        let id = repo.get_unannotated(user.id).unwrap()[0];

        {
            let mut run = repo.begin_annotation().unwrap();
            run.stage_summary(id, "staged").unwrap();
            run.stage_priority(id, 99).unwrap();
            // dropped without commit
        }

        let msg = repo.get_message(id).unwrap().unwrap();
        assert!(msg.summary.is_none());
        assert_eq!(msg.priority_score, 0);
    }

    #[test]
    fn committed_run_persists_all_fields() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();
        repo.create_message(user.id, &draft("m1"), 0).unwrap();
        let id = repo.get_unannotated(user.id).unwrap()[0];

        let mut run = repo.begin_annotation().unwrap();
        run.stage_summary(id, "a summary").unwrap();
        run.stage_category(id, "Work").unwrap();
        run.stage_priority(id, 25).unwrap();
        run.stage_action(id, "Reply Needed").unwrap();
        run.commit().unwrap();

        let msg = repo.get_message(id).unwrap().unwrap();
        assert_eq!(msg.summary.as_deref(), Some("a summary"));
        assert_eq!(msg.category, "Work");
        assert_eq!(msg.priority_score, 25);
        assert_eq!(msg.suggested_action.as_deref(), Some("Reply Needed"));
        assert!(repo.get_unannotated(user.id).unwrap().is_empty());
    }

    #[test]
    fn token_replacement_keeps_exactly_one_row() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();

        for n in 0..3 {
            repo.replace_token(&UserToken {
                user_id: user.id,
                access_token: format!("at{}", n),
                refresh_token: Some("rt".to_string()),
                expires_at_epoch: Some(1000 + n),
            })
            .unwrap();
        }

        let tok = repo.get_token(user.id).unwrap().unwrap();
        assert_eq!(tok.access_token, "at2");
        assert_eq!(tok.expires_at_epoch, Some(1002));
    }

    #[test]
    fn listing_orders_by_priority_then_recency() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();

        for (mid, epoch) in [("a", 100), ("b", 300), ("c", 200)] {
            let mut d = draft(mid);
            d.received_at_epoch = Some(epoch);
            repo.create_message(user.id, &d, 0).unwrap();
        }
        // give "a" the highest score, leave "b"/"c" tied at 0
        let ids = repo.get_unannotated(user.id).unwrap();
        let mut run = repo.begin_annotation().unwrap();
        run.stage_priority(ids[0], 50).unwrap();
        run.commit().unwrap();

        let msgs = repo.list_messages(user.id, None).unwrap();
        let order: Vec<&str> = msgs.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn category_filter_applies() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();
        repo.create_message(user.id, &draft("m1"), 0).unwrap();
        repo.create_message(user.id, &draft("m2"), 0).unwrap();

        let ids = repo.get_unannotated(user.id).unwrap();
        let mut run = repo.begin_annotation().unwrap();
        run.stage_category(ids[0], "Work").unwrap();
        run.commit().unwrap();

        assert_eq!(repo.list_messages(user.id, Some("Work")).unwrap().len(), 1);
        assert_eq!(
            repo.list_messages(user.id, Some(DEFAULT_CATEGORY)).unwrap().len(),
            1
        );
    }

    #[test]
    fn sender_match_is_case_insensitive_and_windowed() {
        let mut repo = SqliteRepo::open_in_memory().unwrap();
        let user = repo.get_or_create_user("me@example.com", None).unwrap();

        let mut recent = draft("m1");
        recent.sender = Some("News <TEAM@Example.com>".to_string());
        recent.received_at_epoch = Some(5000);
        repo.create_message(user.id, &recent, 0).unwrap();

        let mut old = draft("m2");
        old.sender = Some("News <team@example.com>".to_string());
        old.received_at_epoch = Some(10);
        repo.create_message(user.id, &old, 0).unwrap();

        let hits = repo.messages_from_sender(user.id, "team@", 1000).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, "m1");
    }
}
