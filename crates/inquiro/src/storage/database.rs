//! SQLite database for the email-derived knowledge base
//!
//! Holds users, threads, messages, knowledge pairs, the pair → message
//! source links and the pair → pair relationship edges.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    KnowledgeEdge, KnowledgePair, Message, MessageWithAuthor, RelationshipType, Thread,
    ThreadWithMessages,
};

/// SQLite-based knowledge store
#[derive(Clone)]
pub struct KnowledgeDb {
    conn: Arc<Mutex<Connection>>,
}

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeDbStats {
    pub users: usize,
    pub threads: usize,
    pub messages: usize,
    pub knowledge_pairs: usize,
    pub source_links: usize,
    pub edges: usize,
}

impl KnowledgeDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run raw SQL against the connection (for testing)
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::Database(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                subject TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                original_message_id TEXT NOT NULL,
                content TEXT NOT NULL,
                sent_at TEXT NOT NULL,
                author_id TEXT NOT NULL REFERENCES users(id),
                thread_id TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_messages_thread_id ON messages(thread_id);
            CREATE INDEX IF NOT EXISTS idx_messages_original_id ON messages(original_message_id);

            CREATE TABLE IF NOT EXISTS knowledge_pairs (
                id TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS knowledge_pair_sources (
                pair_id TEXT NOT NULL REFERENCES knowledge_pairs(id) ON DELETE CASCADE,
                message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                PRIMARY KEY (pair_id, message_id)
            );

            CREATE TABLE IF NOT EXISTS knowledge_edges (
                id TEXT PRIMARY KEY,
                source_pair_id TEXT NOT NULL REFERENCES knowledge_pairs(id) ON DELETE CASCADE,
                target_pair_id TEXT NOT NULL REFERENCES knowledge_pairs(id) ON DELETE CASCADE,
                relationship_type TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_edges_source ON knowledge_edges(source_pair_id);
        "#,
        )
        .map_err(|e| Error::Database(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    // ========================================================================
    // Seeding writes
    // ========================================================================

    /// Delete every row, children first
    ///
    /// All or nothing: a failed delete rolls the others back.
    pub fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        // Savepoints nest, so this also works inside `atomically`
        let sp = conn.savepoint()?;
        sp.execute_batch(
            r#"
            DELETE FROM knowledge_edges;
            DELETE FROM knowledge_pair_sources;
            DELETE FROM knowledge_pairs;
            DELETE FROM messages;
            DELETE FROM threads;
            DELETE FROM users;
        "#,
        )?;
        sp.commit()?;
        Ok(())
    }

    /// Run a group of writes as one unit
    ///
    /// Everything `f` writes through this handle is rolled back if it
    /// returns an error.
    pub fn atomically<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.conn.lock().execute_batch("SAVEPOINT inquiro_atomic")?;

        match f() {
            Ok(value) => {
                self.conn.lock().execute_batch("RELEASE inquiro_atomic")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .lock()
                    .execute_batch("ROLLBACK TO inquiro_atomic; RELEASE inquiro_atomic")
                {
                    tracing::error!("Failed to roll back: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Create users for the given addresses, returning email → user id
    ///
    /// Addresses already present keep their existing id.
    pub fn insert_users<'a, I>(&self, emails: I) -> Result<HashMap<String, String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let conn = self.conn.lock();
        let mut ids = HashMap::new();

        for email in emails {
            if ids.contains_key(email) {
                continue;
            }
            conn.execute(
                "INSERT OR IGNORE INTO users (id, email) VALUES (?1, ?2)",
                params![Uuid::new_v4().to_string(), email],
            )?;
            let id: String = conn.query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )?;
            ids.insert(email.to_string(), id);
        }

        Ok(ids)
    }

    /// Create a thread
    pub fn insert_thread(&self, subject: &str) -> Result<Thread> {
        let thread = Thread {
            id: Uuid::new_v4().to_string(),
            subject: subject.to_string(),
        };

        self.conn.lock().execute(
            "INSERT INTO threads (id, subject) VALUES (?1, ?2)",
            params![thread.id, thread.subject],
        )?;
        Ok(thread)
    }

    /// Create a message in a thread, returning its id
    pub fn insert_message(
        &self,
        thread_id: &str,
        author_id: &str,
        original_message_id: &str,
        content: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        self.conn.lock().execute(
            r#"
            INSERT INTO messages (id, original_message_id, content, sent_at, author_id, thread_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                id,
                original_message_id,
                content,
                format_timestamp(&sent_at),
                author_id,
                thread_id,
            ],
        )?;
        Ok(id)
    }

    /// Map of original (email file) message id → stored message id
    pub fn message_ids_by_original(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT original_message_id, id FROM messages")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(pairs)
    }

    /// Create a knowledge pair
    pub fn insert_knowledge_pair(&self, question: &str, answer: &str) -> Result<KnowledgePair> {
        let pair = KnowledgePair {
            id: Uuid::new_v4().to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: Utc::now(),
        };

        self.conn.lock().execute(
            "INSERT INTO knowledge_pairs (id, question, answer, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                pair.id,
                pair.question,
                pair.answer,
                format_timestamp(&pair.created_at),
            ],
        )?;
        Ok(pair)
    }

    /// Record that a pair was derived from a message
    pub fn link_source_message(&self, pair_id: &str, message_id: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO knowledge_pair_sources (pair_id, message_id) VALUES (?1, ?2)",
            params![pair_id, message_id],
        )?;
        Ok(())
    }

    /// Create a relationship edge between two pairs
    pub fn insert_edge(
        &self,
        source_pair_id: &str,
        target_pair_id: &str,
        relationship_type: RelationshipType,
    ) -> Result<KnowledgeEdge> {
        let edge = KnowledgeEdge {
            id: Uuid::new_v4().to_string(),
            source_pair_id: source_pair_id.to_string(),
            target_pair_id: target_pair_id.to_string(),
            relationship_type,
        };

        self.conn.lock().execute(
            r#"
            INSERT INTO knowledge_edges (id, source_pair_id, target_pair_id, relationship_type)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                edge.id,
                edge.source_pair_id,
                edge.target_pair_id,
                edge.relationship_type.as_str(),
            ],
        )?;
        Ok(edge)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// All knowledge pairs, oldest first
    pub fn list_knowledge_pairs(&self) -> Result<Vec<KnowledgePair>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, question, answer, created_at FROM knowledge_pairs ORDER BY created_at, rowid",
        )?;
        let pairs = stmt
            .query_map([], row_to_knowledge_pair)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// Pairs with the given ids, in the order of `ids`
    ///
    /// Unknown ids are skipped.
    pub fn find_knowledge_pairs(&self, ids: &[String]) -> Result<Vec<KnowledgePair>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, question, answer, created_at FROM knowledge_pairs WHERE id IN ({})",
            placeholders
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut found: HashMap<String, KnowledgePair> = stmt
            .query_map(params_from_iter(ids.iter()), row_to_knowledge_pair)?
            .map(|r| r.map(|pair| (pair.id.clone(), pair)))
            .collect::<std::result::Result<_, _>>()?;

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    /// Get a single pair
    pub fn get_knowledge_pair(&self, id: &str) -> Result<Option<KnowledgePair>> {
        let conn = self.conn.lock();
        let pair = conn
            .query_row(
                "SELECT id, question, answer, created_at FROM knowledge_pairs WHERE id = ?1",
                params![id],
                row_to_knowledge_pair,
            )
            .optional()?;
        Ok(pair)
    }

    /// All relationship edges
    pub fn list_edges(&self) -> Result<Vec<KnowledgeEdge>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, source_pair_id, target_pair_id, relationship_type FROM knowledge_edges ORDER BY rowid",
        )?;
        let edges = stmt
            .query_map([], row_to_edge)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    /// Threads containing the pair's source messages
    ///
    /// Each thread carries all of its messages (not only the source ones),
    /// oldest first, with the author's email.
    pub fn source_threads_for_pair(&self, pair_id: &str) -> Result<Vec<ThreadWithMessages>> {
        let conn = self.conn.lock();

        let threads: Vec<Thread> = {
            let mut stmt = conn.prepare(
                r#"
                SELECT t.id, t.subject
                FROM knowledge_pair_sources s
                JOIN messages m ON m.id = s.message_id
                JOIN threads t ON t.id = m.thread_id
                WHERE s.pair_id = ?1
                GROUP BY t.id, t.subject
                ORDER BY MIN(m.sent_at)
                "#,
            )?;
            let rows = stmt.query_map(params![pair_id], |row| {
                Ok(Thread {
                    id: row.get(0)?,
                    subject: row.get(1)?,
                })
            })?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT m.id, m.original_message_id, m.content, m.sent_at, m.author_id, m.thread_id, u.email
            FROM messages m
            JOIN users u ON u.id = m.author_id
            WHERE m.thread_id = ?1
            ORDER BY m.sent_at ASC, m.rowid ASC
            "#,
        )?;

        let mut result = Vec::with_capacity(threads.len());
        for thread in threads {
            let messages = stmt
                .query_map(params![thread.id], row_to_message_with_author)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            result.push(ThreadWithMessages { thread, messages });
        }

        Ok(result)
    }

    /// Row counts per table
    pub fn stats(&self) -> Result<KnowledgeDbStats> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(KnowledgeDbStats {
            users: count("users")?,
            threads: count("threads")?,
            messages: count("messages")?,
            knowledge_pairs: count("knowledge_pairs")?,
            source_links: count("knowledge_pair_sources")?,
            edges: count("knowledge_edges")?,
        })
    }
}

// ============================================================================
// Row mappers
// ============================================================================

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_knowledge_pair(row: &rusqlite::Row) -> rusqlite::Result<KnowledgePair> {
    let created_at_str: String = row.get(3)?;

    Ok(KnowledgePair {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
        created_at: parse_timestamp(&created_at_str),
    })
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<KnowledgeEdge> {
    let relationship_str: String = row.get(3)?;
    let relationship_type = RelationshipType::parse(&relationship_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown relationship type '{}'", relationship_str).into(),
        )
    })?;

    Ok(KnowledgeEdge {
        id: row.get(0)?,
        source_pair_id: row.get(1)?,
        target_pair_id: row.get(2)?,
        relationship_type,
    })
}

fn row_to_message_with_author(row: &rusqlite::Row) -> rusqlite::Result<MessageWithAuthor> {
    let sent_at_str: String = row.get(3)?;

    Ok(MessageWithAuthor {
        message: Message {
            id: row.get(0)?,
            original_message_id: row.get(1)?,
            content: row.get(2)?,
            sent_at: parse_timestamp(&sent_at_str),
            author_id: row.get(4)?,
            thread_id: row.get(5)?,
        },
        author_email: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    /// One thread with two messages and a pair sourced from the second
    fn seeded() -> (KnowledgeDb, KnowledgePair) {
        let db = KnowledgeDb::in_memory().unwrap();
        let users = db
            .insert_users(["client@example.com", "cpa@example.com", "client@example.com"])
            .unwrap();
        let thread = db.insert_thread("Home office").unwrap();

        // Inserted out of order to exercise sent_at ordering
        let reply = db
            .insert_message(&thread.id, &users["cpa@example.com"], "msg_2", "Yes, it is.", at(11))
            .unwrap();
        db.insert_message(
            &thread.id,
            &users["client@example.com"],
            "msg_1",
            "Can I deduct my home office?",
            at(10),
        )
        .unwrap();

        let pair = db
            .insert_knowledge_pair("Can I deduct my home office?", "Yes, it is.")
            .unwrap();
        db.link_source_message(&pair.id, &reply).unwrap();
        (db, pair)
    }

    #[test]
    fn test_insert_users_dedups() {
        let db = KnowledgeDb::in_memory().unwrap();
        let first = db.insert_users(["a@x.com", "b@x.com", "a@x.com"]).unwrap();
        assert_eq!(first.len(), 2);

        // Re-inserting keeps the existing id
        let again = db.insert_users(["a@x.com"]).unwrap();
        assert_eq!(again["a@x.com"], first["a@x.com"]);
        assert_eq!(db.stats().unwrap().users, 2);
    }

    #[test]
    fn test_source_threads_include_all_messages_in_order() {
        let (db, pair) = seeded();

        let threads = db.source_threads_for_pair(&pair.id).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].thread.subject, "Home office");

        let messages = &threads[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message.original_message_id, "msg_1");
        assert_eq!(messages[0].author_email, "client@example.com");
        assert_eq!(messages[1].author_email, "cpa@example.com");
    }

    #[test]
    fn test_find_pairs_keeps_requested_order() {
        let db = KnowledgeDb::in_memory().unwrap();
        let a = db.insert_knowledge_pair("A?", "a").unwrap();
        let b = db.insert_knowledge_pair("B?", "b").unwrap();

        let ids = vec![b.id.clone(), "missing".to_string(), a.id.clone()];
        let found = db.find_knowledge_pairs(&ids).unwrap();

        assert_eq!(
            found.iter().map(|p| p.question.as_str()).collect::<Vec<_>>(),
            vec!["B?", "A?"]
        );
        assert!(db.find_knowledge_pairs(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_get_missing_pair() {
        let db = KnowledgeDb::in_memory().unwrap();
        assert!(db.get_knowledge_pair("nope").unwrap().is_none());
        assert!(db.source_threads_for_pair("nope").unwrap().is_empty());
    }

    #[test]
    fn test_edges_round_trip() {
        let db = KnowledgeDb::in_memory().unwrap();
        let a = db.insert_knowledge_pair("A?", "a").unwrap();
        let b = db.insert_knowledge_pair("B?", "b").unwrap();
        db.insert_edge(&b.id, &a.id, RelationshipType::ExpandsOn).unwrap();

        let edges = db.list_edges().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_pair_id, b.id);
        assert_eq!(edges[0].relationship_type, RelationshipType::ExpandsOn);
    }

    #[test]
    fn test_message_ids_by_original() {
        let (db, _) = seeded();
        let map = db.message_ids_by_original().unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("msg_1"));
    }

    #[test]
    fn test_clear_all() {
        let (db, _) = seeded();
        assert_eq!(db.stats().unwrap().source_links, 1);

        db.clear_all().unwrap();
        assert_eq!(db.stats().unwrap(), KnowledgeDbStats::default());
    }

    #[test]
    fn test_failed_clear_all_keeps_rows() {
        let (db, _) = seeded();
        let before = db.stats().unwrap();

        db.execute_batch(
            "CREATE TRIGGER keep_users BEFORE DELETE ON users BEGIN SELECT RAISE(ABORT, 'users are locked'); END;",
        )
        .unwrap();

        assert!(matches!(db.clear_all(), Err(Error::Database(_))));
        assert_eq!(db.stats().unwrap(), before);
        assert!(db.conn.lock().is_autocommit());
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let db = KnowledgeDb::in_memory().unwrap();
        db.insert_knowledge_pair("Kept?", "yes").unwrap();

        let result: Result<()> = db.atomically(|| {
            db.clear_all()?;
            db.insert_knowledge_pair("Lost?", "yes")?;
            Err(Error::Internal("stop".to_string()))
        });

        assert!(result.is_err());
        assert!(db.conn.lock().is_autocommit());
        let pairs = db.list_knowledge_pairs().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "Kept?");
    }

    #[test]
    fn test_atomically_commits_on_success() {
        let db = KnowledgeDb::in_memory().unwrap();

        let pair = db
            .atomically(|| db.insert_knowledge_pair("Stored?", "yes"))
            .unwrap();

        assert!(db.conn.lock().is_autocommit());
        assert!(db.get_knowledge_pair(&pair.id).unwrap().is_some());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.db");

        {
            let db = KnowledgeDb::new(&path).unwrap();
            db.insert_knowledge_pair("Q?", "A").unwrap();
        }

        let reopened = KnowledgeDb::new(&path).unwrap();
        assert_eq!(reopened.list_knowledge_pairs().unwrap().len(), 1);
    }
}
