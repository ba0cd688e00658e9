use anyhow::Context;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};

/// One stored fallback result.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRow {
    pub stage: String,
    pub text: String,
    pub signal_hash: u32,
    pub created_at: i64,
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS transcripts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  stage TEXT NOT NULL,
  text TEXT NOT NULL,
  signal_hash INTEGER NOT NULL,
  created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transcripts_created_at ON transcripts(created_at DESC);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    pub fn record_transcript(
        &self,
        stage: &str,
        text: &str,
        signal_hash: u32,
        now_unix: i64,
    ) -> anyhow::Result<()> {
        self.conn
            .execute(
                r#"
INSERT INTO transcripts(stage, text, signal_hash, created_at)
VALUES(?1, ?2, ?3, ?4)
"#,
                params![stage, text, signal_hash, now_unix],
            )
            .context("record transcript")?;
        Ok(())
    }

    /// Most recent first.
    pub fn recent_transcripts(&self, limit: usize) -> anyhow::Result<Vec<TranscriptRow>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
SELECT stage, text, signal_hash, created_at
FROM transcripts
ORDER BY created_at DESC, id DESC
LIMIT ?1
"#,
            )
            .context("prepare recent transcripts")?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TranscriptRow {
                    stage: row.get(0)?,
                    text: row.get(1)?,
                    signal_hash: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .context("query recent transcripts")?
            .collect::<Result<Vec<_>, _>>()
            .context("read transcript row")?;
        Ok(rows)
    }
}

// rusqlite connections are not Sync: async callers open one per operation
// inside spawn_blocking.
#[derive(Debug, Clone)]
pub struct StorageHandle {
    path: PathBuf,
}

impl StorageHandle {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn open(&self) -> anyhow::Result<Storage> {
        Storage::open(&self.path)
    }

    pub async fn record_transcript(
        &self,
        stage: &'static str,
        text: String,
        signal_hash: u32,
        now_unix: i64,
    ) -> anyhow::Result<()> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || {
            handle
                .open()?
                .record_transcript(stage, &text, signal_hash, now_unix)
        })
        .await
        .context("storage task")?
    }

    pub async fn recent_transcripts(&self, limit: usize) -> anyhow::Result<Vec<TranscriptRow>> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.open()?.recent_transcripts(limit))
            .await
            .context("storage task")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("verse-storage-test-{}", std::process::id()))
            .join(format!("{name}.sqlite3"));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_recent_transcripts_newest_first() {
        let storage = Storage::open(&temp_db("order")).unwrap();
        storage.record_transcript("heuristic", "first", 7, 100).unwrap();
        storage.record_transcript("generative", "second", 7, 200).unwrap();
        storage.record_transcript("isolation", "third", 9, 200).unwrap();

        let rows = storage.recent_transcripts(10).unwrap();
        let texts: Vec<_> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);

        let limited = storage.recent_transcripts(1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].stage, "isolation");
        assert_eq!(limited[0].signal_hash, 9);
    }

    #[test]
    fn test_full_range_hash_survives() {
        let storage = Storage::open(&temp_db("hash")).unwrap();
        storage
            .record_transcript("heuristic", "x", u32::MAX, 1)
            .unwrap();
        assert_eq!(storage.recent_transcripts(1).unwrap()[0].signal_hash, u32::MAX);
    }

    #[tokio::test]
    async fn test_handle_reopens_per_call() {
        let handle = StorageHandle::new(temp_db("handle"));
        handle
            .record_transcript("recognizer", "hello".into(), 1, 5)
            .await
            .unwrap();
        let rows = handle.recent_transcripts(5).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "hello");
        assert_eq!(rows[0].created_at, 5);
    }
}
