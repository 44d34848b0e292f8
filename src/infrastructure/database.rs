//! SQLite 持久化
//!
//! 只有持久化步骤持有连接。所有写入放在一个事务里，全部成功才提交，
//! 任何一步失败整个事务回滚（`Transaction` 被 drop 时自动回滚）。
//!
//! 写入都按自然键 upsert（科目名、文件路径），重复运行不会因为唯一约束失败。

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::models::{FileRecord, HeaderMetadata, MaterialType, SubjectVocabulary};

/// 尚未生成向量时的 embedding_id
pub const EMBEDDING_UNSET: i64 = -1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS subject (
  subject_id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS file (
  file_id INTEGER PRIMARY KEY AUTOINCREMENT,
  file_path TEXT NOT NULL UNIQUE,
  year INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS exam (
  exam_id INTEGER PRIMARY KEY AUTOINCREMENT,
  subject_id INTEGER NOT NULL,
  file_id INTEGER NOT NULL UNIQUE,
  embedding_id INTEGER NOT NULL DEFAULT -1,
  exam_type TEXT NOT NULL,
  difficulty TEXT NOT NULL,
  task_label TEXT NOT NULL,
  work_time_in_minutes INTEGER NOT NULL,
  FOREIGN KEY(subject_id) REFERENCES subject(subject_id),
  FOREIGN KEY(file_id) REFERENCES file(file_id)
);

CREATE TABLE IF NOT EXISTS answer (
  answer_id INTEGER PRIMARY KEY AUTOINCREMENT,
  subject_id INTEGER NOT NULL,
  file_id INTEGER NOT NULL UNIQUE,
  embedding_id INTEGER NOT NULL DEFAULT -1,
  FOREIGN KEY(subject_id) REFERENCES subject(subject_id),
  FOREIGN KEY(file_id) REFERENCES file(file_id)
);

CREATE TABLE IF NOT EXISTS other (
  other_id INTEGER PRIMARY KEY AUTOINCREMENT,
  subject_id INTEGER NOT NULL,
  file_id INTEGER NOT NULL UNIQUE,
  embedding_id INTEGER NOT NULL DEFAULT -1,
  FOREIGN KEY(subject_id) REFERENCES subject(subject_id),
  FOREIGN KEY(file_id) REFERENCES file(file_id)
);
";

/// 一个已分类、已解析出科目和年份的文件
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub file: FileRecord,
    pub subject_name: String,
    pub year: i32,
    pub header: HeaderMetadata,
}

/// 一次持久化写入的行数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistReport {
    pub subjects: usize,
    pub files: usize,
    pub exams: usize,
    pub answers: usize,
    pub others: usize,
}

/// 数据库连接
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(PersistenceError::sql("open"))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(PersistenceError::sql("open"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        let db = Database { conn };
        db.configure_pragmas()?;
        db.ensure_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<(), PersistenceError> {
        self.conn
            .pragma_update(None, "foreign_keys", "ON")
            .map_err(PersistenceError::sql("pragma foreign_keys"))?;
        self.conn
            .pragma_update(None, "synchronous", "NORMAL")
            .map_err(PersistenceError::sql("pragma synchronous"))?;
        Ok(())
    }

    fn ensure_schema(&self) -> Result<(), PersistenceError> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(PersistenceError::sql("ensure schema"))?;
        debug!("数据库表结构已就绪");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// 在一个事务里写入整次运行的结果
    ///
    /// 每个文件在 exam / answer / other 三张表中恰好有一行：
    /// 先删掉该文件在三张表里已有的行，再按本次的分类插入。
    pub fn persist(
        &mut self,
        vocabulary: &SubjectVocabulary,
        files: &[ClassifiedFile],
    ) -> Result<PersistReport, PersistenceError> {
        let tx = self
            .conn
            .transaction()
            .map_err(PersistenceError::sql("begin transaction"))?;

        let mut report = PersistReport::default();

        let mut subject_ids = HashMap::with_capacity(vocabulary.len());
        for name in vocabulary.names() {
            let id = upsert_subject(&tx, name)?;
            subject_ids.insert(name.as_str(), id);
            report.subjects += 1;
        }

        for classified in files {
            let subject_id = *subject_ids
                .get(classified.subject_name.as_str())
                .ok_or_else(|| PersistenceError::UnknownSubject {
                    subject: classified.subject_name.clone(),
                })?;

            let file_id = upsert_file(&tx, &classified.file, classified.year)?;
            report.files += 1;

            clear_classification(&tx, file_id)?;
            insert_classification(&tx, subject_id, file_id, &classified.header)?;
            match classified.header.material_type {
                MaterialType::Exam => report.exams += 1,
                MaterialType::Answer => report.answers += 1,
                MaterialType::Other => report.others += 1,
            }
        }

        tx.commit().map_err(PersistenceError::sql("commit"))?;

        info!(
            "💾 已提交: {} 个科目, {} 个文件 (试题 {} / 答案 {} / 其他 {})",
            report.subjects, report.files, report.exams, report.answers, report.others
        );
        Ok(report)
    }
}

fn upsert_subject(tx: &Transaction<'_>, name: &str) -> Result<i64, PersistenceError> {
    tx.query_row(
        "INSERT INTO subject (name) VALUES (?1)
         ON CONFLICT(name) DO UPDATE SET name = excluded.name
         RETURNING subject_id",
        params![name],
        |row| row.get(0),
    )
    .map_err(PersistenceError::sql("upsert subject"))
}

fn upsert_file(tx: &Transaction<'_>, file: &FileRecord, year: i32) -> Result<i64, PersistenceError> {
    tx.query_row(
        "INSERT INTO file (file_path, year) VALUES (?1, ?2)
         ON CONFLICT(file_path) DO UPDATE SET year = excluded.year
         RETURNING file_id",
        params![file.key(), year],
        |row| row.get(0),
    )
    .map_err(PersistenceError::sql("upsert file"))
}

fn clear_classification(tx: &Transaction<'_>, file_id: i64) -> Result<(), PersistenceError> {
    for sql in [
        "DELETE FROM exam WHERE file_id = ?1",
        "DELETE FROM answer WHERE file_id = ?1",
        "DELETE FROM other WHERE file_id = ?1",
    ] {
        tx.execute(sql, params![file_id])
            .map_err(PersistenceError::sql("clear classification"))?;
    }
    Ok(())
}

fn insert_classification(
    tx: &Transaction<'_>,
    subject_id: i64,
    file_id: i64,
    header: &HeaderMetadata,
) -> Result<(), PersistenceError> {
    match header.material_type {
        MaterialType::Exam => tx.execute(
            "INSERT INTO exam (subject_id, file_id, embedding_id, exam_type, difficulty,
                               task_label, work_time_in_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                subject_id,
                file_id,
                EMBEDDING_UNSET,
                header.exam_type,
                header.difficulty.as_str(),
                header.task_label,
                header.work_time_minutes,
            ],
        ),
        MaterialType::Answer => tx.execute(
            "INSERT INTO answer (subject_id, file_id, embedding_id) VALUES (?1, ?2, ?3)",
            params![subject_id, file_id, EMBEDDING_UNSET],
        ),
        MaterialType::Other => tx.execute(
            "INSERT INTO other (subject_id, file_id, embedding_id) VALUES (?1, ?2, ?3)",
            params![subject_id, file_id, EMBEDDING_UNSET],
        ),
    }
    .map_err(PersistenceError::sql("insert classification"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn classified(path: &str, material_type: MaterialType) -> ClassifiedFile {
        ClassifiedFile {
            file: FileRecord::new(path),
            subject_name: "Chemie".to_string(),
            year: 2016,
            header: HeaderMetadata {
                exam_type: "Zentralabitur".to_string(),
                material_type,
                task_label: "Aufgabe I".to_string(),
                difficulty: Difficulty::Advanced,
                work_time_minutes: 300,
            },
        }
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.connection()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_persist_writes_one_row_per_file() {
        let mut db = Database::open_in_memory().unwrap();
        let vocabulary = SubjectVocabulary::new(["Chemie", "Physik"]);
        let files = vec![
            classified("/exams/2016Chemie/A1.md", MaterialType::Exam),
            classified("/exams/2016Chemie/A1L.md", MaterialType::Answer),
            classified("/exams/2016Chemie/Deckblatt.md", MaterialType::Other),
        ];

        let report = db.persist(&vocabulary, &files).unwrap();

        assert_eq!(report.subjects, 2);
        assert_eq!(report.files, 3);
        assert_eq!(count(&db, "exam"), 1);
        assert_eq!(count(&db, "answer"), 1);
        assert_eq!(count(&db, "other"), 1);

        let (difficulty, embedding): (String, i64) = db
            .connection()
            .query_row("SELECT difficulty, embedding_id FROM exam", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(difficulty, "eA");
        assert_eq!(embedding, EMBEDDING_UNSET);
    }

    #[test]
    fn test_rerun_is_idempotent_and_reclassifies() {
        let mut db = Database::open_in_memory().unwrap();
        let vocabulary = SubjectVocabulary::new(["Chemie"]);

        db.persist(&vocabulary, &[classified("/exams/x/A1.md", MaterialType::Exam)])
            .unwrap();
        db.persist(&vocabulary, &[classified("/exams/x/A1.md", MaterialType::Answer)])
            .unwrap();

        assert_eq!(count(&db, "subject"), 1);
        assert_eq!(count(&db, "file"), 1);
        assert_eq!(count(&db, "exam"), 0);
        assert_eq!(count(&db, "answer"), 1);
    }

    #[test]
    fn test_unknown_subject_rolls_back_everything() {
        let mut db = Database::open_in_memory().unwrap();
        let vocabulary = SubjectVocabulary::new(["Chemie"]);
        let mut stray = classified("/exams/y/B1.md", MaterialType::Exam);
        stray.subject_name = "Alchemie".to_string();

        let err = db
            .persist(
                &vocabulary,
                &[classified("/exams/x/A1.md", MaterialType::Exam), stray],
            )
            .unwrap_err();

        assert!(matches!(err, PersistenceError::UnknownSubject { .. }));
        assert_eq!(count(&db, "subject"), 0);
        assert_eq!(count(&db, "file"), 0);
        assert_eq!(count(&db, "exam"), 0);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        Database::open(&path).unwrap();
        Database::open(&path).unwrap();
    }
}
