//! Database Connection Management
//!
//! This module provides the core database connection and initialization
//! functionality using libsql/Turso for Blocktree's block storage.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS`, no migrations
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: Enabled on every connection; block deletion cascades
//!   to subtrees, permissions and link edges
//! - **JSON operators**: Native SQLite JSON support for the `data` column
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions** to avoid SQLite
//! thread-safety violations when the Tokio runtime moves futures between
//! threads. The 5-second busy timeout allows concurrent operations to wait
//! and retry instead of failing immediately with `SQLITE_BUSY` errors.
//!
//! Use `connect()` only in single-threaded, synchronous contexts where the
//! connection will not be used across await points.

use crate::db::error::DatabaseError;
use crate::db::plan::ImportPlan;
use crate::models::{Block, ChildOrder, CHILD_ORDER_KEY};
use libsql::{Builder, Database};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Names of the permission levels that authorize mutation, as a SQL list.
const MUTATING_PERMISSIONS_SQL: &str = "('edit', 'edit_ac', 'delete')";

/// Maximum number of bound variables per statement (SQLite default is 999).
const SQL_VAR_CHUNK: usize = 500;

/// Raw column values of one `blocks` row: id, title, data, parent_id,
/// creator_id. Rows are decoded inside the result loop because a
/// `libsql::Row` reads from the statement cursor and goes stale once
/// iteration moves past it.
pub type BlockColumns = (String, Option<String>, String, Option<String>, i64);

/// Database service for managing libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use blocktree_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/blocktree.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database connection (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys, JSON support)
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the database file
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        // Checkpoint is only needed for databases created by this call
        let is_new_database = !db_path.exists();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Get a synchronous connection (no busy timeout configured)
    ///
    /// Use only in single-threaded contexts; async code should go through
    /// `connect_with_timeout()`.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout and foreign keys configured
    ///
    /// Sets a 5-second busy timeout so concurrent operations wait and retry
    /// instead of failing immediately when the database is locked, and turns
    /// foreign keys on so block deletion cascades. Both pragmas are
    /// per-connection in SQLite, so every connection must set them.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of
    /// execute(). This helper encapsulates that pattern.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates tables and indexes using CREATE TABLE IF NOT EXISTS,
    /// ensuring idempotent initialization (safe to call multiple times).
    ///
    /// # Schema
    ///
    /// - `blocks`: tree nodes with a JSON `data` payload
    /// - `block_permissions`: per-user grants, unique per (block, user)
    /// - `block_links`: backlink edges for link blocks
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        // Enable WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                id TEXT PRIMARY KEY,
                title TEXT,
                data JSON NOT NULL DEFAULT '{}',
                parent_id TEXT,
                creator_id INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                -- Parent deletion cascades to the whole subtree
                FOREIGN KEY (parent_id) REFERENCES blocks(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create blocks table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS block_permissions (
                block_id TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                permission TEXT NOT NULL,
                PRIMARY KEY (block_id, user_id),
                FOREIGN KEY (block_id) REFERENCES blocks(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create block_permissions table: {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS block_links (
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                PRIMARY KEY (source_id, target_id),
                FOREIGN KEY (source_id) REFERENCES blocks(id) ON DELETE CASCADE,
                FOREIGN KEY (target_id) REFERENCES blocks(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create block_links table: {}", e))
        })?;

        self.create_core_indexes(&conn).await?;

        // Flush schema to disk for newly created databases so rapid
        // open/close cycles in tests never observe missing tables.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create core indexes
    ///
    /// These indexes never change, so no ALTER TABLE is ever required.
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        // Hierarchy queries
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_blocks_parent ON blocks(parent_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_blocks_parent': {}",
                e
            ))
        })?;

        // Authorized-set lookup by user
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_permissions_user ON block_permissions(user_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_permissions_user': {}",
                e
            ))
        })?;

        // Edge replacement by link block
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_links_target ON block_links(target_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_links_target': {}",
                e
            ))
        })?;

        Ok(())
    }

    //
    // BLOCK STORE OPERATIONS
    // These methods contain the SQL logic wrapped by the BlockStore trait
    // implementation in TursoStore.
    //

    /// Insert a block into the database
    ///
    /// created_at and updated_at are set by the database.
    pub async fn db_create_block(&self, block: &Block) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        Self::insert_block(&conn, block).await
    }

    async fn insert_block(conn: &libsql::Connection, block: &Block) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO blocks (id, title, data, parent_id, creator_id)
             VALUES (?, ?, ?, ?, ?)",
            (
                block.id.to_string(),
                block.title.clone(),
                block.data.to_string(),
                block.parent_id.map(|p| p.to_string()),
                block.creator_id,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert block: {}", e)))?;

        Ok(())
    }

    /// Retrieve a single block's column values by id
    ///
    /// Returns the decoded columns; TursoStore converts them to the model.
    pub async fn db_get_block(&self, id: &str) -> Result<Option<BlockColumns>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, title, data, parent_id, creator_id
                 FROM blocks WHERE id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare get_block query: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_block query: {}", e))
        })?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        else {
            return Ok(None);
        };
        Ok(Some(Self::decode_block_row(&row)?))
    }

    /// Overwrite a block's title, data and parent
    pub async fn db_update_block(&self, block: &Block) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "UPDATE blocks
             SET title = ?, data = ?, parent_id = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            (
                block.title.clone(),
                block.data.to_string(),
                block.parent_id.map(|p| p.to_string()),
                block.id.to_string(),
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to update block: {}", e)))?;

        Ok(())
    }

    /// List the direct children of a block, oldest first
    pub async fn db_list_children(
        &self,
        parent_id: &str,
    ) -> Result<Vec<BlockColumns>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, title, data, parent_id, creator_id
                 FROM blocks WHERE parent_id = ?
                 ORDER BY created_at, id",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare list_children: {}", e))
            })?;

        let mut rows = stmt.query([parent_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute list_children: {}", e))
        })?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            out.push(Self::decode_block_row(&row)?);
        }
        Ok(out)
    }

    /// Fetch the stored column values for a set of block ids
    ///
    /// Ids absent from the database are silently missing from the result.
    /// Queries are chunked to stay under the SQLite bound-variable limit.
    pub async fn db_load_projection(
        &self,
        ids: &[String],
    ) -> Result<Vec<BlockColumns>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut out = Vec::new();

        for chunk in ids.chunks(SQL_VAR_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT id, title, data, parent_id, creator_id
                 FROM blocks WHERE id IN ({})",
                placeholders
            );

            let mut stmt = conn.prepare(&sql).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare projection query: {}", e))
            })?;

            let mut rows = stmt
                .query(libsql::params_from_iter(chunk.iter().cloned()))
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to execute projection query: {}",
                        e
                    ))
                })?;

            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            {
                out.push(Self::decode_block_row(&row)?);
            }
        }

        Ok(out)
    }

    /// Decode the typed column values out of a `blocks` row
    fn decode_block_row(row: &libsql::Row) -> Result<BlockColumns, DatabaseError> {
        let id: String = row.get(0).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to read id column: {}", e))
        })?;
        let title: Option<String> = row.get(1).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to read title column: {}", e))
        })?;
        let data: String = row.get(2).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to read data column: {}", e))
        })?;
        let parent_id: Option<String> = row.get(3).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to read parent_id column: {}", e))
        })?;
        let creator_id: i64 = row.get(4).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to read creator_id column: {}", e))
        })?;
        Ok((id, title, data, parent_id, creator_id))
    }

    /// List the blocks a user may mutate, as `(id, parent_id)` pairs
    ///
    /// A block qualifies when the user holds an `edit`, `edit_ac` or `delete`
    /// grant on it.
    pub async fn db_load_authorized(
        &self,
        user_id: i64,
    ) -> Result<Vec<(String, Option<String>)>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let sql = format!(
            "SELECT b.id, b.parent_id
             FROM blocks b
             JOIN block_permissions p ON p.block_id = b.id
             WHERE p.user_id = ? AND p.permission IN {}",
            MUTATING_PERMISSIONS_SQL
        );

        let mut stmt = conn.prepare(&sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare authorized query: {}", e))
        })?;

        let mut rows = stmt.query([user_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute authorized query: {}", e))
        })?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
            let parent_id: Option<String> = row
                .get(1)
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
            out.push((id, parent_id));
        }
        Ok(out)
    }

    /// Upsert a single permission grant
    pub async fn db_grant_permission(
        &self,
        block_id: &str,
        user_id: i64,
        permission: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        Self::upsert_permission(&conn, block_id, user_id, permission).await
    }

    async fn upsert_permission(
        conn: &libsql::Connection,
        block_id: &str,
        user_id: i64,
        permission: &str,
    ) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO block_permissions (block_id, user_id, permission)
             VALUES (?, ?, ?)
             ON CONFLICT(block_id, user_id) DO UPDATE SET permission = excluded.permission",
            (block_id, user_id, permission),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to upsert permission: {}", e)))?;

        Ok(())
    }

    /// List the permission grants on a block as `(user_id, permission)` pairs
    pub async fn db_list_permissions(
        &self,
        block_id: &str,
    ) -> Result<Vec<(i64, String)>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT user_id, permission FROM block_permissions
                 WHERE block_id = ? ORDER BY user_id",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare permissions query: {}", e))
            })?;

        let mut rows = stmt.query([block_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute permissions query: {}", e))
        })?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let user_id: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
            let permission: String = row
                .get(1)
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
            out.push((user_id, permission));
        }
        Ok(out)
    }

    /// Whether a link edge exists between a source block and a link block
    pub async fn db_link_exists(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<bool, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare("SELECT 1 FROM block_links WHERE source_id = ? AND target_id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare link query: {}", e))
            })?;

        let mut rows = stmt.query((source_id, target_id)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute link query: {}", e))
        })?;

        Ok(rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            .is_some())
    }

    //
    // IMPORT PLAN APPLICATION
    //

    /// Apply a staged import plan in a single transaction
    ///
    /// Either every staged mutation lands or none does. Any failure rolls the
    /// transaction back and surfaces as an error; the caller records it in
    /// the report instead of propagating.
    pub async fn db_apply_import(&self, plan: &ImportPlan) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN TRANSACTION", ())
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to begin import: {}", e)))?;

        match Self::apply_import_steps(&conn, plan).await {
            Ok(()) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to commit import: {}", e))
                })?;
                Ok(())
            }
            Err(e) => {
                // Best effort; the connection is dropped either way
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    /// The ordered write steps of an import transaction
    ///
    /// 1. Insert creates, parents before children within the batch
    /// 2. Append staged children to external parents' childOrder
    /// 3. Strip relocated children from old external parents' childOrder
    /// 4. Re-point parent_id of claimed external children
    /// 5. Bulk-update the update set (title/data/parent)
    /// 6. Upsert permission grants
    /// 7. Upsert link edges, replacing any previous edge for the target
    /// 8. Delete scheduled blocks (FK cascade removes subtrees)
    async fn apply_import_steps(
        conn: &libsql::Connection,
        plan: &ImportPlan,
    ) -> Result<(), DatabaseError> {
        // 1. Creates. The cycle check upstream guarantees an ordering exists.
        let create_ids: HashSet<Uuid> = plan.create.iter().map(|b| b.id).collect();
        let mut inserted: HashSet<Uuid> = HashSet::new();
        let mut pending: Vec<&Block> = plan.create.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for block in pending {
                let waiting_on_parent = block
                    .parent_id
                    .is_some_and(|p| create_ids.contains(&p) && !inserted.contains(&p));
                if waiting_on_parent {
                    deferred.push(block);
                    continue;
                }
                Self::insert_block(conn, block).await?;
                inserted.insert(block.id);
            }
            if deferred.len() == before {
                return Err(DatabaseError::sql_execution(
                    "Unresolvable parent ordering in create set".to_string(),
                ));
            }
            pending = deferred;
        }

        // 2. Order appends on external parents
        for patch in &plan.order_appends {
            let parent = patch.parent_id.to_string();
            let child = patch.child_id.to_string();
            let Some(mut data) = Self::read_data(conn, &parent).await? else {
                continue;
            };
            match ChildOrder::of(&data) {
                // A malformed stored order is tolerated and left alone
                ChildOrder::Invalid => continue,
                ChildOrder::Entries(ref items) if items.contains(&child) => continue,
                order => {
                    let mut entries = match order {
                        ChildOrder::Entries(items) => items,
                        _ => Vec::new(),
                    };
                    entries.push(child);
                    if Self::set_order_entries(&mut data, entries) {
                        Self::write_data(conn, &parent, &data).await?;
                    }
                }
            }
        }

        // 3. Order removals on old external parents
        for patch in &plan.order_removals {
            let parent = patch.parent_id.to_string();
            let child = patch.child_id.to_string();
            let Some(mut data) = Self::read_data(conn, &parent).await? else {
                continue;
            };
            if let ChildOrder::Entries(items) = ChildOrder::of(&data) {
                if !items.contains(&child) {
                    continue;
                }
                let entries: Vec<String> = items.into_iter().filter(|c| *c != child).collect();
                if Self::set_order_entries(&mut data, entries) {
                    Self::write_data(conn, &parent, &data).await?;
                }
            }
        }

        // 4. Reparent claimed external children
        for reparent in &plan.reparent {
            conn.execute(
                "UPDATE blocks SET parent_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                (
                    reparent.new_parent_id.to_string(),
                    reparent.child_id.to_string(),
                ),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to reparent block: {}", e))
            })?;
        }

        // 5. Updates
        for update in &plan.update {
            conn.execute(
                "UPDATE blocks
                 SET title = ?, data = ?, parent_id = ?, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?",
                (
                    update.title.clone(),
                    update.data.to_string(),
                    update.parent_id.map(|p| p.to_string()),
                    update.id.to_string(),
                ),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to update block: {}", e)))?;
        }

        // 6. Permissions
        for perm in &plan.permissions {
            Self::upsert_permission(
                conn,
                &perm.block_id.to_string(),
                perm.user_id,
                perm.permission.as_str(),
            )
            .await?;
        }

        // 7. Links. A link block points at exactly one source, so any
        // previous edge for the target is replaced.
        for link in &plan.links {
            conn.execute(
                "DELETE FROM block_links WHERE target_id = ?",
                [link.target_id.to_string()],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to clear link edge: {}", e))
            })?;
            conn.execute(
                "INSERT INTO block_links (source_id, target_id) VALUES (?, ?)",
                (link.source_id.to_string(), link.target_id.to_string()),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to insert link edge: {}", e))
            })?;
        }

        // 8. Deletes
        for id in &plan.delete {
            conn.execute("DELETE FROM blocks WHERE id = ?", [id.to_string()])
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to delete block: {}", e))
                })?;
        }

        Ok(())
    }

    /// Read a block's `data` column inside a transaction
    async fn read_data(
        conn: &libsql::Connection,
        id: &str,
    ) -> Result<Option<Value>, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT data FROM blocks WHERE id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare data read: {}", e))
            })?;

        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute data read: {}", e))
        })?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        else {
            return Ok(None);
        };

        let raw: String = row
            .get(0)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Write a block's `data` column inside a transaction
    async fn write_data(
        conn: &libsql::Connection,
        id: &str,
        data: &Value,
    ) -> Result<(), DatabaseError> {
        conn.execute(
            "UPDATE blocks SET data = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            (data.to_string(), id),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to write data column: {}", e)))?;

        Ok(())
    }

    /// Replace the childOrder entries in a data payload
    ///
    /// Returns false when the payload is not an object (left untouched).
    fn set_order_entries(data: &mut Value, entries: Vec<String>) -> bool {
        match data {
            Value::Object(map) => {
                map.insert(
                    CHILD_ORDER_KEY.to_string(),
                    Value::Array(entries.into_iter().map(Value::String).collect()),
                );
                true
            }
            _ => false,
        }
    }
}
