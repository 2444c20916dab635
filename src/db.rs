use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use uuid::Uuid;

pub type DbPool = Pool<Sqlite>;

/// Creates the SQLite connection pool.
///
/// WAL journaling is enabled for file-backed databases so an `INSERT` is on
/// disk before `append` acknowledges. In-memory databases (tests) skip WAL
/// and must use a single connection, since each connection would otherwise
/// open its own empty database.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL: {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    if !in_memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { max_connections })
        .connect_with(options)
        .await
        .context("failed to connect to database")?;

    Ok(pool)
}

/// Creates tables and indexes if they do not exist yet.
///
/// The `users` and `items` tables belong to the identity and catalog
/// collaborators; the messaging core only reads them through the directory
/// traits. The message log is indexed by participant and by pair so history,
/// inbox and conversation queries never scan the full log.
pub async fn init_schema(pool: &DbPool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            FOREIGN KEY (owner_id) REFERENCES users (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            item_ref INTEGER,
            text TEXT NOT NULL,
            sent_at INTEGER NOT NULL,
            FOREIGN KEY (sender_id) REFERENCES users (id),
            FOREIGN KEY (receiver_id) REFERENCES users (id),
            FOREIGN KEY (item_ref) REFERENCES items (id)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_messages_sender_time ON messages (sender_id, sent_at)",
        "CREATE INDEX IF NOT EXISTS idx_messages_receiver_time ON messages (receiver_id, sent_at)",
        "CREATE INDEX IF NOT EXISTS idx_messages_pair_time ON messages (sender_id, receiver_id, sent_at)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to initialize schema")?;
    }

    Ok(())
}

/// Registers a user in the identity collaborator's table.
/// Account creation itself lives outside the messaging core; this is the
/// narrow write that deployments and tests use to seed identities.
pub async fn create_user(pool: &DbPool, username: &str) -> Result<Uuid> {
    let user_id = Uuid::new_v4();

    sqlx::query("INSERT INTO users (id, username) VALUES (?1, ?2)")
        .bind(user_id.to_string())
        .bind(username)
        .execute(pool)
        .await
        .with_context(|| format!("failed to create user {}", username))?;

    Ok(user_id)
}

/// Registers a catalog item owned by `owner_id`, returning its id.
pub async fn create_item(pool: &DbPool, title: &str, owner_id: Uuid) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO items (title, owner_id) VALUES (?1, ?2) RETURNING id",
    )
    .bind(title)
    .bind(owner_id.to_string())
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to create item {}", title))?;

    Ok(id)
}
