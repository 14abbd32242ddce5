//! PostgreSQL release table implementation.
//!
//! All release tables share one physical `releases` table, partitioned by a
//! `release_table` column. Every query is scoped to a single partition.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::config::DatabaseConfig;
use crate::error::{Collaborator, ReleaseError, ReleaseResult};

use super::{attr, Item, ReleaseTable};

/// Optional attributes stored as nullable columns.
const OPTIONAL_COLUMNS: [&str; 4] = [attr::BUILD, attr::ENV, attr::MANIFEST, attr::TASKS];

/// PostgreSQL-backed release tables.
#[derive(Clone)]
pub struct PostgresReleaseTable {
    pool: PgPool,
}

fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> ReleaseError {
    move |e| ReleaseError::dependency(Collaborator::MetadataStore, operation, e)
}

impl PostgresReleaseTable {
    /// Connect to PostgreSQL and create a new store.
    ///
    /// The required table is created if it doesn't exist.
    pub async fn connect(config: &DatabaseConfig) -> ReleaseResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(db_error("connect"))?;

        Self::from_pool(pool).await
    }

    /// Create a store from an existing connection pool.
    pub async fn from_pool(pool: PgPool) -> ReleaseResult<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> ReleaseResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS releases (
                release_table TEXT NOT NULL,
                id TEXT NOT NULL,
                cluster TEXT NOT NULL,
                app TEXT NOT NULL,
                created TEXT NOT NULL,
                build TEXT,
                env TEXT,
                manifest TEXT,
                tasks TEXT,
                PRIMARY KEY (release_table, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error("create table"))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_releases_app_created
            ON releases (release_table, app, created DESC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error("create index"))?;

        Ok(())
    }

    fn row_to_item(row: &PgRow) -> ReleaseResult<Item> {
        let mut item = Item::new();

        for column in [attr::ID, attr::CLUSTER, attr::APP, attr::CREATED] {
            let value: String = row.try_get(column).map_err(db_error("decode row"))?;
            item.insert(column.to_owned(), value);
        }

        for column in OPTIONAL_COLUMNS {
            let value: Option<String> = row.try_get(column).map_err(db_error("decode row"))?;
            if let Some(value) = value {
                item.insert(column.to_owned(), value);
            }
        }

        Ok(item)
    }
}

impl std::fmt::Debug for PostgresReleaseTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresReleaseTable").finish_non_exhaustive()
    }
}

fn required<'a>(item: &'a Item, name: &str) -> ReleaseResult<&'a str> {
    item.get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ReleaseError::validation(format!("item has no {name}")))
}

#[async_trait]
impl ReleaseTable for PostgresReleaseTable {
    async fn get(&self, table: &str, id: &str) -> ReleaseResult<Option<Item>> {
        let row = sqlx::query(
            r#"
            SELECT id, cluster, app, created, build, env, manifest, tasks
            FROM releases
            WHERE release_table = $1 AND id = $2
            "#,
        )
        .bind(table)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get item"))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn query_app(&self, table: &str, app: &str, limit: usize) -> ReleaseResult<Vec<Item>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT id, cluster, app, created, build, env, manifest, tasks
            FROM releases
            WHERE release_table = $1 AND app = $2
            ORDER BY created DESC
            LIMIT $3
            "#,
        )
        .bind(table)
        .bind(app)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("query items"))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn put(&self, table: &str, item: Item) -> ReleaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO releases (
                release_table, id, cluster, app, created, build, env, manifest, tasks
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (release_table, id) DO UPDATE SET
                cluster = EXCLUDED.cluster,
                app = EXCLUDED.app,
                created = EXCLUDED.created,
                build = EXCLUDED.build,
                env = EXCLUDED.env,
                manifest = EXCLUDED.manifest,
                tasks = EXCLUDED.tasks
            "#,
        )
        .bind(table)
        .bind(required(&item, attr::ID)?)
        .bind(required(&item, attr::CLUSTER)?)
        .bind(required(&item, attr::APP)?)
        .bind(required(&item, attr::CREATED)?)
        .bind(item.get(attr::BUILD).map(String::as_str))
        .bind(item.get(attr::ENV).map(String::as_str))
        .bind(item.get(attr::MANIFEST).map(String::as_str))
        .bind(item.get(attr::TASKS).map(String::as_str))
        .execute(&self.pool)
        .await
        .map_err(db_error("put item"))?;

        Ok(())
    }
}
