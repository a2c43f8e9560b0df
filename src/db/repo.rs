//! Repository layer for snapshot persistence.

use crate::domain::{
    Address, Category, CategoryExposure, Decimal, PositionSnapshot, TimeMs,
};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Insert a snapshot and its category rows idempotently.
    ///
    /// Returns true if the snapshot was new, false if a snapshot with the
    /// same key was already stored (in which case nothing is written —
    /// stored snapshots are immutable).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_snapshot(
        &self,
        snapshot: &PositionSnapshot,
    ) -> Result<bool, sqlx::Error> {
        let snapshot_key = snapshot.snapshot_key();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO snapshots
                (snapshot_key, run_id, account, time_ms, net_delta,
                 lp_fee_apr, funding_apr, net_apr, needs_rebalance)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(snapshot_key) DO NOTHING
            "#,
        )
        .bind(&snapshot_key)
        .bind(&snapshot.run_id)
        .bind(snapshot.account.as_str())
        .bind(snapshot.time_ms.as_ms())
        .bind(snapshot.net_delta().to_canonical_string())
        .bind(snapshot.lp_fee_apr.to_canonical_string())
        .bind(snapshot.funding_apr.to_canonical_string())
        .bind(snapshot.net_apr.to_canonical_string())
        .bind(snapshot.needs_rebalance)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(false);
        }

        for (category, exposure) in &snapshot.categories {
            sqlx::query(
                r#"
                INSERT INTO snapshot_categories (snapshot_key, category, delta, usd_value)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&snapshot_key)
            .bind(category.as_str())
            .bind(exposure.delta.to_canonical_string())
            .bind(exposure.usd_value.to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Query snapshots for an account within an optional time range,
    /// ordered by time ascending.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_snapshots(
        &self,
        account: &Address,
        from_ms: Option<TimeMs>,
        to_ms: Option<TimeMs>,
    ) -> Result<Vec<PositionSnapshot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT snapshot_key, run_id, account, time_ms, net_delta,
                   lp_fee_apr, funding_apr, net_apr, needs_rebalance
            FROM snapshots
            WHERE account = ? AND time_ms >= ? AND time_ms <= ?
            ORDER BY time_ms ASC, snapshot_key ASC
            "#,
        )
        .bind(account.as_str())
        .bind(from_ms.map(|t| t.as_ms()).unwrap_or(0))
        .bind(to_ms.map(|t| t.as_ms()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in rows {
            snapshots.push(self.hydrate_snapshot(&row).await?);
        }
        Ok(snapshots)
    }

    /// The most recent snapshot for an account, if any.
    pub async fn latest_snapshot(
        &self,
        account: &Address,
    ) -> Result<Option<PositionSnapshot>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT snapshot_key, run_id, account, time_ms, net_delta,
                   lp_fee_apr, funding_apr, net_apr, needs_rebalance
            FROM snapshots
            WHERE account = ?
            ORDER BY time_ms DESC, snapshot_key DESC
            LIMIT 1
            "#,
        )
        .bind(account.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_snapshot(&row).await?)),
            None => Ok(None),
        }
    }

    /// Count of stored snapshots for an account.
    pub async fn count_snapshots(&self, account: &Address) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM snapshots WHERE account = ?")
            .bind(account.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("cnt"))
    }

    /// Rebuild a domain snapshot from its row plus its category rows.
    async fn hydrate_snapshot(
        &self,
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<PositionSnapshot, sqlx::Error> {
        let snapshot_key: String = row.get("snapshot_key");
        let run_id: String = row.get("run_id");
        let account: String = row.get("account");
        let time_ms: i64 = row.get("time_ms");
        let lp_fee_apr = parse_decimal_column(row, "lp_fee_apr", &snapshot_key);
        let funding_apr = parse_decimal_column(row, "funding_apr", &snapshot_key);
        let net_apr = parse_decimal_column(row, "net_apr", &snapshot_key);
        let needs_rebalance: bool = row.get("needs_rebalance");

        let category_rows = sqlx::query(
            r#"
            SELECT category, delta, usd_value
            FROM snapshot_categories
            WHERE snapshot_key = ?
            ORDER BY category ASC
            "#,
        )
        .bind(&snapshot_key)
        .fetch_all(&self.pool)
        .await?;

        let mut categories = BTreeMap::new();
        for category_row in &category_rows {
            let name: String = category_row.get("category");
            let category = match Category::from_str(&name) {
                Ok(category) => category,
                Err(e) => {
                    warn!(snapshot_key = %snapshot_key, error = %e, "Skipping unknown category row");
                    continue;
                }
            };
            categories.insert(
                category,
                CategoryExposure {
                    delta: parse_decimal_column(category_row, "delta", &snapshot_key),
                    usd_value: parse_decimal_column(category_row, "usd_value", &snapshot_key),
                },
            );
        }

        // net_delta is re-derived from the category rows; the write path
        // stores them consistently, so the stored column is redundant.
        Ok(PositionSnapshot::from_parts(
            Address::new(account),
            TimeMs::new(time_ms),
            run_id,
            categories,
            lp_fee_apr,
            funding_apr,
            net_apr,
            needs_rebalance,
        ))
    }
}

fn parse_decimal_column(row: &sqlx::sqlite::SqliteRow, column: &str, key: &str) -> Decimal {
    let text: String = row.get(column);
    Decimal::from_str(&text).unwrap_or_else(|e| {
        warn!(
            snapshot_key = %key,
            column = column,
            value = %text,
            error = %e,
            "Failed to parse stored decimal, using zero"
        );
        Decimal::zero()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn sample_snapshot(account: &str, time_ms: i64) -> PositionSnapshot {
        let mut categories = BTreeMap::new();
        categories.insert(
            Category::Lp,
            CategoryExposure {
                delta: d("10"),
                usd_value: d("64"),
            },
        );
        categories.insert(
            Category::Perp,
            CategoryExposure {
                delta: d("-9.5"),
                usd_value: d("30.4"),
            },
        );
        PositionSnapshot::from_parts(
            Address::new(account.to_string()),
            TimeMs::new(time_ms),
            "run-1".to_string(),
            categories,
            d("0.12"),
            d("0.06"),
            d("0.1"),
            false,
        )
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let (repo, _temp) = setup_repo().await;
        let snapshot = sample_snapshot("0xabc", 1000);

        let inserted = repo.insert_snapshot(&snapshot).await.unwrap();
        assert!(inserted);

        let account = Address::new("0xabc".to_string());
        let stored = repo.query_snapshots(&account, None, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], snapshot);
        assert_eq!(stored[0].net_delta(), d("0.5"));
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let (repo, _temp) = setup_repo().await;
        let snapshot = sample_snapshot("0xabc", 1000);

        assert!(repo.insert_snapshot(&snapshot).await.unwrap());
        assert!(!repo.insert_snapshot(&snapshot).await.unwrap());

        let account = Address::new("0xabc".to_string());
        assert_eq!(repo.count_snapshots(&account).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_respects_time_range() {
        let (repo, _temp) = setup_repo().await;
        for time_ms in [1000, 2000, 3000] {
            repo.insert_snapshot(&sample_snapshot("0xabc", time_ms))
                .await
                .unwrap();
        }

        let account = Address::new("0xabc".to_string());
        let stored = repo
            .query_snapshots(&account, Some(TimeMs::new(1500)), Some(TimeMs::new(2500)))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].time_ms, TimeMs::new(2000));
    }

    #[tokio::test]
    async fn test_query_filters_by_account() {
        let (repo, _temp) = setup_repo().await;
        repo.insert_snapshot(&sample_snapshot("0xabc", 1000))
            .await
            .unwrap();
        repo.insert_snapshot(&sample_snapshot("0xdef", 1000))
            .await
            .unwrap();

        let account = Address::new("0xabc".to_string());
        let stored = repo.query_snapshots(&account, None, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].account, account);
    }

    #[tokio::test]
    async fn test_latest_snapshot() {
        let (repo, _temp) = setup_repo().await;
        let account = Address::new("0xabc".to_string());

        assert!(repo.latest_snapshot(&account).await.unwrap().is_none());

        for time_ms in [1000, 3000, 2000] {
            repo.insert_snapshot(&sample_snapshot("0xabc", time_ms))
                .await
                .unwrap();
        }

        let latest = repo.latest_snapshot(&account).await.unwrap().unwrap();
        assert_eq!(latest.time_ms, TimeMs::new(3000));
    }
}
