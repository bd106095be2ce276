//! Repository layer for database operations.

use super::store::{StateStore, StoreError};
use crate::domain::{Amount, ProfitEvent, ReconciliationState, Timestamp};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const STATE_ID: &str = "singleton";

/// SQLite-backed [`StateStore`].
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert_state(
        tx: &mut Transaction<'_, Sqlite>,
        state: &ReconciliationState,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_state (
                id, previous_commit_timestamp, previous_processed_value,
                previous_processed_observed_at, high_water_mark, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                previous_commit_timestamp = excluded.previous_commit_timestamp,
                previous_processed_value = excluded.previous_processed_value,
                previous_processed_observed_at = excluded.previous_processed_observed_at,
                high_water_mark = excluded.high_water_mark,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(STATE_ID)
        .bind(state.previous_commit_timestamp.as_secs())
        .bind(state.previous_processed_value.to_string())
        .bind(state.previous_processed_observed_at.as_secs())
        .bind(state.high_water_mark.map(|m| m.to_string()))
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_event(
        tx: &mut Transaction<'_, Sqlite>,
        event: &ProfitEvent,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO profit_events (
                id, observed_at, profit_total, profit_investors, profit_performance_fee,
                fee_withdrawn, reconciliation_timestamp, commit_reference, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.observed_at.as_secs())
        .bind(event.profit_total.to_string())
        .bind(event.profit_investors.to_string())
        .bind(event.profit_performance_fee.to_string())
        .bind(event.fee_withdrawn)
        .bind(event.reconciliation_timestamp.map(|t| t.as_secs()))
        .bind(event.commit_reference.as_deref())
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn parse_amount(row: &SqliteRow, column: &str) -> Result<Amount, StoreError> {
    let raw: String = row.try_get(column)?;
    Amount::from_str(&raw).map_err(|e| StoreError::Corrupt(format!("{}: {}", column, e)))
}

fn state_from_row(row: &SqliteRow) -> Result<ReconciliationState, StoreError> {
    let high_water_mark: Option<String> = row.try_get("high_water_mark")?;
    let high_water_mark = high_water_mark
        .map(|raw| {
            Amount::from_str(&raw)
                .map_err(|e| StoreError::Corrupt(format!("high_water_mark: {}", e)))
        })
        .transpose()?;

    Ok(ReconciliationState {
        previous_processed_value: parse_amount(row, "previous_processed_value")?,
        previous_processed_observed_at: Timestamp::new(
            row.try_get("previous_processed_observed_at")?,
        ),
        previous_commit_timestamp: Timestamp::new(row.try_get("previous_commit_timestamp")?),
        high_water_mark,
    })
}

fn event_from_row(row: &SqliteRow) -> Result<ProfitEvent, StoreError> {
    let id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(format!("id: {}", e)))?;
    let reconciliation_timestamp: Option<i64> = row.try_get("reconciliation_timestamp")?;

    Ok(ProfitEvent {
        id,
        observed_at: Timestamp::new(row.try_get("observed_at")?),
        profit_total: parse_amount(row, "profit_total")?,
        profit_investors: parse_amount(row, "profit_investors")?,
        profit_performance_fee: parse_amount(row, "profit_performance_fee")?,
        fee_withdrawn: row.try_get("fee_withdrawn")?,
        reconciliation_timestamp: reconciliation_timestamp.map(Timestamp::new),
        commit_reference: row.try_get("commit_reference")?,
    })
}

#[async_trait]
impl StateStore for Repository {
    async fn get(&self) -> Result<Option<ReconciliationState>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT previous_commit_timestamp, previous_processed_value,
                   previous_processed_observed_at, high_water_mark
            FROM reconciliation_state
            WHERE id = ?
            "#,
        )
        .bind(STATE_ID)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(state_from_row).transpose()
    }

    async fn put(&self, state: &ReconciliationState) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_state(&mut tx, state).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn append_profit_event(&self, event: &ProfitEvent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM reconciliation_state WHERE id = ?")
            .bind(STATE_ID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_cycle(
        &self,
        state: &ReconciliationState,
        event: Option<&ProfitEvent>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        if let Some(event) = event {
            Self::insert_event(&mut tx, event).await?;
        }
        Self::upsert_state(&mut tx, state).await?;
        tx.commit().await?;
        debug!(
            processed = %state.previous_processed_value,
            with_event = event.is_some(),
            "cycle recorded"
        );
        Ok(())
    }

    async fn list_profit_events(&self, pending_only: bool) -> Result<Vec<ProfitEvent>, StoreError> {
        let sql = if pending_only {
            r#"
            SELECT id, observed_at, profit_total, profit_investors, profit_performance_fee,
                   fee_withdrawn, reconciliation_timestamp, commit_reference
            FROM profit_events
            WHERE fee_withdrawn = 0
            ORDER BY observed_at ASC, created_at ASC
            "#
        } else {
            r#"
            SELECT id, observed_at, profit_total, profit_investors, profit_performance_fee,
                   fee_withdrawn, reconciliation_timestamp, commit_reference
            FROM profit_events
            ORDER BY observed_at ASC, created_at ASC
            "#
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn mark_fees_withdrawn(&self, ids: &[Uuid], at: Timestamp) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;
        for id in ids {
            let result = sqlx::query(
                r#"
                UPDATE profit_events
                SET fee_withdrawn = 1, reconciliation_timestamp = ?
                WHERE id = ? AND fee_withdrawn = 0
                "#,
            )
            .bind(at.as_secs())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(changed)
    }
}
