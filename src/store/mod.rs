pub mod model;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::Databases;
use crate::error::IngestError;
use model::{EmbeddingJob, HoldingsItem, Instrument, OrderEventRecord, QueueStatus};

/// Typed SQL entry point used by every stream worker and the embedding pump.
/// Wraps the two pools in `Databases` with the operations named in the data
/// model; callers never issue raw SQL of their own.
#[derive(Clone)]
pub struct StoreGateway {
    market: PgPool,
    private: PgPool,
}

impl StoreGateway {
    pub fn new(dbs: &Databases) -> Self {
        Self {
            market: dbs.market.clone(),
            private: dbs.private.clone(),
        }
    }

    pub async fn insert_order_book(
        &self,
        ticker: &str,
        class_code: &str,
        event_time: DateTime<Utc>,
        payload: &Value,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO order_book_snapshots (ticker, class_code, event_time, payload) VALUES ($1, $2, $3, $4)",
        )
        .bind(ticker)
        .bind(class_code)
        .bind(event_time)
        .bind(payload)
        .execute(&self.market)
        .await?;
        Ok(())
    }

    pub async fn insert_quotes(
        &self,
        ticker: &str,
        class_code: &str,
        event_time: DateTime<Utc>,
        payload: &Value,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO quotes (ticker, class_code, event_time, payload) VALUES ($1, $2, $3, $4)",
        )
        .bind(ticker)
        .bind(class_code)
        .bind(event_time)
        .bind(payload)
        .execute(&self.market)
        .await?;
        Ok(())
    }

    pub async fn insert_last_trades(
        &self,
        ticker: &str,
        class_code: &str,
        event_time: DateTime<Utc>,
        payload: &Value,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO last_trades (ticker, class_code, event_time, payload) VALUES ($1, $2, $3, $4)",
        )
        .bind(ticker)
        .bind(class_code)
        .bind(event_time)
        .bind(payload)
        .execute(&self.market)
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_candle(
        &self,
        ticker: &str,
        class_code: &str,
        time_frame: &str,
        event_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        payload: &Value,
    ) -> Result<(), IngestError> {
        sqlx::query(
            r#"INSERT INTO candles
               (ticker, class_code, time_frame, event_time, open, high, low, close, volume, payload)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(ticker)
        .bind(class_code)
        .bind(time_frame)
        .bind(event_time)
        .bind(open)
        .bind(high)
        .bind(low)
        .bind(close)
        .bind(volume)
        .bind(payload)
        .execute(&self.market)
        .await?;
        Ok(())
    }

    /// Returns the instruments an operator pinned for streaming, used when
    /// `use_db_instruments` is set instead of the static env-var list.
    pub async fn fetch_selected_assets(&self) -> Result<Vec<Instrument>, IngestError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT ticker, class_code FROM selected_assets")
                .fetch_all(&self.private)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(ticker, class_code)| Instrument::new(ticker, class_code))
            .collect())
    }

    pub async fn insert_holdings_snapshot(
        &self,
        account: &str,
        payload: &Value,
    ) -> Result<(), IngestError> {
        sqlx::query("INSERT INTO holdings_snapshots (account, payload) VALUES ($1, $2)")
            .bind(account)
            .bind(payload)
            .execute(&self.private)
            .await?;
        Ok(())
    }

    pub async fn upsert_holdings_current(&self, item: &HoldingsItem) -> Result<(), IngestError> {
        sqlx::query(
            r#"INSERT INTO holdings_current (account, ticker, class_code, quantity, avg_price, currency, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, now())
               ON CONFLICT (account, ticker, class_code) DO UPDATE SET
                 quantity = EXCLUDED.quantity,
                 avg_price = EXCLUDED.avg_price,
                 currency = EXCLUDED.currency,
                 updated_at = now()"#,
        )
        .bind(&item.account)
        .bind(&item.ticker)
        .bind(&item.class_code)
        .bind(item.quantity)
        .bind(item.avg_price)
        .bind(&item.currency)
        .execute(&self.private)
        .await?;
        Ok(())
    }

    pub async fn insert_order_event(
        &self,
        event: &OrderEventRecord,
        transaction_time: Option<DateTime<Utc>>,
    ) -> Result<(), IngestError> {
        sqlx::query(
            r#"INSERT INTO order_events
               (original_client_order_id, client_order_id, order_status, execution_type, ticker, class_code, transaction_time, payload)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(&event.original_client_order_id)
        .bind(&event.client_order_id)
        .bind(&event.order_status)
        .bind(&event.execution_type)
        .bind(&event.ticker)
        .bind(&event.class_code)
        .bind(transaction_time)
        .bind(&event.raw)
        .execute(&self.private)
        .await?;
        Ok(())
    }

    pub async fn insert_limits_snapshot(
        &self,
        account: &str,
        payload: &Value,
    ) -> Result<(), IngestError> {
        sqlx::query("INSERT INTO limits_snapshots (account, payload) VALUES ($1, $2)")
            .bind(account)
            .bind(payload)
            .execute(&self.private)
            .await?;
        Ok(())
    }

    pub async fn insert_marginal_snapshot(
        &self,
        account: &str,
        payload: &Value,
    ) -> Result<(), IngestError> {
        sqlx::query("INSERT INTO marginal_indicators_snapshots (account, payload) VALUES ($1, $2)")
            .bind(account)
            .bind(payload)
            .execute(&self.private)
            .await?;
        Ok(())
    }

    /// Leases up to `limit` pending rows for processing using
    /// `FOR UPDATE SKIP LOCKED`, so multiple pump instances can drain the
    /// same queue without double-processing a row (spec §4.4, §8.5).
    pub async fn fetch_embedding_batch(
        &self,
        limit: i64,
    ) -> Result<Vec<EmbeddingJob>, IngestError> {
        let mut tx = self.private.begin().await?;

        let rows: Vec<(Uuid, String, String, String, Value)> = sqlx::query_as(
            r#"SELECT id, entity_type, entity_id, text, metadata
               FROM embedding_queue
               WHERE status = $1
               ORDER BY created_at
               FOR UPDATE SKIP LOCKED
               LIMIT $2"#,
        )
        .bind(QueueStatus::Pending.as_db_str())
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.0).collect();
        if !ids.is_empty() {
            sqlx::query(
                "UPDATE embedding_queue SET status = $1, updated_at = now() WHERE id = ANY($2)",
            )
            .bind(QueueStatus::Processing.as_db_str())
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|(id, entity_type, entity_id, text, metadata)| EmbeddingJob {
                id: id.to_string(),
                entity_type,
                entity_id,
                text,
                metadata,
            })
            .collect())
    }

    /// Appends a new row to the embedding queue with status `pending`.
    pub async fn enqueue_embedding(
        &self,
        entity_type: &str,
        entity_id: &str,
        text: &str,
        metadata: &Value,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO embedding_queue (entity_type, entity_id, text, metadata) VALUES ($1, $2, $3, $4)",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(text)
        .bind(metadata)
        .execute(&self.private)
        .await?;
        Ok(())
    }

    /// Inserts the embedding row and marks the source queue row `done`, in
    /// one transaction.
    pub async fn store_embedding(
        &self,
        queue_id: &str,
        entity_type: &str,
        entity_id: &str,
        vector_text: &str,
        metadata: &Value,
    ) -> Result<(), IngestError> {
        let id = parse_queue_id(queue_id)?;
        let mut tx = self.private.begin().await?;

        sqlx::query(
            r#"INSERT INTO embeddings (entity_type, entity_id, vector, metadata)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (entity_type, entity_id) DO UPDATE SET
                 vector = EXCLUDED.vector,
                 metadata = EXCLUDED.metadata,
                 created_at = now()"#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(vector_text)
        .bind(metadata)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE embedding_queue SET status = $1, updated_at = now() WHERE id = $2",
        )
        .bind(QueueStatus::Done.as_db_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Marks a queue row `error` and merges `{"error": reason}` into its
    /// metadata JSON (spec §4.2, §4.4).
    pub async fn mark_embedding_failed(
        &self,
        queue_id: &str,
        reason: &str,
    ) -> Result<(), IngestError> {
        let id = parse_queue_id(queue_id)?;
        sqlx::query(
            r#"UPDATE embedding_queue
               SET status = $1,
                   metadata = metadata || jsonb_build_object('error', $2::text),
                   updated_at = now()
               WHERE id = $3"#,
        )
        .bind(QueueStatus::Error.as_db_str())
        .bind(reason)
        .bind(id)
        .execute(&self.private)
        .await?;
        Ok(())
    }
}

fn parse_queue_id(queue_id: &str) -> Result<Uuid, IngestError> {
    queue_id.parse().map_err(|_| IngestError::QueueRow {
        queue_id: queue_id.to_string(),
        reason: "malformed queue row id".to_string(),
    })
}
