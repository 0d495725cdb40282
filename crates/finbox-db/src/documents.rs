//! Document-set store implementation.
//!
//! One processed attachment persists as three rows sharing an
//! `attachment_id`: the raw-document record, the derived
//! processed-document record, and the financial record. The triple is
//! written in one transaction and deleted jointly.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use finbox_core::{
    DocumentSet, DocumentSetIds, DocumentStore, Error, FinancialRecord, RecordCategory,
    RecordQuery, RecordStats, RecordStatus, Result, StoredRecord,
};

/// PostgreSQL implementation of [`DocumentStore`].
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_stored_record(row: &sqlx::postgres::PgRow) -> Result<StoredRecord> {
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let key_points: serde_json::Value = row.try_get("key_points")?;

    Ok(StoredRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        attachment_id: row.try_get("attachment_id")?,
        record: FinancialRecord {
            category: RecordCategory::from_str(&category).map_err(Error::Internal)?,
            record_type: row.try_get("record_type")?,
            sub_type: row.try_get("sub_type")?,
            status: RecordStatus::from_str(&status).map_err(Error::Internal)?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            counterparty: row.try_get("counterparty")?,
            transaction_date: row.try_get("transaction_date")?,
            confidence: row.try_get::<i16, _>("confidence")?.clamp(0, 100) as u8,
            summary: row.try_get("summary")?,
            key_points: serde_json::from_value(key_points).unwrap_or_default(),
            metadata: row.try_get("metadata")?,
        },
        created_at: row.try_get("created_at_utc")?,
    })
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self, set), fields(subsystem = "db", component = "documents", op = "insert_document_set", user_id = %set.user_id))]
    async fn insert_document_set(&self, set: &DocumentSet) -> Result<DocumentSetIds> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let raw_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO raw_documents
                (id, user_id, attachment_id, message_id, filename, mime_type, byte_size, created_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(raw_id)
        .bind(set.user_id)
        .bind(set.attachment_id)
        .bind(&set.message_id)
        .bind(&set.raw.filename)
        .bind(&set.raw.mime_type)
        .bind(set.raw.byte_size)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let processed_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO processed_documents
                (id, user_id, attachment_id, extraction_method, quality_score, char_count, content, metadata, created_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(processed_id)
        .bind(set.user_id)
        .bind(set.attachment_id)
        .bind(set.processed.extraction_method.to_string())
        .bind(set.processed.quality_score)
        .bind(set.processed.char_count)
        .bind(&set.processed.content)
        .bind(&set.processed.metadata)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let record_id = Uuid::new_v4();
        let record = &set.record;
        sqlx::query(
            r#"
            INSERT INTO financial_records
                (id, user_id, attachment_id, category, record_type, sub_type, status,
                 amount, currency, counterparty, transaction_date, confidence,
                 summary, key_points, metadata, created_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record_id)
        .bind(set.user_id)
        .bind(set.attachment_id)
        .bind(record.category.to_string())
        .bind(&record.record_type)
        .bind(&record.sub_type)
        .bind(record.status.to_string())
        .bind(record.amount)
        .bind(&record.currency)
        .bind(&record.counterparty)
        .bind(record.transaction_date)
        .bind(record.confidence as i16)
        .bind(&record.summary)
        .bind(serde_json::to_value(&record.key_points)?)
        .bind(&record.metadata)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(%raw_id, %processed_id, %record_id, "document set persisted");

        Ok(DocumentSetIds {
            raw_id,
            processed_id,
            record_id,
        })
    }

    async fn delete_document_set(&self, user_id: Uuid, attachment_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["financial_records", "processed_documents", "raw_documents"] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE user_id = $1 AND attachment_id = $2",
                table
            ))
            .bind(user_id)
            .bind(attachment_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_records(&self, user_id: Uuid, query: &RecordQuery) -> Result<Vec<StoredRecord>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, user_id, attachment_id, category, record_type, sub_type, status, \
             amount, currency, counterparty, transaction_date, confidence, summary, \
             key_points, metadata, created_at_utc FROM financial_records WHERE user_id = ",
        );
        qb.push_bind(user_id);

        if let Some(category) = query.category {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(ref record_type) = query.record_type {
            qb.push(" AND record_type = ").push_bind(record_type.clone());
        }
        if let Some(min_confidence) = query.min_confidence {
            qb.push(" AND confidence >= ").push_bind(min_confidence as i16);
        }
        if let Some(since) = query.since {
            qb.push(" AND created_at_utc >= ").push_bind(since);
        }

        qb.push(" ORDER BY created_at_utc DESC LIMIT ")
            .push_bind(query.limit.unwrap_or(50))
            .push(" OFFSET ")
            .push_bind(query.offset.unwrap_or(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_stored_record).collect()
    }

    async fn record_stats(&self, user_id: Uuid) -> Result<RecordStats> {
        let rows = sqlx::query(
            "SELECT category, COUNT(*) AS n FROM financial_records WHERE user_id = $1 GROUP BY category",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = RecordStats::default();
        for row in rows {
            let category: String = row.try_get("category")?;
            let count: i64 = row.try_get("n")?;
            stats.total += count;
            match category.as_str() {
                "asset" => stats.assets = count,
                "liability" => stats.liabilities = count,
                "insurance" => stats.insurance = count,
                _ => {}
            }
        }
        Ok(stats)
    }
}
