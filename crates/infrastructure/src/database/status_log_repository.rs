use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use domain::compliance::StatusInterval;
use domain::error::DomainResult;
use domain::line::StatusChange;
use domain::repository::StatusLogRepository;

use super::{internal, parse_status};

const DEFAULT_HISTORY_LIMIT: i64 = 100;

pub struct PgStatusLogRepository {
    pool: PgPool,
}

impl PgStatusLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusLogRepository for PgStatusLogRepository {
    async fn insert(&self, change: &StatusChange) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO production_line_status_log
                 (time, line_id, line_code, old_status, new_status, source, source_detail)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(change.time)
        .bind(change.line_id)
        .bind(&change.line_code)
        .bind(change.old_status.map(|s| s.as_str()))
        .bind(change.new_status.as_str())
        .bind(&change.source)
        .bind(&change.source_detail)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(())
    }

    async fn history(&self, line_id: Uuid, limit: i64) -> DomainResult<Vec<StatusChange>> {
        let limit = if limit <= 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            limit
        };

        let rows = sqlx::query(
            "SELECT time, line_id, line_code, old_status, new_status, source, source_detail
             FROM production_line_status_log
             WHERE line_id = $1
             ORDER BY time DESC
             LIMIT $2",
        )
        .bind(line_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let old_status: Option<String> = row.try_get("old_status").map_err(internal)?;
            let new_status: String = row.try_get("new_status").map_err(internal)?;

            history.push(StatusChange {
                time: row.try_get("time").map_err(internal)?,
                line_id: row.try_get("line_id").map_err(internal)?,
                line_code: row.try_get("line_code").map_err(internal)?,
                old_status: old_status.as_deref().map(parse_status).transpose()?,
                new_status: parse_status(&new_status)?,
                source: row.try_get("source").map_err(internal)?,
                source_detail: row.try_get("source_detail").map_err(internal)?,
            });
        }

        Ok(history)
    }

    async fn intervals(
        &self,
        line_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<StatusInterval>> {
        let rows = sqlx::query(
            "WITH status_intervals AS (
                 SELECT
                     log.time AS start_time,
                     LEAD(log.time, 1, $3) OVER (ORDER BY log.time) AS end_time,
                     log.new_status
                 FROM production_line_status_log log
                 WHERE log.line_id = $1
                   AND log.time >= $2
                   AND log.time < $3
             )
             SELECT start_time, end_time, new_status
             FROM status_intervals
             ORDER BY start_time",
        )
        .bind(line_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut intervals = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("new_status").map_err(internal)?;
            intervals.push(StatusInterval {
                start: row.try_get("start_time").map_err(internal)?,
                end: row.try_get("end_time").map_err(internal)?,
                status: parse_status(&status)?,
            });
        }

        Ok(intervals)
    }
}
