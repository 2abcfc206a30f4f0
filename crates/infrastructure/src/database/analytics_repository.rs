use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use domain::analytics::{
    AggregateMetrics, DailyKPI, LabelMetrics, LineMetrics, TimeRange,
};
use domain::error::DomainResult;
use domain::label::Label;
use domain::line::Status;
use domain::repository::AnalyticsRepository;

use super::label_repository::fetch_labels_for_line;
use super::{internal, parse_status};

/// Wall-clock metrics straight from the status log, computed in SQL with
/// LEAD-window interval projection.
pub struct PgAnalyticsRepository {
    pool: PgPool,
}

impl PgAnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn filter_clause(line_ids: &[Uuid], label_ids: &[Uuid]) -> String {
        // Positional args start at $3 ($1 = end, $2 = start).
        let mut clause = String::new();
        let mut arg = 2;
        if !label_ids.is_empty() {
            arg += 1;
            clause.push_str(&format!(" AND pll.label_id = ANY(${arg})"));
        }
        if !line_ids.is_empty() {
            arg += 1;
            clause.push_str(&format!(" AND pl.id = ANY(${arg})"));
        }
        clause
    }
}

#[async_trait]
impl AnalyticsRepository for PgAnalyticsRepository {
    async fn aggregate_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        line_ids: &[Uuid],
        label_ids: &[Uuid],
    ) -> DomainResult<AggregateMetrics> {
        let filter = Self::filter_clause(line_ids, label_ids);

        let sql = format!(
            "WITH line_filter AS (
                 SELECT DISTINCT pl.id
                 FROM production_lines pl
                 LEFT JOIN production_line_labels pll ON pl.id = pll.line_id
                 WHERE pl.deleted_at IS NULL
                 {filter}
             ),
             status_intervals AS (
                 SELECT
                     log.line_id,
                     log.new_status,
                     (EXTRACT(EPOCH FROM (
                         LEAD(log.time, 1, $1) OVER (PARTITION BY log.line_id ORDER BY log.time)
                         - log.time
                     )))::float8 / 3600.0 AS duration_hours
                 FROM production_line_status_log log
                 INNER JOIN line_filter lf ON log.line_id = lf.id
                 WHERE log.time >= $2 AND log.time <= $1
             )
             SELECT
                 COUNT(DISTINCT si.line_id) AS total_lines,
                 COALESCE(SUM(CASE WHEN si.new_status = 'on' THEN si.duration_hours ELSE 0 END), 0)::float8 AS total_uptime,
                 COALESCE(SUM(CASE WHEN si.new_status = 'off' THEN si.duration_hours ELSE 0 END), 0)::float8 AS total_downtime,
                 COALESCE(SUM(CASE WHEN si.new_status = 'maintenance' THEN si.duration_hours ELSE 0 END), 0)::float8 AS total_maintenance,
                 COALESCE(AVG(CASE WHEN si.new_status IN ('error', 'maintenance') THEN si.duration_hours END), 0)::float8 AS mttr,
                 COUNT(CASE WHEN si.new_status IN ('error', 'maintenance') THEN 1 END) AS total_interruptions
             FROM status_intervals si"
        );

        let mut query = sqlx::query(&sql).bind(end).bind(start);
        if !label_ids.is_empty() {
            query = query.bind(label_ids.to_vec());
        }
        if !line_ids.is_empty() {
            query = query.bind(line_ids.to_vec());
        }

        let row = query.fetch_one(&self.pool).await.map_err(internal)?;

        let total_uptime: f64 = row.try_get("total_uptime").map_err(internal)?;
        let total_downtime: f64 = row.try_get("total_downtime").map_err(internal)?;
        let total_maintenance: f64 = row.try_get("total_maintenance").map_err(internal)?;

        let total_hours = total_uptime + total_downtime + total_maintenance;
        let mut status_distribution = HashMap::new();
        let mut average_uptime = 0.0;
        if total_hours > 0.0 {
            average_uptime = total_uptime / total_hours * 100.0;
            status_distribution.insert(Status::On, total_uptime / total_hours * 100.0);
            status_distribution.insert(Status::Off, total_downtime / total_hours * 100.0);
            status_distribution.insert(
                Status::Maintenance,
                total_maintenance / total_hours * 100.0,
            );
        }

        Ok(AggregateMetrics {
            total_lines: row.try_get("total_lines").map_err(internal)?,
            total_uptime_hours: total_uptime,
            average_uptime_percentage: average_uptime,
            total_downtime_hours: total_downtime,
            total_maintenance_hours: total_maintenance,
            mttr_hours: row.try_get("mttr").map_err(internal)?,
            total_interruptions: row.try_get("total_interruptions").map_err(internal)?,
            status_distribution,
            time_range: TimeRange { start, end },
        })
    }

    async fn line_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        line_ids: &[Uuid],
        label_ids: &[Uuid],
    ) -> DomainResult<Vec<LineMetrics>> {
        let filter = Self::filter_clause(line_ids, label_ids);

        let sql = format!(
            "WITH line_filter AS (
                 SELECT DISTINCT pl.id, pl.code, pl.name, pl.status
                 FROM production_lines pl
                 LEFT JOIN production_line_labels pll ON pl.id = pll.line_id
                 WHERE pl.deleted_at IS NULL
                 {filter}
             ),
             status_intervals AS (
                 SELECT
                     log.line_id,
                     log.new_status,
                     (EXTRACT(EPOCH FROM (
                         LEAD(log.time, 1, $1) OVER (PARTITION BY log.line_id ORDER BY log.time)
                         - log.time
                     )))::float8 / 3600.0 AS duration_hours
                 FROM production_line_status_log log
                 INNER JOIN line_filter lf ON log.line_id = lf.id
                 WHERE log.time >= $2 AND log.time <= $1
             )
             SELECT
                 lf.id, lf.code, lf.name, lf.status,
                 COALESCE(SUM(CASE WHEN si.new_status = 'on' THEN si.duration_hours ELSE 0 END), 0)::float8 AS uptime_hours,
                 COALESCE(SUM(CASE WHEN si.new_status = 'off' THEN si.duration_hours ELSE 0 END), 0)::float8 AS downtime_hours,
                 COALESCE(SUM(CASE WHEN si.new_status = 'maintenance' THEN si.duration_hours ELSE 0 END), 0)::float8 AS maintenance_hours,
                 COALESCE(SUM(CASE WHEN si.new_status = 'error' THEN si.duration_hours ELSE 0 END), 0)::float8 AS error_hours,
                 COUNT(CASE WHEN si.new_status IN ('error', 'maintenance') THEN 1 END) AS interruption_count
             FROM line_filter lf
             LEFT JOIN status_intervals si ON lf.id = si.line_id
             GROUP BY lf.id, lf.code, lf.name, lf.status
             ORDER BY lf.code"
        );

        let mut query = sqlx::query(&sql).bind(end).bind(start);
        if !label_ids.is_empty() {
            query = query.bind(label_ids.to_vec());
        }
        if !line_ids.is_empty() {
            query = query.bind(line_ids.to_vec());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(internal)?;

        let mut metrics = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status").map_err(internal)?;
            let uptime: f64 = row.try_get("uptime_hours").map_err(internal)?;
            let downtime: f64 = row.try_get("downtime_hours").map_err(internal)?;
            let maintenance: f64 = row.try_get("maintenance_hours").map_err(internal)?;
            let error_hours: f64 = row.try_get("error_hours").map_err(internal)?;
            let interruption_count: i64 =
                row.try_get("interruption_count").map_err(internal)?;
            let line_id: Uuid = row.try_get("id").map_err(internal)?;

            let total = uptime + downtime + maintenance + error_hours;
            let mut status_distribution = HashMap::new();
            let mut uptime_percentage = 0.0;
            if total > 0.0 {
                uptime_percentage = uptime / total * 100.0;
                status_distribution.insert(Status::On, uptime / total * 100.0);
                status_distribution.insert(Status::Off, downtime / total * 100.0);
                status_distribution.insert(Status::Maintenance, maintenance / total * 100.0);
                status_distribution.insert(Status::Error, error_hours / total * 100.0);
            }

            let mttr = if interruption_count > 0 {
                (maintenance + error_hours) / interruption_count as f64
            } else {
                0.0
            };

            let labels: Vec<Label> = fetch_labels_for_line(&self.pool, line_id)
                .await
                .unwrap_or_default();

            metrics.push(LineMetrics {
                line_id,
                line_code: row.try_get("code").map_err(internal)?,
                line_name: row.try_get("name").map_err(internal)?,
                labels,
                uptime_hours: uptime,
                uptime_percentage,
                downtime_hours: downtime,
                maintenance_hours: maintenance,
                error_hours,
                mttr_hours: mttr,
                interruption_count,
                current_status: parse_status(&status)?,
                status_distribution,
            });
        }

        Ok(metrics)
    }

    async fn label_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<LabelMetrics>> {
        let rows = sqlx::query(
            "WITH status_intervals AS (
                 SELECT
                     pll.label_id,
                     log.line_id,
                     log.new_status,
                     (EXTRACT(EPOCH FROM (
                         LEAD(log.time, 1, $1) OVER (PARTITION BY log.line_id ORDER BY log.time)
                         - log.time
                     )))::float8 / 3600.0 AS duration_hours
                 FROM production_line_status_log log
                 INNER JOIN production_lines pl ON log.line_id = pl.id
                 INNER JOIN production_line_labels pll ON pl.id = pll.line_id
                 WHERE log.time >= $2 AND log.time <= $1
                   AND pl.deleted_at IS NULL
             )
             SELECT
                 l.id, l.name, l.color, l.description, l.created_at, l.updated_at,
                 COUNT(DISTINCT si.line_id) AS line_count,
                 COALESCE(SUM(CASE WHEN si.new_status = 'on' THEN si.duration_hours ELSE 0 END), 0)::float8 AS total_uptime,
                 COUNT(CASE WHEN si.new_status IN ('error', 'maintenance') THEN 1 END) AS total_interruptions
             FROM labels l
             LEFT JOIN status_intervals si ON l.id = si.label_id
             GROUP BY l.id, l.name, l.color, l.description, l.created_at, l.updated_at
             ORDER BY l.name",
        )
        .bind(end)
        .bind(start)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut metrics = Vec::with_capacity(rows.len());
        for row in rows {
            let line_count: i64 = row.try_get("line_count").map_err(internal)?;
            let total_uptime: f64 = row.try_get("total_uptime").map_err(internal)?;
            let total_interruptions: i64 =
                row.try_get("total_interruptions").map_err(internal)?;

            let average_uptime = if line_count > 0 && total_uptime > 0.0 {
                total_uptime / line_count as f64 * 100.0
            } else {
                0.0
            };
            let mttr = if total_interruptions > 0 {
                total_uptime / total_interruptions as f64
            } else {
                0.0
            };

            metrics.push(LabelMetrics {
                label: Label {
                    id: row.try_get("id").map_err(internal)?,
                    name: row.try_get("name").map_err(internal)?,
                    color: row.try_get("color").map_err(internal)?,
                    description: row.try_get("description").map_err(internal)?,
                    created_at: row.try_get("created_at").map_err(internal)?,
                    updated_at: row.try_get("updated_at").map_err(internal)?,
                },
                line_count,
                average_uptime_percentage: average_uptime,
                total_uptime_hours: total_uptime,
                total_interruptions,
                mttr_hours: mttr,
            });
        }

        Ok(metrics)
    }

    async fn daily_kpis(
        &self,
        line_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<DailyKPI>> {
        let rows = sqlx::query(
            "WITH daily_intervals AS (
                 SELECT
                     DATE(log.time) AS date,
                     log.new_status,
                     (EXTRACT(EPOCH FROM (
                         LEAD(log.time, 1, $3) OVER (PARTITION BY log.line_id ORDER BY log.time)
                         - log.time
                     )))::float8 / 3600.0 AS duration_hours
                 FROM production_line_status_log log
                 WHERE log.line_id = $1
                   AND log.time >= $2
                   AND log.time <= $3
             )
             SELECT
                 date,
                 COALESCE(SUM(CASE WHEN new_status = 'on' THEN duration_hours ELSE 0 END), 0)::float8 AS uptime_hours,
                 COALESCE(SUM(CASE WHEN new_status = 'maintenance' THEN duration_hours ELSE 0 END), 0)::float8 AS maintenance_hours,
                 COUNT(CASE WHEN new_status IN ('error', 'maintenance') THEN 1 END) AS interruption_count,
                 COALESCE(AVG(CASE WHEN new_status IN ('error', 'maintenance') THEN duration_hours END), 0)::float8 AS mttr
             FROM daily_intervals
             GROUP BY date
             ORDER BY date",
        )
        .bind(line_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut kpis = Vec::with_capacity(rows.len());
        for row in rows {
            let uptime: f64 = row.try_get("uptime_hours").map_err(internal)?;

            kpis.push(DailyKPI {
                date: row.try_get("date").map_err(internal)?,
                uptime_hours: uptime,
                uptime_percentage: uptime / 24.0 * 100.0,
                maintenance_hours: row.try_get("maintenance_hours").map_err(internal)?,
                interruption_count: row.try_get("interruption_count").map_err(internal)?,
                mttr_hours: row.try_get("mttr").map_err(internal)?,
            });
        }

        Ok(kpis)
    }
}
