use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::error;
use uuid::Uuid;

use domain::analytics::{
    AggregateMetrics, AnalyticsQuery, DailyKPI, LabelMetrics, LineMetrics,
};
use domain::error::{DomainError, DomainResult};
use domain::repository::{AnalyticsRepository, LineRepository};

/// Wall-clock analytics over the status log (schedule-agnostic, unlike the
/// compliance engine).
pub struct AnalyticsService {
    analytics: Arc<dyn AnalyticsRepository>,
    lines: Arc<dyn LineRepository>,
}

impl AnalyticsService {
    pub fn new(analytics: Arc<dyn AnalyticsRepository>, lines: Arc<dyn LineRepository>) -> Self {
        Self { analytics, lines }
    }

    pub async fn aggregate_metrics(
        &self,
        query: AnalyticsQuery,
    ) -> DomainResult<AggregateMetrics> {
        let (start, end) = resolve_timeframe(&query)?;
        self.analytics
            .aggregate_metrics(start, end, &query.line_ids, &query.label_ids)
            .await
            .map_err(|err| {
                error!(%err, "failed to get aggregate metrics");
                err
            })
    }

    pub async fn line_metrics(&self, query: AnalyticsQuery) -> DomainResult<Vec<LineMetrics>> {
        let (start, end) = resolve_timeframe(&query)?;
        self.analytics
            .line_metrics(start, end, &query.line_ids, &query.label_ids)
            .await
            .map_err(|err| {
                error!(%err, "failed to get line metrics");
                err
            })
    }

    pub async fn label_metrics(&self, query: AnalyticsQuery) -> DomainResult<Vec<LabelMetrics>> {
        let (start, end) = resolve_timeframe(&query)?;
        self.analytics
            .label_metrics(start, end)
            .await
            .map_err(|err| {
                error!(%err, "failed to get label metrics");
                err
            })
    }

    pub async fn daily_kpis(
        &self,
        line_id: Uuid,
        query: AnalyticsQuery,
    ) -> DomainResult<Vec<DailyKPI>> {
        let (start, end) = resolve_timeframe(&query)?;

        self.lines.get_by_id(line_id).await?;

        self.analytics
            .daily_kpis(line_id, start, end)
            .await
            .map_err(|err| {
                error!(%line_id, %err, "failed to get daily KPIs");
                err
            })
    }
}

/// Resolves the timeframe shorthand to absolute bounds. `custom` requires
/// explicit times; everything else counts back from now.
fn resolve_timeframe(query: &AnalyticsQuery) -> DomainResult<(DateTime<Utc>, DateTime<Utc>)> {
    let now = Utc::now();

    if query.timeframe == "custom" {
        let (Some(start), Some(end)) = (query.start_time, query.end_time) else {
            return Err(DomainError::Validation(
                "custom timeframe requires start_time and end_time".into(),
            ));
        };
        if start > end {
            return Err(DomainError::Validation(
                "start_time must be before end_time".into(),
            ));
        }
        return Ok((start, end));
    }

    match query.timeframe.as_str() {
        "24h" | "" => Ok((now - Duration::hours(24), now)),
        "7d" => Ok((now - Duration::days(7), now)),
        "30d" => Ok((now - Duration::days(30), now)),
        "all" => Ok((DateTime::<Utc>::UNIX_EPOCH, now)),
        other => Err(DomainError::Validation(format!(
            "invalid timeframe: {other} (valid: 24h, 7d, 30d, all, custom)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeframe_is_24h() {
        let query = AnalyticsQuery::default();
        let (start, end) = resolve_timeframe(&query).unwrap();
        assert_eq!((end - start).num_hours(), 24);
    }

    #[test]
    fn test_custom_timeframe_requires_bounds() {
        let query = AnalyticsQuery {
            timeframe: "custom".into(),
            ..Default::default()
        };
        assert!(resolve_timeframe(&query).is_err());
    }

    #[test]
    fn test_unknown_timeframe_rejected() {
        let query = AnalyticsQuery {
            timeframe: "90d".into(),
            ..Default::default()
        };
        assert!(resolve_timeframe(&query).is_err());
    }
}
