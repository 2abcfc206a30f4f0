use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::label::Label;
use crate::line::Status;

/// Common parameters for analytics queries. `timeframe` is one of
/// 24h (default), 7d, 30d, all, custom.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub label_ids: Vec<Uuid>,
    pub line_ids: Vec<Uuid>,
    pub timeframe: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Overall wall-clock metrics across the queried lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_lines: i64,
    pub total_uptime_hours: f64,
    pub average_uptime_percentage: f64,
    pub total_downtime_hours: f64,
    pub total_maintenance_hours: f64,
    pub mttr_hours: f64,
    pub total_interruptions: i64,
    pub status_distribution: HashMap<Status, f64>,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineMetrics {
    pub line_id: Uuid,
    pub line_code: String,
    pub line_name: String,
    pub labels: Vec<Label>,
    pub uptime_hours: f64,
    pub uptime_percentage: f64,
    pub downtime_hours: f64,
    pub maintenance_hours: f64,
    pub error_hours: f64,
    pub mttr_hours: f64,
    pub interruption_count: i64,
    pub current_status: Status,
    pub status_distribution: HashMap<Status, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelMetrics {
    pub label: Label,
    pub line_count: i64,
    pub average_uptime_percentage: f64,
    pub total_uptime_hours: f64,
    pub total_interruptions: i64,
    pub mttr_hours: f64,
}

/// KPIs for a single 24-hour bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyKPI {
    pub date: NaiveDate,
    pub uptime_hours: f64,
    pub uptime_percentage: f64,
    pub maintenance_hours: f64,
    pub interruption_count: i64,
    pub mttr_hours: f64,
}
