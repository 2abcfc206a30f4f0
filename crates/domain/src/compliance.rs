use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::line::Status;
use crate::schedule::ScheduleSource;

/// Filter for compliance queries. Dates are inclusive civil dates.
#[derive(Debug, Clone)]
pub struct ComplianceQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub line_ids: Vec<Uuid>,
    pub label_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Scheduled-vs-actual metrics for one line over a date range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineComplianceMetrics {
    pub line_id: Uuid,
    pub line_code: String,
    pub line_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,
    pub scheduled_days: usize,
    pub working_days: usize,
    pub scheduled_uptime_hours: f64,
    pub actual_uptime_hours: f64,
    pub unplanned_downtime_hours: f64,
    pub overtime_hours: f64,
    pub compliance_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateComplianceMetrics {
    pub total_lines: usize,
    pub lines_with_schedule: usize,
    pub total_scheduled_hours: f64,
    pub total_actual_hours: f64,
    pub total_unplanned_downtime: f64,
    pub total_overtime: f64,
    pub average_compliance: f64,
    pub line_metrics: Vec<LineComplianceMetrics>,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyComplianceKPI {
    pub date: NaiveDate,
    pub is_working_day: bool,
    pub source: ScheduleSource,
    pub scheduled_uptime_hours: f64,
    pub actual_uptime_hours: f64,
    pub unplanned_downtime_hours: f64,
    pub overtime_hours: f64,
    pub compliance_percentage: f64,
}

/// One projected interval of the status log: the line held `status` from
/// `start` until `end` (the next entry, or the query horizon).
#[derive(Debug, Clone)]
pub struct StatusInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: Status,
}

/// Line row with its schedule reference, as fetched for compliance runs.
#[derive(Debug, Clone)]
pub struct LineScheduleRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub schedule_id: Option<Uuid>,
    pub schedule_name: Option<String>,
}
