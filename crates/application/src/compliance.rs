use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{error, info};
use uuid::Uuid;

use domain::compliance::{
    AggregateComplianceMetrics, ComplianceQuery, DailyComplianceKPI, DateRange,
    LineComplianceMetrics, LineScheduleRef,
};
use domain::error::{DomainError, DomainResult};
use domain::line::Status;
use domain::repository::{LineRepository, StatusLogRepository};
use domain::schedule::{wrapped_span_minutes, EffectiveSchedule};

use crate::resolver::ScheduleResolver;

const MAX_RANGE_DAYS: i64 = 90;

/// Converts the status-change log into scheduled-vs-actual metrics using
/// the effective schedules of each day in the queried range.
pub struct ComplianceService {
    lines: Arc<dyn LineRepository>,
    status_log: Arc<dyn StatusLogRepository>,
    resolver: Arc<ScheduleResolver>,
}

impl ComplianceService {
    pub fn new(
        lines: Arc<dyn LineRepository>,
        status_log: Arc<dyn StatusLogRepository>,
        resolver: Arc<ScheduleResolver>,
    ) -> Self {
        Self {
            lines,
            status_log,
            resolver,
        }
    }

    pub async fn aggregate_compliance(
        &self,
        query: ComplianceQuery,
    ) -> DomainResult<AggregateComplianceMetrics> {
        validate_range(query.start_date, query.end_date)?;

        let line_metrics = self.line_compliance(query.clone()).await?;

        let mut lines_with_schedule = 0usize;
        let mut total_scheduled = 0.0;
        let mut total_actual = 0.0;
        let mut total_downtime = 0.0;
        let mut total_overtime = 0.0;
        let mut total_compliance = 0.0;
        let mut lines_with_compliance = 0usize;

        for lm in &line_metrics {
            if lm.schedule_id.is_some() {
                lines_with_schedule += 1;
            }
            total_scheduled += lm.scheduled_uptime_hours;
            total_actual += lm.actual_uptime_hours;
            total_downtime += lm.unplanned_downtime_hours;
            total_overtime += lm.overtime_hours;

            // Lines without scheduled time cannot express a percentage and
            // must not drag the average down.
            if lm.scheduled_uptime_hours > 0.0 {
                total_compliance += lm.compliance_percentage;
                lines_with_compliance += 1;
            }
        }

        let average_compliance = if lines_with_compliance > 0 {
            total_compliance / lines_with_compliance as f64
        } else {
            0.0
        };

        Ok(AggregateComplianceMetrics {
            total_lines: line_metrics.len(),
            lines_with_schedule,
            total_scheduled_hours: total_scheduled,
            total_actual_hours: total_actual,
            total_unplanned_downtime: total_downtime,
            total_overtime,
            average_compliance,
            line_metrics,
            date_range: DateRange {
                start_date: query.start_date,
                end_date: query.end_date,
            },
        })
    }

    pub async fn line_compliance(
        &self,
        query: ComplianceQuery,
    ) -> DomainResult<Vec<LineComplianceMetrics>> {
        validate_range(query.start_date, query.end_date)?;

        info!(start_date = %query.start_date, end_date = %query.end_date,
            line_count = query.line_ids.len(), label_count = query.label_ids.len(),
            "calculating line compliance");

        let lines = self
            .lines
            .list_schedule_refs(&query.line_ids, &query.label_ids)
            .await?;

        let mut metrics = Vec::with_capacity(lines.len());
        for line in lines {
            let m = self
                .calculate_line(&line, query.start_date, query.end_date)
                .await
                .map_err(|err| {
                    error!(line_code = %line.code, %err, "failed to calculate compliance");
                    err
                })?;
            metrics.push(m);
        }

        Ok(metrics)
    }

    pub async fn daily_compliance(
        &self,
        line_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> DomainResult<Vec<DailyComplianceKPI>> {
        validate_range(start_date, end_date)?;

        // Verify line exists.
        self.lines.get_by_id(line_id).await?;

        let effective = self
            .resolver
            .effective_schedule_range(line_id, start_date, end_date)
            .await?;

        let mut kpis = Vec::with_capacity(effective.len());
        for es in effective {
            let mut kpi = DailyComplianceKPI {
                date: es.date,
                is_working_day: es.is_working_day,
                source: es.source,
                scheduled_uptime_hours: 0.0,
                actual_uptime_hours: 0.0,
                unplanned_downtime_hours: 0.0,
                overtime_hours: 0.0,
                compliance_percentage: 0.0,
            };

            if es.is_working_day {
                kpi.scheduled_uptime_hours = scheduled_hours(&es);
                let actual = self.actual_metrics(line_id, std::slice::from_ref(&es)).await?;
                kpi.actual_uptime_hours = actual.uptime;
                kpi.unplanned_downtime_hours = actual.unplanned_downtime;
                kpi.overtime_hours = actual.overtime;
                kpi.compliance_percentage =
                    compliance_percentage(actual.uptime, kpi.scheduled_uptime_hours);
            }

            kpis.push(kpi);
        }

        Ok(kpis)
    }

    async fn calculate_line(
        &self,
        line: &LineScheduleRef,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> DomainResult<LineComplianceMetrics> {
        let mut metrics = LineComplianceMetrics {
            line_id: line.id,
            line_code: line.code.clone(),
            line_name: line.name.clone(),
            schedule_id: line.schedule_id,
            schedule_name: line.schedule_name.clone(),
            ..Default::default()
        };

        // Lines without a schedule report zeroed metrics.
        if line.schedule_id.is_none() {
            return Ok(metrics);
        }

        let effective = self
            .resolver
            .effective_schedule_range(line.id, start_date, end_date)
            .await?;

        metrics.scheduled_days = effective.len();
        for es in &effective {
            if es.is_working_day {
                metrics.working_days += 1;
                metrics.scheduled_uptime_hours += scheduled_hours(es);
            }
        }

        let actual = self.actual_metrics(line.id, &effective).await?;
        metrics.actual_uptime_hours = actual.uptime;
        metrics.unplanned_downtime_hours = actual.unplanned_downtime;
        metrics.overtime_hours = actual.overtime;
        metrics.compliance_percentage =
            compliance_percentage(actual.uptime, metrics.scheduled_uptime_hours);

        Ok(metrics)
    }

    async fn actual_metrics(
        &self,
        line_id: Uuid,
        effective: &[EffectiveSchedule],
    ) -> DomainResult<ActualMetrics> {
        let Some(first) = effective.first() else {
            return Ok(ActualMetrics::default());
        };
        let last = effective.last().unwrap();

        let range_start = day_start(first.date);
        // Project past the end date so the last day's intervals close.
        let range_end = day_start(last.date) + Duration::hours(24);

        let intervals = self
            .status_log
            .intervals(line_id, range_start, range_end)
            .await?;

        let periods = build_scheduled_periods(effective);

        let mut result = ActualMetrics::default();
        for interval in &intervals {
            let (inside, outside) =
                split_hours(interval.start, interval.end, &periods);
            match interval.status {
                Status::On => {
                    result.uptime += inside;
                    result.overtime += outside;
                }
                Status::Off | Status::Error | Status::Maintenance => {
                    result.unplanned_downtime += inside;
                }
            }
        }

        Ok(result)
    }
}

#[derive(Debug, Default)]
struct ActualMetrics {
    uptime: f64,
    unplanned_downtime: f64,
    overtime: f64,
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> DomainResult<()> {
    if end < start {
        return Err(DomainError::InvalidDateRange);
    }
    if (end - start).num_days() > MAX_RANGE_DAYS {
        return Err(DomainError::Validation(format!(
            "date range cannot exceed {MAX_RANGE_DAYS} days"
        )));
    }
    Ok(())
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Scheduled working hours of one day: the shift span (overnight shifts
/// add 24 h) minus the summed break spans (wrapping identically).
pub fn scheduled_hours(es: &EffectiveSchedule) -> f64 {
    let (Some(start), Some(end)) = (es.shift_start, es.shift_end) else {
        return 0.0;
    };
    if !es.is_working_day {
        return 0.0;
    }

    let mut minutes = wrapped_span_minutes(start, end);
    for brk in &es.breaks {
        minutes -= wrapped_span_minutes(brk.break_start, brk.break_end);
    }

    minutes as f64 / 60.0
}

/// Absolute `[start, end)` timestamps of each working day's shift. Breaks
/// are subtracted from the scheduled hours but not from these boundaries,
/// so a logged outage during a break still registers as downtime.
pub fn build_scheduled_periods(
    effective: &[EffectiveSchedule],
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut periods = Vec::new();

    for es in effective {
        let (Some(start), Some(end)) = (es.shift_start, es.shift_end) else {
            continue;
        };
        if !es.is_working_day {
            continue;
        }

        let period_start = es.date.and_time(start).and_utc();
        let mut period_end = es.date.and_time(end).and_utc();
        if period_end < period_start {
            period_end += Duration::hours(24);
        }

        periods.push((period_start, period_end));
    }

    periods
}

/// Splits an interval into hours inside the scheduled periods and hours
/// outside them.
pub fn split_hours(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    periods: &[(DateTime<Utc>, DateTime<Utc>)],
) -> (f64, f64) {
    let total = hours_between(start, end);
    let mut inside = 0.0;

    for (period_start, period_end) in periods {
        let overlap_start = start.max(*period_start);
        let overlap_end = end.min(*period_end);
        if overlap_end > overlap_start {
            inside += hours_between(overlap_start, overlap_end);
        }
    }

    (inside, total - inside)
}

fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

/// Capped at 100; overtime is reported separately and never inflates
/// compliance.
pub fn compliance_percentage(actual: f64, scheduled: f64) -> f64 {
    if scheduled <= 0.0 {
        return 0.0;
    }
    ((actual / scheduled) * 100.0).min(100.0)
}
