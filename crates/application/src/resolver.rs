use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use domain::error::{DomainError, DomainResult};
use domain::repository::{ResolvedDay, ScheduleRepository};
use domain::schedule::{DayOfWeek, EffectiveSchedule, ScheduleSource};

/// Computes the effective schedule for a `(line, date)` pair by consulting
/// the override layers in strict priority order and stopping at the first
/// match: line exception, then schedule exception, then holiday, then the
/// base weekly day. An override fully replaces the layers below it; in
/// particular a deliberate exception can reinstate work on a holiday.
pub struct ScheduleResolver {
    schedules: Arc<dyn ScheduleRepository>,
}

impl ScheduleResolver {
    pub fn new(schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self { schedules }
    }

    pub async fn effective_schedule(
        &self,
        line_id: Uuid,
        date: NaiveDate,
    ) -> DomainResult<EffectiveSchedule> {
        let line = self.schedules.line_schedule_ref(line_id).await?;

        let mut result = EffectiveSchedule {
            line_id: line.id,
            line_code: line.code,
            date,
            schedule_id: line.schedule_id,
            schedule_name: line.schedule_name,
            source: ScheduleSource::NoSchedule,
            source_id: None,
            source_name: None,
            is_working_day: false,
            shift_start: None,
            shift_end: None,
            breaks: Vec::new(),
        };

        let Some(schedule_id) = line.schedule_id else {
            return Ok(result);
        };

        let dow = DayOfWeek::of(date);

        if let Some(day) = self
            .schedules
            .find_line_exception_day(schedule_id, line_id, date, dow)
            .await?
        {
            apply_day(&mut result, ScheduleSource::LineException, day);
            return Ok(result);
        }

        if let Some(day) = self
            .schedules
            .find_exception_day(schedule_id, date, dow)
            .await?
        {
            apply_day(&mut result, ScheduleSource::ScheduleException, day);
            return Ok(result);
        }

        if let Some(holiday) = self.schedules.find_holiday(schedule_id, date).await? {
            result.source = ScheduleSource::Holiday;
            result.source_id = Some(holiday.id);
            result.source_name = holiday.name;
            result.is_working_day = false;
            return Ok(result);
        }

        match self.schedules.base_day(schedule_id, dow).await? {
            Some(day) => {
                apply_day(&mut result, ScheduleSource::Base, day);
                Ok(result)
            }
            None => Err(DomainError::ScheduleDayNotFound),
        }
    }

    /// One result per day, `start` through `end` inclusive.
    pub async fn effective_schedule_range(
        &self,
        line_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DomainResult<Vec<EffectiveSchedule>> {
        if start > end {
            return Err(DomainError::InvalidDateRange);
        }

        let mut results = Vec::new();
        let mut date = start;
        while date <= end {
            results.push(self.effective_schedule(line_id, date).await?);
            date = date.succ_opt().ok_or(DomainError::InvalidDateRange)?;
        }

        Ok(results)
    }
}

fn apply_day(result: &mut EffectiveSchedule, source: ScheduleSource, day: ResolvedDay) {
    result.source = source;
    result.source_id = Some(day.source_id);
    result.source_name = day.source_name;
    result.is_working_day = day.is_working_day;
    result.shift_start = day.shift_start;
    result.shift_end = day.shift_end;
    result.breaks = day.breaks;
}
