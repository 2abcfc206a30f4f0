use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use domain::error::{DomainError, DomainResult};
use domain::line::ProductionLine;
use domain::repository::{HolidayProvider, LineRepository, ScheduleRepository};
use domain::schedule::{
    validate_day, CreateExceptionRequest, CreateHolidayRequest, CreateLineExceptionRequest,
    CreateScheduleRequest, DayInput, LineScheduleException, Schedule, ScheduleBreak, ScheduleDay,
    ScheduleException, ScheduleHoliday, ScheduleSummary, SetBreaksRequest,
    SuggestedHolidaysResponse, UpdateDayRequest, UpdateExceptionRequest, UpdateHolidayRequest,
    UpdateLineExceptionRequest, UpdateScheduleRequest,
};

/// Business logic for schedules: CRUD, holidays, exceptions, line
/// assignment, and suggested holidays from the external API.
pub struct ScheduleService {
    schedules: Arc<dyn ScheduleRepository>,
    lines: Arc<dyn LineRepository>,
    holidays: Option<Arc<dyn HolidayProvider>>,
    holidays_country: String,
}

impl ScheduleService {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        lines: Arc<dyn LineRepository>,
        holidays: Option<Arc<dyn HolidayProvider>>,
        holidays_country: String,
    ) -> Self {
        Self {
            schedules,
            lines,
            holidays,
            holidays_country,
        }
    }

    // ---------- Schedule CRUD ----------

    pub async fn create(&self, req: CreateScheduleRequest) -> DomainResult<Schedule> {
        validate_name(&req.name)?;
        validate_timezone(&req.timezone)?;
        validate_week(&req.days)?;

        let schedule = self.schedules.create(&req).await.map_err(|err| {
            error!(name = %req.name, %err, "failed to create schedule");
            err
        })?;

        info!(id = %schedule.id, name = %schedule.name, "schedule created");
        Ok(schedule)
    }

    pub async fn get_by_id(&self, id: Uuid) -> DomainResult<Schedule> {
        self.schedules.get_by_id(id).await
    }

    pub async fn list(&self) -> DomainResult<Vec<ScheduleSummary>> {
        self.schedules.list().await
    }

    pub async fn update(&self, id: Uuid, req: UpdateScheduleRequest) -> DomainResult<Schedule> {
        if let Some(name) = &req.name {
            validate_name(name)?;
        }
        if let Some(tz) = &req.timezone {
            validate_timezone(tz)?;
        }

        let schedule = self.schedules.update(id, &req).await.map_err(|err| {
            error!(%id, %err, "failed to update schedule");
            err
        })?;

        info!(id = %schedule.id, name = %schedule.name, "schedule updated");
        Ok(schedule)
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.schedules.delete(id).await.map_err(|err| {
            error!(%id, %err, "failed to delete schedule");
            err
        })?;

        info!(%id, "schedule deleted");
        Ok(())
    }

    // ---------- Days ----------

    pub async fn get_day(&self, day_id: Uuid) -> DomainResult<ScheduleDay> {
        self.schedules.get_day(day_id).await
    }

    pub async fn update_day(
        &self,
        day_id: Uuid,
        req: UpdateDayRequest,
    ) -> DomainResult<ScheduleDay> {
        self.schedules.update_day(day_id, &req).await.map_err(|err| {
            error!(%day_id, %err, "failed to update schedule day");
            err
        })
    }

    pub async fn set_day_breaks(
        &self,
        day_id: Uuid,
        req: SetBreaksRequest,
    ) -> DomainResult<Vec<ScheduleBreak>> {
        let day = self.schedules.get_day(day_id).await?;
        validate_day(&DayInput {
            day_of_week: day.day_of_week,
            is_working_day: day.is_working_day,
            shift_start: day.shift_start,
            shift_end: day.shift_end,
            breaks: req.breaks.clone(),
        })?;

        self.schedules
            .set_day_breaks(day_id, &req.breaks)
            .await
            .map_err(|err| {
                error!(%day_id, %err, "failed to set day breaks");
                err
            })
    }

    // ---------- Holidays ----------

    pub async fn holidays(
        &self,
        schedule_id: Uuid,
        year: Option<i32>,
    ) -> DomainResult<Vec<ScheduleHoliday>> {
        self.schedules.holidays(schedule_id, year).await
    }

    pub async fn create_holiday(
        &self,
        schedule_id: Uuid,
        req: CreateHolidayRequest,
    ) -> DomainResult<ScheduleHoliday> {
        let holiday = self
            .schedules
            .create_holiday(schedule_id, &req)
            .await
            .map_err(|err| {
                error!(%schedule_id, date = %req.holiday_date, %err, "failed to create holiday");
                err
            })?;

        info!(%schedule_id, date = %holiday.holiday_date, "holiday created");
        Ok(holiday)
    }

    pub async fn get_holiday(&self, holiday_id: Uuid) -> DomainResult<ScheduleHoliday> {
        self.schedules.get_holiday(holiday_id).await
    }

    pub async fn update_holiday(
        &self,
        holiday_id: Uuid,
        req: UpdateHolidayRequest,
    ) -> DomainResult<ScheduleHoliday> {
        self.schedules
            .update_holiday(holiday_id, &req)
            .await
            .map_err(|err| {
                error!(%holiday_id, %err, "failed to update holiday");
                err
            })
    }

    pub async fn delete_holiday(&self, holiday_id: Uuid) -> DomainResult<()> {
        self.schedules.delete_holiday(holiday_id).await.map_err(|err| {
            error!(%holiday_id, %err, "failed to delete holiday");
            err
        })
    }

    /// Public holidays for the configured country, from the external API
    /// behind a daily cache. Failures degrade to a structured response
    /// with an `error` field instead of an HTTP error.
    pub async fn suggested_holidays(&self, year: i32) -> SuggestedHolidaysResponse {
        let Some(provider) = &self.holidays else {
            return SuggestedHolidaysResponse {
                holidays: Vec::new(),
                country_code: self.holidays_country.clone(),
                year,
                cached: false,
                error: Some("holidays API not configured".into()),
            };
        };

        match provider.public_holidays(&self.holidays_country, year).await {
            Ok((holidays, cached)) => SuggestedHolidaysResponse {
                holidays,
                country_code: self.holidays_country.clone(),
                year,
                cached,
                error: None,
            },
            Err(err) => {
                warn!(country = %self.holidays_country, year, %err,
                    "failed to fetch suggested holidays");
                SuggestedHolidaysResponse {
                    holidays: Vec::new(),
                    country_code: self.holidays_country.clone(),
                    year,
                    cached: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    // ---------- Schedule exceptions ----------

    pub async fn exceptions(&self, schedule_id: Uuid) -> DomainResult<Vec<ScheduleException>> {
        self.schedules.exceptions(schedule_id).await
    }

    pub async fn create_exception(
        &self,
        schedule_id: Uuid,
        req: CreateExceptionRequest,
    ) -> DomainResult<ScheduleException> {
        validate_name(&req.name)?;
        if req.start_date > req.end_date {
            return Err(DomainError::InvalidDateRange);
        }
        validate_week(&req.days)?;

        let exception = self
            .schedules
            .create_exception(schedule_id, &req)
            .await
            .map_err(|err| {
                error!(%schedule_id, name = %req.name, %err, "failed to create schedule exception");
                err
            })?;

        info!(%schedule_id, exception_id = %exception.id, name = %exception.name,
            "schedule exception created");
        Ok(exception)
    }

    pub async fn get_exception(&self, exception_id: Uuid) -> DomainResult<ScheduleException> {
        self.schedules.get_exception(exception_id).await
    }

    pub async fn update_exception(
        &self,
        exception_id: Uuid,
        req: UpdateExceptionRequest,
    ) -> DomainResult<ScheduleException> {
        if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
            if start > end {
                return Err(DomainError::InvalidDateRange);
            }
        }

        self.schedules
            .update_exception(exception_id, &req)
            .await
            .map_err(|err| {
                error!(%exception_id, %err, "failed to update schedule exception");
                err
            })
    }

    pub async fn delete_exception(&self, exception_id: Uuid) -> DomainResult<()> {
        self.schedules
            .delete_exception(exception_id)
            .await
            .map_err(|err| {
                error!(%exception_id, %err, "failed to delete schedule exception");
                err
            })
    }

    // ---------- Line exceptions ----------

    pub async fn line_exceptions(
        &self,
        schedule_id: Uuid,
    ) -> DomainResult<Vec<LineScheduleException>> {
        self.schedules.line_exceptions(schedule_id).await
    }

    pub async fn create_line_exception(
        &self,
        schedule_id: Uuid,
        req: CreateLineExceptionRequest,
    ) -> DomainResult<LineScheduleException> {
        validate_name(&req.name)?;
        if req.start_date > req.end_date {
            return Err(DomainError::InvalidDateRange);
        }
        if req.line_ids.is_empty() {
            return Err(DomainError::MissingLinesForException);
        }
        validate_week(&req.days)?;

        let exception = self
            .schedules
            .create_line_exception(schedule_id, &req)
            .await
            .map_err(|err| {
                error!(%schedule_id, name = %req.name, %err, "failed to create line exception");
                err
            })?;

        info!(%schedule_id, exception_id = %exception.id, name = %exception.name,
            line_count = exception.line_ids.len(), "line schedule exception created");
        Ok(exception)
    }

    pub async fn get_line_exception(
        &self,
        exception_id: Uuid,
    ) -> DomainResult<LineScheduleException> {
        self.schedules.get_line_exception(exception_id).await
    }

    pub async fn update_line_exception(
        &self,
        exception_id: Uuid,
        req: UpdateLineExceptionRequest,
    ) -> DomainResult<LineScheduleException> {
        if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
            if start > end {
                return Err(DomainError::InvalidDateRange);
            }
        }
        if let Some(line_ids) = &req.line_ids {
            if line_ids.is_empty() {
                return Err(DomainError::MissingLinesForException);
            }
        }

        self.schedules
            .update_line_exception(exception_id, &req)
            .await
            .map_err(|err| {
                error!(%exception_id, %err, "failed to update line exception");
                err
            })
    }

    pub async fn delete_line_exception(&self, exception_id: Uuid) -> DomainResult<()> {
        self.schedules
            .delete_line_exception(exception_id)
            .await
            .map_err(|err| {
                error!(%exception_id, %err, "failed to delete line exception");
                err
            })
    }

    // ---------- Line assignment ----------

    pub async fn assign_to_line(
        &self,
        line_id: Uuid,
        schedule_id: Option<Uuid>,
    ) -> DomainResult<()> {
        self.lines.get_by_id(line_id).await?;

        if let Some(schedule_id) = schedule_id {
            self.schedules.get_by_id(schedule_id).await?;
        }

        self.schedules
            .assign_to_line(line_id, schedule_id)
            .await
            .map_err(|err| {
                error!(%line_id, %err, "failed to assign schedule to line");
                err
            })?;

        info!(%line_id, "schedule assignment updated");
        Ok(())
    }

    pub async fn lines_for_schedule(&self, schedule_id: Uuid) -> DomainResult<Vec<ProductionLine>> {
        self.schedules.lines_for_schedule(schedule_id).await
    }
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.is_empty() || name.len() > 100 {
        return Err(DomainError::Validation(
            "name is required and must be at most 100 characters".into(),
        ));
    }
    Ok(())
}

fn validate_timezone(tz: &str) -> DomainResult<()> {
    chrono_tz::Tz::from_str(tz)
        .map(|_| ())
        .map_err(|_| DomainError::InvalidTimezone)
}

fn validate_week(days: &[DayInput]) -> DomainResult<()> {
    if days.len() != 7 {
        return Err(DomainError::Validation(
            "exactly 7 days are required, one per day of week".into(),
        ));
    }

    let mut seen = [false; 7];
    for day in days {
        validate_day(day)?;
        let dow = day.day_of_week.0 as usize;
        if seen[dow] {
            return Err(DomainError::Validation(
                "duplicate day of week in schedule days".into(),
            ));
        }
        seen[dow] = true;
    }

    Ok(())
}
