use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use domain::compliance::LineScheduleRef;
use domain::error::{DomainError, DomainResult};
use domain::line::ProductionLine;
use domain::repository::{ResolvedDay, ResolvedHoliday, ScheduleRepository};
use domain::schedule::{
    BreakInput, CreateExceptionRequest, CreateHolidayRequest, CreateLineExceptionRequest,
    CreateScheduleRequest, DayInput, DayOfWeek, EffectiveBreak, ExceptionBreak, ExceptionDay,
    LineScheduleException, Schedule, ScheduleBreak, ScheduleDay, ScheduleException,
    ScheduleHoliday, ScheduleSummary, UpdateDayRequest, UpdateExceptionRequest,
    UpdateHolidayRequest, UpdateLineExceptionRequest, UpdateScheduleRequest,
};

use super::{internal, is_unique_violation, parse_status};

pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ---------- Row mappers ----------

fn row_to_schedule(row: &PgRow) -> DomainResult<Schedule> {
    Ok(Schedule {
        id: row.try_get("id").map_err(internal)?,
        name: row.try_get("name").map_err(internal)?,
        description: row.try_get("description").map_err(internal)?,
        timezone: row.try_get("timezone").map_err(internal)?,
        days: Vec::new(),
        holidays: Vec::new(),
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
        deleted_at: None,
    })
}

fn row_to_day(row: &PgRow) -> DomainResult<ScheduleDay> {
    Ok(ScheduleDay {
        id: row.try_get("id").map_err(internal)?,
        schedule_id: row.try_get("schedule_id").map_err(internal)?,
        day_of_week: DayOfWeek(row.try_get("day_of_week").map_err(internal)?),
        is_working_day: row.try_get("is_working_day").map_err(internal)?,
        shift_start: row.try_get("shift_start").map_err(internal)?,
        shift_end: row.try_get("shift_end").map_err(internal)?,
        breaks: Vec::new(),
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
    })
}

fn row_to_break(row: &PgRow) -> DomainResult<ScheduleBreak> {
    Ok(ScheduleBreak {
        id: row.try_get("id").map_err(internal)?,
        schedule_day_id: row.try_get("schedule_day_id").map_err(internal)?,
        name: row.try_get("name").map_err(internal)?,
        break_start: row.try_get("break_start").map_err(internal)?,
        break_end: row.try_get("break_end").map_err(internal)?,
        created_at: row.try_get("created_at").map_err(internal)?,
    })
}

fn row_to_holiday(row: &PgRow) -> DomainResult<ScheduleHoliday> {
    Ok(ScheduleHoliday {
        id: row.try_get("id").map_err(internal)?,
        schedule_id: row.try_get("schedule_id").map_err(internal)?,
        holiday_date: row.try_get("holiday_date").map_err(internal)?,
        name: row.try_get("name").map_err(internal)?,
        created_at: row.try_get("created_at").map_err(internal)?,
    })
}

fn row_to_exception_head(row: &PgRow) -> DomainResult<ScheduleException> {
    Ok(ScheduleException {
        id: row.try_get("id").map_err(internal)?,
        schedule_id: row.try_get("schedule_id").map_err(internal)?,
        name: row.try_get("name").map_err(internal)?,
        description: row.try_get("description").map_err(internal)?,
        start_date: row.try_get("start_date").map_err(internal)?,
        end_date: row.try_get("end_date").map_err(internal)?,
        days: Vec::new(),
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
    })
}

fn row_to_line_exception_head(row: &PgRow) -> DomainResult<LineScheduleException> {
    Ok(LineScheduleException {
        id: row.try_get("id").map_err(internal)?,
        schedule_id: row.try_get("schedule_id").map_err(internal)?,
        name: row.try_get("name").map_err(internal)?,
        description: row.try_get("description").map_err(internal)?,
        start_date: row.try_get("start_date").map_err(internal)?,
        end_date: row.try_get("end_date").map_err(internal)?,
        line_ids: Vec::new(),
        days: Vec::new(),
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
    })
}

fn row_to_exception_day(row: &PgRow) -> DomainResult<ExceptionDay> {
    Ok(ExceptionDay {
        id: row.try_get("id").map_err(internal)?,
        exception_id: row.try_get("exception_id").map_err(internal)?,
        day_of_week: DayOfWeek(row.try_get("day_of_week").map_err(internal)?),
        is_working_day: row.try_get("is_working_day").map_err(internal)?,
        shift_start: row.try_get("shift_start").map_err(internal)?,
        shift_end: row.try_get("shift_end").map_err(internal)?,
        breaks: Vec::new(),
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
    })
}

fn row_to_exception_break(row: &PgRow) -> DomainResult<ExceptionBreak> {
    Ok(ExceptionBreak {
        id: row.try_get("id").map_err(internal)?,
        exception_day_id: row.try_get("exception_day_id").map_err(internal)?,
        name: row.try_get("name").map_err(internal)?,
        break_start: row.try_get("break_start").map_err(internal)?,
        break_end: row.try_get("break_end").map_err(internal)?,
        created_at: row.try_get("created_at").map_err(internal)?,
    })
}

// Exception days and breaks live in parallel table pairs for schedule-wide
// and line-scoped exceptions; the shapes are identical.
#[derive(Clone, Copy)]
struct ExceptionTables {
    days: &'static str,
    breaks: &'static str,
}

const SCHEDULE_EXCEPTION_TABLES: ExceptionTables = ExceptionTables {
    days: "schedule_exception_days",
    breaks: "schedule_exception_breaks",
};

const LINE_EXCEPTION_TABLES: ExceptionTables = ExceptionTables {
    days: "line_schedule_exception_days",
    breaks: "line_schedule_exception_breaks",
};

impl PgScheduleRepository {
    async fn schedule_exists(&self, schedule_id: Uuid) -> DomainResult<()> {
        sqlx::query("SELECT id FROM schedules WHERE id = $1 AND deleted_at IS NULL")
            .bind(schedule_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => DomainError::ScheduleNotFound,
                other => internal(other),
            })?;
        Ok(())
    }

    async fn fetch_days(&self, schedule_id: Uuid) -> DomainResult<Vec<ScheduleDay>> {
        let rows = sqlx::query(
            "SELECT id, schedule_id, day_of_week, is_working_day, shift_start, shift_end,
                    created_at, updated_at
             FROM schedule_days
             WHERE schedule_id = $1
             ORDER BY day_of_week ASC",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut days = Vec::with_capacity(rows.len());
        for row in &rows {
            days.push(row_to_day(row)?);
        }

        let day_ids: Vec<Uuid> = days.iter().map(|d| d.id).collect();
        if !day_ids.is_empty() {
            let mut breaks = self.fetch_breaks_for_days(&day_ids).await?;
            for day in &mut days {
                day.breaks = breaks.remove(&day.id).unwrap_or_default();
            }
        }

        Ok(days)
    }

    async fn fetch_breaks_for_days(
        &self,
        day_ids: &[Uuid],
    ) -> DomainResult<HashMap<Uuid, Vec<ScheduleBreak>>> {
        let rows = sqlx::query(
            "SELECT id, schedule_day_id, name, break_start, break_end, created_at
             FROM schedule_breaks
             WHERE schedule_day_id = ANY($1)
             ORDER BY break_start ASC",
        )
        .bind(day_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut map: HashMap<Uuid, Vec<ScheduleBreak>> = HashMap::new();
        for row in &rows {
            let brk = row_to_break(row)?;
            map.entry(brk.schedule_day_id).or_default().push(brk);
        }
        Ok(map)
    }

    async fn fetch_exception_days(
        &self,
        tables: ExceptionTables,
        exception_id: Uuid,
    ) -> DomainResult<Vec<ExceptionDay>> {
        let sql = format!(
            "SELECT id, exception_id, day_of_week, is_working_day, shift_start, shift_end,
                    created_at, updated_at
             FROM {}
             WHERE exception_id = $1
             ORDER BY day_of_week ASC",
            tables.days
        );

        let rows = sqlx::query(&sql)
            .bind(exception_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        let mut days = Vec::with_capacity(rows.len());
        for row in &rows {
            days.push(row_to_exception_day(row)?);
        }

        let day_ids: Vec<Uuid> = days.iter().map(|d| d.id).collect();
        if !day_ids.is_empty() {
            let sql = format!(
                "SELECT id, exception_day_id, name, break_start, break_end, created_at
                 FROM {}
                 WHERE exception_day_id = ANY($1)
                 ORDER BY break_start ASC",
                tables.breaks
            );

            let rows = sqlx::query(&sql)
                .bind(day_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(internal)?;

            let mut map: HashMap<Uuid, Vec<ExceptionBreak>> = HashMap::new();
            for row in &rows {
                let brk = row_to_exception_break(row)?;
                map.entry(brk.exception_day_id).or_default().push(brk);
            }
            for day in &mut days {
                day.breaks = map.remove(&day.id).unwrap_or_default();
            }
        }

        Ok(days)
    }

    async fn insert_exception_days(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tables: ExceptionTables,
        exception_id: Uuid,
        days: &[DayInput],
    ) -> DomainResult<()> {
        for day in days {
            let sql = format!(
                "INSERT INTO {} (exception_id, day_of_week, is_working_day, shift_start, shift_end)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id",
                tables.days
            );

            let row = sqlx::query(&sql)
                .bind(exception_id)
                .bind(day.day_of_week.0)
                .bind(day.is_working_day)
                .bind(day.shift_start)
                .bind(day.shift_end)
                .fetch_one(&mut **tx)
                .await
                .map_err(internal)?;

            let day_id: Uuid = row.try_get("id").map_err(internal)?;
            self.insert_breaks(tx, tables.breaks, "exception_day_id", day_id, &day.breaks)
                .await?;
        }
        Ok(())
    }

    async fn insert_breaks(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        fk_column: &str,
        day_id: Uuid,
        breaks: &[BreakInput],
    ) -> DomainResult<()> {
        for brk in breaks {
            let sql = format!(
                "INSERT INTO {table} ({fk_column}, name, break_start, break_end)
                 VALUES ($1, $2, $3, $4)"
            );

            sqlx::query(&sql)
                .bind(day_id)
                .bind(brk.name.as_deref())
                .bind(brk.break_start)
                .bind(brk.break_end)
                .execute(&mut **tx)
                .await
                .map_err(internal)?;
        }
        Ok(())
    }

    async fn fetch_effective_breaks(
        &self,
        table: &str,
        fk_column: &str,
        day_id: Uuid,
    ) -> DomainResult<Vec<EffectiveBreak>> {
        let sql = format!(
            "SELECT name, break_start, break_end
             FROM {table}
             WHERE {fk_column} = $1
             ORDER BY break_start ASC"
        );

        let rows = sqlx::query(&sql)
            .bind(day_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        let mut breaks = Vec::with_capacity(rows.len());
        for row in &rows {
            breaks.push(EffectiveBreak {
                name: row.try_get("name").map_err(internal)?,
                break_start: row.try_get("break_start").map_err(internal)?,
                break_end: row.try_get("break_end").map_err(internal)?,
            });
        }
        Ok(breaks)
    }

    async fn resolved_day_from_row(
        &self,
        row: &PgRow,
        breaks_table: &str,
        breaks_fk: &str,
    ) -> DomainResult<ResolvedDay> {
        let day_id: Uuid = row.try_get("day_id").map_err(internal)?;

        Ok(ResolvedDay {
            source_id: row.try_get("source_id").map_err(internal)?,
            source_name: row.try_get("source_name").map_err(internal)?,
            is_working_day: row.try_get("is_working_day").map_err(internal)?,
            shift_start: row.try_get("shift_start").map_err(internal)?,
            shift_end: row.try_get("shift_end").map_err(internal)?,
            breaks: self
                .fetch_effective_breaks(breaks_table, breaks_fk, day_id)
                .await?,
        })
    }

    async fn fetch_line_ids(&self, exception_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT line_id FROM line_schedule_exception_lines WHERE exception_id = $1",
        )
        .bind(exception_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.iter()
            .map(|row| row.try_get("line_id").map_err(internal))
            .collect()
    }

    /// True when `[start, end]` overlaps another line exception for any of
    /// the given lines. `exclude` skips the exception being updated.
    async fn line_exception_overlaps(
        &self,
        schedule_id: Uuid,
        line_ids: &[Uuid],
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<Uuid>,
    ) -> DomainResult<bool> {
        let mut sql = String::from(
            "SELECT EXISTS(
                 SELECT 1 FROM line_schedule_exceptions lse
                 JOIN line_schedule_exception_lines lsel ON lsel.exception_id = lse.id
                 WHERE lse.schedule_id = $1
                   AND lsel.line_id = ANY($2)
                   AND lse.start_date <= $4
                   AND lse.end_date >= $3",
        );
        if exclude.is_some() {
            sql.push_str(" AND lse.id <> $5");
        }
        sql.push_str(") AS overlaps");

        let mut query = sqlx::query(&sql)
            .bind(schedule_id)
            .bind(line_ids.to_vec())
            .bind(start)
            .bind(end);
        if let Some(id) = exclude {
            query = query.bind(id);
        }

        let row = query.fetch_one(&self.pool).await.map_err(internal)?;
        row.try_get("overlaps").map_err(internal)
    }

    async fn exception_overlaps(
        &self,
        schedule_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<Uuid>,
    ) -> DomainResult<bool> {
        let mut sql = String::from(
            "SELECT EXISTS(
                 SELECT 1 FROM schedule_exceptions
                 WHERE schedule_id = $1
                   AND start_date <= $3
                   AND end_date >= $2",
        );
        if exclude.is_some() {
            sql.push_str(" AND id <> $4");
        }
        sql.push_str(") AS overlaps");

        let mut query = sqlx::query(&sql).bind(schedule_id).bind(start).bind(end);
        if let Some(id) = exclude {
            query = query.bind(id);
        }

        let row = query.fetch_one(&self.pool).await.map_err(internal)?;
        row.try_get("overlaps").map_err(internal)
    }
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn create(&self, req: &CreateScheduleRequest) -> DomainResult<Schedule> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        let row = sqlx::query(
            "INSERT INTO schedules (name, description, timezone)
             VALUES ($1, $2, $3)
             RETURNING id, name, description, timezone, created_at, updated_at",
        )
        .bind(&req.name)
        .bind(req.description.as_deref())
        .bind(&req.timezone)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DomainError::ScheduleNameExists
            } else {
                internal(err)
            }
        })?;

        let mut schedule = row_to_schedule(&row)?;

        for day in &req.days {
            let row = sqlx::query(
                "INSERT INTO schedule_days
                     (schedule_id, day_of_week, is_working_day, shift_start, shift_end)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id, schedule_id, day_of_week, is_working_day, shift_start, shift_end,
                           created_at, updated_at",
            )
            .bind(schedule.id)
            .bind(day.day_of_week.0)
            .bind(day.is_working_day)
            .bind(day.shift_start)
            .bind(day.shift_end)
            .fetch_one(&mut *tx)
            .await
            .map_err(internal)?;

            let inserted = row_to_day(&row)?;
            self.insert_breaks(&mut tx, "schedule_breaks", "schedule_day_id", inserted.id, &day.breaks)
                .await?;
            schedule.days.push(inserted);
        }

        tx.commit().await.map_err(internal)?;

        Ok(schedule)
    }

    async fn get_by_id(&self, id: Uuid) -> DomainResult<Schedule> {
        let row = sqlx::query(
            "SELECT id, name, description, timezone, created_at, updated_at
             FROM schedules
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::ScheduleNotFound,
            other => internal(other),
        })?;

        let mut schedule = row_to_schedule(&row)?;
        schedule.days = self.fetch_days(schedule.id).await?;
        schedule.holidays = self.holidays(schedule.id, None).await?;

        Ok(schedule)
    }

    async fn list(&self) -> DomainResult<Vec<ScheduleSummary>> {
        let rows = sqlx::query(
            "SELECT s.id, s.name, s.description, s.timezone, s.created_at, s.updated_at,
                    COUNT(pl.id) AS line_count
             FROM schedules s
             LEFT JOIN production_lines pl ON pl.schedule_id = s.id AND pl.deleted_at IS NULL
             WHERE s.deleted_at IS NULL
             GROUP BY s.id, s.name, s.description, s.timezone, s.created_at, s.updated_at
             ORDER BY s.name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            summaries.push(ScheduleSummary {
                id: row.try_get("id").map_err(internal)?,
                name: row.try_get("name").map_err(internal)?,
                description: row.try_get("description").map_err(internal)?,
                timezone: row.try_get("timezone").map_err(internal)?,
                line_count: row.try_get("line_count").map_err(internal)?,
                created_at: row.try_get("created_at").map_err(internal)?,
                updated_at: row.try_get("updated_at").map_err(internal)?,
            });
        }

        Ok(summaries)
    }

    async fn update(&self, id: Uuid, req: &UpdateScheduleRequest) -> DomainResult<Schedule> {
        let row = sqlx::query(
            "UPDATE schedules
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 timezone = COALESCE($4, timezone),
                 updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING id, name, description, timezone, created_at, updated_at",
        )
        .bind(id)
        .bind(req.name.as_deref())
        .bind(req.description.as_deref())
        .bind(req.timezone.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                return DomainError::ScheduleNameExists;
            }
            match err {
                sqlx::Error::RowNotFound => DomainError::ScheduleNotFound,
                other => internal(other),
            }
        })?;

        let mut schedule = row_to_schedule(&row)?;
        schedule.days = self.fetch_days(schedule.id).await?;

        Ok(schedule)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE schedules
             SET deleted_at = now(), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ScheduleNotFound);
        }

        Ok(())
    }

    // ---------- Days ----------

    async fn get_day(&self, day_id: Uuid) -> DomainResult<ScheduleDay> {
        let row = sqlx::query(
            "SELECT id, schedule_id, day_of_week, is_working_day, shift_start, shift_end,
                    created_at, updated_at
             FROM schedule_days
             WHERE id = $1",
        )
        .bind(day_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::ScheduleDayNotFound,
            other => internal(other),
        })?;

        let mut day = row_to_day(&row)?;
        let mut breaks = self.fetch_breaks_for_days(&[day.id]).await?;
        day.breaks = breaks.remove(&day.id).unwrap_or_default();

        Ok(day)
    }

    async fn update_day(&self, day_id: Uuid, req: &UpdateDayRequest) -> DomainResult<ScheduleDay> {
        let current = self.get_day(day_id).await?;

        let is_working_day = req.is_working_day.unwrap_or(current.is_working_day);
        let (shift_start, shift_end) = if is_working_day {
            let start = req.shift_start.or(current.shift_start);
            let end = req.shift_end.or(current.shift_end);
            if start.is_none() || end.is_none() {
                return Err(DomainError::MissingShiftTimes);
            }
            (start, end)
        } else {
            (None, None)
        };

        let row = sqlx::query(
            "UPDATE schedule_days
             SET is_working_day = $2, shift_start = $3, shift_end = $4, updated_at = now()
             WHERE id = $1
             RETURNING id, schedule_id, day_of_week, is_working_day, shift_start, shift_end,
                       created_at, updated_at",
        )
        .bind(day_id)
        .bind(is_working_day)
        .bind(shift_start)
        .bind(shift_end)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;

        let mut day = row_to_day(&row)?;
        day.breaks = current.breaks;

        Ok(day)
    }

    async fn set_day_breaks(
        &self,
        day_id: Uuid,
        breaks: &[BreakInput],
    ) -> DomainResult<Vec<ScheduleBreak>> {
        self.get_day(day_id).await?;

        let mut tx = self.pool.begin().await.map_err(internal)?;

        sqlx::query("DELETE FROM schedule_breaks WHERE schedule_day_id = $1")
            .bind(day_id)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

        self.insert_breaks(&mut tx, "schedule_breaks", "schedule_day_id", day_id, breaks)
            .await?;

        tx.commit().await.map_err(internal)?;

        let mut map = self.fetch_breaks_for_days(&[day_id]).await?;
        Ok(map.remove(&day_id).unwrap_or_default())
    }

    // ---------- Holidays ----------

    async fn holidays(
        &self,
        schedule_id: Uuid,
        year: Option<i32>,
    ) -> DomainResult<Vec<ScheduleHoliday>> {
        let rows = match year {
            Some(year) => {
                sqlx::query(
                    "SELECT id, schedule_id, holiday_date, name, created_at
                     FROM schedule_holidays
                     WHERE schedule_id = $1 AND EXTRACT(YEAR FROM holiday_date)::int = $2
                     ORDER BY holiday_date ASC",
                )
                .bind(schedule_id)
                .bind(year)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, schedule_id, holiday_date, name, created_at
                     FROM schedule_holidays
                     WHERE schedule_id = $1
                     ORDER BY holiday_date ASC",
                )
                .bind(schedule_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(internal)?;

        let mut holidays = Vec::with_capacity(rows.len());
        for row in &rows {
            holidays.push(row_to_holiday(row)?);
        }
        Ok(holidays)
    }

    async fn create_holiday(
        &self,
        schedule_id: Uuid,
        req: &CreateHolidayRequest,
    ) -> DomainResult<ScheduleHoliday> {
        self.schedule_exists(schedule_id).await?;

        let row = sqlx::query(
            "INSERT INTO schedule_holidays (schedule_id, holiday_date, name)
             VALUES ($1, $2, $3)
             RETURNING id, schedule_id, holiday_date, name, created_at",
        )
        .bind(schedule_id)
        .bind(req.holiday_date)
        .bind(req.name.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DomainError::HolidayDateExists
            } else {
                internal(err)
            }
        })?;

        row_to_holiday(&row)
    }

    async fn get_holiday(&self, holiday_id: Uuid) -> DomainResult<ScheduleHoliday> {
        let row = sqlx::query(
            "SELECT id, schedule_id, holiday_date, name, created_at
             FROM schedule_holidays
             WHERE id = $1",
        )
        .bind(holiday_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::HolidayNotFound,
            other => internal(other),
        })?;

        row_to_holiday(&row)
    }

    async fn update_holiday(
        &self,
        holiday_id: Uuid,
        req: &UpdateHolidayRequest,
    ) -> DomainResult<ScheduleHoliday> {
        let row = sqlx::query(
            "UPDATE schedule_holidays
             SET holiday_date = COALESCE($2, holiday_date),
                 name = COALESCE($3, name)
             WHERE id = $1
             RETURNING id, schedule_id, holiday_date, name, created_at",
        )
        .bind(holiday_id)
        .bind(req.holiday_date)
        .bind(req.name.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                return DomainError::HolidayDateExists;
            }
            match err {
                sqlx::Error::RowNotFound => DomainError::HolidayNotFound,
                other => internal(other),
            }
        })?;

        row_to_holiday(&row)
    }

    async fn delete_holiday(&self, holiday_id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM schedule_holidays WHERE id = $1")
            .bind(holiday_id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::HolidayNotFound);
        }

        Ok(())
    }

    // ---------- Schedule exceptions ----------

    async fn exceptions(&self, schedule_id: Uuid) -> DomainResult<Vec<ScheduleException>> {
        let rows = sqlx::query(
            "SELECT id, schedule_id, name, description, start_date, end_date,
                    created_at, updated_at
             FROM schedule_exceptions
             WHERE schedule_id = $1
             ORDER BY start_date ASC",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut exceptions = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut exception = row_to_exception_head(row)?;
            exception.days = self
                .fetch_exception_days(SCHEDULE_EXCEPTION_TABLES, exception.id)
                .await?;
            exceptions.push(exception);
        }

        Ok(exceptions)
    }

    async fn create_exception(
        &self,
        schedule_id: Uuid,
        req: &CreateExceptionRequest,
    ) -> DomainResult<ScheduleException> {
        self.schedule_exists(schedule_id).await?;

        if self
            .exception_overlaps(schedule_id, req.start_date, req.end_date, None)
            .await?
        {
            return Err(DomainError::ExceptionDatesOverlap);
        }

        let mut tx = self.pool.begin().await.map_err(internal)?;

        let row = sqlx::query(
            "INSERT INTO schedule_exceptions (schedule_id, name, description, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, schedule_id, name, description, start_date, end_date,
                       created_at, updated_at",
        )
        .bind(schedule_id)
        .bind(&req.name)
        .bind(req.description.as_deref())
        .bind(req.start_date)
        .bind(req.end_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(internal)?;

        let exception = row_to_exception_head(&row)?;

        self.insert_exception_days(&mut tx, SCHEDULE_EXCEPTION_TABLES, exception.id, &req.days)
            .await?;

        tx.commit().await.map_err(internal)?;

        self.get_exception(exception.id).await
    }

    async fn get_exception(&self, exception_id: Uuid) -> DomainResult<ScheduleException> {
        let row = sqlx::query(
            "SELECT id, schedule_id, name, description, start_date, end_date,
                    created_at, updated_at
             FROM schedule_exceptions
             WHERE id = $1",
        )
        .bind(exception_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::ExceptionNotFound,
            other => internal(other),
        })?;

        let mut exception = row_to_exception_head(&row)?;
        exception.days = self
            .fetch_exception_days(SCHEDULE_EXCEPTION_TABLES, exception.id)
            .await?;

        Ok(exception)
    }

    async fn update_exception(
        &self,
        exception_id: Uuid,
        req: &UpdateExceptionRequest,
    ) -> DomainResult<ScheduleException> {
        let current = self.get_exception(exception_id).await?;

        let start = req.start_date.unwrap_or(current.start_date);
        let end = req.end_date.unwrap_or(current.end_date);
        if start > end {
            return Err(DomainError::InvalidDateRange);
        }

        if self
            .exception_overlaps(current.schedule_id, start, end, Some(exception_id))
            .await?
        {
            return Err(DomainError::ExceptionDatesOverlap);
        }

        sqlx::query(
            "UPDATE schedule_exceptions
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 start_date = $4,
                 end_date = $5,
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(exception_id)
        .bind(req.name.as_deref())
        .bind(req.description.as_deref())
        .bind(start)
        .bind(end)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        self.get_exception(exception_id).await
    }

    async fn delete_exception(&self, exception_id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM schedule_exceptions WHERE id = $1")
            .bind(exception_id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ExceptionNotFound);
        }

        Ok(())
    }

    // ---------- Line exceptions ----------

    async fn line_exceptions(
        &self,
        schedule_id: Uuid,
    ) -> DomainResult<Vec<LineScheduleException>> {
        let rows = sqlx::query(
            "SELECT id, schedule_id, name, description, start_date, end_date,
                    created_at, updated_at
             FROM line_schedule_exceptions
             WHERE schedule_id = $1
             ORDER BY start_date ASC",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut exceptions = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut exception = row_to_line_exception_head(row)?;
            exception.line_ids = self.fetch_line_ids(exception.id).await?;
            exception.days = self
                .fetch_exception_days(LINE_EXCEPTION_TABLES, exception.id)
                .await?;
            exceptions.push(exception);
        }

        Ok(exceptions)
    }

    async fn create_line_exception(
        &self,
        schedule_id: Uuid,
        req: &CreateLineExceptionRequest,
    ) -> DomainResult<LineScheduleException> {
        self.schedule_exists(schedule_id).await?;

        // Overlap is checked per line, not per schedule: two line
        // exceptions may share dates as long as their line sets are
        // disjoint.
        if self
            .line_exception_overlaps(schedule_id, &req.line_ids, req.start_date, req.end_date, None)
            .await?
        {
            return Err(DomainError::LineExceptionLinesOverlap);
        }

        let mut tx = self.pool.begin().await.map_err(internal)?;

        let row = sqlx::query(
            "INSERT INTO line_schedule_exceptions
                 (schedule_id, name, description, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, schedule_id, name, description, start_date, end_date,
                       created_at, updated_at",
        )
        .bind(schedule_id)
        .bind(&req.name)
        .bind(req.description.as_deref())
        .bind(req.start_date)
        .bind(req.end_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(internal)?;

        let exception = row_to_line_exception_head(&row)?;

        for line_id in &req.line_ids {
            sqlx::query(
                "INSERT INTO line_schedule_exception_lines (exception_id, line_id)
                 VALUES ($1, $2)",
            )
            .bind(exception.id)
            .bind(line_id)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        }

        self.insert_exception_days(&mut tx, LINE_EXCEPTION_TABLES, exception.id, &req.days)
            .await?;

        tx.commit().await.map_err(internal)?;

        self.get_line_exception(exception.id).await
    }

    async fn get_line_exception(
        &self,
        exception_id: Uuid,
    ) -> DomainResult<LineScheduleException> {
        let row = sqlx::query(
            "SELECT id, schedule_id, name, description, start_date, end_date,
                    created_at, updated_at
             FROM line_schedule_exceptions
             WHERE id = $1",
        )
        .bind(exception_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::LineExceptionNotFound,
            other => internal(other),
        })?;

        let mut exception = row_to_line_exception_head(&row)?;
        exception.line_ids = self.fetch_line_ids(exception.id).await?;
        exception.days = self
            .fetch_exception_days(LINE_EXCEPTION_TABLES, exception.id)
            .await?;

        Ok(exception)
    }

    async fn update_line_exception(
        &self,
        exception_id: Uuid,
        req: &UpdateLineExceptionRequest,
    ) -> DomainResult<LineScheduleException> {
        let current = self.get_line_exception(exception_id).await?;

        let start = req.start_date.unwrap_or(current.start_date);
        let end = req.end_date.unwrap_or(current.end_date);
        if start > end {
            return Err(DomainError::InvalidDateRange);
        }

        let line_ids = req.line_ids.as_ref().unwrap_or(&current.line_ids);
        if self
            .line_exception_overlaps(current.schedule_id, line_ids, start, end, Some(exception_id))
            .await?
        {
            return Err(DomainError::LineExceptionLinesOverlap);
        }

        let mut tx = self.pool.begin().await.map_err(internal)?;

        sqlx::query(
            "UPDATE line_schedule_exceptions
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 start_date = $4,
                 end_date = $5,
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(exception_id)
        .bind(req.name.as_deref())
        .bind(req.description.as_deref())
        .bind(start)
        .bind(end)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        if let Some(line_ids) = &req.line_ids {
            sqlx::query("DELETE FROM line_schedule_exception_lines WHERE exception_id = $1")
                .bind(exception_id)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;

            for line_id in line_ids {
                sqlx::query(
                    "INSERT INTO line_schedule_exception_lines (exception_id, line_id)
                     VALUES ($1, $2)",
                )
                .bind(exception_id)
                .bind(line_id)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            }
        }

        tx.commit().await.map_err(internal)?;

        self.get_line_exception(exception_id).await
    }

    async fn delete_line_exception(&self, exception_id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM line_schedule_exceptions WHERE id = $1")
            .bind(exception_id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::LineExceptionNotFound);
        }

        Ok(())
    }

    // ---------- Line assignment ----------

    async fn assign_to_line(&self, line_id: Uuid, schedule_id: Option<Uuid>) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE production_lines
             SET schedule_id = $2, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(line_id)
        .bind(schedule_id)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }

    async fn lines_for_schedule(&self, schedule_id: Uuid) -> DomainResult<Vec<ProductionLine>> {
        let rows = sqlx::query(
            "SELECT id, code, name, description, status, schedule_id, created_at, updated_at
             FROM production_lines
             WHERE schedule_id = $1 AND deleted_at IS NULL
             ORDER BY code ASC",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            let status: String = row.try_get("status").map_err(internal)?;
            lines.push(ProductionLine {
                id: row.try_get("id").map_err(internal)?,
                code: row.try_get("code").map_err(internal)?,
                name: row.try_get("name").map_err(internal)?,
                description: row.try_get("description").map_err(internal)?,
                status: parse_status(&status)?,
                schedule_id: row.try_get("schedule_id").map_err(internal)?,
                labels: Vec::new(),
                created_at: row.try_get("created_at").map_err(internal)?,
                updated_at: row.try_get("updated_at").map_err(internal)?,
                deleted_at: None,
            });
        }

        Ok(lines)
    }

    // ---------- Resolver lookups ----------

    async fn line_schedule_ref(&self, line_id: Uuid) -> DomainResult<LineScheduleRef> {
        let row = sqlx::query(
            "SELECT pl.id, pl.code, pl.name, pl.schedule_id, s.name AS schedule_name
             FROM production_lines pl
             LEFT JOIN schedules s ON s.id = pl.schedule_id AND s.deleted_at IS NULL
             WHERE pl.id = $1 AND pl.deleted_at IS NULL",
        )
        .bind(line_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::NotFound,
            other => internal(other),
        })?;

        Ok(LineScheduleRef {
            id: row.try_get("id").map_err(internal)?,
            code: row.try_get("code").map_err(internal)?,
            name: row.try_get("name").map_err(internal)?,
            schedule_id: row.try_get("schedule_id").map_err(internal)?,
            schedule_name: row.try_get("schedule_name").map_err(internal)?,
        })
    }

    async fn find_line_exception_day(
        &self,
        schedule_id: Uuid,
        line_id: Uuid,
        date: NaiveDate,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        let row = sqlx::query(
            "SELECT lse.id AS source_id, lse.name AS source_name,
                    lsed.is_working_day, lsed.shift_start, lsed.shift_end, lsed.id AS day_id
             FROM line_schedule_exceptions lse
             JOIN line_schedule_exception_lines lsel ON lsel.exception_id = lse.id
             JOIN line_schedule_exception_days lsed ON lsed.exception_id = lse.id
             WHERE lse.schedule_id = $1
               AND lsel.line_id = $2
               AND $3 BETWEEN lse.start_date AND lse.end_date
               AND lsed.day_of_week = $4
             LIMIT 1",
        )
        .bind(schedule_id)
        .bind(line_id)
        .bind(date)
        .bind(dow.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        match row {
            Some(row) => Ok(Some(
                self.resolved_day_from_row(&row, "line_schedule_exception_breaks", "exception_day_id")
                    .await?,
            )),
            None => Ok(None),
        }
    }

    async fn find_exception_day(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        let row = sqlx::query(
            "SELECT se.id AS source_id, se.name AS source_name,
                    sed.is_working_day, sed.shift_start, sed.shift_end, sed.id AS day_id
             FROM schedule_exceptions se
             JOIN schedule_exception_days sed ON sed.exception_id = se.id
             WHERE se.schedule_id = $1
               AND $2 BETWEEN se.start_date AND se.end_date
               AND sed.day_of_week = $3
             LIMIT 1",
        )
        .bind(schedule_id)
        .bind(date)
        .bind(dow.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        match row {
            Some(row) => Ok(Some(
                self.resolved_day_from_row(&row, "schedule_exception_breaks", "exception_day_id")
                    .await?,
            )),
            None => Ok(None),
        }
    }

    async fn find_holiday(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
    ) -> DomainResult<Option<ResolvedHoliday>> {
        let row = sqlx::query(
            "SELECT id, name
             FROM schedule_holidays
             WHERE schedule_id = $1 AND holiday_date = $2
             LIMIT 1",
        )
        .bind(schedule_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        match row {
            Some(row) => Ok(Some(ResolvedHoliday {
                id: row.try_get("id").map_err(internal)?,
                name: row.try_get("name").map_err(internal)?,
            })),
            None => Ok(None),
        }
    }

    async fn base_day(
        &self,
        schedule_id: Uuid,
        dow: DayOfWeek,
    ) -> DomainResult<Option<ResolvedDay>> {
        let row = sqlx::query(
            "SELECT sd.id AS source_id, NULL::varchar AS source_name,
                    sd.is_working_day, sd.shift_start, sd.shift_end, sd.id AS day_id
             FROM schedule_days sd
             WHERE sd.schedule_id = $1 AND sd.day_of_week = $2
             LIMIT 1",
        )
        .bind(schedule_id)
        .bind(dow.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        match row {
            Some(row) => Ok(Some(
                self.resolved_day_from_row(&row, "schedule_breaks", "schedule_day_id")
                    .await?,
            )),
            None => Ok(None),
        }
    }
}
