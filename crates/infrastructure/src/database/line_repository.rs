use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use domain::compliance::LineScheduleRef;
use domain::error::{DomainError, DomainResult};
use domain::line::{CreateLineRequest, ProductionLine, Status, UpdateLineRequest};
use domain::repository::LineRepository;

use super::label_repository::fetch_labels_for_line;
use super::{internal, is_unique_violation, parse_status};

pub struct PgLineRepository {
    pool: PgPool,
}

impl PgLineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_line(row: &PgRow) -> DomainResult<ProductionLine> {
    let status: String = row.try_get("status").map_err(internal)?;

    Ok(ProductionLine {
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
    })
}

const LINE_COLUMNS: &str = "id, code, name, description, status, schedule_id, created_at, updated_at";

#[async_trait]
impl LineRepository for PgLineRepository {
    async fn create(&self, req: &CreateLineRequest) -> DomainResult<ProductionLine> {
        let row = sqlx::query(&format!(
            "INSERT INTO production_lines (code, name, description)
             VALUES ($1, $2, $3)
             RETURNING {LINE_COLUMNS}"
        ))
        .bind(&req.code)
        .bind(&req.name)
        .bind(req.description.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DomainError::CodeExists
            } else {
                internal(err)
            }
        })?;

        row_to_line(&row)
    }

    async fn get_by_id(&self, id: Uuid) -> DomainResult<ProductionLine> {
        let row = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM production_lines
             WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::NotFound,
            other => internal(other),
        })?;

        let mut line = row_to_line(&row)?;
        line.labels = fetch_labels_for_line(&self.pool, line.id).await?;
        Ok(line)
    }

    async fn get_by_code(&self, code: &str) -> DomainResult<ProductionLine> {
        let row = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM production_lines
             WHERE code = $1 AND deleted_at IS NULL"
        ))
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::NotFound,
            other => internal(other),
        })?;

        row_to_line(&row)
    }

    async fn list(&self) -> DomainResult<Vec<ProductionLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM production_lines
             WHERE deleted_at IS NULL
             ORDER BY code ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            lines.push(row_to_line(row)?);
        }

        self.attach_labels(&mut lines).await?;
        Ok(lines)
    }

    async fn update(&self, id: Uuid, req: &UpdateLineRequest) -> DomainResult<ProductionLine> {
        let row = sqlx::query(&format!(
            "UPDATE production_lines
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {LINE_COLUMNS}"
        ))
        .bind(id)
        .bind(req.name.as_deref())
        .bind(req.description.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::NotFound,
            other => internal(other),
        })?;

        row_to_line(&row)
    }

    async fn update_status(&self, id: Uuid, status: Status) -> DomainResult<ProductionLine> {
        let row = sqlx::query(&format!(
            "UPDATE production_lines
             SET status = $2, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {LINE_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::NotFound,
            other => internal(other),
        })?;

        row_to_line(&row)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE production_lines
             SET deleted_at = now(), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }

    async fn list_schedule_refs(
        &self,
        line_ids: &[Uuid],
        label_ids: &[Uuid],
    ) -> DomainResult<Vec<LineScheduleRef>> {
        let mut sql = String::from(
            "SELECT pl.id, pl.code, pl.name, pl.schedule_id, s.name AS schedule_name
             FROM production_lines pl
             LEFT JOIN schedules s ON s.id = pl.schedule_id AND s.deleted_at IS NULL
             WHERE pl.deleted_at IS NULL",
        );

        let mut arg = 0;
        if !line_ids.is_empty() {
            arg += 1;
            sql.push_str(&format!(" AND pl.id = ANY(${arg})"));
        }
        if !label_ids.is_empty() {
            arg += 1;
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM production_line_labels pll
                   WHERE pll.line_id = pl.id AND pll.label_id = ANY(${arg}))"
            ));
        }
        sql.push_str(" ORDER BY pl.code");

        let mut query = sqlx::query(&sql);
        if !line_ids.is_empty() {
            query = query.bind(line_ids.to_vec());
        }
        if !label_ids.is_empty() {
            query = query.bind(label_ids.to_vec());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(internal)?;

        let mut refs = Vec::with_capacity(rows.len());
        for row in rows {
            refs.push(LineScheduleRef {
                id: row.try_get("id").map_err(internal)?,
                code: row.try_get("code").map_err(internal)?,
                name: row.try_get("name").map_err(internal)?,
                schedule_id: row.try_get("schedule_id").map_err(internal)?,
                schedule_name: row.try_get("schedule_name").map_err(internal)?,
            });
        }

        Ok(refs)
    }
}

impl PgLineRepository {
    /// Loads labels for all lines in one query instead of N.
    async fn attach_labels(&self, lines: &mut [ProductionLine]) -> DomainResult<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let line_ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();

        let rows = sqlx::query(
            "SELECT pll.line_id, l.id, l.name, l.color, l.description, l.created_at, l.updated_at
             FROM labels l
             INNER JOIN production_line_labels pll ON l.id = pll.label_id
             WHERE pll.line_id = ANY($1)
             ORDER BY pll.line_id, l.name",
        )
        .bind(line_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut labels_by_line: HashMap<Uuid, Vec<domain::label::Label>> = HashMap::new();
        for row in rows {
            let line_id: Uuid = row.try_get("line_id").map_err(internal)?;
            labels_by_line
                .entry(line_id)
                .or_default()
                .push(domain::label::Label {
                    id: row.try_get("id").map_err(internal)?,
                    name: row.try_get("name").map_err(internal)?,
                    color: row.try_get("color").map_err(internal)?,
                    description: row.try_get("description").map_err(internal)?,
                    created_at: row.try_get("created_at").map_err(internal)?,
                    updated_at: row.try_get("updated_at").map_err(internal)?,
                });
        }

        for line in lines {
            line.labels = labels_by_line.remove(&line.id).unwrap_or_default();
        }

        Ok(())
    }
}
