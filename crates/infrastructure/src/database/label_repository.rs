use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use domain::error::{DomainError, DomainResult};
use domain::label::{CreateLabelRequest, Label, UpdateLabelRequest};
use domain::repository::LabelRepository;

use super::{internal, is_unique_violation};

pub struct PgLabelRepository {
    pool: PgPool,
}

impl PgLabelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_label(row: &PgRow) -> DomainResult<Label> {
    Ok(Label {
        id: row.try_get("id").map_err(internal)?,
        name: row.try_get("name").map_err(internal)?,
        color: row.try_get("color").map_err(internal)?,
        description: row.try_get("description").map_err(internal)?,
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
    })
}

/// Labels of one line, name-ordered. Shared with the line repository.
pub(crate) async fn fetch_labels_for_line(
    pool: &PgPool,
    line_id: Uuid,
) -> DomainResult<Vec<Label>> {
    let rows = sqlx::query(
        "SELECT l.id, l.name, l.color, l.description, l.created_at, l.updated_at
         FROM labels l
         INNER JOIN production_line_labels pll ON l.id = pll.label_id
         WHERE pll.line_id = $1
         ORDER BY l.name ASC",
    )
    .bind(line_id)
    .fetch_all(pool)
    .await
    .map_err(internal)?;

    let mut labels = Vec::with_capacity(rows.len());
    for row in &rows {
        labels.push(row_to_label(row)?);
    }
    Ok(labels)
}

#[async_trait]
impl LabelRepository for PgLabelRepository {
    async fn create(&self, req: &CreateLabelRequest) -> DomainResult<Label> {
        let row = sqlx::query(
            "INSERT INTO labels (name, color, description)
             VALUES ($1, $2, $3)
             RETURNING id, name, color, description, created_at, updated_at",
        )
        .bind(&req.name)
        .bind(req.color.as_deref())
        .bind(req.description.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DomainError::LabelNameExists
            } else {
                internal(err)
            }
        })?;

        row_to_label(&row)
    }

    async fn get_by_id(&self, id: Uuid) -> DomainResult<Label> {
        let row = sqlx::query(
            "SELECT id, name, color, description, created_at, updated_at
             FROM labels WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => DomainError::LabelNotFound,
            other => internal(other),
        })?;

        row_to_label(&row)
    }

    async fn list(&self) -> DomainResult<Vec<Label>> {
        let rows = sqlx::query(
            "SELECT id, name, color, description, created_at, updated_at
             FROM labels ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        let mut labels = Vec::with_capacity(rows.len());
        for row in &rows {
            labels.push(row_to_label(row)?);
        }
        Ok(labels)
    }

    async fn update(&self, id: Uuid, req: &UpdateLabelRequest) -> DomainResult<Label> {
        let row = sqlx::query(
            "UPDATE labels
             SET name = COALESCE($2, name),
                 color = COALESCE($3, color),
                 description = COALESCE($4, description),
                 updated_at = now()
             WHERE id = $1
             RETURNING id, name, color, description, created_at, updated_at",
        )
        .bind(id)
        .bind(req.name.as_deref())
        .bind(req.color.as_deref())
        .bind(req.description.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                return DomainError::LabelNameExists;
            }
            match err {
                sqlx::Error::RowNotFound => DomainError::LabelNotFound,
                other => internal(other),
            }
        })?;

        row_to_label(&row)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        // The join table cascades, detaching the label from all lines.
        let result = sqlx::query("DELETE FROM labels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::LabelNotFound);
        }

        Ok(())
    }

    async fn assign_to_line(&self, line_id: Uuid, label_ids: &[Uuid]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        sqlx::query("DELETE FROM production_line_labels WHERE line_id = $1")
            .bind(line_id)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;

        for label_id in label_ids {
            sqlx::query("INSERT INTO production_line_labels (line_id, label_id) VALUES ($1, $2)")
                .bind(line_id)
                .bind(label_id)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
        }

        tx.commit().await.map_err(internal)
    }

    async fn labels_for_line(&self, line_id: Uuid) -> DomainResult<Vec<Label>> {
        fetch_labels_for_line(&self.pool, line_id).await
    }
}
