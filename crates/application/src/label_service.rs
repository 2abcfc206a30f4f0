use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use domain::error::{DomainError, DomainResult};
use domain::label::{AssignLabelsRequest, CreateLabelRequest, Label, UpdateLabelRequest};
use domain::repository::{LabelRepository, LineRepository};

/// Business logic for labels and their line assignments.
pub struct LabelService {
    labels: Arc<dyn LabelRepository>,
    lines: Arc<dyn LineRepository>,
}

impl LabelService {
    pub fn new(labels: Arc<dyn LabelRepository>, lines: Arc<dyn LineRepository>) -> Self {
        Self { labels, lines }
    }

    pub async fn create(&self, req: CreateLabelRequest) -> DomainResult<Label> {
        validate_label_fields(&req.name, req.color.as_deref())?;

        let label = self.labels.create(&req).await.map_err(|err| {
            error!(name = %req.name, %err, "failed to create label");
            err
        })?;

        info!(id = %label.id, name = %label.name, "label created");
        Ok(label)
    }

    pub async fn get_by_id(&self, id: Uuid) -> DomainResult<Label> {
        self.labels.get_by_id(id).await
    }

    pub async fn list(&self) -> DomainResult<Vec<Label>> {
        self.labels.list().await
    }

    pub async fn update(&self, id: Uuid, req: UpdateLabelRequest) -> DomainResult<Label> {
        if let Some(name) = &req.name {
            validate_label_fields(name, req.color.as_deref())?;
        } else if let Some(color) = &req.color {
            validate_color(color)?;
        }

        let label = self.labels.update(id, &req).await.map_err(|err| {
            error!(%id, %err, "failed to update label");
            err
        })?;

        info!(id = %label.id, name = %label.name, "label updated");
        Ok(label)
    }

    /// Deletes the label; the join table cascades, detaching it from all
    /// lines.
    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.labels.delete(id).await.map_err(|err| {
            error!(%id, %err, "failed to delete label");
            err
        })?;

        info!(%id, "label deleted");
        Ok(())
    }

    /// Replaces the label set of a line.
    pub async fn assign_to_line(
        &self,
        line_id: Uuid,
        req: AssignLabelsRequest,
    ) -> DomainResult<()> {
        self.lines.get_by_id(line_id).await?;

        // Every referenced label must exist.
        for label_id in &req.label_ids {
            self.labels.get_by_id(*label_id).await?;
        }

        self.labels
            .assign_to_line(line_id, &req.label_ids)
            .await
            .map_err(|err| {
                error!(%line_id, %err, "failed to assign labels to line");
                err
            })?;

        info!(%line_id, label_count = req.label_ids.len(), "labels assigned to line");
        Ok(())
    }

    pub async fn labels_for_line(&self, line_id: Uuid) -> DomainResult<Vec<Label>> {
        self.lines.get_by_id(line_id).await?;
        self.labels.labels_for_line(line_id).await
    }
}

fn validate_label_fields(name: &str, color: Option<&str>) -> DomainResult<()> {
    if name.is_empty() || name.len() > 100 {
        return Err(DomainError::Validation(
            "name is required and must be at most 100 characters".into(),
        ));
    }
    if let Some(color) = color {
        validate_color(color)?;
    }
    Ok(())
}

fn validate_color(color: &str) -> DomainResult<()> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(DomainError::Validation(
            "color must be a hex color like #0af0ab".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_validation() {
        assert!(validate_color("#0af0ab").is_ok());
        assert!(validate_color("#0AF0AB").is_ok());
        assert!(validate_color("0af0ab").is_err());
        assert!(validate_color("#0af0a").is_err());
        assert!(validate_color("#0af0xy").is_err());
    }
}
