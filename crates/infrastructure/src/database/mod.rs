use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod analytics_repository;
pub mod device_repository;
pub mod label_repository;
pub mod line_repository;
pub mod schedule_repository;
pub mod status_log_repository;

pub use analytics_repository::PgAnalyticsRepository;
pub use device_repository::PgDeviceRepository;
pub use label_repository::PgLabelRepository;
pub use line_repository::PgLineRepository;
pub use schedule_repository::PgScheduleRepository;
pub use status_log_repository::PgStatusLogRepository;

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub(crate) fn internal(err: sqlx::Error) -> domain::DomainError {
    domain::DomainError::internal(err)
}

/// Postgres SQLSTATE 23505.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

pub(crate) fn parse_status(s: &str) -> Result<domain::line::Status, domain::DomainError> {
    domain::line::Status::parse(s)
        .ok_or_else(|| domain::DomainError::Internal(format!("unexpected status value: {s}")))
}
