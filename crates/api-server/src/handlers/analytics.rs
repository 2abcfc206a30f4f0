use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use domain::analytics::AnalyticsQuery;
use domain::compliance::ComplianceQuery;
use domain::DomainError;

use crate::response::{ApiResult, AppError};
use crate::state::AppState;

use super::{parse_date, parse_id, parse_id_list};

/// Analytics and compliance endpoints return their metric objects raw,
/// without the envelope.
#[derive(Deserialize, Default)]
pub struct AnalyticsParams {
    #[serde(default)]
    timeframe: Option<String>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    line_ids: Option<String>,
    #[serde(default)]
    label_ids: Option<String>,
}

impl AnalyticsParams {
    fn into_query(self) -> Result<AnalyticsQuery, AppError> {
        Ok(AnalyticsQuery {
            start_time: self.start_time,
            end_time: self.end_time,
            line_ids: parse_id_list(self.line_ids.as_deref())?,
            label_ids: parse_id_list(self.label_ids.as_deref())?,
            timeframe: self.timeframe.unwrap_or_default(),
        })
    }
}

pub async fn aggregate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult {
    let metrics = state.analytics.aggregate_metrics(params.into_query()?).await?;
    Ok(Json(metrics).into_response())
}

pub async fn lines(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult {
    let metrics = state.analytics.line_metrics(params.into_query()?).await?;
    Ok(Json(metrics).into_response())
}

pub async fn labels(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult {
    let metrics = state.analytics.label_metrics(params.into_query()?).await?;
    Ok(Json(metrics).into_response())
}

pub async fn daily_kpis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<AnalyticsParams>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let kpis = state.analytics.daily_kpis(id, params.into_query()?).await?;
    Ok(Json(kpis).into_response())
}

#[derive(Deserialize)]
pub struct ComplianceParams {
    start_date: String,
    end_date: String,
    #[serde(default)]
    line_ids: Option<String>,
    #[serde(default)]
    label_ids: Option<String>,
}

impl ComplianceParams {
    fn into_query(self) -> Result<ComplianceQuery, AppError> {
        Ok(ComplianceQuery {
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            line_ids: parse_id_list(self.line_ids.as_deref())?,
            label_ids: parse_id_list(self.label_ids.as_deref())?,
        })
    }
}

pub async fn compliance_aggregate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ComplianceParams>,
) -> ApiResult {
    let metrics = state
        .compliance
        .aggregate_compliance(params.into_query()?)
        .await?;
    Ok(Json(metrics).into_response())
}

pub async fn compliance_lines(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ComplianceParams>,
) -> ApiResult {
    let metrics = state.compliance.line_compliance(params.into_query()?).await?;
    Ok(Json(metrics).into_response())
}

#[derive(Deserialize)]
pub struct DailyComplianceParams {
    start_date: String,
    end_date: String,
}

pub async fn compliance_daily(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DailyComplianceParams>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let start = parse_date(&params.start_date)?;
    let end = parse_date(&params.end_date)?;

    if start > end {
        return Err(AppError(DomainError::InvalidDateRange));
    }

    let kpis = state.compliance.daily_compliance(id, start, end).await?;
    Ok(Json(kpis).into_response())
}
