use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::handlers::{analytics, devices, events, health, labels, lines, schedules};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let api = Router::new()
        // Production lines
        .route("/lines", get(lines::list).post(lines::create))
        .route(
            "/lines/:id",
            get(lines::get).put(lines::update).delete(lines::delete),
        )
        .route("/lines/:id/status", post(lines::set_status))
        .route("/lines/:id/status/history", get(lines::status_history))
        .route(
            "/lines/:id/labels",
            get(lines::get_labels).put(lines::assign_labels),
        )
        .route("/lines/:id/schedule", put(lines::assign_schedule))
        .route("/lines/:id/device", get(lines::assigned_device))
        .route("/lines/:id/effective-schedule", get(lines::effective_schedule))
        .route(
            "/lines/:id/effective-schedule/range",
            get(lines::effective_schedule_range),
        )
        // Labels
        .route("/labels", get(labels::list).post(labels::create))
        .route(
            "/labels/:id",
            get(labels::get).put(labels::update).delete(labels::delete),
        )
        // Schedules
        .route("/schedules", get(schedules::list).post(schedules::create))
        .route(
            "/schedules/holidays/suggestions",
            get(schedules::suggested_holidays),
        )
        .route(
            "/schedules/holidays/:holidayId",
            get(schedules::get_holiday)
                .put(schedules::update_holiday)
                .delete(schedules::delete_holiday),
        )
        .route(
            "/schedules/days/:dayId",
            get(schedules::get_day).put(schedules::update_day),
        )
        .route("/schedules/days/:dayId/breaks", put(schedules::set_day_breaks))
        .route(
            "/schedules/exceptions/:exceptionId",
            get(schedules::get_exception)
                .put(schedules::update_exception)
                .delete(schedules::delete_exception),
        )
        .route(
            "/schedules/line-exceptions/:exceptionId",
            get(schedules::get_line_exception)
                .put(schedules::update_line_exception)
                .delete(schedules::delete_line_exception),
        )
        .route(
            "/schedules/:id",
            get(schedules::get)
                .put(schedules::update)
                .delete(schedules::delete),
        )
        .route("/schedules/:id/lines", get(schedules::lines))
        .route(
            "/schedules/:id/holidays",
            get(schedules::holidays).post(schedules::create_holiday),
        )
        .route(
            "/schedules/:id/exceptions",
            get(schedules::exceptions).post(schedules::create_exception),
        )
        .route(
            "/schedules/:id/line-exceptions",
            get(schedules::line_exceptions).post(schedules::create_line_exception),
        )
        // Devices
        .route("/devices", get(devices::list))
        .route("/devices/:mac", get(devices::get))
        .route("/devices/:mac/assign", post(devices::assign))
        .route("/devices/:mac/unassign", post(devices::unassign))
        .route("/devices/:mac/identify", post(devices::identify))
        .route("/devices/:mac/command", post(devices::send_command))
        // Analytics & compliance
        .route("/analytics/aggregate", get(analytics::aggregate))
        .route("/analytics/lines", get(analytics::lines))
        .route("/analytics/labels", get(analytics::labels))
        .route("/analytics/compliance", get(analytics::compliance_aggregate))
        .route("/analytics/compliance/lines", get(analytics::compliance_lines))
        .route("/analytics/lines/:id/daily", get(analytics::daily_kpis))
        .route(
            "/analytics/lines/:id/compliance/daily",
            get(analytics::compliance_daily),
        )
        // Event stream
        .route("/events", get(events::stream));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new();
    }

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(parsed))
}
