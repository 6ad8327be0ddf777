use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::verify_token,
    calendar::{self, MonthView},
    client::BackendError,
    error::ApiError,
    models::{CurrentUser, Event, LoginRequest, Notice, Notification},
    validation::{validate_month, validate_year},
};

#[derive(Debug, serde::Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct MonthQuery {
    /// Defaults to the current year.
    pub year: Option<i32>,
    /// Zero-based month (0 = January), defaults to the current month.
    pub month: Option<u32>,
    pub token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct DayQuery {
    pub date: NaiveDate,
    pub token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Overview {
    pub notices: Vec<Notice>,
    pub events: Vec<Event>,
    pub notifications: Vec<Notification>,
}

fn session_token(state: &AppState) -> Result<String, ApiError> {
    state
        .session
        .token()
        .ok_or_else(|| ApiError::Unauthorized("No active session, log in first".into()))
}

#[utoipa::path(get, path = "/", tag = "portal")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Campus Portal API",
        "endpoints": {
            "/auth/login": "Open a backend session",
            "/auth/me": "Current user for the stored session",
            "/notices": "Sanitized notice board",
            "/notifications": "Notification feed",
            "/calendar": "Month grid with events",
            "/calendar/day": "Events for a single day",
            "/calendar.ical": "Download events as iCal file"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "portal")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "portal")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened"),
        (status = 401, description = "Invalid credentials or authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<AuthQuery>,
    Json(credentials): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;

    let response = state.client.login(&credentials).await.map_err(|err| match err {
        BackendError::Unauthorized => ApiError::Unauthorized("Invalid email or password".into()),
        other => ApiError::from(other),
    })?;
    state.session.set_token(response.token);

    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Session cleared")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<AuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;

    state.session.clear();
    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = CurrentUser),
        (status = 401, description = "No session, or the backend rejected the stored token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "auth"
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<AuthQuery>,
) -> Result<Json<CurrentUser>, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;

    let user = state.client.bootstrap_current_user(&state.session).await?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/notices",
    responses(
        (status = 200, description = "Notice board, content sanitized", body = [Notice]),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "notices"
)]
pub async fn get_notices(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<AuthQuery>,
) -> Result<Json<Vec<Notice>>, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;
    let token = session_token(&state)?;

    let mut notices = state.client.fetch_notices(&token).await?;
    for notice in &mut notices {
        notice.content = state.sanitizer.sanitize(&notice.content);
    }
    Ok(Json(notices))
}

#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Notification feed", body = [Notification]),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "notices"
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<AuthQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;
    let token = session_token(&state)?;

    let notifications = state.client.fetch_notifications(&token).await?;
    Ok(Json(notifications))
}

#[utoipa::path(
    get,
    path = "/calendar",
    params(
        ("year" = Option<i32>, Query, description = "Year, defaults to the current one"),
        ("month" = Option<u32>, Query, description = "Zero-based month (0 = January), defaults to the current one"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "42-cell month grid plus the month's events", body = MonthView),
        (status = 400, description = "Year or month out of range"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "calendar"
)]
pub async fn get_calendar(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<MonthQuery>,
) -> Result<Json<MonthView>, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;

    let today = Local::now().date_naive();
    let year = validate_year(query.year.unwrap_or_else(|| today.year()))?;
    let month = validate_month(query.month.unwrap_or_else(|| today.month0()))?;
    let token = session_token(&state)?;

    let events = state.client.fetch_events(&token).await?;
    let days = calendar::month_grid(year, month);
    let month_events: Vec<Event> = calendar::events_for_month(year, month, &events)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(MonthView {
        year,
        month,
        days,
        events: month_events,
    }))
}

#[utoipa::path(
    get,
    path = "/calendar/day",
    params(
        ("date" = String, Query, description = "Day in YYYY-MM-DD form"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Events covering the day", body = [Event]),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "calendar"
)]
pub async fn get_day_events(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<DayQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;
    let token = session_token(&state)?;

    let events = state.client.fetch_events(&token).await?;
    let day_events: Vec<Event> = calendar::events_for_day(query.date, &events)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(day_events))
}

#[utoipa::path(
    get,
    path = "/calendar.ical",
    params(
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "No events found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "calendar"
)]
pub async fn get_ical(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<AuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;
    let token = session_token(&state)?;

    let events = state.client.fetch_events(&token).await?;
    if events.is_empty() {
        return Err(ApiError::NotFound("No events found".into()));
    }

    let body = state.exporter.generate(&events);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            (
                "content-disposition",
                "attachment; filename=campus_calendar.ics",
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/overview",
    responses(
        (status = 200, description = "Dashboard landing data", body = Overview),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "portal"
)]
pub async fn get_overview(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    axum::extract::Query(query): axum::extract::Query<AuthQuery>,
) -> Result<Json<Overview>, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())?;
    let token = session_token(&state)?;

    let (mut notices, events, notifications) = futures::try_join!(
        state.client.fetch_notices(&token),
        state.client.fetch_events(&token),
        state.client.fetch_notifications(&token),
    )?;
    for notice in &mut notices {
        notice.content = state.sanitizer.sanitize(&notice.content);
    }

    Ok(Json(Overview {
        notices,
        events,
        notifications,
    }))
}
