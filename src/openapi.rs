use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::calendar::{CalendarDay, MonthView};
use crate::handlers::Overview;
use crate::models::{
    CurrentUser, Event, EventType, LoginRequest, Notice, Notification, Role, TokenResponse,
};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::login,
        crate::handlers::logout,
        crate::handlers::get_me,
        crate::handlers::get_notices,
        crate::handlers::get_notifications,
        crate::handlers::get_calendar,
        crate::handlers::get_day_events,
        crate::handlers::get_ical,
        crate::handlers::get_overview
    ),
    components(schemas(
        Event,
        EventType,
        Notice,
        Notification,
        CurrentUser,
        Role,
        LoginRequest,
        TokenResponse,
        CalendarDay,
        MonthView,
        Overview
    )),
    tags(
        (name = "portal", description = "Service info and dashboard aggregation"),
        (name = "auth", description = "Backend session lifecycle"),
        (name = "notices", description = "Notices and notifications"),
        (name = "calendar", description = "Month grid, day view and iCal export")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;
