use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{cohorts, notifications, schemas, serialized, sse};

#[derive(OpenApi)]
#[openapi(
    modifiers(&Security),
    info(
        description = "greenroom-server exposes endpoints to interact with this greenroom instance"
    ),
    paths(
        cohorts::cohort,
        cohorts::send_message,
        cohorts::ban_user,
        cohorts::create_poll,
        cohorts::vote,
        cohorts::end_poll,
        cohorts::update_stream,
        cohorts::scheduled_streams,
        cohorts::schedule_stream,
        cohorts::send_reminder,
        cohorts::record_attendance,
        cohorts::leaderboard,
        notifications::notification_history,
        notifications::clear_notifications,
        notifications::preferences,
        notifications::update_preferences,
        sse::cohort_events,
        sse::notification_events,
    ),
    components(schemas(
        schemas::SendMessageSchema,
        schemas::NewPollSchema,
        schemas::VoteSchema,
        schemas::BanSchema,
        schemas::StreamActionSchema,
        schemas::ScheduleStreamSchema,
        schemas::PreferencesSchema,
        serialized::Message,
        serialized::Poll,
        serialized::PollTally,
        serialized::LeaderboardEntry,
        serialized::StreamStatus,
        serialized::CohortSnapshot,
        serialized::Notification,
        serialized::NotificationPreferences,
        serialized::ScheduledStream,
        sse::ServerEvent,
        sse::NotificationEvent,
    ))
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
