use axum::{
    extract::State,
    routing::{delete, get, put},
    Json,
};
use greenroom_hub::NotificationPreferences as HubNotificationPreferences;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::PreferencesSchema,
    serialized::{Notification, NotificationPreferences, ToSerialized},
    sse, Router,
};

#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Notification>)
    )
)]
pub(crate) async fn notification_history(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Notification>>> {
    let history = context
        .hub
        .notifications
        .history(&session.identity().user_id)
        .await?;

    Ok(Json(history.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/notifications",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The notification list was emptied")
    )
)]
pub(crate) async fn clear_notifications(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<()> {
    context
        .hub
        .notifications
        .clear(&session.identity().user_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/notifications/preferences",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = NotificationPreferences)
    )
)]
pub(crate) async fn preferences(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<NotificationPreferences>> {
    let preferences = context
        .hub
        .notifications
        .preferences(&session.identity().user_id)
        .await?;

    Ok(Json(preferences.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/notifications/preferences",
    tag = "notifications",
    request_body = PreferencesSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = NotificationPreferences)
    )
)]
pub(crate) async fn update_preferences(
    session: Session,
    State(context): State<ServerContext>,
    Json(body): Json<PreferencesSchema>,
) -> ServerResult<Json<NotificationPreferences>> {
    let updated = context
        .hub
        .notifications
        .update_preferences(
            &session.identity().user_id,
            HubNotificationPreferences {
                chat_mentions: body.chat_mentions,
                stream_starts: body.stream_starts,
                new_participants: body.new_participants,
                stream_reminders: body.stream_reminders,
            },
        )
        .await?;

    Ok(Json(updated.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(notification_history))
        .route("/", delete(clear_notifications))
        .route("/events", get(sse::notification_events))
        .route("/preferences", get(preferences))
        .route("/preferences", put(update_preferences))
}
