use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json,
};
use greenroom_hub::StreamStatus as HubStreamStatus;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        BanSchema, NewPollSchema, ScheduleStreamSchema, SendMessageSchema, StreamActionSchema,
        ValidatedJson, VoteSchema,
    },
    serialized::{
        CohortSnapshot, LeaderboardEntry, Message, PollTally, ScheduledStream, StreamStatus,
        ToSerialized,
    },
    sse, Router,
};

#[utoipa::path(
    get,
    path = "/v1/cohorts/{id}",
    tag = "cohorts",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CohortSnapshot)
    )
)]
pub(crate) async fn cohort(
    _session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
) -> ServerResult<Json<CohortSnapshot>> {
    let room = context.hub.rooms.get(&cohort_id)?;

    Ok(Json(room.snapshot().to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/cohorts/{id}/messages",
    tag = "cohorts",
    request_body = SendMessageSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
pub(crate) async fn send_message(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
    ValidatedJson(body): ValidatedJson<SendMessageSchema>,
) -> ServerResult<Json<Message>> {
    let room = context.hub.rooms.get(&cohort_id)?;
    let message = room.send_message(session.identity(), &body.text)?;

    Ok(Json(message.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/cohorts/{id}/bans",
    tag = "cohorts",
    request_body = BanSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "User was banned, or already was")
    )
)]
pub(crate) async fn ban_user(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
    ValidatedJson(body): ValidatedJson<BanSchema>,
) -> ServerResult<()> {
    let room = context.hub.rooms.get(&cohort_id)?;
    room.ban(session.identity(), &body.user_id)?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/cohorts/{id}/polls",
    tag = "cohorts",
    request_body = NewPollSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PollTally)
    )
)]
pub(crate) async fn create_poll(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
    ValidatedJson(body): ValidatedJson<NewPollSchema>,
) -> ServerResult<Json<PollTally>> {
    let room = context.hub.rooms.get(&cohort_id)?;
    let poll = room.create_poll(session.identity(), body.question, body.options)?;

    Ok(Json(poll.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/cohorts/{id}/polls/current/votes",
    tag = "cohorts",
    request_body = VoteSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PollTally)
    )
)]
pub(crate) async fn vote(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
    ValidatedJson(body): ValidatedJson<VoteSchema>,
) -> ServerResult<Json<PollTally>> {
    let room = context.hub.rooms.get(&cohort_id)?;
    let poll = room.vote(session.identity(), &body.option)?;

    Ok(Json(poll.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/cohorts/{id}/polls/current",
    tag = "cohorts",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PollTally, description = "The final tally of the ended poll")
    )
)]
pub(crate) async fn end_poll(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
) -> ServerResult<Json<PollTally>> {
    let room = context.hub.rooms.get(&cohort_id)?;
    let poll = room.end_poll(session.identity())?;

    Ok(Json(poll.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/cohorts/{id}/stream",
    tag = "cohorts",
    request_body = StreamActionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = StreamStatus)
    )
)]
pub(crate) async fn update_stream(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
    Json(body): Json<StreamActionSchema>,
) -> ServerResult<Json<StreamStatus>> {
    let room = context.hub.rooms.get(&cohort_id)?;

    let status: HubStreamStatus = match body {
        StreamActionSchema::Start { url } => room.start_stream(session.identity(), &url)?,
        StreamActionSchema::Stop => room.stop_stream(session.identity())?,
    };

    Ok(Json(status.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/cohorts/{id}/schedule",
    tag = "cohorts",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<ScheduledStream>)
    )
)]
pub(crate) async fn scheduled_streams(
    _session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
) -> ServerResult<Json<Vec<ScheduledStream>>> {
    let streams = context.hub.scheduled_streams(&cohort_id).await?;

    Ok(Json(streams.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/cohorts/{id}/schedule",
    tag = "cohorts",
    request_body = ScheduleStreamSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = ScheduledStream)
    )
)]
pub(crate) async fn schedule_stream(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ScheduleStreamSchema>,
) -> ServerResult<Json<ScheduledStream>> {
    let stream = context
        .hub
        .schedule_stream(
            session.identity(),
            &cohort_id,
            body.title,
            body.starts_at,
            body.description,
        )
        .await?;

    Ok(Json(stream.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/cohorts/{id}/schedule/{stream_id}/reminder",
    tag = "cohorts",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Reminders were dispatched to connected members")
    )
)]
pub(crate) async fn send_reminder(
    session: Session,
    State(context): State<ServerContext>,
    Path((cohort_id, stream_id)): Path<(String, u64)>,
) -> ServerResult<()> {
    context
        .hub
        .send_reminder(session.identity(), &cohort_id, stream_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/cohorts/{id}/attendance",
    tag = "cohorts",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<LeaderboardEntry>)
    )
)]
pub(crate) async fn record_attendance(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
) -> ServerResult<Json<Vec<LeaderboardEntry>>> {
    let room = context.hub.rooms.get(&cohort_id)?;
    let entries = room.record_attendance(session.identity());

    Ok(Json(entries.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/cohorts/{id}/leaderboard",
    tag = "cohorts",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<LeaderboardEntry>)
    )
)]
pub(crate) async fn leaderboard(
    _session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
) -> ServerResult<Json<Vec<LeaderboardEntry>>> {
    let room = context.hub.rooms.get(&cohort_id)?;

    Ok(Json(room.leaderboard().to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(cohort))
        .route("/:id/events", get(sse::cohort_events))
        .route("/:id/messages", post(send_message))
        .route("/:id/bans", post(ban_user))
        .route("/:id/polls", post(create_poll))
        .route("/:id/polls/current", delete(end_poll))
        .route("/:id/polls/current/votes", post(vote))
        .route("/:id/stream", put(update_stream))
        .route("/:id/schedule", get(scheduled_streams))
        .route("/:id/schedule", post(schedule_stream))
        .route("/:id/schedule/:stream_id/reminder", post(send_reminder))
        .route("/:id/attendance", post(record_attendance))
        .route("/:id/leaderboard", get(leaderboard))
}
