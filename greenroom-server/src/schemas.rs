use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMessageSchema {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewPollSchema {
    #[validate(length(min = 1, max = 300))]
    pub question: String,
    #[validate(length(min = 2, max = 12))]
    pub options: Vec<String>,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteSchema {
    #[validate(length(min = 1, max = 200))]
    pub option: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BanSchema {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

/// Mirrors the dashboard's start/stop stream buttons
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", tag = "action")]
pub enum StreamActionSchema {
    Start { url: String },
    Stop,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleStreamSchema {
    #[validate(length(min = 1, max = 128))]
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreferencesSchema {
    pub chat_mentions: bool,
    pub stream_starts: bool,
    pub new_participants: bool,
    pub stream_reminders: bool,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
