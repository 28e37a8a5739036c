use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use greenroom_hub::HubError;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Hub(#[from] HubError),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        let Self::Hub(error) = self;

        match error {
            HubError::InvalidSession => StatusCode::UNAUTHORIZED,
            HubError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            HubError::Banned { .. } => StatusCode::FORBIDDEN,
            HubError::Conflict { .. } => StatusCode::CONFLICT,
            HubError::Validation { .. } => StatusCode::BAD_REQUEST,
            HubError::NotFound { .. } => StatusCode::NOT_FOUND,
            HubError::Transient { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}
