use std::sync::Arc;

use axum::extract::FromRef;
use greenroom_hub::Hub;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub hub: Arc<Hub>,
}
