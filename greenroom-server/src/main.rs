use std::{sync::Arc, time::Duration};

use greenroom_hub::{
    Hub, HubConfig, Identity, MemoryPersistence, NoopLedger, Role, StaticAuthority,
};
use greenroom_server::{init_logger, run_server, ServerContext};
use log::info;

/// How often empty rooms are checked against the grace window
const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    init_logger();

    let authority = Arc::new(StaticAuthority::new());

    // A session for local use, until the dashboard's session backend is
    // pointed at this instance
    let token = authority.issue(Identity {
        user_id: "local-moderator".to_string(),
        display_name: "Local Moderator".to_string(),
        role: Role::Moderator,
    });

    let hub = Arc::new(Hub::new(
        HubConfig::default(),
        Arc::new(MemoryPersistence::new()),
        authority,
        Arc::new(NoopLedger),
    ));

    let events_hub = hub.clone();
    tokio::spawn(async move { events_hub.handle_events().await });

    let sweeper_hub = hub.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            interval.tick().await;
            sweeper_hub.rooms.sweep();
        }
    });

    info!("Moderator session token: {}", token);

    run_server(ServerContext { hub }).await
}
