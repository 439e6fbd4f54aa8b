//! Fixtures shared by the integration tests.

use std::time::Duration;

use blastar_client::{game::SpriteSheet, input::InputState, GameClient};
use blastar_relay::relay::bind_ephemeral;
use blastar_shared::{config::ArenaConfig, render::NullRenderer};
use tokio::task::JoinHandle;

/// Upper bound on frames any scenario may take.
pub const MAX_FRAMES: usize = 400;

/// Pause between frames so datagrams can cross the loopback.
pub const FRAME_GAP: Duration = Duration::from_millis(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Starts a relay on an ephemeral port. The returned config points at it.
pub async fn spawn_relay() -> anyhow::Result<(ArenaConfig, JoinHandle<()>)> {
    let (mut relay, cfg) = bind_ephemeral().await?;
    let handle = tokio::spawn(async move { relay.run().await });
    Ok((cfg, handle))
}

/// A headless client connected to `cfg.relay_addr`.
pub async fn connect_client(cfg: &ArenaConfig) -> anyhow::Result<GameClient> {
    GameClient::connect(cfg, Box::new(NullRenderer), SpriteSheet::default()).await
}

/// Input with nothing held, at the configured frame rate.
pub fn idle(cfg: &ArenaConfig) -> InputState {
    InputState::new(Default::default(), cfg.target_fps as f32)
}
