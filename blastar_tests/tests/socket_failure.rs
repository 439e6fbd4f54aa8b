//! A relay address nobody listens on: the receive loop fails, the game goes on.

use blastar_client::client::ClientState;
use blastar_shared::config::ArenaConfig;
use blastar_tests::{connect_client, idle, init_tracing, FRAME_GAP, MAX_FRAMES};
use tokio::net::UdpSocket;
use tracing::info;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_relay_ends_session_but_not_simulation() -> anyhow::Result<()> {
    init_tracing();

    // Reserve a loopback port, then free it so the join is answered with
    // port unreachable and the connected socket's next receive fails.
    let closed = UdpSocket::bind("127.0.0.1:0").await?.local_addr()?;
    let cfg = ArenaConfig {
        relay_addr: closed.to_string(),
        ..ArenaConfig::default()
    };

    let mut client = connect_client(&cfg).await?;
    assert_eq!(client.state, ClientState::Connected);

    let idle = idle(&cfg);
    let mut frames = 0;
    while client.state == ClientState::Connected {
        anyhow::ensure!(frames < MAX_FRAMES, "receive loop never failed");
        if let Err(e) = client.frame(&idle).await {
            info!(error = %e, "Frame reported a send failure");
        }
        tokio::time::sleep(FRAME_GAP).await;
        frames += 1;
    }
    info!(frames, "Receive loop ended");

    let before = client.game.manager().frame();
    for _ in 0..3 {
        let _ = client.frame(&idle).await;
    }
    assert_eq!(client.game.manager().frame(), before + 3);
    assert_eq!(client.state, ClientState::Disconnected);
    assert!(client.game.player_alive());
    Ok(())
}
