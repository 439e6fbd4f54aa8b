//! Two headless clients talking through a live relay.

use std::time::Duration;

use blastar_client::{client::ClientState, input::InputState};
use blastar_shared::render::KeySet;
use blastar_tests::{connect_client, idle, init_tracing, spawn_relay, FRAME_GAP, MAX_FRAMES};
use tracing::info;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn peers_discover_and_mirror_each_other() -> anyhow::Result<()> {
    init_tracing();
    let (cfg, relay) = spawn_relay().await?;

    let mut a = connect_client(&cfg).await?;
    // Let the relay register `a` before `b` shows up.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut b = connect_client(&cfg).await?;

    // `a` hears b's join and answers; `b` learns about `a` from the answer.
    let idle = idle(&cfg);
    let mut frames = 0;
    while a.sync.peer_count() == 0 || b.sync.peer_count() == 0 {
        anyhow::ensure!(frames < MAX_FRAMES, "peers never discovered each other");
        a.frame(&idle).await?;
        b.frame(&idle).await?;
        tokio::time::sleep(FRAME_GAP).await;
        frames += 1;
    }
    info!(frames, "Peers discovered");

    // Relay indices follow first contact.
    let a_in_b = b.sync.peer(0).expect("b knows a as index 0");
    assert!(a.sync.peer(1).is_some());
    assert_eq!(b.game.manager().get(a_in_b).unwrap().id(), "Player_0");

    // Steer `a` right; b's copy of `a` follows.
    let start = b.game.manager().get(a_in_b).unwrap().position().x;
    let right = InputState::new(KeySet::RIGHT, cfg.target_fps as f32);
    for _ in 0..20 {
        a.frame(&right).await?;
        b.frame(&idle).await?;
        tokio::time::sleep(FRAME_GAP).await;
    }
    let mut moved = false;
    for _ in 0..MAX_FRAMES {
        b.frame(&idle).await?;
        if b.game.manager().get(a_in_b).unwrap().position().x > start {
            moved = true;
            break;
        }
        tokio::time::sleep(FRAME_GAP).await;
    }
    assert!(moved, "b never saw a move");

    // Leaving sends a quit, which ends b's receive loop.
    a.quit().await?;
    for _ in 0..MAX_FRAMES {
        if b.state == ClientState::Disconnected {
            break;
        }
        b.frame(&idle).await?;
        tokio::time::sleep(FRAME_GAP).await;
    }
    assert_eq!(b.state, ClientState::Disconnected);

    // The local simulation keeps running.
    let frame = b.game.manager().frame();
    b.frame(&idle).await?;
    assert_eq!(b.game.manager().frame(), frame + 1);

    relay.abort();
    Ok(())
}
