//! Headless client binary.
//!
//! Usage:
//!   cargo run -p blastar_client -- [--relay 127.0.0.1:40000] [--config arena.json] [--offline]
//!
//! Without a window the player is steered from stdin. Each movement command
//! holds its key for a number of frames (default 1).
//!
//! Console commands:
//!   left|right|up|down [frames] - Hold a direction
//!   shoot [frames]              - Hold the fire key
//!   status                      - Show client status
//!   quit                        - Leave the relay and exit

use std::env;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use blastar_client::{
    client::{ClientState, GameClient},
    game::{Game, SpriteSheet},
    input::{parse_key, InputState, QueuedInput},
};
use blastar_shared::{
    config::ArenaConfig,
    render::{ImageLoader, InputSource, KeySet, NullRenderer, SpriteId},
    rules::ClampToArena,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

struct Args {
    config: Option<PathBuf>,
    relay: Option<String>,
    assets: PathBuf,
    offline: bool,
}

fn parse_args() -> Args {
    let mut parsed = Args {
        config: None,
        relay: None,
        assets: PathBuf::from("assets"),
        offline: false,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                parsed.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--relay" if i + 1 < args.len() => {
                parsed.relay = Some(args[i + 1].clone());
                i += 2;
            }
            "--assets" if i + 1 < args.len() => {
                parsed.assets = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "--offline" => {
                parsed.offline = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    parsed
}

/// Hands out sprite ids without decoding anything.
#[derive(Default)]
struct HeadlessImages {
    next: u32,
}

impl ImageLoader for HeadlessImages {
    fn load_image(&mut self, path: &Path) -> anyhow::Result<SpriteId> {
        self.next += 1;
        tracing::trace!(path = %path.display(), id = self.next, "Sprite registered");
        Ok(SpriteId(self.next))
    }
}

enum ConsoleAction {
    None,
    Status,
    Quit,
}

fn exec_console(line: &str, input: &mut QueuedInput) -> ConsoleAction {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&command) = tokens.first() else {
        return ConsoleAction::None;
    };
    match command {
        "status" => ConsoleAction::Status,
        "quit" | "exit" => ConsoleAction::Quit,
        word => match parse_key(word) {
            Some(key) => {
                let frames = tokens.get(1).and_then(|n| n.parse().ok()).unwrap_or(1);
                input.hold(key, frames);
                ConsoleAction::None
            }
            None => {
                println!("Unknown command: {word}");
                ConsoleAction::None
            }
        },
    }
}

fn spawn_console() -> mpsc::Receiver<String> {
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    console_rx
}

/// Measures the frame rate from the gap between frames.
struct FrameClock {
    last: Instant,
}

impl FrameClock {
    fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    fn fps(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        if dt > 0.0 {
            1.0 / dt
        } else {
            0.0
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args();
    let mut cfg = match &args.config {
        Some(path) => ArenaConfig::load(path)?,
        None => ArenaConfig::default(),
    };
    if let Some(relay) = &args.relay {
        cfg.relay_addr = relay.clone();
    }
    let sprites = SpriteSheet::load(&mut HeadlessImages::default(), &args.assets)
        .context("load sprites")?;

    info!(fps = cfg.target_fps, offline = args.offline, "Starting client");

    if args.offline {
        run_offline(cfg, sprites).await
    } else {
        run_online(cfg, sprites).await
    }
}

async fn run_offline(cfg: ArenaConfig, sprites: SpriteSheet) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    let hooks = Arc::new(ClampToArena { bounds: cfg.arena });
    let mut game = Game::new(cfg.clone(), Box::new(NullRenderer), sprites, hooks, &mut rng);
    game.spawn_enemy(&mut rng);
    drop(rng);

    let mut console_rx = spawn_console();
    let mut input = QueuedInput::default();
    let mut clock = FrameClock::new();
    let mut ticker = tokio::time::interval(frame_period(&cfg));

    println!("Offline. Type 'status' for info, 'quit' to exit.");
    loop {
        ticker.tick().await;
        while let Ok(line) = console_rx.try_recv() {
            match exec_console(&line, &mut input) {
                ConsoleAction::None => {}
                ConsoleAction::Status => {
                    let m = game.manager();
                    println!("Frame: {}", m.frame());
                    for e in m.entities() {
                        let pos = e.position();
                        println!("  {} ({:.1}, {:.1}) {:?}", e.id(), pos.x, pos.y, e.state());
                    }
                }
                ConsoleAction::Quit => return Ok(()),
            }
        }

        let keys = input.poll_keys();
        if keys.contains(KeySet::QUIT) {
            return Ok(());
        }
        game.apply_input(&InputState::new(keys, clock.fps()), |_| {});
        game.tick();
    }
}

async fn run_online(cfg: ArenaConfig, sprites: SpriteSheet) -> anyhow::Result<()> {
    let mut client = GameClient::connect(&cfg, Box::new(NullRenderer), sprites)
        .await
        .context("connect")?;

    let mut console_rx = spawn_console();
    let mut input = QueuedInput::default();
    let mut clock = FrameClock::new();
    let mut ticker = tokio::time::interval(frame_period(&cfg));
    let mut announced_disconnect = false;

    println!("Joined relay. Type 'status' for info, 'quit' to exit.");
    loop {
        ticker.tick().await;
        let mut quit = false;
        while let Ok(line) = console_rx.try_recv() {
            match exec_console(&line, &mut input) {
                ConsoleAction::None => {}
                ConsoleAction::Status => {
                    for line in client.status() {
                        println!("{line}");
                    }
                }
                ConsoleAction::Quit => quit = true,
            }
        }

        let keys = input.poll_keys();
        if quit || keys.contains(KeySet::QUIT) {
            break;
        }
        if let Err(e) = client.frame(&InputState::new(keys, clock.fps())).await {
            warn!(error = %e, "Frame failed");
        }
        if client.state == ClientState::Disconnected && !announced_disconnect {
            println!("No longer receiving from relay, continuing locally.");
            announced_disconnect = true;
        }
    }

    client.quit().await
}

fn frame_period(cfg: &ArenaConfig) -> Duration {
    Duration::from_secs_f32(1.0 / cfg.target_fps.max(1) as f32)
}
