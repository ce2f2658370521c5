/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use config::GameConfig;
use sim::event::GameEvent;
use sim::step;
use sim::world::WorldState;
use ui::input::InputState;
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);
const LOG_ENV: &str = "TESOURIM_LOG";
const DEFAULT_LOG_FILE: &str = "tesourim.log";

fn main() {
    init_logging();

    let config = GameConfig::load();
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    tracing::info!(seed = ?config.seed, tick_rate_ms = config.speed.tick_rate_ms, "starting");

    let mut world = match WorldState::new(config.rules.clone(), rng) {
        Ok(world) => world,
        Err(e) => {
            tracing::error!(error = %e, "could not build the first level");
            eprintln!("Level generation failed: {e}");
            return;
        }
    };

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        tracing::error!(error = %e, "terminal init failed");
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(&mut world, &mut renderer, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "game aborted");
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Tesourim!");
    println!(
        "Reached level {} at difficulty {}.",
        world.progression.level_number(&world.rules),
        world.progression.difficulty.level(),
    );
}

/// Log to a file: the terminal belongs to the game. `RUST_LOG` overrides
/// the default `info` filter. A log file that can't be created disables
/// logging.
fn init_logging() {
    let path = std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let Ok(file) = File::create(&path) else { return };

    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = renderer.keyboard_enhanced();
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.speed.tick_rate_ms);

    loop {
        kb.drain_events();
        if kb.exit_requested() {
            tracing::info!("exit requested");
            break;
        }

        if last_tick.elapsed() >= tick_rate {
            let frame_input = kb.take_frame();
            let events = step::step(world, &frame_input)?;
            log_events(world, &events);
            last_tick = Instant::now();
        }

        if world.quit {
            break;
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn log_events(world: &WorldState, events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::LevelStarted { grid_size, difficulty } => {
                tracing::info!(grid_size, difficulty, "level started");
            }
            GameEvent::PlayerDied | GameEvent::TimeUp => {
                tracing::info!(?event, tick = world.tick, "round lost");
            }
            _ => tracing::debug!(?event, tick = world.tick, "event"),
        }
    }
}
