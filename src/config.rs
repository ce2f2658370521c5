/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Simulation rate all timers are expressed in.
pub const FRAMES_PER_SEC: u32 = 60;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub rules: RulesConfig,
    pub seed: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub tick_rate_ms: u64,
}

/// Game rules. Timers are in frames.
#[derive(Clone, Debug)]
pub struct RulesConfig {
    pub memorize_frames: u32,
    pub game_frames: u32,
    pub time_bonus_frames: u32, // added on every grid growth
    pub starting_lives: u32,
    pub rocks: u32,
    pub initial_grid_size: usize,
    pub max_grid_size: usize,
    pub max_killers: usize,     // enemies allowed in pursuit at once
    pub max_enemies: usize,
    pub max_generation_attempts: u32,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlRules {
    #[serde(default = "default_memorize_secs")]
    memorize_secs: u32,
    #[serde(default = "default_game_secs")]
    game_secs: u32,
    #[serde(default = "default_time_bonus_secs")]
    time_bonus_secs: u32,
    #[serde(default = "default_lives")]
    starting_lives: u32,
    #[serde(default = "default_rocks")]
    rocks: u32,
    #[serde(default = "default_initial_grid")]
    initial_grid_size: usize,
    #[serde(default = "default_max_grid")]
    max_grid_size: usize,
    #[serde(default = "default_max_killers")]
    max_killers: usize,
    #[serde(default = "default_max_enemies")]
    max_enemies: usize,
    #[serde(default = "default_generation_attempts")]
    max_generation_attempts: u32,
}

#[derive(Deserialize, Debug, Default)]
struct TomlGeneral {
    #[serde(default)]
    seed: Option<u64>,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }     // ~60 Hz
fn default_memorize_secs() -> u32 { 30 }
fn default_game_secs() -> u32 { 15 }
fn default_time_bonus_secs() -> u32 { 2 }
fn default_lives() -> u32 { 2 }
fn default_rocks() -> u32 { 5 }
fn default_initial_grid() -> usize { 6 }
fn default_max_grid() -> usize { 13 }
fn default_max_killers() -> usize { 3 }
fn default_max_enemies() -> usize { 6 }
fn default_generation_attempts() -> u32 { 10_000 }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed { tick_rate_ms: default_tick_rate() }
    }
}

impl Default for TomlRules {
    fn default() -> Self {
        TomlRules {
            memorize_secs: default_memorize_secs(),
            game_secs: default_game_secs(),
            time_bonus_secs: default_time_bonus_secs(),
            starting_lives: default_lives(),
            rocks: default_rocks(),
            initial_grid_size: default_initial_grid(),
            max_grid_size: default_max_grid(),
            max_killers: default_max_killers(),
            max_enemies: default_max_enemies(),
            max_generation_attempts: default_generation_attempts(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default())
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        GameConfig::default().rules
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        GameConfig::from_toml(load_toml(&candidate_dirs()))
    }

    /// Parse a config document held in memory.
    #[cfg(test)]
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<TomlConfig>(text).map(GameConfig::from_toml)
    }

    fn from_toml(cfg: TomlConfig) -> Self {
        let r = cfg.rules;
        // A grid smaller than 2 has no room for both a trap and a treasure.
        let initial_grid_size = r.initial_grid_size.max(2);

        GameConfig {
            speed: SpeedConfig {
                tick_rate_ms: cfg.speed.tick_rate_ms.max(1),
            },
            rules: RulesConfig {
                memorize_frames: r.memorize_secs * FRAMES_PER_SEC,
                game_frames: r.game_secs.max(1) * FRAMES_PER_SEC,
                time_bonus_frames: r.time_bonus_secs * FRAMES_PER_SEC,
                starting_lives: r.starting_lives,
                rocks: r.rocks,
                initial_grid_size,
                max_grid_size: r.max_grid_size.max(initial_grid_size),
                max_killers: r.max_killers,
                max_enemies: r.max_enemies,
                max_generation_attempts: r.max_generation_attempts.max(1),
            },
            seed: cfg.general.seed,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            return read_toml(&path);
        }
    }
    tracing::info!("no config.toml found, using defaults");
    TomlConfig::default()
}

fn read_toml(path: &Path) -> TomlConfig {
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str::<TomlConfig>(&text) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config parse error, using defaults");
                TomlConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read config");
            TomlConfig::default()
        }
    }
}
