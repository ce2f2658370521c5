/// WorldState: the complete snapshot of a running game.
///
/// ## Coordinates
///
/// Grid nodes are numbered `y * size + x`, with row 0 at the bottom.
/// The player additionally stands on the staging row `y == -1`, which has
/// no node. Enemies, bullets and rocks live in screen rows counted from the
/// top; `screen_row` converts.
///
/// ## Visibility
///
/// During `Memorizing` every trap and the treasure are shown. While
/// `Playing` only fallen traps and rock-revealed cells are. `Won`, `Lost`
/// and `GameComplete` show everything again.

use std::collections::HashSet;

use rand::rngs::StdRng;

use crate::config::{RulesConfig, FRAMES_PER_SEC};
use crate::domain::enemy::Enemy;
use crate::domain::entity::Player;
use crate::domain::rock::Rock;
use crate::sim::level::{self, Level, LevelError, Progression};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Memorizing,
    Playing,
    Won,
    Lost,
    GameComplete,
}

/// Frames the closing message stays up before the game exits (3 s).
pub const GAME_COMPLETE_FRAMES: u32 = 3 * FRAMES_PER_SEC;

pub struct WorldState {
    pub rules: RulesConfig,
    pub rng: StdRng,

    // ── Level ──
    pub progression: Progression,
    pub level: Level,
    /// Traps the player has stepped on or uncovered with a rock.
    pub fallen_traps: HashSet<usize>,

    // ── Entities ──
    pub player: Player,
    pub enemies: Vec<Enemy>,
    pub rocks: Vec<Rock>,

    // ── Timers (frames) ──
    pub memorize_timer: u32,
    pub game_timer: u32,
    pub end_timer: u32,

    // ── Meta ──
    pub phase: Phase,
    pub tick: u64,
    /// Set once the closing countdown runs out.
    pub quit: bool,

    // ── UI ──
    pub message: String,
    /// Frames until `message` clears; 0 keeps it until replaced.
    pub message_timer: u32,
}

impl WorldState {
    /// A fresh game on the first level, in the memorize phase.
    pub fn new(rules: RulesConfig, mut rng: StdRng) -> Result<Self, LevelError> {
        let progression = Progression::new(&rules);
        let level = level::level_setup(
            progression.grid_size,
            progression.difficulty,
            rules.max_generation_attempts,
            &mut rng,
        )?;
        let player = Player::new(progression.lives, rules.rocks);

        let mut world = WorldState {
            rules,
            rng,
            progression,
            level,
            fallen_traps: HashSet::new(),
            player,
            enemies: Vec::new(),
            rocks: Vec::new(),
            memorize_timer: 0,
            game_timer: 0,
            end_timer: 0,
            phase: Phase::Memorizing,
            tick: 0,
            quit: false,
            message: String::new(),
            message_timer: 0,
        };
        level::reset_round(&mut world);
        Ok(world)
    }

    pub fn grid_size(&self) -> usize {
        self.progression.grid_size
    }

    /// Node of an in-grid cell, `None` off the grid (staging included).
    pub fn node_at(&self, x: i32, y: i32) -> Option<usize> {
        let size = self.grid_size() as i32;
        if (0..size).contains(&x) && (0..size).contains(&y) {
            Some((y * size + x) as usize)
        } else {
            None
        }
    }

    /// Screen row (counted from the top) of grid row `y`.
    pub fn screen_row(&self, y: i32) -> i32 {
        self.grid_size() as i32 - 1 - y
    }

    /// Has a rock landed on (or been thrown at) this node?
    pub fn is_revealed(&self, node: usize) -> bool {
        self.rocks.iter().any(|r| r.revealed == node)
    }

    /// Should the renderer draw the contents of this node?
    pub fn is_visible(&self, node: usize) -> bool {
        match self.phase {
            Phase::Playing => self.fallen_traps.contains(&node) || self.is_revealed(node),
            _ => true,
        }
    }

    /// Enemies currently chasing the player.
    pub fn pursuing_count(&self) -> usize {
        self.enemies.iter().filter(|e| e.is_pursuing()).count()
    }

    pub fn set_message(&mut self, text: impl Into<String>, frames: u32) {
        self.message = text.into();
        self.message_timer = frames;
    }

    pub fn clear_message(&mut self) {
        self.message.clear();
        self.message_timer = 0;
    }

    pub fn set_memorize_message(&mut self) {
        let secs = self.memorize_timer.div_ceil(FRAMES_PER_SEC);
        self.set_message(format!("Memorize the grid! {secs}s left. Press SPACE to start"), 0);
    }
}
