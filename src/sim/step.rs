/// The step function: advances the world by one frame.
///
/// Playing-phase processing order:
///   1. Game clock (timeout) and lives check
///   2. Enemies: mode flips, movement, firing, bullet flight
///   3. Bullet contact with the player (reflection first)
///   4. Aim toggle, aim cursor, rock throw
///   5. Rock flight
///   6. Player movement
///   7. Restart to the staging row
///
/// A successful reflection ends the frame after step 3.

use rand::Rng;

use crate::config::FRAMES_PER_SEC;
use crate::domain::entity::{FrameInput, MoveDir};
use crate::domain::rock::{Rock, MAX_THROW_CELLS};
use super::event::GameEvent;
use super::level::{self, Advance, LevelError};
use super::world::{Phase, WorldState, GAME_COMPLETE_FRAMES};

/// Rows between bullet and player that still allow a reflection.
const REFLECT_TOLERANCE: i32 = 1;
const TRAP_MESSAGE_FRAMES: u32 = 2 * FRAMES_PER_SEC;
const HIT_MESSAGE_FRAMES: u32 = FRAMES_PER_SEC;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, input: &FrameInput) -> Result<Vec<GameEvent>, LevelError> {
    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    if world.message_timer > 0 {
        world.message_timer -= 1;
        if world.message_timer == 0 { world.message.clear(); }
    }

    match world.phase {
        Phase::Memorizing => resolve_memorize(world, input, &mut events),
        Phase::Playing => resolve_playing(world, input, &mut events),
        Phase::Won => {
            if input.confirm {
                resolve_confirm(world, &mut events)?;
            }
        }
        Phase::Lost => {
            if input.restart {
                restart_after_loss(world);
            }
        }
        Phase::GameComplete => resolve_game_complete(world),
    }

    Ok(events)
}

// ══════════════════════════════════════════════════════════════
// Memorizing
// ══════════════════════════════════════════════════════════════

fn resolve_memorize(world: &mut WorldState, input: &FrameInput, events: &mut Vec<GameEvent>) {
    world.memorize_timer = world.memorize_timer.saturating_sub(1);
    if world.memorize_timer == 0 || input.action {
        world.phase = Phase::Playing;
        world.clear_message();
        tracing::debug!(tick = world.tick, "playing started");
        events.push(GameEvent::PlayingStarted);
    } else {
        world.set_memorize_message();
    }
}

// ══════════════════════════════════════════════════════════════
// Playing
// ══════════════════════════════════════════════════════════════

fn resolve_playing(world: &mut WorldState, input: &FrameInput, events: &mut Vec<GameEvent>) {
    if resolve_clock(world, events) { return; }
    resolve_enemies(world, events);
    if resolve_bullets(world, input, events) { return; }
    resolve_aim(world, input, events);
    if world.phase != Phase::Playing { return; }
    resolve_rocks(world);
    if !world.player.aiming {
        resolve_movement(world, &input.moves, events);
    }
    if input.restart && world.phase == Phase::Playing {
        world.player.send_to_staging();
        world.clear_message();
    }
}

/// Returns true when the round ended.
fn resolve_clock(world: &mut WorldState, events: &mut Vec<GameEvent>) -> bool {
    world.game_timer = world.game_timer.saturating_sub(1);
    if world.game_timer == 0 {
        lose(world, "Time's up! Press R to try again");
        events.push(GameEvent::TimeUp);
        return true;
    }
    if world.player.lives == 0 {
        lose(world, "Out of lives! Press R to try again");
        events.push(GameEvent::PlayerDied);
        return true;
    }
    false
}

fn resolve_enemies(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let size = world.grid_size();
    let difficulty = world.progression.difficulty;
    let player_x = world.player.x;
    let max_killers = world.rules.max_killers;

    for i in 0..world.enemies.len() {
        if world.enemies[i].alive && world.enemies[i].mode_flip_due() {
            let wants_pursuit = world.rng.gen_bool(0.5);
            let pursuing = world.enemies.iter()
                .enumerate()
                .filter(|&(j, e)| j != i && e.is_pursuing())
                .count();
            world.enemies[i].apply_mode_flip(wants_pursuit, pursuing, max_killers, size, &mut world.rng);
        }

        let tick = world.enemies[i].update(player_x, size, difficulty, &mut world.rng);
        if tick.fired {
            events.push(GameEvent::EnemyFired { enemy: i });
        }
        if tick.killed {
            tracing::info!(enemy = i, "enemy hit by its own bullet");
            events.push(GameEvent::EnemyKilled { enemy: i });
        }
    }
}

/// Bullet vs player. Returns true when the frame is over: a reflection
/// consumed the input, or the last life was lost.
fn resolve_bullets(world: &mut WorldState, input: &FrameInput, events: &mut Vec<GameEvent>) -> bool {
    let size = world.grid_size();
    let (px, py) = (world.player.x, world.player.y);
    let safe = world.player.on_staging();
    let mut hit = false;

    for (i, enemy) in world.enemies.iter_mut().enumerate() {
        if !enemy.alive { continue; }
        for bullet in enemy.bullets.iter_mut() {
            if !bullet.active || bullet.reflected { continue; }
            let (bx, by) = bullet.grid_cell(size);
            if bx != px { continue; }

            if input.reflect && (by - py).abs() <= REFLECT_TOLERANCE {
                bullet.reflect();
                events.push(GameEvent::BulletReflected { enemy: i });
                return true;
            }

            if !safe && by == py {
                bullet.active = false;
                world.player.lives = world.player.lives.saturating_sub(1);
                events.push(GameEvent::PlayerHit { lives_left: world.player.lives });
                hit = true;
            }
        }
    }

    if !hit { return false; }
    if world.player.lives == 0 {
        lose(world, "You were shot down! Press R to try again");
        events.push(GameEvent::PlayerDied);
        return true;
    }
    let text = format!("Hit! {} lives left", world.player.lives);
    world.set_message(text, HIT_MESSAGE_FRAMES);
    false
}

fn resolve_aim(world: &mut WorldState, input: &FrameInput, events: &mut Vec<GameEvent>) {
    if input.aim && world.player.rocks > 0 {
        let p = &mut world.player;
        p.aiming = !p.aiming;
        p.aim_x = p.x;
        p.aim_y = p.y;
    }
    if !world.player.aiming { return; }

    for &dir in &input.moves {
        move_cursor(world, dir);
    }

    if input.action && world.player.aim_y >= 0 {
        throw_rock(world, events);
    }
}

/// One cursor step: per-axis grid bounds, then the throw radius.
fn move_cursor(world: &mut WorldState, dir: MoveDir) {
    let max = world.grid_size() as i32 - 1;
    let (dx, dy) = dir.delta();
    let p = &mut world.player;

    if (dx < 0 && p.aim_x > 0) || (dx > 0 && p.aim_x < max) {
        p.aim_x += dx;
    }
    if (dy < 0 && p.aim_y > 0) || (dy > 0 && p.aim_y < max) {
        p.aim_y += dy;
    }

    let (ox, oy) = ((p.aim_x - p.x) as f64, (p.aim_y - p.y) as f64);
    if ox.hypot(oy) > MAX_THROW_CELLS {
        let angle = oy.atan2(ox);
        p.aim_x = p.x + (MAX_THROW_CELLS * angle.cos()) as i32;
        p.aim_y = p.y + (MAX_THROW_CELLS * angle.sin()) as i32;
    }
}

fn throw_rock(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let (ax, ay) = (world.player.aim_x, world.player.aim_y);
    let Some(node) = world.node_at(ax, ay) else { return };

    let from = (world.player.x, world.screen_row(world.player.y));
    let to = (ax, world.screen_row(ay));
    world.rocks.push(Rock::new(from, to, node));
    world.player.rocks -= 1;
    world.player.aiming = false;
    events.push(GameEvent::RockThrown { node });
    tracing::debug!(node, rocks_left = world.player.rocks, "rock thrown");

    if node == world.level.target {
        win(world, node, events);
    } else if world.level.is_trap(node) {
        world.fallen_traps.insert(node);
    }
}

fn resolve_rocks(world: &mut WorldState) {
    for rock in world.rocks.iter_mut() {
        rock.update();
    }
}

fn resolve_movement(world: &mut WorldState, moves: &[MoveDir], events: &mut Vec<GameEvent>) {
    for &dir in moves {
        try_move(world, dir, events);
        if world.phase != Phase::Playing { break; }
    }
}

fn try_move(world: &mut WorldState, dir: MoveDir, events: &mut Vec<GameEvent>) {
    let (dx, dy) = dir.delta();
    let (nx, ny) = (world.player.x + dx, world.player.y + dy);
    let size = world.grid_size() as i32;

    if !(0..size).contains(&nx) || !(-1..size).contains(&ny) { return; }
    let node = world.node_at(nx, ny);
    if node.is_some_and(|n| world.fallen_traps.contains(&n)) { return; }

    world.player.x = nx;
    world.player.y = ny;

    let Some(node) = node else { return };
    if world.level.is_trap(node) {
        world.player.send_to_staging();
        world.fallen_traps.insert(node);
        world.set_message("You fell into a trap! Back to the start", TRAP_MESSAGE_FRAMES);
        tracing::debug!(node, "trap triggered");
        events.push(GameEvent::TrapTriggered { node });
    } else if node == world.level.target {
        win(world, node, events);
    }
}

// ══════════════════════════════════════════════════════════════
// Transitions
// ══════════════════════════════════════════════════════════════

fn win(world: &mut WorldState, node: usize, events: &mut Vec<GameEvent>) {
    world.phase = Phase::Won;
    world.player.aiming = false;
    world.set_message("You found the treasure! Press ENTER to continue", 0);
    tracing::info!(node, frames_left = world.game_timer, "treasure found");
    events.push(GameEvent::TreasureFound { node });
}

fn lose(world: &mut WorldState, message: &str) {
    world.phase = Phase::Lost;
    world.player.aiming = false;
    world.fallen_traps.clear();
    world.set_message(message, 0);
    tracing::info!(reason = message, "round lost");
}

/// Full reset after a loss. The level layout is kept.
fn restart_after_loss(world: &mut WorldState) {
    tracing::info!("round restarted");
    level::reset_round(world);
}

fn resolve_confirm(world: &mut WorldState, events: &mut Vec<GameEvent>) -> Result<(), LevelError> {
    match level::level_up(&mut world.progression, &world.rules) {
        Advance::NextLevel => {
            level::load_level(world)?;
            events.push(GameEvent::LevelStarted {
                grid_size: world.grid_size(),
                difficulty: world.progression.difficulty.level(),
            });
        }
        Advance::GameComplete => {
            world.phase = Phase::GameComplete;
            world.end_timer = GAME_COMPLETE_FRAMES;
            world.set_message("Congratulations! You cleared every level", 0);
            tracing::info!("game complete");
            events.push(GameEvent::GameComplete);
        }
    }
    Ok(())
}

fn resolve_game_complete(world: &mut WorldState) {
    world.end_timer = world.end_timer.saturating_sub(1);
    if world.end_timer == 0 {
        world.quit = true;
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
