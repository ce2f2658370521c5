/// Enemies and their bullets.
///
/// Enemies patrol a row just above the grid (`ENEMY_Y`, in screen rows
/// counted from the top of the grid) and shoot straight down. Their column
/// is continuous; collisions round to the nearest cell.
///
/// Two modes:
///   1. **Wander**: drift toward a random target column.
///   2. **Pursuit**: PID controller on the player's column.
///
/// Every `MODE_CHANGE_FRAMES` each enemy flips a coin for its next mode.
/// How many enemies may pursue at once is capped by the caller, which
/// passes the current pursuit count into `apply_mode_flip`.
///
/// Bullets belong to the enemy that fired them and keep that enemy's index
/// as `owner`, so a reflected bullet knows whom to hit.

use rand::Rng;

use super::entity::Difficulty;

/// Screen row of the enemy patrol line (negative = above the top row).
pub const ENEMY_Y: f64 = -1.6;
/// Bullet travel per frame, in rows.
pub const BULLET_SPEED: f64 = 0.18;
/// Frames between mode coin flips (6 s).
pub const MODE_CHANGE_FRAMES: u32 = 6 * 60;
/// Frames between shots (1.5 s).
pub const SHOT_COOLDOWN_FRAMES: u32 = 90;

const WANDER_STEP: f64 = 0.05;
const WANDER_ARRIVE: f64 = 0.1;
const FIRE_ALIGNMENT: f64 = 0.5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EnemyMode {
    Wander,
    Pursuit,
}

// ── PID ──

#[derive(Clone, Copy, Debug, Default)]
pub struct Pid {
    pub accumulated_error: f64,
    pub previous_error: f64,
}

impl Pid {
    /// One controller step toward `setpoint`. Returns a movement delta in
    /// `[-1, 1]`.
    pub fn step(&mut self, setpoint: f64, current: f64, difficulty: Difficulty) -> f64 {
        let error = setpoint - current;
        self.accumulated_error += error;
        let derivative = error - self.previous_error;
        self.previous_error = error;
        pid_output(difficulty.pid_gains(), error, self.accumulated_error, derivative)
    }

    pub fn reset(&mut self) {
        *self = Pid::default();
    }
}

/// Weighted PID sum, clamped to `[-1, 1]`.
pub fn pid_output(gains: (f64, f64, f64), error: f64, integral: f64, derivative: f64) -> f64 {
    let (kp, ki, kd) = gains;
    let output = kp * error + ki * integral + kd * derivative;
    if output.is_nan() {
        return 0.0;
    }
    output.clamp(-1.0, 1.0)
}

// ── Wander ──

/// Movement delta for one wander frame.
///
/// Far from the target: a fixed step of `WANDER_STEP` toward it. Already at
/// the target: a random nudge in `[-1, 1]`.
pub fn wander_delta(current: f64, target: f64, rng: &mut impl Rng) -> f64 {
    if (current - target).abs() < WANDER_ARRIVE {
        return rng.gen::<f64>() * 2.0 - 1.0;
    }
    let direction = target - current;
    if direction.abs() > WANDER_STEP {
        WANDER_STEP.copysign(direction)
    } else {
        direction
    }
}

/// Uniform random column in `[0, grid_size - 1]`.
pub fn random_column(grid_size: usize, rng: &mut impl Rng) -> f64 {
    rng.gen::<f64>() * max_column(grid_size)
}

/// Roll a die and check it against the difficulty's firing odds.
pub fn russian_roulette(difficulty: Difficulty, rng: &mut impl Rng) -> bool {
    let roll: u8 = rng.gen_range(1..=6);
    difficulty.roulette_passes(roll)
}

fn max_column(grid_size: usize) -> f64 {
    grid_size.saturating_sub(1) as f64
}

// ── Bullet ──

#[derive(Clone, Debug)]
pub struct Bullet {
    pub x: f64,
    /// Screen row (0 = top row of the grid), continuous.
    pub y: f64,
    /// +1 moving down toward the player, -1 after a reflection.
    pub vy: f64,
    pub active: bool,
    pub reflected: bool,
    /// Index of the firing enemy in the enemy list.
    pub owner: usize,
}

impl Bullet {
    pub fn new(x: f64, owner: usize, active: bool) -> Self {
        Bullet { x, y: ENEMY_Y, vy: 1.0, active, reflected: false, owner }
    }

    /// Rounded grid cell in player coordinates (`y` counted from the bottom).
    pub fn grid_cell(&self, grid_size: usize) -> (i32, i32) {
        let col = self.x.round() as i32;
        let row = grid_size as i32 - 1 - self.y.round() as i32;
        (col, row)
    }

    /// Is `y` inside the vertical play band `[ENEMY_Y - 1, grid_size)`?
    pub fn in_band(&self, grid_size: usize) -> bool {
        self.y >= ENEMY_Y - 1.0 && self.y < grid_size as f64
    }

    pub fn reflect(&mut self) {
        self.vy = -1.0;
        self.reflected = true;
    }
}

// ── Enemy ──

/// What happened to an enemy during one update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnemyTick {
    /// A live bullet was fired this frame.
    pub fired: bool,
    /// The enemy was hit by one of its own reflected bullets.
    pub killed: bool,
}

#[derive(Clone, Debug)]
pub struct Enemy {
    pub id: usize,
    pub x: f64,
    pub mode: EnemyMode,
    pub target_x: f64,
    pub pid: Pid,
    pub shot_cooldown: u32,
    pub mode_timer: u32,
    pub alive: bool,
    pub bullets: Vec<Bullet>,
}

impl Enemy {
    pub fn new(id: usize, x: f64, grid_size: usize, rng: &mut impl Rng) -> Self {
        Enemy {
            id,
            x,
            mode: EnemyMode::Wander,
            target_x: random_column(grid_size, rng),
            pid: Pid::default(),
            shot_cooldown: 0,
            mode_timer: 0,
            alive: true,
            bullets: Vec::new(),
        }
    }

    /// Rounded column used for collisions.
    pub fn grid_x(&self) -> i32 {
        self.x.round() as i32
    }

    pub fn is_pursuing(&self) -> bool {
        self.alive && self.mode == EnemyMode::Pursuit
    }

    /// Advance the mode timer. Returns true when a new coin flip is due.
    pub fn mode_flip_due(&mut self) -> bool {
        if self.mode_timer == 0 {
            self.mode_timer = MODE_CHANGE_FRAMES;
            true
        } else {
            self.mode_timer -= 1;
            false
        }
    }

    /// Apply a coin flip. Entering pursuit is silently denied when
    /// `pursuing` (other enemies already in pursuit) has reached
    /// `max_killers`. An enemy left wandering picks a fresh target.
    pub fn apply_mode_flip(
        &mut self,
        wants_pursuit: bool,
        pursuing: usize,
        max_killers: usize,
        grid_size: usize,
        rng: &mut impl Rng,
    ) {
        match (wants_pursuit, self.mode) {
            (true, EnemyMode::Wander) if pursuing < max_killers => {
                self.mode = EnemyMode::Pursuit;
                self.pid.reset();
            }
            (false, EnemyMode::Pursuit) => self.mode = EnemyMode::Wander,
            _ => {}
        }
        if self.mode == EnemyMode::Wander {
            self.target_x = random_column(grid_size, rng);
        }
    }

    /// One frame: move, maybe fire, then advance this enemy's bullets.
    /// Dead enemies are frozen, bullets included.
    pub fn update(
        &mut self,
        player_x: i32,
        grid_size: usize,
        difficulty: Difficulty,
        rng: &mut impl Rng,
    ) -> EnemyTick {
        let mut tick = EnemyTick::default();
        if !self.alive {
            return tick;
        }

        self.advance_position(player_x, grid_size, difficulty, rng);

        if self.shot_cooldown > 0 {
            self.shot_cooldown -= 1;
        }
        if self.shot_cooldown == 0 && (player_x as f64 - self.x).abs() < FIRE_ALIGNMENT {
            tick.fired = self.fire(difficulty, rng);
        }

        tick.killed = self.advance_bullets(grid_size);
        tick
    }

    fn advance_position(
        &mut self,
        player_x: i32,
        grid_size: usize,
        difficulty: Difficulty,
        rng: &mut impl Rng,
    ) {
        match self.mode {
            EnemyMode::Wander => {
                self.x += wander_delta(self.x, self.target_x, rng);
                if (self.x - self.target_x).abs() < WANDER_ARRIVE {
                    self.target_x = random_column(grid_size, rng);
                }
            }
            EnemyMode::Pursuit => {
                self.x += self.pid.step(player_x as f64, self.x, difficulty);
            }
        }
        self.x = self.x.clamp(0.0, max_column(grid_size));
    }

    /// Two independent roulette rolls: a pass on the first spawns a live
    /// bullet, a fail on the second spawns a dud that is dropped with the
    /// other inactive bullets at the end of the frame. The cooldown resets
    /// either way.
    fn fire(&mut self, difficulty: Difficulty, rng: &mut impl Rng) -> bool {
        let live = russian_roulette(difficulty, rng);
        if live {
            self.bullets.push(Bullet::new(self.x, self.id, true));
        }
        if !russian_roulette(difficulty, rng) {
            self.bullets.push(Bullet::new(self.x, self.id, false));
        }
        self.shot_cooldown = SHOT_COOLDOWN_FRAMES;
        live
    }

    /// Move bullets, resolve reflected hits on this enemy, drop inactive
    /// bullets. Returns true if this enemy died this frame.
    fn advance_bullets(&mut self, grid_size: usize) -> bool {
        let mut killed = false;
        let own_col = self.grid_x();
        let own_row = ENEMY_Y.round() as i32;

        for bullet in self.bullets.iter_mut().filter(|b| b.active) {
            bullet.y += bullet.vy * BULLET_SPEED;

            if bullet.reflected
                && bullet.owner == self.id
                && self.alive
                && bullet.x.round() as i32 == own_col
                && bullet.y.round() as i32 == own_row
            {
                self.alive = false;
                bullet.active = false;
                killed = true;
            }

            if !bullet.in_band(grid_size) {
                bullet.active = false;
            }
        }

        self.bullets.retain(|b| b.active);
        killed
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn enemy_at(x: f64) -> Enemy {
        let mut e = Enemy::new(0, x, 6, &mut rng());
        e.target_x = x;
        e
    }

    /// Pursuing enemy that stays put while the player shares its column.
    fn parked(x: f64) -> Enemy {
        let mut e = enemy_at(x);
        e.mode = EnemyMode::Pursuit;
        e
    }

    // ── PID ──

    #[test]
    fn easy_pid_is_proportional_only() {
        let mut pid = Pid::default();
        let out = pid.step(3.0, 2.0, Difficulty::Easy);
        assert!((out - 0.3).abs() < 1e-9);
        assert!((pid.accumulated_error - 1.0).abs() < 1e-9);
        assert!((pid.previous_error - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hard_pid_uses_integral_and_derivative() {
        let mut pid = Pid::default();
        // error 2: 0.3*2 + 0.1*2 + 0.05*2 = 0.9
        let out = pid.step(2.0, 0.0, Difficulty::Hard);
        assert!((out - 0.9).abs() < 1e-9);
        // error 1, integral 3, derivative -1: 0.3 + 0.3 - 0.05 = 0.55
        let out = pid.step(2.0, 1.0, Difficulty::Hard);
        assert!((out - 0.55).abs() < 1e-9);
    }

    #[test]
    fn pid_clamps_large_errors() {
        let mut pid = Pid::default();
        assert!((pid.step(100.0, 0.0, Difficulty::Medium) - 1.0).abs() < 1e-9);
        assert!((pid.step(-100.0, 0.0, Difficulty::Medium) + 1.0).abs() < 1e-9);
    }

    // ── Wander ──

    #[test]
    fn wander_steps_toward_target() {
        let mut r = rng();
        assert!((wander_delta(1.0, 4.0, &mut r) - 0.05).abs() < 1e-9);
        assert!((wander_delta(4.0, 1.0, &mut r) + 0.05).abs() < 1e-9);
        assert!((wander_delta(1.0, 1.12, &mut r) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn wander_at_target_emits_random_nudge() {
        let mut r = rng();
        for _ in 0..100 {
            let d = wander_delta(2.0, 2.05, &mut r);
            assert!((-1.0..=1.0).contains(&d));
        }
    }

    #[test]
    fn arriving_enemy_picks_new_target() {
        let mut e = enemy_at(2.0);
        e.target_x = 2.04;
        e.update(0, 6, Difficulty::Easy, &mut rng());
        assert!((0.0..=5.0).contains(&e.target_x));
        assert!((0.0..=5.0).contains(&e.x));
    }

    // ── Mode switching ──

    #[test]
    fn first_update_flips_mode_immediately() {
        let mut e = enemy_at(1.0);
        assert!(e.mode_flip_due());
        assert_eq!(e.mode_timer, MODE_CHANGE_FRAMES);
        assert!(!e.mode_flip_due());
        assert_eq!(e.mode_timer, MODE_CHANGE_FRAMES - 1);
    }

    #[test]
    fn pursuit_denied_at_cap() {
        let mut e = enemy_at(1.0);
        e.apply_mode_flip(true, 3, 3, 6, &mut rng());
        assert_eq!(e.mode, EnemyMode::Wander);
        e.apply_mode_flip(true, 2, 3, 6, &mut rng());
        assert_eq!(e.mode, EnemyMode::Pursuit);
        e.apply_mode_flip(false, 3, 3, 6, &mut rng());
        assert_eq!(e.mode, EnemyMode::Wander);
    }

    #[test]
    fn entering_pursuit_resets_pid() {
        let mut e = enemy_at(1.0);
        e.pid.accumulated_error = 42.0;
        e.apply_mode_flip(true, 0, 3, 6, &mut rng());
        assert!(e.pid.accumulated_error.abs() < 1e-9);
    }

    // ── Firing ──

    #[test]
    fn fires_only_when_aligned_and_cooled_down() {
        let mut r = rng();
        let mut e = enemy_at(3.0);
        e.target_x = 5.0;
        e.update(0, 6, Difficulty::Hard, &mut r);
        assert_eq!(e.shot_cooldown, 0);
        assert!(e.bullets.is_empty());

        e.update(3, 6, Difficulty::Hard, &mut r);
        assert_eq!(e.shot_cooldown, SHOT_COOLDOWN_FRAMES);
        assert!(e.bullets.iter().all(|b| b.active));

        e.update(3, 6, Difficulty::Hard, &mut r);
        assert_eq!(e.shot_cooldown, SHOT_COOLDOWN_FRAMES - 1);
    }

    #[test]
    fn fired_bullet_counts_match_roulette() {
        let mut r = rng();
        let mut fired = 0;
        for _ in 0..200 {
            let mut e = parked(3.0);
            let tick = e.update(3, 6, Difficulty::Hard, &mut r);
            assert_eq!(tick.fired, !e.bullets.is_empty());
            if tick.fired { fired += 1; }
        }
        // 83% odds on Hard
        assert!(fired > 120, "fired {fired}");
    }

    // ── Bullets ──

    #[test]
    fn bullet_leaves_band_at_bottom() {
        let mut e = enemy_at(0.0);
        e.shot_cooldown = 1000;
        let mut b = Bullet::new(0.0, 0, true);
        b.y = 5.9;
        e.bullets.push(b);
        e.update(5, 6, Difficulty::Easy, &mut rng());
        assert!(e.bullets.is_empty());
    }

    #[test]
    fn bullet_band_edges() {
        let mut b = Bullet::new(0.0, 0, true);
        b.y = ENEMY_Y - 1.0;
        assert!(b.in_band(6));
        b.y = ENEMY_Y - 1.01;
        assert!(!b.in_band(6));
        b.y = 5.99;
        assert!(b.in_band(6));
        b.y = 6.0;
        assert!(!b.in_band(6));
    }

    #[test]
    fn reflected_bullet_kills_owner_once() {
        let mut r = rng();
        let mut e = parked(2.0);
        e.shot_cooldown = 1000;
        let mut b = Bullet::new(2.0, 0, true);
        b.y = 0.0;
        b.reflect();
        e.bullets.push(b);

        let mut kills = 0;
        for _ in 0..40 {
            if e.update(2, 6, Difficulty::Easy, &mut r).killed { kills += 1; }
        }
        assert_eq!(kills, 1);
        assert!(!e.alive);
        assert!(e.bullets.is_empty());
    }

    #[test]
    fn reflected_bullet_spares_other_enemies() {
        let mut r = rng();
        let mut e = parked(2.0);
        e.shot_cooldown = 1000;
        let mut b = Bullet::new(2.0, 1, true);
        b.y = 0.0;
        b.reflect();
        e.bullets.push(b);

        for _ in 0..40 {
            assert!(!e.update(2, 6, Difficulty::Easy, &mut r).killed);
        }
        assert!(e.alive);
        assert!(e.bullets.is_empty());
    }

    #[test]
    fn unreflected_bullet_passes_owner() {
        let mut e = parked(2.0);
        e.shot_cooldown = 1000;
        e.bullets.push(Bullet::new(2.0, 0, true));
        e.update(2, 6, Difficulty::Easy, &mut rng());
        assert!(e.alive);
        assert_eq!(e.bullets.len(), 1);
    }

    #[test]
    fn dead_enemy_is_frozen() {
        let mut e = enemy_at(2.0);
        e.alive = false;
        e.bullets.push(Bullet::new(2.0, 0, true));
        let tick = e.update(2, 6, Difficulty::Hard, &mut rng());
        assert_eq!(tick, EnemyTick::default());
        assert!((e.bullets[0].y - ENEMY_Y).abs() < 1e-9);
    }

    #[test]
    fn bullet_grid_cell_flips_rows() {
        let mut b = Bullet::new(2.4, 0, true);
        b.y = 5.0;
        assert_eq!(b.grid_cell(6), (2, 0));
        b.y = 0.2;
        assert_eq!(b.grid_cell(6), (2, 5));
    }

    proptest! {
        #[test]
        fn prop_pid_output_clamped(
            e in -1e6f64..1e6, i in -1e9f64..1e9, d in -1e6f64..1e6, level in 0usize..3
        ) {
            let difficulty = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard][level];
            let out = pid_output(difficulty.pid_gains(), e, i, d);
            prop_assert!((-1.0..=1.0).contains(&out));
        }

        #[test]
        fn prop_wander_stays_on_grid(
            size in 2usize..14, x in 0.0f64..1.0, target in 0.0f64..1.0, seed in any::<u64>()
        ) {
            let mut r = StdRng::seed_from_u64(seed);
            let max = (size - 1) as f64;
            let mut e = Enemy::new(0, x * max, size, &mut r);
            e.target_x = target * max;
            e.shot_cooldown = 1000;
            for _ in 0..50 {
                e.update(0, size, Difficulty::Easy, &mut r);
                prop_assert!(e.x >= 0.0 && e.x <= max);
            }
        }
    }
}
