/// Entities: Player, Difficulty, movement directions and the per-frame
/// input snapshot.
///
/// Grid coordinates: `x` is the column, `y` is the row counted from the
/// bottom. `y == -1` is the staging row just below the grid, where the
/// player starts and where nothing can hurt them.

/// Row of the staging area outside the grid.
pub const STAGING_Y: i32 = -1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Numeric level 1..=3, as shown in the HUD.
    pub fn level(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    /// Next difficulty, or `None` when it wraps back to Easy.
    pub fn next(self) -> Option<Difficulty> {
        match self {
            Difficulty::Easy => Some(Difficulty::Medium),
            Difficulty::Medium => Some(Difficulty::Hard),
            Difficulty::Hard => None,
        }
    }

    /// Fraction of the base trap budget placed on the grid.
    pub fn trap_factor(self) -> f64 {
        match self {
            Difficulty::Easy => 0.6,
            Difficulty::Medium => 0.8,
            Difficulty::Hard => 1.0,
        }
    }

    /// PID gains `(kp, ki, kd)` for enemies in pursuit.
    pub fn pid_gains(self) -> (f64, f64, f64) {
        match self {
            Difficulty::Easy => (0.3, 0.0, 0.0),
            Difficulty::Medium => (0.3, 0.1, 0.0),
            Difficulty::Hard => (0.3, 0.1, 0.05),
        }
    }

    /// Does a six-sided roll pass the shooting roulette at this difficulty?
    /// Easy passes on 1-2, Medium on even rolls, Hard on anything but 6.
    pub fn roulette_passes(self, roll: u8) -> bool {
        match self {
            Difficulty::Easy => roll < 3,
            Difficulty::Medium => roll % 2 == 0,
            Difficulty::Hard => roll != 6,
        }
    }
}

/// Eight-way movement, edge-triggered (one cell per key press).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveDir {
    Left,
    Right,
    Up,
    Down,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl MoveDir {
    /// Cell delta `(dx, dy)`; up is `+y`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            MoveDir::Left => (-1, 0),
            MoveDir::Right => (1, 0),
            MoveDir::Up => (0, 1),
            MoveDir::Down => (0, -1),
            MoveDir::UpLeft => (-1, 1),
            MoveDir::UpRight => (1, 1),
            MoveDir::DownLeft => (-1, -1),
            MoveDir::DownRight => (1, -1),
        }
    }
}

/// Frame input: every game decision in one step reads this snapshot.
/// All fields are "just pressed" edges sampled at the start of the frame.
#[derive(Clone, Debug, Default)]
pub struct FrameInput {
    /// Movement presses in the order they arrived.
    pub moves: Vec<MoveDir>,
    /// Skip the memorize countdown / throw the rock while aiming.
    pub action: bool,
    /// Toggle aiming mode.
    pub aim: bool,
    /// Reflect an incoming bullet.
    pub reflect: bool,
    pub restart: bool,
    /// Continue to the next level after a win.
    pub confirm: bool,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub x: i32,
    pub y: i32,
    pub lives: u32,
    pub rocks: u32,
    pub aiming: bool,
    pub aim_x: i32,
    pub aim_y: i32,
}

impl Player {
    /// A fresh player on the staging row.
    pub fn new(lives: u32, rocks: u32) -> Self {
        Player {
            x: 0,
            y: STAGING_Y,
            lives,
            rocks,
            aiming: false,
            aim_x: 0,
            aim_y: 0,
        }
    }

    pub fn send_to_staging(&mut self) {
        self.x = 0;
        self.y = STAGING_Y;
        self.aiming = false;
    }

    pub fn on_staging(&self) -> bool {
        self.y == STAGING_Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_progression_wraps() {
        assert_eq!(Difficulty::Easy.next(), Some(Difficulty::Medium));
        assert_eq!(Difficulty::Medium.next(), Some(Difficulty::Hard));
        assert_eq!(Difficulty::Hard.next(), None);
    }

    #[test]
    fn roulette_odds_per_difficulty() {
        let passes = |d: Difficulty| (1..=6u8).filter(|&r| d.roulette_passes(r)).count();
        assert_eq!(passes(Difficulty::Easy), 2);   // 33%
        assert_eq!(passes(Difficulty::Medium), 3); // 50%
        assert_eq!(passes(Difficulty::Hard), 5);   // 83%
    }

    #[test]
    fn diagonal_deltas() {
        assert_eq!(MoveDir::UpLeft.delta(), (-1, 1));
        assert_eq!(MoveDir::DownRight.delta(), (1, -1));
    }

    #[test]
    fn new_player_starts_on_staging() {
        let p = Player::new(2, 5);
        assert!(p.on_staging());
        assert_eq!((p.x, p.lives, p.rocks), (0, 2, 5));
        assert!(!p.aiming);
    }
}
