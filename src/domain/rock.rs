/// Thrown rocks.
///
/// A rock reveals its target cell the moment it is thrown; the flight is
/// cosmetic. Positions are in screen cells (column, row from the top).

pub const ROCK_SPEED: f64 = 0.2;
/// Longest travel vector considered for one flight, in cells.
pub const MAX_THROW_CELLS: f64 = 5.0;
const ARRIVE_DISTANCE: f64 = 0.1;

#[derive(Clone, Debug)]
pub struct Rock {
    pub x: f64,
    pub y: f64,
    pub target_x: i32,
    pub target_y: i32,
    pub active: bool,
    /// Grid node revealed by this throw.
    pub revealed: usize,
}

impl Rock {
    pub fn new(from: (i32, i32), target: (i32, i32), revealed: usize) -> Self {
        Rock {
            x: from.0 as f64,
            y: from.1 as f64,
            target_x: target.0,
            target_y: target.1,
            active: true,
            revealed,
        }
    }

    /// One frame of flight toward the target.
    pub fn update(&mut self) {
        if !self.active {
            return;
        }

        let mut dx = self.target_x as f64 - self.x;
        let mut dy = self.target_y as f64 - self.y;
        let mut length = dx.hypot(dy);

        if length < ARRIVE_DISTANCE {
            self.active = false;
            return;
        }

        if length > MAX_THROW_CELLS {
            dx *= MAX_THROW_CELLS / length;
            dy *= MAX_THROW_CELLS / length;
            length = MAX_THROW_CELLS;
        }

        // Land exactly rather than overshoot on the last frame.
        let step = ROCK_SPEED.min(length);
        self.x += dx / length * step;
        self.y += dy / length * step;
    }
}
