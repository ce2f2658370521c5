/// Events emitted during a simulation step.
/// The presentation layer consumes these for logging and feedback.

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    PlayingStarted,
    EnemyFired { enemy: usize },
    BulletReflected { enemy: usize },
    EnemyKilled { enemy: usize },
    PlayerHit { lives_left: u32 },
    TrapTriggered { node: usize },
    TreasureFound { node: usize },
    RockThrown { node: usize },
    TimeUp,
    PlayerDied,
    LevelStarted { grid_size: usize, difficulty: u8 },
    GameComplete,
}
