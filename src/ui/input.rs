/// Input state tracker.
///
/// Turns terminal key events into the per-frame `FrameInput` snapshot.
/// Game keys are edge-triggered: a key counts once when it goes from
/// "not held" to "held", and terminal auto-repeat while it stays down is
/// ignored. Presses that arrive between two simulation frames are latched
/// and handed over together by `take_frame`.
///
/// With keyboard enhancement the terminal reports releases and a key is
/// held from Press to Release. Otherwise a key counts as released once no
/// Press/Repeat arrived for `HOLD_TIMEOUT`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::{FrameInput, MoveDir};

/// After this duration without a Press/Repeat event, consider the key released.
/// Longer than the usual auto-repeat delay (250-500 ms), so a held key
/// stays one press.
const HOLD_TIMEOUT: Duration = Duration::from_millis(600);

const EXIT_KEYS: &[KeyCode] = &[KeyCode::Esc];

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Presses latched since the last `take_frame`.
    pending: FrameInput,

    /// Raw key events collected during drain, for meta-key handling.
    raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            pending: FrameInput::default(),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per loop iteration, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.raw_events.clear();

        // Read all available events without blocking
        while poll(Duration::ZERO).unwrap_or(false) {
            let Ok(Event::Key(key)) = event::read() else { continue };
            self.raw_events.push(key);
            self.record(key, Instant::now());
        }

        self.expire(Instant::now());
    }

    /// Apply one key event observed at `now`.
    fn record(&mut self, key: KeyEvent, now: Instant) {
        let code = normalize(key.code);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&code);
            }
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held_at(code, now);
                self.last_active.insert(code, now);
                if !was_held {
                    latch(&mut self.pending, code);
                }
            }
        }
    }

    /// Drop keys whose hold timed out. Releases make this unnecessary.
    fn expire(&mut self, now: Instant) {
        if self.honor_release { return; }
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    /// Hand the latched presses to the simulation and start a new frame.
    pub fn take_frame(&mut self) -> FrameInput {
        std::mem::take(&mut self.pending)
    }

    /// Is this key currently held down?
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.is_held_at(code, Instant::now())
    }

    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        match self.last_active.get(&code) {
            Some(_) if self.honor_release => true,
            Some(t) => now.duration_since(*t) < HOLD_TIMEOUT,
            None => false,
        }
    }

    /// Exit is level-triggered: Esc held, or Ctrl+C seen this drain.
    pub fn exit_requested(&self) -> bool {
        EXIT_KEYS.iter().any(|&c| self.is_held(c)) || self.ctrl_c_pressed()
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}

// ── Key mapping ──

/// Letters are matched case-insensitively.
fn normalize(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

fn move_for(code: KeyCode) -> Option<MoveDir> {
    match code {
        KeyCode::Left | KeyCode::Char('a') => Some(MoveDir::Left),
        KeyCode::Right | KeyCode::Char('d') => Some(MoveDir::Right),
        KeyCode::Up | KeyCode::Char('w') => Some(MoveDir::Up),
        KeyCode::Down | KeyCode::Char('s') => Some(MoveDir::Down),
        KeyCode::Char('q') => Some(MoveDir::UpLeft),
        KeyCode::Char('e') => Some(MoveDir::UpRight),
        KeyCode::Char('z') => Some(MoveDir::DownLeft),
        KeyCode::Char('c') => Some(MoveDir::DownRight),
        _ => None,
    }
}

/// Record one fresh press into the frame snapshot.
fn latch(frame: &mut FrameInput, code: KeyCode) {
    if let Some(dir) = move_for(code) {
        frame.moves.push(dir);
        return;
    }
    match code {
        KeyCode::Char(' ') => frame.action = true,
        KeyCode::Tab | KeyCode::Char('f') => frame.aim = true,
        KeyCode::Char('v') => frame.reflect = true,
        KeyCode::Char('r') => frame.restart = true,
        KeyCode::Enter => frame.confirm = true,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(codes: &[KeyCode]) -> FrameInput {
        let mut f = FrameInput::default();
        for &c in codes {
            latch(&mut f, normalize(c));
        }
        f
    }

    #[test]
    fn movement_keys_keep_order() {
        let f = frame_of(&[KeyCode::Up, KeyCode::Char('D'), KeyCode::Char('q')]);
        assert_eq!(f.moves, vec![MoveDir::Up, MoveDir::Right, MoveDir::UpLeft]);
        assert!(!f.action);
    }

    #[test]
    fn action_keys_set_flags() {
        let f = frame_of(&[
            KeyCode::Char(' '), KeyCode::Tab, KeyCode::Char('V'),
            KeyCode::Char('r'), KeyCode::Enter,
        ]);
        assert!(f.action && f.aim && f.reflect && f.restart && f.confirm);
        assert!(f.moves.is_empty());
    }

    #[test]
    fn take_frame_clears_latch() {
        let mut input = InputState::new();
        latch(&mut input.pending, KeyCode::Char('f'));
        assert!(input.take_frame().aim);
        assert!(!input.take_frame().aim);
    }

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn held_key_through_repeat_delay_is_one_press() {
        let mut input = InputState::new();
        let t0 = Instant::now();
        input.record(key(KeyCode::Up, KeyEventKind::Press), t0);
        // First auto-repeat after a typical 500 ms delay, then 30 ms apart.
        input.record(key(KeyCode::Up, KeyEventKind::Press), t0 + Duration::from_millis(500));
        input.record(key(KeyCode::Up, KeyEventKind::Press), t0 + Duration::from_millis(530));
        assert_eq!(input.take_frame().moves, vec![MoveDir::Up]);
    }

    #[test]
    fn key_pressed_again_after_timeout_counts_twice() {
        let mut input = InputState::new();
        let t0 = Instant::now();
        input.record(key(KeyCode::Up, KeyEventKind::Press), t0);
        input.expire(t0 + HOLD_TIMEOUT);
        input.record(key(KeyCode::Up, KeyEventKind::Press), t0 + HOLD_TIMEOUT);
        assert_eq!(input.take_frame().moves, vec![MoveDir::Up, MoveDir::Up]);
    }

    #[test]
    fn release_events_end_the_hold() {
        let mut input = InputState::new();
        input.honor_release = true;
        let t0 = Instant::now();
        input.record(key(KeyCode::Left, KeyEventKind::Press), t0);
        input.record(key(KeyCode::Left, KeyEventKind::Repeat), t0 + Duration::from_secs(2));
        input.expire(t0 + Duration::from_secs(2));
        assert_eq!(input.take_frame().moves, vec![MoveDir::Left]);

        input.record(key(KeyCode::Left, KeyEventKind::Release), t0 + Duration::from_secs(3));
        input.record(key(KeyCode::Left, KeyEventKind::Press), t0 + Duration::from_millis(3010));
        assert_eq!(input.take_frame().moves, vec![MoveDir::Left]);
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        let f = frame_of(&[KeyCode::Char('x'), KeyCode::F(1)]);
        assert!(f.moves.is_empty());
        assert!(!(f.action || f.aim || f.reflect || f.restart || f.confirm));
    }
}
