/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. Swap front/back
///
/// Screen layout, top to bottom: HUD, enemy patrol band (two rows), the
/// grid with row `size - 1` on top, the staging row, message bar, help.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::config::FRAMES_PER_SEC;
use crate::domain::enemy::{Bullet, ENEMY_Y};
use crate::sim::world::{Phase, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// gaps between rows match the cells on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel used to invalidate the back buffer.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Renderer ──

/// Each game cell is two terminal columns wide.
const CELL_W: usize = 2;
const LEFT_MARGIN: usize = 2;

const HUD_ROW: usize = 0;
/// Terminal row of screen row -2 (the top of the enemy band).
const BAND_ROW: usize = 2;
/// Screen rows above the grid drawn by the renderer.
const BAND_ROWS: i32 = 2;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const HIDDEN: Color = Color::Rgb { r: 70, g: 70, b: 90 };
const FALLEN_BG: Color = Color::Rgb { r: 90, g: 20, b: 20 };
const STAGING_BG: Color = Color::Rgb { r: 30, g: 45, b: 30 };
const AIM_BG: Color = Color::Rgb { r: 110, g: 40, b: 110 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    last_size: usize,
    /// Release events were requested from the terminal in `init`.
    keyboard_enhanced: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            last_size: 0,
            keyboard_enhanced: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.keyboard_enhanced = true;
        }

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        Ok(())
    }

    /// Whether the terminal reports key releases.
    pub fn keyboard_enhanced(&self) -> bool {
        self.keyboard_enhanced
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.keyboard_enhanced {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
            self.keyboard_enhanced = false;
        }
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        // Force full repaint: back differs from front everywhere.
        self.back.cells.fill(Cell::INVALID);
    }

    pub fn render(&mut self, world: &WorldState) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Phase or grid change: clean repaint
        if self.last_phase != Some(world.phase) || self.last_size != world.grid_size() {
            self.back.cells.fill(Cell::INVALID);
            self.last_phase = Some(world.phase);
            self.last_size = world.grid_size();
        }

        self.front.clear();
        self.compose_hud(world);
        self.compose_band(world);
        self.compose_grid(world);
        self.compose_projectiles(world);
        self.compose_footer(world);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) { continue; }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Layout helpers ──

    fn col_of(x: i32) -> Option<usize> {
        usize::try_from(x).ok().map(|x| LEFT_MARGIN + x * CELL_W)
    }

    /// Terminal row of a (rounded) screen row; screen row 0 is the grid top.
    fn row_of(screen_y: i32) -> Option<usize> {
        usize::try_from(screen_y + BAND_ROWS).ok().map(|r| BAND_ROW + r)
    }

    fn put_cell(&mut self, x: i32, screen_y: i32, ch: char, fg: Color, bg: Color) {
        if let (Some(col), Some(row)) = (Self::col_of(x), Self::row_of(screen_y)) {
            self.front.set(col, row, Cell::new(ch, fg, bg));
            self.front.set(col + 1, row, Cell::new(' ', fg, bg));
        }
    }

    // ── Compose: build front buffer content ──

    fn compose_hud(&mut self, w: &WorldState) {
        let secs = w.game_timer.div_ceil(FRAMES_PER_SEC);
        let phase = match w.phase {
            Phase::Memorizing => "MEMORIZE",
            Phase::Playing if w.player.aiming => "AIMING",
            Phase::Playing => "PLAY",
            Phase::Won => "FOUND!",
            Phase::Lost => "LOST",
            Phase::GameComplete => "COMPLETE",
        };
        let mut hud = format!(
            " Level {}  Difficulty {}  Time {:>2}s  Lives {}  Rocks {}",
            w.progression.level_number(&w.rules),
            w.progression.difficulty.level(),
            secs,
            w.player.lives,
            w.player.rocks,
        );
        if !w.enemies.is_empty() {
            hud.push_str(&format!("  Hunting {}/{}", w.pursuing_count(), w.enemies.len()));
        }
        hud.push_str(&format!("  [{phase}] "));
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
    }

    fn compose_band(&mut self, w: &WorldState) {
        let row = ENEMY_Y.round() as i32;
        for enemy in &w.enemies {
            let (ch, fg) = if enemy.alive {
                ('V', Color::Rgb { r: 255, g: 80, b: 80 })
            } else {
                ('x', Color::DarkGrey)
            };
            self.put_cell(enemy.grid_x(), row, ch, fg, Color::Reset);
        }
    }

    fn compose_grid(&mut self, w: &WorldState) {
        let size = w.grid_size() as i32;

        for y in 0..size {
            for x in 0..size {
                let Some(node) = w.node_at(x, y) else { continue };
                let (ch, fg, bg) = Self::node_glyph(w, node);
                self.put_cell(x, w.screen_row(y), ch, fg, bg);
            }
        }
        for x in 0..size {
            self.put_cell(x, w.screen_row(-1), '_', Color::DarkGreen, STAGING_BG);
        }

        if w.player.aiming {
            let (ax, ay) = (w.player.aim_x, w.player.aim_y);
            self.put_cell(ax, w.screen_row(ay), '+', Color::White, AIM_BG);
        }

        let (px, py) = (w.player.x, w.player.y);
        let bg = if w.player.on_staging() { STAGING_BG } else { Color::Reset };
        self.put_cell(px, w.screen_row(py), '@', Color::Rgb { r: 80, g: 255, b: 255 }, bg);
    }

    fn node_glyph(w: &WorldState, node: usize) -> (char, Color, Color) {
        if !w.is_visible(node) {
            return ('·', HIDDEN, Color::Reset);
        }
        if node == w.level.target {
            ('$', Color::Rgb { r: 255, g: 220, b: 50 }, Color::Reset)
        } else if w.fallen_traps.contains(&node) {
            ('X', Color::Rgb { r: 255, g: 120, b: 120 }, FALLEN_BG)
        } else if w.level.is_trap(node) {
            ('X', Color::Rgb { r: 255, g: 60, b: 60 }, Color::Reset)
        } else {
            ('.', Color::Grey, Color::Reset)
        }
    }

    fn compose_projectiles(&mut self, w: &WorldState) {
        for enemy in w.enemies.iter().filter(|e| e.alive) {
            for bullet in enemy.bullets.iter().filter(|b| b.active) {
                self.compose_bullet(bullet);
            }
        }
        for rock in w.rocks.iter().filter(|r| r.active) {
            self.put_cell(rock.x.round() as i32, rock.y.round() as i32, 'o', Color::Grey, Color::Reset);
        }
    }

    fn compose_bullet(&mut self, bullet: &Bullet) {
        let (ch, fg) = if bullet.reflected {
            ('^', Color::Rgb { r: 80, g: 255, b: 80 })
        } else {
            ('|', Color::Rgb { r: 255, g: 200, b: 60 })
        };
        self.put_cell(bullet.x.round() as i32, bullet.y.round() as i32, ch, fg, Color::Reset);
    }

    fn compose_footer(&mut self, w: &WorldState) {
        // Two band rows, the grid, the staging row, one gap.
        let msg_row = BAND_ROW + BAND_ROWS as usize + w.grid_size() + 2;
        if !w.message.is_empty() {
            let msg = format!(" {} ", w.message);
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(0, msg_row, &msg, Color::Black, MSG_BG);
        }

        let help = match w.phase {
            Phase::Memorizing => " SPACE: Start  ESC: Quit",
            Phase::Playing if w.player.aiming => " Move: Aim  SPACE: Throw  TAB/F: Cancel  V: Reflect",
            Phase::Playing => " WASD/Arrows QEZC: Move  TAB/F: Aim  V: Reflect  R: Back to start",
            Phase::Won => " ENTER: Next level  ESC: Quit",
            Phase::Lost => " R: Try again  ESC: Quit",
            Phase::GameComplete => " Thanks for playing!",
        };
        self.front.put_str(0, msg_row + 2, help, Color::DarkGrey, Color::Reset);
    }
}
