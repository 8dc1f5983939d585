//! Board model - grid, fleet placement, attack resolution

use rand::Rng;

use super::GameError;

/// Board side length (the game is always played on a 10x10 grid)
pub const BOARD_SIZE: usize = 10;

/// Fleet composition, largest ship first (20 occupied cells total)
pub const FLEET_SIZES: [usize; 10] = [4, 3, 3, 2, 2, 2, 1, 1, 1, 1];

/// State of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Ship,
    Hit,
    Miss,
}

impl CellState {
    /// Integer encoding used on the wire
    pub fn as_wire(self) -> u8 {
        match self {
            CellState::Empty => 0,
            CellState::Ship => 1,
            CellState::Hit => 2,
            CellState::Miss => 3,
        }
    }
}

/// Grid coordinate, 0-indexed, x = column, y = row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

/// Ship placement orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A placed ship: its occupied cells in placement order and a hit counter
#[derive(Debug, Clone)]
pub struct Ship {
    pub points: Vec<Point>,
    pub orientation: Orientation,
    pub hits: usize,
}

impl Ship {
    pub fn size(&self) -> usize {
        self.points.len()
    }

    pub fn is_sunk(&self) -> bool {
        self.hits == self.size()
    }

    pub fn occupies(&self, x: usize, y: usize) -> bool {
        self.points.iter().any(|p| p.x == x && p.y == y)
    }
}

/// Outcome of a resolved attack on a previously untouched cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    /// A ship cell was struck; carries the index of the owning ship
    Hit(usize),
    Miss,
}

/// One player's 10x10 board and fleet
///
/// Cells are indexed `cells[y][x]`. The board owns its ships exclusively;
/// invariant: no two ships occupy or touch each other, including diagonally.
#[derive(Debug, Clone)]
pub struct Board {
    cells: [[CellState; BOARD_SIZE]; BOARD_SIZE],
    ships: Vec<Ship>,
}

impl Board {
    /// Create an empty board with no fleet
    pub fn new() -> Self {
        Self {
            cells: [[CellState::Empty; BOARD_SIZE]; BOARD_SIZE],
            ships: Vec::with_capacity(FLEET_SIZES.len()),
        }
    }

    pub fn cells(&self) -> &[[CellState; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn cell(&self, x: usize, y: usize) -> CellState {
        self.cells[y][x]
    }

    /// Place the full fleet at random positions.
    ///
    /// Each ship is retried until a legal position is sampled. With 20
    /// occupied cells out of 100 this converges quickly; a board where it
    /// could not would be a broken fleet configuration, not a runtime state.
    pub fn place_fleet<R: Rng>(&mut self, rng: &mut R) {
        for &size in FLEET_SIZES.iter() {
            loop {
                let x = rng.gen_range(0..BOARD_SIZE);
                let y = rng.gen_range(0..BOARD_SIZE);
                let orientation = if rng.gen_bool(0.5) {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };

                if self.can_place(x, y, size, orientation) {
                    self.place_ship(x, y, size, orientation);
                    break;
                }
            }
        }
    }

    /// Check whether a ship of `size` fits at (x, y) without touching
    /// any existing ship. The scan covers a 1-cell-padded bounding
    /// rectangle around the run, which enforces the no-touch rule for
    /// diagonal neighbors as well.
    fn can_place(&self, x: usize, y: usize, size: usize, orientation: Orientation) -> bool {
        let (run_w, run_h) = match orientation {
            Orientation::Horizontal => (size, 1),
            Orientation::Vertical => (1, size),
        };

        if x + run_w > BOARD_SIZE || y + run_h > BOARD_SIZE {
            return false;
        }

        let x0 = x.saturating_sub(1);
        let y0 = y.saturating_sub(1);
        let x1 = (x + run_w).min(BOARD_SIZE - 1);
        let y1 = (y + run_h).min(BOARD_SIZE - 1);

        for cy in y0..=y1 {
            for cx in x0..=x1 {
                if self.cells[cy][cx] == CellState::Ship {
                    return false;
                }
            }
        }

        true
    }

    fn place_ship(&mut self, x: usize, y: usize, size: usize, orientation: Orientation) {
        let mut points = Vec::with_capacity(size);
        for i in 0..size {
            let (cx, cy) = match orientation {
                Orientation::Horizontal => (x + i, y),
                Orientation::Vertical => (x, y + i),
            };
            self.cells[cy][cx] = CellState::Ship;
            points.push(Point { x: cx, y: cy });
        }

        self.ships.push(Ship {
            points,
            orientation,
            hits: 0,
        });
    }

    /// Resolve an attack against this board.
    ///
    /// Out-of-range coordinates and repeat attacks on an already resolved
    /// cell are rejected without mutating any state.
    pub fn resolve_attack(&mut self, x: i32, y: i32) -> Result<AttackOutcome, GameError> {
        if x < 0 || y < 0 || x >= BOARD_SIZE as i32 || y >= BOARD_SIZE as i32 {
            return Err(GameError::OutOfBounds);
        }
        let (x, y) = (x as usize, y as usize);

        match self.cell(x, y) {
            CellState::Ship => {
                self.cells[y][x] = CellState::Hit;
                let index = self
                    .ships
                    .iter()
                    .position(|s| s.occupies(x, y))
                    .unwrap_or_else(|| unreachable!("ship cell without owning ship"));
                self.ships[index].hits += 1;
                Ok(AttackOutcome::Hit(index))
            }
            CellState::Empty => {
                self.cells[y][x] = CellState::Miss;
                Ok(AttackOutcome::Miss)
            }
            CellState::Hit | CellState::Miss => Err(GameError::CellAlreadyResolved),
        }
    }

    /// After a hit at (x, y): the owning ship's index, if it is now sunk
    pub fn find_sunk_ship(&self, x: usize, y: usize) -> Option<usize> {
        self.ships
            .iter()
            .position(|s| s.occupies(x, y) && s.is_sunk())
    }

    /// Reveal the 1-cell halo around a sunk ship as Miss.
    ///
    /// Only Empty cells change; Hit cells (the ship itself) stay Hit. The
    /// adjacency invariant guarantees the halo holds no other ship's cells.
    pub fn ring_out_sunk_ship(&mut self, ship_index: usize) {
        let ship = &self.ships[ship_index];
        let origin = ship.points[0];
        let (run_w, run_h) = match ship.orientation {
            Orientation::Horizontal => (ship.size(), 1),
            Orientation::Vertical => (1, ship.size()),
        };

        let x0 = origin.x.saturating_sub(1);
        let y0 = origin.y.saturating_sub(1);
        let x1 = (origin.x + run_w).min(BOARD_SIZE - 1);
        let y1 = (origin.y + run_h).min(BOARD_SIZE - 1);

        for cy in y0..=y1 {
            for cx in x0..=x1 {
                if self.cells[cy][cx] == CellState::Empty {
                    self.cells[cy][cx] = CellState::Miss;
                }
            }
        }
    }

    /// True when every ship on this board is sunk
    pub fn is_defeated(&self) -> bool {
        !self.ships.is_empty() && self.ships.iter().all(Ship::is_sunk)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
