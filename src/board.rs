use std::fmt;
use std::str::FromStr;

use bitvec::{prelude::*, slice::IterOnes};
use lazy_static::lazy_static;
use serde::de::{Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

pub const SIZE: usize = 6;
const CELLS: usize = SIZE * SIZE;
pub type BitBoard = BitArr!(for CELLS, in u8, Lsb0);

// Terrain range of each cell, row 0 = board row "1", col 0 = column "A".
// A piece standing on a cell must move exactly this many cells.
const TERRAIN: [[u8; SIZE]; SIZE] = [
    [1, 2, 2, 3, 1, 2],
    [3, 1, 3, 1, 3, 2],
    [2, 3, 1, 2, 1, 3],
    [2, 1, 3, 2, 3, 1],
    [1, 3, 1, 3, 1, 2],
    [3, 2, 2, 1, 3, 2],
];

// Probe order N, S, E, W; keeps move generation deterministic.
const DIRECTIONS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, 1), (0, -1)];

pub trait BitGrid {
    fn empty() -> Self;
    fn set_cell(&mut self, row: usize, col: usize, value: bool);
    type IterCells<'a>: Iterator<Item = (usize, usize)> + 'a
    where
        Self: 'a;
    fn iter_set_cells(&'_ self) -> Self::IterCells<'_>;
}

impl BitGrid for BitBoard {
    fn empty() -> Self {
        bitarr!(u8, Lsb0; 0; CELLS)
    }

    fn set_cell(&mut self, row: usize, col: usize, value: bool) {
        self.set(row * SIZE + col, value);
    }

    type IterCells<'a> = std::iter::Map<IterOnes<'a, u8, Lsb0>, fn(usize) -> (usize, usize)>;

    fn iter_set_cells(&'_ self) -> Self::IterCells<'_> {
        self.iter_ones().map(|idx| (idx / SIZE, idx % SIZE))
    }
}

lazy_static! {
    // Cells of each terrain range, used to filter generation sources when
    // the required-range constraint is active.
    static ref RANGE_MASKS: [BitBoard; 3] = {
        let mut masks = [BitBoard::empty(); 3];
        for row in 0..SIZE {
            for col in 0..SIZE {
                masks[(TERRAIN[row][col] - 1) as usize].set_cell(row, col, true);
            }
        }
        masks
    };
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("malformed move: {0}")]
    MalformedMove(String),
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("malformed board data: {0}")]
    MalformedBoardData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Light,
    Dark,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Light => Side::Dark,
            Side::Dark => Side::Light,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Light => write!(f, "light"),
            Side::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Side {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, GameError> {
        match s {
            "light" => Ok(Side::Light),
            "dark" => Ok(Side::Dark),
            other => Err(GameError::MalformedBoardData(format!(
                "unknown side: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Beacon,
    Guard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub side: Side,
    pub rank: Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(row: usize, col: usize) -> Self {
        debug_assert!(row < SIZE && col < SIZE);
        Pos { row, col }
    }

    fn index(self) -> usize {
        self.row * SIZE + self.col
    }

    /// Terrain range of this cell.
    pub fn range(self) -> u8 {
        TERRAIN[self.row][self.col]
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.col as u8) as char, self.row + 1)
    }
}

impl FromStr for Pos {
    type Err = GameError;

    // "C3" -> row 2, col 2
    fn from_str(s: &str) -> Result<Self, GameError> {
        let malformed = || GameError::MalformedMove(s.to_string());
        let mut chars = s.chars();
        let col_char = chars.next().ok_or_else(malformed)?;
        if !col_char.is_ascii_uppercase() {
            return Err(malformed());
        }
        let col = (col_char as u8 - b'A') as usize;
        let row: usize = chars.as_str().parse().map_err(|_| malformed())?;
        if col >= SIZE || row == 0 || row > SIZE {
            return Err(malformed());
        }
        Ok(Pos::new(row - 1, col))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Move {
    Pass,
    Placement([Pos; 6]),
    Step { from: Pos, to: Pos },
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Move::Pass => write!(f, "E"),
            Move::Placement(cells) => {
                for (i, cell) in cells.iter().enumerate() {
                    if i > 0 {
                        write!(f, "/")?;
                    }
                    write!(f, "{}", cell)?;
                }
                Ok(())
            }
            Move::Step { from, to } => write!(f, "{}-{}", from, to),
        }
    }
}

impl FromStr for Move {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, GameError> {
        if s == "E" {
            return Ok(Move::Pass);
        }
        if s.contains('/') {
            let cells = s
                .split('/')
                .map(str::parse)
                .collect::<Result<Vec<Pos>, _>>()?;
            let cells: [Pos; 6] = cells
                .try_into()
                .map_err(|_| GameError::MalformedMove(s.to_string()))?;
            return Ok(Move::Placement(cells));
        }
        if let Some((from, to)) = s.split_once('-') {
            return Ok(Move::Step {
                from: from.parse()?,
                to: to.parse()?,
            });
        }
        Err(GameError::MalformedMove(s.to_string()))
    }
}

// Moves travel the wire in their string form ("E", "A1-B2", "C1/A3/...").
impl Serialize for Move {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

struct MoveVisitor;
impl<'de> Visitor<'de> for MoveVisitor {
    type Value = Move;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a move string")
    }

    fn visit_str<E>(self, value: &str) -> Result<Move, E>
    where
        E: serde::de::Error,
    {
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Move {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(MoveVisitor)
    }
}

const PLACEMENTS_TO_PLAY: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    light: BitBoard,
    dark: BitBoard,
    beacons: BitBoard,
    to_move: Side,
    last_dest: Option<Pos>,
    placed: u8,
}

impl Board {
    pub fn new() -> Self {
        Self {
            light: BitBoard::empty(),
            dark: BitBoard::empty(),
            beacons: BitBoard::empty(),
            to_move: Side::Light,
            last_dest: None,
            placed: 0,
        }
    }

    pub fn side_to_move(&self) -> Side {
        self.to_move
    }

    pub fn last_destination(&self) -> Option<Pos> {
        self.last_dest
    }

    pub fn is_opening(&self) -> bool {
        self.placed < PLACEMENTS_TO_PLAY
    }

    fn side_cells(&self, side: Side) -> BitBoard {
        match side {
            Side::Light => self.light,
            Side::Dark => self.dark,
        }
    }

    fn side_cells_mut(&mut self, side: Side) -> &mut BitBoard {
        match side {
            Side::Light => &mut self.light,
            Side::Dark => &mut self.dark,
        }
    }

    pub fn occupant(&self, pos: Pos) -> Option<Piece> {
        let idx = pos.index();
        let side = if self.light[idx] {
            Side::Light
        } else if self.dark[idx] {
            Side::Dark
        } else {
            return None;
        };
        let rank = if self.beacons[idx] {
            Rank::Beacon
        } else {
            Rank::Guard
        };
        Some(Piece { side, rank })
    }

    pub fn piece_count(&self, side: Side) -> usize {
        self.side_cells(side).count_ones()
    }

    pub fn is_terminal(&self) -> bool {
        (self.beacons & self.light).not_any() || (self.beacons & self.dark).not_any()
    }

    /// Meaningful only once `is_terminal()` holds.
    pub fn winner(&self) -> Option<Side> {
        if !self.is_terminal() {
            return None;
        }
        if (self.beacons & self.light).any() {
            Some(Side::Light)
        } else if (self.beacons & self.dark).any() {
            Some(Side::Dark)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> Board {
        *self
    }

    /// Restores every field to the snapshot. Sibling branches of the search
    /// rely on this being bit-exact.
    pub fn restore(&mut self, snapshot: &Board) {
        *self = *snapshot;
    }

    /// Pure legality predicate. Side-to-move is only enforced for placements;
    /// step legality is a property of the position alone.
    pub fn is_legal(&self, mv: &Move, side: Side) -> bool {
        match mv {
            Move::Pass => matches!(self.generate_moves(side).as_slice(), [Move::Pass]),
            Move::Placement(cells) => self.placement_legal(cells, side),
            Move::Step { from, to } => self.step_legal(*from, *to, side),
        }
    }

    fn placement_legal(&self, cells: &[Pos; 6], side: Side) -> bool {
        if !self.is_opening() || side != self.to_move {
            return false;
        }
        for (i, cell) in cells.iter().enumerate() {
            if self.occupant(*cell).is_some() || cells[..i].contains(cell) {
                return false;
            }
        }
        true
    }

    fn step_legal(&self, from: Pos, to: Pos, side: Side) -> bool {
        if self.is_opening() || self.is_terminal() {
            return false;
        }
        let piece = match self.occupant(from) {
            Some(piece) if piece.side == side => piece,
            _ => return false,
        };

        // Required-range constraint: the moved piece must stand on terrain
        // matching the opponent's last landing cell.
        if let Some(dest) = self.last_dest {
            if from.range() != dest.range() {
                return false;
            }
        }

        // One orthogonal axis, exact terrain distance.
        let dr = to.row as isize - from.row as isize;
        let dc = to.col as isize - from.col as isize;
        if dr != 0 && dc != 0 {
            return false;
        }
        let dist = dr.abs() + dc.abs();
        if dist != from.range() as isize {
            return false;
        }

        // No jumping: every cell strictly between from and to must be empty.
        let (step_r, step_c) = (dr.signum(), dc.signum());
        let (mut row, mut col) = (from.row as isize, from.col as isize);
        for _ in 1..dist {
            row += step_r;
            col += step_c;
            if self.occupant(Pos::new(row as usize, col as usize)).is_some() {
                return false;
            }
        }

        // Only a Guard may capture, and only an enemy Beacon may be captured.
        if let Some(target) = self.occupant(to) {
            if piece.rank != Rank::Guard || target.rank != Rank::Beacon || target.side == side {
                return false;
            }
        }
        true
    }

    /// All legal step moves for `side`, row-major over sources then N,S,E,W.
    /// Yields the singleton `[Pass]` when no step move exists.
    pub fn generate_moves(&self, side: Side) -> Vec<Move> {
        let mut moves = Vec::new();
        let sources = match self.last_dest {
            Some(dest) => self.side_cells(side) & RANGE_MASKS[(dest.range() - 1) as usize],
            None => self.side_cells(side),
        };
        for (row, col) in sources.iter_set_cells() {
            let from = Pos::new(row, col);
            let range = from.range() as isize;
            for (dr, dc) in DIRECTIONS {
                let to_row = row as isize + dr * range;
                let to_col = col as isize + dc * range;
                if to_row < 0 || to_row >= SIZE as isize || to_col < 0 || to_col >= SIZE as isize {
                    continue;
                }
                let mv = Move::Step {
                    from,
                    to: Pos::new(to_row as usize, to_col as usize),
                };
                if self.is_legal(&mv, side) {
                    moves.push(mv);
                }
            }
        }
        if moves.is_empty() {
            moves.push(Move::Pass);
        }
        moves
    }

    /// Validates `mv` against the oracle, then applies it. The board is left
    /// untouched when the move is rejected.
    pub fn play(&mut self, mv: &Move, side: Side) -> Result<(), GameError> {
        if !self.is_legal(mv, side) {
            return Err(GameError::IllegalMove(mv.to_string()));
        }
        match mv {
            Move::Pass => {
                self.last_dest = None;
            }
            Move::Placement(cells) => self.apply_placement(cells, side),
            Move::Step { from, to } => self.apply_step(*from, *to, side),
        }
        self.to_move = side.opponent();
        Ok(())
    }

    fn apply_placement(&mut self, cells: &[Pos; 6], side: Side) {
        for (i, cell) in cells.iter().enumerate() {
            self.side_cells_mut(side).set(cell.index(), true);
            if i == 0 {
                self.beacons.set(cell.index(), true);
            }
        }
        self.placed += 1;
        self.last_dest = None;
    }

    fn apply_step(&mut self, from: Pos, to: Pos, side: Side) {
        let from_idx = from.index();
        let to_idx = to.index();
        let moving_beacon = self.beacons[from_idx];
        if self.occupant(to).is_some() {
            // Legality guarantees this is an enemy Beacon.
            self.side_cells_mut(side.opponent()).set(to_idx, false);
            self.beacons.set(to_idx, false);
        }
        self.side_cells_mut(side).set(from_idx, false);
        self.beacons.set(from_idx, false);
        self.side_cells_mut(side).set(to_idx, true);
        if moving_beacon {
            self.beacons.set(to_idx, true);
        }
        self.last_dest = Some(to);
    }

    /// Decodes the line-oriented board format: `%`-comment and blank lines
    /// are skipped, then six rows of `NN SSSSSS NN`. Either the whole board
    /// decodes or nothing is installed.
    pub fn from_text(text: &str) -> Result<Board, GameError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('%'))
            .collect();
        if rows.len() != SIZE {
            return Err(GameError::MalformedBoardData(format!(
                "expected {} board rows, found {}",
                SIZE,
                rows.len()
            )));
        }

        let mut board = Board::new();
        for (row, line) in rows.iter().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [left, cells, right] = fields.as_slice() else {
                return Err(GameError::MalformedBoardData(format!(
                    "bad row line: {}",
                    line
                )));
            };
            if left.parse::<usize>().is_err()
                || right.parse::<usize>().is_err()
                || cells.len() != SIZE
            {
                return Err(GameError::MalformedBoardData(format!(
                    "bad row line: {}",
                    line
                )));
            }
            for (col, symbol) in cells.chars().enumerate() {
                let piece = match symbol {
                    'B' => Some((Side::Light, true)),
                    'b' => Some((Side::Light, false)),
                    'N' => Some((Side::Dark, true)),
                    'n' => Some((Side::Dark, false)),
                    '-' => None,
                    other => {
                        return Err(GameError::MalformedBoardData(format!(
                            "unknown symbol: {}",
                            other
                        )));
                    }
                };
                if let Some((side, is_beacon)) = piece {
                    board.side_cells_mut(side).set_cell(row, col, true);
                    if is_beacon {
                        board.beacons.set_cell(row, col, true);
                    }
                }
            }
        }

        for side in [Side::Light, Side::Dark] {
            if (board.beacons & board.side_cells(side)).count_ones() > 1 {
                return Err(GameError::MalformedBoardData(format!(
                    "more than one {} beacon",
                    side
                )));
            }
        }

        // A loaded position with pieces on it is past the opening.
        if (board.light | board.dark).any() {
            board.placed = PLACEMENTS_TO_PLAY;
        }
        Ok(board)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::from("% ABCDEF\n");
        for row in 0..SIZE {
            out.push_str(&format!("{:02} ", row + 1));
            for col in 0..SIZE {
                let symbol = match self.occupant(Pos::new(row, col)) {
                    Some(Piece {
                        side: Side::Light,
                        rank: Rank::Beacon,
                    }) => 'B',
                    Some(Piece {
                        side: Side::Light,
                        rank: Rank::Guard,
                    }) => 'b',
                    Some(Piece {
                        side: Side::Dark,
                        rank: Rank::Beacon,
                    }) => 'N',
                    Some(Piece {
                        side: Side::Dark,
                        rank: Rank::Guard,
                    }) => 'n',
                    None => '-',
                };
                out.push(symbol);
            }
            out.push_str(&format!(" {:02}\n", row + 1));
        }
        out.push_str("% ABCDEF\n");
        out
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
