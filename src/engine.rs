use log::warn;
use rand::Rng;

use crate::board::{Board, Move, Side};

pub const DEFAULT_DEPTH: u32 = 4;

// Material is weighted well below mobility.
const MATERIAL_WEIGHT: f64 = 0.1;

/// Fixed-depth minimax with alpha-beta pruning. The board is mutated in
/// place down the recursion and restored from a snapshot before each sibling
/// move, so every branch starts from an identical position.
pub struct Engine {
    depth: u32,
}

impl Engine {
    pub fn new(depth: u32) -> Self {
        Self { depth }
    }

    /// Mobility difference plus a small material bonus, from `side`'s view.
    pub fn evaluate(&self, board: &Board, side: Side) -> f64 {
        let opponent = side.opponent();
        let mobility = board.generate_moves(side).len() as f64
            - board.generate_moves(opponent).len() as f64;
        let material = board.piece_count(side) as f64 - board.piece_count(opponent) as f64;
        mobility + MATERIAL_WEIGHT * material
    }

    /// Best root move for `side`. Each candidate is scored with a fresh
    /// full window; ties keep the first maximum in generation order. If no
    /// candidate can be scored the initial random pick survives.
    pub fn best_move(&self, board: &mut Board, side: Side) -> Move {
        let moves = board.generate_moves(side);
        if let [Move::Pass] = moves.as_slice() {
            return Move::Pass;
        }

        let mut rng = rand::rng();
        let mut best = moves[rng.random_range(0..moves.len())].clone();
        let mut best_score = f64::NEG_INFINITY;
        let snapshot = board.snapshot();

        for mv in &moves {
            if let Err(e) = board.play(mv, side) {
                warn!("generated move rejected at root: {}", e);
                board.restore(&snapshot);
                continue;
            }
            let score = self.minimax_value(
                board,
                self.depth.saturating_sub(1),
                false,
                f64::NEG_INFINITY,
                f64::INFINITY,
                side,
            );
            board.restore(&snapshot);
            if score > best_score {
                best_score = score;
                best = mv.clone();
            }
        }
        best
    }

    fn minimax_value(
        &self,
        board: &mut Board,
        depth: u32,
        maximizing: bool,
        mut alpha: f64,
        mut beta: f64,
        me: Side,
    ) -> f64 {
        if depth == 0 || board.is_terminal() || self.double_pass(board, me) {
            return self.evaluate(board, me);
        }

        let mover = if maximizing { me } else { me.opponent() };
        let moves = board.generate_moves(mover);
        let snapshot = board.snapshot();
        let mut best = if maximizing {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };

        for mv in &moves {
            if let Err(e) = board.play(mv, mover) {
                warn!("generated move rejected in search: {}", e);
                board.restore(&snapshot);
                continue;
            }
            let value = self.minimax_value(board, depth - 1, !maximizing, alpha, beta, me);
            board.restore(&snapshot);
            if maximizing {
                best = best.max(value);
                alpha = alpha.max(value);
            } else {
                best = best.min(value);
                beta = beta.min(value);
            }
            if beta <= alpha {
                break;
            }
        }
        best
    }

    // Neither side has a step move: stalemate, treated as terminal.
    fn double_pass(&self, board: &Board, me: Side) -> bool {
        matches!(board.generate_moves(me).as_slice(), [Move::Pass])
            && matches!(board.generate_moves(me.opponent()).as_slice(), [Move::Pass])
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}
