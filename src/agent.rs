use log::info;

use crate::board::{Board, GameError, Move, Side};
use crate::engine::Engine;

// Fixed opening placements, Beacon first.
pub const LIGHT_OPENING: &str = "C1/A3/C2/C5/F1/F4";
pub const DARK_OPENING: &str = "C6/A6/B5/D5/E6/F5";

/// One player: a private board mirroring the match state, an opening-done
/// flag, and the search engine for mid-game decisions.
pub struct Agent {
    side: Side,
    board: Board,
    engine: Engine,
    opening_done: bool,
}

impl Agent {
    pub fn new(side: Side, depth: u32) -> Self {
        Self {
            side,
            board: Board::new(),
            engine: Engine::new(depth),
            opening_done: false,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Chooses, applies, and emits this side's next move: the fixed opening
    /// placement on the first turn, a searched move afterwards.
    pub fn choose_move(&mut self) -> Result<String, GameError> {
        if !self.opening_done {
            self.opening_done = true;
            let text = match self.side {
                Side::Light => LIGHT_OPENING,
                Side::Dark => DARK_OPENING,
            };
            let mv: Move = text.parse()?;
            self.board.play(&mv, self.side)?;
            return Ok(text.to_string());
        }
        let mv = self.engine.best_move(&mut self.board, self.side);
        self.board.play(&mv, self.side)?;
        Ok(mv.to_string())
    }

    /// Applies an opponent move string to the private board. The legacy
    /// "PASSE" sentinel is accepted as a pass.
    pub fn notify_opponent_move(&mut self, text: &str) -> Result<(), GameError> {
        let mv: Move = if text == "PASSE" {
            Move::Pass
        } else {
            text.parse()?
        };
        self.board.play(&mv, self.side.opponent())
    }

    pub fn declare_winner(&self, winner: Side) {
        if winner == self.side {
            info!("{} wins: that's us", winner);
        } else {
            info!("{} wins", winner);
        }
    }
}
