pub mod agent;
pub mod board;
pub mod engine;

pub use agent::Agent;
pub use board::{Board, GameError, Move, Piece, Pos, Rank, Side};
pub use engine::Engine;
