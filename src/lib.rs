//! Movement and turn-resolution engine for a construction-project board
//! game driven by CSV rule tables.

pub mod board;
pub mod engine;
