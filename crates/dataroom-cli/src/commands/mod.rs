//! CLI command handlers

pub mod ask;
pub mod chat;
pub mod eval;
pub mod rebuild;
pub mod status;
