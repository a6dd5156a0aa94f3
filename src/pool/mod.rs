//! The upstream pool: dials every configured node, checks that they all serve one chain, and
//! keeps them connected for its whole lifetime.
mod config;
mod pool;
mod retry;
mod selector;

pub use config::*;
pub use pool::*;
pub use selector::*;
