//! Length-delimited bincode framing over plain TCP, used by every session to an upstream.
mod asymmetric;

pub use asymmetric::*;
