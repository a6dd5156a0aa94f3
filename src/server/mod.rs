//! A stub upstream node, serving the identity query over the pool's channel protocol. Used by
//! the `upstream` binary for local runs and by the tests as a controllable remote.
mod server;

pub use server::*;
