//! An interactive symbol shell: a single surface syntax (`$texts`,
//! `&routines`, `#tables`, `%runners`, `*.trg` events) dispatched through a
//! token-expansion pipeline onto a small set of `sys.*` primitives.

pub mod addressing;
pub mod alias;
pub mod bridges;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod expand;
pub mod help;
pub mod primitives;
pub mod runner;
pub mod stores;

pub use context::Context;
pub use error::{ShellError, ShellResult};
