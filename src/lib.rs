#![forbid(unsafe_code)]

pub mod backfill;
pub mod cli;
pub mod commands;
pub mod config;
pub mod fields;
pub mod formats;
pub mod ids;
pub mod locate;
pub mod logging;
pub mod mutate;
pub mod outline;
pub mod render;
pub mod request;
pub mod store;
pub mod validate;

pub use formats::{Node, NodeId, NodeKind, Notebook};
pub use mutate::{MutationError, Mutator, Op, Outcome, apply};
pub use render::render;
