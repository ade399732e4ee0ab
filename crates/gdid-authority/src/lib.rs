#![doc = include_str!("../README.md")]

mod authority;
mod config;
mod engine;
pub mod store;

pub use crate::authority::*;
pub use crate::config::*;
pub use crate::engine::*;
// Public re-export so downstream crates can access `gdid` via
// `gdid_authority::gdid`
pub use gdid;
