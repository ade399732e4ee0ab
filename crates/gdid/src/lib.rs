#![doc = include_str!("../README.md")]

mod block;
mod endpoint;
mod error;
mod generator;
mod id;
mod key;
mod record;

pub use crate::block::*;
pub use crate::endpoint::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::key::*;
pub use crate::record::*;
