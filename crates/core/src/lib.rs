//! Domain types and pure text-processing logic for the folding job service.
//!
//! Nothing in this crate touches the filesystem, spawns processes, or talks
//! to the network, so everything here can be tested in isolation.

pub mod error;
pub mod hardware;
pub mod job;
pub mod output;
pub mod types;
