//! Partition posed RGB-D frames into bounded reconstruction blocks and fuse
//! each block into its own dense reconstruction.
//!
//! `block-categorize` projects sampled depth pixels into the world, files each
//! frame under every block it observes ([`categorize`], [`block_store`]).
//! `block-reconstruct` then streams each block's frames through a background
//! fusion worker and writes one artifact per block ([`orchestrator`],
//! [`fusion`]).

pub mod block_key;
pub mod block_store;
pub mod camera;
pub mod categorize;
pub mod data_loader;
pub mod error;
pub mod fusion;
pub mod io;
pub mod orchestrator;
pub mod ply;
pub mod projection;
pub mod settings;
pub mod types;

pub use block_key::BlockKey;
pub use error::{Error, Result};
pub use settings::Settings;
