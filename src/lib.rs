//! skimly: a terminal Feedly reader.
//!
//! Read actions are recorded locally in a pending queue and pushed to Feedly
//! in a single batched `markers` call; see [`reader`].

pub mod config;
pub mod content;
pub mod feedly;
pub mod model;
pub mod reader;
pub mod util;
