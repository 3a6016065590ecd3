pub mod artifacts;
pub mod color;
pub mod config;
pub mod consts;
pub mod error;
pub mod filters;
pub mod grid;
pub mod levels;
pub mod merge;
pub mod progress;
