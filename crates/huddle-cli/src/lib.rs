//! Library half of the `huddle` binary: configuration file and terminal
//! rendering.

#![warn(missing_docs)]

pub mod config;
pub mod display;
