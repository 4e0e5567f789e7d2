#![allow(clippy::collapsible_if)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod language;
