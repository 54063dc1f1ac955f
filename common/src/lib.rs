// Common library for shared code across registrar, runner, and entrypoint

pub mod bootstrap;
pub mod config;
pub mod entrypoint;
pub mod errors;
pub mod registrar;
pub mod runner;
pub mod schedule;
