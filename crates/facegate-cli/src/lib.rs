pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod feedback;
pub mod output;
pub mod runtime;
