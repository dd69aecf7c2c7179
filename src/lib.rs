pub mod cli;
pub mod collect;
pub mod config;
pub mod remote;
pub mod search;
