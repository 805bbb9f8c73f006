pub mod archive;
pub mod commands;
pub mod config;
pub mod error;
pub mod gate;
pub mod handoff;
pub mod install;
pub mod manifest;
pub mod materialize;
pub mod naming;
pub mod permissions;
pub mod provider;
pub mod runtime;
