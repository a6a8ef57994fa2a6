//! # passthru policy library
//!
//! Decides which digital output (HDMI or optical) carries compressed Dolby
//! audio, applies that decision to the audio backend as a key-value string,
//! persists it, and publishes a "passthrough available" flag.
//!
//! **Architecture:**
//! - `capability`: capability report and descriptor parsing
//! - `assignment`: pure construction of backend key-value strings
//! - `backend` / `settings`: collaborator traits and their implementations
//! - `policy`: the stateful negotiation policy
//! - `command` / `config`: daemon transport and configuration

pub mod assignment;
pub mod backend;
pub mod capability;
pub mod command;
pub mod config;
pub mod error;
pub mod policy;
pub mod settings;

pub use error::{Error, Result};
pub use policy::{PassthroughPolicy, PolicyState};
