//! # passthru common library
//!
//! Shared code for the passthru crates:
//! - Output routing types (encodings, devices, formats)
//! - Event types and the EventBus
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{
    Encoding, EventBus, OutputDevice, OutputFormat, PassthroughEvent, PhysicalOutput,
};
