//! # gatehouse-core
//!
//! Domain types, configuration persistence, and shared errors.
//!
//! - [`types`]: the record model and identity key newtype
//! - [`config`]: `~/.gatehouse/config.yaml` load / save / init
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, TokenIdentity};
pub use error::ConfigError;
pub use types::{
    AccessRecord, EmailKey, Profile, RecordPatch, VerifiedIdentity, WriteOp, DEFAULT_MEMBER_NAME,
};
