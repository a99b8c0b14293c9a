//! Shared library for the AMX bid adapter and the `customData` user ID
//! submodule.
//!
//! The host (an auction runtime or the `amxcli` tool) drives adapters through
//! the [`bidder::BidAdapter`] contract and ID submodules through
//! [`userid::IdSubmodule`]. Both are discovered from [`settings::Settings`].
//!
//! # Modules
//!
//! - [`bidder`]: Bid adapter contract, host types and adapter registry
//! - [`constants`]: Application-wide constants
//! - [`cookies`]: Cookie header lookups
//! - [`creative`]: Tracking pixel injection into display and VAST creatives
//! - [`error`]: Error types and error handling utilities
//! - [`integrations`]: The AMX adapter and the customData submodule
//! - [`logging`]: Logger installation
//! - [`pixel`]: Fire-and-forget tracking pixel transport
//! - [`query`]: Query string formatting
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities and fixtures
//! - [`userid`]: User ID submodule contract and resolution

pub mod bidder;
pub mod constants;
pub mod cookies;
pub mod creative;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod pixel;
pub mod query;
pub mod settings;
pub mod userid;
