//! Concrete integrations.
//!
//! Each integration reads its own `[integrations.<id>]` table and exposes a
//! `register_*` builder that `bidder` or `userid` calls at startup.

pub mod amx;
pub mod custom_data;
