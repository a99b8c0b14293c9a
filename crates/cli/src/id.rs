//! User ID commands.

use std::collections::BTreeMap;

use amx_adapter_common::settings::Settings;
use amx_adapter_common::userid::{build_submodules, resolve_user_ids, IdContext};
use serde_json::Value as JsonValue;

use crate::bid::print_json;
use crate::error::CliError;

/// Resolve every enabled submodule against an optional `Cookie` header.
pub(crate) fn resolve(settings: &Settings, cookie: Option<&str>) -> BTreeMap<String, JsonValue> {
    let submodules = build_submodules(settings);
    if submodules.is_empty() {
        log::warn!("No user ID submodules are enabled");
    }

    let context = cookie.map(IdContext::with_cookies).unwrap_or_default();
    resolve_user_ids(&submodules, &context)
}

pub fn get(settings: &Settings, cookie: Option<&str>) -> Result<(), CliError> {
    print_json(&resolve(settings, cookie))
}
