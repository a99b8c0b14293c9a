//! User ID submodule contract and resolution.
//!
//! Submodules live in the `integrations` module
//! (e.g. `crate::integrations::custom_data`).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::settings::Settings;

pub mod submodule;

pub use submodule::{IdContext, IdSubmodule};

/// Type alias for submodule builder functions.
type SubmoduleBuilder = fn(&Settings) -> Vec<Arc<dyn IdSubmodule>>;

fn submodule_builders() -> &'static [SubmoduleBuilder] {
    &[crate::integrations::custom_data::register_submodules]
}

/// Every enabled user ID submodule, in registration order.
#[must_use]
pub fn build_submodules(settings: &Settings) -> Vec<Arc<dyn IdSubmodule>> {
    let submodules: Vec<Arc<dyn IdSubmodule>> = submodule_builders()
        .iter()
        .flat_map(|builder| builder(settings))
        .collect();

    log::info!("Loaded {} user ID submodules", submodules.len());

    submodules
}

/// Run every submodule and merge their decoded IDs into one map.
///
/// Submodules that produce no ID, or an empty one, contribute nothing.
#[must_use]
pub fn resolve_user_ids(
    submodules: &[Arc<dyn IdSubmodule>],
    context: &IdContext<'_>,
) -> BTreeMap<String, JsonValue> {
    let mut ids = BTreeMap::new();

    for submodule in submodules {
        let Some(value) = submodule.get_id(context) else {
            log::debug!("User ID submodule '{}' produced no ID", submodule.name());
            continue;
        };
        if value.is_empty() {
            log::debug!("User ID submodule '{}' produced an empty ID", submodule.name());
            continue;
        }

        match submodule.decode(&value) {
            JsonValue::Object(decoded) => ids.extend(decoded),
            other => {
                ids.insert(submodule.name().to_string(), other);
            }
        }
    }

    ids
}
