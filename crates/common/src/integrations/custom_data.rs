//! `customData` user ID submodule.
//!
//! Forwards an opaque publisher value as a user ID. The value is read from
//! a named first-party cookie or, when no cookie is configured, taken
//! verbatim from configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use validator::Validate;

use crate::cookies::first_cookie_value;
use crate::settings::{IntegrationConfig, Settings};
use crate::userid::{IdContext, IdSubmodule};

const CUSTOM_DATA_INTEGRATION_ID: &str = "custom_data";
const CUSTOM_DATA_SUBMODULE_NAME: &str = "customData";

/// Configuration for the customData submodule.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct CustomDataConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Cookie to read the ID from. Takes precedence over `data`.
    #[serde(default)]
    pub cookie_name: Option<String>,

    /// Static ID used when no cookie name is configured.
    #[serde(default)]
    pub data: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl IntegrationConfig for CustomDataConfig {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

pub struct CustomDataSubmodule {
    config: Option<CustomDataConfig>,
}

impl CustomDataSubmodule {
    #[must_use]
    pub fn new(config: Option<CustomDataConfig>) -> Self {
        Self { config }
    }

    /// URI-decoded value of the named cookie, if present.
    fn data_from_cookie(cookie_header: Option<&str>, cookie_name: &str) -> Option<String> {
        let raw = first_cookie_value(cookie_header?, cookie_name)?;
        match urlencoding::decode(&raw) {
            Ok(decoded) => Some(decoded.into_owned()),
            Err(e) => {
                log::debug!("customData: cookie '{cookie_name}' is not valid UTF-8 once decoded: {e}");
                None
            }
        }
    }
}

impl IdSubmodule for CustomDataSubmodule {
    fn name(&self) -> &'static str {
        CUSTOM_DATA_SUBMODULE_NAME
    }

    fn decode(&self, value: &str) -> JsonValue {
        json!({ CUSTOM_DATA_SUBMODULE_NAME: value })
    }

    fn get_id(&self, context: &IdContext<'_>) -> Option<String> {
        let config = match &self.config {
            Some(config) if config.cookie_name.is_some() || config.data.is_some() => config,
            _ => {
                log::error!(
                    "User ID - customData submodule requires either data or cookie name to be defined"
                );
                return None;
            }
        };

        let data = match (config.cookie_name.as_deref(), config.data.as_deref()) {
            (Some(cookie_name), _) if !cookie_name.is_empty() => {
                Self::data_from_cookie(context.cookie_header, cookie_name)
            }
            (_, Some(data)) if !data.is_empty() => Some(data.to_string()),
            _ => None,
        };

        Some(data.unwrap_or_default())
    }
}

/// Register the customData submodule when its integration table is enabled.
#[must_use]
pub fn register_submodules(settings: &Settings) -> Vec<Arc<dyn IdSubmodule>> {
    match settings.integration_config::<CustomDataConfig>(CUSTOM_DATA_INTEGRATION_ID) {
        Ok(Some(config)) => {
            log::info!(
                "Registering customData submodule (cookie: {:?}, static data: {})",
                config.cookie_name,
                config.data.is_some()
            );
            vec![Arc::new(CustomDataSubmodule::new(Some(config)))]
        }
        Ok(None) => {
            log::debug!("customData integration not configured or disabled");
            Vec::new()
        }
        Err(e) => {
            log::error!("Failed to load customData configuration: {:?}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submodule(cookie_name: Option<&str>, data: Option<&str>) -> CustomDataSubmodule {
        CustomDataSubmodule::new(Some(CustomDataConfig {
            enabled: true,
            cookie_name: cookie_name.map(str::to_string),
            data: data.map(str::to_string),
        }))
    }

    #[test]
    fn decode_wraps_value() {
        let module = CustomDataSubmodule::new(None);
        assert_eq!(module.name(), "customData");
        assert_eq!(module.decode("abc"), json!({ "customData": "abc" }));
    }

    #[test]
    fn get_id_without_config_is_none() {
        let module = CustomDataSubmodule::new(None);
        assert_eq!(module.get_id(&IdContext::default()), None);
    }

    #[test]
    fn get_id_without_cookie_name_or_data_is_none() {
        let module = submodule(None, None);
        assert_eq!(module.get_id(&IdContext::with_cookies("a=1")), None);
    }

    #[test]
    fn get_id_reads_and_decodes_cookie() {
        let module = submodule(Some("pub_data"), None);
        let id = module.get_id(&IdContext::with_cookies("x=1; pub_data=a%20b%26c; y=2"));
        assert_eq!(id, Some("a b&c".to_string()));
    }

    #[test]
    fn get_id_uses_first_matching_cookie() {
        let module = submodule(Some("pub_data"), None);
        let id = module.get_id(&IdContext::with_cookies("pub_data=first; pub_data=second"));
        assert_eq!(id, Some("first".to_string()));
    }

    #[test]
    fn get_id_missing_cookie_is_empty() {
        let module = submodule(Some("pub_data"), None);
        assert_eq!(
            module.get_id(&IdContext::with_cookies("other=1")),
            Some(String::new())
        );
        assert_eq!(module.get_id(&IdContext::default()), Some(String::new()));
    }

    #[test]
    fn get_id_cookie_name_wins_over_data() {
        let module = submodule(Some("pub_data"), Some("static"));
        assert_eq!(
            module.get_id(&IdContext::with_cookies("other=1")),
            Some(String::new())
        );
    }

    #[test]
    fn get_id_falls_back_to_static_data() {
        let module = submodule(None, Some("static-id"));
        assert_eq!(
            module.get_id(&IdContext::with_cookies("pub_data=ignored")),
            Some("static-id".to_string())
        );

        let module = submodule(Some(""), Some("static-id"));
        assert_eq!(
            module.get_id(&IdContext::default()),
            Some("static-id".to_string())
        );
    }

    #[test]
    fn get_id_empty_values_yield_empty_id() {
        assert_eq!(
            submodule(Some(""), None).get_id(&IdContext::default()),
            Some(String::new())
        );
        assert_eq!(
            submodule(None, Some("")).get_id(&IdContext::default()),
            Some(String::new())
        );
    }

    #[test]
    fn get_id_swallows_undecodable_cookie() {
        let module = submodule(Some("pub_data"), None);
        assert_eq!(
            module.get_id(&IdContext::with_cookies("pub_data=%FF%FE")),
            Some(String::new())
        );
    }

    #[test]
    fn register_reads_settings() {
        let settings = crate::test_support::tests::create_test_settings();
        let submodules = register_submodules(&settings);
        assert_eq!(submodules.len(), 1);

        let settings = Settings::from_toml("").unwrap();
        assert!(register_submodules(&settings).is_empty());
    }
}
