//! Trait definition for user ID submodules.

use serde_json::Value as JsonValue;

/// Request-scoped inputs a submodule may read an identifier from.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdContext<'a> {
    /// Raw `Cookie` header of the page request.
    pub cookie_header: Option<&'a str>,
}

impl<'a> IdContext<'a> {
    #[must_use]
    pub fn with_cookies(cookie_header: &'a str) -> Self {
        Self {
            cookie_header: Some(cookie_header),
        }
    }
}

/// Trait implemented by user ID submodules.
pub trait IdSubmodule: Send + Sync {
    /// Name linking the submodule to its configuration and to the decoded key.
    fn name(&self) -> &'static str;

    /// Turn a stored raw value into the object forwarded on bid requests.
    fn decode(&self, value: &str) -> JsonValue;

    /// Derive the identifier.
    ///
    /// `None` means the submodule cannot produce an ID at all (for example
    /// when misconfigured); `Some("")` means it ran but found nothing.
    fn get_id(&self, context: &IdContext<'_>) -> Option<String>;
}
