/// Environment variable prefix for settings overrides (`AMX_ADAPTER__SECTION__KEY`).
pub const ENV_PREFIX: &str = "AMX_ADAPTER";
pub const ENV_SEPARATOR: &str = "__";

/// Currency reported on every normalized bid.
pub const DEFAULT_CURRENCY: &str = "USD";

/// User agent sent with tracking pixel requests.
pub const PIXEL_USER_AGENT: &str = concat!("amx-adapter/", env!("CARGO_PKG_VERSION"));
