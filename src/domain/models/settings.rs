//! Typed settings keys. The underlying store is a flat string key/value
//! map (`domain::ports::settings_store::SettingsStore`); this module is
//! where the `wake.*`/`user.*` keys get names and defaults.

pub const WAKE_ENABLED: &str = "wake.enabled";
pub const WAKE_BASELINE_TIME: &str = "wake.baseline_time";
pub const WAKE_LEAD_MINUTES: &str = "wake.lead_minutes";
pub const WAKE_ONLY_WHEN_EVENTS: &str = "wake.only_when_events";
pub const WAKE_SKIP_WEEKENDS: &str = "wake.skip_weekends";
pub const WAKE_SERVER_URL: &str = "wake.server_url";
pub const USER_ID: &str = "user.id";
pub const USER_TIMEZONE: &str = "user.timezone";
