//! # bazaar-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`HubSettings::default()`]
//! 2. **User file** — `~/.bazaar/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `BAZAAR_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = HubSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = HubSettings::default();
        assert_eq!(settings.server.port, 8787);
        assert_eq!(settings.supervisor.heartbeat_interval_secs, 30);
        assert_eq!(settings.supervisor.expiry_sweep_interval_secs, 300);
        assert_eq!(settings.supervisor.invoice_ttl_secs, 600);
        assert!(settings.ledger.balance_url.is_none());
        assert_eq!(settings.logging.level, "info");
        assert!(settings.validate().is_ok());
    }
}
