use std::time::Duration;

/// Script served by Umami Cloud, used when no `host_url` is configured.
pub(crate) const DEFAULT_SCRIPT_URL: &str = "https://analytics.umami.is/script.js";
pub(crate) const SCRIPT_PATH: &str = "script.js";

pub(crate) const LOGGER_NAME: &str = "@umami/analytics";

/// Global installed by the tracker script once it has executed.
pub(crate) const TRACKER_GLOBAL: &str = "umami";
pub(crate) const TRACK_FUNCTION: &str = "track";

pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub(crate) const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 50;

pub(crate) const ATTR_WEBSITE_ID: &str = "data-website-id";
pub(crate) const ATTR_HOST_URL: &str = "data-host-url";
pub(crate) const ATTR_AUTO_TRACK: &str = "data-auto-track";
pub(crate) const ATTR_DOMAINS: &str = "data-domains";
pub(crate) const ATTR_TAG: &str = "data-tag";
