use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analytics::constants::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use crate::analytics::error::{invalid_configuration, AnalyticsResult};
use crate::platform::environment;

/// Custom payload attached to a tracked event.
pub type EventData = Map<String, Value>;

/// Event name and data merged into every tracked event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingObject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
}

impl TrackingObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = Some(data);
        self
    }
}

/// Options describing the tracker script to inject.
///
/// Field names follow the tracker's own camelCase naming when (de)serialized, so a JSON object such
/// as `{"websiteId": "...", "hostUrl": "https://stats.example.com"}` maps directly onto this type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmamiOptions {
    /// Website ID from the Umami dashboard.
    #[serde(default)]
    pub website_id: String,
    /// Base URL of a self-hosted instance. Must use HTTPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_url: Option<String>,
    /// Automatic page view tracking. Enabled unless explicitly turned off.
    #[serde(default = "default_auto_track")]
    pub auto_track: bool,
    /// Hostnames the tracker is allowed to run on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    /// Tag used to group events in the dashboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Lowers the analytics logger to debug level.
    #[serde(default)]
    pub debug: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_tracking: Option<TrackingObject>,
    /// Turns initialization and tracking into no-ops.
    #[serde(default)]
    pub disabled: bool,
}

fn default_auto_track() -> bool {
    true
}

impl UmamiOptions {
    pub fn new(website_id: impl Into<String>) -> Self {
        Self {
            website_id: website_id.into(),
            host_url: None,
            auto_track: true,
            domains: Vec::new(),
            tag: None,
            debug: false,
            default_tracking: None,
            disabled: false,
        }
    }

    pub fn with_host_url(mut self, host_url: impl Into<String>) -> Self {
        self.host_url = Some(host_url.into());
        self
    }

    pub fn with_auto_track(mut self, auto_track: bool) -> Self {
        self.auto_track = auto_track;
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_default_tracking(mut self, tracking: TrackingObject) -> Self {
        self.default_tracking = Some(tracking);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Parses options from a JSON object using the camelCase field names.
    pub fn from_json(raw: &str) -> AnalyticsResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| invalid_configuration(format!("failed to parse Umami options: {err}")))
    }

    /// Loads options from the `__UMAMI_DEFAULTS__` sources, if any are present.
    pub fn from_defaults() -> AnalyticsResult<Option<Self>> {
        let Some(defaults) = environment::default_options_json() else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(defaults))
            .map(Some)
            .map_err(|err| invalid_configuration(format!("invalid Umami defaults: {err}")))
    }

    /// Checks the fields that do not depend on URL parsing.
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.website_id.trim().is_empty() {
            return Err(invalid_configuration("websiteId is required"));
        }
        Ok(())
    }
}

/// Timing knobs for the readiness poll that runs after the script loads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderSettings {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Issue a HEAD request against the script URL when the script fails to load.
    pub probe_on_error: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            probe_on_error: true,
        }
    }
}

impl LoaderSettings {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    pub fn with_probe_on_error(mut self, probe: bool) -> Self {
        self.probe_on_error = probe;
        self
    }
}
