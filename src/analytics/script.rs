//! Pure description of the tracker `<script>` element.
//!
//! Everything here is computed from [`UmamiOptions`] without touching a DOM so the exact markup can
//! be checked on any target. Hosts turn a [`ScriptDescriptor`] into a real element.

use url::Url;

use crate::analytics::config::UmamiOptions;
use crate::analytics::constants::{
    ATTR_AUTO_TRACK, ATTR_DOMAINS, ATTR_HOST_URL, ATTR_TAG, ATTR_WEBSITE_ID, DEFAULT_SCRIPT_URL,
    SCRIPT_PATH,
};
use crate::analytics::error::{invalid_configuration, AnalyticsResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptDescriptor {
    src: String,
    async_load: bool,
    defer: bool,
    attributes: Vec<(String, String)>,
}

impl ScriptDescriptor {
    /// Validates the options and builds the descriptor for the tracker script.
    pub fn from_options(options: &UmamiOptions) -> AnalyticsResult<Self> {
        options.validate()?;
        let src = script_url(options.host_url.as_deref())?;
        Ok(Self {
            src,
            async_load: true,
            defer: true,
            attributes: script_attributes(options),
        })
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn is_async(&self) -> bool {
        self.async_load
    }

    pub fn is_defer(&self) -> bool {
        self.defer
    }

    /// `data-*` attributes in the order they are set on the element.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Resolves the script URL for an optional host.
///
/// `https://stats.example.com`, `https://stats.example.com/` and
/// `https://stats.example.com/script.js` all resolve to `https://stats.example.com/script.js`.
/// Hosts that are not HTTPS are rejected.
pub fn script_url(host_url: Option<&str>) -> AnalyticsResult<String> {
    let Some(host) = non_blank(host_url) else {
        return Ok(DEFAULT_SCRIPT_URL.to_string());
    };

    let parsed = Url::parse(host)
        .map_err(|err| invalid_configuration(format!("hostUrl `{host}` is not a valid URL: {err}")))?;
    if parsed.scheme() != "https" {
        return Err(invalid_configuration(format!(
            "hostUrl must use HTTPS protocol, got `{host}`"
        )));
    }

    Ok(format!("{}/{SCRIPT_PATH}", host_base(host)))
}

/// Maps options to the ordered `data-*` attributes of the script element.
///
/// Optional attributes are only emitted when the corresponding option carries a value:
/// `data-auto-track` only when auto tracking is off, `data-domains` only for a non-empty list.
pub fn script_attributes(options: &UmamiOptions) -> Vec<(String, String)> {
    let mut attributes = vec![(
        ATTR_WEBSITE_ID.to_string(),
        options.website_id.trim().to_string(),
    )];

    if let Some(host) = non_blank(options.host_url.as_deref()) {
        attributes.push((ATTR_HOST_URL.to_string(), host_base(host)));
    }

    if !options.auto_track {
        attributes.push((ATTR_AUTO_TRACK.to_string(), "false".to_string()));
    }

    let domains: Vec<&str> = options
        .domains
        .iter()
        .map(|domain| domain.trim())
        .filter(|domain| !domain.is_empty())
        .collect();
    if !domains.is_empty() {
        attributes.push((ATTR_DOMAINS.to_string(), domains.join(",")));
    }

    if let Some(tag) = non_blank(options.tag.as_deref()) {
        attributes.push((ATTR_TAG.to_string(), tag.to_string()));
    }

    attributes
}

/// The collection endpoint the tracker reports to: the host without the script path.
fn host_base(host: &str) -> String {
    let host = host.trim_end_matches('/');
    let suffix = format!("/{SCRIPT_PATH}");
    host.strip_suffix(&suffix)
        .unwrap_or(host)
        .trim_end_matches('/')
        .to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
