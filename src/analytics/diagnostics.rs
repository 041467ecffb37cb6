//! Follow-up request issued after the tracker script fails to load.
//!
//! The script element only reports a bare `error` event, so a HEAD request against the same URL is
//! used to find out whether the endpoint answered at all and with which status. The result is only
//! logged; it never changes the loader state.

#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use reqwest::Client;

use crate::analytics::error::{network_error, AnalyticsResult};
use crate::logger::Logger;

#[cfg(not(target_arch = "wasm32"))]
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ProbeReport {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends `HEAD url` and collects the status and response headers.
pub async fn probe_script_url(url: &str) -> AnalyticsResult<ProbeReport> {
    let request = Client::new().head(url);
    #[cfg(not(target_arch = "wasm32"))]
    let request = request.timeout(PROBE_TIMEOUT);

    let response = request
        .send()
        .await
        .map_err(|err| network_error(format!("HEAD {url} failed: {err}")))?;

    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<non-ascii value>").to_string(),
            )
        })
        .collect();

    Ok(ProbeReport {
        status: response.status().as_u16(),
        headers,
    })
}

pub(crate) async fn report_load_failure(logger: &Logger, url: &str) {
    match probe_script_url(url).await {
        Ok(report) if !report.is_success() => {
            logger.error(format!(
                "Failed to load Umami script. Response status: {}",
                report.status
            ));
        }
        Ok(report) => {
            logger.info(format!(
                "Umami script URL answered with {}; response headers:",
                report.status
            ));
            for (name, value) in report.headers {
                logger.info(format!("{name}: {value}"));
            }
        }
        Err(err) => {
            logger.error(format!(
                "Failed to load Umami script. No response received: {err}"
            ));
        }
    }
}
