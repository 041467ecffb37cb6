mod api;
mod config;
mod constants;
mod diagnostics;
pub mod error;
mod host;
mod script;

pub use api::{InitializeOutcome, LoaderState, QueuedEvent, Umami};
pub use config::{EventData, LoaderSettings, TrackingObject, UmamiOptions};
pub use diagnostics::{probe_script_url, ProbeReport};
#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub use host::WebScriptHost;
pub use host::{
    default_host, InjectedScript, ScriptHost, ScriptLoadEvent, ScriptLoadReceiver, ScriptTarget,
    ServerScriptHost,
};
pub use script::{script_attributes, script_url, ScriptDescriptor};
