//! Runtime environment detection and defaults discovery.

use std::env;
use std::fs;

use serde_json::{Map, Value};

const DEFAULTS_VAR: &str = "__UMAMI_DEFAULTS__";
const DEFAULTS_PATH_VAR: &str = "__UMAMI_DEFAULTS_PATH";
const FORCE_ENV_VAR: &str = "UMAMI_ENV_FORCE";
const DEBUG_VARS: [&str; 2] = ["UMAMI_DEBUG", "NEXT_PUBLIC_UMAMI_DEBUG"];

/// Returns the `__UMAMI_DEFAULTS__` object from the environment, a file, or the page global.
pub fn default_options_json() -> Option<Map<String, Value>> {
    umami_defaults().and_then(|value| match value {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

fn umami_defaults() -> Option<Value> {
    defaults_from_env()
        .or_else(defaults_from_path)
        .or_else(defaults_from_global)
}

fn defaults_from_env() -> Option<Value> {
    let raw = env::var(DEFAULTS_VAR).ok()?;
    parse_json_value(&raw)
}

fn defaults_from_path() -> Option<Value> {
    let path = env::var(DEFAULTS_PATH_VAR).ok()?;
    match fs::read_to_string(&path) {
        Ok(content) => parse_json_value(&content),
        Err(err) => {
            log::debug!("failed to read Umami defaults from {path}: {err}");
            None
        }
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
fn defaults_from_global() -> Option<Value> {
    use wasm_bindgen::JsValue;

    let value = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str(DEFAULTS_VAR)).ok()?;
    if value.is_null() || value.is_undefined() {
        return None;
    }
    let serialized = js_sys::JSON::stringify(&value).ok()?.as_string()?;
    parse_json_value(&serialized)
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
fn defaults_from_global() -> Option<Value> {
    None
}

fn parse_json_value(raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            log::debug!("ignoring malformed Umami defaults: {err}");
            None
        }
    }
}

fn force_environment() -> Option<String> {
    umami_defaults()
        .and_then(|defaults| defaults.get("forceEnvironment").cloned())
        .or_else(|| env::var(FORCE_ENV_VAR).ok().map(Value::String))
        .and_then(|value| match value {
            Value::String(text) => Some(text.to_lowercase()),
            _ => None,
        })
}

/// Returns `true` if the runtime should behave as a browser page with a document.
pub fn is_browser() -> bool {
    if let Some(forced) = force_environment() {
        return forced == "browser";
    }

    #[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
    {
        use wasm_bindgen::JsCast;
        js_sys::global()
            .dyn_into::<web_sys::Window>()
            .map(|window| window.document().is_some())
            .unwrap_or(false)
    }

    #[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
    {
        false
    }
}

/// Debug logging requested through `UMAMI_DEBUG`/`NEXT_PUBLIC_UMAMI_DEBUG` or `window.UMAMI_DEBUG`.
pub fn debug_enabled() -> bool {
    DEBUG_VARS
        .iter()
        .filter_map(|name| env::var(name).ok())
        .any(|value| is_truthy(&value))
        || debug_global()
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
fn debug_global() -> bool {
    use wasm_bindgen::JsValue;

    js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("UMAMI_DEBUG"))
        .ok()
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
fn debug_global() -> bool {
    false
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
