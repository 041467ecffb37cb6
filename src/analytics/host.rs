use std::fmt;
use std::sync::{Arc, LazyLock};

use futures::channel::oneshot;

use crate::analytics::config::EventData;
use crate::analytics::error::{dispatch_error, script_injection, AnalyticsResult};
use crate::analytics::script::ScriptDescriptor;
use crate::platform::environment;

/// Where the script element ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptTarget {
    Head,
    Body,
}

impl fmt::Display for ScriptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptTarget::Head => f.write_str("head"),
            ScriptTarget::Body => f.write_str("body"),
        }
    }
}

/// Outcome reported by the element's `onload`/`onerror` handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptLoadEvent {
    Loaded,
    Failed { detail: String },
}

pub type ScriptLoadReceiver = oneshot::Receiver<ScriptLoadEvent>;

/// A script element attached to the document, plus the channel its load handlers report on.
#[derive(Debug)]
pub struct InjectedScript {
    pub target: ScriptTarget,
    pub load: ScriptLoadReceiver,
}

/// Access to the page the tracker runs in.
///
/// Browser builds use the DOM; everything else (server rendering, native tests) sees a host
/// without a document.
pub trait ScriptHost: Send + Sync {
    /// Whether a document is available to inject into.
    fn has_document(&self) -> bool;

    /// Creates the script element from `descriptor` and appends it to the head, or to the body
    /// when there is no head.
    fn inject(&self, descriptor: &ScriptDescriptor) -> AnalyticsResult<InjectedScript>;

    /// Whether the tracker global exposes a callable `track` function.
    fn tracker_available(&self) -> bool;

    /// Calls `umami.track(name, data)`.
    fn send_event(&self, name: &str, data: Option<&EventData>) -> AnalyticsResult<()>;
}

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
static DEFAULT_HOST: LazyLock<Arc<dyn ScriptHost>> = LazyLock::new(|| {
    if environment::is_browser() {
        Arc::new(web::WebScriptHost) as Arc<dyn ScriptHost>
    } else {
        Arc::new(ServerScriptHost) as Arc<dyn ScriptHost>
    }
});

#[cfg(not(all(feature = "wasm-web", target_arch = "wasm32")))]
static DEFAULT_HOST: LazyLock<Arc<dyn ScriptHost>> = LazyLock::new(|| {
    if environment::is_browser() {
        log::debug!("browser environment forced on a target without DOM bindings");
    }
    Arc::new(ServerScriptHost) as Arc<dyn ScriptHost>
});

/// Host matching the current target: the DOM in browser builds, [`ServerScriptHost`] otherwise.
pub fn default_host() -> Arc<dyn ScriptHost> {
    DEFAULT_HOST.clone()
}

/// Host for environments without a document, such as server-side rendering.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerScriptHost;

impl ScriptHost for ServerScriptHost {
    fn has_document(&self) -> bool {
        false
    }

    fn inject(&self, _descriptor: &ScriptDescriptor) -> AnalyticsResult<InjectedScript> {
        Err(script_injection("no document available to inject the script into"))
    }

    fn tracker_available(&self) -> bool {
        false
    }

    fn send_event(&self, _name: &str, _data: Option<&EventData>) -> AnalyticsResult<()> {
        Err(dispatch_error("the tracker is not available outside a browser"))
    }
}

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
pub use web::WebScriptHost;

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures::channel::oneshot;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;

    use super::*;
    use crate::analytics::constants::{TRACKER_GLOBAL, TRACK_FUNCTION};

    /// DOM-backed host.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct WebScriptHost;

    impl ScriptHost for WebScriptHost {
        fn has_document(&self) -> bool {
            web_sys::window().and_then(|win| win.document()).is_some()
        }

        fn inject(&self, descriptor: &ScriptDescriptor) -> AnalyticsResult<InjectedScript> {
            let document = web_sys::window()
                .and_then(|win| win.document())
                .ok_or_else(|| script_injection("Document not available"))?;

            let script = document
                .create_element("script")
                .map_err(|err| script_injection(format!("Failed to create script: {err:?}")))?
                .dyn_into::<web_sys::HtmlScriptElement>()
                .map_err(|_| script_injection("Script element has wrong type"))?;
            script.set_async(descriptor.is_async());
            script.set_defer(descriptor.is_defer());
            for (name, value) in descriptor.attributes() {
                script.set_attribute(name, value).map_err(|err| {
                    script_injection(format!("Failed to set `{name}` attribute: {err:?}"))
                })?;
            }
            script.set_src(descriptor.src());

            let (sender, receiver) = oneshot::channel::<ScriptLoadEvent>();
            let sender = Rc::new(RefCell::new(Some(sender)));

            let load_sender = sender.clone();
            let onload = Closure::wrap(Box::new(move || {
                if let Some(tx) = load_sender.borrow_mut().take() {
                    let _ = tx.send(ScriptLoadEvent::Loaded);
                }
            }) as Box<dyn FnMut()>);

            let error_sender = sender.clone();
            let onerror = Closure::wrap(Box::new(move |event: web_sys::Event| {
                if let Some(tx) = error_sender.borrow_mut().take() {
                    let detail = format!(
                        "{} event (trusted: {}, phase: {})",
                        event.type_(),
                        event.is_trusted(),
                        event.event_phase()
                    );
                    let _ = tx.send(ScriptLoadEvent::Failed { detail });
                }
            }) as Box<dyn FnMut(web_sys::Event)>);

            script.set_onload(Some(onload.as_ref().unchecked_ref()));
            script.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            onload.forget();
            onerror.forget();

            let target = if let Some(head) = document.head() {
                head.append_child(&script).map_err(|err| {
                    script_injection(format!("Failed to append script to <head>: {err:?}"))
                })?;
                ScriptTarget::Head
            } else if let Some(body) = document.body() {
                body.append_child(&script).map_err(|err| {
                    script_injection(format!("Failed to append script to <body>: {err:?}"))
                })?;
                ScriptTarget::Body
            } else {
                return Err(script_injection("No <head> or <body> element found"));
            };

            Ok(InjectedScript {
                target,
                load: receiver,
            })
        }

        fn tracker_available(&self) -> bool {
            track_function().is_some()
        }

        fn send_event(&self, name: &str, data: Option<&EventData>) -> AnalyticsResult<()> {
            let (tracker, track) = track_function()
                .ok_or_else(|| dispatch_error("window.umami.track is not available"))?;

            let name = JsValue::from_str(name);
            let result = match data {
                Some(data) => {
                    let json = serde_json::to_string(data).map_err(|err| {
                        dispatch_error(format!("Failed to serialize event data: {err}"))
                    })?;
                    let value = js_sys::JSON::parse(&json).map_err(|err| {
                        dispatch_error(format!("Failed to convert event data: {err:?}"))
                    })?;
                    track.call2(&tracker, &name, &value)
                }
                None => track.call1(&tracker, &name),
            };
            result
                .map(|_| ())
                .map_err(|err| dispatch_error(format!("umami.track() threw: {}", js_error_message(err))))
        }
    }

    fn track_function() -> Option<(JsValue, js_sys::Function)> {
        let global = js_sys::global();
        let tracker = js_sys::Reflect::get(&global, &JsValue::from_str(TRACKER_GLOBAL)).ok()?;
        if tracker.is_null() || tracker.is_undefined() {
            return None;
        }
        let track = js_sys::Reflect::get(&tracker, &JsValue::from_str(TRACK_FUNCTION)).ok()?;
        let track = track.dyn_into::<js_sys::Function>().ok()?;
        Some((tracker, track))
    }

    fn js_error_message(value: JsValue) -> String {
        if let Some(error) = value.dyn_ref::<js_sys::Error>() {
            String::from(error.message())
        } else if let Some(string) = value.as_string() {
            string
        } else {
            format!("{value:?}")
        }
    }
}
