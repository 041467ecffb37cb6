use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;

use crate::analytics::config::{EventData, LoaderSettings, TrackingObject, UmamiOptions};
use crate::analytics::constants::LOGGER_NAME;
use crate::analytics::diagnostics;
use crate::analytics::error::{script_load_failed, script_load_timeout, AnalyticsResult};
use crate::analytics::host::{
    default_host, ScriptHost, ScriptLoadEvent, ScriptLoadReceiver, ScriptTarget,
};
use crate::analytics::script::ScriptDescriptor;
use crate::logger::{log_arg, LogLevel, Logger};
use crate::platform::{environment, runtime};

/// Lifecycle of the tracker script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderState {
    Uninitialized,
    /// Script injected, waiting for `window.umami`.
    Initializing,
    /// Events are forwarded directly. Also reached when the wait times out.
    Ready,
    /// The script element could not be attached; `initialize` may be called again.
    Failed,
}

/// What a call to [`Umami::initialize`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitializeOutcome {
    Injected { target: ScriptTarget },
    SkippedServerSide,
    Disabled,
    AlreadyInitialized,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueuedEvent {
    pub name: String,
    pub data: Option<EventData>,
}

/// Loads the Umami tracker into the page and forwards custom events to it.
///
/// Construct one per page at the application's composition root and hand out clones; clones share
/// the same state. Events tracked while the script is still loading are queued and flushed in
/// submission order once `window.umami` appears.
///
/// ```no_run
/// use serde_json::json;
/// use umami_rs_sdk::analytics::{Umami, UmamiOptions};
///
/// let umami = Umami::new();
/// umami
///     .initialize(UmamiOptions::new("94db1cb1-74f4-4a40-ad6c-962362670409"))
///     .expect("valid options");
/// umami.track("signup", json!({"plan": "pro"}).as_object().cloned());
/// ```
#[derive(Clone)]
pub struct Umami {
    inner: Arc<UmamiInner>,
}

impl fmt::Debug for Umami {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Umami")
            .field("state", &self.state())
            .field("queued", &self.inner.session.lock().unwrap().queue.len())
            .finish()
    }
}

impl Default for Umami {
    fn default() -> Self {
        Self::new()
    }
}

struct UmamiInner {
    host: Arc<dyn ScriptHost>,
    settings: LoaderSettings,
    logger: Logger,
    session: Mutex<Session>,
}

struct Session {
    state: LoaderState,
    options: Option<UmamiOptions>,
    queue: VecDeque<QueuedEvent>,
    ready_waiters: Vec<oneshot::Sender<()>>,
}

impl Umami {
    /// Creates an instance bound to the current target's host: the DOM in browser builds, a
    /// document-less host everywhere else.
    pub fn new() -> Self {
        Self::with_host(default_host(), LoaderSettings::default())
    }

    /// Same as [`Umami::new`] with custom polling and diagnostics settings.
    pub fn with_settings(settings: LoaderSettings) -> Self {
        Self::with_host(default_host(), settings)
    }

    pub fn with_host(host: Arc<dyn ScriptHost>, settings: LoaderSettings) -> Self {
        let logger = Logger::new(LOGGER_NAME);
        let level = if environment::debug_enabled() {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        };
        let _ = logger.set_log_level(level);

        Self {
            inner: Arc::new(UmamiInner {
                host,
                settings,
                logger,
                session: Mutex::new(Session {
                    state: LoaderState::Uninitialized,
                    options: None,
                    queue: VecDeque::new(),
                    ready_waiters: Vec::new(),
                }),
            }),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.inner.settings
    }

    pub fn state(&self) -> LoaderState {
        self.inner.session.lock().unwrap().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LoaderState::Ready
    }

    fn is_initialized(&self) -> bool {
        is_active(self.state())
    }

    /// Options accepted by the last successful or disabled `initialize` call.
    pub fn options(&self) -> Option<UmamiOptions> {
        self.inner.session.lock().unwrap().options.clone()
    }

    /// Events waiting for the tracker, oldest first.
    pub fn queued_events(&self) -> Vec<QueuedEvent> {
        self.inner
            .session
            .lock()
            .unwrap()
            .queue
            .iter()
            .cloned()
            .collect()
    }

    /// Injects the tracker script described by `options`.
    ///
    /// Invalid options are logged and returned as an `analytics/invalid-configuration` error.
    /// Without a document (server rendering) nothing happens. A second call while the script is
    /// loading or loaded only logs a warning.
    pub fn initialize(&self, options: UmamiOptions) -> AnalyticsResult<InitializeOutcome> {
        let logger = &self.inner.logger;
        logger.debug_with([
            log_arg("initialize called with options:"),
            log_arg(serde_json::to_value(&options).ok()),
        ]);

        if self.is_initialized() {
            logger.warn("Umami already initialized");
            return Ok(InitializeOutcome::AlreadyInitialized);
        }

        if options.disabled {
            let mut session = self.inner.session.lock().unwrap();
            if is_active(session.state) {
                drop(session);
                logger.warn("Umami already initialized");
                return Ok(InitializeOutcome::AlreadyInitialized);
            }
            session.options = Some(options);
            drop(session);
            logger.debug("Umami is disabled; skipping initialization");
            return Ok(InitializeOutcome::Disabled);
        }

        let descriptor = match ScriptDescriptor::from_options(&options) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                logger.error(format!("Failed to initialize: {err}"));
                return Err(err);
            }
        };

        if !self.inner.host.has_document() {
            logger.debug("Skipping initialization: no document available (server-side rendering)");
            return Ok(InitializeOutcome::SkippedServerSide);
        }

        let mut session = self.inner.session.lock().unwrap();
        if is_active(session.state) {
            drop(session);
            logger.warn("Umami already initialized");
            return Ok(InitializeOutcome::AlreadyInitialized);
        }

        let injected = match self.inner.host.inject(&descriptor) {
            Ok(injected) => injected,
            Err(err) => {
                session.state = LoaderState::Failed;
                drop(session);
                logger.error(format!("Failed to inject the Umami script: {err}"));
                return Err(err);
            }
        };
        let debug = options.debug;
        session.state = LoaderState::Initializing;
        session.options = Some(options);
        drop(session);

        if debug {
            let _ = logger.set_log_level(LogLevel::Debug);
        }

        logger.debug_with([
            log_arg(format!("Script appended to {}:", injected.target)),
            log_arg(descriptor.src()),
        ]);

        let umami = self.clone();
        let script_url = descriptor.src().to_string();
        runtime::spawn_detached(async move {
            umami.await_script(injected.load, script_url).await;
        });

        Ok(InitializeOutcome::Injected {
            target: injected.target,
        })
    }

    /// Tracks a custom event.
    ///
    /// Before `initialize` the call only logs a warning. While the script loads the event is
    /// queued; once ready it is forwarded immediately, merged with the configured default
    /// tracking data. Failures are logged and never returned.
    pub fn track(&self, event_name: &str, data: Option<EventData>) {
        let logger = &self.inner.logger;
        let mut session = self.inner.session.lock().unwrap();

        let disabled = session
            .options
            .as_ref()
            .is_some_and(|options| options.disabled);
        if disabled {
            drop(session);
            logger.debug(format!("Umami is disabled; dropping event `{event_name}`"));
            return;
        }

        if matches!(
            session.state,
            LoaderState::Uninitialized | LoaderState::Failed
        ) {
            drop(session);
            logger.warn("Please call initialize() first");
            return;
        }

        let default_tracking = session
            .options
            .as_ref()
            .and_then(|options| options.default_tracking.clone());
        let Some(name) = resolve_event_name(event_name, default_tracking.as_ref()) else {
            drop(session);
            logger.error("Event name must not be empty");
            return;
        };

        if session.state == LoaderState::Initializing {
            session.queue.push_back(QueuedEvent { name, data });
            let queued = session.queue.len();
            drop(session);
            logger.debug(format!(
                "Script still loading; event queued ({queued} events in queue)"
            ));
            return;
        }
        drop(session);

        self.forward(QueuedEvent { name, data }, default_tracking.as_ref());
    }

    /// Resolves once the instance is ready. Never resolves for an instance that is not
    /// initialized.
    pub async fn when_ready(&self) {
        let receiver = {
            let mut session = self.inner.session.lock().unwrap();
            if session.state == LoaderState::Ready {
                return;
            }
            let (sender, receiver) = oneshot::channel();
            session.ready_waiters.push(sender);
            receiver
        };
        let _ = receiver.await;
    }

    async fn await_script(self, load: ScriptLoadReceiver, script_url: String) {
        let logger = &self.inner.logger;
        match load.await {
            Ok(ScriptLoadEvent::Loaded) => {
                logger.debug("Script onload triggered");
                self.wait_for_tracker().await;
                self.mark_ready();
            }
            Ok(ScriptLoadEvent::Failed { detail }) => {
                let err = script_load_failed(format!("failed to load {script_url}: {detail}"));
                logger.error(format!("Failed to load script: {err}"));
                if self.inner.settings.probe_on_error {
                    diagnostics::report_load_failure(logger, &script_url).await;
                }
            }
            Err(_) => {
                logger.debug("Script load handlers were dropped before firing");
            }
        }
    }

    /// Polls for the tracker global. Returns `false` once the attempt budget is spent.
    async fn wait_for_tracker(&self) -> bool {
        let settings = &self.inner.settings;
        let max_attempts = settings.max_poll_attempts.max(1);
        let mut attempts = 0;
        loop {
            if self.inner.host.tracker_available() {
                self.inner.logger.debug(format!(
                    "Umami object found after {} attempt(s)",
                    attempts + 1
                ));
                return true;
            }
            attempts += 1;
            if attempts >= max_attempts {
                let err = script_load_timeout(format!(
                    "window.umami not found after {attempts} attempts"
                ));
                self.inner
                    .logger
                    .warn(format!("Timeout waiting for Umami script to load: {err}"));
                return false;
            }
            runtime::sleep(settings.poll_interval).await;
        }
    }

    /// Flushes the queue and switches to `Ready`. Events queued while a batch is being forwarded
    /// are picked up by the next pass; the state only changes once the queue is empty.
    fn mark_ready(&self) {
        loop {
            let (batch, default_tracking) = {
                let mut session = self.inner.session.lock().unwrap();
                if session.queue.is_empty() {
                    session.state = LoaderState::Ready;
                    let waiters = std::mem::take(&mut session.ready_waiters);
                    drop(session);
                    for waiter in waiters {
                        let _ = waiter.send(());
                    }
                    return;
                }
                let default_tracking = session
                    .options
                    .as_ref()
                    .and_then(|options| options.default_tracking.clone());
                (std::mem::take(&mut session.queue), default_tracking)
            };

            self.inner
                .logger
                .debug(format!("Processing queue with {} events", batch.len()));
            for event in batch {
                self.forward(event, default_tracking.as_ref());
            }
        }
    }

    fn forward(&self, event: QueuedEvent, default_tracking: Option<&TrackingObject>) {
        let logger = &self.inner.logger;
        if !self.inner.host.tracker_available() {
            logger.warn(format!(
                "Skipping event `{}`: window.umami.track is not available",
                event.name
            ));
            return;
        }

        let data = merge_event_data(default_tracking, event.data);
        match self.inner.host.send_event(&event.name, data.as_ref()) {
            Ok(()) => logger.debug(format!("Tracked event `{}`", event.name)),
            Err(err) => logger.error(format!("Failed to track event `{}`: {err}", event.name)),
        }
    }
}

/// States in which the script is already on the page.
fn is_active(state: LoaderState) -> bool {
    matches!(state, LoaderState::Initializing | LoaderState::Ready)
}

fn resolve_event_name(event_name: &str, default_tracking: Option<&TrackingObject>) -> Option<String> {
    if !event_name.trim().is_empty() {
        return Some(event_name.to_string());
    }
    default_tracking
        .map(|tracking| tracking.name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Shallow merge of the default tracking data with the event's own data; event fields win.
fn merge_event_data(
    default_tracking: Option<&TrackingObject>,
    data: Option<EventData>,
) -> Option<EventData> {
    let Some(defaults) = default_tracking.and_then(|tracking| tracking.data.as_ref()) else {
        return data;
    };
    let mut merged = defaults.clone();
    if let Some(data) = data {
        merged.extend(data);
    }
    Some(merged)
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::analytics::error::script_injection;
    use crate::analytics::host::InjectedScript;
    use crate::logger::{capture_logs, LOG_LEVEL_GUARD};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHost {
        server: bool,
        reject_injection: AtomicBool,
        tracker: AtomicBool,
        scripts: Mutex<Vec<ScriptDescriptor>>,
        load_senders: Mutex<Vec<oneshot::Sender<ScriptLoadEvent>>>,
        sent: Mutex<Vec<(String, Option<EventData>)>>,
        on_first_send: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl RecordingHost {
        fn browser() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn server() -> Arc<Self> {
            Arc::new(Self {
                server: true,
                ..Default::default()
            })
        }

        fn install_tracker(&self) {
            self.tracker.store(true, Ordering::SeqCst);
        }

        fn fire(&self, event: ScriptLoadEvent) {
            let sender = self.load_senders.lock().unwrap().remove(0);
            sender.send(event).unwrap();
        }

        fn scripts(&self) -> Vec<ScriptDescriptor> {
            self.scripts.lock().unwrap().clone()
        }

        fn sent(&self) -> Vec<(String, Option<EventData>)> {
            self.sent.lock().unwrap().clone()
        }

        fn sent_names(&self) -> Vec<String> {
            self.sent().into_iter().map(|(name, _)| name).collect()
        }
    }

    impl ScriptHost for RecordingHost {
        fn has_document(&self) -> bool {
            !self.server
        }

        fn inject(&self, descriptor: &ScriptDescriptor) -> AnalyticsResult<InjectedScript> {
            if self.reject_injection.load(Ordering::SeqCst) {
                return Err(script_injection("No <head> or <body> element found"));
            }
            self.scripts.lock().unwrap().push(descriptor.clone());
            let (sender, receiver) = oneshot::channel();
            self.load_senders.lock().unwrap().push(sender);
            Ok(InjectedScript {
                target: ScriptTarget::Head,
                load: receiver,
            })
        }

        fn tracker_available(&self) -> bool {
            self.tracker.load(Ordering::SeqCst)
        }

        fn send_event(&self, name: &str, data: Option<&EventData>) -> AnalyticsResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((name.to_string(), data.cloned()));
            let hook = self.on_first_send.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            Ok(())
        }
    }

    fn fast_settings() -> LoaderSettings {
        LoaderSettings::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_max_poll_attempts(3)
            .with_probe_on_error(false)
    }

    fn umami_with(host: &Arc<RecordingHost>) -> Umami {
        Umami::with_host(host.clone(), fast_settings())
    }

    fn data(value: serde_json::Value) -> Option<EventData> {
        value.as_object().cloned()
    }

    fn messages_at(records: &Mutex<Vec<(LogLevel, String)>>, level: LogLevel) -> Vec<String> {
        records
            .lock()
            .unwrap()
            .iter()
            .filter(|(record_level, _)| *record_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn initialize_injects_one_script_with_website_id() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);

        let outcome = umami
            .initialize(UmamiOptions::new("site-1").with_host_url("https://x.test"))
            .unwrap();

        assert_eq!(
            outcome,
            InitializeOutcome::Injected {
                target: ScriptTarget::Head
            }
        );
        let scripts = host.scripts();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].attribute("data-website-id"), Some("site-1"));
        assert_eq!(scripts[0].src(), "https://x.test/script.js");
        assert_eq!(umami.state(), LoaderState::Initializing);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn second_initialize_warns_and_keeps_one_script() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        let records = capture_logs(umami.logger());

        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        let outcome = umami.initialize(UmamiOptions::new("site-2")).unwrap();

        assert_eq!(outcome, InitializeOutcome::AlreadyInitialized);
        assert_eq!(host.scripts().len(), 1);
        assert_eq!(
            messages_at(&records, LogLevel::Warn),
            ["Umami already initialized"]
        );
        assert_eq!(
            umami.options().map(|options| options.website_id),
            Some("site-1".to_string())
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn initialize_after_ready_is_a_no_op() {
        let host = RecordingHost::browser();
        host.install_tracker();
        let umami = umami_with(&host);
        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        host.fire(ScriptLoadEvent::Loaded);
        umami.when_ready().await;

        let outcome = umami.initialize(UmamiOptions::new("site-1")).unwrap();
        assert_eq!(outcome, InitializeOutcome::AlreadyInitialized);
        assert_eq!(host.scripts().len(), 1);
        assert!(umami.is_ready());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn track_before_initialize_warns_without_injecting() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        let records = capture_logs(umami.logger());

        umami.track("click", None);

        assert!(host.scripts().is_empty());
        assert!(host.sent().is_empty());
        assert!(umami.queued_events().is_empty());
        assert_eq!(
            messages_at(&records, LogLevel::Warn),
            ["Please call initialize() first"]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn queued_events_flush_in_order_once_tracker_appears() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        umami.initialize(UmamiOptions::new("site-1")).unwrap();

        umami.track("first", None);
        umami.track("second", data(json!({"step": 2})));
        umami.track("third", None);
        assert!(host.sent().is_empty());
        let queued: Vec<_> = umami
            .queued_events()
            .into_iter()
            .map(|event| event.name)
            .collect();
        assert_eq!(queued, ["first", "second", "third"]);

        host.install_tracker();
        host.fire(ScriptLoadEvent::Loaded);
        umami.when_ready().await;

        assert_eq!(host.sent_names(), ["first", "second", "third"]);
        assert_eq!(host.sent()[1].1, data(json!({"step": 2})));
        assert!(umami.queued_events().is_empty());

        umami.track("fourth", None);
        assert_eq!(host.sent_names(), ["first", "second", "third", "fourth"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn tracker_detected_after_a_few_polls() {
        let host = RecordingHost::browser();
        let umami = Umami::with_host(
            host.clone(),
            fast_settings().with_max_poll_attempts(1_000),
        );
        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        umami.track("early", None);
        host.fire(ScriptLoadEvent::Loaded);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(umami.state(), LoaderState::Initializing);
        host.install_tracker();
        umami.when_ready().await;

        assert_eq!(host.sent_names(), ["early"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn timeout_degrades_to_ready() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        let records = capture_logs(umami.logger());
        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        umami.track("lost", None);

        host.fire(ScriptLoadEvent::Loaded);
        umami.when_ready().await;

        assert!(umami.is_ready());
        assert!(host.sent().is_empty());
        let warnings = messages_at(&records, LogLevel::Warn);
        assert!(warnings
            .iter()
            .any(|message| message.starts_with("Timeout waiting for Umami script to load")));
        assert!(warnings
            .iter()
            .any(|message| message.contains("Skipping event `lost`")));

        host.install_tracker();
        umami.track("later", None);
        assert_eq!(host.sent_names(), ["later"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn load_failure_is_logged_without_state_change() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        let records = capture_logs(umami.logger());
        umami.initialize(UmamiOptions::new("site-1")).unwrap();

        host.fire(ScriptLoadEvent::Failed {
            detail: "error event".into(),
        });
        settle().await;

        assert_eq!(umami.state(), LoaderState::Initializing);
        let errors = messages_at(&records, LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("analytics/script-load-failed"));
        assert!(errors[0].contains("error event"));

        umami.track("still-queued", None);
        assert_eq!(umami.queued_events().len(), 1);
        assert_eq!(host.scripts().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn server_side_initialize_does_nothing() {
        let host = RecordingHost::server();
        let umami = umami_with(&host);

        let outcome = umami.initialize(UmamiOptions::new("site-1")).unwrap();

        assert_eq!(outcome, InitializeOutcome::SkippedServerSide);
        assert!(host.scripts().is_empty());
        assert_eq!(umami.state(), LoaderState::Uninitialized);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn default_host_on_native_skips_initialization() {
        let umami = Umami::new();
        let outcome = umami.initialize(UmamiOptions::new("site-1")).unwrap();
        assert_eq!(outcome, InitializeOutcome::SkippedServerSide);

        let umami = Umami::with_settings(fast_settings());
        assert_eq!(umami.settings().max_poll_attempts, 3);
        assert_eq!(
            umami.initialize(UmamiOptions::new("site-1")).unwrap(),
            InitializeOutcome::SkippedServerSide
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_website_id_is_reported() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        let records = capture_logs(umami.logger());

        let err = umami.initialize(UmamiOptions::new("")).unwrap_err();

        assert_eq!(err.code_str(), "analytics/invalid-configuration");
        assert_eq!(umami.state(), LoaderState::Uninitialized);
        assert!(host.scripts().is_empty());
        assert_eq!(messages_at(&records, LogLevel::Error).len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn insecure_host_url_is_rejected() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);

        let err = umami
            .initialize(UmamiOptions::new("site-1").with_host_url("http://x.test"))
            .unwrap_err();

        assert_eq!(err.code_str(), "analytics/invalid-configuration");
        assert!(host.scripts().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_injection_can_be_retried() {
        let host = RecordingHost::browser();
        host.reject_injection.store(true, Ordering::SeqCst);
        let umami = umami_with(&host);

        let err = umami.initialize(UmamiOptions::new("site-1")).unwrap_err();
        assert_eq!(err.code_str(), "analytics/script-injection");
        assert_eq!(umami.state(), LoaderState::Failed);

        umami.track("dropped", None);
        assert!(umami.queued_events().is_empty());

        host.reject_injection.store(false, Ordering::SeqCst);
        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        assert_eq!(umami.state(), LoaderState::Initializing);
        assert_eq!(host.scripts().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn default_tracking_is_merged_into_events() {
        let host = RecordingHost::browser();
        host.install_tracker();
        let umami = umami_with(&host);
        let defaults = TrackingObject::new("pageview")
            .with_data(json!({"source": "app", "plan": "free"}).as_object().cloned().unwrap());
        umami
            .initialize(UmamiOptions::new("site-1").with_default_tracking(defaults))
            .unwrap();
        umami.track("queued", None);
        host.fire(ScriptLoadEvent::Loaded);
        umami.when_ready().await;

        umami.track("signup", data(json!({"plan": "pro"})));
        umami.track("", None);

        let sent = host.sent();
        assert_eq!(sent[0].0, "queued");
        assert_eq!(sent[0].1, data(json!({"source": "app", "plan": "free"})));
        assert_eq!(sent[1].0, "signup");
        assert_eq!(sent[1].1, data(json!({"source": "app", "plan": "pro"})));
        assert_eq!(sent[2].0, "pageview");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_event_name_is_dropped() {
        let host = RecordingHost::browser();
        host.install_tracker();
        let umami = umami_with(&host);
        let records = capture_logs(umami.logger());
        umami.initialize(UmamiOptions::new("site-1")).unwrap();

        umami.track("  ", None);

        assert!(umami.queued_events().is_empty());
        assert_eq!(
            messages_at(&records, LogLevel::Error),
            ["Event name must not be empty"]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disabled_reinitialize_leaves_ready_instance_untouched() {
        let host = RecordingHost::browser();
        host.install_tracker();
        let umami = umami_with(&host);
        let records = capture_logs(umami.logger());
        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        host.fire(ScriptLoadEvent::Loaded);
        umami.when_ready().await;

        let outcome = umami
            .initialize(UmamiOptions::new("site-1").with_disabled(true))
            .unwrap();
        umami.track("after", None);

        assert_eq!(outcome, InitializeOutcome::AlreadyInitialized);
        assert_eq!(
            messages_at(&records, LogLevel::Warn),
            ["Umami already initialized"]
        );
        assert_eq!(umami.options().map(|options| options.disabled), Some(false));
        assert_eq!(umami.state(), LoaderState::Ready);
        assert_eq!(host.sent_names(), ["after"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disabled_reinitialize_while_loading_keeps_queueing() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        umami.initialize(UmamiOptions::new("site-1")).unwrap();

        let outcome = umami
            .initialize(UmamiOptions::new("site-1").with_disabled(true))
            .unwrap();
        umami.track("queued", None);

        assert_eq!(outcome, InitializeOutcome::AlreadyInitialized);
        assert_eq!(umami.queued_events().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn debug_option_lowers_level_only_when_accepted() {
        let _guard = LOG_LEVEL_GUARD.lock().unwrap();
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        let _ = umami.logger().set_log_level(LogLevel::Warn);

        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        assert_eq!(umami.logger().log_level(), LogLevel::Warn);

        let outcome = umami
            .initialize(UmamiOptions::new("site-1").with_debug(true))
            .unwrap();
        assert_eq!(outcome, InitializeOutcome::AlreadyInitialized);
        assert_eq!(umami.logger().log_level(), LogLevel::Warn);

        let fresh = Umami::with_host(RecordingHost::browser(), fast_settings());
        let _ = fresh.logger().set_log_level(LogLevel::Warn);
        fresh
            .initialize(UmamiOptions::new("site-1").with_debug(true))
            .unwrap();
        assert_eq!(fresh.logger().log_level(), LogLevel::Debug);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn events_tracked_during_flush_follow_the_queue() {
        let host = RecordingHost::browser();
        let umami = umami_with(&host);
        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        umami.track("first", None);
        umami.track("second", None);

        let reentrant = umami.clone();
        *host.on_first_send.lock().unwrap() = Some(Box::new(move || {
            reentrant.track("during-flush", None);
        }));

        host.install_tracker();
        host.fire(ScriptLoadEvent::Loaded);
        umami.when_ready().await;
        umami.track("after", None);

        assert_eq!(
            host.sent_names(),
            ["first", "second", "during-flush", "after"]
        );
        assert!(umami.queued_events().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn event_names_are_forwarded_verbatim() {
        let host = RecordingHost::browser();
        host.install_tracker();
        let umami = umami_with(&host);
        umami.initialize(UmamiOptions::new("site-1")).unwrap();
        host.fire(ScriptLoadEvent::Loaded);
        umami.when_ready().await;

        umami.track(" click ", None);

        assert_eq!(host.sent_names(), [" click "]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disabled_options_turn_everything_off() {
        let host = RecordingHost::browser();
        host.install_tracker();
        let umami = umami_with(&host);
        let records = capture_logs(umami.logger());

        let outcome = umami
            .initialize(UmamiOptions::new("site-1").with_disabled(true))
            .unwrap();
        umami.track("click", None);

        assert_eq!(outcome, InitializeOutcome::Disabled);
        assert!(host.scripts().is_empty());
        assert!(host.sent().is_empty());
        assert!(messages_at(&records, LogLevel::Warn).is_empty());
    }

    #[test]
    fn merge_prefers_explicit_fields() {
        let defaults = TrackingObject::new("default")
            .with_data(json!({"a": 1, "b": 1}).as_object().cloned().unwrap());
        let merged = merge_event_data(Some(&defaults), data(json!({"b": 2, "c": 3})));
        assert_eq!(merged, data(json!({"a": 1, "b": 2, "c": 3})));

        assert_eq!(merge_event_data(None, None), None);
        assert_eq!(
            merge_event_data(Some(&TrackingObject::new("default")), data(json!({"x": 1}))),
            data(json!({"x": 1}))
        );
    }

    #[test]
    fn event_name_falls_back_to_default_tracking() {
        let defaults = TrackingObject::new("pageview");
        assert_eq!(
            resolve_event_name(" click ", Some(&defaults)),
            Some(" click ".to_string())
        );
        assert_eq!(
            resolve_event_name("", Some(&defaults)),
            Some("pageview".to_string())
        );
        assert_eq!(resolve_event_name("", None), None);
    }
}
