//! Hosting-application capabilities.
//!
//! The updater needs three things from the app it is embedded in: the
//! running version, a way to quit after a Windows installer takes over, and
//! optionally a channel to forward debug output to attached observers. The
//! variant is chosen explicitly when the updater is built.

use std::fmt;
use std::sync::Arc;

/// Version reported when no hosting application supplies one.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// Capabilities provided by the application being updated.
pub trait HostEnvironment: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Version of the running application.
    fn app_version(&self) -> String;

    /// Ask the application to terminate. Best-effort.
    fn quit(&self);

    /// Forward a debug line to attached observers.
    fn forward_debug(&self, message: &str) {
        let _ = message;
    }
}

/// Hook invoked by [`EmbeddedHost::quit`].
pub type QuitHook = Arc<dyn Fn() + Send + Sync>;

/// Hook invoked by [`EmbeddedHost::forward_debug`].
pub type DebugSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Running inside a real application that knows its version.
#[derive(Clone)]
pub struct EmbeddedHost {
    version: String,
    on_quit: Option<QuitHook>,
    debug_sink: Option<DebugSink>,
}

impl fmt::Debug for EmbeddedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedHost")
            .field("version", &self.version)
            .field("on_quit", &self.on_quit.is_some())
            .field("debug_sink", &self.debug_sink.is_some())
            .finish()
    }
}

impl EmbeddedHost {
    /// Host reporting `version` (typically the app's `CARGO_PKG_VERSION`).
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            on_quit: None,
            debug_sink: None,
        }
    }

    /// Install the termination hook.
    pub fn with_quit_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_quit = Some(Arc::new(hook));
        self
    }

    /// Install the debug forwarding sink.
    pub fn with_debug_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.debug_sink = Some(Arc::new(sink));
        self
    }
}

impl HostEnvironment for EmbeddedHost {
    fn name(&self) -> &str {
        "embedded"
    }

    fn app_version(&self) -> String {
        self.version.clone()
    }

    fn quit(&self) {
        match &self.on_quit {
            Some(hook) => hook(),
            None => tracing::debug!("embedded host has no quit hook"),
        }
    }

    fn forward_debug(&self, message: &str) {
        if let Some(sink) = &self.debug_sink {
            sink(message);
        }
    }
}

/// No hosting application: fixed fallback version, quitting is a no-op.
///
/// Because [`FALLBACK_VERSION`] is lower than any real release, checks
/// still run but any valid release will look newer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandaloneHost;

impl HostEnvironment for StandaloneHost {
    fn name(&self) -> &str {
        "standalone"
    }

    fn app_version(&self) -> String {
        FALLBACK_VERSION.to_owned()
    }

    fn quit(&self) {}
}
