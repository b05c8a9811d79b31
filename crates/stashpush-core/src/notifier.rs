//! Capability traits the build engine drives, plus the generic notifier
//! filter that decides which finished builds are worth a message.
//!
//! The batching and triggering engine lives outside this crate; it calls
//! [`BuildStatusReporter::send`] on every state transition and, for message
//! notifiers, [`MessageNotifier::is_message_needed`] per build followed by
//! one [`MessageNotifier::send_message`] per batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::delivery::DeliveryReport;
use crate::domain::{Build, Results};

/// Receives every build state transition (start and completion).
#[async_trait]
pub trait BuildStatusReporter: Send + Sync {
    async fn send(&self, build: &Build) -> DeliveryReport;
}

/// A worker the engine lost contact with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingWorker {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connection: Option<String>,
}

/// Settings a message notifier imposes on the generic batching engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseSettings {
    pub subject: &'static str,
    pub add_logs: bool,
    pub add_patch: bool,
    /// Workers whose disappearance triggers a message; `None` disables it.
    pub watched_workers: Option<Vec<String>>,
}

/// Batched message delivery driven by the generic notifier engine.
#[async_trait]
pub trait MessageNotifier: Send + Sync {
    /// Whether `build` belongs in the next message batch.
    fn is_message_needed(&self, build: &Build) -> bool;

    /// Deliver one rendered message for a batch of builds.
    async fn send_message(&self, body: &str, builds: &[Build]) -> DeliveryReport;

    /// Called when a watched worker goes missing.
    fn worker_missing(&self, key: &str, worker: &MissingWorker);

    fn base_settings(&self) -> BaseSettings;
}

/// Which build outcomes a message notifier reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    All,
    Passing,
    Failing,
    Warnings,
    Exception,
    Cancelled,
}

impl Mode {
    /// Whether a build with `results` is covered by this mode. Builds still
    /// running (`None`) only match [`Mode::All`].
    pub fn matches(&self, results: Option<Results>) -> bool {
        match (self, results) {
            (Mode::All, _) => true,
            (_, None) => false,
            (Mode::Passing, Some(r)) => r == Results::Success,
            (Mode::Failing, Some(r)) => r == Results::Failure,
            (Mode::Warnings, Some(r)) => r == Results::Warnings,
            (Mode::Exception, Some(r)) => r == Results::Exception,
            (Mode::Cancelled, Some(r)) => r == Results::Cancelled,
        }
    }
}

/// The generic notifier's build filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierFilter {
    #[serde(default = "default_modes")]
    pub mode: Vec<Mode>,
    /// Only report builds from these builders, when set.
    #[serde(default)]
    pub builders: Option<Vec<String>>,
}

fn default_modes() -> Vec<Mode> {
    vec![Mode::All]
}

impl Default for NotifierFilter {
    fn default() -> Self {
        NotifierFilter {
            mode: default_modes(),
            builders: None,
        }
    }
}

impl NotifierFilter {
    pub fn matches(&self, build: &Build) -> bool {
        builder_allowed(self.builders.as_deref(), build)
            && self.mode.iter().any(|m| m.matches(build.results))
    }
}

/// Apply an optional builder allow-list to `build`.
pub fn builder_allowed(builders: Option<&[String]>, build: &Build) -> bool {
    match builders {
        None => true,
        Some(allowed) => build
            .builder_name()
            .is_some_and(|name| allowed.iter().any(|b| *b == name)),
    }
}
