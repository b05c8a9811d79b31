//! Per-commit build status reporting.
//!
//! [`StatusNotifier`] turns each build state transition into one status POST
//! per source stamp whose commit hash can be determined.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::StatusConfig;
use crate::delivery::{submit, Delivery, DeliveryReport};
use crate::domain::{Build, GotRevision, PropertyStore, SourceStamp};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::notifier::{builder_allowed, BuildStatusReporter};
use crate::template::Template;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Status endpoint, keyed by commit hash.
pub const STATUS_API_PATH: &str = "/rest/build-status/1.0/commits/";
/// Code the status endpoint answers with on success.
pub const HTTP_PROCESSED: u16 = 204;

pub const DEFAULT_START_DESCRIPTION: &str = "Build started.";
pub const DEFAULT_END_DESCRIPTION: &str = "Build done.";

/// Path of the status endpoint for `sha`.
pub fn status_path(sha: &str) -> String {
    format!("{STATUS_API_PATH}{sha}")
}

/// Build state as understood by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildState {
    #[serde(rename = "INPROGRESS")]
    InProgress,
    #[serde(rename = "SUCCESSFUL")]
    Successful,
    #[serde(rename = "FAILED")]
    Failed,
}

impl BuildState {
    pub fn of(build: &Build) -> Self {
        if !build.complete {
            BuildState::InProgress
        } else if build.results.is_some_and(|r| r.is_success()) {
            BuildState::Successful
        } else {
            BuildState::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::InProgress => "INPROGRESS",
            BuildState::Successful => "SUCCESSFUL",
            BuildState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a status POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusPayload {
    pub state: BuildState,
    pub url: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Rendering options for status payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOptions {
    pub key: Template,
    pub status_name: Option<Template>,
    pub start_description: Template,
    pub end_description: Template,
    /// Log successful deliveries.
    pub verbose: bool,
    /// Ignore builds from builders not listed here, when set.
    pub builders: Option<Vec<String>>,
}

impl Default for StatusOptions {
    fn default() -> Self {
        StatusOptions {
            key: Template::property(crate::domain::BUILDER_NAME),
            status_name: None,
            start_description: Template::literal(DEFAULT_START_DESCRIPTION),
            end_description: Template::literal(DEFAULT_END_DESCRIPTION),
            verbose: false,
            builders: None,
        }
    }
}

/// Resolve the commit hash for one source stamp.
///
/// The stamp's own revision wins; otherwise `got_revision` is consulted,
/// per codebase when it is a mapping.
pub fn resolve_sha(stamp: &SourceStamp, got_revision: Option<&GotRevision>) -> Option<String> {
    if let Some(sha) = &stamp.revision {
        return Some(sha.clone());
    }
    got_revision
        .and_then(|got| got.for_codebase(&stamp.codebase))
        .map(str::to_string)
}

/// Posts one build status per resolvable source stamp.
#[derive(Debug)]
pub struct StatusNotifier<T = ReqwestTransport> {
    options: StatusOptions,
    transport: T,
}

impl StatusNotifier<ReqwestTransport> {
    /// Build a notifier with a live HTTP transport.
    pub fn from_config(config: &StatusConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.service.transport_config())?;
        Ok(Self::new(config.options(), transport))
    }
}

impl<T: HttpTransport> StatusNotifier<T> {
    pub fn new(options: StatusOptions, transport: T) -> Self {
        StatusNotifier { options, transport }
    }

    pub fn options(&self) -> &StatusOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the transport.
    pub fn shutdown(self) {
        debug!("status notifier shut down");
    }

    /// Render the status payload for `build`. The commit hash is not part of
    /// the payload; it only appears in the request path.
    pub async fn payload(&self, build: &Build) -> StatusPayload {
        let state = BuildState::of(build);
        let description = match state {
            BuildState::InProgress => &self.options.start_description,
            _ => &self.options.end_description,
        };
        let props = &build.properties;

        let name = match &self.options.status_name {
            Some(template) => Some(props.render(template).await),
            None => None,
        };
        StatusPayload {
            state,
            url: build.url.clone(),
            key: props.render(&self.options.key).await,
            description: Some(props.render(description).await),
            name,
        }
    }

    /// Report `build` against every commit it was built from.
    ///
    /// Never fails: each source stamp is handled on its own and problems are
    /// logged and recorded in the returned report.
    pub async fn send(&self, build: &Build) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if !builder_allowed(self.options.builders.as_deref(), build) {
            debug!(builder = ?build.builder_name(), "builder not selected, skipping status");
            return report;
        }

        let got_revision = build.properties.got_revision();
        for stamp in build.sourcestamps() {
            let Some(sha) = resolve_sha(stamp, got_revision.as_ref()) else {
                error!(codebase = %stamp.codebase, "unable to resolve commit hash");
                METRICS.inc_revisions_unresolved();
                report.push(Delivery::Unresolved {
                    codebase: stamp.codebase.clone(),
                });
                continue;
            };

            let payload = self.payload(build).await;
            let body = match serde_json::to_value(&payload) {
                Ok(body) => body,
                Err(e) => {
                    error!(sha = %sha, error = %e, "unable to encode status payload");
                    METRICS.inc_deliveries_failed();
                    report.push(Delivery::Skipped {
                        target: sha,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let outcome = submit(&self.transport, &status_path(&sha), &body, HTTP_PROCESSED)
                .await
                .into_delivery(sha.clone());
            match &outcome {
                Delivery::Sent { .. } => {
                    METRICS.inc_statuses_sent();
                    if self.options.verbose {
                        info!(
                            state = %payload.state,
                            sha = %sha,
                            "status {} sent for {}",
                            payload.state,
                            sha
                        );
                    }
                }
                Delivery::Rejected { code, body, .. } => {
                    METRICS.inc_deliveries_failed();
                    error!(
                        code = *code,
                        sha = %sha,
                        "{code}: unable to send Bitbucket Server status: {body}"
                    );
                }
                Delivery::Unreachable { error, .. } => {
                    METRICS.inc_deliveries_failed();
                    error!(sha = %sha, "unable to reach Bitbucket Server for status: {error}");
                }
                Delivery::Unresolved { .. } | Delivery::Skipped { .. } => {}
            }
            report.push(outcome);
        }
        report
    }
}

#[async_trait]
impl<T: HttpTransport> BuildStatusReporter for StatusNotifier<T> {
    async fn send(&self, build: &Build) -> DeliveryReport {
        StatusNotifier::send(self, build).await
    }
}
