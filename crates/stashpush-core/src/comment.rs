//! Pull request comment reporting.
//!
//! [`CommentNotifier`] plugs into the generic batching notifier: it only
//! accepts builds triggered by a pull request and posts one comment per
//! distinct pull request in a batch.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::CommentConfig;
use crate::delivery::{submit, Delivery, DeliveryReport};
use crate::domain::{value_to_string, Build, PropertyStore, PULL_REQUEST_URL};
use crate::error::{ReporterError, Result};
use crate::formatter::{DefaultMessageFormatter, MessageFormatter};
use crate::metrics::METRICS;
use crate::notifier::{BaseSettings, MessageNotifier, MissingWorker, NotifierFilter};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Comment endpoint prefix; the pull request path follows.
pub const COMMENT_API_PREFIX: &str = "/rest/api/1.0";
/// Code the comment endpoint answers with on success.
pub const HTTP_CREATED: u16 = 201;

/// Extract the path of a pull request URL.
///
/// A trailing slash is dropped so the comment endpoint path stays
/// well-formed.
pub fn pull_request_path(pr_url: &str) -> Result<String> {
    let invalid = |reason: String| ReporterError::InvalidPullRequestUrl {
        url: pr_url.to_string(),
        reason,
    };
    let parsed = url::Url::parse(pr_url).map_err(|e| invalid(e.to_string()))?;
    if parsed.cannot_be_a_base() {
        return Err(invalid("url has no hierarchical path".to_string()));
    }
    let path = parsed.path().trim_end_matches('/');
    if path.is_empty() {
        return Err(invalid("url has no path".to_string()));
    }
    Ok(path.to_string())
}

/// Path of the comment endpoint for a pull request URL path.
pub fn comment_path(pr_path: &str) -> String {
    format!("{COMMENT_API_PREFIX}{pr_path}/comments")
}

/// Distinct pull request URLs of a batch, in first-seen order.
///
/// URLs are compared by the path they post to, so `.../pull-requests/7` and
/// `.../pull-requests/7/` yield one comment. Malformed URLs compare verbatim.
pub fn pull_request_urls(builds: &[Build]) -> Vec<String> {
    let mut seen = HashSet::new();
    builds
        .iter()
        .filter_map(|build| build.properties.get(PULL_REQUEST_URL))
        .map(value_to_string)
        .filter(|url| seen.insert(pull_request_path(url).unwrap_or_else(|_| url.clone())))
        .collect()
}

/// Options for the comment notifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentOptions {
    /// Log successful deliveries.
    pub verbose: bool,
    pub filter: NotifierFilter,
}

/// Posts build summaries as pull request comments.
pub struct CommentNotifier<T = ReqwestTransport> {
    options: CommentOptions,
    formatter: Box<dyn MessageFormatter>,
    transport: T,
}

impl<T> std::fmt::Debug for CommentNotifier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentNotifier")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CommentNotifier<ReqwestTransport> {
    /// Build a notifier with a live HTTP transport.
    pub fn from_config(config: &CommentConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.service.transport_config())?;
        Ok(Self::new(config.options(), transport).with_formatter(config.formatter()))
    }
}

impl<T: HttpTransport> CommentNotifier<T> {
    /// A notifier using [`DefaultMessageFormatter`].
    pub fn new(options: CommentOptions, transport: T) -> Self {
        CommentNotifier {
            options,
            formatter: Box::new(DefaultMessageFormatter),
            transport,
        }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn MessageFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn options(&self) -> &CommentOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the transport.
    pub fn shutdown(self) {
        debug!("comment notifier shut down");
    }

    /// Filter a batch, render its message once and post it.
    ///
    /// This is the part of the batching engine's work that needs the
    /// notifier's own formatter.
    pub async fn notify(&self, builds: &[Build]) -> DeliveryReport {
        let selected: Vec<Build> = builds
            .iter()
            .filter(|build| self.is_message_needed(build))
            .cloned()
            .collect();
        if selected.is_empty() {
            debug!(batch = builds.len(), "no pull request builds in batch");
            return DeliveryReport::default();
        }

        let body = self.formatter.format(&selected).await;
        self.send_message(&body, &selected).await
    }

    async fn post_comment(&self, body: &str, pr_url: String) -> Delivery {
        let path = match pull_request_path(&pr_url) {
            Ok(path) => path,
            Err(e) => {
                error!(pr_url = %pr_url, "skipping comment: {e}");
                return Delivery::Skipped {
                    target: pr_url,
                    reason: e.to_string(),
                };
            }
        };

        let payload = serde_json::json!({ "text": body });
        let outcome = submit(&self.transport, &comment_path(&path), &payload, HTTP_CREATED)
            .await
            .into_delivery(pr_url.clone());
        match &outcome {
            Delivery::Sent { .. } => {
                if self.options.verbose {
                    info!(pr_url = %pr_url, "{body} sent to {pr_url}");
                }
            }
            Delivery::Rejected { code, body, .. } => {
                error!(
                    code = *code,
                    pr_url = %pr_url,
                    "{code}: unable to send a comment: {body}"
                );
            }
            Delivery::Unreachable { error, .. } => {
                error!(
                    pr_url = %pr_url,
                    "unable to reach Bitbucket Server for comment: {error}"
                );
            }
            Delivery::Unresolved { .. } | Delivery::Skipped { .. } => {}
        }
        outcome
    }
}

#[async_trait]
impl<T: HttpTransport> MessageNotifier for CommentNotifier<T> {
    fn is_message_needed(&self, build: &Build) -> bool {
        build.is_pull_request() && self.options.filter.matches(build)
    }

    async fn send_message(&self, body: &str, builds: &[Build]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for pr_url in pull_request_urls(builds) {
            let delivery = self.post_comment(body, pr_url).await;
            if delivery.is_sent() {
                METRICS.inc_comments_sent();
            } else {
                METRICS.inc_deliveries_failed();
            }
            report.push(delivery);
        }
        report
    }

    fn worker_missing(&self, key: &str, worker: &MissingWorker) {
        // comments belong to changes, not to workers
        debug!(key = %key, worker = %worker.name, "ignoring missing worker");
    }

    fn base_settings(&self) -> BaseSettings {
        BaseSettings {
            subject: "",
            add_logs: false,
            add_patch: false,
            watched_workers: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Results;
    use crate::fakes::RecordingTransport;
    use crate::notifier::Mode;

    fn pr_build(url: Option<&str>, results: Results) -> Build {
        let mut build = Build {
            complete: true,
            results: Some(results),
            ..Default::default()
        };
        if let Some(url) = url {
            build.properties.set(PULL_REQUEST_URL, url);
        }
        build
    }

    #[test]
    fn test_pull_request_path() {
        assert_eq!(pull_request_path("https://host/prs/42").unwrap(), "/prs/42");
        assert_eq!(
            pull_request_path("https://host/projects/P/repos/r/pull-requests/7/").unwrap(),
            "/projects/P/repos/r/pull-requests/7"
        );
        assert_eq!(
            pull_request_path("https://host/prs/42?tab=overview#c1").unwrap(),
            "/prs/42"
        );
    }

    #[test]
    fn test_pull_request_path_rejects_malformed_urls() {
        assert!(pull_request_path("").is_err());
        assert!(pull_request_path("/prs/42").is_err());
        assert!(pull_request_path("mailto:dev@example.com").is_err());
        assert!(pull_request_path("https://host/").is_err());
    }

    #[test]
    fn test_comment_path() {
        assert_eq!(comment_path("/prs/42"), "/rest/api/1.0/prs/42/comments");
    }

    #[test]
    fn test_pull_request_urls_dedupe_in_order() {
        let builds = vec![
            pr_build(Some("https://host/prs/2"), Results::Success),
            pr_build(None, Results::Success),
            pr_build(Some("https://host/prs/1"), Results::Success),
            pr_build(Some("https://host/prs/2"), Results::Failure),
        ];
        assert_eq!(
            pull_request_urls(&builds),
            vec!["https://host/prs/2", "https://host/prs/1"]
        );
    }

    #[test]
    fn test_pull_request_urls_dedupe_on_comment_path() {
        let builds = vec![
            pr_build(Some("https://host/prs/42"), Results::Success),
            pr_build(Some("https://host/prs/42/"), Results::Success),
            pr_build(Some("https://host/prs/42?tab=diff"), Results::Success),
            pr_build(Some("not a url"), Results::Success),
            pr_build(Some("not a url"), Results::Success),
        ];
        assert_eq!(
            pull_request_urls(&builds),
            vec!["https://host/prs/42", "not a url"]
        );
    }

    #[test]
    fn test_is_message_needed_requires_pull_request() {
        let notifier =
            CommentNotifier::new(CommentOptions::default(), RecordingTransport::always(201));
        let with_pr = pr_build(Some("https://host/prs/1"), Results::Success);
        assert!(notifier.is_message_needed(&with_pr));
        assert!(!notifier.is_message_needed(&pr_build(None, Results::Success)));
    }

    #[test]
    fn test_is_message_needed_applies_mode_filter() {
        let options = CommentOptions {
            verbose: false,
            filter: NotifierFilter {
                mode: vec![Mode::Failing],
                builders: None,
            },
        };
        let notifier = CommentNotifier::new(options, RecordingTransport::always(201));
        let failed = pr_build(Some("https://host/prs/1"), Results::Failure);
        let passed = pr_build(Some("https://host/prs/1"), Results::Success);
        assert!(notifier.is_message_needed(&failed));
        assert!(!notifier.is_message_needed(&passed));
    }

    #[test]
    fn test_worker_missing_is_a_no_op() {
        let notifier =
            CommentNotifier::new(CommentOptions::default(), RecordingTransport::always(201));
        notifier.worker_missing(
            "worker-missing",
            &MissingWorker {
                name: "w1".to_string(),
                last_connection: None,
            },
        );
        assert!(notifier.transport().requests().is_empty());
    }

    #[test]
    fn test_base_settings_are_fixed() {
        let notifier =
            CommentNotifier::new(CommentOptions::default(), RecordingTransport::always(201));
        let settings = notifier.base_settings();
        assert_eq!(settings.subject, "");
        assert!(!settings.add_logs);
        assert!(!settings.add_patch);
        assert!(settings.watched_workers.is_none());
    }
}
