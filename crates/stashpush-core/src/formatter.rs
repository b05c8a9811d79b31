//! Message body formatters for batched notifications.

use async_trait::async_trait;

use crate::domain::{value_to_string, Build, PropertyStore, PropertyValue, BUILDER_NAME};
use crate::template::Template;

/// Produces the message body for one notification batch.
#[async_trait]
pub trait MessageFormatter: Send + Sync {
    async fn format(&self, builds: &[Build]) -> String;
}

const UNKNOWN_BUILDER: &str = "unknown builder";

/// Plain-text summary, one paragraph per build.
///
/// ```text
/// linux #12 finished: failure
/// Build details: https://ci.example.com/#builders/3/builds/12
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessageFormatter;

impl DefaultMessageFormatter {
    fn describe(build: &Build) -> String {
        let unknown = PropertyValue::from(UNKNOWN_BUILDER);
        let builder = match value_to_string(build.properties.get_or(BUILDER_NAME, &unknown)) {
            name if name.is_empty() => UNKNOWN_BUILDER.to_string(),
            name => name,
        };
        let number = build.number.map(|n| format!(" #{n}")).unwrap_or_default();
        let outcome = match (build.complete, build.results) {
            (true, Some(results)) => format!("finished: {results}"),
            (true, None) => "finished".to_string(),
            (false, _) => build
                .state_string
                .clone()
                .unwrap_or_else(|| "in progress".to_string()),
        };
        format!("{builder}{number} {outcome}\nBuild details: {}", build.url)
    }
}

#[async_trait]
impl MessageFormatter for DefaultMessageFormatter {
    async fn format(&self, builds: &[Build]) -> String {
        builds
            .iter()
            .map(Self::describe)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Renders a property template against every build of the batch.
#[derive(Debug, Clone)]
pub struct TemplateMessageFormatter {
    template: Template,
}

impl TemplateMessageFormatter {
    pub fn new(template: Template) -> Self {
        TemplateMessageFormatter { template }
    }
}

#[async_trait]
impl MessageFormatter for TemplateMessageFormatter {
    async fn format(&self, builds: &[Build]) -> String {
        let mut parts = Vec::with_capacity(builds.len());
        for build in builds {
            parts.push(build.properties.render(&self.template).await);
        }
        parts.join("\n\n")
    }
}
