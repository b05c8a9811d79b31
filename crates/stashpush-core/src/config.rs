//! TOML configuration for the reporters.
//!
//! ```toml
//! [status]
//! base_url = "https://bitbucket.example.com"
//! user = "ci"
//! password = "secret"
//! key = "%(prop:buildername)s"
//! statusName = "%(prop:buildername)s #%(prop:buildnumber)s"
//!
//! [comment]
//! base_url = "https://bitbucket.example.com"
//! user = "ci"
//! password = "secret"
//! mode = ["failing", "passing"]
//! ```
//!
//! Option names accept both snake_case and the camelCase spelling used by
//! the build master configuration (`statusName`, `startDescription`, ...).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::comment::CommentOptions;
use crate::error::{ReporterError, Result};
use crate::formatter::{DefaultMessageFormatter, MessageFormatter, TemplateMessageFormatter};
use crate::notifier::NotifierFilter;
use crate::status::{StatusOptions, DEFAULT_END_DESCRIPTION, DEFAULT_START_DESCRIPTION};
use crate::template::Template;
use crate::transport::{Credentials, TransportConfig};

fn default_verify() -> bool {
    true
}

/// Connection settings shared by both reporters.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_verify")]
    pub verify: bool,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("debug", &self.debug)
            .field("verify", &self.verify)
            .finish_non_exhaustive()
    }
}

impl ServiceConfig {
    pub fn new(base_url: &str) -> Self {
        ServiceConfig {
            base_url: base_url.to_string(),
            user: None,
            password: None,
            debug: false,
            verify: true,
        }
    }

    /// Basic credentials are only sent when a user is configured.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.base_url.clone(),
            credentials: self.user.as_ref().map(|user| Credentials {
                user: user.clone(),
                password: self.password.clone().unwrap_or_default(),
            }),
            debug: self.debug,
            verify: self.verify,
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ReporterError::Config(format!(
                "[{section}] base_url must not be empty"
            )));
        }
        Ok(())
    }
}

/// `[status]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(flatten)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub key: Option<Template>,
    #[serde(default, alias = "statusName")]
    pub status_name: Option<Template>,
    #[serde(default, alias = "startDescription")]
    pub start_description: Option<Template>,
    #[serde(default, alias = "endDescription")]
    pub end_description: Option<Template>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub builders: Option<Vec<String>>,
}

/// Empty templates fall back to the default, like unset ones.
fn non_empty(template: &Option<Template>) -> Option<Template> {
    template.clone().filter(|t| !t.source().is_empty())
}

impl StatusConfig {
    pub fn new(service: ServiceConfig) -> Self {
        StatusConfig {
            service,
            key: None,
            status_name: None,
            start_description: None,
            end_description: None,
            verbose: false,
            builders: None,
        }
    }

    pub fn options(&self) -> StatusOptions {
        let defaults = StatusOptions::default();
        StatusOptions {
            key: non_empty(&self.key).unwrap_or(defaults.key),
            status_name: non_empty(&self.status_name),
            start_description: non_empty(&self.start_description)
                .unwrap_or_else(|| Template::literal(DEFAULT_START_DESCRIPTION)),
            end_description: non_empty(&self.end_description)
                .unwrap_or_else(|| Template::literal(DEFAULT_END_DESCRIPTION)),
            verbose: self.verbose,
            builders: self.builders.clone(),
        }
    }
}

/// `[comment]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentConfig {
    #[serde(flatten)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub verbose: bool,
    #[serde(flatten)]
    pub filter: NotifierFilter,
    /// Template rendered per build instead of the default summary.
    #[serde(default, alias = "messageTemplate")]
    pub message_template: Option<Template>,
}

impl CommentConfig {
    pub fn new(service: ServiceConfig) -> Self {
        CommentConfig {
            service,
            verbose: false,
            filter: NotifierFilter::default(),
            message_template: None,
        }
    }

    pub fn options(&self) -> CommentOptions {
        CommentOptions {
            verbose: self.verbose,
            filter: self.filter.clone(),
        }
    }

    pub fn formatter(&self) -> Box<dyn MessageFormatter> {
        match non_empty(&self.message_template) {
            Some(template) => Box::new(TemplateMessageFormatter::new(template)),
            None => Box::new(DefaultMessageFormatter),
        }
    }
}

/// Whole configuration file. Either section may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub status: Option<StatusConfig>,
    #[serde(default)]
    pub comment: Option<CommentConfig>,
}

impl Config {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(status) = &self.status {
            status.service.validate("status")?;
        }
        if let Some(comment) = &self.comment {
            comment.service.validate("comment")?;
            if comment.filter.mode.is_empty() {
                return Err(ReporterError::Config(
                    "[comment] mode must list at least one build outcome".to_string(),
                ));
            }
        }
        Ok(())
    }
}
