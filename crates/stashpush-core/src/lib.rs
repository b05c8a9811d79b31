//! stashpush core library
//!
//! Projects build lifecycle events onto a Bitbucket Server style hosting
//! service:
//!
//! - [`StatusNotifier`] posts a build status per commit on every build state
//!   transition.
//! - [`CommentNotifier`] posts a comment on each pull request referenced by a
//!   batch of finished builds.
//!
//! Both share the [`HttpTransport`] seam and render [`Template`]s against
//! build properties. Delivery failures are logged and reported, never
//! returned as errors.

pub mod comment;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod formatter;
pub mod metrics;
pub mod notifier;
pub mod status;
pub mod telemetry;
pub mod template;
pub mod transport;

pub use comment::{
    comment_path, pull_request_path, pull_request_urls, CommentNotifier, CommentOptions,
    HTTP_CREATED,
};
pub use config::{CommentConfig, Config, ServiceConfig, StatusConfig};
pub use delivery::{Delivery, DeliveryReport};
pub use domain::{
    Build, Buildset, GotRevision, Properties, PropertyStore, PropertyValue, Results, SourceStamp,
    BUILDER_NAME, GOT_REVISION, PULL_REQUEST_URL,
};
pub use error::{ReporterError, Result, TemplateError, TransportError};
pub use formatter::{DefaultMessageFormatter, MessageFormatter, TemplateMessageFormatter};
pub use metrics::METRICS;
pub use notifier::{
    BaseSettings, BuildStatusReporter, MessageNotifier, MissingWorker, Mode, NotifierFilter,
};
pub use status::{
    resolve_sha, status_path, BuildState, StatusNotifier, StatusOptions, StatusPayload,
    HTTP_PROCESSED,
};
pub use telemetry::init_tracing;
pub use template::Template;
pub use transport::{
    Credentials, HttpResponse, HttpTransport, ReqwestResponse, ReqwestTransport, TransportConfig,
};

/// stashpush version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
