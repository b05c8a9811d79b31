//! Domain model for build lifecycle events.

pub mod build;
pub mod properties;
pub mod results;

pub use build::{Build, Buildset, SourceStamp};
pub use properties::{
    value_to_string, GotRevision, Properties, PropertyStore, PropertyValue, BUILDER_NAME,
    GOT_REVISION, PULL_REQUEST_URL,
};
pub use results::Results;
