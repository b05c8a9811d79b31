//! The build record handed over by the build engine on each lifecycle event.

use serde::{Deserialize, Serialize};

use super::properties::{Properties, PULL_REQUEST_URL};
use super::results::Results;

/// One codebase's revision contributing to a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStamp {
    #[serde(default)]
    pub codebase: String,
    /// Commit hash, or `None` when it must be taken from `got_revision`.
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl SourceStamp {
    pub fn new(codebase: impl Into<String>, revision: Option<&str>) -> Self {
        SourceStamp {
            codebase: codebase.into(),
            revision: revision.map(str::to_string),
            ..Default::default()
        }
    }
}

/// The set of source stamps a build was requested for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buildset {
    #[serde(default)]
    pub sourcestamps: Vec<SourceStamp>,
}

/// A single build execution, read-only from the reporters' point of view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Build {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(default)]
    pub complete: bool,
    /// `None` while the build is still running.
    #[serde(default)]
    pub results: Option<Results>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_string: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub buildset: Buildset,
}

impl Build {
    pub fn sourcestamps(&self) -> &[SourceStamp] {
        &self.buildset.sourcestamps
    }

    pub fn builder_name(&self) -> Option<String> {
        self.properties.builder_name()
    }

    /// Whether a pull request change source triggered this build.
    pub fn is_pull_request(&self) -> bool {
        use super::properties::PropertyStore;
        self.properties.has(PULL_REQUEST_URL)
    }

    /// Whether the build finished with [`Results::Success`].
    pub fn succeeded(&self) -> bool {
        self.complete && self.results.is_some_and(|r| r.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_engine_build() {
        let build: Build = serde_json::from_value(json!({
            "buildid": 17,
            "number": 3,
            "complete": true,
            "results": 0,
            "url": "https://ci.example.com/#builders/1/builds/3",
            "properties": {
                "buildername": ["linux", "Builder"],
                "got_revision": ["abc123", "Git"]
            },
            "buildset": {
                "sourcestamps": [
                    {"codebase": "", "revision": null, "branch": "main"}
                ]
            }
        }))
        .unwrap();

        assert!(build.succeeded());
        assert_eq!(build.number, Some(3));
        assert_eq!(build.builder_name().as_deref(), Some("linux"));
        assert_eq!(build.sourcestamps().len(), 1);
        assert_eq!(build.sourcestamps()[0].revision, None);
        assert_eq!(build.sourcestamps()[0].branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_running_build_has_no_results() {
        let build: Build = serde_json::from_value(json!({
            "complete": false,
            "results": null,
            "url": "u"
        }))
        .unwrap();
        assert!(!build.complete);
        assert!(build.results.is_none());
        assert!(!build.succeeded());
        assert!(build.sourcestamps().is_empty());
    }

    #[test]
    fn test_is_pull_request() {
        let mut build = Build::default();
        assert!(!build.is_pull_request());
        build
            .properties
            .set(PULL_REQUEST_URL, "https://host/projects/P/repos/r/pull-requests/4");
        assert!(build.is_pull_request());
    }
}
