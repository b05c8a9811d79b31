use serde_json::{json, Value};
use stashpush_core::fakes::{RecordingTransport, ScriptedResponse};
use stashpush_core::{
    Build, BuildStatusReporter, Delivery, Results, SourceStamp, StatusNotifier, StatusOptions,
    Template, BUILDER_NAME, GOT_REVISION,
};

fn build(complete: bool, results: Option<Results>, stamps: Vec<SourceStamp>) -> Build {
    let mut build = Build {
        complete,
        results,
        url: "https://ci.example.com/#builders/4/builds/9".to_string(),
        ..Default::default()
    };
    build.properties.set(BUILDER_NAME, "linux-x86");
    build.buildset.sourcestamps = stamps;
    build
}

fn notifier(transport: RecordingTransport) -> StatusNotifier<RecordingTransport> {
    StatusNotifier::new(StatusOptions::default(), transport)
}

#[tokio::test]
async fn in_progress_build_posts_default_payload() {
    let n = notifier(RecordingTransport::always(204));
    let b = build(false, None, vec![SourceStamp::new("", Some("abc123"))]);

    let report = n.send(&b).await;

    assert_eq!(report.sent(), 1);
    let requests = n.transport().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/rest/build-status/1.0/commits/abc123");
    assert_eq!(
        requests[0].body,
        json!({
            "state": "INPROGRESS",
            "url": "https://ci.example.com/#builders/4/builds/9",
            "key": "linux-x86",
            "description": "Build started."
        })
    );
}

#[tokio::test]
async fn successful_build_posts_successful_state() {
    let n = notifier(RecordingTransport::always(204));
    let b = build(
        true,
        Some(Results::Success),
        vec![SourceStamp::new("", Some("abc123"))],
    );

    n.send(&b).await;

    let requests = n.transport().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/rest/build-status/1.0/commits/abc123");
    assert_eq!(requests[0].body["state"], "SUCCESSFUL");
    assert_eq!(requests[0].body["description"], "Build done.");
}

#[tokio::test]
async fn non_success_results_post_failed_state() {
    for results in [Results::Failure, Results::Warnings, Results::Exception, Results::Cancelled] {
        let n = notifier(RecordingTransport::always(204));
        let b = build(true, Some(results), vec![SourceStamp::new("", Some("f00"))]);
        n.send(&b).await;
        assert_eq!(n.transport().requests()[0].body["state"], "FAILED", "{results}");
    }
}

#[tokio::test]
async fn stamp_revision_is_used_verbatim_over_got_revision() {
    let n = notifier(RecordingTransport::always(204));
    let mut b = build(false, None, vec![SourceStamp::new("", Some("from-stamp"))]);
    b.properties.set(GOT_REVISION, "from-property");

    n.send(&b).await;

    assert_eq!(
        n.transport().paths(),
        vec!["/rest/build-status/1.0/commits/from-stamp"]
    );
}

#[tokio::test]
async fn scalar_got_revision_fills_missing_revision() {
    let n = notifier(RecordingTransport::always(204));
    let mut b = build(true, Some(Results::Success), vec![SourceStamp::new("", None)]);
    b.properties.set(GOT_REVISION, "deadbeef");

    n.send(&b).await;

    assert_eq!(
        n.transport().paths(),
        vec!["/rest/build-status/1.0/commits/deadbeef"]
    );
}

#[tokio::test]
async fn per_codebase_got_revision_resolves_each_stamp() {
    let n = notifier(RecordingTransport::always(204));
    let mut b = build(
        true,
        Some(Results::Success),
        vec![
            SourceStamp::new("frontend", None),
            SourceStamp::new("backend", Some("b4ck")),
            SourceStamp::new("docs", None),
        ],
    );
    b.properties.set(
        GOT_REVISION,
        json!({"frontend": "fr0nt", "backend": "ignored", "docs": "d0cs"}),
    );

    let report = n.send(&b).await;

    assert_eq!(report.sent(), 3);
    assert_eq!(
        n.transport().paths(),
        vec![
            "/rest/build-status/1.0/commits/fr0nt",
            "/rest/build-status/1.0/commits/b4ck",
            "/rest/build-status/1.0/commits/d0cs",
        ]
    );
}

#[tokio::test]
async fn unresolvable_stamp_is_skipped_and_others_continue() {
    let n = notifier(RecordingTransport::always(204));
    let mut b = build(
        false,
        None,
        vec![
            SourceStamp::new("lib", None),
            SourceStamp::new("app", None),
            SourceStamp::new("tools", Some("t00l")),
        ],
    );
    b.properties.set(GOT_REVISION, json!({"app": "4pp"}));

    let report = n.send(&b).await;

    assert_eq!(
        report.deliveries[0],
        Delivery::Unresolved {
            codebase: "lib".to_string()
        }
    );
    assert_eq!(report.sent(), 2);
    assert_eq!(
        n.transport().paths(),
        vec![
            "/rest/build-status/1.0/commits/4pp",
            "/rest/build-status/1.0/commits/t00l",
        ]
    );
}

#[tokio::test]
async fn no_revision_anywhere_sends_nothing() {
    let n = notifier(RecordingTransport::always(204));
    let mut b = build(false, None, vec![SourceStamp::new("", None)]);
    b.properties.set(GOT_REVISION, Value::Null);

    let report = n.send(&b).await;

    assert_eq!(report.sent(), 0);
    assert_eq!(report.failed(), 1);
    assert!(n.transport().requests().is_empty());
}

#[tokio::test]
async fn server_error_is_reported_and_does_not_abort() {
    let transport = RecordingTransport::always(204)
        .then(ScriptedResponse::with_body(500, "server error"));
    let n = notifier(transport);
    let b = build(
        true,
        Some(Results::Failure),
        vec![SourceStamp::new("a", Some("aaa")), SourceStamp::new("b", Some("bbb"))],
    );

    let report = n.send(&b).await;

    assert_eq!(
        report.deliveries,
        vec![
            Delivery::Rejected {
                target: "aaa".to_string(),
                code: 500,
                body: "server error".to_string(),
            },
            Delivery::Sent {
                target: "bbb".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn unreachable_service_is_reported_and_does_not_abort() {
    let transport = RecordingTransport::always(204)
        .then(ScriptedResponse::Unreachable("connection refused".to_string()));
    let n = notifier(transport);
    let b = build(
        false,
        None,
        vec![SourceStamp::new("a", Some("aaa")), SourceStamp::new("b", Some("bbb"))],
    );

    let report = n.send(&b).await;

    assert!(matches!(report.deliveries[0], Delivery::Unreachable { .. }));
    assert!(report.deliveries[1].is_sent());
}

#[tokio::test]
async fn custom_templates_are_rendered_per_build() {
    let options = StatusOptions {
        key: Template::parse("ci-%(prop:buildername)s").unwrap(),
        status_name: Some(Template::parse("%(prop:buildername)s (%(prop:branch)s)").unwrap()),
        start_description: Template::parse("Started on %(prop:workername:-any)s").unwrap(),
        ..Default::default()
    };
    let n = StatusNotifier::new(options, RecordingTransport::always(204));
    let mut b = build(false, None, vec![SourceStamp::new("", Some("abc"))]);
    b.properties.set("branch", "feature/x");

    n.send(&b).await;

    let body = &n.transport().requests()[0].body;
    assert_eq!(body["key"], "ci-linux-x86");
    assert_eq!(body["name"], "linux-x86 (feature/x)");
    assert_eq!(body["description"], "Started on any");
}

#[tokio::test]
async fn reporter_trait_object_dispatch() {
    let n = notifier(RecordingTransport::always(204));
    let reporter: &dyn BuildStatusReporter = &n;
    let b = build(false, None, vec![SourceStamp::new("", Some("abc"))]);

    let report = reporter.send(&b).await;

    assert_eq!(report.sent(), 1);
}
