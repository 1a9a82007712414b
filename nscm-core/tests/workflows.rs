use httpmock::prelude::*;
use nscm_core::operations::whitelist::{self, Confirm, Reconciler, Stage};
use nscm_core::operations::{report, verify};
use nscm_core::{
    FlatPackage, NscmError, Options, PackageNode, PackageSpec, RegistryClient, Result, TreeSource,
};
use serde_json::json;

struct FixedTree(PackageNode);

impl TreeSource for FixedTree {
    async fn resolve(&self, _manifest_json: &str) -> Result<PackageNode> {
        Ok(self.0.clone())
    }
}

struct Replies(Vec<&'static str>);

impl Confirm for Replies {
    fn confirm(&mut self, _package: &FlatPackage) -> Result<String> {
        if self.0.is_empty() {
            panic!("asked more questions than expected");
        }
        Ok(self.0.remove(0).to_string())
    }
}

fn project_tree() -> PackageNode {
    PackageNode::new("app", "1.0.0")
        .with_dependency(
            "express",
            PackageNode::new("express", "4.17.1")
                .with_from("express@^4.17.0")
                .with_dependency("debug", PackageNode::new("debug", "2.6.9")),
        )
        .with_dependency("gpl-2.0", PackageNode::new("gpl-2.0", "1.0.0"))
        .with_dependency("left-pad", PackageNode::new("left-pad", "1.3.0"))
}

fn mock_scores(server: &MockServer) {
    for (name, score) in [
        ("express", 100),
        ("debug", 90),
        ("gpl-2.0", 0),
        ("left-pad", 40),
    ] {
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/package")
                .query_param("name", name)
                .header("authorization", "Bearer token");
            then.status(200).json_body(json!({ "score": score }));
        });
    }
}

fn options(server: &MockServer) -> Options {
    let mut options = Options::new(&server.base_url(), "token");
    options.concurrency = 2;
    options
}

#[tokio::test]
async fn report_scores_every_package_in_tree_order() {
    let server = MockServer::start();
    mock_scores(&server);
    let client = RegistryClient::new(&server.base_url(), "token").unwrap();

    let report = report::build(&client, &FixedTree(project_tree()), "{}", 2)
        .await
        .unwrap();

    let rows: Vec<(String, Option<f64>)> = report
        .packages
        .iter()
        .map(|p| (p.key(), p.score))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("express@4.17.1".to_string(), Some(100.0)),
            ("debug@2.6.9".to_string(), Some(90.0)),
            ("gpl-2.0@1.0.0".to_string(), Some(0.0)),
            ("left-pad@1.3.0".to_string(), Some(40.0)),
        ]
    );
    assert_eq!(report.packages[0].from.as_deref(), Some("^4.17.0"));
}

#[tokio::test]
async fn reconciler_confirms_and_skips_whitelisted() {
    let server = MockServer::start();
    mock_scores(&server);
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200)
            .json_body(json!([{"name": "left-pad", "version": "1.3.0"}]));
    });
    let add = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/whitelist")
            .json_body_includes(json!({"name": "gpl-2.0", "version": "1.0.0"}).to_string());
        then.status(200)
            .json_body(json!({"name": "gpl-2.0", "version": "1.0.0"}));
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let options = options(&server);
    let source = FixedTree(project_tree());
    let mut reconciler = Reconciler::new(&client, &source, &options);
    assert_eq!(reconciler.stage(), Stage::Idle);

    let mut prompt = Replies(vec!["maybe", "y"]);
    let outcome = reconciler.run("{}", &mut prompt).await.unwrap();

    add.assert_calls(1);
    assert_eq!(reconciler.stage(), Stage::Done);
    assert_eq!(outcome.scanned, 4);
    assert_eq!(outcome.already_whitelisted, 1);
    assert_eq!(outcome.added.len(), 1);
    assert_eq!(outcome.added[0].key(), "gpl-2.0@1.0.0");
}

#[tokio::test]
async fn bulk_mode_adds_without_prompting() {
    let server = MockServer::start();
    mock_scores(&server);
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200).json_body(json!([]));
    });
    let add = server.mock(|when, then| {
        when.method(POST).path("/api/v1/whitelist");
        then.status(200).json_body(json!({"name": "x", "version": "0.0.0"}));
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let mut options = options(&server);
    options.all = true;
    let source = FixedTree(project_tree());

    let mut prompt = Replies(vec![]);
    let outcome = Reconciler::new(&client, &source, &options)
        .run("{}", &mut prompt)
        .await
        .unwrap();

    add.assert_calls(2);
    assert_eq!(outcome.uncertified.len(), 2);
}

#[tokio::test]
async fn unauthorized_scoring_fails_the_session() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/package");
        then.status(401);
    });
    let whitelist = server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200).json_body(json!([]));
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let options = options(&server);
    let source = FixedTree(project_tree());
    let mut reconciler = Reconciler::new(&client, &source, &options);

    let err = reconciler
        .run("{}", &mut Replies(vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, NscmError::Authentication));
    assert_eq!(reconciler.stage(), Stage::Failed);
    whitelist.assert_calls(0);
}

#[tokio::test]
async fn added_package_shows_up_in_list() {
    let server = MockServer::start();
    let add = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/whitelist")
            .json_body_includes(json!({"name": "gpl-2.0", "version": "1.0.0"}).to_string());
        then.status(200)
            .json_body(json!({"name": "gpl-2.0", "version": "1.0.0"}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200)
            .json_body(json!([{"name": "gpl-2.0", "version": "1.0.0"}]));
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let tree = PackageNode::default().with_dependency("gpl-2.0", PackageNode::new("gpl-2.0", "1.0.0"));

    let added = whitelist::add(
        &client,
        &FixedTree(tree),
        &PackageSpec::parse("gpl-2.0@1.0.0"),
        2,
    )
    .await
    .unwrap();
    add.assert();
    assert_eq!(added.len(), 1);

    let listed = whitelist::list(&client).await.unwrap();
    assert!(
        listed
            .iter()
            .any(|entry| entry.name == "gpl-2.0" && entry.version == "1.0.0")
    );
}

#[tokio::test]
async fn reset_deletes_every_entry() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200).json_body(json!([
            {"name": "a", "version": "1.0.0"},
            {"name": "@scope/b", "version": "2.0.0"}
        ]));
    });
    let delete_a = server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/v1/whitelist")
            .query_param("name", "a")
            .query_param("version", "1.0.0");
        then.status(200);
    });
    let delete_b = server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/v1/whitelist")
            .query_param("name", "@scope/b")
            .query_param("version", "2.0.0");
        then.status(200);
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let removed = whitelist::reset(&client, 4).await.unwrap();

    delete_a.assert();
    delete_b.assert();
    assert_eq!(removed.len(), 2);
}

#[tokio::test]
async fn unauthorized_submission_fails_the_session() {
    let server = MockServer::start();
    mock_scores(&server);
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200).json_body(json!([]));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/whitelist");
        then.status(401);
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let mut options = options(&server);
    options.all = true;
    let source = FixedTree(project_tree());
    let mut reconciler = Reconciler::new(&client, &source, &options);

    let err = reconciler
        .run("{}", &mut Replies(vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, NscmError::Authentication));
    assert_eq!(reconciler.stage(), Stage::Failed);
}

#[tokio::test]
async fn rejected_add_names_the_package() {
    let server = MockServer::start();
    mock_scores(&server);
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200).json_body(json!([]));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/whitelist")
            .json_body_includes(json!({"name": "left-pad"}).to_string());
        then.status(409);
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/whitelist");
        then.status(200)
            .json_body(json!({"name": "gpl-2.0", "version": "1.0.0"}));
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let mut options = options(&server);
    options.all = true;
    let source = FixedTree(project_tree());
    let mut reconciler = Reconciler::new(&client, &source, &options);

    let err = reconciler
        .run("{}", &mut Replies(vec![]))
        .await
        .unwrap_err();

    match err {
        NscmError::WhitelistAdd { package } => assert_eq!(package, "left-pad@1.3.0"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(reconciler.stage(), Stage::Failed);
}

#[tokio::test]
async fn reset_aborts_on_failed_delete() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200).json_body(json!([
            {"name": "a", "version": "1.0.0"},
            {"name": "@scope/b", "version": "2.0.0"}
        ]));
    });
    server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/v1/whitelist")
            .query_param("name", "a");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/v1/whitelist")
            .query_param("name", "@scope/b");
        then.status(500);
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let err = whitelist::reset(&client, 2).await.unwrap_err();

    match err {
        NscmError::WhitelistDelete { package } => assert_eq!(package, "@scope/b@2.0.0"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_delete_is_an_auth_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(DELETE).path("/api/v1/whitelist");
        then.status(401);
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let err = whitelist::delete(&client, &PackageSpec::parse("gpl-2.0@1.0.0"))
        .await
        .unwrap_err();

    assert!(matches!(err, NscmError::Authentication));
}

#[tokio::test]
async fn verify_exempts_whitelisted_packages() {
    let server = MockServer::start();
    mock_scores(&server);
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/whitelist");
        then.status(200).json_body(json!([
            {"name": "gpl-2.0", "version": "1.0.0"},
            {"name": "left-pad", "version": "1.3.0"}
        ]));
    });

    let client = RegistryClient::new(&server.base_url(), "token").unwrap();
    let outcome = verify(&client, &FixedTree(project_tree()), "{}", 85.0, 3)
        .await
        .unwrap();

    assert!(outcome.passed());
    assert_eq!(outcome.total, 4);
    assert_eq!(outcome.whitelisted, 2);

    let strict = verify(&client, &FixedTree(project_tree()), "{}", 95.0, 3)
        .await
        .unwrap();
    assert!(!strict.passed());
    assert_eq!(strict.uncertified[0].key(), "debug@2.6.9");
}
