//! End-to-end tests for the activities: mock Jira server in, in-memory
//! store out, driven through the activity registry the way a workflow
//! runtime would.

use std::sync::Arc;

use jira_harness::activities::{
    self, ActivityContext, Credentials, FetchAllIssuesInput, FetchAllOutput, FetchIssueOutput,
    PageOutput,
};
use jira_harness::registry::ActivityRegistry;
use jira_harness_core::store::memory::InMemoryStore;
use jira_harness_core::store::Store;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

fn credentials(server: &ServerGuard) -> Value {
    json!({
        "base_url": server.url(),
        "email": "bot@acme.com",
        "api_token": "secret-token",
        "timeout_secs": 5
    })
}

fn input(server: &ServerGuard, extra: Value) -> Value {
    let mut value = credentials(server);
    if let (Some(map), Value::Object(extra)) = (value.as_object_mut(), extra) {
        map.extend(extra);
    }
    value
}

fn issue_json(n: usize) -> Value {
    json!({
        "id": (10000 + n).to_string(),
        "key": format!("ENG-{}", n),
        "self": format!("https://acme.atlassian.net/rest/api/3/issue/{}", 10000 + n),
        "fields": {
            "summary": format!("Issue {}", n),
            "status": {"name": "Open"},
            "issuetype": {"name": "Task"},
            "project": {"key": "ENG"},
            "updated": "2024-01-15T10:30:00.000+0000"
        }
    })
}

async fn search_page(server: &mut ServerGuard, start_at: usize, count: usize, total: usize) -> Mock {
    let issues: Vec<Value> = (start_at..start_at + count).map(issue_json).collect();
    server
        .mock("GET", "/rest/api/3/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("startAt".into(), start_at.to_string()),
            Matcher::UrlEncoded("maxResults".into(), "100".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "startAt": start_at,
                "maxResults": 100,
                "total": total,
                "issues": issues
            })
            .to_string(),
        )
        .create_async()
        .await
}

fn setup() -> (Arc<InMemoryStore>, ActivityContext, ActivityRegistry) {
    let store = Arc::new(InMemoryStore::new());
    let ctx = ActivityContext::new(store.clone());
    (store, ctx, ActivityRegistry::with_builtins())
}

#[tokio::test]
async fn fetch_all_issues_walks_every_page() {
    let mut server = Server::new_async().await;
    let pages = vec![
        search_page(&mut server, 0, 100, 250).await,
        search_page(&mut server, 100, 100, 250).await,
        search_page(&mut server, 200, 50, 250).await,
    ];
    let (store, ctx, registry) = setup();

    let out = registry
        .invoke(
            activities::FETCH_ALL_ISSUES,
            input(&server, json!({"project": "ENG"})),
            &ctx,
        )
        .await
        .unwrap();
    let out: FetchAllOutput = serde_json::from_value(out).unwrap();

    for page in pages {
        page.assert_async().await;
    }
    assert_eq!(out.count, 250);
    assert_eq!(out.page_count, 3);
    assert_eq!(out.final_cursor, "");

    let docs = store.load_documents(&out.data_ref).await.unwrap().unwrap();
    assert_eq!(docs.len(), 250);
    assert_eq!(docs[0].id, "ENG-0");
    assert_eq!(docs[249].id, "ENG-249");
    assert!(docs.iter().all(|d| d.source == "jira"));
    assert_eq!(store.batch_count(), 1);
}

#[tokio::test]
async fn fetch_all_issues_resumes_and_stops_at_max_pages() {
    let mut server = Server::new_async().await;
    let second = search_page(&mut server, 100, 100, 250).await;
    let (store, ctx, _) = setup();

    let input: FetchAllIssuesInput = serde_json::from_value(input(
        &server,
        json!({"project": "ENG", "cursor": "100", "max_pages": 1}),
    ))
    .unwrap();
    let out = activities::fetch_all_issues(&ctx, input).await.unwrap();

    second.assert_async().await;
    assert_eq!(out.count, 100);
    assert_eq!(out.page_count, 1);
    assert_eq!(out.final_cursor, "200");

    let docs = store.load_documents(&out.data_ref).await.unwrap().unwrap();
    assert_eq!(docs[0].id, "ENG-100");
}

#[tokio::test]
async fn fetch_all_issues_rejects_a_bad_cursor_without_calling_jira() {
    let mut server = Server::new_async().await;
    let never = server
        .mock("GET", "/rest/api/3/search")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let (store, ctx, registry) = setup();

    let err = registry
        .invoke(
            activities::FETCH_ALL_ISSUES,
            input(&server, json!({"project": "ENG", "cursor": "abc"})),
            &ctx,
        )
        .await
        .unwrap_err();

    never.assert_async().await;
    assert!(format!("{:#}", err).contains("abc"), "{err:#}");
    assert_eq!(store.batch_count(), 0);
}

#[tokio::test]
async fn search_all_jql_surfaces_mid_run_failures_and_stores_nothing() {
    let mut server = Server::new_async().await;
    let _first = search_page(&mut server, 0, 100, 250).await;
    let _second = server
        .mock("GET", "/rest/api/3/search")
        .match_query(Matcher::UrlEncoded("startAt".into(), "100".into()))
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;
    let (store, ctx, registry) = setup();

    let err = registry
        .invoke(
            activities::SEARCH_ALL_JQL,
            input(&server, json!({"jql": "project = ENG"})),
            &ctx,
        )
        .await
        .unwrap_err();

    let msg = format!("{:#}", err);
    assert!(msg.contains("paginate"), "{msg}");
    assert!(msg.contains("503"), "{msg}");
    assert!(msg.contains("Service Unavailable"), "{msg}");
    assert_eq!(store.batch_count(), 0);
}

#[tokio::test]
async fn search_jql_stores_only_the_first_page() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/rest/api/3/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("jql".into(), "labels = backend".into()),
            Matcher::UrlEncoded("startAt".into(), "0".into()),
            Matcher::UrlEncoded("maxResults".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "total": 10,
                "issues": [issue_json(1), issue_json(2)]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let (store, ctx, registry) = setup();

    let out = registry
        .invoke(
            activities::SEARCH_JQL,
            input(&server, json!({"jql": "labels = backend", "max_results": 2})),
            &ctx,
        )
        .await
        .unwrap();
    let out: PageOutput = serde_json::from_value(out).unwrap();

    first.assert_async().await;
    assert_eq!(out.count, 2);
    assert_eq!(out.total, 10);
    assert_eq!(out.data_ref.backend, "memory");
    assert_eq!(store.load_documents(&out.data_ref).await.unwrap().unwrap().len(), 2);
}

#[tokio::test]
async fn fetch_issues_compiles_the_project_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/rest/api/3/search")
        .match_query(Matcher::UrlEncoded(
            "jql".into(),
            "project = ENG AND updated >= '2024-01-01 00:00' ORDER BY updated DESC".into(),
        ))
        .with_status(200)
        .with_body(json!({"total": 1, "issues": [issue_json(1)]}).to_string())
        .create_async()
        .await;
    let (_, ctx, registry) = setup();

    let out = registry
        .invoke(
            activities::FETCH_ISSUES,
            input(
                &server,
                json!({"project": "ENG", "since": "2024-01-01T00:00:00Z"}),
            ),
            &ctx,
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(out["count"], 1);
    assert!(out["ref"]["id"].is_string());
}

#[tokio::test]
async fn fetch_issue_normalizes_and_reports_missing() {
    let mut server = Server::new_async().await;
    let _found = server
        .mock("GET", "/rest/api/3/issue/ENG-5")
        .with_status(200)
        .with_body(issue_json(5).to_string())
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/rest/api/3/issue/ENG-404")
        .with_status(404)
        .create_async()
        .await;
    let (store, ctx, registry) = setup();

    let found: FetchIssueOutput = serde_json::from_value(
        registry
            .invoke(
                activities::FETCH_ISSUE,
                input(&server, json!({"issue_key": "ENG-5"})),
                &ctx,
            )
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(found.found);
    let doc = found.document.unwrap();
    assert_eq!(doc.id, "ENG-5");
    assert_eq!(doc.title, "Issue 5");
    assert_eq!(doc.metadata["status"], "Open");

    let missing: FetchIssueOutput = serde_json::from_value(
        registry
            .invoke(
                activities::FETCH_ISSUE,
                input(&server, json!({"issue_key": "ENG-404"})),
                &ctx,
            )
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(!missing.found);
    assert!(missing.document.is_none());
    assert_eq!(store.batch_count(), 0);
}

#[tokio::test]
async fn fetch_issue_errors_carry_the_operation_label() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/rest/api/3/issue/ENG-1")
        .with_status(401)
        .with_body("Unauthorized")
        .create_async()
        .await;
    let (_, ctx, _) = setup();

    let creds: Credentials = serde_json::from_value(credentials(&server)).unwrap();
    let err = activities::fetch_issue(
        &ctx,
        activities::FetchIssueInput {
            credentials: creds,
            issue_key: "ENG-1".to_string(),
        },
    )
    .await
    .unwrap_err();

    let msg = format!("{:#}", err);
    assert!(msg.starts_with("get issue"), "{msg}");
    assert!(msg.contains("status=401"), "{msg}");
}
