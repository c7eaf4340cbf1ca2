//! End-to-end batch tests: fetch, rewrite and publish against mock servers.
//!
//! Every test wires a `Pipeline` to an in-memory database and points the
//! adapters at a local `wiremock` server.

use presswire::config::Config;
use presswire::pipeline::{
    BatchKind, BatchState, ItemOutcome, Pipeline, PipelineError, PipelineEvent, Tally,
};
use presswire::publish::{PostStatus, WordPressClient};
use presswire::rewrite::RewriteOptions;
use presswire::storage::{Credentials, Database};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use std::collections::HashSet;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_pipeline(server: &MockServer) -> Pipeline {
    let mut config = Config::default();
    config.http.allow_private_hosts = true;
    config.rewrite.api_base = format!("{}/v1", server.uri());
    config.rewrite.render_markdown = false;
    Pipeline::new(Database::open(":memory:").await.unwrap(), config).unwrap()
}

fn rss_with(count: usize) -> String {
    let items: String = (0..count)
        .map(|n| {
            format!(
                "<item><title>Post {n}</title><link>https://source.example/{n}</link>\
                 <description>{}</description></item>",
                format!("Body of post {n}. ").repeat(40)
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Source</title>
<link>https://source.example</link><description>d</description>{items}</channel></rss>"#
    )
}

async fn mount_feed(server: &MockServer, count: usize) {
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_with(count)))
        .mount(server)
        .await;
}

fn completion(text: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
}

// ============================================================================
// Fetch
// ============================================================================

#[tokio::test]
async fn test_feed_with_three_items() {
    let server = MockServer::start().await;
    mount_feed(&server, 3).await;
    let pipeline = test_pipeline(&server).await;

    let added = pipeline
        .fetch_feed(&format!("{}/feed.xml", server.uri()))
        .await
        .unwrap();
    assert_eq!(added, 3);

    let items = pipeline.library().list().await.unwrap();
    assert_eq!(items.len(), 3);
    let ids: HashSet<_> = items.iter().map(|i| i.id.clone()).collect();
    assert_eq!(ids.len(), 3);
    for item in &items {
        assert!(item.excerpt.chars().count() <= 203);
        assert!(item.excerpt.ends_with("..."));
        assert!(!item.selected);
    }
}

#[tokio::test]
async fn test_unreachable_feed_is_empty_feed_error() {
    let server = MockServer::start().await;
    let pipeline = test_pipeline(&server).await;

    let result = pipeline.fetch_feed("http://127.0.0.1:1/feed.xml").await;
    assert!(matches!(result, Err(PipelineError::EmptyFeed)));
    assert_eq!(pipeline.tracker(BatchKind::Fetch).state(), BatchState::Idle);
}

// ============================================================================
// Rewrite
// ============================================================================

#[tokio::test]
async fn test_rewrite_batch_where_one_item_fails() {
    let server = MockServer::start().await;
    mount_feed(&server, 4).await;

    // Item 2 is rejected upstream; every other request succeeds.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Body of post 2."))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "The server had an error while processing your request."}
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("<p>Rewritten</p>")))
        .with_priority(2)
        .mount(&server)
        .await;

    let pipeline = test_pipeline(&server).await;
    pipeline
        .fetch_feed(&format!("{}/feed.xml", server.uri()))
        .await
        .unwrap();
    pipeline.library().set_all(true).await.unwrap();

    let mut events = pipeline.events().subscribe();
    let summary = pipeline
        .rewrite_selected(RewriteOptions::default(), Some(SecretString::from("sk-test")))
        .await
        .unwrap();

    assert_eq!(summary.kind, BatchKind::Rewrite);
    assert_eq!(summary.tally, Tally { succeeded: 3, failed: 1 });
    let titles: Vec<_> = summary.reports.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Post 0", "Post 1", "Post 2", "Post 3"]);
    assert_eq!(
        summary.reports[2].outcome,
        ItemOutcome::Failure(
            "API error (status 500): The server had an error while processing your request."
                .to_string()
        )
    );

    let items = pipeline.library().list().await.unwrap();
    let rewritten: Vec<_> = items.iter().map(|i| i.reformed.is_some()).collect();
    assert_eq!(rewritten, vec![true, true, false, true]);

    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::ItemFinished { progress: p, .. } = event {
            progress.push(p);
        }
    }
    assert_eq!(progress, vec![25, 50, 75, 100]);
    assert_eq!(pipeline.tracker(BatchKind::Rewrite).state(), BatchState::Idle);
}

#[tokio::test]
async fn test_rewrite_preconditions_make_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("x")))
        .expect(0)
        .mount(&server)
        .await;
    mount_feed(&server, 1).await;

    let pipeline = test_pipeline(&server).await;
    pipeline
        .fetch_feed(&format!("{}/feed.xml", server.uri()))
        .await
        .unwrap();

    let result = pipeline
        .rewrite_selected(RewriteOptions::default(), None)
        .await;
    assert!(matches!(result, Err(PipelineError::MissingApiKey)));

    let result = pipeline
        .rewrite_selected(RewriteOptions::default(), Some(SecretString::from("sk")))
        .await;
    assert!(matches!(result, Err(PipelineError::NothingSelected)));
}

// ============================================================================
// Publish
// ============================================================================

#[tokio::test]
async fn test_full_flow_fetch_rewrite_publish() {
    let server = MockServer::start().await;
    mount_feed(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("<p>Fresh</p>")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(body_string_contains("\"content\":\"<p>Fresh</p>\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 501,
            "link": "https://blog.example.com/fresh"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let pipeline = test_pipeline(&server).await;
    pipeline
        .fetch_feed(&format!("{}/feed.xml", server.uri()))
        .await
        .unwrap();
    pipeline.library().set_all(true).await.unwrap();
    pipeline.database().save_api_key("sk-saved").await.unwrap();

    let rewrite = pipeline
        .rewrite_selected(RewriteOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(rewrite.tally, Tally { succeeded: 2, failed: 0 });

    let credentials = Credentials::new(format!("{}/", server.uri()), "editor", "app pass");
    assert!(pipeline.connect(&credentials).await.unwrap());

    let publish = pipeline.publish_selected(PostStatus::Draft).await.unwrap();
    assert_eq!(publish.kind, BatchKind::Publish);
    assert_eq!(publish.tally, Tally { succeeded: 2, failed: 0 });

    let history = pipeline.history().list().await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|p| p.post_id == 501));
    assert!(history.iter().all(|p| p.url == "https://blog.example.com/fresh"));
}

#[tokio::test]
async fn test_publish_rejection_is_reported_not_recorded() {
    let server = MockServer::start().await;
    mount_feed(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("<p>Fresh</p>")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("rest_not_logged_in"))
        .mount(&server)
        .await;

    let pipeline = test_pipeline(&server).await;
    pipeline
        .fetch_feed(&format!("{}/feed.xml", server.uri()))
        .await
        .unwrap();
    pipeline.library().set_all(true).await.unwrap();
    pipeline
        .rewrite_selected(RewriteOptions::default(), Some(SecretString::from("sk")))
        .await
        .unwrap();
    pipeline
        .database()
        .save_credentials(&Credentials::new(server.uri(), "editor", "wrong"))
        .await
        .unwrap();

    let summary = pipeline.publish_selected(PostStatus::Publish).await.unwrap();
    assert_eq!(summary.tally, Tally { succeeded: 0, failed: 1 });
    assert_eq!(
        summary.reports[0].outcome,
        ItemOutcome::Failure("Failed to publish: rest_not_logged_in".to_string())
    );
    assert!(pipeline.history().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_validate_connection_unreachable_site() {
    let client = WordPressClient::new(reqwest::Client::new());
    let credentials = Credentials::new("http://127.0.0.1:1", "editor", "pw");
    assert!(!client.validate_connection(&credentials).await);
}
