//! End-to-end bot runs against mock X and AI endpoints

use libgenie::{Config, GenieBot};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.x.access_token = Some("x-token".into());
    config.x.base_url = Some(server.uri());
    config.ai.api_key = Some("ai-key".into());
    config.ai.base_url = Some(server.uri());
    config.image.enabled = false;
    config.bot.with_image = false;
    config.retry.retry_delay_secs = 0;
    config.ledger.path = Some(temp.path().join("usage.json").to_string_lossy().to_string());
    config
}

async fn mount_completion(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        })))
        .mount(server)
        .await;
}

fn ledger(temp: &TempDir) -> Value {
    let content = std::fs::read_to_string(temp.path().join("usage.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn test_post_task_records_published_id() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    mount_completion(&server, "Your cache is a distributed system now.").await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "9001"}})))
        .expect(1)
        .mount(&server)
        .await;

    let mut bot = GenieBot::from_config(&config(&server, &temp)).unwrap();
    assert_eq!(bot.run_post_task().await.as_deref(), Some("9001"));

    let document = ledger(&temp);
    assert_eq!(document["posts"][0]["tweet_id"], "9001");
    assert!(document["rate_limit_lockout"].is_null());
}

#[tokio::test]
async fn test_throttled_publish_arms_lockout_on_disk() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    mount_completion(&server, "Short post.").await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let mut bot = GenieBot::from_config(&config(&server, &temp)).unwrap();
    assert!(bot.run_post_task().await.is_none());

    let document = ledger(&temp);
    assert!(document["posts"].as_array().unwrap().is_empty());
    assert!(document["rate_limit_lockout"].is_string());

    // A second bot over the same ledger refuses to publish
    let mut second = GenieBot::from_config(&config(&server, &temp)).unwrap();
    assert!(second.run_post_task().await.is_none());
}

#[tokio::test]
async fn test_failing_publish_exhausts_retries() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    mount_completion(&server, "Short post.").await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut bot = GenieBot::from_config(&config(&server, &temp)).unwrap();
    assert!(bot.run_post_task().await.is_none());
    assert_eq!(bot.rate_limiter().monthly_usage(), 0);
}

#[tokio::test]
async fn test_throttled_search_arms_lockout_on_disk() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let mut bot = GenieBot::from_config(&config(&server, &temp)).unwrap();
    assert!(bot.run_keyword_task().await.is_none());
    assert!(bot.rate_limiter().is_locked_out().is_locked());
    assert!(ledger(&temp)["rate_limit_lockout"].is_string());
}

#[tokio::test]
async fn test_throttled_authentication_pauses_run() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/2/users/me"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "1"}})))
        .expect(0)
        .mount(&server)
        .await;

    let mut bot = GenieBot::from_config(&config(&server, &temp)).unwrap();
    bot.run_all().await;
    assert!(ledger(&temp)["rate_limit_lockout"].is_string());
}

#[tokio::test]
async fn test_failed_authentication_still_posts() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    mount_completion(&server, "Short post.").await;
    Mock::given(method("GET"))
        .and(path("/2/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {"result_count": 0}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "9002"}})))
        .expect(1)
        .mount(&server)
        .await;

    let mut bot = GenieBot::from_config(&config(&server, &temp)).unwrap();
    bot.run_all().await;

    let document = ledger(&temp);
    assert_eq!(document["posts"][0]["tweet_id"], "9002");
    assert!(document["rate_limit_lockout"].is_null());
}

#[test]
fn test_missing_credentials_rejected() {
    let mut config = Config::default();
    config.ai.api_key = Some("ai-key".into());
    let err = GenieBot::from_config(&config).err().unwrap();
    assert!(err.to_string().contains("x.access_token"));
}
