//! Integration tests for `Api` over `HyperAgent` using wiremock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert2::{check, let_assert};
use serde::{Deserialize, Serialize};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_string, header, method, path, query_param},
};
use wirecall::middleware::BearerAuth;
use wirecall::{
    Api, ApiConfig, ApiConfigBuilder, Call, Error, NamespaceConfig, Next, Request, ServiceConfig,
    ServiceSpec,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

fn api(server: &MockServer, config: ApiConfigBuilder) -> Api {
    Api::new(config.base_url(server.uri()).build()).expect("api")
}

#[tokio::test]
async fn test_post_with_path_params_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/foo/42"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"x": 1})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = api(
        &mock_server,
        ApiConfig::builder()
            .option("type", "json")
            .service("createFoo", ServiceSpec::new("/foo/:id").method("POST")),
    );

    let response = api
        .call("createFoo", Call::new().param("id", 42).data(json!({"x": 1})))
        .expect("call")
        .await
        .expect("response");

    check!(response.status() == 201);
    let body: serde_json::Value = response.json().expect("json");
    check!(body == json!({"ok": true}));
}

#[tokio::test]
async fn test_service_type_option_beats_global() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/profile"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string("name=alice"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = api(
        &mock_server,
        ApiConfig::builder().option("type", "json").service(
            "profile",
            ServiceSpec::new("profile").method("put").option("type", "form"),
        ),
    );

    let response = api
        .call("profile", Call::new().data(json!({"name": "alice"})))
        .expect("call")
        .await
        .expect("response");
    check!(response.status() == 204);
}

#[tokio::test]
async fn test_get_json_with_query_and_data() {
    let mock_server = MockServer::start().await;

    let user = User {
        id: 1,
        name: "Alice".to_string(),
    };

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .and(query_param("verbose", "true"))
        .and(query_param("fields", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&user))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = api(&mock_server, ApiConfig::builder().service("user", "/users/:id"));

    let response = api
        .call(
            "user",
            Call::new()
                .param("id", 1)
                .query("?verbose=true")
                .data(json!({"fields": "name"})),
        )
        .expect("call")
        .await
        .expect("response");

    let body: User = response.json().expect("json");
    check!(body == user);
}

#[tokio::test]
async fn test_error_status_rejects_with_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let api = api(&mock_server, ApiConfig::builder().service("missing", "/missing"));

    let error = api
        .call("missing", Call::new())
        .expect("call")
        .await
        .expect_err("404");

    check!(error.is_not_found());
    let_assert!(Some(response) = error.response());
    check!(response.text().expect("text") == "Not Found");
}

#[tokio::test]
async fn test_global_timeout_aborts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let api = api(
        &mock_server,
        ApiConfig::builder().option("timeout", 50).service("slow", "/slow"),
    );

    let error = api
        .call("slow", Call::new())
        .expect("call")
        .await
        .expect_err("timeout");

    check!(error.is_aborted());
    check!(error.is_timeout());
    check!(error.to_string().contains("timeout"));
}

#[tokio::test]
async fn test_abort_in_flight() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let api = api(&mock_server, ApiConfig::builder().service("slow", "/slow"));
    let pending = api.call("slow", Call::new()).expect("call");
    let handle = pending.abort_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
    });

    let error = pending.await.expect_err("aborted");
    check!(error.is_aborted());
    check!(!error.is_timeout());
}

#[tokio::test]
async fn test_runtime_headers_added_and_removed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    let api = api(
        &mock_server,
        ApiConfig::builder()
            .header("X-Client", "global")
            .service("me", ServiceSpec::new("/me").header("X-Client", "service")),
    );

    api.add_header("X-Session", "s1");
    api.add_header("X-Client", "runtime");
    api.call("me", Call::new()).expect("call").await.expect("first");

    check!(api.remove_header("x-session").as_deref() == Some("s1"));
    api.call("me", Call::new()).expect("call").await.expect("second");

    let requests = mock_server.received_requests().await.expect("recording");
    check!(requests.len() == 2);
    check!(requests[0].headers.get("x-session").map(|v| v.as_bytes()) == Some(b"s1".as_slice()));
    check!(requests[0].headers.get("x-client").map(|v| v.as_bytes()) == Some(b"service".as_slice()));
    check!(requests[1].headers.get("x-session").is_none());
}

#[tokio::test]
async fn test_verb_helpers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/items/7"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/items/7"))
        .and(body_json(json!({"done": true})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/absolute"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = Api::new(ApiConfig::builder().base_url("http://unused.invalid").build()).expect("api");
    let base = mock_server.uri();

    api.del(&format!("{base}/items/7"), Call::new().data(json!({"ignored": 1})))
        .expect("del")
        .await
        .expect("deleted");
    api.patch(&format!("{base}/items/7"), Call::new().data(json!({"done": true})))
        .expect("patch")
        .await
        .expect("patched");
    api.get(&format!("{base}/absolute"), Call::new())
        .expect("get")
        .await
        .expect("fetched");
}

#[tokio::test]
async fn test_status_handlers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/present"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let api = api(
        &mock_server,
        ApiConfig::builder()
            .service("missing", "/missing")
            .service("present", "/present"),
    );

    let not_found = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&not_found);
    api.status(404, move |request, outcome| {
        assert!(request.url().ends_with("/missing"));
        assert_eq!(outcome.status(), Some(404));
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .expect("status");

    api.call("present", Call::new()).expect("call").await.expect("200");
    check!(not_found.load(Ordering::SeqCst) == 0);

    let _ = api.call("missing", Call::new()).expect("call").await;
    check!(not_found.load(Ordering::SeqCst) == 1);
}

#[tokio::test]
async fn test_middleware_can_be_disabled_per_service() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let api = api(
        &mock_server,
        ApiConfig::builder()
            .service("private", "/private")
            .service("public", ServiceSpec::new("/public").use_middleware(BearerAuth::NAME, false)),
    );
    api.register(BearerAuth::NAME, BearerAuth::new("secret")).expect("auth");

    api.call("private", Call::new()).expect("call").await.expect("private");
    api.call("public", Call::new()).expect("call").await.expect("public");

    let requests = mock_server.received_requests().await.expect("recording");
    let authorization = |index: usize| {
        requests[index]
            .headers
            .get("authorization")
            .map(|v| v.to_str().unwrap_or_default().to_string())
    };
    check!(authorization(0).as_deref() == Some("Bearer secret"));
    check!(authorization(1).is_none());
}

#[tokio::test]
async fn test_namespaced_service() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = api(
        &mock_server,
        ApiConfig::builder().namespace(
            "auth",
            NamespaceConfig {
                base_url: format!("{}/auth/", mock_server.uri()),
                services: HashMap::from([(
                    "login".to_string(),
                    ServiceConfig::from(ServiceSpec::new("/login").method("POST")),
                )]),
            },
        ),
    );

    let response = api
        .call("auth:login", Call::new().data(json!({"user": "alice"})))
        .expect("call")
        .await
        .expect("login");
    check!(response.status() == 200);
}

#[tokio::test]
async fn test_middleware_error_never_reaches_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let api = api(&mock_server, ApiConfig::builder().service("foo", "/foo"));
    api.register("deny", |_: &mut Request, _: &mut Next<'_>| -> wirecall::Result<()> {
        Err(Error::config("not allowed"))
    })
    .expect("deny");

    let pending = api.call("foo", Call::new()).expect("call");
    let_assert!(Err(Error::Middleware { name, .. }) = pending.await);
    check!(name == "deny");
}

#[tokio::test]
async fn test_browser_only_options_are_refused() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let download = api(
        &mock_server,
        ApiConfig::builder().service(
            "download",
            ServiceSpec::new("/file").option("responseType", "blob"),
        ),
    );
    let_assert!(Err(Error::UnsupportedOption(option)) = download.call("download", Call::new()));
    check!(option == "responseType");

    let credentials = api(
        &mock_server,
        ApiConfig::builder()
            .with_credentials(true)
            .service("file", "/file"),
    );
    let_assert!(Err(Error::UnsupportedOption(option)) = credentials.call("file", Call::new()));
    check!(option == "withCredentials");
}

#[tokio::test]
async fn test_zero_timeout_means_no_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = api(
        &mock_server,
        ApiConfig::builder().option("timeout", 0).service("slow", "/slow"),
    );

    let response = api.call("slow", Call::new()).expect("call").await.expect("response");
    check!(response.status() == 200);
}
