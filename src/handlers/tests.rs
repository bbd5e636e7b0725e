use crate::{config::AppConfig, store::LinkStore, AppState};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, Response, StatusCode},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<LinkStore>,
    _dir: TempDir,
}

async fn test_app(base_url: Option<&str>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let data_file = dir.path().join("links.json");
    let (store, _requests) = LinkStore::load(&data_file).await;
    let store = Arc::new(store);

    let config = AppConfig {
        host: "127.0.0.1".into(),
        port: 8974,
        data_file,
        autosave_interval: Duration::from_secs(30),
        base_url: base_url.map(str::to_owned),
        top_default_limit: 50,
    };
    let state = Arc::new(AppState {
        config,
        store: store.clone(),
    });

    TestApp {
        router: crate::build_router(state),
        store,
        _dir: dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, ip: &str) -> Response<Body> {
        self.send(
            Request::get(uri)
                .header(header::HOST, "sho.rt")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn post_form(&self, uri: &str, ip: &str, form: &str) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(header::HOST, "sho.rt")
                .header("x-forwarded-for", ip)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_owned()))
                .unwrap(),
        )
        .await
    }

    /// Shorten through HTTP and return the new code.
    async fn shorten(&self, url: &str, ip: &str) -> String {
        let resp = self.post_form("/shorten", ip, &format!("url={url}")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        result_url(&resp)
            .rsplit('/')
            .next()
            .unwrap()
            .to_owned()
    }
}

/// The short URL carried by a `/?result=` redirect, decoded.
fn result_url(resp: &Response<Body>) -> String {
    let location = location(resp);
    let encoded = location.strip_prefix("/?result=").unwrap();
    urlencoding::decode(encoded).unwrap().into_owned()
}

fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned()
}

async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn shorten_redirects_home_with_the_short_url() {
    let app = test_app(None).await;

    let resp = app.post_form("/shorten", "1.1.1.1", "url=example.com").await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).starts_with("/?result=https%3A%2F%2Fsho.rt%2F"));
    let short_url = result_url(&resp);
    let code = short_url.strip_prefix("https://sho.rt/").unwrap();
    assert_eq!(code.len(), 6);
    assert_eq!(app.store.list_by_owner("1.1.1.1").await[0].short_code, code);
}

#[tokio::test]
async fn short_code_redirects_with_302_and_counts_the_visit() {
    let app = test_app(None).await;
    let code = app.shorten("example.com", "1.1.1.1").await;

    let resp = app.get(&format!("/{code}"), "9.9.9.9").await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "https://example.com");
    assert_eq!(app.store.top(1).await[0].visits, 1);
}

#[tokio::test]
async fn unknown_code_renders_home_with_404() {
    let app = test_app(None).await;

    let resp = app.get("/zzzzzz", "1.1.1.1").await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_text(resp).await;
    assert!(body.contains("does not exist"));
    assert!(body.contains("action=\"/shorten\""));
}

#[tokio::test]
async fn blank_url_goes_back_home_without_creating() {
    let app = test_app(None).await;

    let resp = app.post_form("/shorten", "1.1.1.1", "url=+++").await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    assert_eq!(app.store.summary().await.total_links, 0);
}

#[tokio::test]
async fn get_shorten_redirects_home() {
    let app = test_app(None).await;
    let resp = app.get("/shorten", "1.1.1.1").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn home_echoes_only_http_results() {
    let app = test_app(None).await;

    let body = body_text(app.get("/?result=https://sho.rt/abcdef", "1.1.1.1").await).await;
    assert!(body.contains("Your short link"));
    assert!(body.contains("abcdef"));

    let body = body_text(app.get("/?result=javascript:alert(1)", "1.1.1.1").await).await;
    assert!(!body.contains("Your short link"));
    assert!(!body.contains("alert(1)"));
}

#[tokio::test]
async fn my_links_lists_only_the_requesters_links() {
    let app = test_app(None).await;
    let mine = app.shorten("example.com", "1.1.1.1").await;
    let theirs = app.shorten("rust-lang.org", "2.2.2.2").await;

    let resp = app.get("/my", "1.1.1.1").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains(&mine));
    assert!(!body.contains(&theirs));
}

#[tokio::test]
async fn delete_from_another_ip_changes_nothing() {
    let app = test_app(None).await;
    let code = app.shorten("example.com", "1.1.1.1").await;

    let resp = app.post_form(&format!("/delete/{code}"), "2.2.2.2", "").await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/my");
    assert_eq!(app.get(&format!("/{code}"), "3.3.3.3").await.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn owner_can_delete_their_link() {
    let app = test_app(None).await;
    let code = app.shorten("example.com", "1.1.1.1").await;

    let resp = app.post_form(&format!("/delete/{code}"), "1.1.1.1", "").await;

    assert_eq!(location(&resp), "/my");
    assert_eq!(app.get(&format!("/{code}"), "1.1.1.1").await.status(), StatusCode::NOT_FOUND);
    assert!(!body_text(app.get("/my", "1.1.1.1").await).await.contains(&code));
}

#[tokio::test]
async fn owner_falls_back_to_peer_address() {
    let app = test_app(None).await;
    let mut request = Request::post("/shorten")
        .header(header::HOST, "sho.rt")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("url=example.com"))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo("192.0.2.44:51000".parse::<SocketAddr>().unwrap()));

    let resp = app.send(request).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.list_by_owner("192.0.2.44").await.len(), 1);
}

#[tokio::test]
async fn configured_base_url_overrides_host() {
    let app = test_app(Some("https://go.example")).await;

    let resp = app.post_form("/shorten", "1.1.1.1", "url=example.com").await;

    assert!(result_url(&resp).starts_with("https://go.example/"));
}

#[tokio::test]
async fn result_survives_a_base_url_with_query_characters() {
    let app = test_app(Some("https://go.example/s?from=a&b=c#x")).await;

    let resp = app.post_form("/shorten", "1.1.1.1", "url=example.com").await;

    let location = location(&resp);
    assert_eq!(location.matches('?').count(), 1);
    assert!(!location.contains('&'));
    assert!(!location.contains('#'));
    let short_url = result_url(&resp);
    assert!(short_url.starts_with("https://go.example/s?from=a&b=c#x/"));

    // The home page echoes the whole short URL back, not a truncated prefix.
    let body = body_text(app.get(&location, "1.1.1.1").await).await;
    assert!(body.contains("Your short link"));
    let code = short_url.rsplit('/').next().unwrap();
    assert!(body.contains(code));
}

#[tokio::test]
async fn top_honours_the_limit() {
    let app = test_app(None).await;
    for url in ["a.example", "b.example", "c.example"] {
        app.shorten(url, "1.1.1.1").await;
    }

    let limited = body_text(app.get("/top?limit=2", "1.1.1.1").await).await;
    assert_eq!(limited.matches("class=\"top-link\"").count(), 2);

    let all = body_text(app.get("/top?limit=0", "1.1.1.1").await).await;
    assert_eq!(all.matches("class=\"top-link\"").count(), 3);

    let fallback = body_text(app.get("/top?limit=lots", "1.1.1.1").await).await;
    assert_eq!(fallback.matches("class=\"top-link\"").count(), 3);
}

#[tokio::test]
async fn stats_shows_totals() {
    let app = test_app(None).await;
    let code = app.shorten("example.com", "1.1.1.1").await;
    app.shorten("rust-lang.org", "2.2.2.2").await;
    app.get(&format!("/{code}"), "3.3.3.3").await;
    app.get(&format!("/{code}"), "3.3.3.3").await;

    let resp = app.get("/stats", "1.1.1.1").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert_eq!(body.matches("<div class=\"stat-number\">2</div>").count(), 3);
    assert!(body.contains(&code));
}

#[tokio::test]
async fn health_is_ok() {
    let app = test_app(None).await;
    assert_eq!(app.get("/health", "1.1.1.1").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn public_pages_do_not_reveal_owner_ips() {
    let app = test_app(None).await;
    app.shorten("example.com", "203.0.113.7").await;

    for page in ["/top", "/stats"] {
        let body = body_text(app.get(page, "1.1.1.1").await).await;
        assert!(!body.contains("203.0.113.7"), "{page} shows the owner's IP");
    }
}
