//! HTTP surface: auth gating, account flows, the edit guard, and error pages.

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use support::Harness;
use time::OffsetDateTime;
use tower::ServiceExt;

const BOUNDARY: &str = "quaderno-test-form";

fn multipart_text_body(text: &str) -> (String, String) {
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n{text}\r\n--{BOUNDARY}--\r\n"
    );
    (content_type, body)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 page")
}

#[tokio::test]
async fn auth_gated_routes_redirect_anonymous_callers_to_login() {
    let harness = Harness::new();
    let router = harness.router(None);

    for path in ["/create/", "/follow/"] {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(path)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "path {path}");
        assert_eq!(
            response
                .headers()
                .get(header::LOCATION)
                .expect("location")
                .to_str()
                .expect("ascii"),
            format!("/auth/login?next={path}")
        );
    }
}

#[tokio::test]
async fn unknown_paths_render_the_themed_not_found_page() {
    let harness = Harness::new();
    let router = harness.router(None);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/no/such/page")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_string(response).await;
    assert!(html.contains("Page not found"));
}

#[tokio::test]
async fn unknown_group_renders_not_found() {
    let harness = Harness::new();
    let router = harness.router(None);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/group/missing/")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn out_of_range_page_renders_not_found() {
    let harness = Harness::new();
    let author = harness.user("minimal").await;
    harness
        .store
        .seed_post_at(&author, None, "single post", OffsetDateTime::now_utc());
    let router = harness.router(None);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/?page=5")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signup_sets_a_session_cookie_and_signs_the_viewer_in() {
    let harness = Harness::new();
    let router = harness.router(None);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/signup")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "username=newcomer&password=sufficiently-long-password",
                ))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .expect("ascii")
        .to_string();
    assert!(cookie.starts_with("quaderno_session="));

    let token = cookie
        .trim_start_matches("quaderno_session=")
        .split(';')
        .next()
        .expect("token")
        .to_string();

    let home = router
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::COOKIE, format!("quaderno_session={token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let html = body_string(home).await;
    assert!(html.contains("newcomer"));
    assert!(html.contains("Log out"));
}

#[tokio::test]
async fn login_rejects_bad_credentials_with_a_field_error() {
    let harness = Harness::new();
    harness.user("careful").await;
    let router = harness.router(None);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=careful&password=wrong-password"))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("Unknown username or wrong password"));
}

#[tokio::test]
async fn only_the_author_can_revise_a_post() {
    let harness = Harness::new();
    let author = harness.user("owner").await;
    harness.user("intruder").await;
    let post_id = harness
        .store
        .seed_post_at(&author, None, "original text", OffsetDateTime::now_utc());
    let router = harness.router(None);

    let intruder_token = harness.token_for("intruder").await;
    let (content_type, body) = multipart_text_body("hijacked text");
    let blocked = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/posts/{post_id}/edit/"))
                .header(header::CONTENT_TYPE, &content_type)
                .header(
                    header::COOKIE,
                    format!("quaderno_session={intruder_token}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(blocked.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        blocked.headers().get(header::LOCATION).expect("location"),
        &format!("/posts/{post_id}/")
    );

    let untouched = harness.posts.detail(post_id).await.expect("detail");
    assert_eq!(untouched.post.text, "original text");

    let author_token = harness.token_for("owner").await;
    let (content_type, body) = multipart_text_body("revised by the author");
    let allowed = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/posts/{post_id}/edit/"))
                .header(header::CONTENT_TYPE, &content_type)
                .header(header::COOKIE, format!("quaderno_session={author_token}"))
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(allowed.status(), StatusCode::SEE_OTHER);

    let revised = harness.posts.detail(post_id).await.expect("detail");
    assert_eq!(revised.post.text, "revised by the author");
}

#[tokio::test]
async fn follow_route_redirects_to_the_follow_feed() {
    let harness = Harness::new();
    let author = harness.user("followed").await;
    harness.user("follower").await;
    harness
        .store
        .seed_post_at(&author, None, "notable post", OffsetDateTime::now_utc());
    let router = harness.router(None);
    let token = harness.token_for("follower").await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/profile/followed/follow/")
                .header(header::COOKIE, format!("quaderno_session={token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).expect("location"),
        "/follow/"
    );

    let feed = router
        .oneshot(
            Request::builder()
                .uri("/follow/")
                .header(header::COOKIE, format!("quaderno_session={token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let html = body_string(feed).await;
    assert!(html.contains("notable post"));
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let harness = Harness::new();
    let router = harness.router(None);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/_health/db")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}
