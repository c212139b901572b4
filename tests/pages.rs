mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn home_lists_posts_in_id_order() {
    let mut app = TestApp::seeded().await;
    let response = app.get("/").await;
    assert_eq!(response.status, StatusCode::OK);

    let first = response.body.find("Post 1").expect("post 1 listed");
    let second = response.body.find("Post 2").expect("post 2 listed");
    assert!(first < second);
    assert!(response.body.contains("href=\"/p/post-1\""));
    assert!(response.body.contains("href=\"/posts/2\""));
}

#[tokio::test]
async fn home_hides_new_post_form_from_anonymous() {
    let mut app = TestApp::seeded().await;
    let body = app.get("/").await.body;
    assert!(!body.contains("action=\"/posts\""));
    assert!(body.contains("href=\"/login\""));
}

#[tokio::test]
async fn users_listing_is_public() {
    let mut app = TestApp::seeded().await;
    let response = app.get("/users").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Bob"));
    assert!(response.body.contains("bob@domain.com"));
    assert!(!response.body.contains("argon2"));
}

#[tokio::test]
async fn post_detail_by_id_and_slug() {
    let mut app = TestApp::seeded().await;

    let by_id = app.get("/posts/1").await;
    assert_eq!(by_id.status, StatusCode::OK);
    assert!(by_id.body.contains("Lorem ipsum lorem ipsum"));
    assert!(by_id.body.contains("<title>Post 1 more custom</title>"));

    let by_slug = app.get("/p/post-2").await;
    assert_eq!(by_slug.status, StatusCode::OK);
    assert!(by_slug.body.contains("This is my second post"));
}

#[tokio::test]
async fn missing_posts_are_404_pages() {
    let mut app = TestApp::seeded().await;
    for uri in ["/posts/99", "/posts/abc", "/p/no-such-post"] {
        let response = app.get(uri).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{uri}");
        assert!(response.body.contains("This is not found"), "{uri}");
    }
}

#[tokio::test]
async fn profile_requires_login_and_preserves_target() {
    let mut app = TestApp::seeded().await;
    let response = app.get("/users/1").await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), Some("/login?next=%2Fusers%2F1"));
}

#[tokio::test]
async fn profile_shows_user_and_their_posts() {
    let mut app = TestApp::seeded().await;
    app.login("bob@domain.com", "pass").await;

    let response = app.get("/users/1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("<title>Bob profile page</title>"));
    assert!(response.body.contains("Post 1"));
    assert!(response.body.contains("Post 2"));
    assert!(response.body.contains("delete_user"));
}

#[tokio::test]
async fn missing_profile_is_404() {
    let mut app = TestApp::seeded().await;
    app.login("bob@domain.com", "pass").await;

    let response = app.get("/users/42").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("User not found"));
}

#[tokio::test]
async fn forms_redirect_home_once_logged_in() {
    let mut app = TestApp::seeded().await;
    assert_eq!(app.get("/login").await.status, StatusCode::OK);
    assert_eq!(app.get("/register").await.status, StatusCode::OK);

    app.login("bob@domain.com", "pass").await;
    for uri in ["/login", "/register"] {
        let response = app.get(uri).await;
        assert!(response.status.is_redirection(), "{uri}");
        assert_eq!(response.location(), Some("/"), "{uri}");
    }
}

#[tokio::test]
async fn create_post_appends_to_home() {
    let mut app = TestApp::seeded().await;
    app.login("bob@domain.com", "pass").await;

    let response = app.post_form("/posts", "Title=Hello+World%21&Body=First").await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), Some("/"));

    let post = app.store.post_by_id(3).await.unwrap().unwrap();
    assert_eq!(post.url, "hello-world");
    assert_eq!(post.user_id, 1);

    let detail = app.get("/p/hello-world").await;
    assert_eq!(detail.status, StatusCode::OK);
    assert!(detail.body.contains("First"));
}

#[tokio::test]
async fn create_post_with_empty_title_rerenders() {
    let mut app = TestApp::seeded().await;
    app.login("bob@domain.com", "pass").await;

    let response = app.post_form("/posts", "Title=&Body=text").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Title cannot be empty"));
    assert_eq!(app.store.list_posts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn create_post_requires_login() {
    let mut app = TestApp::seeded().await;
    let response = app.post_form("/posts", "Title=Sneaky&Body=x").await;
    assert!(response.status.is_redirection());
    assert_eq!(response.location(), Some("/login?next=%2Fposts"));
    assert_eq!(app.store.list_posts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn healthcheck_reports_ok() {
    let mut app = TestApp::new().await;
    let response = app.get("/api/healthcheck").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ok");
}

#[tokio::test]
async fn not_found_page_has_no_account_links() {
    let mut app = TestApp::seeded().await;
    app.login("bob@domain.com", "pass").await;

    let response = app.get("/posts/99").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!response.body.contains("href=\"/login\""));
    assert!(response.body.contains("href=\"/\""));
}
