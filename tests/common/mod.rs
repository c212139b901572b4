#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use clap::Parser;
use http_body_util::BodyExt;
use tower::ServiceExt;

use blog_app::database::{self, DynStore};
use blog_app::{app, seed, AppState, Config};

pub const COOKIE_NAME: &str = "my_session";

/// In-process client for the full router. Carries the session cookie from
/// one request to the next like a browser would.
pub struct TestApp {
    router: Router,
    cookie: Option<String>,
    config: Config,
    pub store: DynStore,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body should be json")
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_args(&[]).await
    }

    /// Extra command-line flags on top of the memory backend and a fixed secret.
    pub async fn with_args(extra: &[&str]) -> Self {
        let store = database::open("memory://").await.unwrap();
        let mut args = vec![
            "blog_app",
            "--db-url",
            "memory://",
            "--session-secret",
            "test-secret",
        ];
        args.extend_from_slice(extra);
        let config = Config::try_parse_from(args).unwrap();
        let router = app(AppState::new(store.clone(), config.clone()));
        Self {
            router,
            cookie: None,
            config,
            store,
        }
    }

    /// Bob (id 1, password `pass`) with posts 1 and 2.
    pub async fn seeded() -> Self {
        let app = Self::new().await;
        seed::reset_demo_data(app.store.as_ref()).await.unwrap();
        app
    }

    /// A second browser on the same server, starting anonymous.
    pub fn fresh_browser(&self) -> Self {
        Self {
            router: self.router.clone(),
            cookie: None,
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }

    /// The same browser talking to a newly built server over the same database.
    pub fn restarted(&self) -> Self {
        Self {
            router: app(AppState::new(self.store.clone(), self.config.clone())),
            cookie: self.cookie.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }

    pub async fn request(&mut self, method: Method, uri: &str, form: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            let pair = value.split(';').next().unwrap().trim();
            if !pair.starts_with(&format!("{COOKIE_NAME}=")) {
                continue;
            }
            let expired = value.to_ascii_lowercase().contains("max-age=0");
            self.cookie = if expired || pair.len() == COOKIE_NAME.len() + 1 {
                None
            } else {
                Some(pair.to_string())
            };
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post_form(&mut self, uri: &str, form: &str) -> TestResponse {
        self.request(Method::POST, uri, Some(form)).await
    }

    pub async fn put_form(&mut self, uri: &str, form: &str) -> TestResponse {
        self.request(Method::PUT, uri, Some(form)).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        let form = serde_urlencoded::to_string([("email", email), ("password", password)]).unwrap();
        self.post_form("/login", &form).await
    }

    pub async fn register(&mut self, email: &str, password: &str, name: &str) -> TestResponse {
        let form =
            serde_urlencoded::to_string([("email", email), ("password", password), ("name", name)])
                .unwrap();
        self.post_form("/users", &form).await
    }

    pub fn has_session_cookie(&self) -> bool {
        self.cookie.is_some()
    }
}
