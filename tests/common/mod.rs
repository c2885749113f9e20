use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use tripmate::mailer::LogMailer;

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
}

impl TestApp {
    pub async fn new() -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("Failed to create in-memory SQLite pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let router = tripmate::build_app(pool.clone(), false, Arc::new(LogMailer)).await;

        Self { router, db: pool }
    }

    /// Send a request through the app and return the response.
    pub async fn request(&self, req: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    /// Log in as the given user and return the session cookie string.
    pub async fn login(&self, email: &str, name: &str) -> String {
        let resp = self
            .post_json("/login", &json!({ "email": email, "name": name }), None)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);

        resp.headers()
            .get("set-cookie")
            .expect("Login should set a session cookie")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    /// Send a GET request with an optional session cookie.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }

    /// Send a JSON request with the given method and optional session cookie.
    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        body: &Value,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder()
            .uri(uri)
            .method(method)
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.request(req).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value, cookie: Option<&str>) -> Response {
        self.send_json("POST", uri, body, cookie).await
    }

    pub async fn patch_json(&self, uri: &str, body: &Value, cookie: Option<&str>) -> Response {
        self.send_json("PATCH", uri, body, cookie).await
    }

    /// Send a DELETE request with an optional session cookie.
    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri).method("DELETE");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }

    /// Create a trip as the given session and return its id.
    pub async fn create_trip(&self, cookie: &str, title: &str) -> String {
        let resp = self
            .post_json(
                "/trips",
                &json!({ "title": title, "destination": "Lisbon, Portugal" }),
                Some(cookie),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let detail = body_json(resp).await;
        detail["trip"]["id"].as_str().unwrap().to_string()
    }

    /// Invite `email` to the trip as the given session and return the token.
    pub async fn invite(&self, cookie: &str, trip_id: &str, email: &str, role: &str) -> String {
        let resp = self
            .post_json(
                &format!("/trips/{trip_id}/invites"),
                &json!({ "email": email, "role": role }),
                Some(cookie),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let invite = body_json(resp).await;
        invite["token"].as_str().unwrap().to_string()
    }
}

/// Read the full response body as parsed JSON.
pub async fn body_json(resp: Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Assert the response carries the given status and return its JSON error
/// message.
pub async fn assert_error(resp: Response, status: StatusCode) -> String {
    assert_eq!(resp.status(), status);
    let body = body_json(resp).await;
    body["error"].as_str().unwrap_or_default().to_string()
}
