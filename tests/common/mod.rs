#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use pathway::{AppState, app, config::Config, gateway::MemoryGateway};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub gateway: MemoryGateway,
    router: Router,
}

pub struct Page {
    pub status: StatusCode,
    pub location: Option<String>,
    pub cookie: Option<String>,
    pub body: String,
}

impl TestApp {
    pub fn new() -> Self {
        let gateway = MemoryGateway::new();
        let state = AppState::new(Arc::new(gateway.clone()), Config::default());
        Self {
            router: app(state),
            gateway,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Page {
        let response: Response = self.router.clone().oneshot(request).await.unwrap();
        let value = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let status = response.status();
        let location = value(header::LOCATION);
        let cookie = value(header::SET_COOKIE).and_then(|c| c.split(';').next().map(str::to_owned));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        Page {
            status,
            location,
            cookie,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Page {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, form: &str, cookie: Option<&str>) -> Page {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(form.to_owned())).unwrap()).await
    }

    /// Posts one file field as `multipart/form-data`.
    pub async fn post_file(&self, uri: &str, field: &str, content_type: &str, bytes: &[u8], cookie: &str) -> Page {
        const BOUNDARY: &str = "pathway-test-boundary";
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Registers a user with a profile row and signs them in. Returns their id and the
    /// session cookie.
    pub async fn sign_in_as(&self, email: &str, role: &str) -> (Uuid, String) {
        let id = self.gateway.add_user(email, PASSWORD);
        self.gateway.seed(
            "profiles",
            [json!({ "id": id, "email": email, "full_name": "Amara Okafor", "role": role })],
        );

        let form = format!("email={}&password={}", email.replace('@', "%40"), PASSWORD.replace(' ', "+"));
        let page = self.post("/login", &form, None).await;
        assert_eq!(page.status, StatusCode::SEE_OTHER, "login failed: {}", page.body);
        (id, page.cookie.expect("login sets a session cookie"))
    }

    pub async fn sign_in(&self) -> (Uuid, String) {
        self.sign_in_as("amara@example.com", "client").await
    }

    pub fn seed_program(&self, name: &str, country: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.gateway.seed(
            "programs",
            [json!({
                "id": id,
                "name": name,
                "university": "University of Leeds",
                "country": country,
                "level": "master",
                "field": "Computing",
                "tuition_min": 24000,
                "featured": true,
            })],
        );
        id
    }
}
