#![allow(dead_code)]

use blog_api::config::Config;
use blog_api::db::Pool;
use blog_api::group::NewGroup;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const PASSWORD: &str = "s3cret-pass";

pub struct TestApp {
    pub client: Client,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> TestApp {
        TestApp::with_config(|_| {})
    }

    pub fn with_config<F: FnOnce(&mut Config)>(customize: F) -> TestApp {
        let dir = TempDir::new().expect("temp dir");
        let database = dir.path().join("blog-test.sqlite3");
        let mut config = Config::new(database.to_string_lossy(), "integration-test-secret");
        config.pool_size = 4;
        customize(&mut config);

        let rocket = blog_api::rocket(config).expect("valid rocket instance");
        let client = Client::tracked(rocket).expect("valid client");
        TestApp { client, _dir: dir }
    }

    pub fn group(&self, title: &str, slug: &str) -> i32 {
        let pool = self.client.rocket().state::<Pool>().expect("managed pool");
        let mut conn = pool.get().expect("connection");
        NewGroup {
            title,
            slug,
            description: "",
        }
        .insert(&mut conn)
        .expect("group inserted")
        .id
    }

    pub fn register(&self, username: &str) -> LocalResponse<'_> {
        self.post(
            "/v1/auth/users/",
            None,
            json!({ "username": username, "password": PASSWORD }),
        )
    }

    pub fn tokens(&self, username: &str, password: &str) -> Value {
        let response = self.post(
            "/v1/jwt/create/",
            None,
            json!({ "username": username, "password": password }),
        );
        assert_eq!(response.status(), Status::Ok);
        response.into_json::<Value>().expect("token body")
    }

    /// Registers `username` and returns an access token for it.
    pub fn user(&self, username: &str) -> String {
        assert_eq!(self.register(username).status(), Status::Created);
        self.tokens(username, PASSWORD)["access"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    pub fn get(&self, uri: &str, token: Option<&str>) -> LocalResponse<'_> {
        let mut request = self.client.get(uri.to_string());
        if let Some(token) = token {
            request = request.header(bearer(token));
        }
        request.dispatch()
    }

    pub fn post(&self, uri: &str, token: Option<&str>, body: Value) -> LocalResponse<'_> {
        self.send(self.client.post(uri.to_string()), token, body)
    }

    pub fn put(&self, uri: &str, token: Option<&str>, body: Value) -> LocalResponse<'_> {
        self.send(self.client.put(uri.to_string()), token, body)
    }

    pub fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> LocalResponse<'_> {
        self.send(self.client.patch(uri.to_string()), token, body)
    }

    pub fn delete(&self, uri: &str, token: Option<&str>) -> LocalResponse<'_> {
        let mut request = self.client.delete(uri.to_string());
        if let Some(token) = token {
            request = request.header(bearer(token));
        }
        request.dispatch()
    }

    pub fn delete_with(&self, uri: &str, token: Option<&str>, body: Value) -> LocalResponse<'_> {
        self.send(self.client.delete(uri.to_string()), token, body)
    }

    fn send<'c>(
        &'c self,
        request: rocket::local::blocking::LocalRequest<'c>,
        token: Option<&str>,
        body: Value,
    ) -> LocalResponse<'c> {
        let mut request = request.header(ContentType::JSON).body(body.to_string());
        if let Some(token) = token {
            request = request.header(bearer(token));
        }
        request.dispatch()
    }
}

pub fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token))
}

pub fn json_body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().expect("json body")
}
