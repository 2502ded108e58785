mod common;

use common::{json_body, TestApp, PASSWORD};
use rocket::http::Status;
use serde_json::json;

#[test]
fn registration_returns_the_public_view() {
    let app = TestApp::new();
    let response = app.post(
        "/v1/auth/users/",
        None,
        json!({ "username": "leo", "password": PASSWORD, "email": "leo@example.com" }),
    );
    assert_eq!(response.status(), Status::Created);
    let user = json_body(response);
    assert_eq!(user["username"], "leo");
    assert_eq!(user["email"], "leo@example.com");
    assert!(user["id"].is_number());
    assert!(user.get("password").is_none());
}

#[test]
fn registration_is_validated() {
    let app = TestApp::new();
    assert_eq!(app.register("leo").status(), Status::Created);

    let response = app.register("leo");
    assert_eq!(response.status(), Status::BadRequest);
    assert!(json_body(response)["username"].is_array());

    let response = app.post(
        "/v1/auth/users/",
        None,
        json!({ "username": "bad name!", "password": "12345678" }),
    );
    assert_eq!(response.status(), Status::BadRequest);
    let errors = json_body(response);
    assert!(errors["username"].is_array());
    assert!(errors["password"].is_array());

    let response = app.post("/v1/auth/users/", None, json!({}));
    assert_eq!(response.status(), Status::BadRequest);
    let errors = json_body(response);
    assert_eq!(errors["username"][0], "This field is required.");
    assert_eq!(errors["password"][0], "This field is required.");
}

#[test]
fn token_pair_refreshes_and_verifies() {
    let app = TestApp::new();
    app.register("leo");
    let tokens = app.tokens("leo", PASSWORD);
    let access = tokens["access"].as_str().unwrap();
    let refresh = tokens["refresh"].as_str().unwrap();

    let response = app.post("/v1/jwt/refresh/", None, json!({ "refresh": refresh }));
    assert_eq!(response.status(), Status::Ok);
    let renewed = json_body(response)["access"].as_str().unwrap().to_string();

    let me = json_body(app.get("/v1/auth/users/me/", Some(&renewed)));
    assert_eq!(me["username"], "leo");

    for token in [access, refresh] {
        let response = app.post("/v1/jwt/verify/", None, json!({ "token": token }));
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(json_body(response), json!({}));
    }

    // An access token cannot be used to refresh, nor a refresh token to authenticate.
    let response = app.post("/v1/jwt/refresh/", None, json!({ "refresh": access }));
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(
        app.get("/v1/auth/users/me/", Some(refresh)).status(),
        Status::Unauthorized
    );

    let response = app.post("/v1/jwt/verify/", None, json!({ "token": "garbage" }));
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(json_body(response)["code"], "token_not_valid");
}

#[test]
fn tokens_need_valid_credentials() {
    let app = TestApp::new();
    app.register("leo");

    let response = app.post(
        "/v1/jwt/create/",
        None,
        json!({ "username": "leo", "password": "wrong-password" }),
    );
    assert_eq!(response.status(), Status::Unauthorized);

    let response = app.post(
        "/v1/jwt/create/",
        None,
        json!({ "username": "nobody", "password": PASSWORD }),
    );
    assert_eq!(response.status(), Status::Unauthorized);

    let response = app.post("/v1/jwt/create/", None, json!({ "username": "leo" }));
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(json_body(response)["password"][0], "This field is required.");
}

#[test]
fn users_see_only_themselves() {
    let app = TestApp::new();
    let leo = app.user("leo");
    let anna = app.user("anna");

    let listed = json_body(app.get("/v1/auth/users/", Some(&leo)));
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["username"], "leo");
    let leo_id = listed[0]["id"].as_i64().unwrap();

    let uri = format!("/v1/auth/users/{}/", leo_id);
    assert_eq!(app.get(&uri, Some(&leo)).status(), Status::Ok);
    assert_eq!(app.get(&uri, Some(&anna)).status(), Status::NotFound);
    assert_eq!(app.get("/v1/auth/users/me/", None).status(), Status::Unauthorized);
}

#[test]
fn email_can_be_changed() {
    let app = TestApp::new();
    let leo = app.user("leo");

    let response = app.patch(
        "/v1/auth/users/me/",
        Some(&leo),
        json!({ "email": "leo@example.com" }),
    );
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["email"], "leo@example.com");

    let response = app.put("/v1/auth/users/me/", Some(&leo), json!({ "email": "nope" }));
    assert_eq!(response.status(), Status::BadRequest);

    let me = json_body(app.get("/v1/auth/users/me/", Some(&leo)));
    assert_eq!(me["email"], "leo@example.com");
}

#[test]
fn password_change_needs_the_current_password() {
    let app = TestApp::new();
    let leo = app.user("leo");

    let response = app.post(
        "/v1/auth/users/set_password/",
        Some(&leo),
        json!({ "new_password": "another-pass", "current_password": "wrong" }),
    );
    assert_eq!(response.status(), Status::BadRequest);
    assert!(json_body(response)["current_password"].is_array());

    let response = app.post(
        "/v1/auth/users/set_password/",
        Some(&leo),
        json!({ "new_password": "another-pass", "current_password": PASSWORD }),
    );
    assert_eq!(response.status(), Status::NoContent);

    let tokens = app.tokens("leo", "another-pass");
    assert!(tokens["access"].is_string());
}

#[test]
fn deleted_account_loses_access() {
    let app = TestApp::new();
    let leo = app.user("leo");

    let response = app.delete_with(
        "/v1/auth/users/me/",
        Some(&leo),
        json!({ "current_password": "wrong" }),
    );
    assert_eq!(response.status(), Status::BadRequest);

    let response = app.delete_with(
        "/v1/auth/users/me/",
        Some(&leo),
        json!({ "current_password": PASSWORD }),
    );
    assert_eq!(response.status(), Status::NoContent);

    assert_eq!(
        app.get("/v1/auth/users/me/", Some(&leo)).status(),
        Status::Unauthorized
    );
}
