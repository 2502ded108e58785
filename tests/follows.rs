mod common;

use common::{json_body, TestApp};
use rocket::http::Status;
use serde_json::{json, Value};

fn follow(app: &TestApp, token: &str, username: &str) -> Status {
    app.post("/v1/follow/", Some(token), json!({ "following": username }))
        .status()
}

fn followees(app: &TestApp, uri: &str, token: &str) -> Vec<String> {
    let response = app.get(uri, Some(token));
    assert_eq!(response.status(), Status::Ok);
    json_body(response)
        .as_array()
        .unwrap()
        .iter()
        .map(|follow| follow["following"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn follow_requires_authentication() {
    let app = TestApp::new();
    app.user("leo");

    assert_eq!(app.get("/v1/follow/", None).status(), Status::Unauthorized);
    let response = app.post("/v1/follow/", None, json!({ "following": "leo" }));
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn follower_comes_from_the_token() {
    let app = TestApp::new();
    let leo = app.user("leo");
    app.user("anna");
    app.user("boris");

    let response = app.post(
        "/v1/follow/",
        Some(&leo),
        json!({ "user": "boris", "following": "anna" }),
    );
    assert_eq!(response.status(), Status::Created);
    assert_eq!(
        json_body(response),
        json!({ "user": "leo", "following": "anna" })
    );
}

#[test]
fn bad_follows_are_rejected() {
    let app = TestApp::new();
    let leo = app.user("leo");
    app.user("anna");

    let response = app.post("/v1/follow/", Some(&leo), json!({ "following": "leo" }));
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(json_body(response)["following"][0], "You cannot follow yourself.");

    let response = app.post("/v1/follow/", Some(&leo), json!({ "following": "ghost" }));
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(
        json_body(response)["following"][0],
        "Object with username=ghost does not exist."
    );

    let response = app.post("/v1/follow/", Some(&leo), json!({}));
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(json_body(response)["following"][0], "This field is required.");

    assert_eq!(follow(&app, &leo, "anna"), Status::Created);
    let response = app.post("/v1/follow/", Some(&leo), json!({ "following": "anna" }));
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(
        json_body(response)["non_field_errors"][0],
        "The fields user, following must make a unique set."
    );
}

#[test]
fn list_shows_only_own_follows() {
    let app = TestApp::new();
    let leo = app.user("leo");
    let anna = app.user("anna");
    app.user("boris");

    assert_eq!(follow(&app, &leo, "anna"), Status::Created);
    assert_eq!(follow(&app, &leo, "boris"), Status::Created);
    assert_eq!(follow(&app, &anna, "leo"), Status::Created);

    assert_eq!(followees(&app, "/v1/follow/", &leo), vec!["anna", "boris"]);
    let response = app.get("/v1/follow/", Some(&anna));
    assert_eq!(
        json_body(response),
        json!([{ "user": "anna", "following": "leo" }])
    );
}

#[test]
fn search_matches_followee_names() {
    let app = TestApp::new();
    let leo = app.user("leo");
    app.user("anna");
    app.user("annette");
    app.user("boris");
    for name in ["anna", "annette", "boris"] {
        assert_eq!(follow(&app, &leo, name), Status::Created);
    }

    assert_eq!(
        followees(&app, "/v1/follow/?search=ANN", &leo),
        vec!["anna", "annette"]
    );
    assert_eq!(
        followees(&app, "/v1/follow/?search=ann%2Cette", &leo),
        vec!["annette"]
    );
    // A term matching the follower keeps every row.
    assert_eq!(followees(&app, "/v1/follow/?search=le", &leo).len(), 3);
    assert!(followees(&app, "/v1/follow/?search=zzz", &leo).is_empty());
    assert!(followees(&app, "/v1/follow/?search=%25", &leo).is_empty());

    let everything: Value = json_body(app.get("/v1/follow/?search=", Some(&leo)));
    assert_eq!(everything.as_array().map(Vec::len), Some(3));
}
