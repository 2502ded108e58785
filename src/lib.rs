#[macro_use]
extern crate rocket;
#[macro_use]
extern crate error_chain;

pub mod comment;
pub mod config;
pub mod db;
pub mod errors;
pub mod follow;
pub mod group;
pub mod pagination;
pub mod permissions;
pub mod post;
pub mod tokens;
pub mod types;
pub mod users;
pub mod utils;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;

fn detail(message: &str) -> Json<Value> {
    Json(json!({ "detail": message }))
}

#[catch(400)]
fn bad_request() -> Json<Value> {
    detail("Bad request.")
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    detail("Authentication credentials were not provided.")
}

#[catch(403)]
fn forbidden() -> Json<Value> {
    detail("You do not have permission to perform this action.")
}

#[catch(404)]
fn not_found() -> Json<Value> {
    detail("Not found.")
}

#[catch(422)]
fn unprocessable(_req: &Request) -> (Status, Json<Value>) {
    (Status::BadRequest, detail("Malformed request."))
}

#[catch(500)]
fn internal_error() -> Json<Value> {
    detail("Internal server error.")
}

#[catch(503)]
fn unavailable() -> Json<Value> {
    detail("Service temporarily unavailable, try again later.")
}

/// Builds the application: opens the pool, brings the schema up to date and
/// mounts every endpoint under `/v1`.
pub fn rocket(config: Config) -> errors::Result<Rocket<Build>> {
    let pool = db::init_pool(&config)?;
    db::run_migrations(&pool)?;
    info!(database = %config.database_url, "database ready");

    Ok(rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/v1",
            routes![
                group::list,
                group::get,
                group::create,
                post::list,
                post::get,
                post::create,
                post::update,
                post::partial_update,
                post::delete,
                comment::list,
                comment::get,
                comment::add,
                comment::update,
                comment::partial_update,
                comment::delete,
                follow::list,
                follow::create,
            ],
        )
        .mount(
            "/v1/jwt",
            routes![tokens::create, tokens::refresh, tokens::verify],
        )
        .mount(
            "/v1/auth",
            routes![
                users::register,
                users::list,
                users::current,
                users::retrieve,
                users::update,
                users::partial_update,
                users::destroy,
                users::set_password,
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                internal_error,
                unavailable,
            ],
        ))
}
