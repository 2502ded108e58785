use diesel::prelude::*;
use diesel::{delete as diesel_delete, update as diesel_update};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest};
use rocket::serde::json::{Error as JsonError, Json};
use rocket::{Request, State};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::{Connection, DbConnection};
use crate::tokens::{self, TokenType};
use crate::types::{body, ApiCreated, ApiError, ApiResult, Validate, ValidationError};
use crate::utils::now;

pub mod models;
mod utils;

use self::models::{NewUser, User};
use self::utils::*;

pub type CurrentUser = Result<User, ApiError>;

const AUTH_HEADER_TYPE: &str = "Bearer";

/// The identity behind a request. Anonymous requests carry `None`; a request
/// with a bad token never gets this far.
#[derive(Debug)]
pub struct Requester(Option<User>);

impl Requester {
    pub fn anonymous() -> Self {
        Requester(None)
    }

    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }

    pub fn into_user(self) -> Option<User> {
        self.0
    }
}

impl From<User> for Requester {
    fn from(user: User) -> Self {
        Requester(Some(user))
    }
}

/// Pulls the token out of an `Authorization` header. Headers using another
/// scheme are not ours to judge and count as anonymous.
fn bearer_token(header: &str) -> Result<Option<&str>, ApiError> {
    let mut parts = header.split_whitespace();
    match parts.next() {
        Some(scheme) if scheme == AUTH_HEADER_TYPE => {}
        _ => return Ok(None),
    }
    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(Some(token)),
        _ => Err(ApiError::AuthenticationFailed(
            "Authorization header must contain two space-delimited values".into(),
        )),
    }
}

fn load_from_token(
    token: &str,
    config: &Config,
    connection: &mut Connection,
) -> Result<User, ApiError> {
    let claims = tokens::decode(token, &config.secret_key, Some(TokenType::Access))?;
    let user = User::load(claims.user_id, connection).map_err(|e| match e {
        ApiError::Diesel(diesel::result::Error::NotFound) => {
            ApiError::AuthenticationFailed("User not found".into())
        }
        other => other,
    })?;
    if !user.is_active {
        return Err(ApiError::AuthenticationFailed("User is inactive".into()));
    }
    Ok(user)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Requester {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match request.headers().get_one("Authorization").map(bearer_token) {
            None | Some(Ok(None)) => return Outcome::Success(Requester::anonymous()),
            Some(Ok(Some(token))) => token,
            Some(Err(e)) => return Outcome::Error((Status::Unauthorized, e)),
        };

        let config = match request.guard::<&State<Config>>().await {
            Outcome::Success(config) => config,
            _ => return Outcome::Error((Status::InternalServerError, ApiError::Internal)),
        };
        let mut connection = match request.guard::<DbConnection>().await {
            Outcome::Success(connection) => connection,
            _ => return Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        };

        match load_from_token(token, config, &mut connection) {
            Ok(user) => Outcome::Success(Requester::from(user)),
            Err(e) => {
                debug!(error = ?e, "authentication failed");
                Outcome::Error((e.status(), e))
            }
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match request.guard::<Requester>().await {
            Outcome::Success(requester) => match requester.into_user() {
                Some(user) => Outcome::Success(user),
                None => Outcome::Error((Status::Unauthorized, ApiError::NotAuthenticated)),
            },
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(status) => Outcome::Forward(status),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    username: Option<String>,
    password: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl Validate for Registration {
    type Output = NewUser;

    fn validate(self, connection: &mut Connection) -> Result<NewUser, ApiError> {
        let mut errors = ValidationError::default();

        match self.username.as_deref() {
            None => errors.merge(ValidationError::required("username")),
            Some("") => errors.add_error("username", "This field may not be blank."),
            Some(name) => match validate_username(name, connection) {
                Ok(_) => {}
                Err(ApiError::Validation(e)) => errors.merge(e),
                Err(other) => return Err(other),
            },
        }

        match self.password.as_deref() {
            None => errors.merge(ValidationError::required("password")),
            Some("") => errors.add_error("password", "This field may not be blank."),
            Some(password) => {
                if let Err(e) = validate_password("password", password) {
                    errors.merge(e);
                }
            }
        }

        let email = self.email.unwrap_or_default();
        if !email.is_empty() {
            if let Err(e) = validate_email_re(&email) {
                errors.merge(e);
            }
        }

        errors.into_result()?;
        Ok(NewUser {
            username: self.username.unwrap_or_default(),
            email,
            password: User::make_password(&self.password.unwrap_or_default())?,
            is_active: true,
            date_joined: now(),
        })
    }
}

#[post("/users", data = "<registration>")]
pub fn register(
    mut connection: DbConnection,
    registration: Result<Json<Registration>, JsonError<'_>>,
) -> ApiCreated<Value> {
    let new_user = body(registration)?.validate(&mut connection)?;
    let user = new_user.insert(&mut connection)?;
    info!(user_id = user.id, username = %user.username, "registered user");
    Ok((Status::Created, Json(json!(user.view()))))
}

/// Regular accounts only ever see themselves.
#[get("/users")]
pub fn list(user: CurrentUser) -> ApiResult<Value> {
    let user = user?;
    Ok(Json(json!([user.view()])))
}

#[get("/users/me")]
pub fn current(user: CurrentUser) -> ApiResult<Value> {
    let user = user?;
    Ok(Json(json!(user.view())))
}

#[get("/users/<id>", rank = 2)]
pub fn retrieve(user: CurrentUser, id: i32) -> ApiResult<Value> {
    let user = user?;
    if user.id != id {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!(user.view())))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    #[serde(default)]
    pub email: Option<String>,
}

fn update_current(
    user: CurrentUser,
    mut connection: DbConnection,
    update: Result<Json<UpdateUser>, JsonError<'_>>,
) -> ApiResult<Value> {
    let mut user = user?;
    let update = body(update)?;

    if let Some(new_email) = update.email {
        if !new_email.is_empty() {
            validate_email_re(&new_email)?;
        }
        user.email = new_email;
        diesel_update(&user).set(&user).execute(&mut *connection)?;
    }
    Ok(Json(json!(user.view())))
}

#[put("/users/me", data = "<update>")]
pub fn update(
    user: CurrentUser,
    connection: DbConnection,
    update: Result<Json<UpdateUser>, JsonError<'_>>,
) -> ApiResult<Value> {
    update_current(user, connection, update)
}

#[patch("/users/me", data = "<update>")]
pub fn partial_update(
    user: CurrentUser,
    connection: DbConnection,
    update: Result<Json<UpdateUser>, JsonError<'_>>,
) -> ApiResult<Value> {
    update_current(user, connection, update)
}

#[derive(Debug, Deserialize)]
pub struct CurrentPassword {
    current_password: Option<String>,
}

fn check_current_password(user: &User, password: Option<&str>) -> Result<(), ApiError> {
    match password {
        None => Err(ValidationError::required("current_password").into()),
        Some(password) if user.verify_password(password)? => Ok(()),
        Some(_) => Err(ValidationError::from("current_password", "Invalid password.").into()),
    }
}

#[delete("/users/me", data = "<confirmation>")]
pub fn destroy(
    user: CurrentUser,
    mut connection: DbConnection,
    confirmation: Result<Json<CurrentPassword>, JsonError<'_>>,
) -> Result<Status, ApiError> {
    let user = user?;
    let confirmation = body(confirmation)?;
    check_current_password(&user, confirmation.current_password.as_deref())?;

    diesel_delete(&user).execute(&mut *connection)?;
    info!(user_id = user.id, "deleted user");
    Ok(Status::NoContent)
}

#[derive(Debug, Deserialize)]
pub struct SetPassword {
    new_password: Option<String>,
    current_password: Option<String>,
}

#[post("/users/set_password", data = "<change>")]
pub fn set_password(
    user: CurrentUser,
    mut connection: DbConnection,
    change: Result<Json<SetPassword>, JsonError<'_>>,
) -> Result<Status, ApiError> {
    let mut user = user?;
    let change = body(change)?;

    let mut errors = ValidationError::default();
    match change.new_password.as_deref() {
        None => errors.merge(ValidationError::required("new_password")),
        Some(password) => {
            if let Err(e) = validate_password("new_password", password) {
                errors.merge(e);
            }
        }
    }
    match check_current_password(&user, change.current_password.as_deref()) {
        Ok(()) => {}
        Err(ApiError::Validation(e)) => errors.merge(e),
        Err(other) => return Err(other),
    }
    errors.into_result()?;

    user.new_password(&change.new_password.unwrap_or_default())?;
    diesel_update(&user).set(&user).execute(&mut *connection)?;
    info!(user_id = user.id, "changed password");
    Ok(Status::NoContent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_split() {
        assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Token abc").unwrap(), None);
        assert_eq!(bearer_token("").unwrap(), None);
    }

    #[test]
    fn malformed_bearer_header_fails() {
        assert!(bearer_token("Bearer").is_err());
        assert!(bearer_token("Bearer a b").is_err());
    }
}
