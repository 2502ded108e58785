use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use lazy_static::lazy_static;
use regex::Regex;

use crate::db::schema::users;
use crate::db::Connection;
use crate::types::{ApiError, ValidationError};

const USERNAME_MAX_LENGTH: usize = 150;
const PASSWORD_MIN_LENGTH: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(&format!("(?i){}", pattern)).unwrap()
    };
    static ref USERNAME_RE: Regex = Regex::new(r"\A[\w.@+-]+\z").unwrap();
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from("email", "Enter a valid email address."))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if username.chars().count() > USERNAME_MAX_LENGTH {
        errors.add_error(
            "username",
            format!(
                "Ensure this field has no more than {} characters.",
                USERNAME_MAX_LENGTH
            ),
        );
    }
    if !USERNAME_RE.is_match(username) {
        errors.add_error(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    errors.into_result()
}

pub fn validate_username(
    username_to_validate: &str,
    connection: &mut Connection,
) -> Result<(), ApiError> {
    let mut errors = match validate_username_re(username_to_validate) {
        Ok(()) => ValidationError::default(),
        Err(e) => e,
    };
    let username_exists = select(exists(
        users::table.filter(users::username.eq(username_to_validate)),
    ))
    .get_result::<bool>(connection)?;

    if username_exists {
        errors.add_error("username", "A user with that username already exists.");
    }
    errors.into_result().map_err(ApiError::from)
}

/// Password rules; `field` names the payload key the errors are reported under.
pub fn validate_password(field: &str, password: &str) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.add_error(
            field,
            format!(
                "This password is too short. It must contain at least {} characters.",
                PASSWORD_MIN_LENGTH
            ),
        );
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.add_error(field, "This password is entirely numeric.");
    }
    errors.into_result()
}
