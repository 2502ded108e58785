use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::{Method, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::{Error as JsonError, Json};
use rocket::Request;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Error as IoError;
use tracing::error;

use crate::db::Connection;
use crate::utils::try_respond;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Checks an incoming payload against the database and turns it into
/// something the handler can write.
pub trait Validate
where
    Self: Sized,
{
    type Output;
    fn validate(self, connection: &mut Connection) -> Result<Self::Output, ApiError>;
}

#[derive(Debug)]
pub enum ApiError {
    Diesel(DieselError),
    Validation(ValidationError),
    /// The request body could not be read as the expected JSON shape.
    Malformed(String),
    NotAuthenticated,
    AuthenticationFailed(String),
    InvalidToken(String),
    Forbidden,
    NotFound,
    MethodNotAllowed(Method),
    Internal,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        ApiError::Diesel(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

impl From<IoError> for ApiError {
    fn from(_: IoError) -> ApiError {
        ApiError::Internal
    }
}

impl<'a> From<JsonError<'a>> for ApiError {
    fn from(err: JsonError<'a>) -> ApiError {
        match err {
            JsonError::Io(_) => ApiError::Malformed("Could not read request body.".into()),
            JsonError::Parse(_, e) => ApiError::Malformed(format!("JSON parse error - {}", e)),
        }
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// A `201 Created` response carrying the new resource.
pub type ApiCreated<T> = Result<(Status, Json<T>), ApiError>;

/// Unwraps a JSON request body, turning parse failures into a 400.
pub fn body<T>(data: Result<Json<T>, JsonError<'_>>) -> Result<T, ApiError> {
    data.map(Json::into_inner).map_err(ApiError::from)
}

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(BTreeMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_insert_with(Vec::new);
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn required<K: Into<String>>(key: K) -> Self {
        ValidationError::from(key, "This field is required.")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was collected, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Diesel(DieselError::NotFound) | ApiError::NotFound => Status::NotFound,
            ApiError::Diesel(DieselError::DatabaseError(kind, _)) => match kind {
                DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::CheckViolation => Status::BadRequest,
                _ => Status::InternalServerError,
            },
            ApiError::Diesel(_) | ApiError::Internal => Status::InternalServerError,
            ApiError::Validation(_) | ApiError::Malformed(_) => Status::BadRequest,
            ApiError::NotAuthenticated
            | ApiError::AuthenticationFailed(_)
            | ApiError::InvalidToken(_) => Status::Unauthorized,
            ApiError::Forbidden => Status::Forbidden,
            ApiError::MethodNotAllowed(_) => Status::MethodNotAllowed,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = match self {
            ApiError::Diesel(DieselError::NotFound) | ApiError::NotFound => {
                json!({ "detail": "Not found." })
            }
            ApiError::Diesel(DieselError::DatabaseError(kind, info))
                if status == Status::BadRequest =>
            {
                let message = match kind {
                    DatabaseErrorKind::UniqueViolation => "This object already exists.",
                    _ => "Referenced object does not exist.",
                };
                tracing::debug!(detail = info.message(), "constraint rejected write");
                json!({ NON_FIELD_ERRORS: [message] })
            }
            ApiError::Diesel(e) => {
                error!(error = %e, "database error");
                json!({ "detail": "Internal server error." })
            }
            ApiError::Validation(errors) => json!(errors),
            ApiError::Malformed(detail) => json!({ "detail": detail }),
            ApiError::NotAuthenticated => {
                json!({ "detail": "Authentication credentials were not provided." })
            }
            ApiError::AuthenticationFailed(detail) => json!({ "detail": detail }),
            ApiError::InvalidToken(detail) => {
                json!({ "detail": detail, "code": "token_not_valid" })
            }
            ApiError::Forbidden => {
                json!({ "detail": "You do not have permission to perform this action." })
            }
            ApiError::MethodNotAllowed(method) => {
                json!({ "detail": format!("Method \"{}\" not allowed.", method.as_str()) })
            }
            ApiError::Internal => json!({ "detail": "Internal server error." }),
        };
        try_respond(req, &body, status)
    }
}
