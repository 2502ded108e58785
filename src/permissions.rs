//! Owner-or-read-only access control.
//!
//! Checked in two steps, like every resource handler does it: the request
//! step before anything is loaded, the object step once the target is in hand.

use rocket::http::Method;

use crate::types::ApiError;
use crate::users::models::User;
use crate::users::Requester;

/// A resource with an owning user.
pub trait Authored {
    fn author_id(&self) -> i32;
}

pub fn is_safe(method: Method) -> bool {
    matches!(method, Method::Get | Method::Head | Method::Options)
}

/// Reads always pass; anything else needs an identity. Returns the user for
/// authenticated requests.
pub fn check_request(method: Method, requester: &Requester) -> Result<Option<&User>, ApiError> {
    match requester.user() {
        Some(user) => Ok(Some(user)),
        None if is_safe(method) => Ok(None),
        None => Err(ApiError::NotAuthenticated),
    }
}

/// Reads always pass; writes only for the author.
pub fn check_object<T: Authored>(
    method: Method,
    user: Option<&User>,
    object: &T,
) -> Result<(), ApiError> {
    if is_safe(method) {
        return Ok(());
    }
    match user {
        Some(user) if user.id == object.author_id() => Ok(()),
        Some(_) => Err(ApiError::Forbidden),
        None => Err(ApiError::NotAuthenticated),
    }
}

/// Both steps for a handler that has already loaded its target.
pub fn authorize<'a, T: Authored>(
    method: Method,
    requester: &'a Requester,
    object: &T,
) -> Result<Option<&'a User>, ApiError> {
    let user = check_request(method, requester)?;
    check_object(method, user, object)?;
    Ok(user)
}
