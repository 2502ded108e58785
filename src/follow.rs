use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use rocket::http::Status;
use rocket::serde::json::{Error as JsonError, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::db::schema::{follows, users};
use crate::db::{Connection, DbConnection};
use crate::types::{body, ApiCreated, ApiError, ApiResult, Validate, ValidationError, NON_FIELD_ERRORS};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::deserialize_present;

#[derive(Debug, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(table_name = follows)]
#[diesel(belongs_to(User))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Follow {
    pub id: i32,
    pub user_id: i32,
    pub following_id: i32,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FollowView {
    user: String,
    following: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = follows)]
pub struct NewFollow {
    user_id: i32,
    following_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct FollowPayload {
    #[serde(default, deserialize_with = "deserialize_present")]
    following: Option<Value>,
}

/// A follow request on behalf of `user`, who is always the follower.
pub struct FollowInput<'a> {
    user: &'a User,
    payload: FollowPayload,
}

impl<'a> FollowInput<'a> {
    fn following_name(&self) -> Result<&str, ValidationError> {
        match &self.payload.following {
            None => Err(ValidationError::required("following")),
            Some(Value::Null) => Err(ValidationError::from(
                "following",
                "This field may not be null.",
            )),
            Some(Value::String(name)) => Ok(name),
            Some(_) => Err(ValidationError::from("following", "Invalid value.")),
        }
    }
}

impl<'a> Validate for FollowInput<'a> {
    type Output = (NewFollow, User);

    fn validate(self, connection: &mut Connection) -> Result<Self::Output, ApiError> {
        let name = self.following_name()?;
        let following = User::find_by_name(name, connection)?.ok_or_else(|| {
            ValidationError::from(
                "following",
                format!("Object with username={} does not exist.", name),
            )
        })?;

        if following.id == self.user.id {
            return Err(ValidationError::from("following", "You cannot follow yourself.").into());
        }

        let already_following = select(exists(
            follows::table
                .filter(follows::user_id.eq(self.user.id))
                .filter(follows::following_id.eq(following.id)),
        ))
        .get_result::<bool>(connection)?;
        if already_following {
            return Err(ValidationError::from(
                NON_FIELD_ERRORS,
                "The fields user, following must make a unique set.",
            )
            .into());
        }

        let new_follow = NewFollow {
            user_id: self.user.id,
            following_id: following.id,
        };
        Ok((new_follow, following))
    }
}

/// Splits a search string the way list filters read it: on whitespace and
/// commas, ignoring empty pieces.
pub fn search_terms(search: &str) -> Vec<String> {
    search
        .replace('\0', "")
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[get("/follow?<search>")]
pub fn list(
    user: CurrentUser,
    mut connection: DbConnection,
    search: Option<String>,
) -> ApiResult<Vec<FollowView>> {
    let user = user?;
    let mut query = follows::table
        .inner_join(users::table)
        .filter(follows::user_id.eq(user.id))
        .select(users::username)
        .order(follows::id.asc())
        .into_boxed();

    // Every term has to hit the follower's or the followee's name. The
    // follower is always the requester, so those terms are settled here.
    let own_name = user.username.to_lowercase();
    for term in search_terms(search.as_deref().unwrap_or("")) {
        if own_name.contains(&term.to_lowercase()) {
            continue;
        }
        let pattern = format!("%{}%", escape_like(&term));
        query = query.filter(users::username.like(pattern).escape('\\'));
    }

    let following = query.load::<String>(&mut *connection)?;
    Ok(Json(
        following
            .into_iter()
            .map(|following| FollowView {
                user: user.username.clone(),
                following,
            })
            .collect(),
    ))
}

#[post("/follow", data = "<follow>")]
pub fn create(
    user: CurrentUser,
    mut connection: DbConnection,
    follow: Result<Json<FollowPayload>, JsonError<'_>>,
) -> ApiCreated<FollowView> {
    let user = user?;
    let input = FollowInput {
        user: &user,
        payload: body(follow)?,
    };
    let (new_follow, following) = input.validate(&mut connection)?;

    let follow = diesel::insert_into(follows::table)
        .values(&new_follow)
        .returning(Follow::as_returning())
        .get_result(&mut *connection)?;
    info!(
        follow_id = follow.id,
        user_id = follow.user_id,
        following_id = follow.following_id,
        "followed user"
    );

    Ok((
        Status::Created,
        Json(FollowView {
            user: user.username.clone(),
            following: following.username,
        }),
    ))
}
