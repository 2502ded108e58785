use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::http::{Method, Status};
use rocket::serde::json::{Error as JsonError, Json};
use rocket::State;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;
use crate::db::schema::{posts, users};
use crate::db::{Connection, DbConnection};
use crate::group::Group;
use crate::pagination::{paginate, LimitOffset, RequestUrl};
use crate::permissions::{self, Authored};
use crate::types::{body, ApiCreated, ApiError, ApiResult, Validate, ValidationError};
use crate::users::models::User;
use crate::users::Requester;
use crate::utils::{deserialize_present, now, parse_pk, required_text, serialize_date};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(table_name = posts)]
#[diesel(belongs_to(User, foreign_key = author_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Post {
    pub id: i32,
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub image: Option<String>,
    pub group_id: Option<i32>,
}

impl Authored for Post {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

impl Post {
    pub fn load(post_id: i32, connection: &mut Connection) -> Result<Post, ApiError> {
        posts::table
            .find(post_id)
            .select(Post::as_select())
            .get_result(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PostView {
    id: i32,
    author: String,
    text: String,
    #[serde(serialize_with = "serialize_date")]
    pub_date: NaiveDateTime,
    image: Option<String>,
    group: Option<i32>,
}

impl From<(Post, String)> for PostView {
    fn from(post_and_author: (Post, String)) -> Self {
        let (post, author) = post_and_author;
        PostView {
            id: post.id,
            author,
            text: post.text,
            pub_date: post.pub_date,
            image: post.image,
            group: post.group_id,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    text: String,
    pub_date: NaiveDateTime,
    author_id: i32,
    image: Option<String>,
    group_id: Option<i32>,
}

/// Field values a client may set. `None` leaves a field alone; for the
/// nullable ones `Some(None)` clears it.
#[derive(Debug, Default, PartialEq, AsChangeset)]
#[diesel(table_name = posts)]
pub struct PostChanges {
    text: Option<String>,
    image: Option<Option<String>>,
    group_id: Option<Option<i32>>,
}

impl PostChanges {
    fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none() && self.group_id.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PostPayload {
    #[serde(default, deserialize_with = "deserialize_present")]
    text: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_present")]
    image: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_present")]
    group: Option<Value>,
}

/// A payload together with how strictly to read it: creates and full updates
/// need every required field, partial updates only what is sent.
pub struct PostInput {
    payload: PostPayload,
    partial: bool,
}

impl PostInput {
    /// Shape checks that need no database.
    fn parse(self) -> Result<(PostChanges, Option<i32>), ValidationError> {
        let mut errors = ValidationError::default();
        let mut changes = PostChanges::default();

        if !(self.partial && self.payload.text.is_none()) {
            match required_text(self.payload.text.as_ref()) {
                Ok(text) => changes.text = Some(text),
                Err(message) => errors.add_error("text", message),
            }
        }

        match self.payload.image {
            None => {}
            Some(Value::Null) => changes.image = Some(None),
            Some(Value::String(image)) => {
                changes.image = Some(Some(image).filter(|image| !image.is_empty()))
            }
            Some(_) => errors.add_error("image", "Not a valid string."),
        }

        let mut group_to_check = None;
        if let Some(group) = self.payload.group {
            match parse_pk(&group) {
                Ok(group_id) => {
                    changes.group_id = Some(group_id);
                    group_to_check = group_id;
                }
                Err(message) => errors.add_error("group", message),
            }
        }

        errors.into_result()?;
        Ok((changes, group_to_check))
    }
}

impl Validate for PostInput {
    type Output = PostChanges;

    fn validate(self, connection: &mut Connection) -> Result<PostChanges, ApiError> {
        let (changes, group_to_check) = self.parse()?;
        if let Some(group_id) = group_to_check {
            if !Group::exists(group_id, connection)? {
                let message = format!("Invalid pk \"{}\" - object does not exist.", group_id);
                return Err(ValidationError::from("group", message).into());
            }
        }
        Ok(changes)
    }
}

#[derive(Debug, Default, FromForm)]
pub struct PostFilter {
    group: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

impl PostFilter {
    /// Exact match on the group id. Unknown ids are a client error rather
    /// than an empty list.
    fn group_id(&self, connection: &mut Connection) -> Result<Option<i32>, ApiError> {
        let raw = match self.group.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };
        match raw.parse::<i32>() {
            Ok(group_id) if Group::exists(group_id, connection)? => Ok(Some(group_id)),
            _ => Err(ValidationError::from(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            )
            .into()),
        }
    }
}

#[get("/posts?<filter..>")]
pub fn list(
    requester: Result<Requester, ApiError>,
    mut connection: DbConnection,
    config: &State<Config>,
    url: RequestUrl,
    filter: PostFilter,
) -> ApiResult<Value> {
    permissions::check_request(Method::Get, &requester?)?;
    let group_id = filter.group_id(&mut connection)?;
    let window = LimitOffset::from_query(
        filter.limit.as_deref(),
        filter.offset.as_deref(),
        config.page_size,
    );

    let mut query = posts::table
        .inner_join(users::table)
        .select((Post::as_select(), users::username))
        .order(posts::id.asc())
        .into_boxed();
    let mut count = posts::table.count().into_boxed();
    if let Some(group_id) = group_id {
        query = query.filter(posts::group_id.eq(group_id));
        count = count.filter(posts::group_id.eq(group_id));
    }

    match window {
        None => {
            let results = query
                .load::<(Post, String)>(&mut *connection)?
                .into_iter()
                .map(PostView::from)
                .collect::<Vec<_>>();
            Ok(Json(json!(results)))
        }
        Some(window) => {
            let total = count.get_result::<i64>(&mut *connection)?;
            let results = query
                .limit(window.limit)
                .offset(window.offset)
                .load::<(Post, String)>(&mut *connection)?
                .into_iter()
                .map(PostView::from)
                .collect::<Vec<_>>();
            Ok(Json(json!(paginate(results, total, window, &url))))
        }
    }
}

#[get("/posts/<id>")]
pub fn get(
    requester: Result<Requester, ApiError>,
    mut connection: DbConnection,
    id: i32,
) -> ApiResult<PostView> {
    permissions::check_request(Method::Get, &requester?)?;
    let (post, author) = posts::table
        .inner_join(users::table)
        .filter(posts::id.eq(id))
        .select((Post::as_select(), users::username))
        .get_result::<(Post, String)>(&mut *connection)?;
    Ok(Json((post, author).into()))
}

#[post("/posts", data = "<create>")]
pub fn create(
    requester: Result<Requester, ApiError>,
    mut connection: DbConnection,
    create: Result<Json<PostPayload>, JsonError<'_>>,
) -> ApiCreated<PostView> {
    let requester = requester?;
    let user = permissions::check_request(Method::Post, &requester)?.ok_or(ApiError::NotAuthenticated)?;
    let input = PostInput {
        payload: body(create)?,
        partial: false,
    };
    let changes = input.validate(&mut connection)?;

    let new_post = NewPost {
        text: changes.text.unwrap_or_default(),
        pub_date: now(),
        author_id: user.id,
        image: changes.image.flatten(),
        group_id: changes.group_id.flatten(),
    };
    let post = diesel::insert_into(posts::table)
        .values(&new_post)
        .returning(Post::as_returning())
        .get_result(&mut *connection)?;
    info!(post_id = post.id, author_id = user.id, "created post");

    Ok((Status::Created, Json((post, user.username.clone()).into())))
}

fn update_post(
    method: Method,
    requester: Result<Requester, ApiError>,
    mut connection: DbConnection,
    id: i32,
    update: Result<Json<PostPayload>, JsonError<'_>>,
) -> ApiResult<PostView> {
    let requester = requester?;
    permissions::check_request(method, &requester)?;
    let post = Post::load(id, &mut connection)?;
    let user = permissions::authorize(method, &requester, &post)?.ok_or(ApiError::NotAuthenticated)?;

    let input = PostInput {
        payload: body(update)?,
        partial: method == Method::Patch,
    };
    let changes = input.validate(&mut connection)?;
    let post = if changes.is_empty() {
        post
    } else {
        diesel::update(&post)
            .set(&changes)
            .returning(Post::as_returning())
            .get_result(&mut *connection)?
    };
    info!(post_id = post.id, "updated post");

    Ok(Json((post, user.username.clone()).into()))
}

#[put("/posts/<id>", data = "<update>")]
pub fn update(
    requester: Result<Requester, ApiError>,
    connection: DbConnection,
    id: i32,
    update: Result<Json<PostPayload>, JsonError<'_>>,
) -> ApiResult<PostView> {
    update_post(Method::Put, requester, connection, id, update)
}

#[patch("/posts/<id>", data = "<update>")]
pub fn partial_update(
    requester: Result<Requester, ApiError>,
    connection: DbConnection,
    id: i32,
    update: Result<Json<PostPayload>, JsonError<'_>>,
) -> ApiResult<PostView> {
    update_post(Method::Patch, requester, connection, id, update)
}

#[delete("/posts/<id>")]
pub fn delete(
    requester: Result<Requester, ApiError>,
    mut connection: DbConnection,
    id: i32,
) -> Result<Status, ApiError> {
    let requester = requester?;
    permissions::check_request(Method::Delete, &requester)?;
    let post = Post::load(id, &mut connection)?;
    permissions::authorize(Method::Delete, &requester, &post)?;

    diesel::delete(&post).execute(&mut *connection)?;
    info!(post_id = post.id, "deleted post");
    Ok(Status::NoContent)
}
