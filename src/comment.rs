use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::http::{Method, Status};
use rocket::serde::json::{Error as JsonError, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::db::schema::{comments, users};
use crate::db::{Connection, DbConnection};
use crate::permissions::{self, Authored};
use crate::post::Post;
use crate::types::{body, ApiCreated, ApiError, ApiResult, ValidationError};
use crate::users::Requester;
use crate::utils::{deserialize_present, now, required_text, serialize_date};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(table_name = comments)]
#[diesel(belongs_to(Post))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Comment {
    pub id: i32,
    pub author_id: i32,
    pub post_id: i32,
    pub text: String,
    pub created: NaiveDateTime,
}

impl Authored for Comment {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

impl Comment {
    /// Looks the comment up among the post's own comments only.
    pub fn load_for(post: &Post, id: i32, connection: &mut Connection) -> Result<Comment, ApiError> {
        Comment::belonging_to(post)
            .filter(comments::id.eq(id))
            .select(Comment::as_select())
            .get_result(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Serialize, Debug)]
pub struct CommentView {
    id: i32,
    author: String,
    post: i32,
    text: String,
    #[serde(serialize_with = "serialize_date")]
    created: NaiveDateTime,
}

impl From<(Comment, String)> for CommentView {
    fn from(comment_and_author: (Comment, String)) -> Self {
        let (comment, author) = comment_and_author;
        CommentView {
            id: comment.id,
            author,
            post: comment.post_id,
            text: comment.text,
            created: comment.created,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    author_id: i32,
    post_id: i32,
    text: String,
    created: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    #[serde(default, deserialize_with = "deserialize_present")]
    text: Option<Value>,
}

impl CommentBody {
    /// `None` when a partial update leaves the text alone.
    fn text(&self, partial: bool) -> Result<Option<String>, ValidationError> {
        if partial && self.text.is_none() {
            return Ok(None);
        }
        required_text(self.text.as_ref())
            .map(Some)
            .map_err(|message| ValidationError::from("text", message))
    }
}

#[get("/posts/<post_id>/comments")]
pub fn list(
    requester: Result<Requester, ApiError>,
    mut conn: DbConnection,
    post_id: i32,
) -> ApiResult<Vec<CommentView>> {
    permissions::check_request(Method::Get, &requester?)?;
    let post = Post::load(post_id, &mut conn)?;
    let data = Comment::belonging_to(&post)
        .inner_join(users::table)
        .order(comments::id.asc())
        .select((Comment::as_select(), users::username))
        .load::<(Comment, String)>(&mut *conn)?;
    Ok(Json(data.into_iter().map(CommentView::from).collect()))
}

#[get("/posts/<post_id>/comments/<id>")]
pub fn get(
    requester: Result<Requester, ApiError>,
    mut conn: DbConnection,
    post_id: i32,
    id: i32,
) -> ApiResult<CommentView> {
    permissions::check_request(Method::Get, &requester?)?;
    let post = Post::load(post_id, &mut conn)?;
    let (comment, author) = Comment::belonging_to(&post)
        .inner_join(users::table)
        .filter(comments::id.eq(id))
        .select((Comment::as_select(), users::username))
        .get_result::<(Comment, String)>(&mut *conn)?;
    Ok(Json((comment, author).into()))
}

#[post("/posts/<post_id>/comments", data = "<details>")]
pub fn add(
    requester: Result<Requester, ApiError>,
    mut conn: DbConnection,
    post_id: i32,
    details: Result<Json<CommentBody>, JsonError<'_>>,
) -> ApiCreated<CommentView> {
    let requester = requester?;
    let user = permissions::check_request(Method::Post, &requester)?.ok_or(ApiError::NotAuthenticated)?;
    let post = Post::load(post_id, &mut conn)?;
    let text = body(details)?.text(false)?.unwrap_or_default();

    let new_comment = NewComment {
        author_id: user.id,
        post_id: post.id,
        text,
        created: now(),
    };
    let comment = diesel::insert_into(comments::table)
        .values(&new_comment)
        .returning(Comment::as_returning())
        .get_result(&mut *conn)?;
    info!(comment_id = comment.id, post_id = post.id, author_id = user.id, "added comment");

    Ok((Status::Created, Json((comment, user.username.clone()).into())))
}

fn update_comment(
    method: Method,
    requester: Result<Requester, ApiError>,
    mut conn: DbConnection,
    post_id: i32,
    id: i32,
    details: Result<Json<CommentBody>, JsonError<'_>>,
) -> ApiResult<CommentView> {
    let requester = requester?;
    permissions::check_request(method, &requester)?;
    let post = Post::load(post_id, &mut conn)?;
    let comment = Comment::load_for(&post, id, &mut conn)?;
    let user = permissions::authorize(method, &requester, &comment)?.ok_or(ApiError::NotAuthenticated)?;

    let comment = match body(details)?.text(method == Method::Patch)? {
        Some(text) => diesel::update(&comment)
            .set(comments::text.eq(text))
            .returning(Comment::as_returning())
            .get_result(&mut *conn)?,
        None => comment,
    };
    info!(comment_id = comment.id, "updated comment");

    Ok(Json((comment, user.username.clone()).into()))
}

#[put("/posts/<post_id>/comments/<id>", data = "<details>")]
pub fn update(
    requester: Result<Requester, ApiError>,
    conn: DbConnection,
    post_id: i32,
    id: i32,
    details: Result<Json<CommentBody>, JsonError<'_>>,
) -> ApiResult<CommentView> {
    update_comment(Method::Put, requester, conn, post_id, id, details)
}

#[patch("/posts/<post_id>/comments/<id>", data = "<details>")]
pub fn partial_update(
    requester: Result<Requester, ApiError>,
    conn: DbConnection,
    post_id: i32,
    id: i32,
    details: Result<Json<CommentBody>, JsonError<'_>>,
) -> ApiResult<CommentView> {
    update_comment(Method::Patch, requester, conn, post_id, id, details)
}

#[delete("/posts/<post_id>/comments/<id>")]
pub fn delete(
    requester: Result<Requester, ApiError>,
    mut conn: DbConnection,
    post_id: i32,
    id: i32,
) -> Result<Status, ApiError> {
    let requester = requester?;
    permissions::check_request(Method::Delete, &requester)?;
    let post = Post::load(post_id, &mut conn)?;
    let comment = Comment::load_for(&post, id, &mut conn)?;
    permissions::authorize(Method::Delete, &requester, &comment)?;

    diesel::delete(&comment).execute(&mut *conn)?;
    info!(comment_id = comment.id, post_id = post.id, "deleted comment");
    Ok(Status::NoContent)
}
