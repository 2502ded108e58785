use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use rocket::http::Method;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::db::schema::groups;
use crate::db::{Connection, DbConnection};
use crate::permissions;
use crate::types::{ApiError, ApiResult};
use crate::users::Requester;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, PartialEq)]
#[diesel(table_name = groups)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Group {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl Group {
    pub fn load(group_id: i32, connection: &mut Connection) -> Result<Group, ApiError> {
        groups::table
            .find(group_id)
            .select(Group::as_select())
            .get_result(connection)
            .map_err(|e| e.into())
    }

    pub fn exists(group_id: i32, connection: &mut Connection) -> Result<bool, ApiError> {
        select(exists(groups::table.find(group_id)))
            .get_result::<bool>(connection)
            .map_err(|e| e.into())
    }
}

/// Groups are curated outside the API; this is how they get into the table.
#[derive(Debug, Insertable)]
#[diesel(table_name = groups)]
pub struct NewGroup<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub description: &'a str,
}

impl<'a> NewGroup<'a> {
    pub fn insert(&self, connection: &mut Connection) -> Result<Group, ApiError> {
        diesel::insert_into(groups::table)
            .values(self)
            .returning(Group::as_returning())
            .get_result(connection)
            .map_err(|e| e.into())
    }
}

#[get("/groups")]
pub fn list(
    requester: Result<Requester, ApiError>,
    mut connection: DbConnection,
) -> ApiResult<Vec<Group>> {
    permissions::check_request(Method::Get, &requester?)?;
    let groups = groups::table
        .order(groups::id.asc())
        .select(Group::as_select())
        .load(&mut *connection)?;
    Ok(Json(groups))
}

#[get("/groups/<id>")]
pub fn get(
    requester: Result<Requester, ApiError>,
    mut connection: DbConnection,
    id: i32,
) -> ApiResult<Group> {
    permissions::check_request(Method::Get, &requester?)?;
    Ok(Json(Group::load(id, &mut connection)?))
}

/// Groups are read-only through the API.
#[post("/groups")]
pub fn create(requester: Result<Requester, ApiError>) -> Result<(), ApiError> {
    let requester = requester?;
    permissions::check_request(Method::Post, &requester)?;
    Err(ApiError::MethodNotAllowed(Method::Post))
}
