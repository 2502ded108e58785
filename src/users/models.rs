use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::users;
use crate::db::Connection;
use crate::types::ApiError;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, AsChangeset, PartialEq)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

/// Public account representation.
#[derive(Debug, Serialize)]
pub struct UserView<'a> {
    pub email: &'a str,
    pub id: i32,
    pub username: &'a str,
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| ApiError::Internal)
    }

    pub fn new_password(&mut self, password: &str) -> Result<(), ApiError> {
        self.password = User::make_password(password)?;
        Ok(())
    }

    pub fn verify_password(&self, password_to_verify: &str) -> Result<bool, ApiError> {
        let parsed = PasswordHash::new(&self.password).map_err(|_| ApiError::Internal)?;
        match Argon2::default().verify_password(password_to_verify.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(_) => Err(ApiError::Internal),
        }
    }

    pub fn view(&self) -> UserView<'_> {
        UserView {
            email: &self.email,
            id: self.id,
            username: &self.username,
        }
    }

    pub fn load(user_id: i32, connection: &mut Connection) -> Result<User, ApiError> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .get_result(connection)
            .map_err(|e| e.into())
    }

    pub fn find_by_name(name: &str, connection: &mut Connection) -> Result<Option<User>, ApiError> {
        users::table
            .filter(users::username.eq(name))
            .select(User::as_select())
            .get_result(connection)
            .optional()
            .map_err(|e| e.into())
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

impl NewUser {
    pub fn insert(&self, connection: &mut Connection) -> Result<User, ApiError> {
        diesel::insert_into(users::table)
            .values(self)
            .returning(User::as_returning())
            .get_result(connection)
            .map_err(|e| e.into())
    }
}
