//! Code for creating the user table and fetching users from the database.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, OptionalExtension, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a user is allowed to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// A regular account that can only see its own data.
    #[default]
    User,
    /// An account that can also see aggregate statistics across all users.
    Admin,
}

impl Role {
    /// The name stored in the database and sent to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(Error::Validation(format!(
                "unknown role \"{other}\", expected USER or ADMIN"
            ))),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The email address the user logs in with.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's display name.
    pub name: String,
    /// What the user is allowed to do.
    pub role: Role,
    /// The user's occupation, if they provided one.
    pub profession: Option<String>,
    /// The user's self-reported monthly income, if they provided one.
    pub monthly_income: Option<f64>,
}

/// The data needed to insert a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// A validated, lower-cased email address.
    pub email: String,
    /// The hashed password.
    pub password_hash: PasswordHash,
    /// The user's display name.
    pub name: String,
    /// The user's occupation.
    pub profession: Option<String>,
    /// The user's monthly income.
    pub monthly_income: Option<f64>,
}

/// The parts of a [User] that are safe to send to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user's ID.
    pub id: UserID,
    /// The user's email address.
    pub email: String,
    /// The user's display name.
    pub name: String,
    /// What the user is allowed to do.
    pub role: Role,
    /// The user's occupation.
    pub profession: Option<String>,
    /// The user's monthly income.
    pub monthly_income: Option<f64>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            profession: user.profession.clone(),
            monthly_income: user.monthly_income,
        }
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'USER',
                profession TEXT,
                monthly_income REAL
                )",
        (),
    )?;

    Ok(())
}

const USER_COLUMNS: &str = "id, email, password, name, role, profession, monthly_income";

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        name: row.get(3)?,
        role: row.get(4)?,
        profession: row.get(5)?,
        monthly_income: row.get(6)?,
    })
}

/// Insert a new user with the [Role::User] role.
///
/// # Errors
///
/// Returns a [Error::DuplicateEmail] if the email is already registered,
/// or a [Error::SqlError] if some other SQL error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO user (email, password, name, role, profession, monthly_income)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {USER_COLUMNS}"
        ))?
        .query_row(
            (
                &new_user.email,
                new_user.password_hash.as_ref(),
                &new_user.name,
                Role::User,
                &new_user.profession,
                new_user.monthly_income,
            ),
            map_user_row,
        )
        .map_err(Error::from)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(Error::from)
}

/// Get the user registered with `email`, if any.
///
/// Emails are compared case-insensitively.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<Option<User>, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE email = :email"
        ))?
        .query_row(&[(":email", &email.trim().to_lowercase())], map_user_row)
        .optional()
        .map_err(Error::from)
}

/// Change the role of the user registered with `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has that email,
/// or a [Error::SqlError] if some other SQL error occurred.
pub fn set_user_role(email: &str, role: Role, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "UPDATE user SET role = ?1 WHERE email = ?2 RETURNING {USER_COLUMNS}"
        ))?
        .query_row((role, email.trim().to_lowercase()), map_user_row)
        .map_err(Error::from)
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    let count: i64 = connection.query_row("SELECT COUNT(id) FROM user;", [], |row| {
        row.get(0)
    })?;

    usize::try_from(count)
        .map_err(|_| Error::SqlError(rusqlite::Error::IntegralValueOutOfRange(0, count)))
}
