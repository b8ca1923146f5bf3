use serde::{Deserialize, Serialize};

use crate::users::repo::User;

/// Request body for login. Fields are optional so absence maps to our own error.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Request body for registration, fields in the order they are checked.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub age: Option<i32>,
    pub height: Option<i32>,
    pub userweight: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    pub id: i32,
    pub username: String,
    pub age: i32,
    pub height: i32,
    pub userweight: i32,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            age: u.age,
            height: u.height,
            userweight: u.userweight,
        }
    }
}
