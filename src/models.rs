use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::slugify;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    /// Session state only, never stored.
    #[serde(skip)]
    pub authenticated: bool,
}

impl User {
    pub fn new(email: &str, password_hash: &str, name: &str, authenticated: bool) -> Self {
        Self {
            id: 0,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.to_string(),
            authenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn unique_id(&self) -> i64 {
        self.id
    }

    /// Owner guard: only an authenticated identity can own anything, so the
    /// anonymous zero-value user never matches a stored id.
    pub fn owns(&self, owner_id: i64) -> bool {
        self.authenticated && self.id == owner_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    /// Unix timestamp, seconds.
    pub created: i64,
    pub title: String,
    pub body: String,
    pub user_id: i64,
    /// Slug derived from the title at creation; edits leave it untouched.
    pub url: String,
}

impl Post {
    pub fn new(title: &str, body: &str, user_id: i64) -> Self {
        Self {
            id: 0,
            created: Utc::now().timestamp(),
            title: title.to_string(),
            body: body.to_string(),
            user_id,
            url: slugify(title),
        }
    }
}

/// Field name to message, serialized the way the client script expects:
/// `{"title": "Title cannot be empty"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, &'static str>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.insert(field, message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Registration and login form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserForm {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl UserForm {
    /// The email as it is stored and looked up.
    pub fn email(&self) -> &str {
        self.email.trim()
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.email.trim().is_empty() {
            errors.add("email", "Required");
        }
        if self.password.is_empty() {
            errors.add("password", "Required");
        }
        errors.into_result()
    }
}

/// Profile edit sent by the client script. A blank password keeps the
/// current one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserUpdateForm {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl UserUpdateForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.email.trim().is_empty() {
            errors.add("email", "Required");
        }
        errors.into_result()
    }
}

/// Column values written by a profile update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserChanges {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Body")]
    pub body: String,
}

impl PostForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.title.is_empty() {
            errors.add("title", "Title cannot be empty");
        }
        errors.into_result()
    }
}
