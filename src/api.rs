//! Users REST API: data model, client trait and the blocking HTTP client.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const USERS_PATH: &str = "/api/users";

/// Path of a single user resource
pub fn user_path(id: i64) -> String {
    format!("{}/{}", USERS_PATH, id)
}

/// A user record as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Editable form fields, sent as the create/update request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserForm {
    pub name: String,
    pub email: String,
}

impl UserForm {
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.email.clear();
    }
}

/// True for 2xx statuses
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Trait for users API clients to allow mocking and abstraction.
///
/// Mutating calls return the HTTP status of any response the server sent;
/// `Err` means the request never got one (transport failure).
pub trait UsersApi {
    /// Status and raw JSON body of the list endpoint, whatever its shape
    fn list_users(&self) -> Result<(u16, Value)>;
    fn create_user(&self, form: &UserForm) -> Result<u16>;
    fn update_user(&self, id: i64, form: &UserForm) -> Result<u16>;
    fn delete_user(&self, id: i64) -> Result<u16>;
}

impl<T: UsersApi + ?Sized> UsersApi for &T {
    fn list_users(&self) -> Result<(u16, Value)> {
        (**self).list_users()
    }

    fn create_user(&self, form: &UserForm) -> Result<u16> {
        (**self).create_user(form)
    }

    fn update_user(&self, id: i64, form: &UserForm) -> Result<u16> {
        (**self).update_user(id, form)
    }

    fn delete_user(&self, id: i64) -> Result<u16> {
        (**self).delete_user(id)
    }
}

pub struct HttpClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn users_url(&self) -> String {
        format!("{}{}", self.base_url, USERS_PATH)
    }

    pub fn user_url(&self, id: i64) -> String {
        format!("{}{}", self.base_url, user_path(id))
    }
}

/// Error statuses still carry a response; only transport failures are errors.
fn into_response(result: Result<ureq::Response, ureq::Error>) -> Result<ureq::Response> {
    match result {
        Ok(r) => Ok(r),
        Err(ureq::Error::Status(_, r)) => Ok(r),
        Err(e) => Err(anyhow!("Request failed: {}", e)),
    }
}

impl UsersApi for HttpClient {
    fn list_users(&self) -> Result<(u16, Value)> {
        let resp = into_response(self.agent.get(&self.users_url()).call())?;
        let status = resp.status();
        let body: Value = resp
            .into_json()
            .map_err(|e| anyhow!("Invalid JSON from {}: {}", USERS_PATH, e))?;
        Ok((status, body))
    }

    fn create_user(&self, form: &UserForm) -> Result<u16> {
        let resp = into_response(
            self.agent
                .post(&self.users_url())
                .set("Content-Type", "application/json")
                .send_json(serde_json::to_value(form)?),
        )?;
        Ok(resp.status())
    }

    fn update_user(&self, id: i64, form: &UserForm) -> Result<u16> {
        let resp = into_response(
            self.agent
                .put(&self.user_url(id))
                .set("Content-Type", "application/json")
                .send_json(serde_json::to_value(form)?),
        )?;
        Ok(resp.status())
    }

    fn delete_user(&self, id: i64) -> Result<u16> {
        let resp = into_response(self.agent.delete(&self.user_url(id)).call())?;
        Ok(resp.status())
    }
}
