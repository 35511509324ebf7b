//! The user management screen.
//!
//! Holds the cached user list, the create/edit form and the editing target,
//! and keeps them in sync with the backend. Every mutation is followed by a
//! full reload of the list. Failures are reported as diagnostics and never
//! escape an operation.

use crate::api::{is_success, user_path, User, UserForm, UsersApi, USERS_PATH};
use crate::transcript::Transcript;
use anyhow::Result;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;

const MAX_DIAGNOSTICS: usize = 50;

/// Which kind of submit the form will perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Edit(i64),
}

impl Mode {
    pub fn submit_label(&self) -> &'static str {
        match self {
            Self::Create => "Add User",
            Self::Edit(_) => "Update User",
        }
    }
}

/// A swallowed failure, kept for developer visibility
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    MissingApiUrl,
    RequestFailed { action: &'static str, error: String },
    UnexpectedShape { body: String },
    InvalidUsers { error: String },
    Rejected { action: &'static str, status: u16 },
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiUrl => "missing_api_url",
            Self::RequestFailed { .. } => "request_failed",
            Self::UnexpectedShape { .. } | Self::InvalidUsers { .. } => "unexpected_shape",
            Self::Rejected { .. } => "rejected",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiUrl => write!(f, "API URL is not defined"),
            Self::RequestFailed { action, error } => write!(f, "Error {}: {}", action, error),
            Self::UnexpectedShape { body } => {
                write!(f, "Expected an array of users but got: {}", body)
            }
            Self::InvalidUsers { error } => write!(f, "Invalid user entries in list: {}", error),
            Self::Rejected { action, status } => {
                write!(f, "Error {}: server responded with {}", action, status)
            }
        }
    }
}

pub struct UserManagementView<A> {
    api: Option<A>,
    users: Vec<User>,
    form: UserForm,
    editing_id: Option<i64>,
    diagnostics: VecDeque<Diagnostic>,
    transcript: Option<Transcript>,
}

impl<A: UsersApi> UserManagementView<A> {
    /// `None` means no API URL is configured; every network operation is then skipped.
    pub fn new(api: Option<A>) -> Self {
        Self {
            api,
            users: Vec::new(),
            form: UserForm::default(),
            editing_id: None,
            diagnostics: VecDeque::new(),
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn form(&self) -> &UserForm {
        &self.form
    }

    pub fn editing_id(&self) -> Option<i64> {
        self.editing_id
    }

    pub fn mode(&self) -> Mode {
        match self.editing_id {
            Some(id) => Mode::Edit(id),
            None => Mode::Create,
        }
    }

    /// Most recent failures, oldest first
    pub fn diagnostics(&self) -> &VecDeque<Diagnostic> {
        &self.diagnostics
    }

    pub fn find_user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn set_name(&mut self, name: &str) {
        self.form.name = name.to_string();
    }

    pub fn set_email(&mut self, email: &str) {
        self.form.email = email.to_string();
    }

    /// Initial load when the screen opens
    pub fn mount(&mut self) {
        self.fetch_users();
    }

    /// Switch to edit mode for `user`, copying its fields into the form
    pub fn begin_edit(&mut self, user: &User) {
        self.editing_id = Some(user.id);
        self.form = UserForm::from_user(user);
    }

    /// Reload the list. A non-array body empties it; a failed request leaves it as is.
    pub fn fetch_users(&mut self) {
        let Some(result) = self.call("GET", USERS_PATH, |api| api.list_users()) else {
            return;
        };

        let body = match result {
            Ok((status, body)) => {
                self.record_response("GET", USERS_PATH, status);
                Ok(body)
            }
            Err(e) => Err(e),
        };

        match body {
            Ok(body @ Value::Array(_)) => match serde_json::from_value::<Vec<User>>(body) {
                Ok(users) => {
                    if let Some(t) = self.transcript.as_mut() {
                        let _ = t.users_loaded(users.len());
                    }
                    self.users = users;
                }
                Err(e) => {
                    self.users.clear();
                    self.report(Diagnostic::InvalidUsers {
                        error: e.to_string(),
                    });
                }
            },
            Ok(other) => {
                self.users.clear();
                self.report(Diagnostic::UnexpectedShape {
                    body: other.to_string(),
                });
            }
            Err(e) => self.report(Diagnostic::RequestFailed {
                action: "fetching users",
                error: e.to_string(),
            }),
        }
    }

    /// POST in create mode, PUT to the edited user otherwise.
    /// On a 2xx the form and editing target are cleared and the list reloaded.
    pub fn submit(&mut self) {
        let form = self.form.clone();
        let (method, path, result) = match self.editing_id {
            Some(id) => {
                let path = user_path(id);
                let result = self.call("PUT", &path, |api| api.update_user(id, &form));
                ("PUT", path, result)
            }
            None => {
                let result = self.call("POST", USERS_PATH, |api| api.create_user(&form));
                ("POST", USERS_PATH.to_string(), result)
            }
        };
        let Some(result) = result else {
            return;
        };

        match result {
            Ok(status) => {
                self.record_response(method, &path, status);
                if is_success(status) {
                    self.form.clear();
                    self.editing_id = None;
                    self.fetch_users();
                } else {
                    self.report(Diagnostic::Rejected {
                        action: "saving user",
                        status,
                    });
                }
            }
            Err(e) => self.report(Diagnostic::RequestFailed {
                action: "saving user",
                error: e.to_string(),
            }),
        }
    }

    /// Delete then reload, whatever status came back. No reload if the request failed.
    pub fn delete_user(&mut self, id: i64) {
        let path = user_path(id);
        let Some(result) = self.call("DELETE", &path, |api| api.delete_user(id)) else {
            return;
        };

        match result {
            Ok(status) => {
                self.record_response("DELETE", &path, status);
                self.fetch_users();
            }
            Err(e) => self.report(Diagnostic::RequestFailed {
                action: "deleting user",
                error: e.to_string(),
            }),
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }

    fn call<T>(
        &mut self,
        method: &str,
        path: &str,
        f: impl FnOnce(&A) -> Result<T>,
    ) -> Option<Result<T>> {
        if self.api.is_none() {
            self.report(Diagnostic::MissingApiUrl);
            return None;
        }
        if let Some(t) = self.transcript.as_mut() {
            let _ = t.request(method, path);
        }
        self.api.as_ref().map(f)
    }

    fn record_response(&mut self, method: &str, path: &str, status: u16) {
        if let Some(t) = self.transcript.as_mut() {
            let _ = t.response(method, path, status);
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        eprintln!("[ERROR] {}", diagnostic);
        if let Some(t) = self.transcript.as_mut() {
            let _ = t.diagnostic(diagnostic.kind(), &diagnostic.to_string());
        }
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }
}

impl<A: UsersApi> fmt::Display for UserManagementView<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = self.mode();

        writeln!(f, "User Management")?;
        writeln!(f)?;
        writeln!(f, "  Name:  {}", self.form.name)?;
        writeln!(f, "  Email: {}", self.form.email)?;
        match mode {
            Mode::Edit(id) => writeln!(f, "  [{}] editing #{}", mode.submit_label(), id)?,
            Mode::Create => writeln!(f, "  [{}]", mode.submit_label())?,
        }
        writeln!(f)?;

        if self.users.is_empty() {
            writeln!(f, "  (no users)")?;
        }
        for user in &self.users {
            writeln!(f, "  #{:<6} {}", user.id, user.name)?;
            writeln!(f, "  {:7} {}", "", user.email)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        List,
        Create(UserForm),
        Update(i64, UserForm),
        Delete(i64),
    }

    /// Records every call; replies are scripted, falling back to `[]` and 200.
    #[derive(Default)]
    struct MockApi {
        calls: RefCell<Vec<Call>>,
        lists: RefCell<VecDeque<Result<Value, String>>>,
        statuses: RefCell<VecDeque<Result<u16, String>>>,
    }

    impl MockApi {
        fn with_list(self, body: Value) -> Self {
            self.lists.borrow_mut().push_back(Ok(body));
            self
        }

        fn with_list_error(self, error: &str) -> Self {
            self.lists.borrow_mut().push_back(Err(error.to_string()));
            self
        }

        fn with_status(self, status: u16) -> Self {
            self.statuses.borrow_mut().push_back(Ok(status));
            self
        }

        fn with_status_error(self, error: &str) -> Self {
            self.statuses.borrow_mut().push_back(Err(error.to_string()));
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn next_status(&self) -> Result<u16> {
            self.statuses
                .borrow_mut()
                .pop_front()
                .unwrap_or(Ok(200))
                .map_err(|e| anyhow!(e))
        }
    }

    impl UsersApi for MockApi {
        fn list_users(&self) -> Result<(u16, Value)> {
            self.calls.borrow_mut().push(Call::List);
            self.lists
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(json!([])))
                .map(|body| (200, body))
                .map_err(|e| anyhow!(e))
        }

        fn create_user(&self, form: &UserForm) -> Result<u16> {
            self.calls.borrow_mut().push(Call::Create(form.clone()));
            self.next_status()
        }

        fn update_user(&self, id: i64, form: &UserForm) -> Result<u16> {
            self.calls.borrow_mut().push(Call::Update(id, form.clone()));
            self.next_status()
        }

        fn delete_user(&self, id: i64) -> Result<u16> {
            self.calls.borrow_mut().push(Call::Delete(id));
            self.next_status()
        }
    }

    fn user(id: i64, name: &str, email: &str) -> User {
        User {
            id,
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    fn form(name: &str, email: &str) -> UserForm {
        UserForm {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_initial_state_is_create_mode() {
        let view: UserManagementView<MockApi> = UserManagementView::new(Some(MockApi::default()));
        assert_eq!(view.mode(), Mode::Create);
        assert!(view.users().is_empty());
        assert_eq!(view.form(), &UserForm::default());
        assert!(view.diagnostics().is_empty());
    }

    #[test]
    fn test_mount_lists_users_and_renders_them() {
        let api = MockApi::default().with_list(json!([{ "id": 1, "name": "A", "email": "a@x.com" }]));
        let mut view = UserManagementView::new(Some(&api));
        view.mount();

        assert_eq!(api.calls(), vec![Call::List]);
        assert_eq!(view.users(), &[user(1, "A", "a@x.com")]);

        let screen = view.render();
        assert!(screen.contains("User Management"));
        assert!(screen.contains("A"));
        assert!(screen.contains("a@x.com"));
        assert_eq!(screen.matches("a@x.com").count(), 1);
    }

    #[test]
    fn test_non_array_list_resets_users() {
        for body in [json!({}), json!(null), json!("users"), json!(42), json!({ "users": [] })] {
            let api = MockApi::default()
                .with_list(json!([{ "id": 1, "name": "A", "email": "a@x.com" }]))
                .with_list(body);
            let mut view = UserManagementView::new(Some(&api));
            view.fetch_users();
            assert_eq!(view.users().len(), 1);

            view.fetch_users();
            assert!(view.users().is_empty());
            assert_eq!(view.diagnostics().len(), 1);
            assert_eq!(view.diagnostics()[0].kind(), "unexpected_shape");
        }
    }

    #[test]
    fn test_object_body_yields_empty_list() {
        let api = MockApi::default().with_list(json!({}));
        let mut view = UserManagementView::new(Some(&api));
        view.mount();
        assert!(view.users().is_empty());
        assert_eq!(
            view.diagnostics(),
            &[Diagnostic::UnexpectedShape {
                body: "{}".to_string()
            }]
        );
        assert!(view.render().contains("(no users)"));
    }

    #[test]
    fn test_array_with_bad_entries_is_not_partially_applied() {
        let api = MockApi::default()
            .with_list(json!([{ "id": 1, "name": "A", "email": "a@x.com" }]))
            .with_list(json!([{ "id": 2, "name": "B", "email": "b@x.com" }, { "id": "x" }]));
        let mut view = UserManagementView::new(Some(&api));
        view.fetch_users();
        view.fetch_users();
        assert!(view.users().is_empty());
        assert!(matches!(view.diagnostics()[0], Diagnostic::InvalidUsers { .. }));
    }

    #[test]
    fn test_failed_fetch_keeps_users() {
        let api = MockApi::default()
            .with_list(json!([{ "id": 1, "name": "A", "email": "a@x.com" }]))
            .with_list_error("connection reset");
        let mut view = UserManagementView::new(Some(&api));
        view.fetch_users();
        view.fetch_users();

        assert_eq!(view.users(), &[user(1, "A", "a@x.com")]);
        assert_eq!(
            view.diagnostics(),
            &[Diagnostic::RequestFailed {
                action: "fetching users",
                error: "connection reset".to_string()
            }]
        );
    }

    #[test]
    fn test_begin_edit_copies_user_into_form() {
        let mut view: UserManagementView<MockApi> = UserManagementView::new(None);
        view.set_name("typed");
        view.begin_edit(&user(4, "Dana", "dana@x.com"));
        assert_eq!(view.form(), &form("Dana", "dana@x.com"));
        assert_eq!(view.editing_id(), Some(4));
        assert_eq!(view.mode(), Mode::Edit(4));

        view.begin_edit(&user(9, "Eve", "eve@x.com"));
        assert_eq!(view.form(), &form("Eve", "eve@x.com"));
        assert_eq!(view.mode(), Mode::Edit(9));
        assert!(view.diagnostics().is_empty());
    }

    #[test]
    fn test_submit_in_create_mode_posts_and_refreshes() {
        let api = MockApi::default()
            .with_status(201)
            .with_list(json!([{ "id": 1, "name": "Ada", "email": "ada@x.com" }]));
        let mut view = UserManagementView::new(Some(&api));
        view.set_name("Ada");
        view.set_email("ada@x.com");
        view.submit();

        assert_eq!(
            api.calls(),
            vec![Call::Create(form("Ada", "ada@x.com")), Call::List]
        );
        assert_eq!(view.form(), &UserForm::default());
        assert_eq!(view.mode(), Mode::Create);
        assert_eq!(view.users().len(), 1);
    }

    #[test]
    fn test_submit_in_edit_mode_puts_then_lists_once() {
        let api = MockApi::default().with_status(200);
        let mut view = UserManagementView::new(Some(&api));
        view.begin_edit(&user(5, "Old", "old@x.com"));
        view.set_name("New");
        view.submit();

        assert_eq!(
            api.calls(),
            vec![Call::Update(5, form("New", "old@x.com")), Call::List]
        );
        assert_eq!(view.editing_id(), None);
        assert_eq!(view.form(), &form("", ""));
    }

    #[test]
    fn test_rejected_submit_keeps_form_and_mode() {
        let api = MockApi::default().with_status(422);
        let mut view = UserManagementView::new(Some(&api));
        view.begin_edit(&user(5, "Old", "old@x.com"));
        view.set_email("not-an-email");
        view.submit();

        assert_eq!(api.calls(), vec![Call::Update(5, form("Old", "not-an-email"))]);
        assert_eq!(view.form(), &form("Old", "not-an-email"));
        assert_eq!(view.mode(), Mode::Edit(5));
        assert_eq!(
            view.diagnostics(),
            &[Diagnostic::Rejected {
                action: "saving user",
                status: 422
            }]
        );
    }

    #[test]
    fn test_submit_network_failure_keeps_state() {
        let api = MockApi::default().with_status_error("connection refused");
        let mut view = UserManagementView::new(Some(&api));
        view.set_name("Ada");
        view.submit();

        assert_eq!(api.calls(), vec![Call::Create(form("Ada", ""))]);
        assert_eq!(view.form(), &form("Ada", ""));
        assert_eq!(view.mode(), Mode::Create);
        assert_eq!(view.diagnostics()[0].kind(), "request_failed");
    }

    #[test]
    fn test_delete_refreshes_regardless_of_status() {
        let api = MockApi::default().with_status(404);
        let mut view = UserManagementView::new(Some(&api));
        view.delete_user(3);

        assert_eq!(api.calls(), vec![Call::Delete(3), Call::List]);
        assert!(view.diagnostics().is_empty());
    }

    #[test]
    fn test_delete_network_failure_skips_refresh() {
        let api = MockApi::default().with_status_error("connection refused");
        let mut view = UserManagementView::new(Some(&api));
        view.delete_user(3);

        assert_eq!(api.calls(), vec![Call::Delete(3)]);
        assert_eq!(
            view.diagnostics(),
            &[Diagnostic::RequestFailed {
                action: "deleting user",
                error: "connection refused".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_api_url_skips_every_operation() {
        let mut view: UserManagementView<MockApi> = UserManagementView::new(None);
        view.set_name("Ada");
        view.mount();
        view.submit();
        view.delete_user(1);

        assert!(view.users().is_empty());
        assert_eq!(view.form(), &form("Ada", ""));
        assert_eq!(view.diagnostics(), &vec![Diagnostic::MissingApiUrl; 3]);
        assert_eq!(view.diagnostics()[0].to_string(), "API URL is not defined");
    }

    #[test]
    fn test_diagnostics_are_bounded() {
        let mut view: UserManagementView<MockApi> = UserManagementView::new(None);
        for _ in 0..(MAX_DIAGNOSTICS + 5) {
            view.fetch_users();
        }
        assert_eq!(view.diagnostics().len(), MAX_DIAGNOSTICS);
    }

    #[test]
    fn test_diagnostics_drop_oldest_first() {
        let mut api = MockApi::default();
        for i in 0..(MAX_DIAGNOSTICS + 5) {
            api = api.with_list_error(&format!("failure {}", i));
        }
        let mut view = UserManagementView::new(Some(&api));
        for _ in 0..(MAX_DIAGNOSTICS + 5) {
            view.fetch_users();
        }

        assert_eq!(view.diagnostics().len(), MAX_DIAGNOSTICS);
        assert_eq!(
            view.diagnostics().front(),
            Some(&Diagnostic::RequestFailed {
                action: "fetching users",
                error: "failure 5".to_string()
            })
        );
        assert_eq!(
            view.diagnostics().back(),
            Some(&Diagnostic::RequestFailed {
                action: "fetching users",
                error: format!("failure {}", MAX_DIAGNOSTICS + 4)
            })
        );
    }

    #[test]
    fn test_render_shows_submit_label_for_mode() {
        let mut view: UserManagementView<MockApi> = UserManagementView::new(None);
        assert!(view.render().contains("[Add User]"));
        view.begin_edit(&user(2, "B", "b@x.com"));
        let screen = view.render();
        assert!(screen.contains("[Update User] editing #2"));
        assert!(screen.contains("Name:  B"));
    }

    #[test]
    fn test_transcript_records_requests_and_diagnostics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        let api = MockApi::default()
            .with_status(204)
            .with_list(json!([{ "id": 1, "name": "A", "email": "a@x.com" }]));
        let mut view = UserManagementView::new(Some(&api))
            .with_transcript(Transcript::new(&path, "t1").unwrap());
        view.delete_user(7);
        view.submit();

        let events: Vec<Value> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(
            types,
            vec![
                "request",
                "response",
                "request",
                "response",
                "users_loaded",
                "request",
                "response",
                "request",
                "response",
                "users_loaded"
            ]
        );
        assert_eq!(events[0]["path"], "/api/users/7");
        assert_eq!(events[1]["status"], 204);
        assert_eq!(events[3]["method"], "GET");
        assert_eq!(events[3]["path"], "/api/users");
        assert_eq!(events[3]["status"], 200);
        assert_eq!(events[4]["count"], 1);
        assert_eq!(events[5]["method"], "POST");
        assert_eq!(events[8]["method"], "GET");
    }
}
