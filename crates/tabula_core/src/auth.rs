//! Users, roles and credential checks.
//!
//! A client presents a token: the JSON form of a user carrying at least the
//! login and password. [`check_user`] looks the login up in a users table and
//! compares passwords; [`AccessGate`] adds the "public paths pass, everything
//! else needs a valid user" rule on top.

use crate::impl_reflect;
use crate::model::{Model, RecordId};
use crate::table::Table;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A named access level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role name.
    pub name: String,
    /// Access level; higher grants more.
    pub access: u64,
}

impl_reflect!(Role {
    value name,
    value access,
});

impl Role {
    /// Creates a role.
    pub fn new(name: impl Into<String>, access: u64) -> Self {
        Self {
            name: name.into(),
            access,
        }
    }

    /// The built-in role with no access.
    #[must_use]
    pub fn guest() -> Self {
        Self::new("guest", 0)
    }

    /// The built-in role with full access.
    #[must_use]
    pub fn admin() -> Self {
        Self::new("admin", u64::MAX)
    }
}

/// Known roles in registration order, with a landing URL per role.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    roles: Vec<Role>,
    redirects: Vec<(String, String)>,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self {
            roles: vec![Role::guest(), Role::admin()],
            redirects: vec![
                ("guest".to_string(), "/".to_string()),
                ("admin".to_string(), "/admin".to_string()),
            ],
        }
    }
}

impl RoleRegistry {
    /// A registry holding the built-in `guest` and `admin` roles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a role, replacing any role with the same name.
    pub fn register(&mut self, role: Role) {
        match self.roles.iter_mut().find(|r| r.name == role.name) {
            Some(slot) => *slot = role,
            None => self.roles.push(role),
        }
    }

    /// Sets the landing URL for a role.
    pub fn set_redirect(&mut self, role: &str, url: impl Into<String>) {
        let url = url.into();
        match self.redirects.iter_mut().find(|(r, _)| r == role) {
            Some(slot) => slot.1 = url,
            None => self.redirects.push((role.to_string(), url)),
        }
    }

    /// Looks a role up by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// First registered role with exactly this access level.
    #[must_use]
    pub fn find_by_access(&self, access: u64) -> Option<&Role> {
        self.roles.iter().find(|r| r.access == access)
    }

    /// Landing URL for a role.
    #[must_use]
    pub fn redirect_for(&self, role: &str) -> Option<&str> {
        self.redirects
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, url)| url.as_str())
    }

    /// Registered roles in registration order.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier; zero until saved.
    #[serde(default)]
    pub id: u64,
    /// Login name.
    #[serde(default)]
    pub login: String,
    /// Password as stored.
    #[serde(default)]
    pub password: String,
    /// The user's role.
    #[serde(default)]
    pub role: Role,
    /// Free-form command slot.
    #[serde(default)]
    pub command: String,
}

impl_reflect!(User {
    value id,
    value login,
    value password,
    nested role,
    value command,
});

impl User {
    /// Creates an unsaved user with the given credentials and role.
    pub fn new(login: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            role,
            ..Self::default()
        }
    }
}

impl Model for User {
    fn id(&self) -> RecordId {
        RecordId::Seq(self.id)
    }

    /// Users saved without a role become guests.
    fn prepare(&mut self) {
        if self.role.name.is_empty() {
            self.role = Role::guest();
        }
    }
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    login: String,
    #[serde(default)]
    password: String,
}

/// Resolves a token to the stored user it names.
///
/// Returns `None` for empty or malformed tokens, unknown logins, wrong
/// passwords and lookup failures. The stored role is replaced by the
/// registry's current definition of that role, when there is one.
pub fn check_user<T>(users: &T, roles: &RoleRegistry, token: &str) -> Option<User>
where
    T: Table<User> + ?Sized,
{
    if token.is_empty() {
        return None;
    }
    let credentials: Credentials = match serde_json::from_str(token) {
        Ok(c) => c,
        Err(err) => {
            debug!(error = %err, "rejecting malformed user token");
            return None;
        }
    };
    let mut user = match users.get_of_field("login", &Value::from(credentials.login)) {
        Ok(user) => user,
        Err(err) => {
            if !err.is_not_found() {
                warn!(error = %err, "user lookup failed");
            }
            return None;
        }
    };
    if user.password != credentials.password {
        debug!(login = %user.login, "password mismatch");
        return None;
    }
    if let Some(role) = roles.find(&user.role.name) {
        user.role = role.clone();
    }
    Some(user)
}

/// Returns true if the token names a valid user.
pub fn is_authorized<T>(users: &T, roles: &RoleRegistry, token: &str) -> bool
where
    T: Table<User> + ?Sized,
{
    check_user(users, roles, token).is_some()
}

/// Outcome of an [`AccessGate`] check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The request may proceed; carries the user when one was authenticated.
    Allowed(Option<User>),
    /// The request must be sent to this URL instead.
    Redirect(String),
}

/// Lets public paths through and requires a valid user everywhere else.
#[derive(Debug, Clone)]
pub struct AccessGate {
    public_paths: Vec<String>,
    login_path: String,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self {
            public_paths: ["/", "/login", "/logout", "/registration"]
                .into_iter()
                .map(String::from)
                .collect(),
            login_path: "/login".to_string(),
        }
    }
}

impl AccessGate {
    /// A gate with the default public paths and `/login` as login page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set of public paths.
    #[must_use]
    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Sets where unauthenticated requests are redirected.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Decides whether a request for `path` carrying `token` may proceed.
    pub fn check<T>(&self, users: &T, roles: &RoleRegistry, path: &str, token: &str) -> Access
    where
        T: Table<User> + ?Sized,
    {
        let user = check_user(users, roles, token);
        if user.is_some() || self.public_paths.iter().any(|p| p == path) {
            Access::Allowed(user)
        } else {
            Access::Redirect(self.login_path.clone())
        }
    }
}
