use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;
use ulid::Ulid;

use crate::directory::UserDirectory;
use crate::engine::ErrorKind;
use crate::model::*;
use crate::sql::Command;

/// Login name that is always an admin, registered or not.
pub const ADMIN_LOGIN: &str = "admin";

/// One shared cleartext password for every login.
#[derive(Debug)]
pub struct RoombookAuthSource {
    password: String,
}

impl RoombookAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for RoombookAuthSource {
    async fn get_password(&self, _login: &LoginInfo) -> PgWireResult<Password> {
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}

/// Who is issuing statements on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// `user_id` is set when the admin logged in with a registered email.
    Admin { user_id: Option<Ulid> },
    Member(User),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Login name matches no registered user.
    Unauthorized(String),
    Forbidden(&'static str),
    /// Resolving the login failed for a reason other than absence.
    Lookup(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Unauthorized(login) => write!(f, "unknown login: {login}"),
            AuthError::Forbidden(what) => write!(f, "permission denied: {what}"),
            AuthError::Lookup(e) => write!(f, "login lookup failed: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl Actor {
    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }

    /// The registered user behind this actor, if any.
    pub fn user_id(&self) -> Option<Ulid> {
        match self {
            Actor::Admin { user_id } => *user_id,
            Actor::Member(user) => Some(user.id),
        }
    }

    /// Admins act for anyone; members only for themselves.
    pub fn may_act_for(&self, user_id: Ulid) -> bool {
        match self {
            Actor::Admin { .. } => true,
            Actor::Member(user) => user.id == user_id,
        }
    }
}

/// Map a login name to an actor. Hard lookup: unknown emails are rejected.
pub async fn resolve_actor(users: &UserDirectory, login: &str) -> Result<Actor, AuthError> {
    if login.trim().eq_ignore_ascii_case(ADMIN_LOGIN) {
        return Ok(Actor::Admin { user_id: None });
    }
    match users.find_by_email(login).await {
        Ok(user) if user.role == Role::Admin => Ok(Actor::Admin { user_id: Some(user.id) }),
        Ok(user) => Ok(Actor::Member(user)),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidInput) => {
            Err(AuthError::Unauthorized(login.to_string()))
        }
        Err(e) => Err(AuthError::Lookup(e.to_string())),
    }
}

/// Statement-level role check. Ownership of an existing booking is checked
/// by the caller once the booking is loaded.
pub fn authorize(actor: &Actor, cmd: &Command) -> Result<(), AuthError> {
    if actor.is_admin() {
        return Ok(());
    }
    match cmd {
        Command::InsertRoom(_) | Command::UpdateRoomStatus { .. } | Command::DeleteRoom { .. } => {
            Err(AuthError::Forbidden("room changes require admin"))
        }
        Command::InsertUser(_) | Command::DeleteUser { .. } => {
            Err(AuthError::Forbidden("user changes require admin"))
        }
        Command::SelectUsers { id, email } => {
            let Actor::Member(me) = actor else { return Ok(()) };
            let own_id = id.is_some_and(|id| id == me.id);
            let own_email = email
                .as_deref()
                .is_some_and(|e| normalize_email(e) == normalize_email(&me.email));
            if own_id || own_email {
                Ok(())
            } else {
                Err(AuthError::Forbidden("members may only read their own user record"))
            }
        }
        Command::SelectBookings(filter) if filter.is_unfiltered() => {
            Err(AuthError::Forbidden("listing all bookings requires admin"))
        }
        Command::InsertBooking { user_id: Some(user_id), .. } if !actor.may_act_for(*user_id) => {
            Err(AuthError::Forbidden("members may only book for themselves"))
        }
        _ => Ok(()),
    }
}
