//! Sessions, the role hierarchy and guarded user mutations.

pub mod activity;
pub mod password;

use crate::config::{Argon2Config, AuthConfig};
use crate::errors::{Result, RosterError};
use crate::models::{keys, PublicUser, Role, Session, User, ROOT_ADMIN_USERNAME};
use crate::store::RecordStore;
use activity::ActivityAction;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex"));

/// Empty is allowed; anything else must look like `name@host.tld`.
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() || EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(RosterError::validation(format!("invalid email: {email}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Students,
    Classes,
    Scores,
    Subjects,
    Users,
}

impl ResourceType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "students" => Some(Self::Students),
            "classes" => Some(Self::Classes),
            "scores" => Some(Self::Scores),
            "subjects" => Some(Self::Subjects),
            "users" => Some(Self::Users),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

pub struct Auth {
    current: Option<Session>,
    activity_cap: usize,
    argon2: Argon2Config,
}

impl Auth {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            current: None,
            activity_cap: cfg.activity_log_cap,
            argon2: cfg.argon2.clone(),
        }
    }

    /// In-memory session only; see `current_user` for the hydrating read.
    pub fn session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Drop the in-memory session without touching storage (workspace switch).
    pub fn forget(&mut self) {
        self.current = None;
    }

    /// `Ok(None)` for unknown users, inactive accounts and wrong passwords.
    pub fn login(
        &mut self,
        store: &RecordStore,
        username: &str,
        password: &str,
    ) -> Result<Option<Session>> {
        let Some(user) = store.find_user_by_username(username) else {
            warn!(username, "login failed: unknown user");
            return Ok(None);
        };
        if !user.is_active {
            warn!(username, "login failed: account disabled");
            return Ok(None);
        }
        if !password::verify_password(password, &user.password) {
            warn!(username, "login failed: bad password");
            return Ok(None);
        }

        if let Some(previous) = self.current_user(store) {
            info!(previous = %previous.username, "replacing the signed-in session");
            self.logout(store)?;
        }

        let session = Session::for_user(&user);
        store.write_document(keys::SESSION, &session)?;
        self.current = Some(session.clone());
        self.log(store, &user.id, ActivityAction::Login, "Signed in");
        info!(username, role = %user.role, "logged in");
        Ok(Some(session))
    }

    pub fn logout(&mut self, store: &RecordStore) -> Result<()> {
        if let Some(session) = self.current_user(store) {
            self.log(store, &session.user_id, ActivityAction::Logout, "Signed out");
            info!(username = %session.username, "logged out");
        }
        store.remove_document(keys::SESSION)?;
        self.current = None;
        Ok(())
    }

    pub fn current_user(&mut self, store: &RecordStore) -> Option<Session> {
        if self.current.is_none() {
            self.current = store.read_document::<Session>(keys::SESSION);
        }
        self.current.clone()
    }

    pub fn has_permission(&mut self, store: &RecordStore, required: Role) -> bool {
        let session = self.current_user(store);
        has_permission_for(session.as_ref(), required)
    }

    pub fn can_access_resource(
        &mut self,
        store: &RecordStore,
        resource: ResourceType,
        id: Option<&str>,
    ) -> bool {
        let session = self.current_user(store);
        can_access(store, session.as_ref(), resource, id)
    }

    pub fn require_session(&self) -> Result<&Session> {
        self.current
            .as_ref()
            .ok_or_else(|| RosterError::denied("not logged in"))
    }

    pub fn require_admin(&self, what: &str) -> Result<&Session> {
        let session = self.require_session()?;
        if session.role != Role::Admin {
            return Err(RosterError::denied(format!("only admins may {what}")));
        }
        Ok(session)
    }

    /// Student roster changes: admins anywhere, homeroom teachers inside
    /// their own classes.
    pub fn require_roster_write(
        &self,
        store: &RecordStore,
        class_id: Option<&str>,
    ) -> Result<&Session> {
        let session = self.require_session()?;
        let allowed = match session.role {
            Role::Admin => true,
            Role::HomeroomTeacher => class_id.is_some_and(|c| {
                store
                    .homeroom_classes(&session.user_id)
                    .iter()
                    .any(|h| h.id == c)
            }),
            _ => false,
        };
        if !allowed {
            return Err(RosterError::denied("not allowed to change this class roster"));
        }
        Ok(session)
    }

    /// Score entry: admins, or subject teachers assigned to both the class and
    /// the subject.
    pub fn require_score_write(
        &self,
        store: &RecordStore,
        class_id: Option<&str>,
        subject_id: &str,
    ) -> Result<&Session> {
        let session = self.require_session()?;
        let allowed = match session.role {
            Role::Admin => true,
            Role::SubjectTeacher => {
                class_id.is_some_and(|c| store.teacher_classes(&session.user_id).iter().any(|t| t == c))
                    && store
                        .teacher_subjects(&session.user_id)
                        .iter()
                        .any(|s| s == subject_id)
            }
            _ => false,
        };
        if !allowed {
            return Err(RosterError::denied("not allowed to enter scores here"));
        }
        Ok(session)
    }

    pub fn create_user(&self, store: &RecordStore, input: NewUser) -> Result<PublicUser> {
        let actor = self.require_admin("create accounts")?;
        if input.username.trim().is_empty() {
            return Err(RosterError::validation("username must not be empty"));
        }
        if input.password.is_empty() {
            return Err(RosterError::validation("password must not be empty"));
        }
        if input.role == Role::Other {
            return Err(RosterError::validation("unknown role"));
        }
        validate_email(&input.email)?;

        let user = store.add_user(User {
            id: String::new(),
            username: input.username,
            password: password::hash_password(&input.password, &self.argon2)?,
            full_name: input.full_name,
            role: input.role,
            email: input.email,
            phone: input.phone,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            created_by: Some(actor.user_id.clone()),
            updated_at: None,
            updated_by: None,
            is_active: true,
        })?;

        self.log(
            store,
            &actor.user_id,
            ActivityAction::CreateUser,
            format!("Created account {} ({})", user.full_name, user.username),
        );
        Ok(PublicUser::from(&user))
    }

    /// Admins may edit anyone; other users only themselves and never their
    /// role or active flag.
    pub fn update_user(
        &mut self,
        store: &RecordStore,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<PublicUser> {
        let actor = self.require_session()?.clone();
        let is_admin = actor.role == Role::Admin;
        if !is_admin && actor.user_id != id {
            return Err(RosterError::denied("cannot update another user"));
        }
        let target = store
            .find_user(id)
            .ok_or_else(|| RosterError::not_found("user"))?;

        if !is_admin && (patch.contains_key("role") || patch.contains_key("isActive")) {
            return Err(RosterError::denied("only admins may change role or isActive"));
        }
        if let Some(role) = patch.get("role") {
            if role.as_str().and_then(Role::parse).is_none() {
                return Err(RosterError::validation("unknown role"));
            }
        }
        if target.username == ROOT_ADMIN_USERNAME {
            if let Some(name) = patch.get("username") {
                if name.as_str() != Some(ROOT_ADMIN_USERNAME) {
                    return Err(RosterError::denied("the root admin cannot be renamed"));
                }
            }
            if let Some(role) = patch.get("role") {
                if role.as_str() != Some(Role::Admin.as_str()) {
                    return Err(RosterError::denied("the root admin cannot be demoted"));
                }
            }
            if patch.get("isActive").is_some_and(|v| v != &Value::Bool(true)) {
                return Err(RosterError::denied("the root admin cannot be deactivated"));
            }
        }
        if let Some(email) = patch.get("email") {
            match email.as_str() {
                Some(e) => validate_email(e)?,
                None => return Err(RosterError::validation("email must be a string")),
            }
        }

        let mut effective = patch.clone();
        effective.remove("id");
        match effective.get("password") {
            None => {}
            Some(Value::String(p)) if !p.is_empty() => {
                let hashed = password::hash_password(p, &self.argon2)?;
                effective.insert("password".into(), Value::String(hashed));
            }
            Some(_) => return Err(RosterError::validation("password must be a non-empty string")),
        }
        effective.insert(
            "updatedAt".into(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        effective.insert("updatedBy".into(), Value::String(actor.user_id.clone()));

        let updated = store
            .update_user(id, &effective)?
            .ok_or_else(|| RosterError::not_found("user"))?;

        if actor.user_id == updated.id {
            let mut refreshed = actor.clone();
            refreshed.username = updated.username.clone();
            refreshed.full_name = updated.full_name.clone();
            refreshed.role = updated.role;
            store.write_document(keys::SESSION, &refreshed)?;
            self.current = Some(refreshed);
        }

        self.log(
            store,
            &actor.user_id,
            ActivityAction::UpdateUser,
            format!("Updated user {}", updated.full_name),
        );
        Ok(PublicUser::from(&updated))
    }

    pub fn delete_user(&self, store: &RecordStore, id: &str) -> Result<()> {
        let actor = self.require_admin("delete accounts")?;
        let target = store
            .find_user(id)
            .ok_or_else(|| RosterError::not_found("user"))?;
        if target.username == ROOT_ADMIN_USERNAME {
            return Err(RosterError::denied("the root admin account cannot be deleted"));
        }
        store.delete_user(id)?;
        self.log(
            store,
            &actor.user_id,
            ActivityAction::DeleteUser,
            format!("Deleted account {} ({})", target.full_name, target.username),
        );
        Ok(())
    }

    // A failed activity write never fails the operation it describes.
    fn log(&self, store: &RecordStore, user_id: &str, action: ActivityAction, desc: impl Into<String>) {
        if let Err(e) = activity::append(store, self.activity_cap, user_id, action, desc) {
            warn!(action = action.as_str(), error = %e, "activity log write failed");
        }
    }
}

pub fn has_permission_for(session: Option<&Session>, required: Role) -> bool {
    match session {
        Some(s) => s.role.level() >= required.level(),
        None => false,
    }
}

/// Record-level access. Without an id, listing-level access is granted for
/// students, classes and scores; callers narrow the rows themselves.
pub fn can_access(
    store: &RecordStore,
    session: Option<&Session>,
    resource: ResourceType,
    id: Option<&str>,
) -> bool {
    let Some(s) = session else {
        return false;
    };
    match s.role {
        Role::Admin => true,
        Role::SubjectTeacher => match (resource, id) {
            (ResourceType::Scores, _) => true,
            (ResourceType::Students | ResourceType::Classes, None) => true,
            (ResourceType::Students, Some(student_id)) => {
                let classes = store.teacher_classes(&s.user_id);
                student_class(store, student_id).is_some_and(|c| classes.contains(&c))
            }
            (ResourceType::Classes, Some(class_id)) => store
                .teacher_classes(&s.user_id)
                .iter()
                .any(|c| c == class_id),
            _ => false,
        },
        Role::HomeroomTeacher => {
            let homeroom = |class_id: &str| {
                store
                    .homeroom_classes(&s.user_id)
                    .iter()
                    .any(|c| c.id == class_id)
            };
            match (resource, id) {
                (ResourceType::Students | ResourceType::Classes | ResourceType::Scores, None) => {
                    true
                }
                (ResourceType::Students, Some(student_id)) => {
                    student_class(store, student_id).is_some_and(|c| homeroom(c.as_str()))
                }
                (ResourceType::Classes | ResourceType::Scores, Some(class_id)) => homeroom(class_id),
                _ => false,
            }
        }
        Role::Other => false,
    }
}

fn student_class(store: &RecordStore, student_id: &str) -> Option<String> {
    store.find_student(student_id).and_then(|s| s.class_id)
}
