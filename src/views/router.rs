//! Current-view state machine.
//!
//! A transition is `begin` (bump the generation) then `complete` with the
//! loaded model. A completion whose generation is no longer the latest is
//! dropped. A failed load leaves the current view in place, swaps the content
//! for an error placeholder, clears the bindings and raises a notification.
//! A class or subject selection that fails to render is rolled back.

use super::model::{self, Filters, SubjectScoreLine, ViewContext, ViewModel};
use super::View;
use crate::auth::{can_access, Auth, ResourceType};
use crate::errors::{Result, RosterError};
use crate::models::{PublicUser, Session, Student};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    SelectClass,
    SelectSubject,
    Edit,
    Delete,
    ViewStudentScores,
    Logout,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum UiAction {
    Navigate { view: View },
    SelectClass { class_id: Option<String> },
    SelectSubject { subject_id: Option<String> },
    Edit { resource: String, id: String },
    Delete { resource: String, id: String },
    ViewStudentScores { student_id: String },
    Logout,
}

impl UiAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            UiAction::Navigate { .. } => ActionKind::Navigate,
            UiAction::SelectClass { .. } => ActionKind::SelectClass,
            UiAction::SelectSubject { .. } => ActionKind::SelectSubject,
            UiAction::Edit { .. } => ActionKind::Edit,
            UiAction::Delete { .. } => ActionKind::Delete,
            UiAction::ViewStudentScores { .. } => ActionKind::ViewStudentScores,
            UiAction::Logout => ActionKind::Logout,
        }
    }
}

/// Action kinds a mounted view listens for.
pub fn bindings(view: View) -> Vec<ActionKind> {
    use ActionKind::*;
    let extra: &[ActionKind] = match view {
        View::Login => return Vec::new(),
        View::Dashboard | View::MyClasses => &[],
        View::Users | View::Classes | View::Subjects => &[Edit, Delete],
        View::Students => &[SelectClass, Edit, Delete, ViewStudentScores],
        View::Scores | View::ScoreInput => &[SelectClass, SelectSubject],
        View::Reports | View::MyReports | View::ClassReports => &[SelectSubject],
        View::MyStudents => &[SelectClass, ViewStudentScores],
        View::MyClass => &[ViewStudentScores],
        View::ClassScores => &[SelectSubject, ViewStudentScores],
        View::StudentManagement => &[Edit, Delete, ViewStudentScores],
    };
    let mut out = vec![Navigate, Logout];
    out.extend_from_slice(extra);
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Content {
    Empty,
    Mounted { model: ViewModel },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub generation: u64,
    pub view: View,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub view: View,
    pub generation: u64,
    pub filters: Filters,
    pub content: Content,
    pub bindings: Vec<ActionKind>,
    pub notification: Option<Notification>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActionOutcome {
    Rendered { snapshot: ViewSnapshot },
    EditForm { resource: String, record: Value },
    StudentScores { student: Student, scores: Vec<SubjectScoreLine> },
}

pub struct ViewRouter {
    current: View,
    generation: u64,
    filters: Filters,
    content: Content,
    bindings: Vec<ActionKind>,
    notification: Option<Notification>,
}

impl Default for ViewRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRouter {
    pub fn new() -> Self {
        Self {
            current: View::Login,
            generation: 0,
            filters: Filters::default(),
            content: Content::Empty,
            bindings: Vec::new(),
            notification: None,
        }
    }

    pub fn current(&self) -> View {
        self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn bindings(&self) -> &[ActionKind] {
        &self.bindings
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            view: self.current,
            generation: self.generation,
            filters: self.filters.clone(),
            content: self.content.clone(),
            bindings: self.bindings.clone(),
            notification: self.notification.clone(),
        }
    }

    /// Render the landing view for the session: login, or dashboard.
    pub fn reset(&mut self, session: Option<&Session>, store: &RecordStore) -> Result<()> {
        self.filters = Filters::default();
        let landing = if session.is_some() {
            View::Dashboard
        } else {
            View::Login
        };
        self.switch_view(landing, session, store)
    }

    pub fn begin(&mut self, view: View) -> Transition {
        self.generation += 1;
        self.notification = None;
        Transition {
            generation: self.generation,
            view,
        }
    }

    /// `Ok(false)` when a newer transition has started since `t` began.
    pub fn complete(&mut self, t: Transition, loaded: Result<ViewModel>) -> Result<bool> {
        if t.generation != self.generation {
            debug!(view = %t.view, stale = t.generation, latest = self.generation, "stale render discarded");
            return Ok(false);
        }
        match loaded {
            Ok(model) => {
                self.current = t.view;
                self.content = Content::Mounted { model };
                self.bindings = bindings(t.view);
                debug!(view = %t.view, generation = t.generation, "view mounted");
                Ok(true)
            }
            Err(e) => {
                warn!(view = %t.view, error = %e, "view failed to load");
                self.content = Content::Error {
                    message: format!("Could not load {}", t.view),
                };
                self.bindings.clear();
                self.notification = Some(Notification {
                    level: "error".to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn switch_view(
        &mut self,
        view: View,
        session: Option<&Session>,
        store: &RecordStore,
    ) -> Result<()> {
        self.filters.drop_dangling(store);
        self.render(view, session, store)
    }

    fn render(&mut self, view: View, session: Option<&Session>, store: &RecordStore) -> Result<()> {
        let target = resolve(view, session);
        let t = self.begin(target);
        let loaded = guard(target, session).and_then(|()| {
            let ctx = ViewContext {
                session,
                store,
                filters: &self.filters,
            };
            model::load(target, &ctx)
        });
        self.complete(t, loaded).map(|_| ())
    }

    /// Run a UI action against the mounted view.
    pub fn dispatch(
        &mut self,
        action: UiAction,
        auth: &mut Auth,
        store: &RecordStore,
    ) -> Result<ActionOutcome> {
        if !self.bindings.contains(&action.kind()) {
            return Err(RosterError::validation(format!(
                "{:?} is not handled by the {} view",
                action.kind(),
                self.current
            )));
        }

        match action {
            UiAction::Navigate { view } => {
                self.switch_view(view, auth.session(), store)?;
            }
            UiAction::SelectClass { class_id } => {
                let mut next = self.filters.clone();
                next.class_id = class_id;
                self.apply_filters(next, auth, store)?;
            }
            UiAction::SelectSubject { subject_id } => {
                let mut next = self.filters.clone();
                next.subject_id = subject_id;
                self.apply_filters(next, auth, store)?;
            }
            UiAction::Edit { resource, id } => {
                let record = edit_record(auth, store, &resource, &id)?;
                return Ok(ActionOutcome::EditForm { resource, record });
            }
            UiAction::Delete { resource, id } => {
                delete_record(auth, store, &resource, &id)?;
                self.rerender(auth, store)?;
            }
            UiAction::ViewStudentScores { student_id } => {
                if !can_access(store, auth.session(), ResourceType::Students, Some(&student_id)) {
                    return Err(RosterError::denied("student is outside your classes"));
                }
                let (student, scores) = model::student_scores(store, &student_id)?;
                return Ok(ActionOutcome::StudentScores { student, scores });
            }
            UiAction::Logout => {
                auth.logout(store)?;
                self.reset(None, store)?;
            }
        }
        Ok(ActionOutcome::Rendered {
            snapshot: self.snapshot(),
        })
    }

    fn rerender(&mut self, auth: &Auth, store: &RecordStore) -> Result<()> {
        let view = self.current;
        self.switch_view(view, auth.session(), store)
    }

    /// A selection only sticks once the view renders with it.
    fn apply_filters(&mut self, next: Filters, auth: &Auth, store: &RecordStore) -> Result<()> {
        let previous = std::mem::replace(&mut self.filters, next);
        let view = self.current;
        let rendered = self.render(view, auth.session(), store);
        if rendered.is_err() {
            self.filters = previous;
        }
        rendered
    }
}

fn resolve(view: View, session: Option<&Session>) -> View {
    match (session, view) {
        (None, _) => View::Login,
        (Some(_), View::Login) => View::Dashboard,
        (Some(_), v) => v,
    }
}

fn guard(view: View, session: Option<&Session>) -> Result<()> {
    match session {
        None => Ok(()),
        Some(s) if View::navigation(s.role).contains(&view) => Ok(()),
        Some(s) => Err(RosterError::denied(format!(
            "{} is not available to {}",
            view, s.role
        ))),
    }
}

fn parse_resource(resource: &str) -> Result<ResourceType> {
    ResourceType::parse(resource)
        .ok_or_else(|| RosterError::validation(format!("unknown resource: {resource}")))
}

fn edit_record(auth: &Auth, store: &RecordStore, resource: &str, id: &str) -> Result<Value> {
    let kind = parse_resource(resource)?;
    let session = auth.require_session()?;
    if kind == ResourceType::Users {
        if session.role != crate::models::Role::Admin && session.user_id != id {
            return Err(RosterError::denied("cannot edit another user"));
        }
    } else if !can_access(store, Some(session), kind, Some(id)) {
        return Err(RosterError::denied(format!("no access to this {resource} record")));
    }

    let record = match kind {
        ResourceType::Users => store
            .find_user(id)
            .map(|u| serde_json::to_value(PublicUser::from(&u))),
        ResourceType::Students => store.find_student(id).map(|s| serde_json::to_value(s)),
        ResourceType::Classes => store.find_class(id).map(|c| serde_json::to_value(c)),
        ResourceType::Subjects => store.find_subject(id).map(|s| serde_json::to_value(s)),
        ResourceType::Scores => store
            .scores()
            .into_iter()
            .find(|s| s.id == id)
            .map(|s| serde_json::to_value(s)),
    };
    match record {
        Some(v) => Ok(v?),
        None => Err(RosterError::not_found(resource)),
    }
}

/// Same guards as the request handlers.
pub fn delete_record(auth: &Auth, store: &RecordStore, resource: &str, id: &str) -> Result<()> {
    match parse_resource(resource)? {
        ResourceType::Users => auth.delete_user(store, id),
        ResourceType::Students => {
            let student = store
                .find_student(id)
                .ok_or_else(|| RosterError::not_found("student"))?;
            auth.require_roster_write(store, student.class_id.as_deref())?;
            store.delete_student(id)?;
            Ok(())
        }
        ResourceType::Classes => {
            auth.require_admin("delete classes")?;
            if !store.delete_class(id)? {
                return Err(RosterError::not_found("class"));
            }
            Ok(())
        }
        ResourceType::Subjects => {
            auth.require_admin("delete subjects")?;
            if !store.delete_subject(id)? {
                return Err(RosterError::not_found("subject"));
            }
            Ok(())
        }
        ResourceType::Scores => Err(RosterError::validation(
            "scores are cleared by saving empty fields, not deleted",
        )),
    }
}
