pub mod model;
pub mod router;

pub use model::{Filters, ViewContext, ViewModel};
pub use router::{ActionKind, ActionOutcome, UiAction, ViewRouter, ViewSnapshot};

use crate::models::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Login,
    Dashboard,
    // admin
    Users,
    Students,
    Classes,
    Subjects,
    Scores,
    Reports,
    // subject teacher
    MyClasses,
    MyStudents,
    ScoreInput,
    MyReports,
    // homeroom teacher
    MyClass,
    ClassScores,
    StudentManagement,
    ClassReports,
}

const ADMIN_NAV: &[View] = &[
    View::Dashboard,
    View::Users,
    View::Students,
    View::Classes,
    View::Subjects,
    View::Scores,
    View::Reports,
];

const SUBJECT_TEACHER_NAV: &[View] = &[
    View::Dashboard,
    View::MyClasses,
    View::MyStudents,
    View::ScoreInput,
    View::MyReports,
];

const HOMEROOM_NAV: &[View] = &[
    View::Dashboard,
    View::MyClass,
    View::ClassScores,
    View::StudentManagement,
    View::ClassReports,
];

impl View {
    pub const ALL: [View; 16] = [
        View::Login,
        View::Dashboard,
        View::Users,
        View::Students,
        View::Classes,
        View::Subjects,
        View::Scores,
        View::Reports,
        View::MyClasses,
        View::MyStudents,
        View::ScoreInput,
        View::MyReports,
        View::MyClass,
        View::ClassScores,
        View::StudentManagement,
        View::ClassReports,
    ];

    pub fn name(self) -> &'static str {
        match self {
            View::Login => "login",
            View::Dashboard => "dashboard",
            View::Users => "users",
            View::Students => "students",
            View::Classes => "classes",
            View::Subjects => "subjects",
            View::Scores => "scores",
            View::Reports => "reports",
            View::MyClasses => "my-classes",
            View::MyStudents => "my-students",
            View::ScoreInput => "score-input",
            View::MyReports => "my-reports",
            View::MyClass => "my-class",
            View::ClassScores => "class-scores",
            View::StudentManagement => "student-management",
            View::ClassReports => "class-reports",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == s)
    }

    /// Sidebar entries for a role, in display order.
    pub fn navigation(role: Role) -> &'static [View] {
        match role {
            Role::Admin => ADMIN_NAV,
            Role::SubjectTeacher => SUBJECT_TEACHER_NAV,
            Role::HomeroomTeacher => HOMEROOM_NAV,
            Role::Other => &[View::Dashboard],
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip_through_parse() {
        for v in View::ALL {
            assert_eq!(View::parse(v.name()), Some(v));
            let wire = serde_json::to_value(v).expect("serialize");
            assert_eq!(wire, serde_json::Value::String(v.name().to_string()));
        }
        assert_eq!(View::parse("settings"), None);
    }

    #[test]
    fn every_role_lands_on_dashboard() {
        for role in [Role::Admin, Role::SubjectTeacher, Role::HomeroomTeacher] {
            assert_eq!(View::navigation(role)[0], View::Dashboard);
            assert!(!View::navigation(role).contains(&View::Login));
        }
        assert!(!View::navigation(Role::SubjectTeacher).contains(&View::Users));
    }
}
