//! Data behind each view, loaded from the store for an explicit context.

use super::View;
use crate::auth::activity;
use crate::auth::{can_access, ResourceType};
use crate::errors::{Result, RosterError};
use crate::grading::{self, average_score, round_1_decimal, ClassReport, SubjectReport};
use crate::models::{ActivityLogEntry, Class, PublicUser, Role, Session, Student, Subject};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DASHBOARD_ACTIVITY_ROWS: usize = 10;

/// Transient selections; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
}

impl Filters {
    /// Forget selections whose class or subject no longer exists.
    pub fn drop_dangling(&mut self, store: &RecordStore) {
        if let Some(id) = self.class_id.take() {
            if store.find_class(&id).is_some() {
                self.class_id = Some(id);
            } else {
                debug!(class_id = %id, "class filter dropped");
            }
        }
        if let Some(id) = self.subject_id.take() {
            if store.find_subject(&id).is_some() {
                self.subject_id = Some(id);
            } else {
                debug!(subject_id = %id, "subject filter dropped");
            }
        }
    }
}

pub struct ViewContext<'a> {
    pub session: Option<&'a Session>,
    pub store: &'a RecordStore,
    pub filters: &'a Filters,
}

impl<'a> ViewContext<'a> {
    fn session(&self) -> Result<&'a Session> {
        self.session
            .ok_or_else(|| RosterError::denied("not logged in"))
    }

    fn require_class(&self, resource_class: &str) -> Result<()> {
        if can_access(self.store, self.session, ResourceType::Classes, Some(resource_class)) {
            Ok(())
        } else {
            Err(RosterError::denied("class is outside your assignments"))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_students: usize,
    pub total_teachers: usize,
    pub total_classes: usize,
    pub total_subjects: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassOverview {
    pub class: Class,
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    #[serde(flatten)]
    pub student: Student,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRow {
    #[serde(flatten)]
    pub class: Class,
    pub home_room_teacher_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScoreLine {
    pub subject_id: String,
    pub subject_name: String,
    pub oral: Option<f64>,
    pub test15: Option<f64>,
    pub test45: Option<f64>,
    pub midterm: Option<f64>,
    #[serde(rename = "final")]
    pub final_exam: Option<f64>,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ViewModel {
    Login,
    Dashboard {
        role: Role,
        full_name: String,
        navigation: Vec<View>,
        stats: Option<AdminStats>,
        recent_activity: Vec<ActivityLogEntry>,
        teaching_classes: Vec<Class>,
        teaching_subjects: Vec<Subject>,
        homeroom: Vec<ClassOverview>,
    },
    Users {
        users: Vec<PublicUser>,
    },
    Students {
        students: Vec<StudentRow>,
        classes: Vec<Class>,
        selected_class: Option<String>,
    },
    Classes {
        classes: Vec<ClassRow>,
    },
    Subjects {
        subjects: Vec<Subject>,
    },
    Scores {
        classes: Vec<Class>,
        subjects: Vec<Subject>,
        selected_class: Option<String>,
        selected_subject: Option<String>,
        sheet: Option<ClassReport>,
    },
    Reports {
        subject_reports: Vec<SubjectReport>,
    },
    MyClasses {
        classes: Vec<Class>,
    },
    MyStudents {
        students: Vec<StudentRow>,
        classes: Vec<Class>,
        selected_class: Option<String>,
    },
    ScoreInput {
        classes: Vec<Class>,
        subjects: Vec<Subject>,
        selected_class: Option<String>,
        selected_subject: Option<String>,
        sheet: Option<ClassReport>,
    },
    MyReports {
        subject_reports: Vec<SubjectReport>,
    },
    MyClass {
        classes: Vec<ClassOverview>,
    },
    ClassScores {
        class: Option<Class>,
        subjects: Vec<Subject>,
        selected_subject: Option<String>,
        sheet: Option<ClassReport>,
    },
    StudentManagement {
        class: Option<Class>,
        students: Vec<StudentRow>,
    },
    ClassReports {
        class: Option<Class>,
        reports: Vec<ClassReport>,
    },
}

pub fn load(view: View, ctx: &ViewContext<'_>) -> Result<ViewModel> {
    match view {
        View::Login => Ok(ViewModel::Login),
        View::Dashboard => dashboard(ctx),
        View::Users => Ok(ViewModel::Users {
            users: ctx.store.users().iter().map(PublicUser::from).collect(),
        }),
        View::Students => {
            let selected = selected_class(ctx)?;
            let students = match selected.as_deref() {
                Some(c) => ctx.store.students_by_class(c),
                None => ctx.store.students(),
            };
            Ok(ViewModel::Students {
                students: student_rows(ctx.store, students),
                classes: ctx.store.classes_with_counts(),
                selected_class: selected,
            })
        }
        View::Classes => {
            let users = ctx.store.users();
            let classes = ctx
                .store
                .classes_with_counts()
                .into_iter()
                .map(|c| ClassRow {
                    home_room_teacher_name: c.home_room_teacher.as_deref().and_then(|t| {
                        users.iter().find(|u| u.id == t).map(|u| u.full_name.clone())
                    }),
                    class: c,
                })
                .collect();
            Ok(ViewModel::Classes { classes })
        }
        View::Subjects => Ok(ViewModel::Subjects {
            subjects: ctx.store.subjects(),
        }),
        View::Scores => {
            let (selected_class, selected_subject) = (selected_class(ctx)?, selected_subject(ctx)?);
            Ok(ViewModel::Scores {
                sheet: sheet(ctx, selected_class.as_deref(), selected_subject.as_deref())?,
                classes: ctx.store.classes_with_counts(),
                subjects: ctx.store.subjects(),
                selected_class,
                selected_subject,
            })
        }
        View::Reports => {
            let subject_reports = ctx
                .store
                .subjects()
                .iter()
                .map(|s| grading::subject_report(ctx.store, &s.id))
                .collect::<Result<Vec<_>>>()?;
            Ok(ViewModel::Reports { subject_reports })
        }
        View::MyClasses => {
            let session = ctx.session()?;
            Ok(ViewModel::MyClasses {
                classes: ctx.store.classes_by_teacher(&session.user_id),
            })
        }
        View::MyStudents => {
            let session = ctx.session()?;
            let classes = ctx.store.classes_by_teacher(&session.user_id);
            let selected = selected_class(ctx)?;
            if let Some(c) = selected.as_deref() {
                ctx.require_class(c)?;
            }
            let students = classes
                .iter()
                .filter(|c| selected.as_deref().map_or(true, |s| s == c.id))
                .flat_map(|c| ctx.store.students_by_class(&c.id))
                .collect();
            Ok(ViewModel::MyStudents {
                students: student_rows(ctx.store, students),
                classes,
                selected_class: selected,
            })
        }
        View::ScoreInput => {
            let session = ctx.session()?;
            let classes = ctx.store.classes_by_teacher(&session.user_id);
            let subject_ids = ctx.store.teacher_subjects(&session.user_id);
            let subjects: Vec<Subject> = ctx
                .store
                .subjects()
                .into_iter()
                .filter(|s| subject_ids.contains(&s.id))
                .collect();
            let (selected_class, selected_subject) = (selected_class(ctx)?, selected_subject(ctx)?);
            if let Some(c) = selected_class.as_deref() {
                ctx.require_class(c)?;
            }
            if let Some(s) = selected_subject.as_deref() {
                if !subject_ids.iter().any(|id| id == s) {
                    return Err(RosterError::denied("subject is outside your assignments"));
                }
            }
            Ok(ViewModel::ScoreInput {
                sheet: sheet(ctx, selected_class.as_deref(), selected_subject.as_deref())?,
                classes,
                subjects,
                selected_class,
                selected_subject,
            })
        }
        View::MyReports => {
            let session = ctx.session()?;
            let subject_reports = ctx
                .store
                .teacher_subjects(&session.user_id)
                .iter()
                .map(|s| grading::subject_report(ctx.store, s))
                .collect::<Result<Vec<_>>>()?;
            Ok(ViewModel::MyReports { subject_reports })
        }
        View::MyClass => Ok(ViewModel::MyClass {
            classes: homeroom_overview(ctx)?,
        }),
        View::ClassScores => {
            let class = homeroom_class(ctx)?;
            let selected = selected_subject(ctx)?;
            let sheet = match &class {
                Some(c) => sheet(ctx, Some(&c.id), selected.as_deref())?,
                None => None,
            };
            Ok(ViewModel::ClassScores {
                class,
                subjects: ctx.store.subjects(),
                selected_subject: selected,
                sheet,
            })
        }
        View::StudentManagement => {
            let class = homeroom_class(ctx)?;
            let students = class
                .as_ref()
                .map(|c| ctx.store.students_by_class(&c.id))
                .unwrap_or_default();
            Ok(ViewModel::StudentManagement {
                students: student_rows(ctx.store, students),
                class,
            })
        }
        View::ClassReports => {
            let class = homeroom_class(ctx)?;
            let reports = match &class {
                Some(c) => ctx
                    .store
                    .subjects()
                    .iter()
                    .filter(|s| ctx.filters.subject_id.as_deref().map_or(true, |f| f == s.id))
                    .map(|s| grading::class_report(ctx.store, &c.id, &s.id))
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            Ok(ViewModel::ClassReports { class, reports })
        }
    }
}

/// Per-subject marks of one student, used by the "view scores" action.
pub fn student_scores(store: &RecordStore, student_id: &str) -> Result<(Student, Vec<SubjectScoreLine>)> {
    let student = store
        .find_student(student_id)
        .ok_or_else(|| RosterError::not_found("student"))?;
    let subjects = store.subjects();
    let lines = store
        .scores_by_student(student_id)
        .into_iter()
        .map(|s| SubjectScoreLine {
            subject_name: subjects
                .iter()
                .find(|m| m.id == s.subject_id)
                .map(|m| m.name.clone())
                .unwrap_or_default(),
            average: average_score(&s).map(round_1_decimal),
            subject_id: s.subject_id,
            oral: s.oral,
            test15: s.test15,
            test45: s.test45,
            midterm: s.midterm,
            final_exam: s.final_exam,
        })
        .collect();
    Ok((student, lines))
}

fn dashboard(ctx: &ViewContext<'_>) -> Result<ViewModel> {
    let session = ctx.session()?;
    let store = ctx.store;
    let mut stats = None;
    let mut recent_activity = Vec::new();
    let mut teaching_classes = Vec::new();
    let mut teaching_subjects = Vec::new();
    let mut homeroom = Vec::new();

    match session.role {
        Role::Admin => {
            let users = store.users();
            stats = Some(AdminStats {
                total_students: store.students().len(),
                total_teachers: users.iter().filter(|u| u.role != Role::Admin).count(),
                total_classes: store.classes().len(),
                total_subjects: store.subjects().len(),
            });
            recent_activity = activity::recent(store, DASHBOARD_ACTIVITY_ROWS);
        }
        Role::SubjectTeacher => {
            teaching_classes = store.classes_by_teacher(&session.user_id);
            let ids = store.teacher_subjects(&session.user_id);
            teaching_subjects = store
                .subjects()
                .into_iter()
                .filter(|s| ids.contains(&s.id))
                .collect();
        }
        Role::HomeroomTeacher => homeroom = homeroom_overview(ctx)?,
        Role::Other => {}
    }

    Ok(ViewModel::Dashboard {
        role: session.role,
        full_name: session.full_name.clone(),
        navigation: View::navigation(session.role).to_vec(),
        stats,
        recent_activity,
        teaching_classes,
        teaching_subjects,
        homeroom,
    })
}

fn selected_class(ctx: &ViewContext<'_>) -> Result<Option<String>> {
    match ctx.filters.class_id.as_deref() {
        Some(id) if ctx.store.find_class(id).is_none() => Err(RosterError::not_found("class")),
        other => Ok(other.map(str::to_string)),
    }
}

fn selected_subject(ctx: &ViewContext<'_>) -> Result<Option<String>> {
    match ctx.filters.subject_id.as_deref() {
        Some(id) if ctx.store.find_subject(id).is_none() => Err(RosterError::not_found("subject")),
        other => Ok(other.map(str::to_string)),
    }
}

fn sheet(ctx: &ViewContext<'_>, class_id: Option<&str>, subject_id: Option<&str>) -> Result<Option<ClassReport>> {
    match (class_id, subject_id) {
        (Some(c), Some(s)) => grading::class_report(ctx.store, c, s).map(Some),
        _ => Ok(None),
    }
}

fn homeroom_overview(ctx: &ViewContext<'_>) -> Result<Vec<ClassOverview>> {
    let session = ctx.session()?;
    let counted = ctx.store.classes_with_counts();
    Ok(ctx
        .store
        .homeroom_classes(&session.user_id)
        .into_iter()
        .map(|c| ClassOverview {
            students: ctx.store.students_by_class(&c.id),
            class: counted.iter().find(|k| k.id == c.id).cloned().unwrap_or(c),
        })
        .collect())
}

/// The selected homeroom class, else the teacher's first one.
fn homeroom_class(ctx: &ViewContext<'_>) -> Result<Option<Class>> {
    let session = ctx.session()?;
    let mine = ctx.store.homeroom_classes(&session.user_id);
    match ctx.filters.class_id.as_deref() {
        Some(id) => {
            ctx.require_class(id)?;
            Ok(mine.into_iter().find(|c| c.id == id))
        }
        None => Ok(mine.into_iter().next()),
    }
}

fn student_rows(store: &RecordStore, students: Vec<Student>) -> Vec<StudentRow> {
    let classes = store.classes();
    students
        .into_iter()
        .map(|s| StudentRow {
            class_name: s
                .class_id
                .as_deref()
                .and_then(|id| classes.iter().find(|c| c.id == id))
                .map(|c| c.name.clone()),
            student: s,
        })
        .collect()
}
