//! Typed record collections over the document store.
//!
//! Each collection is one JSON array under its key. Reads that fail (malformed
//! JSON, wrong shape) are logged and treated as an empty collection so the
//! console stays usable; writes propagate their errors.

use crate::auth::password;
use crate::config::AuthConfig;
use crate::errors::{Result, RosterError};
use crate::models::{
    keys, Class, Role, Score, ScoreField, Student, Subject, TeacherAssignment, User,
    ROOT_ADMIN_USERNAME,
};
use crate::storage::{DocumentStore, MemoryStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub trait Record: Serialize + DeserializeOwned + Clone {
    const KEY: &'static str;
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

macro_rules! impl_record {
    ($ty:ty, $key:expr, $kind:literal) => {
        impl Record for $ty {
            const KEY: &'static str = $key;
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

impl_record!(User, keys::USERS, "user");
impl_record!(Student, keys::STUDENTS, "student");
impl_record!(Class, keys::CLASSES, "class");
impl_record!(Subject, keys::SUBJECTS, "subject");
impl_record!(Score, keys::SCORES, "score");
impl_record!(TeacherAssignment, keys::TEACHER_ASSIGNMENTS, "teacher assignment");

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Provided keys overwrite, everything else is kept. `id` never changes.
pub fn shallow_merge(target: &mut Value, patch: &Map<String, Value>) -> Result<()> {
    let obj = target
        .as_object_mut()
        .ok_or_else(|| RosterError::Storage("record is not a JSON object".into()))?;
    for (k, v) in patch {
        if k == "id" {
            continue;
        }
        obj.insert(k.clone(), v.clone());
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub seeded: Vec<&'static str>,
    pub migrated_users: usize,
    pub admin_created: bool,
}

pub struct RecordStore {
    docs: Box<dyn DocumentStore>,
}

impl RecordStore {
    pub fn new(docs: Box<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    pub fn documents(&self) -> &dyn DocumentStore {
        self.docs.as_ref()
    }

    pub fn read_document<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.docs.get_json(key) {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "unreadable document, treating as empty");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "document has unexpected shape, treating as empty");
                None
            }
        }
    }

    pub fn write_document<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let v = serde_json::to_value(value)?;
        self.docs.set_json(key, &v)
    }

    pub fn remove_document(&self, key: &str) -> Result<()> {
        self.docs.remove(key)
    }

    // ---- generic collection access ----

    pub fn list<T: Record>(&self) -> Vec<T> {
        self.read_document::<Vec<T>>(T::KEY).unwrap_or_default()
    }

    pub fn find<T: Record>(&self, id: &str) -> Option<T> {
        self.list::<T>().into_iter().find(|r| r.id() == id)
    }

    pub fn save_all<T: Record>(&self, rows: &[T]) -> Result<()> {
        debug!(collection = T::KEY, rows = rows.len(), "write collection");
        self.write_document(T::KEY, &rows)
    }

    pub fn insert<T: Record>(&self, mut record: T) -> Result<T> {
        let mut rows = self.list::<T>();
        record.set_id(new_id());
        rows.push(record.clone());
        self.save_all(&rows)?;
        Ok(record)
    }

    /// `Ok(None)` when no record has this id.
    pub fn patch<T: Record>(&self, id: &str, patch: &Map<String, Value>) -> Result<Option<T>> {
        let mut rows = self.list::<T>();
        let Some(idx) = rows.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };
        let merged = merge_record(&rows[idx], patch)?;
        rows[idx] = merged.clone();
        self.save_all(&rows)?;
        Ok(Some(merged))
    }

    pub fn remove<T: Record>(&self, id: &str) -> Result<bool> {
        let mut rows = self.list::<T>();
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        if rows.len() == before {
            return Ok(false);
        }
        self.save_all(&rows)?;
        Ok(true)
    }

    // ---- bootstrap ----

    /// Seed default rows for every collection with no persisted value and make
    /// sure the root admin account exists. Safe to call on every open.
    pub fn ensure_defaults(&self, auth: &AuthConfig) -> Result<SeedReport> {
        let mut report = SeedReport {
            migrated_users: self.migrate_legacy_users(auth)?,
            ..SeedReport::default()
        };

        if !self.docs.contains(keys::CLASSES)? {
            self.save_all(&default_classes())?;
            report.seeded.push(keys::CLASSES);
        }
        if !self.docs.contains(keys::SUBJECTS)? {
            self.save_all(&default_subjects())?;
            report.seeded.push(keys::SUBJECTS);
        }
        for key in [keys::STUDENTS, keys::SCORES, keys::TEACHER_ASSIGNMENTS] {
            if !self.docs.contains(key)? {
                self.write_document(key, &Vec::<Value>::new())?;
                report.seeded.push(key);
            }
        }
        if !self.docs.contains(keys::USERS)? {
            self.write_document(keys::USERS, &Vec::<User>::new())?;
            report.seeded.push(keys::USERS);
        }
        if self.find_user_by_username(ROOT_ADMIN_USERNAME).is_none() {
            let mut users = self.users();
            users.push(bootstrap_admin(auth)?);
            self.save_all(&users)?;
            report.admin_created = true;
        }

        if !report.seeded.is_empty() || report.admin_created {
            info!(seeded = ?report.seeded, admin_created = report.admin_created, "seeded defaults");
        }
        Ok(report)
    }

    fn migrate_legacy_users(&self, auth: &AuthConfig) -> Result<usize> {
        if !self.docs.contains(keys::LEGACY_USERS)? {
            return Ok(0);
        }
        let legacy: Vec<Value> = self.read_document(keys::LEGACY_USERS).unwrap_or_default();
        let mut users = self.users();
        let mut known: HashSet<String> = users.iter().map(|u| u.username.clone()).collect();
        let mut migrated = 0usize;

        for raw in legacy {
            let mut user: User = match serde_json::from_value(raw) {
                Ok(u) => u,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable legacy user");
                    continue;
                }
            };
            if !known.insert(user.username.clone()) {
                continue;
            }
            if user.id.is_empty() {
                user.id = new_id();
            }
            if !user.password.starts_with("$argon2") {
                if user.username == ROOT_ADMIN_USERNAME {
                    user.password = password::hash_password(&auth.admin_password, &auth.argon2)?;
                } else {
                    warn!(username = %user.username, "legacy password hash kept; account needs a password reset");
                }
            }
            users.push(user);
            migrated += 1;
        }

        self.save_all(&users)?;
        self.docs.remove(keys::LEGACY_USERS)?;
        warn!(migrated, "merged legacy users_data into users");
        Ok(migrated)
    }

    // ---- users ----

    pub fn users(&self) -> Vec<User> {
        self.list()
    }

    pub fn find_user(&self, id: &str) -> Option<User> {
        self.find(id)
    }

    pub fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.users().into_iter().find(|u| u.username == username)
    }

    pub fn add_user(&self, user: User) -> Result<User> {
        if user.username.trim().is_empty() {
            return Err(RosterError::validation("username must not be empty"));
        }
        if self.find_user_by_username(&user.username).is_some() {
            return Err(RosterError::validation("username already exists"));
        }
        self.insert(user)
    }

    pub fn update_user(&self, id: &str, patch: &Map<String, Value>) -> Result<Option<User>> {
        if let Some(name) = patch.get("username").and_then(|v| v.as_str()) {
            if name.trim().is_empty() {
                return Err(RosterError::validation("username must not be empty"));
            }
            if let Some(other) = self.find_user_by_username(name) {
                if other.id != id {
                    return Err(RosterError::validation("username already exists"));
                }
            }
        }
        self.patch(id, patch)
    }

    /// Also drops the user's teacher assignments and homeroom references.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        if let Some(u) = self.find_user(id) {
            if u.username == ROOT_ADMIN_USERNAME {
                return Err(RosterError::denied("the root admin account cannot be deleted"));
            }
        }
        if !self.remove::<User>(id)? {
            return Ok(false);
        }

        let mut assignments = self.teacher_assignments();
        let before = assignments.len();
        assignments.retain(|a| a.teacher_id != id);
        if assignments.len() != before {
            self.save_all(&assignments)?;
        }

        let mut classes = self.classes();
        let mut touched = false;
        for c in classes.iter_mut() {
            if c.home_room_teacher.as_deref() == Some(id) {
                c.home_room_teacher = None;
                touched = true;
            }
        }
        if touched {
            self.save_all(&classes)?;
        }

        let mut subjects = self.subjects();
        let mut touched = false;
        for s in subjects.iter_mut() {
            let n = s.teachers.len();
            s.teachers.retain(|t| t != id);
            touched |= s.teachers.len() != n;
        }
        if touched {
            self.save_all(&subjects)?;
        }
        Ok(true)
    }

    // ---- students ----

    pub fn students(&self) -> Vec<Student> {
        self.list()
    }

    pub fn find_student(&self, id: &str) -> Option<Student> {
        self.find(id)
    }

    pub fn students_by_class(&self, class_id: &str) -> Vec<Student> {
        self.students()
            .into_iter()
            .filter(|s| s.class_id.as_deref() == Some(class_id))
            .collect()
    }

    pub fn add_student(&self, student: Student) -> Result<Student> {
        self.validate_student(&student, None)?;
        self.insert(student)
    }

    pub fn update_student(&self, id: &str, patch: &Map<String, Value>) -> Result<Option<Student>> {
        let Some(current) = self.find_student(id) else {
            return Ok(None);
        };
        let merged: Student = merge_record(&current, patch)?;
        self.validate_student(&merged, Some(id))?;
        self.patch(id, patch)
    }

    /// Removes the student and every score row that references it.
    pub fn delete_student(&self, id: &str) -> Result<bool> {
        if !self.remove::<Student>(id)? {
            return Ok(false);
        }
        let mut scores = self.scores();
        let before = scores.len();
        scores.retain(|s| s.student_id != id);
        if scores.len() != before {
            self.save_all(&scores)?;
        }
        debug!(student_id = id, removed_scores = before - scores.len(), "student deleted");
        Ok(true)
    }

    fn validate_student(&self, s: &Student, self_id: Option<&str>) -> Result<()> {
        if s.full_name.trim().is_empty() {
            return Err(RosterError::validation("fullName must not be empty"));
        }
        if s.student_code.trim().is_empty() {
            return Err(RosterError::validation("studentCode must not be empty"));
        }
        let clash = self
            .students()
            .into_iter()
            .any(|o| o.student_code == s.student_code && Some(o.id.as_str()) != self_id);
        if clash {
            return Err(RosterError::validation("studentCode already exists"));
        }
        if let Some(class_id) = s.class_id.as_deref() {
            if self.find_class(class_id).is_none() {
                return Err(RosterError::validation(format!("unknown classId: {class_id}")));
            }
        }
        Ok(())
    }

    // ---- classes ----

    pub fn classes(&self) -> Vec<Class> {
        self.list()
    }

    pub fn find_class(&self, id: &str) -> Option<Class> {
        self.find(id)
    }

    /// Classes with `studentCount` recomputed from the students collection.
    pub fn classes_with_counts(&self) -> Vec<Class> {
        let students = self.students();
        self.classes()
            .into_iter()
            .map(|mut c| {
                c.student_count = students
                    .iter()
                    .filter(|s| s.class_id.as_deref() == Some(c.id.as_str()))
                    .count();
                c
            })
            .collect()
    }

    pub fn add_class(&self, mut class: Class) -> Result<Class> {
        validate_class(&class)?;
        class.student_count = 0;
        self.insert(class)
    }

    pub fn update_class(&self, id: &str, patch: &Map<String, Value>) -> Result<Option<Class>> {
        let Some(current) = self.find_class(id) else {
            return Ok(None);
        };
        let merged: Class = merge_record(&current, patch)?;
        validate_class(&merged)?;
        self.patch(id, patch)
    }

    /// Students of the class become unassigned; its teacher assignments go.
    pub fn delete_class(&self, id: &str) -> Result<bool> {
        if !self.remove::<Class>(id)? {
            return Ok(false);
        }
        let mut students = self.students();
        let mut touched = false;
        for s in students.iter_mut() {
            if s.class_id.as_deref() == Some(id) {
                s.class_id = None;
                touched = true;
            }
        }
        if touched {
            self.save_all(&students)?;
        }
        let mut assignments = self.teacher_assignments();
        let before = assignments.len();
        assignments.retain(|a| a.class_id != id);
        if assignments.len() != before {
            self.save_all(&assignments)?;
        }
        Ok(true)
    }

    pub fn homeroom_classes(&self, teacher_id: &str) -> Vec<Class> {
        self.classes()
            .into_iter()
            .filter(|c| c.home_room_teacher.as_deref() == Some(teacher_id))
            .collect()
    }

    // ---- subjects ----

    pub fn subjects(&self) -> Vec<Subject> {
        self.list()
    }

    pub fn find_subject(&self, id: &str) -> Option<Subject> {
        self.find(id)
    }

    pub fn add_subject(&self, subject: Subject) -> Result<Subject> {
        self.validate_subject(&subject, None)?;
        self.insert(subject)
    }

    pub fn update_subject(&self, id: &str, patch: &Map<String, Value>) -> Result<Option<Subject>> {
        let Some(current) = self.find_subject(id) else {
            return Ok(None);
        };
        let merged: Subject = merge_record(&current, patch)?;
        self.validate_subject(&merged, Some(id))?;
        self.patch(id, patch)
    }

    /// Scores recorded for the subject go with it.
    pub fn delete_subject(&self, id: &str) -> Result<bool> {
        if !self.remove::<Subject>(id)? {
            return Ok(false);
        }
        let mut scores = self.scores();
        let before = scores.len();
        scores.retain(|s| s.subject_id != id);
        if scores.len() != before {
            self.save_all(&scores)?;
        }
        Ok(true)
    }

    fn validate_subject(&self, s: &Subject, self_id: Option<&str>) -> Result<()> {
        if s.code.trim().is_empty() {
            return Err(RosterError::validation("code must not be empty"));
        }
        if s.name.trim().is_empty() {
            return Err(RosterError::validation("name must not be empty"));
        }
        let clash = self
            .subjects()
            .into_iter()
            .any(|o| o.code == s.code && Some(o.id.as_str()) != self_id);
        if clash {
            return Err(RosterError::validation("subject code already exists"));
        }
        Ok(())
    }

    // ---- scores ----

    pub fn scores(&self) -> Vec<Score> {
        self.list()
    }

    /// Insert-or-merge keyed by (studentId, subjectId). Fields absent from
    /// `partial` keep their stored values; an explicit null clears one.
    pub fn add_or_update_score(&self, partial: &Map<String, Value>) -> Result<Score> {
        let student_id = required_str(partial, "studentId")?;
        let subject_id = required_str(partial, "subjectId")?;
        validate_score_fields(partial)?;
        let student = self
            .find_student(&student_id)
            .ok_or_else(|| RosterError::validation(format!("unknown studentId: {student_id}")))?;
        if self.find_subject(&subject_id).is_none() {
            return Err(RosterError::validation(format!("unknown subjectId: {subject_id}")));
        }

        let mut scores = self.scores();
        let existing = scores
            .iter()
            .position(|s| s.student_id == student_id && s.subject_id == subject_id);

        let row = match existing {
            Some(idx) => {
                let merged: Score = merge_record(&scores[idx], partial)?;
                scores[idx] = merged.clone();
                merged
            }
            None => {
                let mut value = Value::Object(partial.clone());
                if partial.get("classId").map_or(true, Value::is_null) {
                    if let Some(class_id) = student.class_id {
                        value["classId"] = Value::String(class_id);
                    }
                }
                let mut fresh: Score = serde_json::from_value(value)
                    .map_err(|e| RosterError::validation(format!("invalid score: {e}")))?;
                fresh.id = new_id();
                scores.push(fresh.clone());
                fresh
            }
        };

        self.save_all(&scores)?;
        Ok(row)
    }

    pub fn scores_by_student(&self, student_id: &str) -> Vec<Score> {
        self.scores()
            .into_iter()
            .filter(|s| s.student_id == student_id)
            .collect()
    }

    /// Join through the class's current student set; a score's own classId is
    /// not consulted.
    pub fn scores_by_class(&self, class_id: &str) -> Vec<Score> {
        let members: HashSet<String> = self
            .students_by_class(class_id)
            .into_iter()
            .map(|s| s.id)
            .collect();
        self.scores()
            .into_iter()
            .filter(|s| members.contains(&s.student_id))
            .collect()
    }

    pub fn scores_for(&self, class_id: &str, subject_id: &str) -> Vec<Score> {
        self.scores_by_class(class_id)
            .into_iter()
            .filter(|s| s.subject_id == subject_id)
            .collect()
    }

    // ---- teacher assignments ----

    pub fn teacher_assignments(&self) -> Vec<TeacherAssignment> {
        self.list()
    }

    /// Re-adding an identical assignment returns the stored one.
    pub fn add_teacher_assignment(&self, assignment: TeacherAssignment) -> Result<TeacherAssignment> {
        let Some(teacher) = self.find_user(&assignment.teacher_id) else {
            return Err(RosterError::validation("unknown teacherId"));
        };
        if teacher.role != Role::SubjectTeacher && teacher.role != Role::HomeroomTeacher {
            return Err(RosterError::validation("assignments are for teachers only"));
        }
        if self.find_class(&assignment.class_id).is_none() {
            return Err(RosterError::validation("unknown classId"));
        }
        if let Some(subject_id) = assignment.subject_id.as_deref() {
            if self.find_subject(subject_id).is_none() {
                return Err(RosterError::validation("unknown subjectId"));
            }
        }

        if let Some(same) = self.teacher_assignments().into_iter().find(|a| {
            a.teacher_id == assignment.teacher_id
                && a.class_id == assignment.class_id
                && a.subject_id == assignment.subject_id
        }) {
            return Ok(same);
        }

        let stored = self.insert(assignment)?;
        if let Some(subject_id) = stored.subject_id.as_deref() {
            let mut subjects = self.subjects();
            if let Some(s) = subjects.iter_mut().find(|s| s.id == subject_id) {
                if !s.teachers.contains(&stored.teacher_id) {
                    s.teachers.push(stored.teacher_id.clone());
                    self.save_all(&subjects)?;
                }
            }
        }
        Ok(stored)
    }

    pub fn teacher_classes(&self, teacher_id: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for a in self.teacher_assignments() {
            if a.teacher_id == teacher_id && !out.contains(&a.class_id) {
                out.push(a.class_id);
            }
        }
        out
    }

    pub fn teacher_subjects(&self, teacher_id: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for a in self.teacher_assignments() {
            if a.teacher_id != teacher_id {
                continue;
            }
            if let Some(s) = a.subject_id {
                if !out.contains(&s) {
                    out.push(s);
                }
            }
        }
        out
    }

    pub fn classes_by_teacher(&self, teacher_id: &str) -> Vec<Class> {
        let ids = self.teacher_classes(teacher_id);
        self.classes_with_counts()
            .into_iter()
            .filter(|c| ids.contains(&c.id))
            .collect()
    }
}

fn merge_record<T: Record>(current: &T, patch: &Map<String, Value>) -> Result<T> {
    let mut value = serde_json::to_value(current)?;
    shallow_merge(&mut value, patch)?;
    serde_json::from_value(value)
        .map_err(|e| RosterError::validation(format!("invalid {} fields: {e}", T::KIND)))
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String> {
    match obj.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(RosterError::validation(format!("missing {key}"))),
    }
}

fn validate_score_fields(partial: &Map<String, Value>) -> Result<()> {
    for field in ScoreField::ALL {
        let Some(v) = partial.get(field.key()) else {
            continue;
        };
        if v.is_null() {
            continue;
        }
        let Some(n) = v.as_f64() else {
            return Err(RosterError::validation(format!(
                "{} must be a number",
                field.key()
            )));
        };
        if !(0.0..=10.0).contains(&n) {
            return Err(RosterError::validation(format!(
                "{} must be in 0..=10",
                field.key()
            )));
        }
    }
    Ok(())
}

fn validate_class(c: &Class) -> Result<()> {
    if c.name.trim().is_empty() {
        return Err(RosterError::validation("name must not be empty"));
    }
    Ok(())
}

fn bootstrap_admin(auth: &AuthConfig) -> Result<User> {
    Ok(User {
        id: new_id(),
        username: ROOT_ADMIN_USERNAME.to_string(),
        password: password::hash_password(&auth.admin_password, &auth.argon2)?,
        full_name: "Quản trị viên".to_string(),
        role: Role::Admin,
        email: "admin@school.edu.vn".to_string(),
        phone: String::new(),
        created_at: Some(chrono::Utc::now().to_rfc3339()),
        created_by: None,
        updated_at: None,
        updated_by: None,
        is_active: true,
    })
}

fn default_classes() -> Vec<Class> {
    [("class001", "10A1", 10), ("class002", "10A2", 10), ("class003", "11A1", 11), ("class004", "12A1", 12)]
        .into_iter()
        .map(|(id, name, grade)| Class {
            id: id.to_string(),
            name: name.to_string(),
            grade,
            home_room_teacher: None,
            student_count: 0,
        })
        .collect()
}

fn default_subjects() -> Vec<Subject> {
    [
        ("subj001", "TOAN", "Toán học", 5),
        ("subj002", "VAN", "Ngữ văn", 4),
        ("subj003", "ANH", "Tiếng Anh", 3),
        ("subj004", "LY", "Vật lý", 3),
        ("subj005", "HOA", "Hóa học", 3),
        ("subj006", "SINH", "Sinh học", 2),
        ("subj007", "SU", "Lịch sử", 2),
        ("subj008", "DIA", "Địa lý", 2),
    ]
    .into_iter()
    .map(|(id, code, name, lessons)| Subject {
        id: id.to_string(),
        code: code.to_string(),
        name: name.to_string(),
        grades: vec![10, 11, 12],
        lessons_per_week: lessons,
        teachers: Vec::new(),
    })
    .collect()
}
