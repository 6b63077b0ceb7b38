use serde::{Deserialize, Serialize};

/// Persisted document keys.
pub mod keys {
    pub const USERS: &str = "users";
    pub const STUDENTS: &str = "students";
    pub const CLASSES: &str = "classes";
    pub const SUBJECTS: &str = "subjects";
    pub const SCORES: &str = "scores";
    pub const TEACHER_ASSIGNMENTS: &str = "teacherAssignments";
    pub const ACTIVITIES: &str = "activities_data";
    pub const SESSION: &str = "session";
    /// Older builds kept a second copy of the users collection here.
    pub const LEGACY_USERS: &str = "users_data";
}

pub const ROOT_ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    SubjectTeacher,
    HomeroomTeacher,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn level(self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::SubjectTeacher => 2,
            Role::HomeroomTeacher => 1,
            Role::Other => 0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "subject_teacher" => Some(Role::SubjectTeacher),
            "homeroom_teacher" => Some(Role::HomeroomTeacher),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::SubjectTeacher => "subject_teacher",
            Role::HomeroomTeacher => "homeroom_teacher",
            Role::Other => "other",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    /// Argon2 PHC string.
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A user as shown to callers: never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub email: String,
    pub phone: String,
    pub created_at: Option<String>,
    pub created_by: Option<String>,
    pub is_active: bool,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            username: u.username.clone(),
            full_name: u.full_name.clone(),
            role: u.role,
            email: u.email.clone(),
            phone: u.phone.clone(),
            created_at: u.created_at.clone(),
            created_by: u.created_by.clone(),
            is_active: u.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub student_code: String,
    pub full_name: String,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub grade: i64,
    #[serde(default)]
    pub home_room_teacher: Option<String>,
    /// Derived from the students collection; refreshed on listing.
    #[serde(default)]
    pub student_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default)]
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub grades: Vec<i64>,
    #[serde(default)]
    pub lessons_per_week: u32,
    #[serde(default)]
    pub teachers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    #[serde(default)]
    pub id: String,
    pub student_id: String,
    #[serde(default)]
    pub class_id: Option<String>,
    pub subject_id: String,
    #[serde(default)]
    pub oral: Option<f64>,
    #[serde(default)]
    pub test15: Option<f64>,
    #[serde(default)]
    pub test45: Option<f64>,
    #[serde(default)]
    pub midterm: Option<f64>,
    #[serde(default, rename = "final")]
    pub final_exam: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreField {
    Oral,
    Test15,
    Test45,
    Midterm,
    Final,
}

impl ScoreField {
    pub const ALL: [ScoreField; 5] = [
        ScoreField::Oral,
        ScoreField::Test15,
        ScoreField::Test45,
        ScoreField::Midterm,
        ScoreField::Final,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ScoreField::Oral => "oral",
            ScoreField::Test15 => "test15",
            ScoreField::Test45 => "test45",
            ScoreField::Midterm => "midterm",
            ScoreField::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == s)
    }

    pub fn weight(self) -> f64 {
        match self {
            ScoreField::Oral | ScoreField::Test15 => 1.0,
            ScoreField::Test45 | ScoreField::Midterm => 2.0,
            ScoreField::Final => 3.0,
        }
    }

    pub fn value(self, score: &Score) -> Option<f64> {
        match self {
            ScoreField::Oral => score.oral,
            ScoreField::Test15 => score.test15,
            ScoreField::Test45 => score.test45,
            ScoreField::Midterm => score.midterm,
            ScoreField::Final => score.final_exam,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAssignment {
    #[serde(default)]
    pub id: String,
    pub teacher_id: String,
    pub class_id: String,
    #[serde(default)]
    pub subject_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub login_time: String,
}

impl Session {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            login_time: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub description: String,
    pub timestamp: String,
    #[serde(default, alias = "ip")]
    pub origin: String,
}
