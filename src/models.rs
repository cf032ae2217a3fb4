use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Shortest appointment the scheduler accepts, in minutes.
pub const MIN_APPOINTMENT_MINUTES: i32 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

/// Role-specific record created next to a new user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionKind {
    Doctor,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }

    pub fn companion(self) -> Option<CompanionKind> {
        match self {
            Role::Admin => None,
            Role::Doctor => Some(CompanionKind::Doctor),
            Role::Patient => Some(CompanionKind::Patient),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(ParseEnumError { kind: "role", value: other.to_string() }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(ParseEnumError { kind: "appointment status", value: other.to_string() }),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Doctor {
    pub id: i32,
    pub user_id: i32,
    pub specialty: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: i32,
    pub user_id: i32,
    pub phone: String,
    pub address: String,
    pub medical_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A doctor with its owning user attached.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DoctorProfile {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub user: User,
}

/// A patient with its owning user attached.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PatientProfile {
    #[serde(flatten)]
    pub patient: Patient,
    pub user: User,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub date_time: DateTime<Utc>,
    pub duration: i32,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: String,
    pub chat_session_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An appointment as returned by reads: patient and doctor are attached
/// inline. A reference that no longer resolves renders as `{}`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(serialize_with = "empty_object_if_missing")]
    pub patient: Option<PatientProfile>,
    #[serde(serialize_with = "empty_object_if_missing")]
    pub doctor: Option<DoctorProfile>,
}

fn empty_object_if_missing<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub date_time: DateTime<Utc>,
    pub duration: i32,
    pub reason: String,
    pub status: AppointmentStatus,
}

/// The caller-editable fields of an appointment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentChanges {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub date_time: DateTime<Utc>,
    pub duration: i32,
    pub reason: String,
}

impl AppointmentChanges {
    pub fn into_new_appointment(self) -> NewAppointment {
        NewAppointment {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            date_time: self.date_time,
            duration: self.duration,
            reason: self.reason,
            status: AppointmentStatus::Scheduled,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

/// Ordered chat turns for one appointment.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transcript(Vec<ChatTurn>);

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript holding a single question and its answer.
    pub fn from_exchange(message: &str, reply: &str) -> Self {
        let mut transcript = Self::new();
        transcript.push_exchange(message, reply);
        transcript
    }

    pub fn push_exchange(&mut self, message: &str, reply: &str) {
        self.0.push(ChatTurn { role: TurnRole::User, content: message.to_string() });
        self.0.push(ChatTurn { role: TurnRole::Assistant, content: reply.to_string() });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub id: i32,
    pub appointment_id: i32,
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// DTOs
#[derive(Deserialize, Debug, Default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct LoginResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppointmentRequest {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub date_time: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ChatRequest {
    pub appointment_id: Option<i32>,
    pub message: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ChatResponse {
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, hour, 0, 0).unwrap()
    }

    fn sample_user() -> User {
        User {
            id: 7,
            email: "ana@clinic.test".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            name: "Ana".to_string(),
            role: Role::Patient,
            created_at: at(8),
            updated_at: at(8),
        }
    }

    #[test]
    fn roles_round_trip_through_their_names() {
        for role in [Role::Admin, Role::Doctor, Role::Patient] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("nurse".parse::<Role>().is_err());
        assert!("Doctor".parse::<Role>().is_err());
    }

    #[test]
    fn only_doctors_and_patients_get_companion_records() {
        assert_eq!(Role::Doctor.companion(), Some(CompanionKind::Doctor));
        assert_eq!(Role::Patient.companion(), Some(CompanionKind::Patient));
        assert_eq!(Role::Admin.companion(), None);
    }

    #[test]
    fn new_appointments_start_scheduled() {
        let changes = AppointmentChanges {
            patient_id: 1,
            doctor_id: 2,
            date_time: at(9),
            duration: 30,
            reason: "checkup".to_string(),
        };
        assert_eq!(changes.into_new_appointment().status, AppointmentStatus::Scheduled);
        assert_eq!(AppointmentStatus::default(), AppointmentStatus::Scheduled);
    }

    #[test]
    fn user_json_never_contains_the_password_hash() {
        let value = serde_json::to_value(sample_user()).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["role"], json!("patient"));
    }

    #[test]
    fn dangling_references_render_as_empty_objects() {
        let detail = AppointmentDetail {
            appointment: Appointment {
                id: 3,
                patient_id: 99,
                doctor_id: 98,
                date_time: at(10),
                duration: 15,
                status: AppointmentStatus::Scheduled,
                reason: "follow-up".to_string(),
                notes: String::new(),
                chat_session_id: None,
                created_at: at(8),
                updated_at: at(8),
            },
            patient: None,
            doctor: None,
        };

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["patient"], json!({}));
        assert_eq!(value["doctor"], json!({}));
        assert_eq!(value["patient_id"], json!(99));
        assert_eq!(value["status"], json!("scheduled"));
    }

    #[test]
    fn profiles_nest_the_user_under_the_record() {
        let profile = PatientProfile {
            patient: Patient {
                id: 4,
                user_id: 7,
                phone: String::new(),
                address: String::new(),
                medical_id: String::new(),
                created_at: at(8),
                updated_at: at(8),
            },
            user: sample_user(),
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["id"], json!(4));
        assert_eq!(value["user"]["name"], json!("Ana"));
        assert!(value["user"].get("password_hash").is_none());
    }

    #[test]
    fn exchanges_append_user_then_assistant() {
        let mut transcript = Transcript::from_exchange("first?", "one");
        transcript.push_exchange("second?", "two");

        let roles: Vec<TurnRole> = transcript.turns().iter().map(|t| t.role).collect();
        let contents: Vec<&str> = transcript.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::Assistant, TurnRole::User, TurnRole::Assistant]);
        assert_eq!(contents, vec!["first?", "one", "second?", "two"]);
    }
}
