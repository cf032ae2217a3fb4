//! Persistence boundary.
//!
//! Services talk to a [`Store`] and never to a connection directly. Calls
//! are blocking and are expected to run inside `web::block`.

use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentDetail, ChatSession, CompanionKind, DoctorProfile,
    NewAppointment, NewUser, PatientProfile, Transcript, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type SharedStore = Arc<dyn Store>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("query failed: {0}")]
    Backend(String),
    #[error("stored data is unreadable: {0}")]
    Corrupt(String),
}

pub trait Store: Send + Sync {
    /// Inserts the user and, when given, its companion record. Either both
    /// rows exist afterwards or neither does.
    fn create_identity(&self, user: &NewUser, companion: Option<CompanionKind>) -> Result<User, StoreError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    fn list_doctors(&self) -> Result<Vec<DoctorProfile>, StoreError>;
    fn find_doctor(&self, id: i32) -> Result<Option<DoctorProfile>, StoreError>;
    fn list_patients(&self) -> Result<Vec<PatientProfile>, StoreError>;
    fn find_patient(&self, id: i32) -> Result<Option<PatientProfile>, StoreError>;

    fn list_appointments(&self) -> Result<Vec<AppointmentDetail>, StoreError>;
    fn find_appointment(&self, id: i32) -> Result<Option<AppointmentDetail>, StoreError>;
    fn appointment_exists(&self, id: i32) -> Result<bool, StoreError>;
    fn insert_appointment(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError>;
    /// Returns `None` when no live appointment has this id.
    fn update_appointment(&self, id: i32, changes: &AppointmentChanges) -> Result<Option<Appointment>, StoreError>;
    /// Returns whether a row was removed.
    fn delete_appointment(&self, id: i32) -> Result<bool, StoreError>;

    /// Oldest session recorded for the appointment.
    fn find_chat_session(&self, appointment_id: i32) -> Result<Option<ChatSession>, StoreError>;
    fn create_chat_session(&self, appointment_id: i32, transcript: &Transcript) -> Result<ChatSession, StoreError>;
    fn save_chat_session(&self, session: &ChatSession) -> Result<(), StoreError>;
}

/// Transcripts are persisted as a JSON array of `{role, content}` objects.
pub fn encode_transcript(transcript: &Transcript) -> Result<String, StoreError> {
    serde_json::to_string(transcript).map_err(|e| StoreError::Corrupt(e.to_string()))
}

pub fn decode_transcript(raw: &str) -> Result<Transcript, StoreError> {
    if raw.trim().is_empty() {
        return Ok(Transcript::new());
    }
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(format!("chat transcript: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TurnRole;

    #[test]
    fn transcripts_are_stored_as_role_content_arrays() {
        let transcript = Transcript::from_exchange("Is ibuprofen safe?", "Usually, in moderation.");
        let raw = encode_transcript(&transcript).unwrap();

        assert_eq!(
            raw,
            r#"[{"role":"user","content":"Is ibuprofen safe?"},{"role":"assistant","content":"Usually, in moderation."}]"#
        );
        assert_eq!(decode_transcript(&raw).unwrap(), transcript);
    }

    #[test]
    fn blank_blob_decodes_to_an_empty_transcript() {
        assert!(decode_transcript("").unwrap().is_empty());
    }

    #[test]
    fn unreadable_blob_is_reported() {
        assert!(matches!(decode_transcript("{not json"), Err(StoreError::Corrupt(_))));
        assert!(matches!(
            decode_transcript(r#"[{"role":"system","content":"x"}]"#),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn decoding_keeps_turn_order() {
        let raw = r#"[{"role":"user","content":"a"},{"role":"assistant","content":"b"},{"role":"user","content":"c"}]"#;
        let transcript = decode_transcript(raw).unwrap();
        let roles: Vec<TurnRole> = transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::Assistant, TurnRole::User]);
    }
}
