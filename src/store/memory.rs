//! In-process store used for local development (`DB_TYPE=memory`) and tests.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{decode_transcript, encode_transcript, Store, StoreError};
use crate::models::{
    Appointment, AppointmentChanges, AppointmentDetail, ChatSession, CompanionKind, Doctor, DoctorProfile,
    NewAppointment, NewUser, Patient, PatientProfile, Transcript, User,
};

struct ChatSessionRecord {
    appointment_id: i32,
    messages: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    user_seq: i32,
    doctor_seq: i32,
    patient_seq: i32,
    appointment_seq: i32,
    chat_session_seq: i32,
    users: BTreeMap<i32, User>,
    doctors: BTreeMap<i32, Doctor>,
    patients: BTreeMap<i32, Patient>,
    appointments: BTreeMap<i32, Appointment>,
    chat_sessions: BTreeMap<i32, ChatSessionRecord>,
}

fn next_id(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

impl Tables {
    fn doctor_profile(&self, doctor: &Doctor) -> Option<DoctorProfile> {
        let user = self.users.get(&doctor.user_id)?;
        Some(DoctorProfile { doctor: doctor.clone(), user: user.clone() })
    }

    fn patient_profile(&self, patient: &Patient) -> Option<PatientProfile> {
        let user = self.users.get(&patient.user_id)?;
        Some(PatientProfile { patient: patient.clone(), user: user.clone() })
    }

    fn detail(&self, appointment: &Appointment) -> AppointmentDetail {
        AppointmentDetail {
            appointment: appointment.clone(),
            patient: self.patients.get(&appointment.patient_id).and_then(|p| self.patient_profile(p)),
            doctor: self.doctors.get(&appointment.doctor_id).and_then(|d| self.doctor_profile(d)),
        }
    }

    fn chat_session(&self, id: i32, record: &ChatSessionRecord) -> Result<ChatSession, StoreError> {
        Ok(ChatSession {
            id,
            appointment_id: record.appointment_id,
            transcript: decode_transcript(&record.messages)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    fn create_identity(&self, user: &NewUser, companion: Option<CompanionKind>) -> Result<User, StoreError> {
        let mut tables = self.tables()?;
        if tables.users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict(format!("users.email = {}", user.email)));
        }

        let now = Utc::now();
        let id = next_id(&mut tables.user_seq);
        let created = User {
            id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            name: user.name.clone(),
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, created.clone());

        match companion {
            Some(CompanionKind::Doctor) => {
                let doctor_id = next_id(&mut tables.doctor_seq);
                tables.doctors.insert(doctor_id, Doctor {
                    id: doctor_id,
                    user_id: id,
                    specialty: String::new(),
                    description: String::new(),
                    created_at: now,
                    updated_at: now,
                });
            }
            Some(CompanionKind::Patient) => {
                let patient_id = next_id(&mut tables.patient_seq);
                tables.patients.insert(patient_id, Patient {
                    id: patient_id,
                    user_id: id,
                    phone: String::new(),
                    address: String::new(),
                    medical_id: String::new(),
                    created_at: now,
                    updated_at: now,
                });
            }
            None => {}
        }

        Ok(created)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    fn list_doctors(&self) -> Result<Vec<DoctorProfile>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.doctors.values().filter_map(|d| tables.doctor_profile(d)).collect())
    }

    fn find_doctor(&self, id: i32) -> Result<Option<DoctorProfile>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.doctors.get(&id).and_then(|d| tables.doctor_profile(d)))
    }

    fn list_patients(&self) -> Result<Vec<PatientProfile>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.patients.values().filter_map(|p| tables.patient_profile(p)).collect())
    }

    fn find_patient(&self, id: i32) -> Result<Option<PatientProfile>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.patients.get(&id).and_then(|p| tables.patient_profile(p)))
    }

    fn list_appointments(&self) -> Result<Vec<AppointmentDetail>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.appointments.values().map(|a| tables.detail(a)).collect())
    }

    fn find_appointment(&self, id: i32) -> Result<Option<AppointmentDetail>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.appointments.get(&id).map(|a| tables.detail(a)))
    }

    fn appointment_exists(&self, id: i32) -> Result<bool, StoreError> {
        Ok(self.tables()?.appointments.contains_key(&id))
    }

    fn insert_appointment(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables()?;
        let now = Utc::now();
        let id = next_id(&mut tables.appointment_seq);
        let created = Appointment {
            id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            date_time: appointment.date_time,
            duration: appointment.duration,
            status: appointment.status,
            reason: appointment.reason.clone(),
            notes: String::new(),
            chat_session_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.appointments.insert(id, created.clone());
        Ok(created)
    }

    fn update_appointment(&self, id: i32, changes: &AppointmentChanges) -> Result<Option<Appointment>, StoreError> {
        let mut tables = self.tables()?;
        let Some(appointment) = tables.appointments.get_mut(&id) else {
            return Ok(None);
        };
        appointment.patient_id = changes.patient_id;
        appointment.doctor_id = changes.doctor_id;
        appointment.date_time = changes.date_time;
        appointment.duration = changes.duration;
        appointment.reason = changes.reason.clone();
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }

    fn delete_appointment(&self, id: i32) -> Result<bool, StoreError> {
        Ok(self.tables()?.appointments.remove(&id).is_some())
    }

    fn find_chat_session(&self, appointment_id: i32) -> Result<Option<ChatSession>, StoreError> {
        let tables = self.tables()?;
        tables
            .chat_sessions
            .iter()
            .find(|(_, record)| record.appointment_id == appointment_id)
            .map(|(id, record)| tables.chat_session(*id, record))
            .transpose()
    }

    fn create_chat_session(&self, appointment_id: i32, transcript: &Transcript) -> Result<ChatSession, StoreError> {
        let messages = encode_transcript(transcript)?;
        let mut tables = self.tables()?;
        let now = Utc::now();
        let id = next_id(&mut tables.chat_session_seq);
        tables.chat_sessions.insert(id, ChatSessionRecord { appointment_id, messages, created_at: now, updated_at: now });
        Ok(ChatSession { id, appointment_id, transcript: transcript.clone(), created_at: now, updated_at: now })
    }

    fn save_chat_session(&self, session: &ChatSession) -> Result<(), StoreError> {
        let messages = encode_transcript(&session.transcript)?;
        let mut tables = self.tables()?;
        match tables.chat_sessions.get_mut(&session.id) {
            Some(record) => {
                record.messages = messages;
                record.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("chat session {} does not exist", session.id))),
        }
    }
}
