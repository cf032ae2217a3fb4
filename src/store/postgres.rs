use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::{debug, info};
use std::collections::HashMap;

use super::{decode_transcript, encode_transcript, Store, StoreError};
use crate::config::{DbPool, DB_INIT_SQL};
use crate::models::{
    Appointment, AppointmentChanges, AppointmentDetail, AppointmentStatus, ChatSession, CompanionKind, Doctor,
    DoctorProfile, NewAppointment, NewUser, Patient, PatientProfile, Role, Transcript, User,
};
use crate::schema::{appointments, chat_sessions, doctors, patients, users};

type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct UserRow {
    id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    email: String,
    password_hash: String,
    name: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(|e| StoreError::Corrupt(format!("user {}: {}", row.id, e)))?;
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = doctors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct DoctorRow {
    id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_id: i32,
    specialty: String,
    description: String,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = patients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct PatientRow {
    id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_id: i32,
    phone: String,
    address: String,
    medical_id: String,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct AppointmentRow {
    id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    patient_id: i32,
    doctor_id: i32,
    date_time: DateTime<Utc>,
    duration: i32,
    status: String,
    reason: String,
    notes: String,
    chat_session_id: Option<i32>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AppointmentStatus>()
            .map_err(|e| StoreError::Corrupt(format!("appointment {}: {}", row.id, e)))?;
        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            date_time: row.date_time,
            duration: row.duration,
            status,
            reason: row.reason,
            notes: row.notes,
            chat_session_id: row.chat_session_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = chat_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ChatSessionRow {
    id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    appointment_id: i32,
    messages: String,
}

impl TryFrom<ChatSessionRow> for ChatSession {
    type Error = StoreError;

    fn try_from(row: ChatSessionRow) -> Result<Self, Self::Error> {
        Ok(ChatSession {
            id: row.id,
            appointment_id: row.appointment_id,
            transcript: decode_transcript(&row.messages)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUserRow<'a> {
    email: &'a str,
    password_hash: &'a str,
    name: &'a str,
    role: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = doctors)]
struct NewDoctorRow {
    user_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = patients)]
struct NewPatientRow {
    user_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = appointments)]
struct NewAppointmentRow<'a> {
    patient_id: i32,
    doctor_id: i32,
    date_time: DateTime<Utc>,
    duration: i32,
    status: &'a str,
    reason: &'a str,
}

#[derive(AsChangeset)]
#[diesel(table_name = appointments)]
struct AppointmentChangeset<'a> {
    patient_id: i32,
    doctor_id: i32,
    date_time: DateTime<Utc>,
    duration: i32,
    reason: &'a str,
    updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = chat_sessions)]
struct NewChatSessionRow<'a> {
    appointment_id: i32,
    messages: &'a str,
}

fn doctor_profile((doctor, user): (DoctorRow, UserRow)) -> Result<DoctorProfile, StoreError> {
    Ok(DoctorProfile {
        doctor: Doctor {
            id: doctor.id,
            user_id: doctor.user_id,
            specialty: doctor.specialty,
            description: doctor.description,
            created_at: doctor.created_at,
            updated_at: doctor.updated_at,
        },
        user: User::try_from(user)?,
    })
}

fn patient_profile((patient, user): (PatientRow, UserRow)) -> Result<PatientProfile, StoreError> {
    Ok(PatientProfile {
        patient: Patient {
            id: patient.id,
            user_id: patient.user_id,
            phone: patient.phone,
            address: patient.address,
            medical_id: patient.medical_id,
            created_at: patient.created_at,
            updated_at: patient.updated_at,
        },
        user: User::try_from(user)?,
    })
}

/// PostgreSQL-backed store over an r2d2 connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Runs the schema bootstrap and builds the connection pool.
    pub fn connect(database_url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let mut conn = PgConnection::establish(database_url).map_err(|e| StoreError::Pool(e.to_string()))?;
        conn.batch_execute(DB_INIT_SQL)?;
        info!("Database initialization complete.");

        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = DbPool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self::new(pool))
    }

    fn conn(&self) -> Result<PgPooled, StoreError> {
        self.pool.get().map_err(|e| StoreError::Pool(e.to_string()))
    }
}

fn attach(conn: &mut PgConnection, rows: Vec<AppointmentRow>) -> Result<Vec<AppointmentDetail>, StoreError> {
    let patient_ids: Vec<i32> = rows.iter().map(|r| r.patient_id).collect();
    let doctor_ids: Vec<i32> = rows.iter().map(|r| r.doctor_id).collect();

    let patients_by_id: HashMap<i32, PatientProfile> = patients::table
        .inner_join(users::table)
        .filter(patients::id.eq_any(patient_ids))
        .filter(patients::deleted_at.is_null())
        .filter(users::deleted_at.is_null())
        .select((PatientRow::as_select(), UserRow::as_select()))
        .load::<(PatientRow, UserRow)>(conn)?
        .into_iter()
        .map(|pair| patient_profile(pair).map(|p| (p.patient.id, p)))
        .collect::<Result<_, StoreError>>()?;

    let doctors_by_id: HashMap<i32, DoctorProfile> = doctors::table
        .inner_join(users::table)
        .filter(doctors::id.eq_any(doctor_ids))
        .filter(doctors::deleted_at.is_null())
        .filter(users::deleted_at.is_null())
        .select((DoctorRow::as_select(), UserRow::as_select()))
        .load::<(DoctorRow, UserRow)>(conn)?
        .into_iter()
        .map(|pair| doctor_profile(pair).map(|d| (d.doctor.id, d)))
        .collect::<Result<_, StoreError>>()?;

    debug!(
        "Attached {} patients and {} doctors to {} appointments",
        patients_by_id.len(),
        doctors_by_id.len(),
        rows.len()
    );

    rows.into_iter()
        .map(|row| {
            let appointment = Appointment::try_from(row)?;
            // several appointments may share a patient or doctor
            let patient = patients_by_id.get(&appointment.patient_id).cloned();
            let doctor = doctors_by_id.get(&appointment.doctor_id).cloned();
            Ok(AppointmentDetail { appointment, patient, doctor })
        })
        .collect()
}

impl Store for PgStore {
    fn create_identity(&self, user: &NewUser, companion: Option<CompanionKind>) -> Result<User, StoreError> {
        let mut conn = self.conn()?;
        let row = conn.transaction::<_, DieselError, _>(|conn| {
            let row = diesel::insert_into(users::table)
                .values(&NewUserRow {
                    email: &user.email,
                    password_hash: &user.password_hash,
                    name: &user.name,
                    role: user.role.as_str(),
                })
                .returning(UserRow::as_returning())
                .get_result::<UserRow>(conn)?;

            match companion {
                Some(CompanionKind::Doctor) => {
                    diesel::insert_into(doctors::table)
                        .values(&NewDoctorRow { user_id: row.id })
                        .execute(conn)?;
                }
                Some(CompanionKind::Patient) => {
                    diesel::insert_into(patients::table)
                        .values(&NewPatientRow { user_id: row.id })
                        .execute(conn)?;
                }
                None => {}
            }
            Ok(row)
        })?;

        User::try_from(row)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn()?;
        users::table
            .filter(users::email.eq(email))
            .filter(users::deleted_at.is_null())
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    fn list_doctors(&self) -> Result<Vec<DoctorProfile>, StoreError> {
        let mut conn = self.conn()?;
        doctors::table
            .inner_join(users::table)
            .filter(doctors::deleted_at.is_null())
            .filter(users::deleted_at.is_null())
            .order(doctors::id.asc())
            .select((DoctorRow::as_select(), UserRow::as_select()))
            .load::<(DoctorRow, UserRow)>(&mut conn)?
            .into_iter()
            .map(doctor_profile)
            .collect()
    }

    fn find_doctor(&self, id: i32) -> Result<Option<DoctorProfile>, StoreError> {
        let mut conn = self.conn()?;
        doctors::table
            .inner_join(users::table)
            .filter(doctors::id.eq(id))
            .filter(doctors::deleted_at.is_null())
            .filter(users::deleted_at.is_null())
            .select((DoctorRow::as_select(), UserRow::as_select()))
            .first::<(DoctorRow, UserRow)>(&mut conn)
            .optional()?
            .map(doctor_profile)
            .transpose()
    }

    fn list_patients(&self) -> Result<Vec<PatientProfile>, StoreError> {
        let mut conn = self.conn()?;
        patients::table
            .inner_join(users::table)
            .filter(patients::deleted_at.is_null())
            .filter(users::deleted_at.is_null())
            .order(patients::id.asc())
            .select((PatientRow::as_select(), UserRow::as_select()))
            .load::<(PatientRow, UserRow)>(&mut conn)?
            .into_iter()
            .map(patient_profile)
            .collect()
    }

    fn find_patient(&self, id: i32) -> Result<Option<PatientProfile>, StoreError> {
        let mut conn = self.conn()?;
        patients::table
            .inner_join(users::table)
            .filter(patients::id.eq(id))
            .filter(patients::deleted_at.is_null())
            .filter(users::deleted_at.is_null())
            .select((PatientRow::as_select(), UserRow::as_select()))
            .first::<(PatientRow, UserRow)>(&mut conn)
            .optional()?
            .map(patient_profile)
            .transpose()
    }

    fn list_appointments(&self) -> Result<Vec<AppointmentDetail>, StoreError> {
        let mut conn = self.conn()?;
        let rows = appointments::table
            .filter(appointments::deleted_at.is_null())
            .order(appointments::id.asc())
            .select(AppointmentRow::as_select())
            .load::<AppointmentRow>(&mut conn)?;
        attach(&mut conn, rows)
    }

    fn find_appointment(&self, id: i32) -> Result<Option<AppointmentDetail>, StoreError> {
        let mut conn = self.conn()?;
        let row = appointments::table
            .filter(appointments::id.eq(id))
            .filter(appointments::deleted_at.is_null())
            .select(AppointmentRow::as_select())
            .first::<AppointmentRow>(&mut conn)
            .optional()?;

        match row {
            Some(row) => Ok(attach(&mut conn, vec![row])?.into_iter().next()),
            None => Ok(None),
        }
    }

    fn appointment_exists(&self, id: i32) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let found = appointments::table
            .filter(appointments::id.eq(id))
            .filter(appointments::deleted_at.is_null())
            .select(appointments::id)
            .first::<i32>(&mut conn)
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_appointment(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError> {
        let mut conn = self.conn()?;
        let row = diesel::insert_into(appointments::table)
            .values(&NewAppointmentRow {
                patient_id: appointment.patient_id,
                doctor_id: appointment.doctor_id,
                date_time: appointment.date_time,
                duration: appointment.duration,
                status: appointment.status.as_str(),
                reason: &appointment.reason,
            })
            .returning(AppointmentRow::as_returning())
            .get_result::<AppointmentRow>(&mut conn)?;
        Appointment::try_from(row)
    }

    fn update_appointment(&self, id: i32, changes: &AppointmentChanges) -> Result<Option<Appointment>, StoreError> {
        let mut conn = self.conn()?;
        let target = appointments::table
            .filter(appointments::id.eq(id))
            .filter(appointments::deleted_at.is_null());

        diesel::update(target)
            .set(&AppointmentChangeset {
                patient_id: changes.patient_id,
                doctor_id: changes.doctor_id,
                date_time: changes.date_time,
                duration: changes.duration,
                reason: &changes.reason,
                updated_at: Utc::now(),
            })
            .returning(AppointmentRow::as_returning())
            .get_result::<AppointmentRow>(&mut conn)
            .optional()?
            .map(Appointment::try_from)
            .transpose()
    }

    fn delete_appointment(&self, id: i32) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let target = appointments::table
            .filter(appointments::id.eq(id))
            .filter(appointments::deleted_at.is_null());

        let affected = diesel::update(target)
            .set(appointments::deleted_at.eq(Some(Utc::now())))
            .execute(&mut conn)?;
        Ok(affected > 0)
    }

    fn find_chat_session(&self, appointment_id: i32) -> Result<Option<ChatSession>, StoreError> {
        let mut conn = self.conn()?;
        chat_sessions::table
            .filter(chat_sessions::appointment_id.eq(appointment_id))
            .filter(chat_sessions::deleted_at.is_null())
            .order(chat_sessions::id.asc())
            .select(ChatSessionRow::as_select())
            .first::<ChatSessionRow>(&mut conn)
            .optional()?
            .map(ChatSession::try_from)
            .transpose()
    }

    fn create_chat_session(&self, appointment_id: i32, transcript: &Transcript) -> Result<ChatSession, StoreError> {
        let messages = encode_transcript(transcript)?;
        let mut conn = self.conn()?;
        let row = diesel::insert_into(chat_sessions::table)
            .values(&NewChatSessionRow { appointment_id, messages: &messages })
            .returning(ChatSessionRow::as_returning())
            .get_result::<ChatSessionRow>(&mut conn)?;
        ChatSession::try_from(row)
    }

    fn save_chat_session(&self, session: &ChatSession) -> Result<(), StoreError> {
        let messages = encode_transcript(&session.transcript)?;
        let mut conn = self.conn()?;
        let affected = diesel::update(chat_sessions::table.find(session.id))
            .set((
                chat_sessions::messages.eq(&messages),
                chat_sessions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        if affected == 0 {
            return Err(StoreError::Backend(format!("chat session {} does not exist", session.id)));
        }
        Ok(())
    }
}
