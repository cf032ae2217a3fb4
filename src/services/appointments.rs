use log::{debug, info};

use super::{supplied_text, with_store};
use crate::errors::ApiError;
use crate::models::{
    Appointment, AppointmentChanges, AppointmentDetail, AppointmentRequest, MIN_APPOINTMENT_MINUTES,
};
use crate::store::SharedStore;

fn required_id(value: Option<i32>, field: &str) -> Result<i32, ApiError> {
    match value {
        Some(id) if id > 0 => Ok(id),
        _ => Err(ApiError::ValidationError(format!("{} is required", field))),
    }
}

impl AppointmentRequest {
    /// Checks presence of every field and the minimum duration. Patient and
    /// doctor ids are not looked up.
    pub fn validate(self) -> Result<AppointmentChanges, ApiError> {
        let patient_id = required_id(self.patient_id, "patient_id")?;
        let doctor_id = required_id(self.doctor_id, "doctor_id")?;
        let date_time = self
            .date_time
            .ok_or_else(|| ApiError::ValidationError("date_time is required".to_string()))?;
        let duration = self
            .duration
            .ok_or_else(|| ApiError::ValidationError("duration is required".to_string()))?;
        if duration < MIN_APPOINTMENT_MINUTES {
            return Err(ApiError::ValidationError(format!(
                "duration must be at least {} minutes",
                MIN_APPOINTMENT_MINUTES
            )));
        }
        let reason = supplied_text(self.reason, "reason")?;

        Ok(AppointmentChanges { patient_id, doctor_id, date_time, duration, reason })
    }
}

pub struct AppointmentService;

impl AppointmentService {
    pub async fn list(store: &SharedStore) -> Result<Vec<AppointmentDetail>, ApiError> {
        let appointments = with_store(store, |s| s.list_appointments()).await?;
        debug!("Listed {} appointments", appointments.len());
        Ok(appointments)
    }

    pub async fn get(store: &SharedStore, id: i32) -> Result<AppointmentDetail, ApiError> {
        with_store(store, move |s| s.find_appointment(id))
            .await?
            .ok_or_else(|| ApiError::NotFoundError("Appointment not found".to_string()))
    }

    pub async fn create(store: &SharedStore, request: AppointmentRequest) -> Result<i32, ApiError> {
        let new_appointment = request.validate()?.into_new_appointment();
        let created = with_store(store, move |s| s.insert_appointment(&new_appointment)).await?;
        info!(
            "Created appointment {} for patient {} with doctor {}",
            created.id, created.patient_id, created.doctor_id
        );
        Ok(created.id)
    }

    pub async fn update(store: &SharedStore, id: i32, request: AppointmentRequest) -> Result<Appointment, ApiError> {
        if !with_store(store, move |s| s.appointment_exists(id)).await? {
            return Err(ApiError::NotFoundError("Appointment not found".to_string()));
        }

        let changes = request.validate()?;
        let updated = with_store(store, move |s| s.update_appointment(id, &changes))
            .await?
            // deleted between the existence check and the write
            .ok_or_else(|| ApiError::NotFoundError("Appointment not found".to_string()))?;

        info!("Updated appointment {}", id);
        Ok(updated)
    }

    pub async fn delete(store: &SharedStore, id: i32) -> Result<(), ApiError> {
        let removed = with_store(store, move |s| s.delete_appointment(id)).await?;
        if removed {
            info!("Deleted appointment {}", id);
        } else {
            debug!("Delete requested for missing appointment {}", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use crate::store::{MemoryStore, Store};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn request(duration: i32) -> AppointmentRequest {
        AppointmentRequest {
            patient_id: Some(1),
            doctor_id: Some(2),
            date_time: Some(Utc.with_ymd_and_hms(2025, 5, 20, 14, 0, 0).unwrap()),
            duration: Some(duration),
            reason: Some("  back pain ".to_string()),
        }
    }

    #[test]
    fn fifteen_minutes_is_the_floor() {
        assert!(request(15).validate().is_ok());
        assert!(matches!(request(14).validate(), Err(ApiError::ValidationError(_))));
        assert!(matches!(request(0).validate(), Err(ApiError::ValidationError(_))));
    }

    #[test]
    fn every_field_is_required() {
        let missing = [
            AppointmentRequest { patient_id: None, ..request(30) },
            AppointmentRequest { doctor_id: Some(0), ..request(30) },
            AppointmentRequest { date_time: None, ..request(30) },
            AppointmentRequest { duration: None, ..request(30) },
            AppointmentRequest { reason: Some("   ".to_string()), ..request(30) },
        ];
        for req in missing {
            assert!(matches!(req.validate(), Err(ApiError::ValidationError(_))));
        }
        assert_eq!(request(30).validate().unwrap().reason, "  back pain ");
    }

    #[actix_web::test]
    async fn update_leaves_status_and_notes_alone() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let id = AppointmentService::create(&store, request(30)).await.unwrap();

        let updated = AppointmentService::update(
            &store,
            id,
            AppointmentRequest { duration: Some(45), reason: Some("knee".into()), ..request(30) },
        )
        .await
        .unwrap();

        assert_eq!(updated.duration, 45);
        assert_eq!(updated.reason, "knee");
        assert_eq!(updated.status, AppointmentStatus::Scheduled);
        assert_eq!(updated.notes, "");
    }

    #[actix_web::test]
    async fn reason_round_trips_untouched() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let id = AppointmentService::create(
            &store,
            AppointmentRequest { reason: Some("  cough\n".to_string()), ..request(30) },
        )
        .await
        .unwrap();

        let fetched = AppointmentService::get(&store, id).await.unwrap();
        assert_eq!(fetched.appointment.reason, "  cough\n");
    }

    #[actix_web::test]
    async fn missing_appointment_wins_over_bad_payload() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let err = AppointmentService::update(&store, 404, request(5)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFoundError(_)));
    }

    #[actix_web::test]
    async fn rejected_create_persists_nothing() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        assert!(AppointmentService::create(&store, request(10)).await.is_err());
        assert!(AppointmentService::list(&store).await.unwrap().is_empty());
    }
}
