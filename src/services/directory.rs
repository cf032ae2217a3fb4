use log::debug;

use super::with_store;
use crate::errors::ApiError;
use crate::models::{DoctorProfile, PatientProfile};
use crate::store::SharedStore;

/// Read-only view of doctors and patients. Records only come into being
/// through registration.
pub struct DirectoryService;

impl DirectoryService {
    pub async fn list_doctors(store: &SharedStore) -> Result<Vec<DoctorProfile>, ApiError> {
        let doctors = with_store(store, |s| s.list_doctors()).await?;
        debug!("Listed {} doctors", doctors.len());
        Ok(doctors)
    }

    pub async fn get_doctor(store: &SharedStore, id: i32) -> Result<DoctorProfile, ApiError> {
        with_store(store, move |s| s.find_doctor(id))
            .await?
            .ok_or_else(|| ApiError::NotFoundError("Doctor not found".to_string()))
    }

    pub async fn list_patients(store: &SharedStore) -> Result<Vec<PatientProfile>, ApiError> {
        let patients = with_store(store, |s| s.list_patients()).await?;
        debug!("Listed {} patients", patients.len());
        Ok(patients)
    }

    pub async fn get_patient(store: &SharedStore, id: i32) -> Result<PatientProfile, ApiError> {
        with_store(store, move |s| s.find_patient(id))
            .await?
            .ok_or_else(|| ApiError::NotFoundError("Patient not found".to_string()))
    }
}
