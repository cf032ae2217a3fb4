use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::debug;
use serde_json::json;

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::gateway::AssistantGateway;
use crate::models::{AppointmentRequest, ChatRequest, ChatResponse, LoginRequest, RegisterRequest};
use crate::services::{AppointmentService, AssistantService, DirectoryService, IdentityService};
use crate::store::Store;

type StoreData = web::Data<dyn Store>;

#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[post("/auth/register")]
async fn register(
    store: StoreData,
    config: web::Data<AppConfig>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    debug!("Registration attempt for: {:?}", body.email);
    let user_id = IdentityService::register(&store.into_inner(), body.into_inner(), config.bcrypt_cost).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user_id": user_id
    })))
}

#[post("/auth/login")]
async fn login(store: StoreData, body: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    debug!("Login attempt for: {:?}", body.email);
    let identity = IdentityService::login(&store.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(identity))
}

#[get("/appointments")]
async fn list_appointments(store: StoreData) -> Result<HttpResponse, ApiError> {
    let appointments = AppointmentService::list(&store.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

#[get("/appointments/{id}")]
async fn get_appointment(store: StoreData, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let appointment = AppointmentService::get(&store.into_inner(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

#[post("/appointments")]
async fn create_appointment(store: StoreData, body: web::Json<AppointmentRequest>) -> Result<HttpResponse, ApiError> {
    let id = AppointmentService::create(&store.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

#[put("/appointments/{id}")]
async fn update_appointment(
    store: StoreData,
    path: web::Path<i32>,
    body: web::Json<AppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let appointment = AppointmentService::update(&store.into_inner(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

#[delete("/appointments/{id}")]
async fn delete_appointment(store: StoreData, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    AppointmentService::delete(&store.into_inner(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Appointment deleted successfully" })))
}

#[get("/doctors")]
async fn list_doctors(store: StoreData) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(DirectoryService::list_doctors(&store.into_inner()).await?))
}

#[get("/doctors/{id}")]
async fn get_doctor(store: StoreData, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(DirectoryService::get_doctor(&store.into_inner(), path.into_inner()).await?))
}

#[get("/patients")]
async fn list_patients(store: StoreData) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(DirectoryService::list_patients(&store.into_inner()).await?))
}

#[get("/patients/{id}")]
async fn get_patient(store: StoreData, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(DirectoryService::get_patient(&store.into_inner(), path.into_inner()).await?))
}

#[post("/assistant/chat")]
async fn chat(
    store: StoreData,
    gateway: web::Data<dyn AssistantGateway>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = AssistantService::chat(&store.into_inner(), gateway.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ChatResponse { response }))
}

/// Registers extractor error handling and every route under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::NotFoundError(format!("Resource not found: {}", err)).into()),
    )
    .service(
        web::scope("/api")
            .service(health_check)
            .service(register)
            .service(login)
            .service(list_appointments)
            .service(get_appointment)
            .service(create_appointment)
            .service(update_appointment)
            .service(delete_appointment)
            .service(list_doctors)
            .service(get_doctor)
            .service(list_patients)
            .service(get_patient)
            .service(chat),
    );
}
