use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use log::warn;
use std::env;
use std::str::FromStr;

// Type aliases
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Accepted range for `BCRYPT_COST`.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

pub const DEFAULT_ASSISTANT_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/medalpaca/medical-assistant";

// Database initialization SQL
pub const DB_INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ,
    email VARCHAR(255) UNIQUE NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    role VARCHAR(20) NOT NULL
);

CREATE TABLE IF NOT EXISTS doctors (
    id SERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ,
    user_id INTEGER NOT NULL REFERENCES users(id),
    specialty TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS patients (
    id SERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ,
    user_id INTEGER NOT NULL REFERENCES users(id),
    phone TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    medical_id TEXT NOT NULL DEFAULT ''
);

-- no foreign keys on patient_id and doctor_id
CREATE TABLE IF NOT EXISTS appointments (
    id SERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ,
    patient_id INTEGER NOT NULL,
    doctor_id INTEGER NOT NULL,
    date_time TIMESTAMPTZ NOT NULL,
    duration INTEGER NOT NULL CHECK (duration >= 15),
    status VARCHAR(20) NOT NULL DEFAULT 'scheduled',
    reason TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    chat_session_id INTEGER
);

CREATE TABLE IF NOT EXISTS chat_sessions (
    id SERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ,
    appointment_id INTEGER NOT NULL,
    messages TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_users_deleted_at ON users (deleted_at);
CREATE INDEX IF NOT EXISTS idx_doctors_user_id ON doctors (user_id);
CREATE INDEX IF NOT EXISTS idx_patients_user_id ON patients (user_id);
CREATE INDEX IF NOT EXISTS idx_appointments_deleted_at ON appointments (deleted_at);
CREATE INDEX IF NOT EXISTS idx_chat_sessions_appointment_id ON chat_sessions (appointment_id);
"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unsupported DB_TYPE '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
}

// Config
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_pool_size: u32,
    pub bcrypt_cost: u32,
    pub assistant: AssistantConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 2,
            store_backend: StoreBackend::Postgres,
            database_url: None,
            db_pool_size: 10,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            assistant: AssistantConfig {
                api_key: None,
                endpoint: DEFAULT_ASSISTANT_MODEL_URL.to_string(),
            },
        }
    }
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let store_backend = match env::var("DB_TYPE") {
            Ok(raw) => raw.parse::<StoreBackend>().unwrap_or_else(|e| {
                warn!("{}, falling back to postgres", e);
                StoreBackend::Postgres
            }),
            Err(_) => defaults.store_backend,
        };

        let api_key = non_empty_var("HUGGINGFACE_API_KEY");
        if api_key.is_none() {
            warn!("HUGGINGFACE_API_KEY is not set; assistant chat requests will fail");
        }

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parsed_var("PORT", defaults.port),
            workers: parsed_var("HTTP_WORKERS", defaults.workers),
            store_backend,
            database_url: non_empty_var("DATABASE_URL"),
            db_pool_size: parsed_var("DB_POOL_SIZE", defaults.db_pool_size),
            bcrypt_cost: parsed_var("BCRYPT_COST", defaults.bcrypt_cost),
            assistant: AssistantConfig {
                api_key,
                endpoint: non_empty_var("ASSISTANT_MODEL_URL").unwrap_or(defaults.assistant.endpoint),
            },
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.store_backend == StoreBackend::Postgres && self.database_url.is_none() {
            return Err("DATABASE_URL must be set when DB_TYPE=postgres".to_string());
        }

        if self.workers == 0 {
            return Err("HTTP_WORKERS must be positive".to_string());
        }

        if self.db_pool_size == 0 {
            return Err("DB_POOL_SIZE must be positive".to_string());
        }

        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(format!(
                "BCRYPT_COST must be between {} and {}",
                MIN_BCRYPT_COST,
                MAX_BCRYPT_COST
            ));
        }

        if self.store_backend == StoreBackend::Memory {
            warn!("Using the in-memory store; data is lost on restart");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_backend_needs_a_database_url() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());

        let config = AppConfig {
            database_url: Some("postgres://localhost/medisched".to_string()),
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn memory_backend_runs_without_a_database() {
        let config = AppConfig { store_backend: StoreBackend::Memory, ..AppConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bcrypt_cost_is_bounded() {
        let config = AppConfig {
            store_backend: StoreBackend::Memory,
            bcrypt_cost: 2,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        for bcrypt_cost in [MIN_BCRYPT_COST, bcrypt::DEFAULT_COST, MAX_BCRYPT_COST] {
            let config = AppConfig { store_backend: StoreBackend::Memory, bcrypt_cost, ..AppConfig::default() };
            assert!(config.validate().is_ok(), "{}", bcrypt_cost);
        }
        let config = AppConfig {
            store_backend: StoreBackend::Memory,
            bcrypt_cost: MAX_BCRYPT_COST + 1,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert_eq!(" Memory ".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
