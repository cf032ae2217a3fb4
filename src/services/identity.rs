use bcrypt::{hash, verify};
use log::{debug, error, info};

use super::{required_text, with_store};
use crate::errors::ApiError;
use crate::models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, Role};
use crate::store::SharedStore;

pub const MIN_PASSWORD_LEN: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub struct IdentityService;

impl IdentityService {
    pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
        hash(password, cost).map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::InternalError("Failed to hash password".to_string())
        })
    }

    /// A stored hash that cannot be read counts as a mismatch.
    pub fn verify_password(password: &str, password_hash: &str) -> bool {
        verify(password, password_hash).unwrap_or_else(|e| {
            error!("Failed to verify password: {}", e);
            false
        })
    }

    pub fn is_well_formed_email(email: &str) -> bool {
        if email.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    }

    pub async fn register(store: &SharedStore, request: RegisterRequest, bcrypt_cost: u32) -> Result<i32, ApiError> {
        let name = required_text(request.name, "name")?;
        let email = required_text(request.email, "email")?;
        let role = required_text(request.role, "role")?;
        let password = request.password.unwrap_or_default();

        if !Self::is_well_formed_email(&email) {
            return Err(ApiError::ValidationError("email is not a valid address".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::ValidationError(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let role = role.parse::<Role>().map_err(|e| ApiError::ValidationError(e.to_string()))?;

        let new_user = NewUser {
            email,
            password_hash: Self::hash_password(&password, bcrypt_cost)?,
            name,
            role,
        };

        let user = with_store(store, move |s| s.create_identity(&new_user, new_user.role.companion())).await?;
        info!("Registered {} user {} (id {})", user.role, user.email, user.id);
        Ok(user.id)
    }

    pub async fn login(store: &SharedStore, request: LoginRequest) -> Result<LoginResponse, ApiError> {
        let email = required_text(request.email, "email")?;
        let password = match request.password {
            Some(p) if !p.is_empty() => p,
            _ => return Err(ApiError::ValidationError("password is required".to_string())),
        };

        let lookup = email.clone();
        let user = match with_store(store, move |s| s.find_user_by_email(&lookup)).await? {
            Some(user) => user,
            None => {
                debug!("Login failed: no user with email {}", email);
                return Err(ApiError::AuthError(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !Self::verify_password(&password, &user.password_hash) {
            debug!("Login failed: wrong password for {}", email);
            return Err(ApiError::AuthError(INVALID_CREDENTIALS.to_string()));
        }

        info!("User {} logged in", user.email);
        Ok(LoginResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_BCRYPT_COST;
    use crate::store::{MemoryStore, Store};
    use std::sync::Arc;

    fn store() -> Arc<dyn Store> {
        Arc::new(MemoryStore::new())
    }

    fn registration(email: &str, password: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some("Dr. A".to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            role: Some(role.to_string()),
        }
    }

    #[test]
    fn email_shape_check() {
        assert!(IdentityService::is_well_formed_email("a@b.co"));
        assert!(IdentityService::is_well_formed_email("first.last+tag@clinic.example.org"));
        for bad in ["", "plain", "@clinic.test", "a@", "a@clinic", "a@@clinic.test", "a b@clinic.test", "a@.test", "a@clinic."] {
            assert!(!IdentityService::is_well_formed_email(bad), "{}", bad);
        }
    }

    #[test]
    fn hashes_verify_only_against_the_original() {
        let hashed = IdentityService::hash_password("s3cret!", MIN_BCRYPT_COST).unwrap();
        assert_ne!(hashed, "s3cret!");
        assert!(IdentityService::verify_password("s3cret!", &hashed));
        assert!(!IdentityService::verify_password("s3cret", &hashed));
        assert!(!IdentityService::verify_password("s3cret!", "not-a-bcrypt-hash"));
    }

    #[actix_web::test]
    async fn registration_rejects_bad_input() {
        let store = store();
        let cases = [
            registration("dr@clinic.test", "12345", "doctor"),
            registration("not-an-email", "123456", "doctor"),
            registration("dr@clinic.test", "123456", "nurse"),
            RegisterRequest { name: None, ..registration("dr@clinic.test", "123456", "doctor") },
            RegisterRequest { role: None, ..registration("dr@clinic.test", "123456", "doctor") },
        ];
        for request in cases {
            let err = IdentityService::register(&store, request, MIN_BCRYPT_COST).await.unwrap_err();
            assert!(matches!(err, ApiError::ValidationError(_)), "{:?}", err);
        }
        assert!(store.find_user_by_email("dr@clinic.test").unwrap().is_none());
    }

    #[actix_web::test]
    async fn stored_hash_matches_the_registered_password() {
        let store = store();
        let id = IdentityService::register(&store, registration("dr@clinic.test", "hunter22", "doctor"), MIN_BCRYPT_COST)
            .await
            .unwrap();

        let user = store.find_user_by_email("dr@clinic.test").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert!(IdentityService::verify_password("hunter22", &user.password_hash));
        assert!(!IdentityService::verify_password("hunter23", &user.password_hash));
    }

    #[actix_web::test]
    async fn login_does_not_reveal_which_part_was_wrong() {
        let store = store();
        IdentityService::register(&store, registration("p@clinic.test", "hunter22", "patient"), MIN_BCRYPT_COST)
            .await
            .unwrap();

        let unknown = LoginRequest { email: Some("x@clinic.test".into()), password: Some("hunter22".into()) };
        let wrong = LoginRequest { email: Some("p@clinic.test".into()), password: Some("hunter2".into()) };
        for request in [unknown, wrong] {
            match IdentityService::login(&store, request).await {
                Err(ApiError::AuthError(msg)) => assert_eq!(msg, INVALID_CREDENTIALS),
                other => panic!("expected auth error, got {:?}", other),
            }
        }

        let ok = IdentityService::login(
            &store,
            LoginRequest { email: Some("p@clinic.test".into()), password: Some("hunter22".into()) },
        )
        .await
        .unwrap();
        assert_eq!(ok.role, Role::Patient);
        assert_eq!(ok.name, "Dr. A");
    }
}
