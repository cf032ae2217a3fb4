use log::{error, info, warn};

use super::{blocking, supplied_text};
use crate::errors::ApiError;
use crate::gateway::AssistantGateway;
use crate::models::{ChatRequest, ChatSession, Transcript};
use crate::store::{SharedStore, Store, StoreError};

pub fn build_prompt(message: &str) -> String {
    format!("User: {}\nMedical Assistant:", message)
}

/// Appends one exchange to the appointment's transcript, opening a session
/// if the appointment has none yet.
pub fn record_exchange(
    store: &dyn Store,
    appointment_id: i32,
    message: &str,
    reply: &str,
) -> Result<ChatSession, StoreError> {
    match store.find_chat_session(appointment_id)? {
        Some(mut session) => {
            session.transcript.push_exchange(message, reply);
            store.save_chat_session(&session)?;
            Ok(session)
        }
        None => store.create_chat_session(appointment_id, &Transcript::from_exchange(message, reply)),
    }
}

pub struct AssistantService;

impl AssistantService {
    /// One chat turn. A failure to save the transcript is logged and does not
    /// affect the reply.
    pub async fn chat(
        store: &SharedStore,
        gateway: &dyn AssistantGateway,
        request: ChatRequest,
    ) -> Result<String, ApiError> {
        let message = supplied_text(request.message, "message")?;
        let appointment_id = match request.appointment_id {
            Some(id) if id < 0 => {
                return Err(ApiError::ValidationError("appointment_id must not be negative".to_string()))
            }
            Some(id) if id > 0 => Some(id),
            _ => None,
        };

        let reply = gateway.generate(&build_prompt(&message)).await.map_err(|e| {
            warn!("Assistant gateway call failed: {}", e);
            ApiError::GatewayError(format!("Failed to get AI response: {}", e))
        })?;

        let Some(appointment_id) = appointment_id else {
            return Ok(reply);
        };

        let text = reply.clone();
        match blocking(store, move |s| record_exchange(s, appointment_id, &message, &text)).await {
            Ok(Ok(session)) => info!(
                "Chat session {} for appointment {} now holds {} turns",
                session.id,
                appointment_id,
                session.transcript.len()
            ),
            Ok(Err(e)) => error!("Failed to save chat transcript for appointment {}: {}", appointment_id, e),
            Err(e) => error!("Failed to save chat transcript for appointment {}: {}", appointment_id, e),
        }

        Ok(reply)
    }
}
