//! Client for the hosted text-generation model behind the assistant chat.

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AssistantConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HUGGINGFACE_API_KEY is not set")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API request failed with status code: {0}")]
    Status(u16),
    #[error("empty response from API")]
    EmptyResult,
    #[error("malformed response from API: {0}")]
    Malformed(String),
}

/// Text in, generated text out.
#[async_trait]
pub trait AssistantGateway: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}

#[derive(Serialize, Debug)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Deserialize, Debug)]
struct InferenceResult {
    generated_text: String,
}

/// Pulls the first `generated_text` out of an inference API response body.
pub fn extract_generated_text(body: &str) -> Result<String, GatewayError> {
    let results: Vec<InferenceResult> =
        serde_json::from_str(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    results
        .into_iter()
        .next()
        .map(|r| r.generated_text)
        .ok_or(GatewayError::EmptyResult)
}

/// Hugging Face inference endpoint. No timeout or retry is applied beyond
/// what the HTTP client does on its own.
pub struct HuggingFaceGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HuggingFaceGateway {
    pub fn new(config: &AssistantConfig) -> Self {
        info!("Assistant gateway targeting {}", config.endpoint);
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl AssistantGateway for HuggingFaceGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::MissingApiKey)?;

        debug!("Sending {} byte prompt to {}", prompt.len(), self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&InferenceRequest { inputs: prompt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        extract_generated_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::ServerHandle;
    use actix_web::http::StatusCode;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};

    /// Starts a local inference stand-in that answers every request with
    /// `status` and `body`, provided the bearer key is `test-key`.
    fn inference_server(status: StatusCode, body: &'static str) -> (String, ServerHandle) {
        let server = HttpServer::new(move || {
            App::new().default_service(web::to(move |req: HttpRequest| async move {
                let authorised = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer test-key");
                if !authorised {
                    return HttpResponse::Unauthorized().finish();
                }
                HttpResponse::build(status).content_type("application/json").body(body)
            }))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (format!("http://{}/models/medical-assistant", addr), handle)
    }

    fn gateway_for(endpoint: String) -> HuggingFaceGateway {
        HuggingFaceGateway::new(&AssistantConfig { api_key: Some("test-key".to_string()), endpoint })
    }

    #[test]
    fn takes_the_first_generation() {
        let body = r#"[{"generated_text":"Drink water."},{"generated_text":"ignored"}]"#;
        assert_eq!(extract_generated_text(body).unwrap(), "Drink water.");
    }

    #[test]
    fn empty_result_list_is_an_error() {
        assert!(matches!(extract_generated_text("[]"), Err(GatewayError::EmptyResult)));
    }

    #[test]
    fn unexpected_shapes_are_malformed() {
        assert!(matches!(
            extract_generated_text(r#"{"error":"Model is loading"}"#),
            Err(GatewayError::Malformed(_))
        ));
        assert!(matches!(extract_generated_text("<html>"), Err(GatewayError::Malformed(_))));
    }

    #[actix_web::test]
    async fn missing_api_key_fails_before_any_request() {
        let gateway = HuggingFaceGateway::new(&AssistantConfig {
            api_key: None,
            endpoint: "http://127.0.0.1:9/unreachable".to_string(),
        });

        let err = gateway.generate("User: hi\nMedical Assistant:").await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingApiKey));
    }

    #[actix_web::test]
    async fn returns_the_generated_text() {
        let (endpoint, server) = inference_server(StatusCode::OK, r#"[{"generated_text":"Rest and fluids."}]"#);
        let reply = gateway_for(endpoint).generate("User: hi\nMedical Assistant:").await;
        server.stop(false).await;

        assert_eq!(reply.unwrap(), "Rest and fluids.");
    }

    #[actix_web::test]
    async fn non_success_status_is_reported() {
        let (endpoint, server) = inference_server(StatusCode::SERVICE_UNAVAILABLE, r#"{"error":"loading"}"#);
        let err = gateway_for(endpoint).generate("User: hi\nMedical Assistant:").await.unwrap_err();
        server.stop(false).await;

        assert!(matches!(err, GatewayError::Status(503)), "{:?}", err);
    }

    #[actix_web::test]
    async fn empty_generation_list_is_reported() {
        let (endpoint, server) = inference_server(StatusCode::OK, "[]");
        let err = gateway_for(endpoint).generate("User: hi\nMedical Assistant:").await.unwrap_err();
        server.stop(false).await;

        assert!(matches!(err, GatewayError::EmptyResult), "{:?}", err);
    }

    #[actix_web::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let err = gateway_for(format!("http://127.0.0.1:{}/models/medical-assistant", port))
            .generate("User: hi\nMedical Assistant:")
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Transport(_)), "{:?}", err);
    }
}
