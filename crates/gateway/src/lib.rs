//! HTTP gateway for payassist.
//!
//! A thin axum layer over the context pipeline: session cookies, caller
//! identity, and the chat endpoints. Everything interesting happens in
//! `payassist-pipeline`.

pub mod auth;
pub mod chat;
pub mod error;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderName, HeaderValue, Method, header},
    response::Json,
    routing::get,
};
use payassist_config::AppConfig;
use payassist_core::{AuthProvider, DataStore, Provider};
use payassist_pipeline::{ContextPipeline, Enricher, ResponseChannel};
use payassist_security::CookieSettings;
use payassist_security::session::CSRF_HEADER;
use payassist_store::Backends;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
pub struct GatewayState {
    pub config: AppConfig,
    pub pipeline: ContextPipeline,
    pub store: Arc<dyn DataStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub cookies: CookieSettings,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Wire the pipeline from its collaborators. Clients are built once here
    /// and shared by every request.
    pub fn new(config: AppConfig, provider: Arc<dyn Provider>, backends: Backends) -> Self {
        let channel = ResponseChannel::new(provider, config.llm.model.clone())
            .with_config(config.llm.generation_config());
        let pipeline = ContextPipeline::new(Enricher::new(backends.store.clone()), channel);
        let cookies = CookieSettings::from(&config.session);
        Self {
            config,
            pipeline,
            store: backends.store,
            auth: backends.auth,
            cookies,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build the router with all routes and layers.
///
/// Layers: CORS from config, 1 MB body limit, HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .nest("/api/v1/auth", auth::router())
        .nest("/api/v1/chat", chat::router())
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = payassist_providers::build_from_config(&config)?;
    let backends = payassist_store::build_from_config(&config)?;
    info!(
        provider = provider.name(),
        store = backends.store.name(),
        environment = %config.environment,
        "Collaborators ready"
    );

    let state = Arc::new(GatewayState::new(config, provider, backends));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    environment: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "payassist",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use http_body_util::BodyExt;
    use payassist_core::error::ProviderError;
    use payassist_core::{AuthUser, GenerationRequest, GenerationResponse};
    use payassist_store::InMemoryStore;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Answers every prompt with the same text and remembers the prompts.
    pub struct MockProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl MockProvider {
        pub fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, ProviderError> {
            self.prompts.lock().unwrap().push(request.prompt);
            Ok(GenerationResponse::from_text(self.reply.clone()))
        }
    }

    pub async fn test_state() -> (SharedState, String) {
        test_state_with(Arc::new(MockProvider::new("Mock answer"))).await
    }

    /// State over a seeded in-memory store. Returns an access token for `emp-1`.
    pub async fn test_state_with(provider: Arc<dyn Provider>) -> (SharedState, String) {
        let store = InMemoryStore::new();
        let user = AuthUser {
            id: "emp-1".into(),
            email: Some("jane.doe@example.com".into()),
        };
        store.add_user(user.clone(), "correct-horse").await;
        let token = store.issue_token(user).await;

        store
            .seed(
                "profiles",
                vec![json!({"id": "emp-1", "role": "employee", "company_id": "co-1", "full_name": "Jane Doe"})],
            )
            .await;
        store
            .seed(
                "employees",
                vec![json!({"id": "emp-1", "company_id": "co-1", "full_name": "Jane Doe"})],
            )
            .await;
        store
            .seed(
                "payslips",
                vec![json!({
                    "id": "ps-1",
                    "employee_id": "emp-1",
                    "created_at": "2025-05-31T10:00:00+00:00",
                    "gross_pay": 50000,
                    "net_pay": 42000,
                    "bank_account": "001234567890",
                    "pay_data_snapshot": {"base_pay": 40000, "pan": "ABCDE1234F"}
                })],
            )
            .await;

        let store = Arc::new(store);
        let backends = Backends {
            store: store.clone(),
            auth: store,
        };
        let state = Arc::new(GatewayState::new(AppConfig::default(), provider, backends));
        (state, token)
    }

    pub async fn send(state: &SharedState, req: Request<Body>) -> Response {
        build_router(state.clone()).oneshot(req).await.unwrap()
    }

    pub async fn login(state: &SharedState, email: &str, password: &str) -> Response {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"email": email, "password": password}).to_string(),
            ))
            .unwrap();
        send(state, req).await
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }
}
