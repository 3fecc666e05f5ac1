use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use db::DBService;
use services::services::{
    auth::AuthService, config::Config, flashcard_generator::FlashcardGenerator,
    generation::GenerationService,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

pub mod error;
pub mod extract;
pub mod routes;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct DeploymentImpl {
    db: DBService,
    config: Arc<Config>,
    auth: AuthService,
    generation: Option<Arc<GenerationService>>,
}

impl DeploymentImpl {
    pub fn new(
        db: DBService,
        config: Arc<Config>,
        generator: Option<Arc<dyn FlashcardGenerator>>,
    ) -> Self {
        let auth = AuthService::new(db.pool.clone(), &config.jwt_secret, config.session_ttl);
        let generation = generator.map(|generator| {
            Arc::new(GenerationService::new(
                db.pool.clone(),
                generator,
                config.ai.max_flashcards,
            ))
        });
        Self {
            db,
            config,
            auth,
            generation,
        }
    }

    pub fn with_auth(mut self, auth: AuthService) -> Self {
        self.auth = auth;
        self
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// `None` when no AI provider is configured.
    pub fn generation(&self) -> Option<&GenerationService> {
        self.generation.as_deref()
    }
}

pub fn app(deployment: DeploymentImpl) -> Router {
    let cors = cors_layer(deployment.config());
    let api = Router::new()
        .merge(routes::health::router(&deployment))
        .merge(routes::auth::router(&deployment))
        .merge(routes::topics::router(&deployment))
        .merge(routes::documents::router(&deployment))
        .merge(routes::flashcards::router(&deployment));

    Router::new()
        .nest("/api", api)
        .with_state(deployment)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
