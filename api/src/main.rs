mod clients;
mod collaborators;
mod config;
mod constants;
mod models;
mod routes;
mod services;

use axum::http::{HeaderValue, Method, header};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use clients::{
    GroqClient, GroqSummarizer, GroqToxicityClassifier, TesseractExtractor,
    VisionSafeSearchClassifier,
};
use config::Config;
use routes::RouteLimits;
use services::fanout::AnalyzerFanout;
use services::injection_guard::InjectionGuard;
use services::moderation::{ModerationEngine, SummaryStage};
use services::preprocess::PreprocessingPipeline;
use services::summary::SummaryRequestBuilder;
use services::text_stage::TextAnalysisStage;

pub struct AppState {
    pub engine: ModerationEngine,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_engine(config: &Config) -> ModerationEngine {
    let http = reqwest::Client::builder()
        .user_agent(concat!("moderation-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to build HTTP client");

    let groq = GroqClient::new(
        http.clone(),
        &config.groq_base_url,
        config.groq_api_key.clone(),
        &config.groq_model,
    );
    info!(model = groq.model(), "text classifier configured");

    let fanout = AnalyzerFanout::new(
        Arc::new(TesseractExtractor::new(&config.tesseract_bin)),
        Arc::new(VisionSafeSearchClassifier::new(
            http,
            &config.vision_base_url,
            config.vision_api_key.clone(),
        )),
        config.retry.clone(),
    );

    let guard = InjectionGuard::new(config.guard.clone()).expect("Injection patterns must compile");
    let text_stage = TextAnalysisStage::new(
        guard,
        Arc::new(GroqToxicityClassifier::new(groq.clone())),
        config.retry.clone(),
    );

    let summary = config.summaries_enabled.then(|| SummaryStage {
        builder: SummaryRequestBuilder::default(),
        summarizer: Arc::new(GroqSummarizer::new(groq)),
        timeout: config.retry.attempt_timeout,
    });
    if summary.is_none() {
        info!("summaries disabled");
    }

    ModerationEngine::new(
        PreprocessingPipeline::new(config.preprocess.clone()),
        fanout,
        text_stage,
        summary,
        config.request_timeout,
    )
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.json_logs);

    let state = Arc::new(AppState {
        engine: build_engine(&config),
    });

    let limits = RouteLimits {
        max_upload_bytes: config.max_upload_bytes,
        rate_limit_refill_secs: config.rate_limit_refill_secs,
        rate_limit_burst: config.rate_limit_burst,
    };

    let mut app = routes::build_routes(limits)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = &config.cors_allowed_origin {
        match HeaderValue::from_str(origin) {
            Ok(origin) => {
                app = app.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers([header::CONTENT_TYPE]),
                );
            }
            Err(e) => warn!(error = %e, "ignoring invalid CORS_ALLOWED_ORIGIN"),
        }
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    info!(%addr, "moderation api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed");
}
