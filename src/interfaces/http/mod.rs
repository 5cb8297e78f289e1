use crate::application::{AnalysisService, DictionaryService};
use crate::domain::analysis::AnalysisRequest;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::registry::DataSourceRegistry;
use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{dev::Server, get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

pub struct ApiState {
    pub config: AppConfig,
    pub registry: Arc<DataSourceRegistry>,
    pub dictionary_service: DictionaryService,
    pub analysis_service: AnalysisService,
}

impl ApiState {
    pub fn new(config: AppConfig, registry: Arc<DataSourceRegistry>) -> Self {
        Self {
            dictionary_service: DictionaryService::new(registry.clone()),
            analysis_service: AnalysisService::new(registry.clone()),
            config,
            registry,
        }
    }
}

#[derive(Deserialize)]
pub struct SourceQuery {
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "gss".to_string()
}

/// Check the API key from `X-API-Key` or `Authorization`. When no key is
/// configured the API is public.
fn authorize(req: &HttpRequest, config: &AppConfig) -> Result<()> {
    let Some(expected) = config.api_key.as_deref() else {
        return Ok(());
    };
    let provided = req
        .headers()
        .get("X-API-Key")
        .or_else(|| req.headers().get("Authorization"))
        .and_then(|value| value.to_str().ok());
    match provided {
        Some(key) if key == expected => Ok(()),
        _ => Err(AppError::Unauthorized(
            "missing or invalid API key".to_string(),
        )),
    }
}

fn error_response(err: &AppError) -> HttpResponse {
    let (status, kind) = match err {
        AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        AppError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
        AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
        AppError::StorageUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable"),
        AppError::Internal(_)
        | AppError::ParseError(_)
        | AppError::ConfigError(_)
        | AppError::IoError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    let detail = match err {
        AppError::InvalidRequest { message, .. } => message.clone(),
        AppError::Internal(msg)
        | AppError::NotFound(msg)
        | AppError::StorageUnavailable(msg)
        | AppError::Unauthorized(msg)
        | AppError::ParseError(msg)
        | AppError::ConfigError(msg)
        | AppError::IoError(msg) => msg.clone(),
    };
    let field = match err {
        AppError::InvalidRequest { field, .. } => field.clone(),
        _ => None,
    };
    HttpResponse::build(status).json(json!({
        "error": kind,
        "detail": detail,
        "field": field,
    }))
}

#[get("/")]
async fn root() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "aCOMPUTE Statistical Analysis API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "POST /analyze": "Perform statistical analysis",
            "GET /dictionary": "Get variable dictionary",
            "GET /categories": "Get variable categories",
            "GET /sources": "Get available data sources",
            "GET /health": "Health check",
            "GET /ping": "Simple ping test"
        }
    }))
}

#[get("/ping")]
async fn ping() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "pong",
        "timestamp": Utc::now().to_rfc3339(),
        "status": "ok"
    }))
}

#[get("/health")]
async fn health(data: web::Data<ApiState>) -> impl Responder {
    let authentication = if data.config.api_key.is_some() {
        "API key verification active"
    } else {
        "No authentication"
    };
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "aCOMPUTE API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "authentication": authentication,
        "storage": data.config.storage_mode(),
        "sources_registered": data.registry.source_ids().len(),
    }))
}

#[get("/dictionary")]
async fn get_dictionary(
    req: HttpRequest,
    data: web::Data<ApiState>,
    query: web::Query<SourceQuery>,
) -> impl Responder {
    if let Err(err) = authorize(&req, &data.config) {
        return error_response(&err);
    }
    match data.dictionary_service.get_dictionary(&query.source).await {
        Ok(dictionary) => HttpResponse::Ok().json(dictionary),
        Err(err) => {
            warn!(source = %query.source, error = %err, "dictionary lookup failed");
            error_response(&err)
        }
    }
}

#[get("/categories")]
async fn get_categories(
    req: HttpRequest,
    data: web::Data<ApiState>,
    query: web::Query<SourceQuery>,
) -> impl Responder {
    if let Err(err) = authorize(&req, &data.config) {
        return error_response(&err);
    }
    match data.dictionary_service.get_categories(&query.source).await {
        Ok(categories) => HttpResponse::Ok().json(categories),
        Err(err) => {
            warn!(source = %query.source, error = %err, "category lookup failed");
            error_response(&err)
        }
    }
}

#[get("/sources")]
async fn get_sources(req: HttpRequest, data: web::Data<ApiState>) -> impl Responder {
    if let Err(err) = authorize(&req, &data.config) {
        return error_response(&err);
    }
    HttpResponse::Ok().json(json!({ "sources": data.registry.source_ids() }))
}

#[post("/analyze")]
async fn analyze(
    req: HttpRequest,
    data: web::Data<ApiState>,
    body: web::Json<AnalysisRequest>,
) -> impl Responder {
    if let Err(err) = authorize(&req, &data.config) {
        return error_response(&err);
    }
    match data.analysis_service.analyze(&body).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => {
            warn!(source = %body.datasource, error = %err, "analysis failed");
            error_response(&err)
        }
    }
}

pub fn start_server(state: ApiState) -> std::io::Result<Server> {
    let host = state.config.host.clone();
    let port = state.config.port;
    let data = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // public API

        App::new()
            .wrap(cors)
            .app_data(data.clone())
            .service(root)
            .service(ping)
            .service(health)
            .service(get_dictionary)
            .service(get_categories)
            .service(get_sources)
            .service(analyze)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
