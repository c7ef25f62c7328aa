use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::config::QuerySettings;
use crate::core::{GeoClosest, PredicateError};
use crate::models::{
    BatchCreateRequest, BatchCreateResponse, ClosestMatch, ClosestQueryRequest, ClosestResponse,
    CreateRecordRequest, ErrorResponse, HealthResponse, NewRecord,
};
use crate::services::{CacheKey, CacheManager, RecordStore, StoreError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub cache: Arc<CacheManager>,
    pub query: QuerySettings,
}

/// Configure all record routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/records", web::post().to(create_record))
        .route("/records/batch", web::post().to(create_records))
        .route("/records/closest", web::post().to(find_closest))
        .route("/records/{id}", web::get().to(get_record))
        .route("/records/{id}", web::delete().to(delete_record));
}

fn bad_request(error: &str, message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: 400,
    })
}

fn store_error_response(context: &str, err: StoreError) -> HttpResponse {
    match err {
        StoreError::InvalidInput(e) => bad_request("Invalid input", e.to_string()),
        StoreError::NotFound(id) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Not found".to_string(),
            message: format!("Record {} does not exist", id),
            status_code: 404,
        }),
        e => {
            tracing::error!("{}: {}", context, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: context.to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

/// Cached query results may include or miss the changed records
async fn invalidate_queries(cache: &CacheManager) {
    if let Err(e) = cache.invalidate_all().await {
        tracing::warn!("Failed to invalidate cache: {}", e);
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = state.store.health_check().await.unwrap_or(false);

    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        cache: state.cache.stats(),
    })
}

/// Store a record
///
/// POST /api/v1/records
///
/// Request body:
/// ```json
/// {
///   "name": "string",
///   "latitude": 40.7128,
///   "longitude": -74.0060,
///   "tags": ["string"]
/// }
/// ```
async fn create_record(
    state: web::Data<AppState>,
    req: web::Json<CreateRecordRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request("Validation failed", errors.to_string());
    }

    match state.store.insert(NewRecord::from(req.into_inner())).await {
        Ok(record) => {
            invalidate_queries(&state.cache).await;
            tracing::info!("Stored record {}", record.id);
            HttpResponse::Created().json(record)
        }
        Err(e) => store_error_response("Failed to store record", e),
    }
}

/// Store several records in one transaction
///
/// POST /api/v1/records/batch
async fn create_records(
    state: web::Data<AppState>,
    req: web::Json<BatchCreateRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request("Validation failed", errors.to_string());
    }

    let records = req
        .into_inner()
        .records
        .into_iter()
        .map(NewRecord::from)
        .collect();

    match state.store.insert_many(records).await {
        Ok(records) => {
            invalidate_queries(&state.cache).await;
            tracing::info!("Stored batch of {} records", records.len());
            HttpResponse::Created().json(BatchCreateResponse {
                inserted: records.len(),
                records,
            })
        }
        Err(e) => store_error_response("Failed to store records", e),
    }
}

/// GET /api/v1/records/{id}
async fn get_record(state: web::Data<AppState>, id: web::Path<Uuid>) -> impl Responder {
    match state.store.get_required(id.into_inner()).await {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => store_error_response("Failed to fetch record", e),
    }
}

/// DELETE /api/v1/records/{id}
async fn delete_record(state: web::Data<AppState>, id: web::Path<Uuid>) -> impl Responder {
    let id = id.into_inner();
    match state.store.delete(id).await {
        Ok(true) => {
            invalidate_queries(&state.cache).await;
            HttpResponse::NoContent().finish()
        }
        Ok(false) => store_error_response("Failed to delete record", StoreError::NotFound(id.to_string())),
        Err(e) => store_error_response("Failed to delete record", e),
    }
}

/// Build the predicate a closest-records request describes
///
/// Returns the predicate and the evaluator limit. An unset or zero
/// `maxCount` falls back to the configured default, and every count is
/// capped by the configured ceiling.
pub fn build_predicate(
    req: &ClosestQueryRequest,
    settings: &QuerySettings,
) -> Result<(GeoClosest, usize), PredicateError> {
    let limit = settings.max_count_limit.max(1);
    let max_count = req
        .max_count
        .filter(|&n| n > 0)
        .unwrap_or(settings.default_max_count)
        .min(limit);
    let max_distance_km = req.unit.to_km(req.max_distance.unwrap_or(0.0));

    let predicate = GeoClosest::new(req.latitude, req.longitude)?
        .with_max_distance(max_distance_km)?
        .with_max_count(max_count)
        .with_metric(settings.metric);

    Ok((predicate, limit))
}

/// Find the records closest to a point
///
/// POST /api/v1/records/closest
///
/// Request body:
/// ```json
/// {
///   "latitude": 40.7128,
///   "longitude": -74.0060,
///   "maxDistance": 5,
///   "maxCount": 10,
///   "unit": "km|m|mi"
/// }
/// ```
async fn find_closest(
    state: web::Data<AppState>,
    req: web::Json<ClosestQueryRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for closest query: {:?}", errors);
        return bad_request("Validation failed", errors.to_string());
    }

    let (mut predicate, limit) = match build_predicate(&req, &state.query) {
        Ok(built) => built,
        Err(e) => return bad_request("Invalid predicate", e.to_string()),
    };

    let cache_key = CacheKey::closest(&predicate, req.unit, limit);
    if let Ok(cached) = state.cache.get::<ClosestResponse>(&cache_key).await {
        tracing::debug!("Serving closest query from cache: {}", cache_key);
        return HttpResponse::Ok().json(cached);
    }

    // Taken before the store read, so a concurrent write keeps this result out
    let generation = state.cache.generation();

    tracing::info!(
        "Finding up to {} records within {} km of ({}, {})",
        predicate.max_count(),
        predicate.max_distance(),
        predicate.latitude(),
        predicate.longitude()
    );

    let result = match state.store.find_closest(&mut predicate, Some(limit)).await {
        Ok(result) => result,
        Err(e) => return store_error_response("Failed to query records", e),
    };

    let response = ClosestResponse {
        total_candidates: result.total_candidates,
        examined: result.examined,
        matches: result
            .matches
            .into_iter()
            .map(|m| ClosestMatch {
                distance_km: m
                    .rank
                    .unwrap_or_else(|| predicate.distance_to(&m.record)),
                record: m.record,
            })
            .collect(),
    };

    tracing::info!(
        "Returning {} records (examined {} of {} candidates)",
        response.matches.len(),
        response.examined,
        response.total_candidates
    );

    if let Err(e) = state.cache.set_if_current(&cache_key, &response, generation).await {
        tracing::warn!("Failed to cache closest query: {}", e);
    }

    HttpResponse::Ok().json(response)
}
