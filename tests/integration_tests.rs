// Integration tests for Geo Closest

use actix_web::{http::StatusCode, test, web, App};
use geo_closest::config::QuerySettings;
use geo_closest::core::{
    calculate_bounding_box, haversine_distance, DistanceUnit, Evaluator, GeoClosest, WithinBox,
};
use geo_closest::models::{BatchCreateResponse, ClosestResponse, GeoRecord, HealthResponse, NewRecord};
use geo_closest::routes::{self, records::AppState};
use geo_closest::services::{CacheKey, CacheManager, RecordStore};
use serde_json::json;
use std::sync::Arc;

async fn memory_store() -> RecordStore {
    RecordStore::new("sqlite::memory:", 1, 1)
        .await
        .expect("Failed to open in-memory store")
}

fn new_york_landmarks() -> Vec<NewRecord> {
    vec![
        NewRecord::new("Empire State Building", 40.7484, -73.9857).with_tags(["landmark"]),
        NewRecord::new("Statue of Liberty", 40.6892, -74.0445).with_tags(["landmark", "park"]),
        NewRecord::new("Central Park", 40.7829, -73.9654).with_tags(["park"]),
        NewRecord::new("JFK Airport", 40.6413, -73.7781),
        NewRecord::new("Philadelphia City Hall", 39.9526, -75.1652),
        NewRecord::new("Boston Common", 42.3551, -71.0657),
    ]
}

async fn test_state(query: QuerySettings) -> AppState {
    AppState {
        store: Arc::new(memory_store().await),
        cache: Arc::new(CacheManager::in_memory(100, 60)),
        query,
    }
}

#[tokio::test]
async fn test_store_find_closest_matches_brute_force() {
    let store = memory_store().await;
    let records = store.insert_many(new_york_landmarks()).await.unwrap();

    let (lat, lon) = (40.7128, -74.0060);
    let mut predicate = GeoClosest::new(lat, lon)
        .unwrap()
        .with_max_distance(30.0)
        .unwrap()
        .with_max_count(3);

    let result = store.find_closest(&mut predicate, None).await.unwrap();

    let mut expected: Vec<&GeoRecord> = records
        .iter()
        .filter(|r| haversine_distance(lat, lon, r.latitude, r.longitude) <= 30.0)
        .collect();
    expected.sort_by(|a, b| {
        haversine_distance(lat, lon, a.latitude, a.longitude)
            .partial_cmp(&haversine_distance(lat, lon, b.latitude, b.longitude))
            .unwrap()
    });
    expected.truncate(3);

    let actual: Vec<String> = result.matches.iter().map(|m| m.record.name.clone()).collect();
    let expected: Vec<String> = expected.into_iter().map(|r| r.name.clone()).collect();
    assert_eq!(actual, expected);
    assert_eq!(actual[0], "Statue of Liberty");

    // Philadelphia and Boston never leave SQL
    assert_eq!(result.total_candidates, 4);
}

#[tokio::test]
async fn test_store_generic_predicate() {
    let store = memory_store().await;
    store.insert_many(new_york_landmarks()).await.unwrap();

    let mut predicate = WithinBox::new(calculate_bounding_box(42.3601, -71.0589, 5.0));
    let result = store.find(&mut predicate, &Evaluator::new()).await.unwrap();

    let names: Vec<String> = result.records().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Boston Common"]);
}

#[tokio::test]
async fn test_store_reuses_predicate() {
    let store = memory_store().await;
    store.insert_many(new_york_landmarks()).await.unwrap();

    let mut predicate = GeoClosest::new(40.7128, -74.0060).unwrap().with_max_count(2);

    let first = store.find_closest(&mut predicate, None).await.unwrap();
    let second = store.find_closest(&mut predicate, None).await.unwrap();

    assert_eq!(first.matches.len(), 2);
    assert_eq!(first.records(), second.records());
}

#[tokio::test]
async fn test_query_racing_an_insert_is_not_cached() {
    let store = memory_store().await;
    let cache = CacheManager::in_memory(100, 60);
    store.insert(NewRecord::new("old", 0.0, 1.0)).await.unwrap();

    let mut predicate = GeoClosest::new(0.0, 0.0).unwrap().with_max_count(5);
    let key = CacheKey::closest(&predicate, DistanceUnit::Kilometers, 100);
    assert!(cache.get::<Vec<String>>(&key).await.is_err());

    // The query reads the store, then a writer lands before it caches
    let generation = cache.generation();
    let stale: Vec<String> = store
        .find_closest(&mut predicate, None)
        .await
        .unwrap()
        .records()
        .into_iter()
        .map(|r| r.name)
        .collect();
    store.insert(NewRecord::new("new", 0.0, 0.5)).await.unwrap();
    cache.invalidate_all().await.unwrap();
    cache.set_if_current(&key, &stale, generation).await.unwrap();

    assert!(cache.get::<Vec<String>>(&key).await.is_err());
    assert_eq!(store.count().await.unwrap(), 2);

    let fresh: Vec<String> = store
        .find_closest(&mut predicate, None)
        .await
        .unwrap()
        .records()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(fresh, vec!["new", "old"]);
}

#[::core::prelude::v1::test]
fn test_store_open_blocking() {
    let count = tokio_test::block_on(async {
        let store = memory_store().await;
        store.insert(NewRecord::new("ferry terminal", 40.7013, -74.0132)).await.unwrap();
        store.count().await.unwrap()
    });
    assert_eq!(count, 1);
}

#[actix_web::test]
async fn test_http_health() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(test_state(QuerySettings::default()).await))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: HealthResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body.status, "healthy");
    assert!(!body.cache.redis_enabled);
    assert_eq!(body.cache.ttl_secs, 60);
}

#[actix_web::test]
async fn test_http_closest_flow() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(test_state(QuerySettings::default()).await))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/records/batch")
        .set_json(json!({
            "records": [
                { "name": "Empire State Building", "latitude": 40.7484, "longitude": -73.9857 },
                { "name": "Statue of Liberty", "latitude": 40.6892, "longitude": -74.0445 },
                { "name": "Boston Common", "latitude": 42.3551, "longitude": -71.0657 }
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let batch: BatchCreateResponse = test::read_body_json(resp).await;
    assert_eq!(batch.inserted, 3);

    let closest = || {
        test::TestRequest::post()
            .uri("/api/v1/records/closest")
            .set_json(json!({
                "latitude": 40.7128,
                "longitude": -74.0060,
                "maxDistance": 20,
                "maxCount": 5,
                "unit": "km"
            }))
            .to_request()
    };

    let body: ClosestResponse = test::call_and_read_body_json(&app, closest()).await;
    let names: Vec<&str> = body.matches.iter().map(|m| m.record.name.as_str()).collect();
    assert_eq!(names, vec!["Statue of Liberty", "Empire State Building"]);
    assert!(body.matches[0].distance_km < body.matches[1].distance_km);

    // A new, closer record must not be hidden by the cached result
    let req = test::TestRequest::post()
        .uri("/api/v1/records")
        .set_json(json!({ "name": "City Hall", "latitude": 40.7127, "longitude": -74.0059 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let city_hall: GeoRecord = test::read_body_json(resp).await;

    let body: ClosestResponse = test::call_and_read_body_json(&app, closest()).await;
    assert_eq!(body.matches.len(), 3);
    assert_eq!(body.matches[0].record.id, city_hall.id);

    // Fetch and delete by id
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/records/{}", city_hall.id))
        .to_request();
    let fetched: GeoRecord = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched.name, "City Hall");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/records/{}", city_hall.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/records/{}", city_hall.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_http_max_count_ceiling() {
    let query = QuerySettings {
        default_max_count: 2,
        max_count_limit: 3,
        ..QuerySettings::default()
    };
    let state = test_state(query).await;
    state.store.insert_many(new_york_landmarks()).await.unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/records/closest")
        .set_json(json!({ "latitude": 40.7128, "longitude": -74.0060 }))
        .to_request();
    let body: ClosestResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.matches.len(), 2);

    let req = test::TestRequest::post()
        .uri("/api/v1/records/closest")
        .set_json(json!({ "latitude": 40.7128, "longitude": -74.0060, "maxCount": 50 }))
        .to_request();
    let body: ClosestResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.matches.len(), 3);
    assert_eq!(body.total_candidates, 6);
}

#[actix_web::test]
async fn test_http_rejects_invalid_input() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(test_state(QuerySettings::default()).await))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/records/closest")
        .set_json(json!({ "latitude": 95.0, "longitude": 0.0 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/records/closest")
        .set_json(json!({ "latitude": 0.0, "longitude": 0.0, "maxDistance": -5 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/records")
        .set_json(json!({ "name": "", "latitude": 0.0, "longitude": 0.0 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/records/batch")
        .set_json(json!({ "records": [] }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}
