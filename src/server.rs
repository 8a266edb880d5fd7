use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::store::{TimezoneRecord, ZoneStore};
use crate::time::{self, CurrentInstant};

pub struct ServerState {
    pub config: Config,
    pub zone_store_lock: Arc<RwLock<ZoneStore>>,
}

#[derive(Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
}

/// Response for GET /time/current (and GET /time without a city)
#[derive(Serialize)]
pub struct CurrentTimeResponse {
    pub status: u16,
    pub data: CurrentInstant,
}

#[derive(Debug, Serialize)]
pub struct CityTime {
    pub city: String,
    #[serde(rename = "localTime")]
    pub local_time: String,
    pub timezone: String,
}

/// Response for GET /time/{city}
#[derive(Debug, Serialize)]
pub struct CityTimeResponse {
    pub status: u16,
    pub data: CityTime,
}

#[derive(Debug, Serialize)]
pub struct NotFoundResponse {
    pub status: u16,
    pub message: String,
}

// The query-parameter route reports unknown cities with a bare `error`
// field, unlike the path-parameter route's `{status, message}` envelope.
#[derive(Serialize)]
pub struct UnknownCityResponse {
    pub error: String,
}

/// Response for GET /time/zones/all
#[derive(Serialize)]
pub struct ZoneListResponse {
    pub status: u16,
    pub data: Vec<TimezoneRecord>,
}

/// Request for POST /time/zones
#[derive(Deserialize)]
pub struct CreateZoneRequest {
    pub city: String,
    pub timezone: String,
    /// Static offset from UTC, in hours
    pub offset: f64,
}

#[derive(Debug, Serialize)]
pub struct ZoneCreatedResponse {
    pub status: u16,
    pub message: String,
    pub data: TimezoneRecord,
}

#[derive(Debug, Serialize)]
pub struct CreateFailedResponse {
    pub status: u16,
    pub message: String,
    pub error: String,
}

#[derive(Deserialize)]
pub struct TimeQuery {
    pub city: Option<String>,
}

#[derive(Debug, Error)]
pub enum ZoneValidationError {
    #[error("Field \"city\" must not be empty")]
    EmptyCity,
    #[error("Field \"timezone\" must not be empty")]
    EmptyTimezone,
    #[error("Field \"offset\" must be a finite number")]
    NonFiniteOffset,
}

impl CreateZoneRequest {
    // Checked before the request reaches the store, so malformed bodies get
    // a validation error rather than a storage one.
    fn validate(&self) -> Result<(), ZoneValidationError> {
        if self.city.trim().is_empty() {
            return Err(ZoneValidationError::EmptyCity);
        }
        if self.timezone.trim().is_empty() {
            return Err(ZoneValidationError::EmptyTimezone);
        }
        if !self.offset.is_finite() {
            return Err(ZoneValidationError::NonFiniteOffset);
        }
        Ok(())
    }
}

fn city_time(record: &TimezoneRecord) -> CityTime {
    CityTime {
        city: record.city.clone(),
        local_time: time::to_iso8601(time::local_time_for(record.offset)),
        timezone: record.timezone.clone(),
    }
}

pub async fn get_index() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Benvenuto su TimeTheZone API",
    })
}

pub async fn get_current_time() -> Json<CurrentTimeResponse> {
    Json(CurrentTimeResponse {
        status: 200,
        data: time::current_instant(),
    })
}

pub async fn get_time(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<TimeQuery>,
) -> Response {
    let Some(city) = query.city else {
        return Json(CurrentTimeResponse {
            status: 200,
            data: time::current_instant(),
        })
        .into_response();
    };

    let zone_store = state.zone_store_lock.read().await;
    match zone_store.find_by_city(&city) {
        Some(record) => Json(CityTimeResponse {
            status: 200,
            data: city_time(record),
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(UnknownCityResponse {
                error: format!("Città non trovata: {city}"),
            }),
        )
            .into_response(),
    }
}

pub async fn get_city_time(
    State(state): State<Arc<ServerState>>,
    Path(city): Path<String>,
) -> Result<Json<CityTimeResponse>, (StatusCode, Json<NotFoundResponse>)> {
    let zone_store = state.zone_store_lock.read().await;
    let record = zone_store.find_by_city(&city).ok_or((
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            status: 404,
            message: "Città non trovata".to_string(),
        }),
    ))?;
    Ok(Json(CityTimeResponse {
        status: 200,
        data: city_time(record),
    }))
}

pub async fn get_all_zones(State(state): State<Arc<ServerState>>) -> Json<ZoneListResponse> {
    let zone_store = state.zone_store_lock.read().await;
    Json(ZoneListResponse {
        status: 200,
        data: zone_store.list().to_vec(),
    })
}

fn create_rejection(error: String) -> (StatusCode, Json<CreateFailedResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(CreateFailedResponse {
            status: 400,
            message: "Errore nell'inserimento del fuso orario".to_string(),
            error,
        }),
    )
}

pub async fn create_zone(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<CreateZoneRequest>,
) -> Result<(StatusCode, Json<ZoneCreatedResponse>), (StatusCode, Json<CreateFailedResponse>)> {
    req.validate().map_err(|err| create_rejection(err.to_string()))?;

    let mut zone_store = state.zone_store_lock.write().await;
    let record = zone_store
        .insert(&req.city, &req.timezone, req.offset)
        .await
        .map_err(|err| create_rejection(err.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(ZoneCreatedResponse {
            status: 201,
            message: "Fuso orario aggiunto con successo".to_string(),
            data: record,
        }),
    ))
}
