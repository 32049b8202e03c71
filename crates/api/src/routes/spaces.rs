//! Parking Space Routes

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Json,
};
use occupancy::Region;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{ApiError, AppState};

/// Current region list
#[derive(Debug, Serialize)]
pub struct SpacesResponse {
    pub total_spaces: usize,
    /// `[x, y]` pairs in insertion order
    pub positions: Vec<Region>,
}

/// Body of an add request; both coordinates are required
#[derive(Debug, Deserialize)]
pub struct NewSpace {
    pub x: Option<i32>,
    pub y: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SpaceChanged {
    pub message: String,
    pub total_spaces: usize,
}

/// List parking spaces
pub async fn list_spaces(State(state): State<Arc<AppState>>) -> Json<SpacesResponse> {
    let positions = state.regions.snapshot();
    Json(SpacesResponse {
        total_spaces: positions.len(),
        positions,
    })
}

/// Append a parking space
pub async fn add_space(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewSpace>, JsonRejection>,
) -> Result<Json<SpaceChanged>, ApiError> {
    let (x, y) = match payload {
        Ok(Json(NewSpace {
            x: Some(x),
            y: Some(y),
        })) => (x, y),
        _ => return Err(ApiError::bad_request("Missing coordinates")),
    };

    let total_spaces = state.regions.add(Region::new(x, y))?;
    info!("Parking space added at ({}, {}), {} total", x, y, total_spaces);

    Ok(Json(SpaceChanged {
        message: "Parking space added".to_string(),
        total_spaces,
    }))
}

/// Remove the parking space at a list index
pub async fn remove_space(
    State(state): State<Arc<AppState>>,
    index: Result<Path<usize>, PathRejection>,
) -> Result<Json<SpaceChanged>, ApiError> {
    let Ok(Path(index)) = index else {
        return Err(ApiError::bad_request("Invalid index"));
    };

    let removed = state.regions.remove(index)?;
    info!("Parking space {} removed ({}, {})", index, removed.x, removed.y);

    Ok(Json(SpaceChanged {
        message: "Parking space removed".to_string(),
        total_spaces: state.regions.len(),
    }))
}
