//! Country handlers: refresh, list, read, delete, status, summary image.

use crate::error::AppError;
use crate::response::{success_many, success_one_ok};
use crate::sql::CountryFilter;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::collections::HashMap;

pub async fn refresh(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = state.refresher.clone().refresh_detached().await?;
    Ok(success_one_ok(report))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let filter = CountryFilter::from_query(&params)?;
    let rows = state.countries.list(&filter).await?;
    Ok(success_many(rows))
}

pub async fn read(State(state): State<AppState>, Path(name): Path<String>) -> Result<impl IntoResponse, AppError> {
    let row = state.countries.get(&name).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(State(state): State<AppState>, Path(name): Path<String>) -> Result<impl IntoResponse, AppError> {
    state.countries.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = state.countries.status().await?;
    Ok(success_one_ok(report))
}

pub async fn summary_image(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let bytes = state.countries.summary_image().await?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], bytes))
}
