//! Listing endpoints, all routed through the orchestrator.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use listings::{Condition, Listing, ListingImage, ListingStatus, ListingUpdate, Page, SearchFilter};
use orchestrator::ListingDraft;
use serde::Deserialize;

use super::{auth_header, parse_listing_id};
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub condition: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

#[derive(Deserialize)]
pub struct CreateAdRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: i64,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub status: Option<String>,
    /// Base64 payloads, optionally `data:<mime>;base64,` prefixed.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Absent fields are left untouched.
#[derive(Deserialize)]
pub struct UpdateAdRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Deserialize)]
pub struct AttachMediaRequest {
    #[serde(default)]
    pub reference: String,
}

#[derive(Deserialize)]
pub struct DetachMediaParams {
    #[serde(default)]
    pub reference: String,
}

#[derive(Deserialize)]
pub struct ReplaceImagesRequest {
    #[serde(default)]
    pub images: Vec<String>,
}

fn parse_optional<T>(field: &str, value: Option<String>) -> Result<Option<T>, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse()
                .map_err(|e| ApiError::BadRequest(format!("{field}: {e}")))
        })
        .transpose()
}

// -- Handlers --

/// GET /api/ads: search listings. Drafts are only visible to their owner.
#[tracing::instrument(skip(state, headers, params))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<Page<Listing>>, ApiError> {
    let mut filter = SearchFilter::new().price_range(params.min_price, params.max_price);
    if let Some(text) = params.query {
        filter = filter.text(text);
    }
    if let Some(category) = params.category {
        filter = filter.category(category);
    }
    if let Some(condition) = parse_optional::<Condition>("condition", params.condition)? {
        filter = filter.condition(condition);
    }
    if let Some(limit) = params.limit {
        filter = filter.limit(limit);
    }
    if let Some(offset) = params.offset {
        filter = filter.offset(offset);
    }

    let page = state.ads.search(auth_header(&headers), filter).await?;
    Ok(Json(page))
}

/// POST /api/ads: create a listing with its images.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateAdRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    let Json(req) = payload?;

    let draft = ListingDraft {
        title: req.title,
        description: req.description,
        price: req.price,
        category: req.category,
        condition: parse_optional("condition", req.condition)?,
        status: parse_optional("status", req.status)?,
    };

    let listing = state
        .ads
        .create_with_images(auth_header(&headers), draft, &req.images)
        .await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /api/ads/{id}: load one listing.
#[tracing::instrument(skip(state, headers))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    let id = parse_listing_id(&id)?;
    let listing = state.ads.get(auth_header(&headers), id).await?;
    Ok(Json(listing))
}

/// PATCH or PUT /api/ads/{id}: update fields and optionally replace images.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateAdRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_listing_id(&id)?;
    let Json(req) = payload?;

    let update = ListingUpdate {
        title: req.title.into(),
        description: req.description.into(),
        price: req.price.into(),
        category: req.category.into(),
        condition: parse_optional::<Condition>("condition", req.condition)?.into(),
        status: parse_optional::<ListingStatus>("status", req.status)?.into(),
    };

    state
        .ads
        .update(auth_header(&headers), id, update, &req.images)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/ads/{id}
#[tracing::instrument(skip(state, headers))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_listing_id(&id)?;
    state.ads.delete(auth_header(&headers), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/ads/{id}/media: attach an already stored media reference.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn attach_media(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<AttachMediaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ListingImage>), ApiError> {
    let id = parse_listing_id(&id)?;
    let Json(req) = payload?;

    let image = state
        .ads
        .attach_media(auth_header(&headers), id, &req.reference)
        .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// DELETE /api/ads/{id}/media?reference=...
#[tracing::instrument(skip(state, headers, params))]
pub async fn detach_media(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<DetachMediaParams>,
) -> Result<StatusCode, ApiError> {
    let id = parse_listing_id(&id)?;
    state
        .ads
        .detach_media(auth_header(&headers), id, &params.reference)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/ads/{id}/images: upload payloads and replace the whole image set.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn replace_images(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ReplaceImagesRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_listing_id(&id)?;
    let Json(req) = payload?;

    state
        .ads
        .replace_images(auth_header(&headers), id, &req.images)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
