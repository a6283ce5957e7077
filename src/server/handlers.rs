//! HTTP handlers.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::AppError;
use crate::fulfillment::signature;
use crate::fulfillment::{Lookup, Resolution};
use crate::models::{
    CatalogStats, DailyOffer, NewOrder, Order, OrderStatus, OrderSummary, Product,
};
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResult};
use crate::utils::{content_type, file_extension, is_valid_email};

type SharedState = State<Arc<AppState>>;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub products: Vec<Product>,
    pub stats: CatalogStats,
    pub daily_offer: Option<DailyOffer>,
}

pub async fn list_products(State(state): SharedState) -> ApiResult<Json<CatalogResponse>> {
    let catalog = state.catalog.snapshot().await?;
    let daily_offer = state.daily_offer(&catalog, AppState::today());

    Ok(Json(CatalogResponse {
        products: catalog.products,
        stats: catalog.stats,
        daily_offer,
    }))
}

pub async fn product_detail(
    State(state): SharedState,
    Path(product_id): Path<String>,
) -> ApiResult<Response> {
    match state.catalog.detail(&product_id).await? {
        Some(detail) => Ok(Json(detail).into_response()),
        None => Err(AppError::not_found(format!("product {product_id}")).into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DailyOfferResponse {
    pub date: NaiveDate,
    pub offer: Option<DailyOffer>,
}

pub async fn daily_offer(
    State(state): SharedState,
    Query(query): Query<DailyQuery>,
) -> ApiResult<Json<DailyOfferResponse>> {
    let date = match query.date.as_deref().map(str::trim) {
        None | Some("") => AppState::today(),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::validation(format!("Invalid date {raw:?}, expected YYYY-MM-DD"))
        })?,
    };

    let catalog = state.catalog.snapshot().await?;
    Ok(Json(DailyOfferResponse {
        date,
        offer: state.daily_offer(&catalog, date),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ViewFileQuery {
    pub folder: String,
    pub file: String,
}

pub async fn view_file(
    State(state): SharedState,
    Query(query): Query<ViewFileQuery>,
) -> ApiResult<Response> {
    let Some(path) = state.catalog.file_path(&query.folder, &query.file).await? else {
        return Err(AppError::not_found(format!("file {}/{}", query.folder, query.file)).into());
    };

    let bytes = tokio::fs::read(&path).await.map_err(AppError::Io)?;
    let mime = content_type(&file_extension(&query.file));

    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_id: String,
    pub customer_email: String,
}

pub async fn create_order(
    State(state): SharedState,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let email = req.customer_email.trim();
    if !is_valid_email(email) {
        return Err(AppError::validation("Invalid email address").into());
    }

    let catalog = state.catalog.snapshot().await?;
    let Some(product) = catalog.find(req.product_id.trim()) else {
        return Err(AppError::not_found(format!("product {}", req.product_id)).into());
    };
    if !product.sellable {
        return Err(AppError::validation(format!("{} is not for sale", product.id)).into());
    }

    let offer = state.daily_offer(&catalog, AppState::today());
    let (price, is_daily) = match offer {
        Some(offer) if offer.product.id == product.id => (offer.offer_price, true),
        _ => (product.price, false),
    };

    let order = state
        .dispatcher
        .store()
        .create_order(NewOrder {
            product_id: product.id.clone(),
            product_name: product.display_name.clone(),
            customer_email: email.to_string(),
            price,
            is_daily,
        })
        .await?;

    log::info!(
        "Order {} created for {} ({} {})",
        order.order_id,
        order.product_id,
        order.price,
        if order.is_daily { "daily" } else { "regular" }
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// Payment trigger body, shared by confirmation and failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: u64,
    #[serde(default)]
    pub out_sum: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Check the trigger signature when a payment secret is configured.
async fn authenticate(state: &AppState, req: &PaymentRequest) -> ApiResult<()> {
    let Some(secret) = state.config.payment.secret.as_deref() else {
        return Ok(());
    };

    let (Some(out_sum), Some(sig)) = (req.out_sum.as_deref(), req.signature.as_deref()) else {
        return Err(AppError::validation("outSum and signature are required").into());
    };

    let order = state
        .dispatcher
        .store()
        .get_order(req.order_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("order {}", req.order_id)))?;

    if signature::parse_amount(out_sum) != Some(order.price) {
        log::warn!(
            "Payment trigger for order {} has amount {:?}, expected {}",
            req.order_id,
            out_sum,
            order.price
        );
        return Err(AppError::validation("outSum does not match the order").into());
    }
    if !signature::verify(out_sum, req.order_id, secret, sig) {
        log::warn!("Payment trigger for order {} has a bad signature", req.order_id);
        return Err(AppError::validation("Invalid signature").into());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub order_id: u64,
    pub status: OrderStatus,
    pub receiving_id: String,
    pub receiving_url: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub newly_minted: bool,
}

pub async fn confirm_payment(
    State(state): SharedState,
    Json(req): Json<PaymentRequest>,
) -> ApiResult<Json<ConfirmResponse>> {
    authenticate(&state, &req).await?;

    let confirmation = state.dispatcher.confirm_and_notify(req.order_id).await?;
    Ok(Json(ConfirmResponse {
        order_id: confirmation.order.order_id,
        status: confirmation.order.status,
        receiving_url: state
            .dispatcher
            .download_url(&confirmation.link.receiving_id),
        receiving_id: confirmation.link.receiving_id,
        expires_at: confirmation.link.expires_at,
        newly_minted: confirmation.newly_minted,
    }))
}

pub async fn fail_payment(
    State(state): SharedState,
    Json(req): Json<PaymentRequest>,
) -> ApiResult<Json<Order>> {
    authenticate(&state, &req).await?;
    Ok(Json(state.dispatcher.mark_failed(req.order_id).await?))
}

pub async fn order_by_receiving(
    State(state): SharedState,
    Path(receiving_id): Path<String>,
) -> ApiResult<Json<OrderSummary>> {
    match state.gateway.lookup(&receiving_id).await? {
        Lookup::Valid { order, link } => Ok(Json(OrderSummary::new(&order, &link))),
        Lookup::NotFound => Err(ApiError::order_not_found()),
        Lookup::Expired { .. } => Err(ApiError::link_expired()),
    }
}

/// Stream the artifact bound to a receiving link, with range support.
pub async fn secure_download(
    State(state): SharedState,
    Path(receiving_id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let (order, artifact) = match state.gateway.resolve(&receiving_id).await? {
        Resolution::Ready {
            order, artifact, ..
        } => (order, artifact),
        Resolution::NotFound => return Err(ApiError::order_not_found()),
        Resolution::Expired { .. } => return Err(ApiError::link_expired()),
    };

    let file_name = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .replace('"', "_");

    let Ok(response) = ServeFile::new(&artifact).oneshot(request).await;
    let mut response = response.map(Body::new);

    if response.status().is_success() {
        log::info!(
            "Order {} artifact download ({})",
            order.order_id,
            response.status()
        );
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type(&extension_of(&artifact))),
        );
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\"")) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok(response)
}

fn extension_of(path: &FsPath) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(file_extension)
        .unwrap_or_default()
}
