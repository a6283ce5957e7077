//! HTTP surface.
//!
//! [`AppState`] wires the catalog, the order store and the fulfillment
//! pipeline together; [`router`] exposes them under `/api`.

pub mod handlers;
pub mod response;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use chrono::{Local, NaiveDate};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog::{CatalogSource, DailyOfferSelector, FolderCatalog, daily};
use crate::error::{AppError, Result};
use crate::fulfillment::{Dispatcher, DownloadGateway};
use crate::models::{Catalog, Config, DailyOffer};
use crate::notify::FailoverNotifier;
use crate::storage::{LocalStorage, OrderStore};

/// Shared state behind every handler.
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn CatalogSource>,
    pub daily: DailyOfferSelector,
    pub dispatcher: Arc<Dispatcher>,
    pub gateway: DownloadGateway,
}

impl AppState {
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn OrderStore>,
        notifier: Arc<FailoverNotifier>,
    ) -> Arc<Self> {
        let dispatcher = Arc::new(Dispatcher::new(&config, store.clone(), notifier));
        Arc::new(Self {
            daily: DailyOfferSelector::new(config.catalog.pin_daily_offer),
            gateway: DownloadGateway::new(store, catalog.clone()),
            catalog,
            dispatcher,
            config,
        })
    }

    /// Build the production state: folder catalog, file-backed orders and
    /// the configured mail providers.
    pub async fn open(config: Config, storage_dir: &Path) -> Result<Arc<Self>> {
        let catalog = Arc::new(FolderCatalog::new(&config.catalog, &config.pricing)?);
        let store = Arc::new(LocalStorage::open(storage_dir).await?);
        let notifier = Arc::new(FailoverNotifier::from_config(&config)?);

        let available = notifier.available();
        if available.is_empty() {
            log::warn!("No mail provider is configured; buyers will not be notified");
        } else {
            log::info!("Mail providers in order: {}", available.join(" -> "));
        }

        Ok(Self::new(config, catalog, store, notifier))
    }

    /// Current local calendar date.
    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Daily offer for `date`. Only today's selection is pinned.
    pub fn daily_offer(&self, catalog: &Catalog, date: NaiveDate) -> Option<DailyOffer> {
        let sellable = catalog.sellable();
        let product = if date == Self::today() {
            self.daily.select(date, &sellable)
        } else {
            daily::select(date, &sellable).copied()
        }?;

        Some(daily::daily_offer(
            date,
            product,
            self.config.pricing.daily_discount_percent,
        ))
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/products", get(handlers::list_products))
        .route("/api/products/{id}", get(handlers::product_detail))
        .route("/api/daily-offer", get(handlers::daily_offer))
        .route("/api/view-file", get(handlers::view_file))
        .route("/api/orders", post(handlers::create_order))
        .route("/api/payments/confirm", post(handlers::confirm_payment))
        .route("/api/payments/fail", post(handlers::fail_payment))
        .route(
            "/api/order/receiving/{id}",
            get(handlers::order_by_receiving),
        )
        .route(
            "/api/secure-download/{id}",
            get(handlers::secure_download),
        )
        .layer(cors)
        .with_state(state)
}

/// Run [`Dispatcher::sweep`] every `interval_secs`. Zero disables it.
pub fn spawn_sweeper(dispatcher: Arc<Dispatcher>, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        log::info!("Fulfillment sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick completes immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = dispatcher.sweep().await {
                log::error!("Fulfillment sweep failed: {}", e);
            }
        }
    }))
}

/// Serve until Ctrl-C.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let address = format!(
        "{}:{}",
        state.config.server.bind_address, state.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(AppError::Io)?;

    let sweeper = spawn_sweeper(
        state.dispatcher.clone(),
        state.config.fulfillment.sweep_interval_secs,
    );

    log::info!("Storefront listening on http://{}", address);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Io)?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}
