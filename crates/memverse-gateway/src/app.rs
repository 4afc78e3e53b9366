use axum::{
    routing::{get, post, put},
    Router,
};
use memverse_core::config::MemverseConfig;
use memverse_core::{Clock, Notifier, SubscriberStore, VerseSource};
use memverse_scheduler::{
    notification_channel, DashboardResolver, DeliveryOrchestrator, NotificationDispatcher,
    NotifyStats, SweepConfig, SweepEngine, SweepState,
};
use memverse_store::SqliteStore;
use std::sync::Arc;
use tokio::sync::watch;

use crate::http;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: MemverseConfig,
    pub store: SqliteStore,
    pub resolver: DashboardResolver,
    pub sweep_state: watch::Receiver<SweepState>,
    /// Counters only; holding the queue here would keep the dispatcher alive
    /// past shutdown.
    pub notify_stats: Arc<NotifyStats>,
}

/// Everything the binary runs: HTTP state plus the background workers.
pub struct Services {
    pub state: Arc<AppState>,
    pub sweep: Arc<SweepEngine>,
    pub dispatcher: NotificationDispatcher,
}

impl Services {
    /// Wire the engine from config. No background task is started here.
    pub fn build(
        config: MemverseConfig,
        store: SqliteStore,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let subscribers: Arc<dyn SubscriberStore> = Arc::new(store.clone());
        let verses: Arc<dyn VerseSource> = Arc::new(store.clone());

        let (queue, dispatcher) =
            notification_channel(config.delivery.notification_queue, notifier);
        let notify_stats = queue.stats_handle();

        let orchestrator = Arc::new(DeliveryOrchestrator::new(
            Arc::clone(&subscribers),
            Arc::clone(&verses),
            clock,
            queue,
            config.io_timeout(),
        ));
        let resolver = DashboardResolver::new(
            Arc::clone(&subscribers),
            verses,
            Arc::clone(&orchestrator),
        );
        let sweep = Arc::new(SweepEngine::new(
            subscribers,
            orchestrator,
            SweepConfig {
                interval: config.sweep_interval(),
                max_concurrent: config.delivery.max_concurrent_deliveries,
            },
        ));

        let state = Arc::new(AppState {
            config,
            store,
            resolver,
            sweep_state: sweep.watch_state(),
            notify_stats,
        });

        Self {
            state,
            sweep,
            dispatcher,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        .route("/users", post(http::users::create_user))
        .route(
            "/users/{id}/profile",
            put(http::users::update_profile).patch(http::users::change_pace),
        )
        .route("/users/{id}/dashboard", get(http::dashboard::dashboard_handler))
        .route(
            "/users/{id}/subscription/toggle",
            post(http::users::toggle_subscription),
        )
        .route("/users/{id}/notes", post(http::users::save_note))
        .route(
            "/users/{id}/favourites",
            get(http::users::list_favourites).post(http::users::toggle_favourite),
        )
        .route("/verses/daily", get(http::verses::daily_verse))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
