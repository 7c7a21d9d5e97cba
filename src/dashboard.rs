// src/dashboard.rs
use crate::catalog::recommendations;
use crate::db::DocumentStore;
use crate::greeting::dashboard_greeting;
use crate::models::{NewAsset, SavedStock, SessionContext, Stock};
use crate::purchase::{PurchaseFlow, PurchaseSheet, PurchaseState};
use crate::screens::{Route, Router, Screens};
use crate::subscription::{AssetFeed, SubscriptionHandle};
use crate::view::{AssetsSection, DashboardScreen, DashboardView, StockCard};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PurchaseOutcome {
    Completed { doc_id: String },
    Failed { reason: String },
    Rejected { reason: String },
}

struct Inner {
    session: SessionContext,
    mounted: bool,
    // Bumped whenever the active subscription is superseded or released.
    generation: u64,
    subscription: Option<SubscriptionHandle>,
    // Live projection for observers; dropped together with the subscription.
    assets_tx: Option<watch::Sender<Vec<SavedStock>>>,
    notification_count: i64,
    owned: Vec<SavedStock>,
    recommendations: Vec<Stock>,
    purchase: PurchaseFlow,
}

/// View-model behind the dashboard screen.
///
/// Identity and profile are injected through [`SessionContext`]. Until both
/// are present the dashboard renders [`DashboardView::Loading`] and performs
/// no store operation.
pub struct Dashboard {
    inner: Arc<Mutex<Inner>>,
    store: Arc<dyn DocumentStore>,
    router: Arc<dyn Router>,
    sheet: Arc<dyn PurchaseSheet>,
}

impl Dashboard {
    pub fn new(
        session: SessionContext,
        store: Arc<dyn DocumentStore>,
        router: Arc<dyn Router>,
        sheet: Arc<dyn PurchaseSheet>,
    ) -> Self {
        let recommendations = recommendations(session.preference());
        Dashboard {
            inner: Arc::new(Mutex::new(Inner {
                session,
                mounted: false,
                generation: 0,
                subscription: None,
                assets_tx: None,
                notification_count: 0,
                owned: Vec::new(),
                recommendations,
                purchase: PurchaseFlow::default(),
            })),
            store,
            router,
            sheet,
        }
    }

    pub async fn mount(&self) {
        let mut inner = self.inner.lock().await;
        inner.mounted = true;
        if inner.subscription.is_none() {
            self.subscribe(&mut inner).await;
        }
    }

    /// Releases the asset subscription. Later deliveries are ignored.
    pub async fn unmount(&self) {
        let mut inner = self.inner.lock().await;
        inner.mounted = false;
        Self::release(&mut inner);
    }

    pub async fn set_session(&self, session: SessionContext) {
        let mut inner = self.inner.lock().await;
        let identity_changed = inner.session.user_id != session.user_id
            || inner.session.ready().is_some() != session.ready().is_some();
        let preference_changed = inner.session.preference() != session.preference();
        inner.session = session;

        if preference_changed {
            inner.recommendations = recommendations(inner.session.preference());
            debug!(
                "Recommendations switched to {:?}",
                inner.session.preference()
            );
        }

        if identity_changed {
            Self::release(&mut inner);
            inner.owned.clear();
            inner.notification_count = 0;
            if inner.purchase.close() {
                self.sheet.dismiss();
            }
            if inner.mounted {
                self.subscribe(&mut inner).await;
            }
        }
    }

    // Holds the state lock across the subscribe call so supersession is atomic.
    async fn subscribe(&self, inner: &mut Inner) {
        let user_id = match inner.session.ready() {
            Some((user_id, _)) => user_id.to_string(),
            None => {
                debug!("Session not ready; asset subscription deferred");
                return;
            }
        };

        inner.generation += 1;
        let generation = inner.generation;
        match self.store.subscribe_assets(&user_id).await {
            Ok(feed) => {
                let (assets_tx, _) = watch::channel(inner.owned.clone());
                inner.assets_tx = Some(assets_tx);
                let task = tokio::spawn(forward_assets(self.inner.clone(), generation, feed));
                inner.subscription = Some(SubscriptionHandle::new(user_id.clone(), generation, task));
                info!("Subscribed to assets of {}", user_id);
            }
            Err(e) => {
                error!("Failed to subscribe to assets of {}: {}", user_id, e);
            }
        }
    }

    fn release(inner: &mut Inner) {
        inner.generation += 1;
        // Observers see the channel close.
        inner.assets_tx = None;
        if let Some(handle) = inner.subscription.take() {
            info!("Unsubscribed from assets of {}", handle.user_id());
            handle.cancel();
        }
    }

    // Screen became visible.
    pub async fn focus(&self) {
        self.refresh().await;
    }

    /// Pull-to-refresh. On failure the last known count stays on screen.
    pub async fn refresh(&self) {
        let user_id = {
            let inner = self.inner.lock().await;
            match inner.session.ready() {
                Some((user_id, _)) => user_id.to_string(),
                None => return,
            }
        };

        match self.store.count_notifications(&user_id).await {
            Ok(count) => {
                let mut inner = self.inner.lock().await;
                if inner.session.user_id.as_deref() == Some(user_id.as_str()) {
                    inner.notification_count = count;
                } else {
                    debug!("Dropping notification count for previous identity {}", user_id);
                }
            }
            Err(e) => {
                error!("Failed to count notifications for {}: {}", user_id, e);
            }
        }
    }

    // Ignored while the sheet is already open.
    pub async fn open_purchase(&self, stock: Stock) {
        let mut inner = self.inner.lock().await;
        if inner.session.ready().is_none() {
            return;
        }
        if inner.purchase.open(stock) {
            if let Some(selected) = inner.purchase.selected() {
                self.sheet.present(selected);
            }
        } else {
            debug!("Purchase sheet already open");
        }
    }

    pub async fn close_purchase(&self) {
        let mut inner = self.inner.lock().await;
        if inner.purchase.close() {
            self.sheet.dismiss();
        }
    }

    /// Buys `amount` of `stock` once. A result that arrives after the flow
    /// moved on (closed, reopened) is reported but leaves the flow alone.
    pub async fn submit_purchase(&self, amount: f64, stock: Stock) -> PurchaseOutcome {
        let (user_id, ticket, selected) = {
            let mut inner = self.inner.lock().await;
            let user_id = match inner.session.ready() {
                Some((user_id, _)) => user_id.to_string(),
                None => {
                    return PurchaseOutcome::Rejected {
                        reason: "session not ready".into(),
                    }
                }
            };
            if inner.purchase.selected().map(|s| &s.symbol) != Some(&stock.symbol) {
                warn!("Purchase of {} does not match the open sheet", stock.symbol);
                return PurchaseOutcome::Rejected {
                    reason: format!("{} is not selected", stock.symbol),
                };
            }
            match inner.purchase.begin_submit(amount) {
                Ok((ticket, selected)) => (user_id, ticket, selected),
                Err(e) => {
                    warn!("Purchase of {} rejected: {}", stock.symbol, e);
                    return PurchaseOutcome::Rejected {
                        reason: e.to_string(),
                    };
                }
            }
        };

        let result = self
            .store
            .add_asset(
                &user_id,
                NewAsset {
                    stock: selected.clone(),
                    amount,
                },
            )
            .await;

        let mut inner = self.inner.lock().await;
        match result {
            Ok(doc_id) => {
                info!("Bought {} x {} for {}", amount, selected.symbol, user_id);
                if inner.purchase.complete(ticket) {
                    self.sheet.dismiss();
                } else {
                    debug!("Purchase flow moved on before {} settled", selected.symbol);
                }
                PurchaseOutcome::Completed { doc_id }
            }
            Err(e) => {
                error!("Failed to buy {} for {}: {}", selected.symbol, user_id, e);
                if !inner.purchase.fail(ticket) {
                    debug!("Purchase flow moved on before {} settled", selected.symbol);
                }
                PurchaseOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn navigate(&self, route: Route) {
        debug!("Navigating to {:?}", route.screen);
        self.router.navigate(route);
    }

    pub fn open_notifications(&self) {
        self.navigate(Route::to(Screens::Notifications));
    }

    pub fn open_my_assets(&self) {
        self.navigate(Route::to(Screens::MyEquations));
    }

    pub fn open_market(&self) {
        self.navigate(Route::to(Screens::NewEquation));
    }

    pub async fn render(&self) -> DashboardView {
        let inner = self.inner.lock().await;
        let profile = match inner.session.ready() {
            Some((_, profile)) => profile,
            None => return DashboardView::Loading,
        };
        DashboardView::Ready(DashboardScreen {
            greeting: dashboard_greeting().to_string(),
            display_name: profile.display_name(),
            photo_url: profile.photo_url.clone(),
            notification_badge: inner.notification_count,
            recommendations: inner
                .recommendations
                .iter()
                .map(StockCard::from_stock)
                .collect(),
            my_assets: AssetsSection::from_assets(&inner.owned),
            purchase: inner.purchase.state().clone(),
        })
    }

    pub async fn session(&self) -> SessionContext {
        self.inner.lock().await.session.clone()
    }

    pub async fn notification_count(&self) -> i64 {
        self.inner.lock().await.notification_count
    }

    pub async fn owned_assets(&self) -> Vec<SavedStock> {
        self.inner.lock().await.owned.clone()
    }

    pub async fn recommendations(&self) -> Vec<Stock> {
        self.inner.lock().await.recommendations.clone()
    }

    pub async fn recommendation(&self, symbol: &str) -> Option<Stock> {
        self.inner
            .lock()
            .await
            .recommendations
            .iter()
            .find(|stock| stock.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
    }

    pub async fn purchase_state(&self) -> PurchaseState {
        self.inner.lock().await.purchase.state().clone()
    }

    /// Live owned-asset projection of the active subscription. The channel
    /// closes when the subscription is released or superseded.
    pub async fn watch_assets(&self) -> Option<watch::Receiver<Vec<SavedStock>>> {
        self.inner
            .lock()
            .await
            .assets_tx
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    pub async fn has_subscription(&self) -> bool {
        self.inner.lock().await.subscription.is_some()
    }
}

async fn forward_assets(inner: Arc<Mutex<Inner>>, generation: u64, mut feed: AssetFeed) {
    while let Some(snapshot) = feed.next().await {
        let mut inner = inner.lock().await;
        if inner.generation != generation {
            debug!("Ignoring delivery from superseded subscription {}", generation);
            break;
        }
        match snapshot {
            Ok(assets) => {
                debug!("Asset projection replaced with {} entries", assets.len());
                if let Some(tx) = &inner.assets_tx {
                    tx.send_replace(assets.clone());
                }
                inner.owned = assets;
            }
            Err(e) => {
                error!("Asset subscription delivery failed: {}", e);
            }
        }
    }
}
