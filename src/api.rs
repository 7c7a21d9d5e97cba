// src/api.rs
use crate::auth::session_from_header;
use crate::dashboard::{Dashboard, PurchaseOutcome};
use crate::db::DocumentStore;
use crate::error::CustomError;
use crate::models::{SavedStock, SessionContext};
use crate::purchase::PurchaseSheet;
use crate::screens::Router;
use crate::view::AssetsSection;
use futures::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

/// One mounted dashboard per signed-in identity.
#[derive(Clone)]
pub struct DashboardRegistry {
    dashboards: Arc<Mutex<HashMap<String, Arc<Dashboard>>>>,
    store: Arc<dyn DocumentStore>,
    router: Arc<dyn Router>,
    sheet: Arc<dyn PurchaseSheet>,
}

impl DashboardRegistry {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        router: Arc<dyn Router>,
        sheet: Arc<dyn PurchaseSheet>,
    ) -> Self {
        DashboardRegistry {
            dashboards: Arc::new(Mutex::new(HashMap::new())),
            store,
            router,
            sheet,
        }
    }

    /// Returns the user's dashboard, mounting it on first use. A changed
    /// profile in the session is pushed into the existing dashboard.
    ///
    /// The registry lock is only held for the map lookup; mounting happens
    /// outside it.
    pub async fn get_or_mount(&self, session: SessionContext) -> Arc<Dashboard> {
        let user_id = session.user_id.clone().unwrap_or_default();
        let mut dashboards = self.dashboards.lock().await;
        if let Some(dashboard) = dashboards.get(&user_id).cloned() {
            drop(dashboards);
            if dashboard.session().await != session {
                dashboard.set_session(session).await;
            }
            return dashboard;
        }

        let dashboard = Arc::new(Dashboard::new(
            session,
            self.store.clone(),
            self.router.clone(),
            self.sheet.clone(),
        ));
        dashboards.insert(user_id.clone(), dashboard.clone());
        drop(dashboards);
        self.mount(user_id, dashboard).await
    }

    async fn mount(&self, user_id: String, dashboard: Arc<Dashboard>) -> Arc<Dashboard> {
        dashboard.mount().await;
        // A removal that ran while mounting would leave this subscription orphaned.
        let registered = match self.dashboards.lock().await.get(&user_id) {
            Some(current) => Arc::ptr_eq(current, &dashboard),
            None => false,
        };
        if registered {
            info!("Mounted dashboard for {}", user_id);
        } else {
            warn!("Dashboard for {} was removed while mounting", user_id);
            dashboard.unmount().await;
        }
        dashboard
    }

    pub async fn remove(&self, user_id: &str) -> bool {
        let removed = self.dashboards.lock().await.remove(user_id);
        match removed {
            Some(dashboard) => {
                dashboard.unmount().await;
                info!("Unmounted dashboard for {}", user_id);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.dashboards.lock().await.len()
    }
}

#[derive(Deserialize)]
struct OpenRequest {
    symbol: String,
}

#[derive(Deserialize)]
struct SubmitRequest {
    symbol: String,
    amount: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum NavigationTarget {
    Notifications,
    MyAssets,
    Market,
}

#[derive(Deserialize)]
struct NavigateRequest {
    target: NavigationTarget,
}

pub fn routes(
    registry: DashboardRegistry,
    jwt_secret: Arc<String>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let dashboard = with_dashboard(registry.clone(), jwt_secret.clone());

    let render = warp::path("dashboard")
        .and(warp::path::end())
        .and(warp::get())
        .and(dashboard.clone())
        .and_then(render_handler);

    let focus = warp::path!("dashboard" / "focus")
        .and(warp::post())
        .and(dashboard.clone())
        .and_then(focus_handler);

    let refresh = warp::path!("dashboard" / "refresh")
        .and(warp::post())
        .and(dashboard.clone())
        .and_then(refresh_handler);

    let open = warp::path!("dashboard" / "purchase" / "open")
        .and(warp::post())
        .and(dashboard.clone())
        .and(warp::body::json())
        .and_then(open_purchase_handler);

    let close = warp::path!("dashboard" / "purchase" / "close")
        .and(warp::post())
        .and(dashboard.clone())
        .and_then(close_purchase_handler);

    let submit = warp::path!("dashboard" / "purchase" / "submit")
        .and(warp::post())
        .and(dashboard.clone())
        .and(warp::body::json())
        .and_then(submit_purchase_handler);

    let navigate = warp::path!("dashboard" / "navigate")
        .and(warp::post())
        .and(dashboard.clone())
        .and(warp::body::json())
        .and_then(navigate_handler);

    let unmount = warp::path("dashboard")
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_session(jwt_secret))
        .and(with_registry(registry))
        .and_then(unmount_handler);

    let assets = warp::path!("dashboard" / "assets")
        .and(warp::ws())
        .and(dashboard)
        .and_then(assets_handler);

    render
        .or(focus)
        .or(refresh)
        .or(open)
        .or(close)
        .or(submit)
        .or(navigate)
        .or(unmount)
        .or(assets)
        .recover(handle_rejection)
}

fn with_registry(
    registry: DashboardRegistry,
) -> impl Filter<Extract = (DashboardRegistry,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

fn with_session(
    jwt_secret: Arc<String>,
) -> impl Filter<Extract = (SessionContext,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let jwt_secret = jwt_secret.clone();
        async move {
            session_from_header(header.as_deref(), &jwt_secret).map_err(|e| {
                warn!("Rejected session: {}", e);
                warp::reject::custom(CustomError::unauthorized(e.to_string()))
            })
        }
    })
}

fn with_dashboard(
    registry: DashboardRegistry,
    jwt_secret: Arc<String>,
) -> impl Filter<Extract = (Arc<Dashboard>,), Error = Rejection> + Clone {
    with_session(jwt_secret)
        .and(with_registry(registry))
        .and_then(|session: SessionContext, registry: DashboardRegistry| async move {
            Ok::<_, Rejection>(registry.get_or_mount(session).await)
        })
}

async fn render_handler(dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&dashboard.render().await))
}

async fn focus_handler(dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    dashboard.focus().await;
    Ok(warp::reply::json(&dashboard.render().await))
}

async fn refresh_handler(dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    dashboard.refresh().await;
    Ok(warp::reply::json(&dashboard.render().await))
}

async fn open_purchase_handler(
    dashboard: Arc<Dashboard>,
    request: OpenRequest,
) -> Result<impl Reply, Rejection> {
    match dashboard.recommendation(&request.symbol).await {
        Some(stock) => {
            dashboard.open_purchase(stock).await;
            Ok(warp::reply::json(&dashboard.purchase_state().await))
        }
        None => Err(warp::reject::custom(CustomError::not_found(format!(
            "{} is not among the recommendations",
            request.symbol
        )))),
    }
}

async fn close_purchase_handler(dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    dashboard.close_purchase().await;
    Ok(warp::reply::json(&dashboard.purchase_state().await))
}

async fn submit_purchase_handler(
    dashboard: Arc<Dashboard>,
    request: SubmitRequest,
) -> Result<impl Reply, Rejection> {
    let stock = match dashboard.recommendation(&request.symbol).await {
        Some(stock) => stock,
        None => {
            return Err(warp::reject::custom(CustomError::not_found(format!(
                "{} is not among the recommendations",
                request.symbol
            ))))
        }
    };
    let outcome = dashboard.submit_purchase(request.amount, stock).await;
    let status = match &outcome {
        PurchaseOutcome::Completed { .. } => StatusCode::CREATED,
        PurchaseOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
        PurchaseOutcome::Rejected { .. } => StatusCode::CONFLICT,
    };
    Ok(warp::reply::with_status(warp::reply::json(&outcome), status))
}

async fn navigate_handler(
    dashboard: Arc<Dashboard>,
    request: NavigateRequest,
) -> Result<impl Reply, Rejection> {
    match request.target {
        NavigationTarget::Notifications => dashboard.open_notifications(),
        NavigationTarget::MyAssets => dashboard.open_my_assets(),
        NavigationTarget::Market => dashboard.open_market(),
    }
    Ok(StatusCode::ACCEPTED)
}

async fn unmount_handler(
    session: SessionContext,
    registry: DashboardRegistry,
) -> Result<impl Reply, Rejection> {
    let user_id = session.user_id.unwrap_or_default();
    if registry.remove(&user_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(warp::reject::custom(CustomError::not_found(
            "no dashboard mounted",
        )))
    }
}

async fn assets_handler(ws: Ws, dashboard: Arc<Dashboard>) -> Result<impl Reply, Rejection> {
    let user_id = dashboard.session().await.user_id.unwrap_or_default();
    match dashboard.watch_assets().await {
        Some(assets) => Ok(ws.on_upgrade(move |socket| stream_assets(socket, assets, user_id))),
        None => Err(warp::reject::custom(CustomError::not_found(
            "asset subscription unavailable",
        ))),
    }
}

// Mirrors the dashboard's asset projection. Ends when the dashboard releases
// its subscription.
async fn stream_assets(
    socket: WebSocket,
    mut assets: watch::Receiver<Vec<SavedStock>>,
    user_id: String,
) {
    let (mut tx, mut rx) = socket.split();
    info!("Asset stream opened for {}", user_id);

    let mut last_sent: Option<Vec<SavedStock>> = None;
    loop {
        let current = assets.borrow_and_update().clone();
        if last_sent.as_ref() != Some(&current) {
            match serde_json::to_string(&AssetsSection::from_assets(&current)) {
                Ok(text) => {
                    if tx.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode assets for {}: {}", user_id, e),
            }
            last_sent = Some(current);
        }

        tokio::select! {
            changed = assets.changed() => {
                if changed.is_err() {
                    info!("Dashboard for {} released its assets; closing stream", user_id);
                    let _ = tx.send(Message::close()).await;
                    break;
                }
            }
            incoming = rx.next() => match incoming {
                Some(Ok(message)) if message.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Asset stream socket error for {}: {}", user_id, e);
                    break;
                }
                None => break,
            },
        }
    }
    info!("Asset stream closed for {}", user_id);
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(custom) = err.find::<CustomError>() {
        (custom.status, custom.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use crate::models::{NewAsset, UserPreference, UserProfile, Username};
    use crate::purchase::LoggingSheet;
    use crate::screens::{ChannelRouter, Screens};
    use crate::subscription::AssetFeed;
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::Value;
    use tokio::sync::Notify;

    const SECRET: &str = "test-secret";

    fn profile(preference: Option<UserPreference>) -> UserProfile {
        UserProfile {
            username: Username {
                first_name: "Ana".into(),
                last_name: "Silva".into(),
            },
            photo_url: None,
            user_preference: preference,
        }
    }

    fn bearer(user_id: &str, preference: Option<UserPreference>) -> String {
        let token =
            create_token(user_id, &profile(preference), SECRET, Duration::hours(1)).unwrap();
        format!("Bearer {}", token)
    }

    // Subscriptions for "slow" wait until the gate opens.
    struct SlowStore {
        inner: MemoryStore,
        gate: Notify,
    }

    #[async_trait]
    impl DocumentStore for SlowStore {
        async fn count_notifications(&self, receiver_id: &str) -> Result<i64, StoreError> {
            self.inner.count_notifications(receiver_id).await
        }

        async fn subscribe_assets(&self, user_id: &str) -> Result<AssetFeed, StoreError> {
            if user_id == "slow" {
                self.gate.notified().await;
            }
            self.inner.subscribe_assets(user_id).await
        }

        async fn add_asset(&self, user_id: &str, asset: NewAsset) -> Result<String, StoreError> {
            self.inner.add_asset(user_id, asset).await
        }
    }

    fn setup() -> (
        MemoryStore,
        DashboardRegistry,
        tokio::sync::mpsc::UnboundedReceiver<crate::screens::Route>,
    ) {
        let store = MemoryStore::new();
        let (router, routes_rx) = ChannelRouter::new();
        let registry = DashboardRegistry::new(
            Arc::new(store.clone()),
            Arc::new(router),
            Arc::new(LoggingSheet),
        );
        (store, registry, routes_rx)
    }

    fn body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (_, registry, _rx) = setup();
        let api = routes(registry, Arc::new(SECRET.to_string()));
        let resp = warp::test::request()
            .method("GET")
            .path("/dashboard")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn render_mounts_once_per_identity() {
        let (store, registry, _rx) = setup();
        store.add_notification(vec!["u1".into()]);
        let api = routes(registry.clone(), Arc::new(SECRET.to_string()));
        let auth = bearer("u1", Some(UserPreference::Sports));

        let resp = warp::test::request()
            .method("POST")
            .path("/dashboard/focus")
            .header("authorization", &auth)
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let screen = body(resp.body());
        assert_eq!(screen["status"], "ready");
        assert_eq!(screen["screen"]["notificationBadge"], 1);
        assert_eq!(screen["screen"]["recommendations"][0]["change"], "(+1.50%)");
        assert_eq!(screen["screen"]["myAssets"]["kind"], "empty");

        warp::test::request()
            .method("GET")
            .path("/dashboard")
            .header("authorization", &auth)
            .reply(&api)
            .await;
        assert_eq!(registry.len().await, 1);
        assert_eq!(store.listener_count("u1"), 1);
    }

    #[tokio::test]
    async fn purchase_round_trip_over_http() {
        let (store, registry, _rx) = setup();
        let api = routes(registry, Arc::new(SECRET.to_string()));
        let auth = bearer("u1", Some(UserPreference::Sports));

        let resp = warp::test::request()
            .method("POST")
            .path("/dashboard/purchase/open")
            .header("authorization", &auth)
            .json(&json!({ "symbol": "NKE" }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(resp.body())["state"], "selecting");

        let resp = warp::test::request()
            .method("POST")
            .path("/dashboard/purchase/submit")
            .header("authorization", &auth)
            .json(&json!({ "symbol": "NKE", "amount": 10.0 }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body(resp.body())["outcome"], "completed");
        assert_eq!(store.assets("u1").len(), 1);
        assert_eq!(store.assets("u1")[0].amount, 10.0);
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let (_, registry, _rx) = setup();
        let api = routes(registry, Arc::new(SECRET.to_string()));
        let resp = warp::test::request()
            .method("POST")
            .path("/dashboard/purchase/open")
            .header("authorization", bearer("u1", None))
            .json(&json!({ "symbol": "NKE" }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn navigate_forwards_to_the_router() {
        let (_, registry, mut rx) = setup();
        let api = routes(registry, Arc::new(SECRET.to_string()));
        let resp = warp::test::request()
            .method("POST")
            .path("/dashboard/navigate")
            .header("authorization", bearer("u1", None))
            .json(&json!({ "target": "myAssets" }))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(rx.recv().await.map(|r| r.screen), Some(Screens::MyEquations));
    }

    #[tokio::test]
    async fn delete_unmounts_and_releases_the_listener() {
        let (store, registry, _rx) = setup();
        let api = routes(registry.clone(), Arc::new(SECRET.to_string()));
        let auth = bearer("u1", None);
        warp::test::request()
            .method("GET")
            .path("/dashboard")
            .header("authorization", &auth)
            .reply(&api)
            .await;

        let resp = warp::test::request()
            .method("DELETE")
            .path("/dashboard")
            .header("authorization", &auth)
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(registry.len().await, 0);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.listener_count("u1"), 0);
    }

    #[tokio::test]
    async fn asset_socket_streams_every_change() {
        let (store, registry, _rx) = setup();
        let api = routes(registry, Arc::new(SECRET.to_string()));
        let mut client = warp::test::ws()
            .path("/dashboard/assets")
            .header("authorization", bearer("u1", None))
            .handshake(api)
            .await
            .expect("handshake");

        let first = client.recv().await.unwrap();
        assert_eq!(body(first.as_bytes())["kind"], "empty");
        // The socket rides on the dashboard's own subscription.
        assert_eq!(store.listener_count("u1"), 1);

        let stock = crate::catalog::recommendations(None).remove(0);
        store
            .add_asset("u1", NewAsset { stock, amount: 2.0 })
            .await
            .unwrap();
        let second = client.recv().await.unwrap();
        let section = body(second.as_bytes());
        assert_eq!(section["kind"], "assets");
        assert_eq!(section["cards"][0]["amount"], 2.0);
    }

    #[tokio::test]
    async fn deleting_the_dashboard_closes_its_asset_socket() {
        let (store, registry, _rx) = setup();
        let api = routes(registry, Arc::new(SECRET.to_string()));
        let auth = bearer("u1", None);
        let mut client = warp::test::ws()
            .path("/dashboard/assets")
            .header("authorization", &auth)
            .handshake(api.clone())
            .await
            .expect("handshake");
        client.recv().await.unwrap();

        let resp = warp::test::request()
            .method("DELETE")
            .path("/dashboard")
            .header("authorization", &auth)
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let next = tokio::time::timeout(std::time::Duration::from_secs(1), client.recv())
            .await
            .expect("socket stayed open after unmount");
        if let Ok(message) = next {
            assert!(message.is_close());
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.listener_count("u1"), 0);
    }

    #[tokio::test]
    async fn slow_mount_does_not_block_other_identities() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            gate: Notify::new(),
        });
        let (router, _rx) = ChannelRouter::new();
        let registry = DashboardRegistry::new(store.clone(), Arc::new(router), Arc::new(LoggingSheet));

        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_or_mount(SessionContext::new("slow", profile(None)))
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            registry.get_or_mount(SessionContext::new("u2", profile(None))),
        )
        .await
        .expect("registry was locked by a pending mount");
        assert_eq!(registry.len().await, 2);

        // Removed while its subscription is still pending.
        let removal = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.remove("slow").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        store.gate.notify_one();

        let dashboard = slow.await.unwrap();
        assert!(removal.await.unwrap());
        assert!(!dashboard.has_subscription().await);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.inner.listener_count("slow"), 0);
        assert_eq!(store.inner.listener_count("u2"), 1);
        assert_eq!(registry.len().await, 1);
    }
}
