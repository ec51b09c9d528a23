//! Shared fixtures for unit tests: seeded devices, a scripted router and
//! channels that record what they were asked to send.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::Store;
use crate::models::{Device, RouterEndpoint};
use crate::notify::{Alert, AlertChannel, ChannelError, Notifier};
use crate::routeros::{InterfaceStatus, IpAddressEntry, RouterApi, UnreachableRouter};
use crate::status::{AggregateCounter, Reconciler, SweepSnapshot};
use crate::AppState;

pub const TEST_ROUTER_TIMEOUT: Duration = Duration::from_millis(200);

// ========== Devices ==========

#[derive(Debug, Clone)]
pub struct DeviceSeed {
    pub device_id: String,
    pub device_name: String,
    pub site_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub manager_id: Option<i64>,
    pub host: String,
    pub port: u16,
    pub port_count: i64,
    pub email_ids: Vec<String>,
    pub telegram_ids: Vec<String>,
}

impl DeviceSeed {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            device_name: device_id.to_string(),
            site_id: None,
            admin_id: None,
            manager_id: None,
            host: format!("{}.routers.test", device_id.to_lowercase()),
            port: 80,
            port_count: 4,
            email_ids: Vec::new(),
            telegram_ids: Vec::new(),
        }
    }

    /// The device as the directory would return it, without touching a database
    pub fn build(self) -> Device {
        Device {
            id: 0,
            device_id: self.device_id,
            device_name: self.device_name,
            device_type: "router".into(),
            site_id: self.site_id,
            admin_id: self.admin_id,
            manager_id: self.manager_id,
            endpoint: RouterEndpoint::new(self.host, self.port, "admin", "secret"),
            port_count: self.port_count,
            email_ids: self.email_ids,
            telegram_ids: self.telegram_ids,
        }
    }
}

pub async fn insert_site(store: &Store, site_id: i64) {
    sqlx::query("INSERT OR IGNORE INTO sites (id, site_name) VALUES (?, ?)")
        .bind(site_id)
        .bind(format!("Site {}", site_id))
        .execute(store.pool())
        .await
        .unwrap();
}

/// Insert a device, creating its site first when one is set
pub async fn insert_device(store: &Store, seed: DeviceSeed) {
    if let Some(site_id) = seed.site_id {
        insert_site(store, site_id).await;
    }
    sqlx::query(
        r#"INSERT INTO devices (device_id, device_name, device_type, site_id, admin_id, manager_id,
                                device_ip, device_port, device_username, device_password, port_count,
                                email_ids, telegram_ids)
           VALUES (?, ?, 'router', ?, ?, ?, ?, ?, 'admin', 'secret', ?, ?, ?)"#,
    )
    .bind(&seed.device_id)
    .bind(&seed.device_name)
    .bind(seed.site_id)
    .bind(seed.admin_id)
    .bind(seed.manager_id)
    .bind(&seed.host)
    .bind(seed.port as i64)
    .bind(seed.port_count)
    .bind(serde_json::to_string(&seed.email_ids).unwrap())
    .bind(serde_json::to_string(&seed.telegram_ids).unwrap())
    .execute(store.pool())
    .await
    .unwrap();
}

/// Insert a device with recipient columns exactly as given
pub async fn insert_device_raw(store: &Store, device_id: &str, email_raw: &str, telegram_raw: &str) {
    sqlx::query("INSERT INTO devices (device_id, device_name, email_ids, telegram_ids) VALUES (?, ?, ?, ?)")
        .bind(device_id)
        .bind(device_id)
        .bind(email_raw)
        .bind(telegram_raw)
        .execute(store.pool())
        .await
        .unwrap();
}

// ========== Router ==========

pub fn wan_iface(name: &str, comment: &str, running: bool) -> InterfaceStatus {
    InterfaceStatus {
        name: name.to_string(),
        comment: Some(comment.to_string()),
        running,
    }
}

pub fn default_session_router() -> RouterEndpoint {
    RouterEndpoint::new("sessions.routers.test", 80, "admin", "secret")
}

/// How a device's router answers a live interface query
#[derive(Debug, Clone)]
pub enum FakeLink {
    Interfaces(Vec<InterfaceStatus>),
    Unreachable,
    /// Never answers within any sane timeout
    Hang,
}

/// Scripted `RouterApi`: one session set for every session query, per-host interface answers
#[derive(Default)]
pub struct FakeRouter {
    sessions: Mutex<Option<HashSet<String>>>,
    links: Mutex<HashMap<String, FakeLink>>,
    addresses: Mutex<HashMap<String, Vec<IpAddressEntry>>>,
    identities: Mutex<HashMap<String, String>>,
    pub session_calls: AtomicUsize,
    pub interface_calls: AtomicUsize,
}

impl FakeRouter {
    pub fn with_sessions(ids: &[&str]) -> Arc<Self> {
        let router = Self::default();
        *router.sessions.lock().unwrap() = Some(ids.iter().map(|s| s.to_string()).collect());
        Arc::new(router)
    }

    /// Session queries fail as if the router were down
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_link(&self, host: &str, link: FakeLink) {
        self.links.lock().unwrap().insert(host.to_string(), link);
    }

    pub fn set_addresses(&self, host: &str, addresses: &[(&str, &str)]) {
        let rows = addresses
            .iter()
            .map(|(address, interface)| IpAddressEntry {
                address: address.to_string(),
                interface: interface.to_string(),
            })
            .collect();
        self.addresses.lock().unwrap().insert(host.to_string(), rows);
    }

    pub fn set_identity(&self, host: &str, name: &str) {
        self.identities.lock().unwrap().insert(host.to_string(), name.to_string());
    }

    fn link_up(&self, endpoint: &RouterEndpoint) -> Result<(), UnreachableRouter> {
        match self.links.lock().unwrap().get(&endpoint.host) {
            Some(FakeLink::Interfaces(_)) => Ok(()),
            _ => Err(UnreachableRouter::new(endpoint, "connection refused")),
        }
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouterApi for FakeRouter {
    async fn fetch_active_sessions(&self, endpoint: &RouterEndpoint) -> Result<HashSet<String>, UnreachableRouter> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let sessions = self.sessions.lock().unwrap().clone();
        sessions.ok_or_else(|| UnreachableRouter::new(endpoint, "connection refused"))
    }

    async fn fetch_interface_status(&self, endpoint: &RouterEndpoint) -> Result<Vec<InterfaceStatus>, UnreachableRouter> {
        self.interface_calls.fetch_add(1, Ordering::SeqCst);
        let link = self.links.lock().unwrap().get(&endpoint.host).cloned();
        match link {
            Some(FakeLink::Interfaces(interfaces)) => Ok(interfaces),
            Some(FakeLink::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            Some(FakeLink::Unreachable) | None => Err(UnreachableRouter::new(endpoint, "connection refused")),
        }
    }

    async fn fetch_ip_addresses(&self, endpoint: &RouterEndpoint) -> Result<Vec<IpAddressEntry>, UnreachableRouter> {
        self.link_up(endpoint)?;
        Ok(self.addresses.lock().unwrap().get(&endpoint.host).cloned().unwrap_or_default())
    }

    async fn fetch_identity(&self, endpoint: &RouterEndpoint) -> Result<Option<String>, UnreachableRouter> {
        self.link_up(endpoint)?;
        Ok(self.identities.lock().unwrap().get(&endpoint.host).cloned())
    }
}

// ========== Channels ==========

/// Alert channel that remembers every send; optionally fails or stalls
pub struct RecordingChannel {
    name: &'static str,
    fail: bool,
    /// Messages containing the text are held back for the duration before being recorded
    delay: Option<(&'static str, Duration)>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingChannel {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self { name, fail: false, delay: None, calls: Mutex::new(Vec::new()) })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self { name, fail: true, delay: None, calls: Mutex::new(Vec::new()) })
    }

    pub fn delaying(name: &'static str, needle: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self { name, fail: false, delay: Some((needle, delay)), calls: Mutex::new(Vec::new()) })
    }

    /// (message, recipients) per send, in order
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, alert: &Alert, recipients: &[String]) -> Result<(), ChannelError> {
        let message = alert.message();
        if let Some((needle, delay)) = self.delay {
            if message.contains(needle) {
                tokio::time::sleep(delay).await;
            }
        }
        self.calls.lock().unwrap().push((message, recipients.to_vec()));
        if self.fail {
            return Err(ChannelError::Rejected {
                channel: self.name,
                status: 503,
                body: "mocked failure".into(),
            });
        }
        Ok(())
    }
}

// ========== Wiring ==========

/// In-memory store plus a reconciler wired to recording channels
pub struct Harness {
    pub store: Store,
    pub router: Arc<FakeRouter>,
    pub email: Arc<RecordingChannel>,
    pub chat: Arc<RecordingChannel>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub async fn new(router: Arc<FakeRouter>) -> Self {
        Self::with_channels(router, RecordingChannel::new("email"), RecordingChannel::new("telegram")).await
    }

    pub async fn with_channels(router: Arc<FakeRouter>, email: Arc<RecordingChannel>, chat: Arc<RecordingChannel>) -> Self {
        let store = Store::in_memory().await.unwrap();
        let notifier = Notifier::new(store.clone(), Some(email.clone()), Some(chat.clone()), Vec::new());
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            router.clone(),
            Arc::new(notifier),
            TEST_ROUTER_TIMEOUT,
            16,
        ));

        Self {
            store,
            router,
            email,
            chat,
            reconciler,
        }
    }

    pub fn counter(&self, session_router: Option<RouterEndpoint>) -> Arc<AggregateCounter> {
        Arc::new(AggregateCounter::new(self.store.clone(), self.reconciler.clone(), session_router))
    }

    /// Application state as the HTTP layer sees it
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            store: self.store.clone(),
            reconciler: self.reconciler.clone(),
            counter: self.counter(Some(default_session_router())),
            snapshot: SweepSnapshot::default(),
        })
    }
}
