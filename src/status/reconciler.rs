use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::db::Store;
use crate::models::*;
use crate::notify::{Alert, NotificationReport, Notifier};
use crate::routeros::{InterfaceStatus, IpAddressEntry, RouterApi, UnreachableRouter};

/// Result of ingesting one pushed status report
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Status changed (or was never seen): a new observation was appended and alerts dispatched
    Recorded {
        observation: InterfaceObservation,
        notification: NotificationReport,
    },
    /// Same status as the latest stored observation; nothing written, nobody alerted
    Unchanged { latest: InterfaceObservation },
}

/// Reconciles live router data and pushed reports against the status history
pub struct Reconciler {
    store: Store,
    router: Arc<dyn RouterApi>,
    notifier: Arc<Notifier>,
    key_locks: DashMap<(String, String), Arc<Mutex<()>>>,
    router_timeout: Duration,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(
        store: Store,
        router: Arc<dyn RouterApi>,
        notifier: Arc<Notifier>,
        router_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            router,
            notifier,
            key_locks: DashMap::new(),
            router_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Record a pushed report if it is a transition, then alert.
    ///
    /// Compare, append and alert all run under a per-(identity, label) lock, so
    /// concurrent identical reports cannot both see a transition and alerts for one
    /// interface leave in the order their observations were stored. A failed alert
    /// never undoes the write.
    pub async fn ingest(&self, report: &WanReport) -> Result<IngestOutcome> {
        let lock = self.key_lock(&report.identity, &report.label);
        let _guard = lock.lock().await;

        let previous = self.store.latest_observation(&report.identity, &report.label).await?;
        if let Some(latest) = previous.as_ref().filter(|latest| latest.status == report.status) {
            tracing::debug!(
                "{} {} still {}; ignoring repeated report",
                report.identity,
                report.label,
                report.status
            );
            return Ok(IngestOutcome::Unchanged { latest: latest.clone() });
        }

        let observation = self
            .store
            .append_observation(&NewObservation {
                identity: report.identity.clone(),
                label: report.label.clone(),
                status: report.status,
                since: report.since,
                recorded_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            "{} {} transitioned {} -> {}",
            report.identity,
            report.label,
            previous.map(|p| p.status.as_str()).unwrap_or("unknown"),
            report.status
        );

        let notification = self.notifier.notify(&Alert::from(report)).await;

        Ok(IngestOutcome::Recorded {
            observation,
            notification,
        })
    }

    fn key_lock(&self, identity: &str, label: &str) -> Arc<Mutex<()>> {
        self.key_locks
            .entry((identity.to_string(), label.to_string()))
            .or_default()
            .clone()
    }

    /// Fetch the Active Session Set, bounded by the router timeout
    pub async fn fetch_sessions(&self, endpoint: &RouterEndpoint) -> Result<HashSet<String>, UnreachableRouter> {
        self.bounded(endpoint, self.router.fetch_active_sessions(endpoint)).await
    }

    async fn fetch_interfaces(&self, endpoint: &RouterEndpoint) -> Result<Vec<InterfaceStatus>, UnreachableRouter> {
        self.bounded(endpoint, self.router.fetch_interface_status(endpoint)).await
    }

    async fn fetch_addresses(&self, endpoint: &RouterEndpoint) -> Result<Vec<IpAddressEntry>, UnreachableRouter> {
        self.bounded(endpoint, self.router.fetch_ip_addresses(endpoint)).await
    }

    async fn bounded<T>(
        &self,
        endpoint: &RouterEndpoint,
        call: impl Future<Output = Result<T, UnreachableRouter>>,
    ) -> Result<T, UnreachableRouter> {
        match tokio::time::timeout(self.router_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(UnreachableRouter::new(
                endpoint,
                format!("timed out after {}ms", self.router_timeout.as_millis()),
            )),
        }
    }

    /// Session-based check: classify devices from one Active Session Set and the
    /// stored history. Latest-per-interface is loaded once for the devices given.
    pub async fn classify_global(&self, devices: &[Device], sessions: &HashSet<String>) -> Result<Vec<DeviceHealth>> {
        if devices.is_empty() {
            return Ok(Vec::new());
        }
        let identities: Vec<String> = devices.iter().map(|d| d.device_id.clone()).collect();
        let latest = self.store.latest_per_interface_for(&identities).await?;
        Ok(devices
            .iter()
            .map(|d| classify_from_history(d, sessions, latest.get(&d.device_id)))
            .collect())
    }

    /// Live interface check: classify one device from its own router's interface
    /// table. Running uplinks also get their address; a failed address lookup
    /// leaves them without one and does not change the classification.
    pub async fn classify_live(&self, device: &Device) -> DeviceHealth {
        let interfaces = match self.fetch_interfaces(&device.endpoint).await {
            Ok(interfaces) => interfaces,
            Err(e) => {
                tracing::warn!("Live check for {} failed: {}", device.device_id, e);
                return offline(device, e.to_string());
            }
        };

        let addresses = if running_labels(device, &interfaces).next().is_some() {
            self.fetch_addresses(&device.endpoint).await.unwrap_or_else(|e| {
                tracing::warn!("Address lookup for {} failed: {}", device.device_id, e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        classify_from_interfaces(device, &interfaces, &addresses)
    }

    /// Live check of one device plus the name its router reports for itself
    pub async fn inspect(&self, device: &Device) -> DeviceHealth {
        let mut health = self.classify_live(device).await;
        if health.health == Health::Offline {
            return health;
        }
        health.router_identity = match self.bounded(&device.endpoint, self.router.fetch_identity(&device.endpoint)).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Identity lookup for {} failed: {}", device.device_id, e);
                None
            }
        };
        health
    }

    /// Live interface check over many devices with bounded concurrency. One dead
    /// router only costs its own timeout; results keep the input order.
    pub async fn live_sweep(&self, devices: &[Device]) -> Vec<DeviceHealth> {
        stream::iter(devices.iter().cloned())
            .map(move |device| async move { self.classify_live(&device).await })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

/// Session-based classification for a single device
pub fn classify_from_history(
    device: &Device,
    sessions: &HashSet<String>,
    latest: Option<&LatestByLabel>,
) -> DeviceHealth {
    if !sessions.contains(&device.device_id) {
        return offline(device, "no active session".to_string());
    }

    let wan: BTreeMap<String, WanStatus> = device
        .wan_labels()
        .iter()
        .filter_map(|label| {
            latest
                .and_then(|l| l.get(*label))
                .map(|obs| (label.to_string(), obs.status))
        })
        .collect();

    classified(device, wan)
}

/// Interface carrying a declared WAN label, matched on its comment
fn labelled<'a>(interfaces: &'a [InterfaceStatus], label: &str) -> Option<&'a InterfaceStatus> {
    interfaces
        .iter()
        .find(|iface| iface.comment.as_deref().map(str::trim) == Some(label))
}

/// Declared labels whose interface is present and running, with that interface
fn running_labels<'a>(
    device: &Device,
    interfaces: &'a [InterfaceStatus],
) -> impl Iterator<Item = (&'static str, &'a InterfaceStatus)> {
    device
        .wan_labels()
        .iter()
        .copied()
        .filter_map(move |label| labelled(interfaces, label).filter(|iface| iface.running).map(|iface| (label, iface)))
}

/// Live interface classification: every declared WAN must be present and running.
/// `addresses` fills in the first address bound to each running uplink.
pub fn classify_from_interfaces(
    device: &Device,
    interfaces: &[InterfaceStatus],
    addresses: &[IpAddressEntry],
) -> DeviceHealth {
    let wan: BTreeMap<String, WanStatus> = device
        .wan_labels()
        .iter()
        .map(|label| {
            let running = labelled(interfaces, label).map(|iface| iface.running).unwrap_or(false);
            let status = if running { WanStatus::Up } else { WanStatus::Down };
            (label.to_string(), status)
        })
        .collect();

    let mut health = classified(device, wan);
    health.addresses = running_labels(device, interfaces)
        .filter_map(|(label, iface)| {
            addresses
                .iter()
                .find(|entry| entry.interface == iface.name)
                .map(|entry| (label.to_string(), entry.address.clone()))
        })
        .collect();
    health
}

fn classified(device: &Device, wan: BTreeMap<String, WanStatus>) -> DeviceHealth {
    let health = if wan.values().any(|s| *s == WanStatus::Down) {
        Health::Partial
    } else {
        Health::Online
    };
    DeviceHealth {
        device_id: device.device_id.clone(),
        device_name: device.device_name.clone(),
        health,
        wan,
        addresses: BTreeMap::new(),
        router_identity: None,
        reason: None,
    }
}

fn offline(device: &Device, reason: String) -> DeviceHealth {
    DeviceHealth {
        device_id: device.device_id.clone(),
        device_name: device.device_name.clone(),
        health: Health::Offline,
        wan: BTreeMap::new(),
        addresses: BTreeMap::new(),
        router_identity: None,
        reason: Some(reason),
    }
}
