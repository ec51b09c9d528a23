use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::Store;
use crate::models::*;

use super::Reconciler;

/// Fleet-level online/offline/partial counts over a device scope
pub struct AggregateCounter {
    store: Store,
    reconciler: Arc<Reconciler>,
    session_router: Option<RouterEndpoint>,
}

impl AggregateCounter {
    pub fn new(store: Store, reconciler: Arc<Reconciler>, session_router: Option<RouterEndpoint>) -> Self {
        Self {
            store,
            reconciler,
            session_router,
        }
    }

    /// Session-based sweep against the configured session router
    pub async fn sweep(&self, scope: DeviceScope) -> Result<SweepReport> {
        self.sweep_against(scope, self.session_router.as_ref()).await
    }

    /// Session-based sweep against an explicitly supplied session router
    pub async fn sweep_with_router(&self, scope: DeviceScope, endpoint: &RouterEndpoint) -> Result<SweepReport> {
        self.sweep_against(scope, Some(endpoint)).await
    }

    pub async fn count(&self, scope: DeviceScope) -> Result<StatusCounts> {
        Ok(self.sweep(scope).await?.counts)
    }

    pub async fn count_with_router(&self, scope: DeviceScope, endpoint: &RouterEndpoint) -> Result<StatusCounts> {
        Ok(self.sweep_with_router(scope, endpoint).await?.counts)
    }

    /// Live interface sweep: ask every device's own router
    pub async fn live_sweep(&self, scope: DeviceScope) -> Result<SweepReport> {
        let devices = self.store.list_devices(scope).await?;
        let health = self.reconciler.live_sweep(&devices).await;
        Ok(report(health))
    }

    pub async fn count_live(&self, scope: DeviceScope) -> Result<StatusCounts> {
        Ok(self.live_sweep(scope).await?.counts)
    }

    async fn sweep_against(&self, scope: DeviceScope, router: Option<&RouterEndpoint>) -> Result<SweepReport> {
        let devices = self.store.list_devices(scope).await?;
        if devices.is_empty() {
            return Ok(report(Vec::new()));
        }

        // An unreachable session router leaves every device offline; the sweep itself still succeeds.
        let sessions = match router {
            Some(endpoint) => match self.reconciler.fetch_sessions(endpoint).await {
                Ok(sessions) => sessions,
                Err(e) => {
                    tracing::warn!("Session listing failed, counting {} device(s) offline: {}", devices.len(), e);
                    HashSet::new()
                }
            },
            None => {
                tracing::warn!("No session router configured, counting {} device(s) offline", devices.len());
                HashSet::new()
            }
        };

        let health = self.reconciler.classify_global(&devices, &sessions).await?;
        tracing::debug!(
            "Swept {} device(s) for {:?}: {:?}",
            devices.len(),
            scope,
            StatusCounts::tally(&health)
        );
        Ok(report(health))
    }
}

fn report(devices: Vec<DeviceHealth>) -> SweepReport {
    SweepReport {
        polled_at: Utc::now(),
        counts: StatusCounts::tally(&devices),
        devices,
    }
}
