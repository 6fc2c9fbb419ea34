//! NIC reconciler for virtual routers.
//!
//! The reconciler turns the control plane's fire-and-forget NIC mutations into
//! calls that return once the effect is observable:
//! - [`NicReconciler::attach`] returns the ID the control plane assigned
//! - [`NicReconciler::detach`] returns once the NIC is gone
//!
//! Both hold the mutation back until the router's VMs are in a stable state.
//!
//! The reconciler does not serialize calls per router. Overlapping attach or
//! detach calls against one router can pick up each other's NICs in the diff;
//! callers must run them one at a time. Calls against different routers are
//! independent.

use std::sync::Arc;
use std::time::Duration;

use nebula_id::{NicId, RouterId, VmId};
use tokio::sync::watch;
use tracing::debug;

use crate::control_plane::ControlPlane;
use crate::error::ReconcileError;
use crate::gate::{self, GateError};
use crate::retry::{RetryPolicy, Shutdown};
use crate::snapshot::RouterSnapshot;
use crate::state::{InstanceState, NIC_UPDATE_READY_STATES};

/// Attaches and detaches router NICs and waits for convergence.
pub struct NicReconciler<C: ?Sized> {
    pub(crate) control_plane: Arc<C>,
    pub(crate) policy: RetryPolicy,
    pub(crate) shutdown: Shutdown,
}

impl<C: ?Sized> Clone for NicReconciler<C> {
    fn clone(&self) -> Self {
        Self {
            control_plane: Arc::clone(&self.control_plane),
            policy: self.policy.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<C: ControlPlane + ?Sized> NicReconciler<C> {
    /// Create a reconciler with the default polling policy.
    pub fn new(control_plane: Arc<C>) -> Self {
        Self {
            control_plane,
            policy: RetryPolicy::default(),
            shutdown: Shutdown::never(),
        }
    }

    /// Use a different polling policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Abort in-progress waits when `shutdown` flips to `true`.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Shutdown::new(shutdown);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Read a fresh snapshot of the router.
    pub async fn snapshot(&self, router_id: RouterId) -> Result<RouterSnapshot, ReconcileError> {
        self.control_plane
            .router_snapshot(router_id)
            .await
            .map_err(|err| ReconcileError::from_read(router_id, err))
    }

    /// Returns true if the router currently lists a NIC with this ID.
    pub async fn is_nic_attached(
        &self,
        router_id: RouterId,
        nic_id: NicId,
    ) -> Result<bool, ReconcileError> {
        Ok(self.snapshot(router_id).await?.has_nic(nic_id))
    }

    /// Wait until every VM is in one of `allowed`.
    pub async fn wait_ready(
        &self,
        vm_ids: &[VmId],
        allowed: &[InstanceState],
        timeout: Duration,
    ) -> Result<(), GateError> {
        let mut shutdown = self.shutdown.clone();
        gate::wait_ready(
            &*self.control_plane,
            vm_ids,
            allowed,
            &self.policy,
            timeout,
            &mut shutdown,
        )
        .await
    }

    /// Hold a structural change back until the router's VMs are stable.
    pub(crate) async fn gate(
        &self,
        snapshot: &RouterSnapshot,
        timeout: Duration,
    ) -> Result<(), ReconcileError> {
        let router_id = snapshot.router_id();
        if !snapshot.has_dependents() {
            debug!(router_id = %router_id, "No VMs on router, skipping readiness gate");
            return Ok(());
        }

        self.wait_ready(snapshot.vms(), &NIC_UPDATE_READY_STATES, timeout)
            .await
            .map_err(|err| match err {
                GateError::Blocked(blocked) => ReconcileError::Precondition {
                    router_id,
                    allowed: NIC_UPDATE_READY_STATES.to_vec(),
                    blocked,
                },
                GateError::Cancelled => ReconcileError::Cancelled { router_id },
            })
    }
}
