//! Scripted in-memory control plane for tests and development.
//!
//! Every router and VM owns a queue of scripted responses. Each read pops the
//! front of the queue; the last entry is sticky and is returned for every read
//! after it. Mutations are recorded and succeed unless a failure was injected.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use nebula_id::{NicId, RouterId, VmId};
use tracing::debug;

use crate::control_plane::ControlPlane;
use crate::error::ControlPlaneError;
use crate::nic::NicRequest;
use crate::snapshot::RouterSnapshot;
use crate::state::InstanceState;

/// Mock control plane.
#[derive(Default)]
pub struct MockControlPlane {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    routers: HashMap<RouterId, VecDeque<Result<RouterSnapshot, ControlPlaneError>>>,
    instances: HashMap<VmId, VecDeque<Result<InstanceState, ControlPlaneError>>>,
    attach_failure: Option<ControlPlaneError>,
    detach_failure: Option<ControlPlaneError>,
    router_reads: HashMap<RouterId, usize>,
    instance_reads: HashMap<VmId, usize>,
    attach_calls: Vec<(RouterId, NicRequest)>,
    detach_calls: Vec<(RouterId, NicId)>,
}

fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl MockControlPlane {
    /// Create a mock with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue snapshots for their router, in read order.
    #[must_use]
    pub fn with_snapshots(self, snapshots: impl IntoIterator<Item = RouterSnapshot>) -> Self {
        for snapshot in snapshots {
            self.push_snapshot(snapshot);
        }
        self
    }

    /// Queue lifecycle states for a VM, in read order.
    #[must_use]
    pub fn with_states(
        self,
        vm_id: VmId,
        states: impl IntoIterator<Item = InstanceState>,
    ) -> Self {
        for state in states {
            self.push_state(vm_id, state);
        }
        self
    }

    /// Make every attach call fail with `err`.
    #[must_use]
    pub fn failing_attach(self, err: ControlPlaneError) -> Self {
        self.lock().attach_failure = Some(err);
        self
    }

    /// Make every detach call fail with `err`.
    #[must_use]
    pub fn failing_detach(self, err: ControlPlaneError) -> Self {
        self.lock().detach_failure = Some(err);
        self
    }

    pub fn push_snapshot(&self, snapshot: RouterSnapshot) {
        self.lock()
            .routers
            .entry(snapshot.router_id())
            .or_default()
            .push_back(Ok(snapshot));
    }

    pub fn push_router_error(&self, router_id: RouterId, err: ControlPlaneError) {
        self.lock()
            .routers
            .entry(router_id)
            .or_default()
            .push_back(Err(err));
    }

    pub fn push_state(&self, vm_id: VmId, state: InstanceState) {
        self.lock()
            .instances
            .entry(vm_id)
            .or_default()
            .push_back(Ok(state));
    }

    pub fn push_state_error(&self, vm_id: VmId, err: ControlPlaneError) {
        self.lock()
            .instances
            .entry(vm_id)
            .or_default()
            .push_back(Err(err));
    }

    /// Number of snapshot reads served for a router.
    pub fn router_reads(&self, router_id: RouterId) -> usize {
        self.lock()
            .router_reads
            .get(&router_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of state reads served for a VM.
    pub fn instance_reads(&self, vm_id: VmId) -> usize {
        self.lock()
            .instance_reads
            .get(&vm_id)
            .copied()
            .unwrap_or(0)
    }

    /// Attach calls received, in order.
    pub fn attach_calls(&self) -> Vec<(RouterId, NicRequest)> {
        self.lock().attach_calls.clone()
    }

    /// Detach calls received, in order.
    pub fn detach_calls(&self) -> Vec<(RouterId, NicId)> {
        self.lock().detach_calls.clone()
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn router_snapshot(
        &self,
        router_id: RouterId,
    ) -> Result<RouterSnapshot, ControlPlaneError> {
        let mut state = self.lock();
        *state.router_reads.entry(router_id).or_default() += 1;

        debug!(router_id = %router_id, "[MOCK] Reading virtual router");
        state
            .routers
            .get_mut(&router_id)
            .and_then(next_scripted)
            .unwrap_or_else(|| {
                Err(ControlPlaneError::NotFound(format!(
                    "virtual router {router_id}"
                )))
            })
    }

    async fn instance_state(&self, vm_id: VmId) -> Result<InstanceState, ControlPlaneError> {
        let mut state = self.lock();
        *state.instance_reads.entry(vm_id).or_default() += 1;

        debug!(vm_id = %vm_id, "[MOCK] Reading VM state");
        state
            .instances
            .get_mut(&vm_id)
            .and_then(next_scripted)
            .unwrap_or_else(|| Err(ControlPlaneError::NotFound(format!("VM {vm_id}"))))
    }

    async fn attach_nic(
        &self,
        router_id: RouterId,
        request: &NicRequest,
    ) -> Result<(), ControlPlaneError> {
        let mut state = self.lock();
        debug!(
            router_id = %router_id,
            nic = %request.to_descriptor(),
            "[MOCK] Attaching NIC"
        );
        state.attach_calls.push((router_id, request.clone()));
        match &state.attach_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn detach_nic(
        &self,
        router_id: RouterId,
        nic_id: NicId,
    ) -> Result<(), ControlPlaneError> {
        let mut state = self.lock();
        debug!(router_id = %router_id, nic_id = %nic_id, "[MOCK] Detaching NIC");
        state.detach_calls.push((router_id, nic_id));
        match &state.detach_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nic::NicDescriptor;
    use nebula_id::NetworkId;

    #[tokio::test]
    async fn test_last_snapshot_is_sticky() {
        let router = RouterId::new(1);
        let with_nic = RouterSnapshot::empty(router)
            .with_nic(NicDescriptor::new().with("NETWORK_ID", "5").with("NIC_ID", "0"));
        let mock = MockControlPlane::new()
            .with_snapshots([RouterSnapshot::empty(router), with_nic.clone()]);

        assert!(mock.router_snapshot(router).await.unwrap().nics().is_empty());
        assert_eq!(mock.router_snapshot(router).await.unwrap(), with_nic);
        assert_eq!(mock.router_snapshot(router).await.unwrap(), with_nic);
        assert_eq!(mock.router_reads(router), 3);
    }

    #[tokio::test]
    async fn test_unknown_resources_are_not_found() {
        let mock = MockControlPlane::new();

        let err = mock.router_snapshot(RouterId::new(9)).await.unwrap_err();
        assert!(err.is_not_found());
        let err = mock.instance_state(VmId::new(9)).await.unwrap_err();
        assert_eq!(err.to_string(), "VM 9 not found");
    }

    #[tokio::test]
    async fn test_mutations_are_recorded() {
        let mock = MockControlPlane::new()
            .failing_detach(ControlPlaneError::Rejected("busy".to_string()));
        let router = RouterId::new(1);

        mock.attach_nic(router, &NicRequest::new(NetworkId::new(5)))
            .await
            .unwrap();
        assert!(mock.detach_nic(router, NicId::new(0)).await.is_err());

        assert_eq!(mock.attach_calls().len(), 1);
        assert_eq!(mock.detach_calls(), vec![(router, NicId::new(0))]);
    }
}
