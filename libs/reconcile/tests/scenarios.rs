//! End-to-end attach and detach flows against the scripted control plane.
//!
//! Time is paused in every test, so poll intervals elapse instantly and the
//! read counts are exact.

use std::sync::Arc;
use std::time::Duration;

use nebula_id::{NetworkId, NicId, RouterId, VmId};
use nebula_reconcile::{
    BlockedInstance, ControlPlane, ControlPlaneError, GateError, InstanceState,
    MockControlPlane, NicDescriptor, NicReconciler, NicRequest, ReconcileError, RetryPolicy,
    RouterSnapshot, NIC_UPDATE_READY_STATES,
};
use rstest::rstest;

const ROUTER: RouterId = RouterId::new(3);

fn nic(network: u32, nic_id: u32) -> NicDescriptor {
    NicDescriptor::new()
        .with("NETWORK_ID", network.to_string())
        .with("NIC_ID", nic_id.to_string())
}

fn router(nics: impl IntoIterator<Item = NicDescriptor>) -> RouterSnapshot {
    nics.into_iter()
        .fold(RouterSnapshot::empty(ROUTER), RouterSnapshot::with_nic)
}

fn reconciler(mock: &Arc<MockControlPlane>) -> NicReconciler<MockControlPlane> {
    NicReconciler::new(Arc::clone(mock)).with_policy(RetryPolicy::fixed(Duration::from_secs(1)))
}

#[tokio::test(start_paused = true)]
async fn test_attach_returns_assigned_nic_id() {
    let mock = Arc::new(MockControlPlane::new().with_snapshots([
        RouterSnapshot::empty(ROUTER),
        router([nic(5, 12)]),
    ]));

    let nic_id = reconciler(&mock)
        .attach(
            ROUTER,
            &NicRequest::new(NetworkId::new(5)),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    assert_eq!(nic_id, NicId::new(12));
    assert_eq!(mock.attach_calls().len(), 1);
    assert_eq!(mock.attach_calls()[0].0, ROUTER);
}

#[tokio::test(start_paused = true)]
async fn test_attach_blocked_by_booting_vm() {
    let vm = VmId::new(40);
    let mock = Arc::new(
        MockControlPlane::new()
            .with_snapshots([RouterSnapshot::empty(ROUTER).with_vm(vm)])
            .with_states(vm, [InstanceState::Boot]),
    );

    let err = reconciler(&mock)
        .attach(
            ROUTER,
            &NicRequest::new(NetworkId::new(5)),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();

    assert!(err.is_precondition());
    assert_eq!(
        err.blocked_instances(),
        &[BlockedInstance::in_state(vm, InstanceState::Boot)]
    );
    assert_eq!(
        err.to_string(),
        "virtual router 3: waiting for virtual machines to be in state RUNNING POWEROFF DONE:\n\
         VM 40: state BOOT"
    );
    assert!(mock.attach_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_detach_waits_for_nic_to_disappear() {
    let with_nic = router([nic(5, 12)]);
    let mock = Arc::new(MockControlPlane::new().with_snapshots([
        with_nic.clone(),
        with_nic.clone(),
        with_nic.clone(),
        with_nic,
        RouterSnapshot::empty(ROUTER),
    ]));

    reconciler(&mock)
        .detach(ROUTER, NicId::new(12), Duration::from_secs(60))
        .await
        .unwrap();

    // one read before the detach, then four polls
    assert_eq!(mock.router_reads(ROUTER), 5);
    assert_eq!(mock.detach_calls(), vec![(ROUTER, NicId::new(12))]);
}

#[tokio::test(start_paused = true)]
async fn test_attach_ignores_unrelated_new_nic() {
    let mock = Arc::new(MockControlPlane::new().with_snapshots([
        router([nic(5, 0)]),
        router([nic(5, 0), nic(6, 1), nic(5, 2)]),
    ]));

    let nic_id = reconciler(&mock)
        .attach(
            ROUTER,
            &NicRequest::new(NetworkId::new(5)),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    assert_eq!(nic_id, NicId::new(2));
}

#[tokio::test(start_paused = true)]
async fn test_attach_picks_first_matching_nic_in_snapshot_order() {
    let mock = Arc::new(MockControlPlane::new().with_snapshots([
        router([nic(5, 0)]),
        router([nic(5, 0), nic(5, 3), nic(5, 2)]),
    ]));

    let nic_id = reconciler(&mock)
        .attach(
            ROUTER,
            &NicRequest::new(NetworkId::new(5)),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    assert_eq!(nic_id, NicId::new(3));
}

#[tokio::test(start_paused = true)]
async fn test_attach_with_extra_pairs_requires_all_of_them() {
    let plain = nic(5, 1);
    let virtio = NicDescriptor::new()
        .with("NETWORK_ID", "5")
        .with("MODEL", "virtio")
        .with("NIC_ID", "2");
    let mock = Arc::new(MockControlPlane::new().with_snapshots([
        RouterSnapshot::empty(ROUTER),
        router([plain, virtio]),
    ]));

    let request = NicRequest::new(NetworkId::new(5)).with_pair("MODEL", "virtio");
    let nic_id = reconciler(&mock)
        .attach(ROUTER, &request, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(nic_id, NicId::new(2));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_mutation_is_distinct_from_convergence_timeout() {
    let rejecting = Arc::new(
        MockControlPlane::new()
            .with_snapshots([RouterSnapshot::empty(ROUTER)])
            .failing_attach(ControlPlaneError::Rejected("quota exceeded".to_string())),
    );
    let silent = Arc::new(MockControlPlane::new().with_snapshots([RouterSnapshot::empty(ROUTER)]));
    let request = NicRequest::new(NetworkId::new(5));

    let rejected = reconciler(&rejecting)
        .attach(ROUTER, &request, Duration::from_secs(5))
        .await
        .unwrap_err();
    let timed_out = reconciler(&silent)
        .attach(ROUTER, &request, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(rejected, ReconcileError::MutationRejected { .. }));
    assert!(!rejected.is_convergence_timeout());
    assert_eq!(rejecting.attach_calls().len(), 1);
    assert_eq!(rejecting.router_reads(ROUTER), 1);

    assert!(matches!(timed_out, ReconcileError::AttachTimeout { .. }));
    assert!(timed_out.is_convergence_timeout());
    assert_eq!(silent.attach_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_router_fails_without_mutation() {
    let mock = Arc::new(MockControlPlane::new());

    let err = reconciler(&mock)
        .detach(ROUTER, NicId::new(1), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::RouterNotFound { router_id } if router_id == ROUTER));
    assert!(mock.detach_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_works_through_trait_object() {
    let mock = Arc::new(MockControlPlane::new().with_snapshots([
        RouterSnapshot::empty(ROUTER),
        router([nic(5, 7)]),
    ]));
    let control_plane: Arc<dyn ControlPlane> = mock.clone();
    let reconciler = NicReconciler::new(control_plane);

    let nic_id = reconciler
        .attach(
            ROUTER,
            &NicRequest::new(NetworkId::new(5)),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    assert_eq!(nic_id, NicId::new(7));
}

#[rstest]
#[case::running(InstanceState::Running)]
#[case::poweroff(InstanceState::Poweroff)]
#[case::done(InstanceState::Done)]
#[tokio::test(start_paused = true)]
async fn test_gate_opens_for_stable_state(#[case] state: InstanceState) {
    let vm = VmId::new(40);
    let mock = Arc::new(MockControlPlane::new().with_states(vm, [state]));

    let result = reconciler(&mock)
        .wait_ready(&[vm], &NIC_UPDATE_READY_STATES, Duration::from_secs(5))
        .await;

    assert_eq!(result, Ok(()));
    assert_eq!(mock.instance_reads(vm), 1);
}

#[rstest]
#[case::boot(InstanceState::Boot)]
#[case::migrate(InstanceState::Migrate)]
#[case::hotplug_nic(InstanceState::HotplugNic)]
#[case::unrecognized(InstanceState::Other("CLONING".to_string()))]
#[tokio::test(start_paused = true)]
async fn test_gate_stays_closed_for_transient_state(#[case] state: InstanceState) {
    let vm = VmId::new(40);
    let mock = Arc::new(MockControlPlane::new().with_states(vm, [state.clone()]));

    let result = reconciler(&mock)
        .wait_ready(&[vm], &NIC_UPDATE_READY_STATES, Duration::from_secs(3))
        .await;

    assert_eq!(
        result,
        Err(GateError::Blocked(vec![BlockedInstance::in_state(vm, state)]))
    );
    // polls at 0s, 1s, 2s and 3s
    assert_eq!(mock.instance_reads(vm), 4);
}

#[tokio::test(start_paused = true)]
async fn test_gate_reports_unreadable_vm() {
    let vm = VmId::new(41);
    let mock = Arc::new(MockControlPlane::new());

    let result = reconciler(&mock)
        .wait_ready(&[vm], &NIC_UPDATE_READY_STATES, Duration::from_secs(1))
        .await;

    match result {
        Err(GateError::Blocked(blocked)) => {
            assert_eq!(blocked.len(), 1);
            assert_eq!(blocked[0].vm_id, vm);
            assert_eq!(blocked[0].last_state, None);
            assert_eq!(blocked[0].last_error.as_deref(), Some("VM 41 not found"));
        }
        other => panic!("expected blocked gate, got {other:?}"),
    }
}
