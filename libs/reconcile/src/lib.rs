//! Virtual router NIC reconciliation.
//!
//! The control plane accepts NIC attach and detach requests without telling the
//! caller when they take effect. This library wraps those calls so they return
//! once the change is observable on the router:
//!
//! - **Readiness gate**: no structural change is issued while a VM riding on the
//!   router is mid-transition.
//! - **Diff and match**: after an attach, the NICs that were already there are
//!   subtracted from a fresh snapshot and the remaining NICs are matched
//!   against the requested pairs to find the one just added.
//! - **Bounded polling**: every wait has a deadline, backs off between polls and
//!   can be cancelled through a shutdown channel.
//!
//! ## Modules
//!
//! - `nic`: NIC descriptors and attach requests
//! - `snapshot`: point-in-time router views
//! - `matcher`: reference-set diff and first-match selection
//! - `gate`: instance readiness gate
//! - `retry`: polling schedule and cancellation
//! - `mock`: scripted control plane for tests
//!
//! ```
//! use nebula_id::NetworkId;
//! use nebula_reconcile::{NicDescriptor, NicRequest};
//!
//! let request = NicRequest::new(NetworkId::new(5)).with_pair("MODEL", "virtio");
//! let nic = NicDescriptor::new()
//!     .with("NETWORK_ID", "5")
//!     .with("MODEL", "virtio")
//!     .with("NIC_ID", "12");
//! assert!(request.is_satisfied_by(&nic));
//! ```

use std::time::Duration;

mod attach;
mod detach;

pub mod control_plane;
pub mod error;
pub mod gate;
pub mod matcher;
pub mod mock;
pub mod nic;
pub mod reconciler;
pub mod retry;
pub mod snapshot;
pub mod state;

// Re-export commonly used types
pub use control_plane::ControlPlane;
pub use error::{
    AttachStall, BlockedInstance, ControlPlaneError, DetachStall, GateDiagnostic, Mutation,
    ReconcileError,
};
pub use gate::GateError;
pub use matcher::{classify, diff_and_match, new_nics, MatchOutcome, ReferenceSet};
pub use mock::MockControlPlane;
pub use nic::{keys, NicDescriptor, NicRequest};
pub use reconciler::NicReconciler;
pub use retry::{RetryPolicy, Shutdown};
pub use snapshot::RouterSnapshot;
pub use state::{InstanceState, NIC_UPDATE_READY_STATES};

/// Delay after the first poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lower bound on the delay between polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on the delay between polls.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default bound on each wait of an attach or detach.
pub const DEFAULT_CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(3 * 60); // 3 minutes
