//! # nebula-id
//!
//! Typed identifiers for control-plane resources.
//!
//! ## Design Principles
//!
//! - IDs are assigned by the control plane; the client never invents them
//! - Every ID is a non-negative integer with a plain decimal representation
//! - IDs are typed so a NIC id can never be passed where a router id is expected
//!
//! ## Examples
//!
//! ```
//! use nebula_id::{NicId, RouterId};
//!
//! let router: RouterId = "3".parse().unwrap();
//! let nic = NicId::new(12);
//! assert_eq!(router.value(), 3);
//! assert_eq!(nic.to_string(), "12");
//! ```

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;
