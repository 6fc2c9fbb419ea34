//! NIC attribute bags and attach requests.
//!
//! A NIC is described by an ordered list of `KEY=VALUE` pairs, exactly as the
//! control plane reports it in the router template. Equality and hashing are
//! structural over that ordered list, so two descriptors holding the same pairs
//! in a different order are different NICs. The control plane emits pairs in a
//! stable order for an unchanged NIC, which is what the diff relies on.

use std::fmt;

use nebula_id::{NetworkId, NicId};
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Well-known NIC template keys.
pub mod keys {
    pub const NETWORK_ID: &str = "NETWORK_ID";
    pub const NIC_ID: &str = "NIC_ID";
    pub const NETWORK: &str = "NETWORK";
    pub const IP: &str = "IP";
    pub const MAC: &str = "MAC";
    pub const MODEL: &str = "MODEL";
    pub const VIRTIO_QUEUES: &str = "VIRTIO_QUEUES";
    pub const SECURITY_GROUPS: &str = "SECURITY_GROUPS";
}

/// A NIC as observed in a router snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NicDescriptor {
    pairs: Vec<(String, String)>,
}

impl NicDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a descriptor from ordered pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Append a pair, returning the descriptor.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Value of the first pair with the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over pairs in template order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if the descriptor has no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The identifier the control plane assigned to this NIC, if any.
    pub fn nic_id(&self) -> Option<NicId> {
        self.get(keys::NIC_ID).and_then(|v| NicId::parse(v).ok())
    }

    /// The network this NIC is plugged into, if recorded.
    pub fn network_id(&self) -> Option<NetworkId> {
        self.get(keys::NETWORK_ID)
            .and_then(|v| NetworkId::parse(v).ok())
    }

    /// Canonical string form, e.g. `NIC=[NETWORK_ID="5",NIC_ID="12"]`.
    ///
    /// Two descriptors are the same NIC iff their canonical forms are equal.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NicDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NIC=[")?;
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}=\"{}\"", key, escape_value(value))?;
        }
        f.write_str("]")
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out
}

/// Desired attributes of a NIC to attach.
///
/// The network id is always the first pair. Every pair must be present with the
/// same value on the NIC that eventually shows up for the request to be
/// satisfied; the control plane is free to add more (NIC_ID, MAC, IP...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicRequest {
    network_id: NetworkId,
    pairs: Vec<(String, String)>,
}

impl NicRequest {
    /// Request a NIC on the given network with no other constraints.
    pub fn new(network_id: NetworkId) -> Self {
        Self {
            network_id,
            pairs: vec![(keys::NETWORK_ID.to_string(), network_id.to_string())],
        }
    }

    /// Add a required pair.
    #[must_use]
    pub fn with_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Build a request from raw template pairs.
    ///
    /// The pairs must carry a numeric `NETWORK_ID`; it is moved to the front and
    /// the remaining pairs keep their order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ReconcileError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut network_id = None;
        let mut rest = Vec::new();

        for (key, value) in pairs {
            let (key, value) = (key.into(), value.into());
            if key == keys::NETWORK_ID && network_id.is_none() {
                let id = NetworkId::parse(&value).map_err(|e| {
                    ReconcileError::InvalidRequest(format!(
                        "NIC template doesn't have a valid network ID: {e}"
                    ))
                })?;
                network_id = Some(id);
            } else {
                rest.push((key, value));
            }
        }

        let Some(network_id) = network_id else {
            return Err(ReconcileError::InvalidRequest(
                "NIC template doesn't have a network ID".to_string(),
            ));
        };

        let mut request = Self::new(network_id);
        request.pairs.extend(rest);
        Ok(request)
    }

    /// Network the NIC is requested on.
    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    /// Required pairs, network id first.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true if `nic` carries every requested pair.
    pub fn is_satisfied_by(&self, nic: &NicDescriptor) -> bool {
        self.pairs().all(|(key, value)| nic.get(key) == Some(value))
    }

    /// The template sent with the attach call.
    pub fn to_descriptor(&self) -> NicDescriptor {
        NicDescriptor {
            pairs: self.pairs.clone(),
        }
    }
}
