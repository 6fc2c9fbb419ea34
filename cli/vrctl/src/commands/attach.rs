//! Attach a NIC to a virtual router.

use anyhow::Result;
use clap::Args;
use nebula_id::{NetworkId, NicId, RouterId};
use nebula_reconcile::{keys, NicRequest};
use serde::Serialize;

use crate::error::CliError;
use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct AttachCommand {
    /// Virtual router ID.
    router: RouterId,

    /// Network to attach the NIC to.
    #[arg(long)]
    network: NetworkId,

    /// Extra NIC attribute the attached NIC must carry (repeatable).
    #[arg(long = "pair", value_name = "KEY=VALUE", value_parser = parse_pair)]
    pairs: Vec<(String, String)>,

    /// Seconds to wait for the VMs to settle and, separately, for the NIC to show up.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// Attach result.
#[derive(Debug, Serialize)]
struct AttachReceipt {
    router_id: RouterId,
    network_id: NetworkId,
    nic_id: NicId,
}

impl AttachCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let request = build_request(self.network, self.pairs)?;
        let timeout = ctx.timeout(self.timeout_secs);

        let nic_id = ctx
            .reconciler()?
            .attach(self.router, &request, timeout)
            .await?;

        match ctx.format {
            OutputFormat::Table => print_success(&format!(
                "Attached NIC {} to virtual router {} on network {}",
                nic_id, self.router, self.network
            )),
            OutputFormat::Json => print_single(&AttachReceipt {
                router_id: self.router,
                network_id: self.network,
                nic_id,
            }),
        }
        Ok(())
    }
}

fn build_request(
    network: NetworkId,
    pairs: Vec<(String, String)>,
) -> Result<NicRequest, CliError> {
    pairs
        .into_iter()
        .try_fold(NicRequest::new(network), |request, (key, value)| {
            if key.eq_ignore_ascii_case(keys::NETWORK_ID) {
                return Err(CliError::NetworkPair);
            }
            Ok(request.with_pair(key, value))
        })
}

fn parse_pair(raw: &str) -> Result<(String, String), CliError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidPair(raw.to_string()))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidPair(raw.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}
