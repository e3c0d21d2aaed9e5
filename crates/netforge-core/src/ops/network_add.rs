//! Create a virtual network: a bridge inside its own namespace, acting as
//! a hub (ageing 0) so attached nodes see each other's traffic.

use tracing::warn;

use crate::addr;
use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::ident::MAX_OS_NAME;
use crate::lock::LockDomain;
use crate::model::{Network, NetworkType};
use crate::ops::{self, probe, validation};

pub struct NetworkAddOptions {
    pub network_id: String,
    pub network_type: NetworkType,
}

impl NetworkAddOptions {
    pub fn new(network_id: impl Into<String>, network_type: NetworkType) -> Self {
        Self {
            network_id: network_id.into(),
            network_type,
        }
    }
}

pub fn network_add(ctx: &Context, opts: &NetworkAddOptions) -> Result<OpOutput, CoreError> {
    {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let store = ctx.store();
        let mut doc = store.load()?;
        let network_id = opts.network_id.as_str();

        // ── pre-check ────────────────────────────────────────────────
        if network_id.is_empty() {
            return Err(validation("network_id", "missing name of the new virtual network"));
        }
        if addr::is_domain_name(network_id) {
            return Err(validation("network_id", "using . (dot) in the name is not allowed"));
        }

        if probe::network_exists(ctx, &mut doc, network_id)? {
            warn!("[{network_id}] virtual network already exists");
            ops::network_delete(ctx, network_id)?;
            doc = store.load()?;
        }

        // Allocated after the absorb above so the bridge name agrees with
        // the live identifier map.
        let prefix = ctx.unique_prefix(&mut doc, network_id);
        if prefix.len() > MAX_OS_NAME {
            return Err(validation(
                "network_id",
                format!("bridge name '{prefix}' exceeds the OS name limit"),
            ));
        }

        // ── state record before the namespace and bridge ─────────────
        doc.network
            .insert(network_id.to_owned(), Network::new(opts.network_type));
        store.save(&doc)?;

        // ── OS creation ──────────────────────────────────────────────
        let cmd = ctx.as_root(&format!("ip netns add {prefix}"));
        ctx.run_host(&cmd)?;

        let cmd = ctx.as_root(&format!("brctl addbr {prefix}"));
        ctx.run_at_network(&mut doc, network_id, &cmd)?;

        // ── post-check ───────────────────────────────────────────────
        if !probe::network_exists(ctx, &mut doc, network_id)? {
            return Err(CoreError::Consistency {
                message: format!("failed to create virtual network '{network_id}'"),
            });
        }

        // Hub behavior: no MAC learning, everything floods.
        let cmd = ctx.as_root(&format!("brctl setageing {prefix} 0"));
        ctx.run_at_network(&mut doc, network_id, &cmd)?;
    }

    // Bring the bridge up outside the creation lock scope, the way any
    // later state change would run.
    ops::network_state(ctx, &opts.network_id, true)?;

    Ok(OpOutput::empty())
}
