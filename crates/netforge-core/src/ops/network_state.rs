//! Bring a network's bridge up or down.

use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::model::NetworkState;
use crate::ops::{probe, validation};

pub fn network_state(ctx: &Context, network_id: &str, up: bool) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;

    // ── pre-check ────────────────────────────────────────────────────
    if network_id.is_empty() {
        return Err(validation("network_id", "missing name of the virtual network"));
    }
    if !probe::network_exists(ctx, &mut doc, network_id)? {
        return Err(CoreError::MissingResource {
            entity: "network",
            id: network_id.to_owned(),
        });
    }

    let prefix = ctx.unique_prefix(&mut doc, network_id);
    let updown = if up { "up" } else { "down" };
    let cmd = ctx.as_root(&format!("ifconfig {prefix} {updown}"));
    ctx.run_at_network(&mut doc, network_id, &cmd)?;

    // ── post-check ───────────────────────────────────────────────────
    // UNKNOWN (unparseable output) is tolerated; a definite wrong state
    // is not.
    let os_state = probe::network_os_state(ctx, &mut doc, network_id)?;
    if (os_state == "UP" || os_state == "DOWN") && os_state != updown.to_uppercase() {
        return Err(CoreError::Consistency {
            message: format!(
                "failed to bring virtual network '{network_id}' {updown} (state {os_state})"
            ),
        });
    }

    if let Some(network) = doc.network_mut(network_id) {
        network.state = if up {
            NetworkState::Up
        } else {
            NetworkState::Down
        };
    }
    store.save(&doc)?;

    Ok(OpOutput::empty())
}
