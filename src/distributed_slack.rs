use crate::lf_network::{LfNetwork, SB};
use crate::macro_action::{MacroAction, MacroActionContext};
use anyhow::{bail, Result};

const SLACK_EPSILON: f64 = 1.0 / SB;

struct ParticipatingBus {
    num: usize,
    factor: f64,
}

/// Spreads the slack bus active power mismatch over the generation targets
/// of the participating buses.
#[derive(Default)]
pub struct DistributedSlackAction;

impl MacroAction for DistributedSlackAction {
    fn name(&self) -> &str {
        "Distributed slack"
    }

    fn run(&mut self, context: &mut MacroActionContext) -> Result<bool> {
        let mismatch = context.newton_raphson_result.slack_bus_active_power_mismatch;
        if mismatch.abs() > SLACK_EPSILON {
            distribute_slack(context.network, mismatch)?;
            return Ok(true);
        }
        log::debug!("already balanced");
        Ok(false)
    }
}

/// Adds `mismatch` (pu) to the generation targets of buses with a non-zero
/// participation factor, pro rata and within their active power limits.
pub fn distribute_slack(network: &mut LfNetwork, mismatch: f64) -> Result<()> {
    let mut participating: Vec<ParticipatingBus> = network
        .buses()
        .iter()
        .filter(|bus| bus.participation_factor != 0.0)
        .map(|bus| ParticipatingBus {
            num: bus.num,
            factor: bus.participation_factor,
        })
        .collect();

    let mut iteration = 0;
    let mut remaining = mismatch;
    while !participating.is_empty() && remaining.abs() > SLACK_EPSILON {
        remaining -= distribute_once(network, &mut participating, iteration, remaining)?;
        iteration += 1;
    }

    if remaining.abs() > SLACK_EPSILON {
        bail!(
            "Failed to distribute slack bus active power mismatch, {:.1} MW remains",
            remaining * SB
        );
    }
    log::debug!(
        "slack bus active power ({:.1} MW) distributed in {} iterations",
        mismatch * SB,
        iteration
    );
    Ok(())
}

// Returns the amount actually distributed. Buses reaching a limit leave
// `participating`.
fn distribute_once(
    network: &mut LfNetwork,
    participating: &mut Vec<ParticipatingBus>,
    iteration: usize,
    remaining: f64,
) -> Result<f64> {
    let factor_sum: f64 = participating.iter().map(|p| p.factor).sum();
    if factor_sum == 0.0 {
        bail!("No more generator participating to slack distribution");
    }
    participating.iter_mut().for_each(|p| p.factor /= factor_sum);

    let mut done = 0.0;
    let mut modified = 0;
    let (mut at_max, mut at_min) = (0, 0);
    let buses = network.buses_mut();
    participating.retain(|p| {
        let bus = &mut buses[p.num];
        let target_p = bus.generation_target_p;
        let (mut min_p, mut max_p) = (bus.min_p, bus.max_p);

        // generation never changes sign
        if target_p < 0.0 {
            max_p = max_p.min(0.0);
        } else {
            min_p = min_p.max(0.0);
        }

        let mut keep = true;
        let mut new_target_p = target_p + remaining * p.factor;
        if remaining > 0.0 && new_target_p > max_p {
            new_target_p = max_p;
            at_max += 1;
            keep = false;
        } else if remaining < 0.0 && new_target_p < min_p {
            new_target_p = min_p;
            at_min += 1;
            keep = false;
        }

        if new_target_p != target_p {
            log::trace!(
                "rescale '{}' active power target: {:.1} -> {:.1}",
                bus.id,
                target_p * SB,
                new_target_p * SB
            );
            bus.generation_target_p = new_target_p;
            done += new_target_p - target_p;
            modified += 1;
        }
        keep
    });

    log::debug!(
        "{:.1} MW / {:.1} MW distributed at iteration {} to {} buses ({} at max power, {} at min power)",
        done * SB,
        remaining * SB,
        iteration,
        modified,
        at_max,
        at_min
    );
    Ok(done)
}
