use crate::ac_terms::dc_p1;
use crate::debug::format_f64_vec;
use crate::jacobian::LuSolver;
use crate::lf_branch::BranchConnection;
use crate::lf_network::{LfNetwork, SB};
use anyhow::{format_err, Result};
use sparsetools::coo::Coo;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
pub struct DcLoadFlowResult {
    pub ok: bool,
    /// Active power (MW) the slack bus injects beyond its target.
    pub slack_bus_active_power_mismatch: f64,
}

/// Solves the linearized active power balance: flat voltage magnitudes,
/// lossless branches and small angle differences.
///
/// Angles, active injections and branch active flows are written to
/// `network`. A singular system leaves its state unset.
pub fn solve_dc(network: &mut LfNetwork, solver: &LuSolver) -> Result<DcLoadFlowResult> {
    let slack = network.slack_bus_num();

    let mut columns = vec![None; network.buses().len()];
    let mut rhs = Vec::with_capacity(network.buses().len());
    for bus in network.buses().iter().filter(|b| b.num != slack) {
        columns[bus.num] = Some(rhs.len());
        rhs.push(bus.target_p());
    }
    let n = rhs.len();

    // B matrix in column-major order, phase shifts moved to the right hand side
    let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for branch in network.branches() {
        if let BranchConnection::Closed { bus1, bus2 } = branch.connection {
            let flow = dc_p1(&branch.pi, 0.0, 0.0);
            for (bus, sign) in [(bus1, 1.0), (bus2, -1.0)] {
                if let Some(row) = columns[bus] {
                    rhs[row] -= sign * flow.value;
                    for (other, d) in [(bus1, flow.dph1), (bus2, flow.dph2)] {
                        if let Some(col) = columns[other] {
                            *entries.entry((col, row)).or_insert(0.0) += sign * d;
                        }
                    }
                }
            }
        }
    }

    if n > 0 {
        let mut rowidx = Vec::with_capacity(entries.len());
        let mut colidx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for ((col, row), value) in entries {
            rowidx.push(row);
            colidx.push(col);
            values.push(value);
        }
        let b_mat = Coo::new(n, n, rowidx, colidx, values)?.to_csc();

        let solved = solver
            .factor(b_mat.cols(), b_mat.rowidx(), b_mat.colptr(), b_mat.values())
            .and_then(|lu| solver.solve(&lu, &mut rhs, false))
            .and_then(|_| {
                if rhs.iter().all(|a| a.is_finite()) {
                    Ok(())
                } else {
                    Err(format_err!("singular B matrix"))
                }
            });
        if let Err(err) = solved {
            log::warn!("DC load flow failed: {}", err);
            network.reset_state();
            return Ok(DcLoadFlowResult {
                ok: false,
                slack_bus_active_power_mismatch: f64::NAN,
            });
        }
    }
    log::trace!("angles: {}", format_f64_vec(&rhs));

    let angles: Vec<f64> = columns
        .iter()
        .map(|col| col.map_or(0.0, |c| rhs[c]))
        .collect();
    update_network(network, &angles);

    let slack_bus = network.slack_bus();
    let mismatch = (slack_bus.calculated_p - slack_bus.target_p()) * SB;
    log::info!(
        "DC load flow complete (slack bus active power mismatch={} MW)",
        mismatch
    );
    Ok(DcLoadFlowResult {
        ok: true,
        slack_bus_active_power_mismatch: mismatch,
    })
}

fn update_network(network: &mut LfNetwork, angles: &[f64]) {
    let mut injections = vec![0.0; angles.len()];
    for branch in network.branches_mut() {
        (branch.p1, branch.p2) = match branch.connection {
            BranchConnection::Closed { bus1, bus2 } => {
                let p1 = dc_p1(&branch.pi, angles[bus1], angles[bus2]).value;
                injections[bus1] += p1;
                injections[bus2] -= p1;
                (p1, -p1)
            }
            BranchConnection::OpenSide2 { .. } => (0.0, f64::NAN),
            BranchConnection::OpenSide1 { .. } => (f64::NAN, 0.0),
        };
        (branch.q1, branch.q2) = (f64::NAN, f64::NAN);
    }
    for bus in network.buses_mut() {
        bus.v = 1.0;
        bus.angle = angles[bus.num];
        bus.calculated_p = injections[bus.num];
        bus.calculated_q = f64::NAN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::FirstSlackBusSelector;
    use crate::tests::networks;
    use spsolve::rlu::RLU;

    #[test]
    fn test_two_bus() {
        let network = networks::two_bus();
        let mut lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();
        let solver = RLU::default();

        let result = solve_dc(&mut lf, &solver).unwrap();
        assert!(result.ok);
        assert!(result.slack_bus_active_power_mismatch.abs() < 1e-9);

        // theta2 = -P x = -0.02 * 10
        let b2 = lf.bus_by_id("b2").unwrap();
        assert!((b2.angle + 0.2).abs() < 1e-12);
        assert_eq!(b2.v, 1.0);
        let branch = &lf.branches()[0];
        assert!((branch.p1 - 0.02).abs() < 1e-12);
        assert!((branch.p2 + 0.02).abs() < 1e-12);
        assert!(branch.q1.is_nan());
    }

    #[test]
    fn test_parallel_paths() {
        let network = networks::three_generators();
        let mut lf = LfNetwork::create(&network, &FirstSlackBusSelector).unwrap();
        let solver = RLU::default();

        let result = solve_dc(&mut lf, &solver).unwrap();
        assert!(result.ok);
        // the slack takes what the other units do not produce
        let slack = lf.slack_bus();
        assert!((slack.calculated_p - 0.4).abs() < 1e-12);
        assert!((result.slack_bus_active_power_mismatch - 30.0).abs() < 1e-9);

        let flow = |id: &str| lf.branch_by_id(id).unwrap().p1;
        assert!((flow("l1") - 0.4).abs() < 1e-12);
        assert!((flow("l2") - 0.1).abs() < 1e-12);
        assert!((flow("l3") - 0.1).abs() < 1e-12);
    }
}
