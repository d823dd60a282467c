use crate::dc::{solve_dc, DcLoadFlowResult};
use crate::distributed_slack::DistributedSlackAction;
use crate::engine::{AcLoadFlowEngine, AcLoadFlowResult};
use crate::jacobian::LuSolver;
use crate::lf_network::LfNetwork;
use crate::macro_action::MacroAction;
use crate::network::Network;
use crate::observer::{
    AcLoadFlowLogger, AcLoadFlowObserver, AcLoadFlowProfiler, MultipleAcLoadFlowObserver,
};
use crate::params::LoadFlowParameters;
use crate::reactive_limits::ReactiveLimitsAction;
use crate::slack::slack_bus_selector;
use anyhow::Result;

/// Runs an AC load flow on the main component of `network`, with logging
/// and profiling observers.
pub fn run_ac(
    network: &mut Network,
    parameters: &LoadFlowParameters,
    solver: &LuSolver,
) -> Result<AcLoadFlowResult> {
    let observer = MultipleAcLoadFlowObserver::new(vec![
        Box::new(AcLoadFlowLogger),
        Box::new(AcLoadFlowProfiler::default()),
    ]);
    run_ac_with_observer(network, parameters, solver, &observer)
}

/// Runs an AC load flow and writes the solved state to `network`. When it
/// does not converge, or fails, the written terminal values are reset to NaN.
pub fn run_ac_with_observer(
    network: &mut Network,
    parameters: &LoadFlowParameters,
    solver: &LuSolver,
    observer: &dyn AcLoadFlowObserver,
) -> Result<AcLoadFlowResult> {
    let selector = slack_bus_selector(
        parameters.slack_bus_selection,
        parameters.slack_bus_id.as_deref(),
    )?;
    let mut lf = LfNetwork::create(network, selector.as_ref())?;

    // innermost first
    let mut macro_actions: Vec<Box<dyn MacroAction>> = Vec::new();
    if parameters.reactive_limits {
        macro_actions.push(Box::new(ReactiveLimitsAction));
    }
    if parameters.distributed_slack {
        macro_actions.push(Box::new(DistributedSlackAction));
    }

    let mut engine = AcLoadFlowEngine {
        newton_raphson: parameters.newton_raphson(),
        voltage_initializer: parameters.voltage_init_mode.initializer(),
        macro_actions,
        max_macro_iterations: parameters.max_macro_iterations,
        solver,
        observer,
    };
    let result = match engine.run(&mut lf) {
        Ok(result) => result,
        Err(err) => {
            lf.reset_network(network);
            return Err(err);
        }
    };

    if result.converged {
        lf.write_to_network(network);
    } else {
        lf.reset_network(network);
    }
    Ok(result)
}

/// Runs a DC load flow on the main component of `network` and writes angles
/// and active flows to it.
pub fn run_dc(
    network: &mut Network,
    parameters: &LoadFlowParameters,
    solver: &LuSolver,
) -> Result<DcLoadFlowResult> {
    let selector = slack_bus_selector(
        parameters.slack_bus_selection,
        parameters.slack_bus_id.as_deref(),
    )?;
    let mut lf = LfNetwork::create(network, selector.as_ref())?;

    let result = solve_dc(&mut lf, solver)?;
    if result.ok {
        lf.write_to_network(network);
    } else {
        lf.reset_network(network);
    }
    Ok(result)
}
