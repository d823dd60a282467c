use crate::equation_system::EquationSystem;
use crate::jacobian::LuSolver;
use crate::lf_bus::ModeTransition;
use crate::lf_network::{LfNetwork, SB};
use crate::macro_action::{MacroAction, MacroActionContext};
use crate::newton::{NewtonRaphson, NewtonRaphsonParameters, NewtonRaphsonStatus};
use crate::observer::AcLoadFlowObserver;
use crate::voltage_init::{PreviousValueVoltageInitializer, VoltageInitializer};
use anyhow::Result;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AcLoadFlowResult {
    pub converged: bool,
    /// Number of Newton-Raphson runs.
    pub macro_iterations: usize,
    /// Newton-Raphson iterations over all runs.
    pub iterations: usize,
    pub status: NewtonRaphsonStatus,
    /// Remaining slack bus active power mismatch (MW).
    pub slack_bus_active_power_mismatch: f64,
    pub transitions: Vec<ModeTransition>,
}

/// Runs Newton-Raphson, then each macro action with re-solves until the
/// action has nothing left to change.
///
/// Macro actions are applied in order, innermost first.
pub struct AcLoadFlowEngine<'a> {
    pub newton_raphson: NewtonRaphsonParameters,
    pub voltage_initializer: Box<dyn VoltageInitializer>,
    pub macro_actions: Vec<Box<dyn MacroAction>>,
    pub max_macro_iterations: usize,
    pub solver: &'a LuSolver,
    pub observer: &'a dyn AcLoadFlowObserver,
}

impl AcLoadFlowEngine<'_> {
    pub fn run(&mut self, network: &mut LfNetwork) -> Result<AcLoadFlowResult> {
        let start = Instant::now();
        let observer = self.observer;

        observer.before_equation_system_creation();
        let mut system = EquationSystem::create(network)?;
        observer.after_equation_system_creation(&system);

        let nr = NewtonRaphson::new(self.newton_raphson, self.solver, observer);

        let mut macro_iteration = 0;
        observer.begin_macro_iteration(macro_iteration, "Init");
        let mut result = nr.run(network, &mut system, self.voltage_initializer.as_ref())?;
        observer.end_macro_iteration(macro_iteration, "Init");
        let mut iterations = result.iterations;

        'actions: for action in self.macro_actions.iter_mut() {
            loop {
                if result.status != NewtonRaphsonStatus::Converged {
                    break 'actions;
                }
                if macro_iteration >= self.max_macro_iterations {
                    log::warn!(
                        "maximum number of macro iterations ({}) reached",
                        self.max_macro_iterations
                    );
                    break 'actions;
                }

                let name = action.name().to_string();
                let next = macro_iteration + 1;
                observer.before_macro_action_run(next, &name);
                let cont = action.run(&mut MacroActionContext {
                    macro_iteration: next,
                    network: &mut *network,
                    newton_raphson_result: &result,
                })?;
                observer.after_macro_action_run(next, &name, cont);
                if !cont {
                    break;
                }

                macro_iteration = next;
                observer.begin_macro_iteration(macro_iteration, &name);
                result = nr.run(network, &mut system, &PreviousValueVoltageInitializer)?;
                observer.end_macro_iteration(macro_iteration, &name);
                iterations += result.iterations;
            }
        }

        let result = AcLoadFlowResult {
            converged: result.status == NewtonRaphsonStatus::Converged,
            macro_iterations: macro_iteration + 1,
            iterations,
            status: result.status,
            slack_bus_active_power_mismatch: result.slack_bus_active_power_mismatch * SB,
            transitions: network.transitions().to_vec(),
        };

        log::debug!("AC load flow ran in {} ms", start.elapsed().as_millis());
        log::info!(
            "AC load flow complete (status={}, iterations={}, macro iterations={}, slack bus active power mismatch={} MW)",
            result.status,
            result.iterations,
            result.macro_iterations,
            result.slack_bus_active_power_mismatch
        );
        Ok(result)
    }
}
