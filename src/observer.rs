use crate::debug::format_f64_vec;
use crate::equation_system::EquationSystem;
use crate::jacobian::JacobianMatrix;
use std::cell::Cell;
use std::time::Instant;

/// Passive instrumentation of an AC load flow run.
///
/// Observers only receive shared references and cannot alter the run.
#[allow(unused_variables)]
pub trait AcLoadFlowObserver {
    fn before_equation_system_creation(&self) {}

    fn after_equation_system_creation(&self, system: &EquationSystem) {}

    fn begin_macro_iteration(&self, macro_iteration: usize, macro_action_name: &str) {}

    fn before_voltage_initializer_preparation(&self, initializer_name: &str) {}

    fn after_voltage_initializer_preparation(&self) {}

    fn state_vector_initialized(&self, x: &[f64]) {}

    fn begin_iteration(&self, iteration: usize) {}

    fn before_equation_evaluation(&self, iteration: usize) {}

    fn after_equation_evaluation(&self, fx: &[f64], system: &EquationSystem, iteration: usize) {}

    fn norm(&self, norm: f64, iteration: usize) {}

    fn before_jacobian_build(&self, iteration: usize) {}

    fn after_jacobian_build(
        &self,
        jacobian: &JacobianMatrix,
        system: &EquationSystem,
        iteration: usize,
    ) {
    }

    fn before_lu_decomposition(&self, iteration: usize) {}

    fn after_lu_decomposition(&self, iteration: usize) {}

    fn before_lu_solve(&self, iteration: usize) {}

    fn after_lu_solve(&self, iteration: usize) {}

    fn before_state_update(&self, iteration: usize) {}

    fn after_state_update(&self, x: &[f64], system: &EquationSystem, iteration: usize) {}

    fn end_iteration(&self, iteration: usize) {}

    fn before_macro_action_run(&self, macro_iteration: usize, macro_action_name: &str) {}

    fn after_macro_action_run(&self, macro_iteration: usize, macro_action_name: &str, cont: bool) {}

    fn end_macro_iteration(&self, macro_iteration: usize, macro_action_name: &str) {}

    fn before_network_update(&self) {}

    fn after_network_update(&self) {}
}

/// Observer doing nothing.
pub struct NoopAcLoadFlowObserver;

impl AcLoadFlowObserver for NoopAcLoadFlowObserver {}

/// Forwards every notification to each observer in turn.
#[derive(Default)]
pub struct MultipleAcLoadFlowObserver {
    observers: Vec<Box<dyn AcLoadFlowObserver>>,
}

impl MultipleAcLoadFlowObserver {
    pub fn new(observers: Vec<Box<dyn AcLoadFlowObserver>>) -> Self {
        Self { observers }
    }

    fn each<F: Fn(&dyn AcLoadFlowObserver)>(&self, f: F) {
        self.observers.iter().for_each(|o| f(o.as_ref()));
    }
}

impl AcLoadFlowObserver for MultipleAcLoadFlowObserver {
    fn before_equation_system_creation(&self) {
        self.each(|o| o.before_equation_system_creation());
    }

    fn after_equation_system_creation(&self, system: &EquationSystem) {
        self.each(|o| o.after_equation_system_creation(system));
    }

    fn begin_macro_iteration(&self, macro_iteration: usize, macro_action_name: &str) {
        self.each(|o| o.begin_macro_iteration(macro_iteration, macro_action_name));
    }

    fn before_voltage_initializer_preparation(&self, initializer_name: &str) {
        self.each(|o| o.before_voltage_initializer_preparation(initializer_name));
    }

    fn after_voltage_initializer_preparation(&self) {
        self.each(|o| o.after_voltage_initializer_preparation());
    }

    fn state_vector_initialized(&self, x: &[f64]) {
        self.each(|o| o.state_vector_initialized(x));
    }

    fn begin_iteration(&self, iteration: usize) {
        self.each(|o| o.begin_iteration(iteration));
    }

    fn before_equation_evaluation(&self, iteration: usize) {
        self.each(|o| o.before_equation_evaluation(iteration));
    }

    fn after_equation_evaluation(&self, fx: &[f64], system: &EquationSystem, iteration: usize) {
        self.each(|o| o.after_equation_evaluation(fx, system, iteration));
    }

    fn norm(&self, norm: f64, iteration: usize) {
        self.each(|o| o.norm(norm, iteration));
    }

    fn before_jacobian_build(&self, iteration: usize) {
        self.each(|o| o.before_jacobian_build(iteration));
    }

    fn after_jacobian_build(
        &self,
        jacobian: &JacobianMatrix,
        system: &EquationSystem,
        iteration: usize,
    ) {
        self.each(|o| o.after_jacobian_build(jacobian, system, iteration));
    }

    fn before_lu_decomposition(&self, iteration: usize) {
        self.each(|o| o.before_lu_decomposition(iteration));
    }

    fn after_lu_decomposition(&self, iteration: usize) {
        self.each(|o| o.after_lu_decomposition(iteration));
    }

    fn before_lu_solve(&self, iteration: usize) {
        self.each(|o| o.before_lu_solve(iteration));
    }

    fn after_lu_solve(&self, iteration: usize) {
        self.each(|o| o.after_lu_solve(iteration));
    }

    fn before_state_update(&self, iteration: usize) {
        self.each(|o| o.before_state_update(iteration));
    }

    fn after_state_update(&self, x: &[f64], system: &EquationSystem, iteration: usize) {
        self.each(|o| o.after_state_update(x, system, iteration));
    }

    fn end_iteration(&self, iteration: usize) {
        self.each(|o| o.end_iteration(iteration));
    }

    fn before_macro_action_run(&self, macro_iteration: usize, macro_action_name: &str) {
        self.each(|o| o.before_macro_action_run(macro_iteration, macro_action_name));
    }

    fn after_macro_action_run(&self, macro_iteration: usize, macro_action_name: &str, cont: bool) {
        self.each(|o| o.after_macro_action_run(macro_iteration, macro_action_name, cont));
    }

    fn end_macro_iteration(&self, macro_iteration: usize, macro_action_name: &str) {
        self.each(|o| o.end_macro_iteration(macro_iteration, macro_action_name));
    }

    fn before_network_update(&self) {
        self.each(|o| o.before_network_update());
    }

    fn after_network_update(&self) {
        self.each(|o| o.after_network_update());
    }
}

/// Logs the progress of a run.
pub struct AcLoadFlowLogger;

impl AcLoadFlowObserver for AcLoadFlowLogger {
    fn begin_macro_iteration(&self, macro_iteration: usize, macro_action_name: &str) {
        log::debug!("start macro iteration {} ({})", macro_iteration, macro_action_name);
    }

    fn state_vector_initialized(&self, x: &[f64]) {
        log::trace!("x0: {}", format_f64_vec(x));
    }

    fn after_equation_evaluation(&self, fx: &[f64], _system: &EquationSystem, iteration: usize) {
        log::trace!("f_{}: {}", iteration, format_f64_vec(fx));
    }

    fn norm(&self, norm: f64, iteration: usize) {
        log::debug!("norm_f{}: {}", iteration, norm);
    }

    fn after_state_update(&self, x: &[f64], _system: &EquationSystem, iteration: usize) {
        log::trace!("x_{}: {}", iteration, format_f64_vec(x));
    }

    fn after_macro_action_run(&self, macro_iteration: usize, macro_action_name: &str, cont: bool) {
        log::debug!(
            "macro action '{}' at macro iteration {}: {}",
            macro_action_name,
            macro_iteration,
            if cont { "unstable" } else { "stable" }
        );
    }
}

/// Measures the time spent in each phase of a run.
#[derive(Default)]
pub struct AcLoadFlowProfiler {
    phase: Cell<Option<Instant>>,
    iteration: Cell<Option<Instant>>,
}

impl AcLoadFlowProfiler {
    fn start(&self) {
        self.phase.set(Some(Instant::now()));
    }

    fn stop(&self, what: &str) {
        if let Some(start) = self.phase.take() {
            log::debug!("{} in {} us", what, start.elapsed().as_micros());
        }
    }
}

impl AcLoadFlowObserver for AcLoadFlowProfiler {
    fn before_equation_system_creation(&self) {
        self.start();
    }

    fn after_equation_system_creation(&self, _system: &EquationSystem) {
        self.stop("AC equation system created");
    }

    fn before_voltage_initializer_preparation(&self, _initializer_name: &str) {
        self.start();
    }

    fn after_voltage_initializer_preparation(&self) {
        self.stop("voltage initializer prepared");
    }

    fn begin_iteration(&self, _iteration: usize) {
        self.iteration.set(Some(Instant::now()));
    }

    fn before_equation_evaluation(&self, _iteration: usize) {
        self.start();
    }

    fn after_equation_evaluation(&self, _fx: &[f64], _system: &EquationSystem, iteration: usize) {
        self.stop(&format!("equations evaluated at iteration {}", iteration));
    }

    fn before_jacobian_build(&self, _iteration: usize) {
        self.start();
    }

    fn after_jacobian_build(
        &self,
        _jacobian: &JacobianMatrix,
        _system: &EquationSystem,
        iteration: usize,
    ) {
        self.stop(&format!("jacobian built at iteration {}", iteration));
    }

    fn before_lu_decomposition(&self, _iteration: usize) {
        self.start();
    }

    fn after_lu_decomposition(&self, iteration: usize) {
        self.stop(&format!("LU decomposed at iteration {}", iteration));
    }

    fn before_lu_solve(&self, _iteration: usize) {
        self.start();
    }

    fn after_lu_solve(&self, iteration: usize) {
        self.stop(&format!("LU solved at iteration {}", iteration));
    }

    fn before_state_update(&self, _iteration: usize) {
        self.start();
    }

    fn after_state_update(&self, _x: &[f64], _system: &EquationSystem, iteration: usize) {
        self.stop(&format!("state updated at iteration {}", iteration));
    }

    fn end_iteration(&self, iteration: usize) {
        if let Some(start) = self.iteration.take() {
            log::debug!(
                "iteration {} complete in {} us",
                iteration,
                start.elapsed().as_micros()
            );
        }
    }

    fn before_network_update(&self) {
        self.start();
    }

    fn after_network_update(&self) {
        self.stop("network updated");
    }
}
