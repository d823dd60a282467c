use crate::lf_network::LfNetwork;
use crate::newton::NewtonRaphsonResult;
use anyhow::Result;

/// State handed to a macro action between two Newton-Raphson runs.
pub struct MacroActionContext<'a> {
    pub macro_iteration: usize,
    pub network: &'a mut LfNetwork,
    pub newton_raphson_result: &'a NewtonRaphsonResult,
}

/// Corrective pass run after a converged Newton-Raphson.
pub trait MacroAction {
    fn name(&self) -> &str;

    /// Returns true when the snapshot was changed and must be solved again.
    fn run(&mut self, context: &mut MacroActionContext) -> Result<bool>;
}
