use crate::lf_network::{LfNetwork, SB};
use crate::macro_action::{MacroAction, MacroActionContext};
use anyhow::Result;

/// Switches voltage controlled buses whose regulating sources leave their
/// reactive capability to a fixed reactive injection at the violated bound.
#[derive(Default)]
pub struct ReactiveLimitsAction;

impl MacroAction for ReactiveLimitsAction {
    fn name(&self) -> &str {
        "Reactive limits"
    }

    fn run(&mut self, context: &mut MacroActionContext) -> Result<bool> {
        Ok(check_reactive_limits(context.network) > 0)
    }
}

/// Returns the number of buses switched.
pub fn check_reactive_limits(network: &mut LfNetwork) -> usize {
    let slack_bus = network.slack_bus_num();
    let mut transitions = Vec::new();

    for bus in network.buses_mut() {
        if !bus.has_voltage_control() {
            continue;
        }
        let diagram = match &bus.reactive_diagram {
            Some(diagram) => diagram,
            None => continue,
        };

        let p = if bus.num == slack_bus {
            bus.calculated_p + bus.load_target_p
        } else {
            bus.generation_target_p
        };
        // generation_target_q only holds the non regulating sources here
        let fixed_q = bus.generation_target_q;
        let q = bus.calculated_q + bus.load_target_q - fixed_q;
        let min_q = diagram.min_q(p);
        let max_q = diagram.max_q(p);

        let (bound, reason) = if q < min_q {
            (min_q, format!("q={:.3} < minQ={:.3} MVar", q * SB, min_q * SB))
        } else if q > max_q {
            (max_q, format!("q={:.3} > maxQ={:.3} MVar", q * SB, max_q * SB))
        } else {
            continue;
        };
        bus.generation_target_q = fixed_q + bound;
        transitions.push(bus.deactivate_voltage_control(&reason));
    }

    let switched = transitions.len();
    transitions
        .into_iter()
        .for_each(|t| network.record_transition(t));
    if switched > 0 {
        log::debug!("{} buses switched to fixed reactive power", switched);
    }
    switched
}
