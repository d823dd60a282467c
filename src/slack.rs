use crate::lf_bus::LfBus;
use anyhow::{format_err, Result};
use clap::ValueEnum;

/// How the angle reference bus is chosen in the main component.
#[derive(Debug, PartialEq, Copy, Clone, Default, ValueEnum)]
pub enum SlackBusSelectionMode {
    /// First bus of the component.
    #[default]
    First,
    /// Highest nominal voltage, then most neighbours.
    MostMeshed,
    /// Bus given by id.
    Name,
}

pub trait SlackBusSelector {
    /// Returns the position of the slack bus in `buses`.
    ///
    /// `neighbours[i]` is the number of distinct buses linked to bus `i` by a
    /// closed branch.
    fn select(&self, buses: &[LfBus], neighbours: &[usize]) -> Result<usize>;
}

pub struct FirstSlackBusSelector;

impl SlackBusSelector for FirstSlackBusSelector {
    fn select(&self, buses: &[LfBus], _neighbours: &[usize]) -> Result<usize> {
        if buses.is_empty() {
            return Err(format_err!("no bus to select a slack from"));
        }
        Ok(0)
    }
}

pub struct MostMeshedSlackBusSelector;

impl SlackBusSelector for MostMeshedSlackBusSelector {
    fn select(&self, buses: &[LfBus], neighbours: &[usize]) -> Result<usize> {
        let max_nominal_v = buses
            .iter()
            .map(|b| b.nominal_v)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut selected: Option<usize> = None;
        for bus in buses.iter().filter(|b| b.nominal_v == max_nominal_v) {
            let better = match selected {
                Some(s) => neighbours[bus.num] > neighbours[s],
                None => true,
            };
            if better {
                selected = Some(bus.num);
            }
        }
        selected.ok_or_else(|| format_err!("no bus to select a slack from"))
    }
}

pub struct NameSlackBusSelector {
    pub bus_id: String,
}

impl SlackBusSelector for NameSlackBusSelector {
    fn select(&self, buses: &[LfBus], _neighbours: &[usize]) -> Result<usize> {
        buses
            .iter()
            .position(|b| b.id == self.bus_id)
            .ok_or_else(|| {
                format_err!(
                    "slack bus '{}' not found in the main connected component",
                    self.bus_id
                )
            })
    }
}

/// Builds the selector for `mode`; `bus_id` is required by `Name`.
pub fn slack_bus_selector(
    mode: SlackBusSelectionMode,
    bus_id: Option<&str>,
) -> Result<Box<dyn SlackBusSelector>> {
    Ok(match mode {
        SlackBusSelectionMode::First => Box::new(FirstSlackBusSelector),
        SlackBusSelectionMode::MostMeshed => Box::new(MostMeshedSlackBusSelector),
        SlackBusSelectionMode::Name => {
            let bus_id = bus_id.ok_or_else(|| format_err!("slack bus id is required"))?;
            Box::new(NameSlackBusSelector {
                bus_id: bus_id.to_string(),
            })
        }
    })
}
