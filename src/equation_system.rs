use crate::ac_terms::{closed_p1, closed_p2, closed_q1, closed_q2, open_p, open_q, BranchVoltages};
use crate::lf_branch::{BranchConnection, LfBranch, Side};
use crate::lf_network::LfNetwork;
use anyhow::{bail, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquationType {
    /// Active power balance of a bus.
    BusP,
    /// Reactive power balance of a bus.
    BusQ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    BusV,
    BusPhi,
}

impl VariableType {
    fn index(self) -> usize {
        match self {
            VariableType::BusV => 0,
            VariableType::BusPhi => 1,
        }
    }
}

/// Scalar unknown of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub bus: usize,
    pub var_type: VariableType,
    pub column: usize,
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}]@{}", self.var_type, self.bus, self.column)
    }
}

/// Additive contribution of a branch to the balance of one of its buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationTerm {
    /// Flow at end `side` of a branch closed at both ends.
    ClosedBranchFlow {
        branch: usize,
        bus1: usize,
        bus2: usize,
        side: Side,
    },
    /// Shunt flow at the connected end `side` of a branch open on the other
    /// end.
    OpenBranchFlow {
        branch: usize,
        bus: usize,
        side: Side,
    },
}

/// Partial derivative of a term with respect to a bus quantity.
pub type Derivative = (usize, VariableType, f64);

impl EquationTerm {
    /// Term of `branch` seen from its end `side`.
    pub fn new(branch: &LfBranch, side: Side) -> Result<Self> {
        Ok(match (branch.connection, side) {
            (BranchConnection::Closed { bus1, bus2 }, _) => EquationTerm::ClosedBranchFlow {
                branch: branch.num,
                bus1,
                bus2,
                side,
            },
            (BranchConnection::OpenSide2 { bus1: bus }, Side::One)
            | (BranchConnection::OpenSide1 { bus2: bus }, Side::Two) => {
                EquationTerm::OpenBranchFlow {
                    branch: branch.num,
                    bus,
                    side,
                }
            }
            (connection, side) => bail!(
                "no flow term on side {} of branch '{}' ({:?})",
                side,
                branch.id,
                connection
            ),
        })
    }

    /// Value and derivatives of the term in a balance of type `eq_type`.
    pub fn eval(
        &self,
        eq_type: EquationType,
        branches: &[LfBranch],
        v: &[f64],
        ph: &[f64],
    ) -> (f64, Vec<Derivative>) {
        match *self {
            EquationTerm::ClosedBranchFlow {
                branch,
                bus1,
                bus2,
                side,
            } => {
                let pi = &branches[branch].pi;
                let s = BranchVoltages {
                    v1: v[bus1],
                    v2: v[bus2],
                    ph1: ph[bus1],
                    ph2: ph[bus2],
                };
                let flow = match (eq_type, side) {
                    (EquationType::BusP, Side::One) => closed_p1(pi, &s),
                    (EquationType::BusQ, Side::One) => closed_q1(pi, &s),
                    (EquationType::BusP, Side::Two) => closed_p2(pi, &s),
                    (EquationType::BusQ, Side::Two) => closed_q2(pi, &s),
                };
                (
                    flow.value,
                    vec![
                        (bus1, VariableType::BusV, flow.dv1),
                        (bus2, VariableType::BusV, flow.dv2),
                        (bus1, VariableType::BusPhi, flow.dph1),
                        (bus2, VariableType::BusPhi, flow.dph2),
                    ],
                )
            }
            EquationTerm::OpenBranchFlow { branch, bus, side } => {
                let pi = &branches[branch].pi;
                let (value, dv) = match eq_type {
                    EquationType::BusP => open_p(pi, side, v[bus]),
                    EquationType::BusQ => open_q(pi, side, v[bus]),
                };
                (value, vec![(bus, VariableType::BusV, dv)])
            }
        }
    }
}

/// Balance equation of a bus.
#[derive(Debug, Clone)]
pub struct Equation {
    pub bus: usize,
    pub eq_type: EquationType,
    /// Row in the system, `None` while the equation is inactive.
    pub row: Option<usize>,
    pub terms: Vec<EquationTerm>,
}

impl Equation {
    /// Sum of the terms at the given bus voltages.
    pub fn eval(&self, network: &LfNetwork, v: &[f64], ph: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|t| t.eval(self.eq_type, network.branches(), v, ph).0)
            .sum()
    }

    pub fn target(&self, network: &LfNetwork) -> f64 {
        let bus = network.bus(self.bus);
        match self.eq_type {
            EquationType::BusP => bus.target_p(),
            EquationType::BusQ => bus.target_q(),
        }
    }
}

/// Sparse AC power balance system of a snapshot.
///
/// Every bus has a P and a Q equation holding its terms. Which of them are
/// rows of the system, and which bus quantities are variables, follows the
/// bus modes at the last call to [`EquationSystem::index`].
#[derive(Debug, Clone)]
pub struct EquationSystem {
    equations: Vec<Equation>,
    variables: Vec<Variable>,
    /// Column of the V and phi variables of each bus.
    columns: Vec<[Option<usize>; 2]>,
    /// Equation index of each row.
    rows: Vec<usize>,
}

impl EquationSystem {
    pub fn create(network: &LfNetwork) -> Result<Self> {
        let nb = network.buses().len();
        let mut equations = Vec::with_capacity(2 * nb);
        for bus in network.buses() {
            for eq_type in [EquationType::BusP, EquationType::BusQ] {
                equations.push(Equation {
                    bus: bus.num,
                    eq_type,
                    row: None,
                    terms: Vec::default(),
                });
            }
        }

        for branch in network.branches() {
            for (bus, side) in [(branch.bus1(), Side::One), (branch.bus2(), Side::Two)] {
                if let Some(bus) = bus {
                    let term = EquationTerm::new(branch, side)?;
                    equations[2 * bus].terms.push(term);
                    equations[2 * bus + 1].terms.push(term);
                }
            }
        }

        let mut system = Self {
            equations,
            variables: Vec::default(),
            columns: vec![[None, None]; nb],
            rows: Vec::default(),
        };
        system.index(network);
        Ok(system)
    }

    /// Assigns rows and columns from the current bus modes.
    pub fn index(&mut self, network: &LfNetwork) {
        self.variables.clear();
        self.rows.clear();
        self.equations.iter_mut().for_each(|eq| eq.row = None);

        for bus in network.buses() {
            // phi/P then V/Q keeps dP/dphi and dQ/dV on the diagonal
            let mut columns = [None, None];
            if !bus.is_slack() {
                columns[VariableType::BusPhi.index()] =
                    Some(self.push_variable(bus.num, VariableType::BusPhi));
                self.push_row(2 * bus.num);
            }
            if !bus.has_voltage_control() {
                columns[VariableType::BusV.index()] =
                    Some(self.push_variable(bus.num, VariableType::BusV));
                self.push_row(2 * bus.num + 1);
            }
            self.columns[bus.num] = columns;
        }
        log::debug!(
            "equation system indexed: {} equations, {} variables",
            self.rows.len(),
            self.variables.len()
        );
    }

    fn push_variable(&mut self, bus: usize, var_type: VariableType) -> usize {
        let column = self.variables.len();
        self.variables.push(Variable {
            bus,
            var_type,
            column,
        });
        column
    }

    fn push_row(&mut self, equation: usize) {
        self.equations[equation].row = Some(self.rows.len());
        self.rows.push(equation);
    }

    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Active equations in row order.
    pub fn rows(&self) -> impl Iterator<Item = &Equation> {
        self.rows.iter().map(|&i| &self.equations[i])
    }

    pub fn equation(&self, bus: usize, eq_type: EquationType) -> &Equation {
        match eq_type {
            EquationType::BusP => &self.equations[2 * bus],
            EquationType::BusQ => &self.equations[2 * bus + 1],
        }
    }

    pub fn column(&self, bus: usize, var_type: VariableType) -> Option<usize> {
        self.columns[bus][var_type.index()]
    }

    /// State vector from per-bus voltage magnitudes and angles.
    pub fn state_vector(&self, v: &[f64], ph: &[f64]) -> Vec<f64> {
        self.variables
            .iter()
            .map(|var| match var.var_type {
                VariableType::BusV => v[var.bus],
                VariableType::BusPhi => ph[var.bus],
            })
            .collect()
    }

    /// Per-bus voltage magnitudes and angles for state `x`. Quantities that
    /// are not variables take their fixed values.
    pub fn bus_voltages(&self, network: &LfNetwork, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut v = Vec::with_capacity(network.buses().len());
        let mut ph = Vec::with_capacity(network.buses().len());
        for bus in network.buses() {
            v.push(match self.column(bus.num, VariableType::BusV) {
                Some(col) => x[col],
                None => bus.target_v,
            });
            ph.push(match self.column(bus.num, VariableType::BusPhi) {
                Some(col) => x[col],
                None => 0.0,
            });
        }
        (v, ph)
    }

    /// Residual vector f(x): terms minus targets, in row order.
    pub fn evaluate(&self, network: &LfNetwork, x: &[f64]) -> Vec<f64> {
        let (v, ph) = self.bus_voltages(network, x);
        self.rows()
            .map(|eq| eq.eval(network, &v, &ph) - eq.target(network))
            .collect()
    }

    /// Non-zero pattern and values of the Jacobian at `x` as
    /// (row, column, value) triplets. Duplicates must be summed.
    pub fn jacobian_triplets(&self, network: &LfNetwork, x: &[f64]) -> Vec<(usize, usize, f64)> {
        let (v, ph) = self.bus_voltages(network, x);
        let mut triplets = Vec::new();
        for (row, eq) in self.rows().enumerate() {
            for term in &eq.terms {
                let (_, derivatives) = term.eval(eq.eq_type, network.branches(), &v, &ph);
                for (bus, var_type, d) in derivatives {
                    if let Some(col) = self.column(bus, var_type) {
                        triplets.push((row, col, d));
                    }
                }
            }
        }
        triplets
    }

    /// Active power the slack bus injects beyond its target, at `x`.
    pub fn slack_bus_active_power_mismatch(&self, network: &LfNetwork, x: &[f64]) -> f64 {
        let (v, ph) = self.bus_voltages(network, x);
        let slack = network.slack_bus();
        self.equation(slack.num, EquationType::BusP)
            .eval(network, &v, &ph)
            - slack.target_p()
    }

    /// Writes state `x` into the snapshot buses and recomputes branch flows.
    pub fn update_network(&self, network: &mut LfNetwork, x: &[f64]) {
        let (v, ph) = self.bus_voltages(network, x);

        let injections: Vec<(f64, f64)> = network
            .buses()
            .iter()
            .map(|bus| {
                (
                    self.equation(bus.num, EquationType::BusP)
                        .eval(network, &v, &ph),
                    self.equation(bus.num, EquationType::BusQ)
                        .eval(network, &v, &ph),
                )
            })
            .collect();
        for (bus, (p, q)) in network.buses_mut().iter_mut().zip(injections) {
            bus.v = v[bus.num];
            bus.angle = ph[bus.num];
            bus.calculated_p = p;
            bus.calculated_q = q;
        }

        for branch in network.branches_mut() {
            let nan = f64::NAN;
            (branch.p1, branch.q1, branch.p2, branch.q2) = match branch.connection {
                BranchConnection::Closed { bus1, bus2 } => {
                    let s = BranchVoltages {
                        v1: v[bus1],
                        v2: v[bus2],
                        ph1: ph[bus1],
                        ph2: ph[bus2],
                    };
                    (
                        closed_p1(&branch.pi, &s).value,
                        closed_q1(&branch.pi, &s).value,
                        closed_p2(&branch.pi, &s).value,
                        closed_q2(&branch.pi, &s).value,
                    )
                }
                BranchConnection::OpenSide2 { bus1 } => (
                    open_p(&branch.pi, Side::One, v[bus1]).0,
                    open_q(&branch.pi, Side::One, v[bus1]).0,
                    nan,
                    nan,
                ),
                BranchConnection::OpenSide1 { bus2 } => (
                    nan,
                    nan,
                    open_p(&branch.pi, Side::Two, v[bus2]).0,
                    open_q(&branch.pi, Side::Two, v[bus2]).0,
                ),
            };
        }
    }
}
