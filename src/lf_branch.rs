use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    One,
    Two,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::One => write!(f, "1"),
            Side::Two => write!(f, "2"),
        }
    }
}

/// Connection state of a snapshot branch (bus numbers of connected ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchConnection {
    Closed { bus1: usize, bus2: usize },
    /// Only the side 2 end is connected.
    OpenSide1 { bus2: usize },
    /// Only the side 1 end is connected.
    OpenSide2 { bus1: usize },
}

/// Per-unit pi-model characteristics of a branch.
///
/// The ideal transformer (ratio `r1`, shift `a1`) sits on side 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiModel {
    pub r: f64,
    pub x: f64,
    pub y: f64,
    pub ksi: f64,
    pub g1: f64,
    pub b1: f64,
    pub g2: f64,
    pub b2: f64,
    pub r1: f64,
    pub r2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl PiModel {
    pub fn new(r: f64, x: f64) -> Self {
        let z = r.hypot(x);
        Self {
            r,
            x,
            y: 1.0 / z,
            ksi: r.atan2(x),
            g1: 0.0,
            b1: 0.0,
            g2: 0.0,
            b2: 0.0,
            r1: 1.0,
            r2: 1.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    pub fn with_shunts(mut self, g1: f64, b1: f64, g2: f64, b2: f64) -> Self {
        self.g1 = g1;
        self.b1 = b1;
        self.g2 = g2;
        self.b2 = b2;
        self
    }

    pub fn with_ratio(mut self, r1: f64, a1: f64) -> Self {
        self.r1 = r1;
        self.a1 = a1;
        self
    }

    /// Squared modulus of the series admittance plus the shunt admittance of
    /// `side`. Denominator of the flow seen through a branch open on `side`.
    pub fn shunt(&self, side: Side) -> f64 {
        let (g, b) = match side {
            Side::One => (self.g1, self.b1),
            Side::Two => (self.g2, self.b2),
        };
        let re = g + self.y * self.ksi.sin();
        let im = -b + self.y * self.ksi.cos();
        re * re + im * im
    }
}

/// Element of the external network a snapshot branch comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchSource {
    Line(usize),
    Transformer(usize),
}

/// Branch of the per-unit snapshot, with its last computed flows (pu).
#[derive(Debug, Clone)]
pub struct LfBranch {
    pub id: String,
    pub num: usize,
    pub source: BranchSource,
    pub connection: BranchConnection,
    pub pi: PiModel,

    pub p1: f64,
    pub q1: f64,
    pub p2: f64,
    pub q2: f64,
}

impl LfBranch {
    pub fn new(
        id: &str,
        num: usize,
        source: BranchSource,
        connection: BranchConnection,
        pi: PiModel,
    ) -> Self {
        Self {
            id: id.to_string(),
            num,
            source,
            connection,
            pi,
            p1: f64::NAN,
            q1: f64::NAN,
            p2: f64::NAN,
            q2: f64::NAN,
        }
    }

    pub fn bus1(&self) -> Option<usize> {
        match self.connection {
            BranchConnection::Closed { bus1, .. } | BranchConnection::OpenSide2 { bus1 } => {
                Some(bus1)
            }
            BranchConnection::OpenSide1 { .. } => None,
        }
    }

    pub fn bus2(&self) -> Option<usize> {
        match self.connection {
            BranchConnection::Closed { bus2, .. } | BranchConnection::OpenSide1 { bus2 } => {
                Some(bus2)
            }
            BranchConnection::OpenSide2 { .. } => None,
        }
    }

    pub(crate) fn reset_state(&mut self) {
        self.p1 = f64::NAN;
        self.q1 = f64::NAN;
        self.p2 = f64::NAN;
        self.q2 = f64::NAN;
    }
}
