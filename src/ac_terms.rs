//! Closed-form AC branch flows of the pi-model with their exact partial
//! derivatives.
//!
//! Angles are in radians, voltages and powers in per-unit. Flows are counted
//! from the bus into the branch.

use crate::lf_branch::{PiModel, Side};

/// Flow value and partial derivatives with respect to the voltage
/// magnitudes and angles of both ends.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flow {
    pub value: f64,
    pub dv1: f64,
    pub dv2: f64,
    pub dph1: f64,
    pub dph2: f64,
}

/// Voltage state of the two ends of a branch.
#[derive(Debug, Clone, Copy)]
pub struct BranchVoltages {
    pub v1: f64,
    pub v2: f64,
    pub ph1: f64,
    pub ph2: f64,
}

fn theta1(pi: &PiModel, s: &BranchVoltages) -> f64 {
    pi.ksi - pi.a1 + pi.a2 - s.ph1 + s.ph2
}

fn theta2(pi: &PiModel, s: &BranchVoltages) -> f64 {
    pi.ksi + pi.a1 - pi.a2 + s.ph1 - s.ph2
}

pub fn closed_p1(pi: &PiModel, s: &BranchVoltages) -> Flow {
    let (sin_t, cos_t) = theta1(pi, s).sin_cos();
    let sin_ksi = pi.ksi.sin();
    let y_r1_r2 = pi.y * pi.r1 * pi.r2;
    Flow {
        value: pi.r1
            * s.v1
            * (pi.g1 * pi.r1 * s.v1 + pi.y * pi.r1 * s.v1 * sin_ksi
                - pi.y * pi.r2 * s.v2 * sin_t),
        dv1: pi.r1
            * (2.0 * pi.g1 * pi.r1 * s.v1 + 2.0 * pi.y * pi.r1 * s.v1 * sin_ksi
                - pi.y * pi.r2 * s.v2 * sin_t),
        dv2: -y_r1_r2 * s.v1 * sin_t,
        dph1: y_r1_r2 * s.v1 * s.v2 * cos_t,
        dph2: -y_r1_r2 * s.v1 * s.v2 * cos_t,
    }
}

pub fn closed_q1(pi: &PiModel, s: &BranchVoltages) -> Flow {
    let (sin_t, cos_t) = theta1(pi, s).sin_cos();
    let cos_ksi = pi.ksi.cos();
    let y_r1_r2 = pi.y * pi.r1 * pi.r2;
    Flow {
        value: pi.r1
            * s.v1
            * (-pi.b1 * pi.r1 * s.v1 + pi.y * pi.r1 * s.v1 * cos_ksi
                - pi.y * pi.r2 * s.v2 * cos_t),
        dv1: pi.r1
            * (-2.0 * pi.b1 * pi.r1 * s.v1 + 2.0 * pi.y * pi.r1 * s.v1 * cos_ksi
                - pi.y * pi.r2 * s.v2 * cos_t),
        dv2: -y_r1_r2 * s.v1 * cos_t,
        dph1: -y_r1_r2 * s.v1 * s.v2 * sin_t,
        dph2: y_r1_r2 * s.v1 * s.v2 * sin_t,
    }
}

pub fn closed_p2(pi: &PiModel, s: &BranchVoltages) -> Flow {
    let (sin_t, cos_t) = theta2(pi, s).sin_cos();
    let sin_ksi = pi.ksi.sin();
    let y_r1_r2 = pi.y * pi.r1 * pi.r2;
    Flow {
        value: pi.r2
            * s.v2
            * (pi.g2 * pi.r2 * s.v2 - pi.y * pi.r1 * s.v1 * sin_t
                + pi.y * pi.r2 * s.v2 * sin_ksi),
        dv1: -y_r1_r2 * s.v2 * sin_t,
        dv2: pi.r2
            * (2.0 * pi.g2 * pi.r2 * s.v2 - pi.y * pi.r1 * s.v1 * sin_t
                + 2.0 * pi.y * pi.r2 * s.v2 * sin_ksi),
        dph1: -y_r1_r2 * s.v1 * s.v2 * cos_t,
        dph2: y_r1_r2 * s.v1 * s.v2 * cos_t,
    }
}

pub fn closed_q2(pi: &PiModel, s: &BranchVoltages) -> Flow {
    let (sin_t, cos_t) = theta2(pi, s).sin_cos();
    let cos_ksi = pi.ksi.cos();
    let y_r1_r2 = pi.y * pi.r1 * pi.r2;
    Flow {
        value: pi.r2
            * s.v2
            * (-pi.b2 * pi.r2 * s.v2 - pi.y * pi.r1 * s.v1 * cos_t
                + pi.y * pi.r2 * s.v2 * cos_ksi),
        dv1: -y_r1_r2 * s.v2 * cos_t,
        dv2: pi.r2
            * (-2.0 * pi.b2 * pi.r2 * s.v2 - pi.y * pi.r1 * s.v1 * cos_t
                + 2.0 * pi.y * pi.r2 * s.v2 * cos_ksi),
        dph1: y_r1_r2 * s.v1 * s.v2 * sin_t,
        dph2: -y_r1_r2 * s.v1 * s.v2 * sin_t,
    }
}

// Shunt flow seen from the connected end `side` of a branch open on the
// other end: the series impedance in series with the far shunt, in parallel
// with the near shunt. Returns the (conductance, susceptance) factors.
fn open_branch_admittance(pi: &PiModel, side: Side) -> (f64, f64) {
    let far = match side {
        Side::One => Side::Two,
        Side::Two => Side::One,
    };
    let ((g_near, b_near), (g_far, b_far)) = match side {
        Side::One => ((pi.g1, pi.b1), (pi.g2, pi.b2)),
        Side::Two => ((pi.g2, pi.b2), (pi.g1, pi.b1)),
    };
    let shunt = pi.shunt(far);
    let y2 = pi.y * pi.y;
    let far2 = g_far * g_far + b_far * b_far;
    (
        g_near + y2 * g_far / shunt + far2 * pi.y * pi.ksi.sin() / shunt,
        b_near + y2 * b_far / shunt - far2 * pi.y * pi.ksi.cos() / shunt,
    )
}

fn ratio(pi: &PiModel, side: Side) -> f64 {
    match side {
        Side::One => pi.r1,
        Side::Two => pi.r2,
    }
}

/// Active flow at the connected end `side` of a branch open on the other
/// end. Derivative is with respect to the connected end voltage.
pub fn open_p(pi: &PiModel, side: Side, v: f64) -> (f64, f64) {
    let r = ratio(pi, side);
    let (g, _) = open_branch_admittance(pi, side);
    (r * r * v * v * g, 2.0 * r * r * v * g)
}

/// Reactive flow at the connected end `side` of a branch open on the other
/// end.
pub fn open_q(pi: &PiModel, side: Side, v: f64) -> (f64, f64) {
    let r = ratio(pi, side);
    let (_, b) = open_branch_admittance(pi, side);
    (-r * r * v * v * b, -2.0 * r * r * v * b)
}

/// DC approximation of the side 1 active flow, `p2 = -p1`.
pub fn dc_p1(pi: &PiModel, ph1: f64, ph2: f64) -> Flow {
    let power = 1.0 / pi.x;
    Flow {
        value: power * (ph1 - ph2 + pi.a1 - pi.a2),
        dv1: 0.0,
        dv2: 0.0,
        dph1: power,
        dph2: -power,
    }
}
