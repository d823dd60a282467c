pub(crate) mod networks;

mod dc;
mod outer_loops;

fn assert_near(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{} differs from {} by more than {}",
        actual,
        expected,
        tolerance
    );
}
