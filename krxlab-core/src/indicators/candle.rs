//! Single-session candle patterns.
//!
//! Both patterns need all four prices; a missing price yields `None`.

/// Body smaller than 10% of the session range. The 0.001 term keeps a
/// zero-range session well defined.
pub fn is_doji(open: Option<f64>, high: Option<f64>, low: Option<f64>, close: Option<f64>) -> Option<bool> {
    let (o, h, l, c) = (open?, high?, low?, close?);
    Some((c - o).abs() / (h - l + 0.001) < 0.1)
}

/// Long lower shadow (over twice the body), short upper shadow (under the
/// body), non-empty body.
pub fn is_hammer(open: Option<f64>, high: Option<f64>, low: Option<f64>, close: Option<f64>) -> Option<bool> {
    let (o, h, l, c) = (open?, high?, low?, close?);
    let body = (c - o).abs();
    let upper_shadow = h - o.max(c);
    let lower_shadow = o.min(c) - l;
    Some(lower_shadow > 2.0 * body && upper_shadow < body && body > 0.0)
}
