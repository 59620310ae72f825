//! Directed rounding helpers.
//!
//! Bounding regions must never shrink below their members because of
//! round-off. The helpers below bracket a computation by stepping one ulp
//! past every rounded intermediate result, which yields a value at least as
//! large (or as small) as the exact one without touching the FPU rounding mode.

/// Smallest `f64` strictly greater than `x`.
pub fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Largest `f64` strictly smaller than `x`.
pub fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

fn next_up_f32(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f32::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

fn next_down_f32(x: f32) -> f32 {
    -next_up_f32(-x)
}

/// Nearest single precision value, widened back to `f64`.
pub fn to_f32(x: f64) -> f64 {
    (x as f32) as f64
}

/// Smallest single precision value not below `x`.
pub fn round_up_f32(x: f64) -> f64 {
    let f = x as f32;
    if (f as f64) < x {
        next_up_f32(f) as f64
    } else {
        f as f64
    }
}

/// Largest single precision value not above `x`.
pub fn round_down_f32(x: f64) -> f64 {
    let f = x as f32;
    if (f as f64) > x {
        next_down_f32(f) as f64
    } else {
        f as f64
    }
}

fn up(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        next_up(x)
    }
}

fn down(x: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else {
        next_down(x).max(0.0)
    }
}

/// Euclidean distance, rounded to nearest.
pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Euclidean distance, never smaller than the exact value.
pub fn upper_bound_distance(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b) {
        let d = (x - y).abs();
        if d == 0.0 {
            continue;
        }
        let d = next_up(d);
        sum = next_up(sum + next_up(d * d));
    }
    up(sum.sqrt())
}

/// Euclidean distance, never larger than the exact value.
pub fn lower_bound_distance(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b) {
        let d = down((x - y).abs());
        sum = down(sum + down(d * d));
    }
    down(sum.sqrt())
}
