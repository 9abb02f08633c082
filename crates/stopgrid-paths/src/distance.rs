use stopgrid_core::Point;

/// Fixed-point cost of an orthogonal step under the octile metric.
pub const STRAIGHT_COST: i32 = 10;
/// Fixed-point cost of a diagonal step under the octile metric (≈ 10·√2).
pub const DIAGONAL_COST: i32 = 14;

/// Manhattan (L1) distance between two points.
#[inline]
pub fn manhattan(a: Point, b: Point) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Octile distance in fixed point: diagonal steps cost [`DIAGONAL_COST`],
/// straight steps [`STRAIGHT_COST`].
#[inline]
pub fn octile(a: Point, b: Point) -> i32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
    DIAGONAL_COST * lo + STRAIGHT_COST * (hi - lo)
}
