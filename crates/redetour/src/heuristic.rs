//! The A* heuristic seam. Supplied per search so callers can bias searches
//! (e.g. toward cheaper but less optimal paths) without touching the filter.

use glam::Vec3A;

/// Estimates the remaining cost from a position to the search target.
pub trait QueryHeuristic {
    /// The estimated cost of getting from `pos` to `end_pos`.
    fn get_cost(&self, pos: Vec3A, end_pos: Vec3A) -> f32;
}

/// Straight-line distance, scaled slightly below 1 so the estimate stays
/// admissible in the presence of floating point error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultQueryHeuristic {
    /// Multiplier applied to the Euclidean distance.
    pub scale: f32,
}

impl Default for DefaultQueryHeuristic {
    fn default() -> Self {
        Self { scale: 0.999 }
    }
}

impl QueryHeuristic for DefaultQueryHeuristic {
    #[inline]
    fn get_cost(&self, pos: Vec3A, end_pos: Vec3A) -> f32 {
        pos.distance(end_pos) * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::vec3a;

    #[test]
    fn default_heuristic_underestimates_distance() {
        let h = DefaultQueryHeuristic::default();
        let d = h.get_cost(vec3a(0.0, 0.0, 0.0), vec3a(3.0, 0.0, 4.0));
        assert_relative_eq!(d, 4.995);
        assert!(d < 5.0);
    }
}
