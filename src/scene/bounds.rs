use glam::Vec3;

/// Axis-aligned box. Only built from at least one position, so `min <= max`
/// holds on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Returns `None` for an empty vertex buffer.
    pub fn from_vertices(vertices: &[[f32; 3]]) -> Option<Self> {
        let (first, rest) = vertices.split_first()?;
        let seed = Vec3::from_array(*first);
        let bounds = rest.iter().fold(
            Self {
                min: seed,
                max: seed,
            },
            |acc, vertex| {
                let point = Vec3::from_array(*vertex);
                Self {
                    min: acc.min.min(point),
                    max: acc.max.max(point),
                }
            },
        );
        log::debug!(
            "Mesh bounds: X[{:.2}, {:.2}] Y[{:.2}, {:.2}] Z[{:.2}, {:.2}]",
            bounds.min.x,
            bounds.max.x,
            bounds.min.y,
            bounds.max.y,
            bounds.min.z,
            bounds.max.z
        );
        Some(bounds)
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }
}

#[cfg(test)]
mod tests {
    use super::Bounds;
    use glam::Vec3;

    fn boxed(min: [f32; 3], max: [f32; 3]) -> Bounds {
        Bounds {
            min: Vec3::from_array(min),
            max: Vec3::from_array(max),
        }
    }

    #[test]
    fn folds_elementwise_min_max() {
        let bounds = Bounds::from_vertices(&[[0.0, 0.0, 0.0], [2.0, 4.0, -2.0]]).unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn single_vertex_gives_degenerate_box() {
        let bounds = Bounds::from_vertices(&[[1.0, -1.0, 3.0]]).unwrap();
        assert_eq!(bounds.min, bounds.max);
        assert_eq!(bounds.max_extent(), 0.0);
    }

    #[test]
    fn empty_input_has_no_bounds() {
        assert!(Bounds::from_vertices(&[]).is_none());
    }

    #[test]
    fn center_and_extent() {
        let bounds = boxed([-1.0, 0.0, 2.0], [3.0, 10.0, 4.0]);
        assert_eq!(bounds.center(), Vec3::new(1.0, 5.0, 3.0));
        assert_eq!(bounds.max_extent(), 10.0);
    }

    #[test]
    fn union_is_associative_and_commutative() {
        let a = boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = boxed([-5.0, 2.0, 0.5], [0.5, 3.0, 9.0]);
        let c = boxed([4.0, -7.0, -1.0], [6.0, -6.0, 0.0]);

        let left = a.union(b).union(c);
        assert_eq!(left, a.union(b.union(c)));
        assert_eq!(left, b.union(a).union(c));
        assert_eq!(left, boxed([-5.0, -7.0, -1.0], [6.0, 3.0, 9.0]));
    }
}
