use super::geometry::{ParaDir, Point, V2D};

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};

/// The `Element`s are the basic geometric unit of the Mesh in Real Space.
///
/// Elements are responsible for keeping a mapping between Real and Parametric Space in their region of the Mesh.
/// Curvilinear geometry is not represented; the `curved` marker only raises the mapping order seen by the
/// quadrature and blocks h-Unrefinement of the `Elem`s living on this `Element`.
///
/// JSON mesh files describe the `Element`s in the domain; not the `Elem`s
/// Upon `Mesh` construction, each `Element` has one associated `Elem`, but more can be added through h-Refinements
#[derive(Debug)]
pub struct Element {
    pub id: usize,
    pub points: [Point; 4],
    pub curved: bool,
}

impl Element {
    /// Create a new element defined by its coordinates in real space
    pub fn new(id: usize, points: [Point; 4], curved: bool) -> Self {
        assert!(
            points[0].x < points[3].x && points[0].y < points[3].y,
            "Element {}'s first Point must be its lower-left corner and its last Point must be its upper-right corner!",
            id
        );

        Self { id, points, curved }
    }

    /// Map a parametric point (in `[-1, 1]²` relative to a sub-range of this Element) into real space
    pub fn real_point(&self, range: [[f64; 2]; 2], local: V2D) -> Point {
        let [[u_min, u_max], [v_min, v_max]] = range;
        let u = map_range(local.x(), -1.0, 1.0, u_min, u_max);
        let v = map_range(local.y(), -1.0, 1.0, v_min, v_max);

        Point::new(self.map_u(u), self.map_v(v))
    }

    /// Real space corners (lower-left, upper-right) of a sub-range of this Element
    pub fn real_bounds(&self, [[u_min, u_max], [v_min, v_max]]: [[f64; 2]; 2]) -> [Point; 2] {
        [
            Point::new(self.map_u(u_min), self.map_v(v_min)),
            Point::new(self.map_u(u_max), self.map_v(v_max)),
        ]
    }

    /// Length of a sub-range of this Element along one of the parametric directions
    pub fn side_length(&self, range: [[f64; 2]; 2], dir: ParaDir) -> f64 {
        let [min, max] = self.real_bounds(range);
        match dir {
            ParaDir::U => max.x - min.x,
            ParaDir::V => max.y - min.y,
        }
    }

    /// Polynomial order of the geometric mapping (0 for affine Elements)
    pub fn mapping_order(&self) -> u8 {
        if self.curved {
            1
        } else {
            0
        }
    }

    fn map_u(&self, u: f64) -> f64 {
        map_range(u, -1.0, 1.0, self.points[0].x, self.points[3].x)
    }

    fn map_v(&self, v: f64) -> f64 {
        map_range(v, -1.0, 1.0, self.points[0].y, self.points[3].y)
    }

    /// Produce a Json Object that describes this Element
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "curved": self.curved,
            "lower_left": array![self.points[0].x, self.points[0].y],
            "upper_right": array![self.points[3].x, self.points[3].y],
        }
    }
}

fn map_range(val: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (val - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}
