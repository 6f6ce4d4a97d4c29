/// A Finite Element in Parametric Space
pub mod elem;
/// A Finite Element in Real Space
pub mod element;
/// Structures to describe the 2D real and parametric spaces defining a Mesh
pub mod geometry;
/// Structures and Functions to facilitate isotropic and anisotropic h-refinement
pub mod h_refinement;
/// Structures and Functions to facilitate anisotropic p-refinement
pub mod p_refinement;

use elem::Elem;
use element::Element;
use geometry::{ParaDir, Point, GEOMETRIC_TOLERANCE};
use h_refinement::{HRef, HRefError};

use super::IdTracker;

use json::JsonValue;
use log::debug;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::read_to_string;
use std::io::{Error, ErrorKind};
use std::sync::Arc;

#[cfg(feature = "json_export")]
use json::object;
#[cfg(feature = "json_export")]
use std::{fs::File, io::BufWriter};

/// Minimum Edge length in real space. h-Refinements will fail after edges are smaller than this value.
pub const MIN_EDGE_LENGTH: f64 = 3.0518e-5; // 15ish refinement layers with unit sized cells

/// The expected "h-Refinement" depth. This determines the stack allocation size of some `SmallVec`s related to h-Refinement
pub const EXPECTED_NUM_H_REFINEMENTS: usize = 8;

/// Maximum Polynomial expansion. p-Refinements will fail when expansion orders exceed this value.
pub const MAX_POLYNOMIAL_ORDER: u8 = 10;

/// Information used to Define the geometric structure and refinement state of a region of the Domain.
///
/// `Elem`s are stored in an arena indexed by their ID. IDs are handed out sequentially as h-Refinements are applied
/// and are never reused; `Elem`s removed by an h-Unrefinement stay in the arena in a retired state.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub elements: Vec<Arc<Element>>,
    pub elems: Vec<Elem>,
}

impl Mesh {
    /// Construct a completely empty Mesh
    pub fn blank() -> Self {
        Self {
            elements: Vec::new(),
            elems: Vec::new(),
        }
    }

    /// Construct a Mesh from a JSON file with the following format
    ///
    /// The first "Element" and "Node" describe the meaning of each variable
    ///
    /// The following entries in each array describe this two element mesh:
    /// ```text
    ///     3               4               5
    /// 0.5 *---------------*---------------*
    ///     |               |               |
    ///     |               |    curved     |
    ///     |               |               |
    /// 0.0 *---------------*---------------*
    ///  y  0               1               2
    ///  x 0.0             1.0             2.0
    /// ```
    ///
    /// mesh.json
    /// ```JSON
    /// {
    ///     "Elements": [
    ///         {
    ///             "node_ids": [node_0_id, node_1_id, node_2_id, node_3_id],
    ///             "curved": (optional) bool,
    ///         },
    ///         {
    ///             "node_ids": [0, 1, 3, 4],
    ///         },
    ///         {
    ///             "node_ids": [1, 2, 4, 5],
    ///             "curved": true,
    ///         }
    ///     ],
    ///     "Nodes": [
    ///         [x_coordinate, y_coordinate],
    ///         [0.0, 0.0],
    ///         [1.0, 0.0],
    ///         [2.0, 0.0],
    ///         [0.0, 0.5],
    ///         [1.0, 0.5],
    ///         [2.0, 0.5],
    ///     ]
    /// }
    /// ```
    pub fn from_file(path: impl AsRef<str>) -> std::io::Result<Self> {
        // parse mesh file as JSON
        let mesh_file_contents = read_to_string(path.as_ref())?;
        let mesh_file_json = json::parse(&mesh_file_contents)
            .map_err(|err| Error::new(ErrorKind::InvalidData, err))?;

        // extract node locations and element descriptions (panicking if JSON format is not correct)
        let points = parse_node_information(&mesh_file_json);
        let element_info = parse_element_information(&mesh_file_json, points.len());

        let elements = element_info
            .iter()
            .enumerate()
            .map(|(element_id, (node_ids, curved))| {
                let element_points = node_ids.map(|node_id| points[node_id]);

                assert_eq!(
                    element_points[0].orientation_with(&element_points[1]),
                    ParaDir::U,
                    "Element {}'s first two nodes must be horizontally aligned!",
                    element_id
                );
                assert_eq!(
                    element_points[0].orientation_with(&element_points[2]),
                    ParaDir::V,
                    "Element {}'s first and third nodes must be vertically aligned!",
                    element_id
                );

                Arc::new(Element::new(element_id, element_points, *curved))
            })
            .collect();

        Ok(Self::from_elements(elements))
    }

    /// Construct a Mesh of `nx` by `ny` equally sized Elements covering a rectangle
    pub fn uniform_rect(x_range: [f64; 2], y_range: [f64; 2], [nx, ny]: [usize; 2]) -> Self {
        assert!(
            nx > 0 && ny > 0,
            "A rectangular Mesh must have at least one Element in each direction!"
        );

        let dx = (x_range[1] - x_range[0]) / nx as f64;
        let dy = (y_range[1] - y_range[0]) / ny as f64;

        let elements = (0..ny)
            .flat_map(|j| (0..nx).map(move |i| (i, j)))
            .enumerate()
            .map(|(id, (i, j))| {
                let x0 = x_range[0] + dx * i as f64;
                let y0 = y_range[0] + dy * j as f64;

                Arc::new(Element::new(
                    id,
                    [
                        Point::new(x0, y0),
                        Point::new(x0 + dx, y0),
                        Point::new(x0, y0 + dy),
                        Point::new(x0 + dx, y0 + dy),
                    ],
                    false,
                ))
            })
            .collect();

        Self::from_elements(elements)
    }

    fn from_elements(elements: Vec<Arc<Element>>) -> Self {
        let elems = elements
            .iter()
            .map(|element| Elem::new(element.id, element.clone()))
            .collect();

        Self { elements, elems }
    }

    /// Print the mesh to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let mesh_object = object! {
            "Elements": JsonValue::from(self.elements.iter().map(|element| element.to_json()).collect::<Vec<_>>()),
            "Elems": JsonValue::from(self.elems.iter().map(|elem| elem.to_json()).collect::<Vec<_>>()),
        };

        mesh_object.write_pretty(&mut w, 4)?;

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // General Data Retrieval
    // ----------------------------------------------------------------------------------------------------

    pub fn get_elem(&self, elem_id: usize) -> Option<&Elem> {
        self.elems.get(elem_id)
    }

    /// One more than the largest `Elem` ID ever handed out by this Mesh (never decreases)
    pub fn max_elem_id(&self) -> usize {
        self.elems.len()
    }

    pub fn num_active_elems(&self) -> usize {
        self.elems.iter().filter(|elem| elem.is_active()).count()
    }

    /// IDs of all active `Elem`s in ascending order
    pub fn active_elem_ids(&self) -> Vec<usize> {
        self.elems
            .iter()
            .filter(|elem| elem.is_active())
            .map(|elem| elem.id)
            .collect()
    }

    /// IDs of all `Elem`s which have children in ascending order
    pub fn inactive_elem_ids(&self) -> Vec<usize> {
        self.elems
            .iter()
            .filter(|elem| elem.has_children())
            .map(|elem| elem.id)
            .collect()
    }

    /// Get a list of an [`Elem`]s descendant's IDs
    pub fn descendant_elems(
        &self,
        elem_id: usize,
        include_starting_elem: bool,
    ) -> Result<Vec<usize>, HRefError> {
        if elem_id >= self.elems.len() {
            Err(HRefError::ElemDoesntExist(elem_id))
        } else {
            let mut descendants = Vec::new();
            self.rec_descendant_elems(elem_id, include_starting_elem, &mut descendants);
            Ok(descendants)
        }
    }

    fn rec_descendant_elems(&self, elem_id: usize, include: bool, desc: &mut Vec<usize>) {
        if include {
            desc.push(elem_id);
        }
        if let Some(child_elem_ids) = self.elems[elem_id].child_ids() {
            for cei in child_elem_ids {
                self.rec_descendant_elems(cei, true, desc);
            }
        }
    }

    /// Get a list of an [`Elem`]s ancestors's IDs (nearest first)
    pub fn ancestor_elems(
        &self,
        elem_id: usize,
        include_starting_elem: bool,
    ) -> Result<Vec<usize>, HRefError> {
        if elem_id >= self.elems.len() {
            Err(HRefError::ElemDoesntExist(elem_id))
        } else {
            let mut ancestors = Vec::new();
            self.rec_ancestor_elems(elem_id, include_starting_elem, &mut ancestors);
            Ok(ancestors)
        }
    }

    fn rec_ancestor_elems(&self, elem_id: usize, include: bool, anc: &mut Vec<usize>) {
        if include {
            anc.push(elem_id);
        }
        if let Some(parent_elem_id) = self.elems[elem_id].parent_id() {
            self.rec_ancestor_elems(parent_elem_id, true, anc);
        }
    }

    /// Number of h-Refinements separating an `Elem` from the base layer of the Mesh
    pub fn elem_depth(&self, elem_id: usize) -> usize {
        self.elems[elem_id].depth()
    }

    /// Get the lower-left and upper-right [Point]s of an [`Elem`] in real space
    pub fn elem_bounds(&self, elem_id: usize) -> [Point; 2] {
        assert!(elem_id < self.elems.len());
        let elem = &self.elems[elem_id];
        elem.element.real_bounds(elem.parametric_range())
    }

    /// Find the active `Elem` containing a point by descending the refinement trees of the base layer
    pub fn find_active_elem(&self, point: &Point) -> Option<usize> {
        let mut current = self
            .elems
            .iter()
            .take(self.elements.len())
            .find(|elem| point.within(&self.elem_bounds(elem.id)))?;

        while let Some(child_ids) = current.child_ids() {
            current = child_ids
                .iter()
                .map(|child_id| &self.elems[*child_id])
                .find(|child| point.within(&self.elem_bounds(child.id)))?;
        }

        if current.is_active() {
            Some(current.id)
        } else {
            None
        }
    }

    /// IDs of the active `Elem`s sharing a boundary segment of positive length with an `Elem` (ascending)
    pub fn active_neighbors(&self, elem_id: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> = self
            .active_adjacency()
            .into_iter()
            .filter_map(|(a, b)| match (a == elem_id, b == elem_id) {
                (true, false) => Some(b),
                (false, true) => Some(a),
                _ => None,
            })
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    /// Every pair of neighboring active `Elem`s, listed once
    ///
    /// The left and bottom edges of the active `Elem`s are bucketed by their coordinate, so each `Elem` only has to
    /// search the bucket matching its own right and top edges
    pub fn active_adjacency(&self) -> Vec<(usize, usize)> {
        let active: Vec<(usize, [Point; 2])> = self
            .active_elem_ids()
            .into_iter()
            .map(|elem_id| (elem_id, self.elem_bounds(elem_id)))
            .collect();

        let mut left_edges: HashMap<i64, Vec<(f64, f64, usize)>> = HashMap::new();
        let mut bottom_edges: HashMap<i64, Vec<(f64, f64, usize)>> = HashMap::new();
        for (elem_id, [min, max]) in active.iter() {
            left_edges
                .entry(edge_key(min.x))
                .or_default()
                .push((min.y, max.y, *elem_id));
            bottom_edges
                .entry(edge_key(min.y))
                .or_default()
                .push((min.x, max.x, *elem_id));
        }

        let mut pairs = Vec::new();
        for (elem_id, [min, max]) in active.iter() {
            if let Some(edges) = left_edges.get(&edge_key(max.x)) {
                pairs.extend(
                    edges
                        .iter()
                        .filter(|(b_min, b_max, _)| overlap(min.y, max.y, *b_min, *b_max) > GEOMETRIC_TOLERANCE)
                        .map(|(_, _, other)| (*elem_id, *other)),
                );
            }
            if let Some(edges) = bottom_edges.get(&edge_key(max.y)) {
                pairs.extend(
                    edges
                        .iter()
                        .filter(|(b_min, b_max, _)| overlap(min.x, max.x, *b_min, *b_max) > GEOMETRIC_TOLERANCE)
                        .map(|(_, _, other)| (*elem_id, *other)),
                );
            }
        }

        pairs
    }

    /// Largest difference in h-Refinement depth between any two neighboring active `Elem`s
    pub fn max_irregularity(&self) -> usize {
        self.active_adjacency()
            .into_iter()
            .map(|(a, b)| {
                let (depth_a, depth_b) = (self.elem_depth(a), self.elem_depth(b));
                depth_a.max(depth_b) - depth_a.min(depth_b)
            })
            .max()
            .unwrap_or(0)
    }

    /// Determine if this Elem can be h-refined
    /// * returns false if the Elem already has children (or has been retired)
    /// * returns false if any of the Elem's Edges are shorter than [MIN_EDGE_LENGTH]
    /// * returns an `Err` if the Mesh doesn't have `elem_id`
    pub fn elem_is_h_refineable(&self, elem_id: usize) -> Result<bool, HRefError> {
        if elem_id >= self.elems.len() {
            Err(HRefError::ElemDoesntExist(elem_id))
        } else {
            let elem = &self.elems[elem_id];
            let range = elem.parametric_range();
            Ok(elem.is_active()
                && [ParaDir::U, ParaDir::V]
                    .iter()
                    .all(|dir| elem.element.side_length(range, *dir) > MIN_EDGE_LENGTH))
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // h-refinement methods
    // ----------------------------------------------------------------------------------------------------

    /// Apply an [HRef] to a single [Elem], returning the IDs of its new children
    pub fn refine_elem(
        &mut self,
        elem_id: usize,
        refinement: HRef,
    ) -> Result<SmallVec<[usize; 4]>, HRefError> {
        if !self.elem_is_h_refineable(elem_id)? {
            let elem = &self.elems[elem_id];
            return Err(if elem.is_retired() {
                HRefError::ElemRetired(elem_id)
            } else if elem.has_children() {
                HRefError::ElemHasChildren(elem_id)
            } else {
                HRefError::MinEdgeLength(elem_id)
            });
        }

        let mut id_tracker = IdTracker::new(self.elems.len());
        let children = self.elems[elem_id].h_refine(refinement, &mut id_tracker)?;
        let child_ids = children.iter().map(|child| child.id).collect();
        self.elems.extend(children);

        debug!("h-Refined Elem {} ({:?})", elem_id, refinement);

        Ok(child_ids)
    }

    /// Apply an [HRef] to all [Elem]s in the Mesh that are eligible for h-refinement
    pub fn global_h_refinement(&mut self, refinement: HRef) -> Result<(), HRefError> {
        let mut refinements = Vec::new();
        for elem in self.elems.iter() {
            if self.elem_is_h_refineable(elem.id)? {
                refinements.push((elem.id, refinement));
            }
        }

        self.execute_h_refinements(refinements)
    }

    /// Apply an [HRef] to a list of [Elem]s by their ID
    pub fn h_refine_elems(&mut self, elems: Vec<usize>, refinement: HRef) -> Result<(), HRefError> {
        self.execute_h_refinements(elems.iter().map(|elem_id| (*elem_id, refinement)).collect())
    }

    /// Execute a series of [HRef]s on [Elem]s specified by their id
    ///
    /// All refinements are validated before any are applied
    pub fn execute_h_refinements(
        &mut self,
        refinements: Vec<(usize, HRef)>,
    ) -> Result<(), HRefError> {
        let mut refinements_map: BTreeMap<usize, HRef> = BTreeMap::new();
        for (elem_id, h_ref) in refinements {
            if elem_id >= self.elems.len() {
                return Err(HRefError::ElemDoesntExist(elem_id));
            }
            if refinements_map.insert(elem_id, h_ref).is_some() {
                return Err(HRefError::DoubleRefinement(elem_id));
            }
        }

        for elem_id in refinements_map.keys() {
            let elem = &self.elems[*elem_id];
            if elem.is_retired() {
                return Err(HRefError::ElemRetired(*elem_id));
            }
            if elem.has_children() {
                return Err(HRefError::ElemHasChildren(*elem_id));
            }
            if !self.elem_is_h_refineable(*elem_id)? {
                return Err(HRefError::MinEdgeLength(*elem_id));
            }
        }

        for (elem_id, refinement) in refinements_map {
            self.refine_elem(elem_id, refinement)?;
        }

        Ok(())
    }

    /// Remove the children of an [Elem], making it active again. Returns the IDs of the retired children.
    ///
    /// The children must all be active. Their IDs are not handed out again.
    pub fn unrefine_elem(&mut self, elem_id: usize) -> Result<SmallVec<[usize; 4]>, HRefError> {
        let elem = self
            .elems
            .get(elem_id)
            .ok_or(HRefError::ElemDoesntExist(elem_id))?;

        match elem.child_ids() {
            None => return Err(HRefError::ElemHasNoChildren(elem_id)),
            Some(child_ids) => {
                if child_ids.iter().any(|child_id| !self.elems[*child_id].is_active()) {
                    return Err(HRefError::NestedChildren(elem_id));
                }
            }
        }

        let child_ids = self.elems[elem_id].take_children()?;
        for child_id in child_ids.iter() {
            self.elems[*child_id].retire();
        }

        debug!("h-Unrefined Elem {}; retired {:?}", elem_id, child_ids);

        Ok(child_ids)
    }

    /// Isotropically refine active `Elem`s until no two neighboring active `Elem`s differ in depth by more than `max_level_diff`
    ///
    /// Returns a map from each newly created `Elem` to its parent
    pub fn regularize(&mut self, max_level_diff: usize) -> Result<BTreeMap<usize, usize>, HRefError> {
        let mut parents = BTreeMap::new();

        loop {
            let mut to_refine = BTreeSet::new();
            for (a, b) in self.active_adjacency() {
                let (depth_a, depth_b) = (self.elem_depth(a), self.elem_depth(b));
                let coarser = if depth_b > depth_a + max_level_diff {
                    a
                } else if depth_a > depth_b + max_level_diff {
                    b
                } else {
                    continue;
                };

                if self.elem_is_h_refineable(coarser)? {
                    to_refine.insert(coarser);
                }
            }

            if to_refine.is_empty() {
                break;
            }

            for elem_id in to_refine {
                for child_id in self.refine_elem(elem_id, HRef::T)? {
                    parents.insert(child_id, elem_id);
                }
            }
        }

        Ok(parents)
    }
}

/// Bucket key of an edge coordinate; coordinates closer than `1e-9` share a key
fn edge_key(coord: f64) -> i64 {
    (coord * 1e9).round() as i64
}

/// Length of the overlap of the intervals `[a0, a1]` and `[b0, b1]` (negative if disjoint)
fn overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    a1.min(b1) - a0.max(b0)
}

fn parse_element_information(mesh_file_json: &JsonValue, num_nodes: usize) -> Vec<([usize; 4], bool)> {
    assert!(
        mesh_file_json["Elements"].is_array(),
        "Elements must be an Array!"
    );

    mesh_file_json["Elements"]
        .members()
        .map(|json_element| {
            assert!(
                json_element["node_ids"].is_array(),
                "Elements must have an Array of node_ids!"
            );
            assert_eq!(
                json_element["node_ids"].members().count(),
                4,
                "Elements Array of node_ids must have a length of 4!"
            );

            let mut node_ids = [0; 4];
            for (idx, node_id_json) in json_element["node_ids"].members().enumerate() {
                let node_id = node_id_json
                    .as_usize()
                    .expect("node_ids must be positive integers!");
                assert!(
                    node_id < num_nodes,
                    "node_ids must be smaller than the total number of nodes!"
                );
                node_ids[idx] = node_id;
            }
            assert!(
                !has_duplicates(&node_ids),
                "Element's node_ids should have 4 unique values!"
            );

            let curved = if json_element["curved"].is_null() {
                false
            } else {
                json_element["curved"]
                    .as_bool()
                    .expect("Element's curved marker must be a boolean!")
            };

            (node_ids, curved)
        })
        .collect()
}

fn parse_node_information(mesh_file_json: &JsonValue) -> Vec<Point> {
    assert!(
        mesh_file_json["Nodes"].is_array(),
        "Nodes must be an Array!"
    );

    let node_points: Vec<Point> = mesh_file_json["Nodes"]
        .members()
        .map(|json_node_point| {
            assert!(json_node_point.is_array(), "nodes must be arrays!");
            assert_eq!(
                json_node_point.members().count(),
                2,
                "nodes must be arrays of length 2!"
            );

            let x = json_node_point[0]
                .as_f64()
                .expect("nodes must be composed of numerical values!");
            let y = json_node_point[1]
                .as_f64()
                .expect("nodes must be composed of numerical values!");

            Point::new(x, y)
        })
        .collect();

    assert!(
        !has_duplicates(&node_points),
        "All Nodes must be at unique locations!"
    );

    node_points
}

fn has_duplicates<T>(values: &[T]) -> bool
where
    T: PartialEq,
{
    for (i, val) in values.iter().enumerate() {
        for val_cmp in values.iter().skip(i + 1) {
            if val == val_cmp {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESH_A_POINTS_X: [[f64; 2]; 4] = [[0.0, 1.0], [1.0, 2.0], [0.0, 1.0], [1.0, 2.0]];
    const MESH_A_POINTS_Y: [[f64; 2]; 4] = [[0.0, 0.5], [0.0, 0.5], [0.5, 1.0], [0.5, 1.0]];

    const MESH_A_NEIGHBORS: [[usize; 2]; 4] = [[1, 2], [0, 3], [0, 3], [1, 2]];

    #[test]
    fn mesh_from_file() {
        let mesh_a = Mesh::from_file("./test_input/test_mesh_a.json").unwrap();
        assert_eq!(mesh_a.num_active_elems(), 4);
        assert_eq!(mesh_a.max_elem_id(), 4);

        for elem_id in 0..4 {
            let [min, max] = mesh_a.elem_bounds(elem_id);
            assert!((min.x - MESH_A_POINTS_X[elem_id][0]).abs() < 1e-14);
            assert!((max.x - MESH_A_POINTS_X[elem_id][1]).abs() < 1e-14);
            assert!((min.y - MESH_A_POINTS_Y[elem_id][0]).abs() < 1e-14);
            assert!((max.y - MESH_A_POINTS_Y[elem_id][1]).abs() < 1e-14);

            assert_eq!(mesh_a.active_neighbors(elem_id), MESH_A_NEIGHBORS[elem_id].to_vec());
        }

        assert!(mesh_a.elems[3].is_curved());
        assert!(!mesh_a.elems[0].is_curved());
    }

    #[test]
    fn uniform_rect_matches_file() {
        let mesh_a = Mesh::from_file("./test_input/test_mesh_a.json").unwrap();
        let rect = Mesh::uniform_rect([0.0, 2.0], [0.0, 1.0], [2, 2]);

        for elem_id in 0..4 {
            let [a_min, a_max] = mesh_a.elem_bounds(elem_id);
            let [r_min, r_max] = rect.elem_bounds(elem_id);
            assert!(a_min.dist(&r_min) < 1e-14);
            assert!(a_max.dist(&r_max) < 1e-14);
        }
    }

    #[test]
    fn basic_h_refinements() {
        let mut mesh_c = Mesh::from_file("./test_input/test_mesh_c.json").unwrap();
        mesh_c.h_refine_elems(vec![0], HRef::T).unwrap();
        mesh_c.h_refine_elems(vec![1, 2], HRef::U).unwrap();
        mesh_c.h_refine_elems(vec![3, 4], HRef::V).unwrap();

        assert_eq!(mesh_c.max_elem_id(), 13);
        assert_eq!(mesh_c.num_active_elems(), 8);
        assert_eq!(mesh_c.inactive_elem_ids(), vec![0, 1, 2, 3, 4]);
        assert_eq!(mesh_c.descendant_elems(0, false).unwrap(), vec![1, 5, 6, 2, 7, 8, 3, 9, 10, 4, 11, 12]);
        assert_eq!(mesh_c.ancestor_elems(12, true).unwrap(), vec![12, 4, 0]);
        assert_eq!(mesh_c.elem_depth(12), 2);

        // the right half of the bottom right quadrant
        let [min, max] = mesh_c.elem_bounds(8);
        assert!(min.dist(&Point::new(0.75, 0.0)) < 1e-14);
        assert!(max.dist(&Point::new(1.0, 0.5)) < 1e-14);
    }

    #[test]
    fn locate_points() {
        let mut mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 2]);
        mesh.refine_elem(3, HRef::T).unwrap();

        assert_eq!(mesh.find_active_elem(&Point::new(0.1, 0.1)), Some(0));
        assert_eq!(mesh.find_active_elem(&Point::new(0.9, 0.9)), Some(7));
        assert_eq!(mesh.find_active_elem(&Point::new(0.6, 0.6)), Some(4));
        assert_eq!(mesh.find_active_elem(&Point::new(1.5, 0.6)), None);
    }

    #[test]
    fn neighbors_across_refinement_levels() {
        let mut mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 2]);
        let children = mesh.refine_elem(3, HRef::T).unwrap();
        mesh.refine_elem(children[0], HRef::T).unwrap();

        assert_eq!(mesh.active_neighbors(1), vec![0, 5, 8, 9]);
        assert_eq!(mesh.active_neighbors(7), vec![5, 6]);
        assert_eq!(mesh.active_neighbors(4), Vec::<usize>::new());

        let pairs = mesh.active_adjacency();
        for (a, b) in pairs.iter() {
            assert!(mesh.elems[*a].is_active() && mesh.elems[*b].is_active());
            assert_eq!(
                pairs.iter().filter(|(c, d)| (c, d) == (a, b) || (c, d) == (b, a)).count(),
                1
            );
        }
        assert_eq!(mesh.max_irregularity(), 2);
    }

    #[test]
    fn unrefinement() {
        let mut mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [1, 1]);
        mesh.refine_elem(0, HRef::T).unwrap();
        mesh.refine_elem(1, HRef::U).unwrap();

        assert_eq!(mesh.unrefine_elem(0).unwrap_err(), HRefError::NestedChildren(0));
        assert_eq!(mesh.unrefine_elem(1).unwrap().to_vec(), vec![5, 6]);
        assert_eq!(mesh.unrefine_elem(0).unwrap().to_vec(), vec![1, 2, 3, 4]);

        assert_eq!(mesh.num_active_elems(), 1);
        assert_eq!(mesh.max_elem_id(), 7);
        assert_eq!(mesh.refine_elem(2, HRef::T).unwrap_err(), HRefError::ElemRetired(2));

        // new children get fresh ids
        assert_eq!(mesh.refine_elem(0, HRef::V).unwrap().to_vec(), vec![7, 8]);
    }

    #[test]
    fn regularization_bounds_level_difference() {
        let mut mesh = Mesh::uniform_rect([0.0, 1.0], [0.0, 1.0], [2, 2]);

        // repeatedly refine toward the center of the mesh
        let mut corner = 0;
        for _ in 0..3 {
            corner = mesh.refine_elem(corner, HRef::T).unwrap()[3];
        }
        assert_eq!(mesh.max_irregularity(), 3);

        let parents = mesh.regularize(1).unwrap();
        assert!(mesh.max_irregularity() <= 1);
        assert!(!parents.is_empty());
        for (child, parent) in parents {
            assert_eq!(mesh.elems[child].parent_id(), Some(parent));
        }
    }

    #[cfg(feature = "json_export")]
    #[test]
    fn refined_mesh_to_file() {
        let mut mesh_b = Mesh::from_file("./test_input/test_mesh_b.json").unwrap();
        mesh_b
            .execute_h_refinements(vec![(0, HRef::T), (1, HRef::U), (2, HRef::V)])
            .unwrap();

        std::fs::create_dir_all("./test_output").unwrap();
        mesh_b
            .export_to_json("./test_output/mesh_b_refined.json")
            .unwrap();
    }

    #[test]
    fn h_refine_non_existent() {
        let mut mesh_c = Mesh::from_file("./test_input/test_mesh_c.json").unwrap();
        assert_eq!(
            mesh_c.h_refine_elems(vec![0, 1], HRef::T),
            Err(HRefError::ElemDoesntExist(1))
        );
    }

    #[test]
    #[should_panic]
    fn h_refine_elem_with_children() {
        let mut mesh_c = Mesh::from_file("./test_input/test_mesh_c.json").unwrap();
        mesh_c.h_refine_elems(vec![0], HRef::T).unwrap();
        mesh_c.h_refine_elems(vec![0], HRef::T).unwrap();
    }

    #[test]
    #[should_panic]
    fn double_h_refinement() {
        let mut mesh_a = Mesh::from_file("./test_input/test_mesh_a.json").unwrap();
        mesh_a
            .execute_h_refinements(vec![(0, HRef::T), (1, HRef::T), (0, HRef::U)])
            .unwrap();
    }

    #[test]
    #[should_panic]
    fn minimum_edge_length_exceeded() {
        let mut mesh_c = Mesh::from_file("./test_input/test_mesh_c.json").unwrap();

        // repeatedly refine the bottom left cell
        let mut corner = 0;
        for _ in 0..18 {
            corner = mesh_c.refine_elem(corner, HRef::T).unwrap()[0];
        }
    }

    #[test]
    #[should_panic]
    fn bad_mesh_file_orientation() {
        Mesh::from_file("./test_input/test_mesh_bad.json").unwrap();
    }
}
