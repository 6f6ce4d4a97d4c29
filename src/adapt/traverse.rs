use crate::domain::mesh::{
    geometry::{Point, GEOMETRIC_TOLERANCE},
    Mesh,
};
use crate::error::AdaptError;

use smallvec::SmallVec;

/// One region of the common refinement of several Meshes
///
/// `elems[k]` is the active `Elem` of the k'th Mesh covering `bounds`
#[derive(Clone, Debug)]
pub struct TraversalLeaf {
    pub bounds: [Point; 2],
    pub elems: SmallVec<[usize; 8]>,
}

/// Partition the region covered by several Meshes into the largest rectangles that lie inside exactly one active `Elem` of every Mesh
///
/// All Meshes must be built over the same set of `Element`s
pub fn multi_mesh_leaves(meshes: &[&Mesh]) -> Result<Vec<TraversalLeaf>, AdaptError> {
    let first = match meshes.first() {
        Some(mesh) => mesh,
        None => return Ok(Vec::new()),
    };

    for (k, mesh) in meshes.iter().enumerate().skip(1) {
        let compatible = mesh.elements.len() == first.elements.len()
            && mesh
                .elements
                .iter()
                .zip(first.elements.iter())
                .all(|(a, b)| a.points[0].dist(&b.points[0]) < GEOMETRIC_TOLERANCE
                    && a.points[3].dist(&b.points[3]) < GEOMETRIC_TOLERANCE);

        if !compatible {
            return Err(AdaptError::IncompatibleMeshes(0, k));
        }
    }

    let mut leaves = Vec::new();
    for base_id in 0..first.elements.len() {
        let elems: SmallVec<[usize; 8]> = meshes.iter().map(|_| base_id).collect();
        descend(meshes, elems, first.elem_bounds(base_id), &mut leaves);
    }

    Ok(leaves)
}

fn descend(
    meshes: &[&Mesh],
    elems: SmallVec<[usize; 8]>,
    bounds: [Point; 2],
    leaves: &mut Vec<TraversalLeaf>,
) {
    let split = meshes
        .iter()
        .zip(elems.iter())
        .enumerate()
        .find_map(|(k, (mesh, elem_id))| mesh.elems[*elem_id].child_ids().map(|children| (k, children)));

    match split {
        None => leaves.push(TraversalLeaf { bounds, elems }),
        Some((k, children)) => {
            for child_id in children {
                if let Some(sub_bounds) = intersection(&bounds, &meshes[k].elem_bounds(child_id)) {
                    let mut sub_elems = elems.clone();
                    sub_elems[k] = child_id;
                    descend(meshes, sub_elems, sub_bounds, leaves);
                }
            }
        }
    }
}

fn intersection([a_min, a_max]: &[Point; 2], [b_min, b_max]: &[Point; 2]) -> Option<[Point; 2]> {
    let min = Point::new(a_min.x.max(b_min.x), a_min.y.max(b_min.y));
    let max = Point::new(a_max.x.min(b_max.x), a_max.y.min(b_max.y));

    if max.x - min.x > GEOMETRIC_TOLERANCE && max.y - min.y > GEOMETRIC_TOLERANCE {
        Some([min, max])
    } else {
        None
    }
}
