use super::GeometryError;
use super::distances::structure_distances;
use super::lattice;
use crate::core::elements;
use crate::core::models::structure::Structure;
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;
use tracing::{debug, instrument};

const ORGANIC_PARTNERS: [&str; 5] = ["H", "O", "N", "S", "P"];

/// Per-atom bonding cutoffs derived from covalent radii.
///
/// Atom `i` reaches `r_i × mult + skin`; two atoms are bonded when their
/// distance is below the sum of both reaches.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NaturalCutoffs {
    pub mult: f64,
    pub skin: f64,
}

impl Default for NaturalCutoffs {
    fn default() -> Self {
        Self {
            mult: 1.0,
            skin: 0.3,
        }
    }
}

impl NaturalCutoffs {
    fn reaches(&self, structure: &Structure) -> Result<Vec<f64>, GeometryError> {
        Ok(elements::covalent_radii(structure.species())?
            .into_iter()
            .map(|r| r * self.mult + self.skin)
            .collect())
    }
}

/// Connected atom groups of a structure together with their organic flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Clusters {
    /// Atom indices per cluster, ascending; clusters ordered by their lowest index.
    pub members: Vec<Vec<usize>>,
    pub is_organic: Vec<bool>,
}

impl Clusters {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[usize], bool)> {
        self.members
            .iter()
            .map(Vec::as_slice)
            .zip(self.is_organic.iter().copied())
    }

    pub fn organic_count(&self) -> usize {
        self.is_organic.iter().filter(|&&organic| organic).count()
    }
}

/// Groups atoms into bonded clusters using [`NaturalCutoffs::default`].
pub fn connected_clusters(structure: &Structure) -> Result<Clusters, GeometryError> {
    connected_clusters_with(structure, &NaturalCutoffs::default())
}

#[instrument(skip_all, name = "connected_clusters")]
pub fn connected_clusters_with(
    structure: &Structure,
    cutoffs: &NaturalCutoffs,
) -> Result<Clusters, GeometryError> {
    let reaches = cutoffs.reaches(structure)?;
    let distances = structure_distances(structure)?;

    let mut sets = DisjointSets::new(structure.num_atoms());
    for (i, j) in (0..structure.num_atoms()).tuple_combinations() {
        if distances[(i, j)] < reaches[i] + reaches[j] {
            sets.union(i, j);
        }
    }

    let members = sets.groups();
    let is_organic = members
        .iter()
        .map(|group| is_organic_cluster(group.iter().map(|&i| structure.species()[i].as_str())))
        .collect();
    debug!(num_clusters = members.len(), "Cluster detection complete.");

    Ok(Clusters {
        members,
        is_organic,
    })
}

/// A cluster is organic when it holds carbon and at least one of H, O, N, S or P.
pub fn is_organic_cluster<'a>(symbols: impl IntoIterator<Item = &'a str>) -> bool {
    let mut has_carbon = false;
    let mut has_partner = false;
    for symbol in symbols {
        has_carbon |= symbol == "C";
        has_partner |= ORGANIC_PARTNERS.contains(&symbol);
    }
    has_carbon && has_partner
}

/// Reassembles a cluster split by the periodic boundary.
///
/// The first index is the reference atom; every other atom is moved to the
/// image of itself nearest to the reference. Returns the Cartesian
/// positions in the order of `cluster`.
pub fn unwrap_cluster(
    structure: &Structure,
    cluster: &[usize],
) -> Result<Vec<Vector3<f64>>, GeometryError> {
    let lattice = structure.require_lattice()?;
    let num_atoms = structure.num_atoms();
    if let Some(&index) = cluster.iter().find(|&&i| i >= num_atoms) {
        return Err(GeometryError::InvalidCluster { index, num_atoms });
    }
    let Some(&first) = cluster.first() else {
        return Ok(Vec::new());
    };
    let to_fractional = lattice::fractional_matrix(lattice).ok_or(GeometryError::SingularLattice)?;

    let positions = structure.positions();
    let reference = positions[first];
    Ok(cluster
        .iter()
        .map(|&i| {
            let frac = to_fractional * (positions[i] - reference);
            let nearest = frac.map(|x| x - x.round());
            reference + lattice::to_cartesian(lattice, &nearest)
        })
        .collect())
}

/// Replaces the cell while moving every organic molecule rigidly.
///
/// Each organic cluster is unwrapped, its centroid is kept at the same
/// fractional coordinate in the new cell, and its internal geometry is left
/// unscaled. All other atoms scale with the cell. The result is wrapped
/// into the new cell.
#[instrument(skip_all, name = "scale_lattice_keeping_molecules")]
pub fn scale_lattice_keeping_molecules(
    structure: &Structure,
    new_lattice: Matrix3<f64>,
) -> Result<Structure, GeometryError> {
    let clusters = connected_clusters(structure)?;
    let mut scaled = structure.with_lattice(new_lattice)?;
    let old_to_fractional = structure
        .lattice()
        .and_then(lattice::fractional_matrix)
        .ok_or(GeometryError::SingularLattice)?;

    for (members, organic) in clusters.iter() {
        if !organic {
            continue;
        }
        let unwrapped = unwrap_cluster(structure, members)?;
        let centroid = unwrapped.iter().sum::<Vector3<f64>>() / unwrapped.len() as f64;
        let centroid_frac = lattice::wrap_fractional(&(old_to_fractional * centroid));
        let new_centroid = lattice::to_cartesian(&new_lattice, &centroid_frac);

        let positions = scaled.positions_mut();
        for (&atom, position) in members.iter().zip(&unwrapped) {
            positions[atom] = new_centroid + (position - centroid);
        }
    }

    scaled.wrap_positions()?;
    Ok(scaled)
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // lowest index becomes the root
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }

    fn groups(mut self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut slot_of_root = vec![usize::MAX; self.parent.len()];
        for i in 0..self.parent.len() {
            let root = self.find(i);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot_of_root[root]].push(i);
        }
        groups
    }
}
