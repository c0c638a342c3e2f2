//! Approximate nearest-neighbour index over encoded reference profiles.
//!
//! The index is a Hierarchical Navigable Small World graph (Malkov & Yashunin,
//! <https://arxiv.org/abs/1603.09320>) whose distance is the Hamming proxy:
//! the number of loci whose encoded values differ. The missing sentinel is
//! compared like any other value, so the proxy over-counts loci missing on one
//! side. Exact gap-aware scoring of the shortlist happens afterwards.
//!
//! The index stores only the graph. Vectors are read from a [`VectorSource`]
//! (normally the reference profiles) at build and search time, and node `i`
//! is always the vector at position `i`.
//!
//! Construction is deterministic for a given seed and insertion order, and
//! search breaks distance ties by node position.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ReferenceProfile;

/// Default maximum number of links per node above layer 0
pub const DEFAULT_M: usize = 16;

/// Default candidate list size while inserting
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default seed for level sampling
pub const DEFAULT_SEED: u64 = 0x5eed_cc01;

/// Upper bound on the number of layers
const MAX_LEVEL: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Vector {position} has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid index parameters: {0}")]
    InvalidParams(String),

    #[error("Corrupt index: {0}")]
    Corrupt(String),
}

/// Access to the vectors an index is built over
pub trait VectorSource {
    fn vector_count(&self) -> usize;

    /// Vector at `position`; positions are `0..vector_count()`
    fn vector(&self, position: usize) -> &[u32];
}

impl VectorSource for [ReferenceProfile] {
    fn vector_count(&self) -> usize {
        self.len()
    }

    fn vector(&self, position: usize) -> &[u32] {
        &self[position].alleles
    }
}

impl VectorSource for [Vec<u32>] {
    fn vector_count(&self) -> usize {
        self.len()
    }

    fn vector(&self, position: usize) -> &[u32] {
        &self[position]
    }
}

/// Hamming distance between two encoded profiles
#[must_use]
pub fn proxy_distance(a: &[u32], b: &[u32]) -> u32 {
    let differing = a.iter().zip(b).filter(|(x, y)| x != y).count();
    u32::try_from(differing).unwrap_or(u32::MAX)
}

/// HNSW construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    /// Links per node on upper layers; layer 0 allows twice as many
    pub m: usize,
    /// Candidate list size while inserting
    pub ef_construction: usize,
    /// Seed for level sampling
    pub seed: u64,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            seed: DEFAULT_SEED,
        }
    }
}

/// A shortlisted reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchHit {
    /// Hamming proxy distance to the query
    pub proxy_distance: u32,
    /// Position of the reference in the database
    pub position: usize,
}

/// Graph node ordered by (distance, node) so ties resolve deterministically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Neighbor {
    distance: u32,
    node: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityIndex {
    params: IndexParams,
    dimensions: usize,
    missing_allele: u32,
    /// `links[node][level]` lists the neighbours of `node` on `level`
    links: Vec<Vec<Vec<u32>>>,
    entry_point: Option<u32>,
    max_level: usize,
}

impl SimilarityIndex {
    /// Build an index over every vector in `source`, inserting in position order.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are unusable, a vector does not have
    /// `dimensions` values, or there are more vectors than `u32` node IDs.
    pub fn build<S>(
        source: &S,
        dimensions: usize,
        missing_allele: u32,
        params: IndexParams,
    ) -> Result<Self, IndexError>
    where
        S: VectorSource + ?Sized,
    {
        if params.m < 2 {
            return Err(IndexError::InvalidParams(format!(
                "m must be at least 2, got {}",
                params.m
            )));
        }
        if params.ef_construction == 0 {
            return Err(IndexError::InvalidParams(
                "ef_construction must be positive".to_string(),
            ));
        }

        let count = source.vector_count();
        let node_count = u32::try_from(count).map_err(|_| {
            IndexError::InvalidParams(format!("{count} vectors exceed the index capacity"))
        })?;
        for position in 0..count {
            let found = source.vector(position).len();
            if found != dimensions {
                return Err(IndexError::DimensionMismatch {
                    position,
                    expected: dimensions,
                    found,
                });
            }
        }

        let mut index = Self {
            params,
            dimensions,
            missing_allele,
            links: Vec::with_capacity(count),
            entry_point: None,
            max_level: 0,
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let level_scale = 1.0 / (params.m as f64).ln();

        for node in 0..node_count {
            let level = random_level(&mut rng, level_scale);
            index.insert(source, node, level);
        }

        Ok(index)
    }

    #[must_use]
    pub fn params(&self) -> IndexParams {
        self.params
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Sentinel the indexed vectors use for missing loci
    #[must_use]
    pub fn missing_allele(&self) -> u32 {
        self.missing_allele
    }

    /// Number of indexed vectors
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Number of layers above layer 0
    #[must_use]
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Find up to `k` approximate nearest neighbours of `query`, closest first.
    ///
    /// `ef` is the search breadth and is raised to `k` when smaller.
    #[must_use]
    pub fn search<S>(&self, source: &S, query: &[u32], k: usize, ef: usize) -> Vec<SearchHit>
    where
        S: VectorSource + ?Sized,
    {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 || query.len() != self.dimensions {
            return Vec::new();
        }

        let mut current = Neighbor {
            distance: proxy_distance(query, source.vector(entry as usize)),
            node: entry,
        };
        for level in (1..=self.max_level).rev() {
            current = self.greedy_closest(source, query, current, level);
        }

        let mut found = self.search_layer(source, query, &[current], ef.max(k), 0);
        found.truncate(k);
        found
            .into_iter()
            .map(|n| SearchHit {
                proxy_distance: n.distance,
                position: n.node as usize,
            })
            .collect()
    }

    /// Check the graph against the vectors it will be searched with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first structural problem found.
    pub fn validate<S>(&self, source: &S) -> Result<(), IndexError>
    where
        S: VectorSource + ?Sized,
    {
        let count = self.links.len();
        if source.vector_count() != count {
            return Err(IndexError::Corrupt(format!(
                "index has {count} nodes but there are {} vectors",
                source.vector_count()
            )));
        }

        match self.entry_point {
            None if count > 0 => {
                return Err(IndexError::Corrupt("missing entry point".to_string()));
            }
            Some(entry) if entry as usize >= count => {
                return Err(IndexError::Corrupt(format!(
                    "entry point {entry} out of range"
                )));
            }
            Some(entry) if self.links[entry as usize].len() != self.max_level + 1 => {
                return Err(IndexError::Corrupt(
                    "entry point is not on the top layer".to_string(),
                ));
            }
            _ => {}
        }

        for (node, layers) in self.links.iter().enumerate() {
            if layers.is_empty() || layers.len() > self.max_level + 1 {
                return Err(IndexError::Corrupt(format!(
                    "node {node} has {} layers",
                    layers.len()
                )));
            }
            for (level, neighbors) in layers.iter().enumerate() {
                let reaches_missing_layer = neighbors.iter().any(|&n| {
                    self.links
                        .get(n as usize)
                        .map_or(true, |other| other.len() <= level)
                });
                if reaches_missing_layer {
                    return Err(IndexError::Corrupt(format!(
                        "node {node} links to a node absent from layer {level}"
                    )));
                }
            }
        }

        for position in 0..count {
            let found = source.vector(position).len();
            if found != self.dimensions {
                return Err(IndexError::DimensionMismatch {
                    position,
                    expected: self.dimensions,
                    found,
                });
            }
        }

        Ok(())
    }

    fn max_links(&self, level: usize) -> usize {
        if level == 0 {
            self.params.m * 2
        } else {
            self.params.m
        }
    }

    fn neighbors(&self, node: u32, level: usize) -> &[u32] {
        self.links
            .get(node as usize)
            .and_then(|layers| layers.get(level))
            .map_or(&[], Vec::as_slice)
    }

    fn insert<S>(&mut self, source: &S, node: u32, level: usize)
    where
        S: VectorSource + ?Sized,
    {
        self.links.push(vec![Vec::new(); level + 1]);

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(node);
            self.max_level = level;
            return;
        };

        let query = source.vector(node as usize);
        let mut current = Neighbor {
            distance: proxy_distance(query, source.vector(entry as usize)),
            node: entry,
        };
        for lc in (level + 1..=self.max_level).rev() {
            current = self.greedy_closest(source, query, current, lc);
        }

        let mut entry_points = vec![current];
        for lc in (0..=level.min(self.max_level)).rev() {
            let found =
                self.search_layer(source, query, &entry_points, self.params.ef_construction, lc);

            let selected = select_neighbors(source, &found, self.params.m);

            let max_links = self.max_links(lc);
            for &neighbor in &selected {
                let links = &mut self.links[neighbor as usize][lc];
                links.push(node);
                if links.len() > max_links {
                    self.prune(source, neighbor, lc, max_links);
                }
            }
            self.links[node as usize][lc] = selected;
            entry_points = found;
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(node);
        }
    }

    /// Shrink the links of `node` on `level` to `max_links`
    fn prune<S>(&mut self, source: &S, node: u32, level: usize, max_links: usize)
    where
        S: VectorSource + ?Sized,
    {
        let base = source.vector(node as usize);
        let mut ranked: Vec<Neighbor> = self.links[node as usize][level]
            .iter()
            .map(|&n| Neighbor {
                distance: proxy_distance(base, source.vector(n as usize)),
                node: n,
            })
            .collect();
        ranked.sort_unstable();
        self.links[node as usize][level] = select_neighbors(source, &ranked, max_links);
    }

    /// Walk to the closest node on a layer by steepest descent
    fn greedy_closest<S>(&self, source: &S, query: &[u32], start: Neighbor, level: usize) -> Neighbor
    where
        S: VectorSource + ?Sized,
    {
        let mut current = start;
        loop {
            let mut improved = false;
            for &n in self.neighbors(current.node, level) {
                let candidate = Neighbor {
                    distance: proxy_distance(query, source.vector(n as usize)),
                    node: n,
                };
                if candidate < current {
                    current = candidate;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Best-first search of one layer, returning up to `ef` nodes closest first
    fn search_layer<S>(
        &self,
        source: &S,
        query: &[u32],
        entry_points: &[Neighbor],
        ef: usize,
        level: usize,
    ) -> Vec<Neighbor>
    where
        S: VectorSource + ?Sized,
    {
        let mut visited: HashSet<u32> = entry_points.iter().map(|n| n.node).collect();
        let mut candidates: BinaryHeap<Reverse<Neighbor>> =
            entry_points.iter().copied().map(Reverse).collect();
        let mut results: BinaryHeap<Neighbor> = entry_points.iter().copied().collect();
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = candidates.pop() {
            let furthest = results.peek().map_or(u32::MAX, |n| n.distance);
            if current.distance > furthest && results.len() >= ef {
                break;
            }

            for &n in self.neighbors(current.node, level) {
                if !visited.insert(n) {
                    continue;
                }
                let candidate = Neighbor {
                    distance: proxy_distance(query, source.vector(n as usize)),
                    node: n,
                };
                let admit = results.len() < ef || results.peek().is_some_and(|worst| candidate < *worst);
                if admit {
                    candidates.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }
}

/// Pick up to `limit` links from `candidates`, which are sorted closest first.
///
/// A candidate is linked only if it is closer to the base node than to every
/// candidate already linked, so links spread across clusters instead of all
/// landing in the nearest one (Malkov & Yashunin, algorithm 4). Remaining
/// slots are filled with the closest rejected candidates.
fn select_neighbors<S>(source: &S, candidates: &[Neighbor], limit: usize) -> Vec<u32>
where
    S: VectorSource + ?Sized,
{
    let mut selected: Vec<Neighbor> = Vec::with_capacity(limit);
    let mut rejected: Vec<Neighbor> = Vec::new();
    for &candidate in candidates {
        if selected.len() >= limit {
            break;
        }
        let vector = source.vector(candidate.node as usize);
        let spreads = selected
            .iter()
            .all(|kept| candidate.distance < proxy_distance(vector, source.vector(kept.node as usize)));
        if spreads {
            selected.push(candidate);
        } else {
            rejected.push(candidate);
        }
    }

    let spare = limit - selected.len();
    selected
        .iter()
        .chain(rejected.iter().take(spare))
        .map(|n| n.node)
        .collect()
}

fn random_level(rng: &mut StdRng, scale: f64) -> usize {
    // Uniform on (0, 1] so the logarithm stays finite
    let uniform: f64 = 1.0 - rng.random::<f64>();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let level = (-uniform.ln() * scale).floor() as usize;
    level.min(MAX_LEVEL)
}
