//! Incremental Delaunay triangulation (Bowyer–Watson).
//!
//! The hull is closed by "ghost" triangles that share a symbolic vertex at
//! infinity, so no bounding super-triangle is needed and hull edges are never
//! lost. A ghost `[u, v, INFINITE]` has the outside of the hull on the left of
//! `u -> v`. Predicates are evaluated in plain `f64`, which is exact for the
//! small integer lattice coordinates produced by the layout.

use std::collections::HashMap;

use super::FieldError;

pub(crate) type Point = [f64; 2];

const INFINITE: usize = usize::MAX;

/// Tolerance on barycentric coordinates when locating a point.
const LOCATE_EPS: f64 = 100.0 * f64::EPSILON;

#[derive(Debug, Clone)]
pub(crate) struct Triangulation {
    points: Vec<Point>,
    /// Counter-clockwise vertex triples.
    triangles: Vec<[usize; 3]>,
    /// `neighbors[t][k]` is the triangle across the edge opposite vertex `k`.
    neighbors: Vec<[Option<usize>; 3]>,
}

/// Twice the signed area of `abc`; positive when counter-clockwise.
pub(crate) fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Positive when `d` lies strictly inside the circumcircle of CCW `abc`.
fn in_circle(a: Point, b: Point, c: Point, d: Point) -> f64 {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx)
}

/// `p` is on segment `ab`, excluding the end points. Assumes collinearity.
fn strictly_between(a: Point, b: Point, p: Point) -> bool {
    let dot = (p[0] - a[0]) * (b[0] - a[0]) + (p[1] - a[1]) * (b[1] - a[1]);
    let len2 = (b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2);
    dot > 0.0 && dot < len2
}

/// Rotates a triple so the infinite vertex, if any, comes last.
fn normalize(t: [usize; 3]) -> [usize; 3] {
    match t {
        [INFINITE, b, c] => [b, c, INFINITE],
        [a, INFINITE, c] => [c, a, INFINITE],
        other => other,
    }
}

impl Triangulation {
    /// Triangulates `points`. Needs at least three points that are not all
    /// collinear; exact duplicates are ignored.
    pub(crate) fn new(points: Vec<Point>) -> Result<Self, FieldError> {
        let found = points.len();
        let a = 0;
        let b = (1..found)
            .find(|&j| points[j] != points[a])
            .ok_or(FieldError::DegenerateSamples { found })?;
        let c = (1..found)
            .find(|&k| orient(points[a], points[b], points[k]) != 0.0)
            .ok_or(FieldError::DegenerateSamples { found })?;
        let (b, c) = if orient(points[a], points[b], points[c]) > 0.0 {
            (b, c)
        } else {
            (c, b)
        };

        let mut triangles = vec![
            [a, b, c],
            [b, a, INFINITE],
            [c, b, INFINITE],
            [a, c, INFINITE],
        ];

        for p in 0..found {
            if p == a || p == b || p == c {
                continue;
            }
            insert(&points, &mut triangles, p);
        }

        triangles.retain(|t| !t.contains(&INFINITE));
        let neighbors = link_neighbors(&triangles);

        Ok(Self {
            points,
            triangles,
            neighbors,
        })
    }

    pub(crate) fn points(&self) -> &[Point] {
        &self.points
    }

    pub(crate) fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub(crate) fn neighbors(&self, triangle: usize) -> [Option<usize>; 3] {
        self.neighbors[triangle]
    }

    pub(crate) fn vertices(&self, triangle: usize) -> [Point; 3] {
        let [i, j, k] = self.triangles[triangle];
        [self.points[i], self.points[j], self.points[k]]
    }

    /// Barycentric coordinates of `p` with respect to `triangle`; not clamped.
    pub(crate) fn barycentric(&self, triangle: usize, p: Point) -> [f64; 3] {
        let [a, b, c] = self.vertices(triangle);
        let area = orient(a, b, c);
        [
            orient(b, c, p) / area,
            orient(c, a, p) / area,
            orient(a, b, p) / area,
        ]
    }

    /// First triangle containing `p` (edges included), with its barycentric
    /// coordinates. `None` outside the convex hull.
    pub(crate) fn locate(&self, p: Point) -> Option<(usize, [f64; 3])> {
        (0..self.triangles.len()).find_map(|t| {
            let bary = self.barycentric(t, p);
            bary.iter()
                .all(|&w| w >= -LOCATE_EPS)
                .then_some((t, bary))
        })
    }

    /// Distinct vertices sharing an edge with each vertex.
    pub(crate) fn vertex_neighbors(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.points.len()];
        for &[i, j, k] in &self.triangles {
            for (u, v) in [(i, j), (j, k), (k, i)] {
                if !adjacency[u].contains(&v) {
                    adjacency[u].push(v);
                }
                if !adjacency[v].contains(&u) {
                    adjacency[v].push(u);
                }
            }
        }
        adjacency
    }

    #[cfg(test)]
    pub(crate) fn total_area(&self) -> f64 {
        (0..self.triangles.len())
            .map(|t| {
                let [a, b, c] = self.vertices(t);
                orient(a, b, c) / 2.0
            })
            .sum()
    }
}

fn in_conflict(points: &[Point], t: [usize; 3], p: Point) -> bool {
    if t[2] == INFINITE {
        let (u, v) = (points[t[0]], points[t[1]]);
        let side = orient(u, v, p);
        side > 0.0 || (side == 0.0 && strictly_between(u, v, p))
    } else {
        in_circle(points[t[0]], points[t[1]], points[t[2]], p) > 0.0
    }
}

fn insert(points: &[Point], triangles: &mut Vec<[usize; 3]>, p: usize) {
    let point = points[p];
    let conflicts: Vec<bool> = triangles
        .iter()
        .map(|&t| in_conflict(points, t, point))
        .collect();
    if !conflicts.iter().any(|&c| c) {
        // Duplicate of an existing vertex.
        return;
    }

    let cavity_edges: Vec<(usize, usize)> = triangles
        .iter()
        .zip(&conflicts)
        .filter(|(_, c)| **c)
        .flat_map(|(&[i, j, k], _)| [(i, j), (j, k), (k, i)])
        .collect();
    let boundary: Vec<(usize, usize)> = cavity_edges
        .iter()
        .copied()
        .filter(|&(u, v)| !cavity_edges.contains(&(v, u)))
        .collect();

    let mut keep = conflicts.iter().map(|&c| !c);
    triangles.retain(|_| keep.next().unwrap_or(true));
    triangles.extend(boundary.into_iter().map(|(u, v)| normalize([u, v, p])));
}

fn link_neighbors(triangles: &[[usize; 3]]) -> Vec<[Option<usize>; 3]> {
    let mut by_edge: HashMap<(usize, usize), usize> = HashMap::with_capacity(triangles.len() * 3);
    for (t, &[i, j, k]) in triangles.iter().enumerate() {
        by_edge.insert((i, j), t);
        by_edge.insert((j, k), t);
        by_edge.insert((k, i), t);
    }
    triangles
        .iter()
        .map(|&[i, j, k]| {
            [
                by_edge.get(&(k, j)).copied(),
                by_edge.get(&(i, k)).copied(),
                by_edge.get(&(j, i)).copied(),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lattice(rows: usize, cols: usize) -> Vec<Point> {
        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| [r as f64, c as f64]))
            .collect()
    }

    /// Andrew's monotone chain, for checking hull coverage.
    fn hull_area(points: &[Point]) -> f64 {
        let mut pts = points.to_vec();
        pts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        pts.dedup();
        let mut hull: Vec<Point> = Vec::new();
        for pass in 0..2 {
            let start = hull.len();
            let iter: Box<dyn Iterator<Item = &Point>> = if pass == 0 {
                Box::new(pts.iter())
            } else {
                Box::new(pts.iter().rev())
            };
            for &p in iter {
                while hull.len() >= start + 2
                    && orient(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
                {
                    hull.pop();
                }
                hull.push(p);
            }
            hull.pop();
        }
        let n = hull.len();
        (0..n)
            .map(|i| {
                let (a, b) = (hull[i], hull[(i + 1) % n]);
                a[0] * b[1] - b[0] * a[1]
            })
            .sum::<f64>()
            / 2.0
    }

    #[test]
    fn square_splits_into_two_triangles() {
        let tri = Triangulation::new(lattice(2, 2)).unwrap();
        assert_eq!(tri.triangles().len(), 2);
        assert_relative_eq!(tri.total_area(), 1.0);
    }

    #[test]
    fn triangles_are_counter_clockwise() {
        let tri = Triangulation::new(lattice(4, 5)).unwrap();
        for t in 0..tri.triangles().len() {
            let [a, b, c] = tri.vertices(t);
            assert!(orient(a, b, c) > 0.0);
        }
    }

    #[test]
    fn covers_convex_hull_of_pyramid() {
        // Occupied columns of the five-level layout, per row.
        let points: Vec<Point> = [(0, 0..5), (1, 0..4), (2, 1..4), (3, 1..3), (4, 2..3)]
            .into_iter()
            .flat_map(|(row, cols)| cols.map(move |col| [row as f64, col as f64]))
            .collect();
        let expected = hull_area(&points);
        let tri = Triangulation::new(points).unwrap();
        assert_relative_eq!(tri.total_area(), expected, epsilon = 1e-12);
    }

    #[test]
    fn covers_wide_lattice() {
        let points = lattice(3, 12);
        let tri = Triangulation::new(points).unwrap();
        assert_relative_eq!(tri.total_area(), 2.0 * 11.0, epsilon = 1e-9);
        assert_eq!(tri.triangles().len(), 2 * 2 * 11);
    }

    #[test]
    fn empty_circumcircle_property() {
        let points = lattice(4, 4)
            .into_iter()
            .chain([[0.5, 2.5], [2.2, 1.1]])
            .collect::<Vec<_>>();
        let tri = Triangulation::new(points).unwrap();
        for &[i, j, k] in tri.triangles() {
            for (p, &point) in tri.points().iter().enumerate() {
                if p == i || p == j || p == k {
                    continue;
                }
                let pts = tri.points();
                assert!(in_circle(pts[i], pts[j], pts[k], point) <= 1e-9);
            }
        }
    }

    #[test]
    fn neighbors_are_symmetric() {
        let tri = Triangulation::new(lattice(3, 3)).unwrap();
        for t in 0..tri.triangles().len() {
            for n in tri.neighbors(t).into_iter().flatten() {
                assert!(tri.neighbors(n).contains(&Some(t)));
            }
        }
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let points = vec![[0.0, 0.0], [0.0, 1.0], [0.0, 2.0], [0.0, 3.0]];
        assert!(matches!(
            Triangulation::new(points),
            Err(FieldError::DegenerateSamples { found: 4 })
        ));
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut points = lattice(2, 2);
        points.push([1.0, 1.0]);
        let tri = Triangulation::new(points).unwrap();
        assert_relative_eq!(tri.total_area(), 1.0);
        assert!(tri.vertex_neighbors()[4].is_empty());
    }

    #[test]
    fn locate_inside_and_outside() {
        let tri = Triangulation::new(vec![[0.0, 0.0], [0.0, 2.0], [2.0, 0.0]]).unwrap();
        let (_, bary) = tri.locate([0.5, 0.5]).unwrap();
        assert_relative_eq!(bary.iter().sum::<f64>(), 1.0);
        assert!(tri.locate([0.0, 1.0]).is_some());
        assert!(tri.locate([1.5, 1.5]).is_none());
        assert!(tri.locate([-0.1, 0.5]).is_none());
    }
}
