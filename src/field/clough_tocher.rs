//! Piecewise-cubic C1 interpolation over a triangulation.
//!
//! Each triangle is split at its centroid into three cubic Bézier patches
//! (Clough–Tocher). Vertex gradients come from a global estimate that
//! minimises the second derivative along every edge.

use super::delaunay::{Point, Triangulation};

const GRADIENT_MAX_SWEEPS: usize = 400;
const GRADIENT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub(crate) struct CloughTocher {
    tri: Triangulation,
    values: Vec<f64>,
    gradients: Vec<[f64; 2]>,
}

impl CloughTocher {
    /// `values[i]` is the sample at `tri.points()[i]`.
    pub(crate) fn new(tri: Triangulation, values: Vec<f64>) -> Self {
        let gradients = estimate_gradients(&tri, &values);
        Self {
            tri,
            values,
            gradients,
        }
    }

    /// Interpolated value at `p`, `None` outside the convex hull.
    pub(crate) fn evaluate(&self, p: Point) -> Option<f64> {
        let (triangle, bary) = self.tri.locate(p)?;
        Some(self.evaluate_in(triangle, bary))
    }

    fn evaluate_in(&self, triangle: usize, b: [f64; 3]) -> f64 {
        let [i1, i2, i3] = self.tri.triangles()[triangle];
        let [p1, p2, p3] = self.tri.vertices(triangle);
        let (f1, f2, f3) = (self.values[i1], self.values[i2], self.values[i3]);
        let (g1, g2, g3) = (self.gradients[i1], self.gradients[i2], self.gradients[i3]);

        let e12 = sub(p2, p1);
        let e23 = sub(p3, p2);
        let e31 = sub(p1, p3);

        // Directional derivatives along the edges at each end.
        let df12 = dot(g1, e12);
        let df21 = -dot(g2, e12);
        let df23 = dot(g2, e23);
        let df32 = -dot(g3, e23);
        let df31 = dot(g3, e31);
        let df13 = -dot(g1, e31);

        let c3000 = f1;
        let c2100 = (df12 + 3.0 * c3000) / 3.0;
        let c2010 = (df13 + 3.0 * c3000) / 3.0;
        let c0300 = f2;
        let c1200 = (df21 + 3.0 * c0300) / 3.0;
        let c0210 = (df23 + 3.0 * c0300) / 3.0;
        let c0030 = f3;
        let c1020 = (df31 + 3.0 * c0030) / 3.0;
        let c0120 = (df32 + 3.0 * c0030) / 3.0;

        let c2001 = (c2100 + c2010 + c3000) / 3.0;
        let c0201 = (c1200 + c0300 + c0210) / 3.0;
        let c0021 = (c1020 + c0120 + c0030) / 3.0;

        let g = self.cross_boundary_weights(triangle);

        let c0111 = (g[0] * (-c0300 + 3.0 * c0210 - 3.0 * c0120 + c0030)
            + (-c0300 + 2.0 * c0210 - c0120 + c0021 + c0201))
            / 2.0;
        let c1011 = (g[1] * (-c0030 + 3.0 * c1020 - 3.0 * c2010 + c3000)
            + (-c0030 + 2.0 * c1020 - c2010 + c2001 + c0021))
            / 2.0;
        let c1101 = (g[2] * (-c3000 + 3.0 * c2100 - 3.0 * c1200 + c0300)
            + (-c3000 + 2.0 * c2100 - c1200 + c2001 + c0201))
            / 2.0;

        let c1002 = (c1101 + c1011 + c2001) / 3.0;
        let c0102 = (c1101 + c0111 + c0201) / 3.0;
        let c0012 = (c1011 + c0111 + c0021) / 3.0;
        let c0003 = (c1002 + c0102 + c0012) / 3.0;

        // Coordinates inside the micro-triangle that contains the point.
        let min = b[0].min(b[1]).min(b[2]);
        let (b1, b2, b3, b4) = (b[0] - min, b[1] - min, b[2] - min, 3.0 * min);

        if b1 == 0.0 {
            b2.powi(3) * c0300
                + 3.0 * b2 * b2 * b3 * c0210
                + 3.0 * b2 * b2 * b4 * c0201
                + 3.0 * b2 * b3 * b3 * c0120
                + 6.0 * b2 * b3 * b4 * c0111
                + 3.0 * b2 * b4 * b4 * c0102
                + b3.powi(3) * c0030
                + 3.0 * b3 * b3 * b4 * c0021
                + 3.0 * b3 * b4 * b4 * c0012
                + b4.powi(3) * c0003
        } else if b2 == 0.0 {
            b1.powi(3) * c3000
                + 3.0 * b1 * b1 * b3 * c2010
                + 3.0 * b1 * b1 * b4 * c2001
                + 3.0 * b1 * b3 * b3 * c1020
                + 6.0 * b1 * b3 * b4 * c1011
                + 3.0 * b1 * b4 * b4 * c1002
                + b3.powi(3) * c0030
                + 3.0 * b3 * b3 * b4 * c0021
                + 3.0 * b3 * b4 * b4 * c0012
                + b4.powi(3) * c0003
        } else {
            b1.powi(3) * c3000
                + 3.0 * b1 * b1 * b2 * c2100
                + 3.0 * b1 * b1 * b4 * c2001
                + 3.0 * b1 * b2 * b2 * c1200
                + 6.0 * b1 * b2 * b4 * c1101
                + 3.0 * b1 * b4 * b4 * c1002
                + b2.powi(3) * c0300
                + 3.0 * b2 * b2 * b4 * c0201
                + 3.0 * b2 * b4 * b4 * c0102
                + b4.powi(3) * c0003
        }
    }

    /// Weights fixing the derivative across each edge towards the
    /// neighbouring centroid, which makes adjacent patches C1. Hull edges
    /// fall back to the direction of the triangle's own centroid.
    fn cross_boundary_weights(&self, triangle: usize) -> [f64; 3] {
        let mut g = [-0.5; 3];
        for (k, neighbor) in self.tri.neighbors(triangle).into_iter().enumerate() {
            let Some(neighbor) = neighbor else {
                continue;
            };
            let [q1, q2, q3] = self.tri.vertices(neighbor);
            let centroid = [
                (q1[0] + q2[0] + q3[0]) / 3.0,
                (q1[1] + q2[1] + q3[1]) / 3.0,
            ];
            let c = self.tri.barycentric(triangle, centroid);
            g[k] = match k {
                0 => (2.0 * c[2] + c[1] - 1.0) / (2.0 - 3.0 * c[2] - 3.0 * c[1]),
                1 => (2.0 * c[0] + c[2] - 1.0) / (2.0 - 3.0 * c[0] - 3.0 * c[2]),
                _ => (2.0 * c[1] + c[0] - 1.0) / (2.0 - 3.0 * c[1] - 3.0 * c[0]),
            };
        }
        g
    }
}

/// Gauss–Seidel sweeps over each vertex's edge star until the largest
/// relative gradient change drops below tolerance.
fn estimate_gradients(tri: &Triangulation, values: &[f64]) -> Vec<[f64; 2]> {
    let points = tri.points();
    let adjacency = tri.vertex_neighbors();
    let mut grad = vec![[0.0; 2]; points.len()];

    for _ in 0..GRADIENT_MAX_SWEEPS {
        let mut err: f64 = 0.0;
        for (i, star) in adjacency.iter().enumerate() {
            if star.is_empty() {
                continue;
            }
            let mut q = [0.0; 3];
            let mut s = [0.0; 2];
            for &j in star {
                let ex = points[j][0] - points[i][0];
                let ey = points[j][1] - points[i][1];
                let l3 = (ex * ex + ey * ey).sqrt().powi(3);

                let df_j = -ex * grad[j][0] - ey * grad[j][1];
                let rhs = 6.0 * (values[i] - values[j]) - 2.0 * df_j;

                q[0] += 4.0 * ex * ex / l3;
                q[1] += 4.0 * ex * ey / l3;
                q[2] += 4.0 * ey * ey / l3;
                s[0] += rhs * ex / l3;
                s[1] += rhs * ey / l3;
            }

            let det = q[0] * q[2] - q[1] * q[1];
            if det == 0.0 {
                continue;
            }
            let r = [(q[2] * s[0] - q[1] * s[1]) / det, (-q[1] * s[0] + q[0] * s[1]) / det];

            let change = (grad[i][0] + r[0]).abs().max((grad[i][1] + r[1]).abs())
                / 1.0_f64.max(r[0].abs().max(r[1].abs()));
            grad[i] = [-r[0], -r[1]];
            err = err.max(change);
        }
        if err < GRADIENT_TOLERANCE {
            break;
        }
    }
    grad
}

fn sub(a: Point, b: Point) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

fn dot(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}
