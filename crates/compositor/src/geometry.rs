//! Column-major 4x4 matrices and the two meshes used by the composite pass.
//!
//! Matrices follow the wgpu clip-space convention (depth in `0..=1`) with a
//! left-handed view: +z points into the screen.

use bytemuck::{Pod, Zeroable};

pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Depth at which the flat quad is drawn.
pub const FLAT_DEPTH: f32 = 0.99;

const FOV_Y_DEGREES: f32 = 65.0;
const NEAR_Z: f32 = 0.1;
const FAR_Z: f32 = 100.0;
const EYE_DISTANCE: f32 = 1.393;
const PIVOT_OFFSET: f32 = 0.16;

/// Half extents of the cube used by the transitional view (4:3 front face).
const CUBE_HALF_WIDTH: f32 = 0.64;
const CUBE_HALF_HEIGHT: f32 = 0.48;
const CUBE_HALF_DEPTH: f32 = 0.64;

pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (col, out_col) in out.iter_mut().enumerate() {
        for (row, cell) in out_col.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    out
}

pub fn transform(m: &Mat4, v: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (row, cell) in out.iter_mut().enumerate() {
        *cell = (0..4).map(|k| m[k][row] * v[k]).sum();
    }
    out
}

pub fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[3] = [x, y, z, 1.0];
    m
}

/// Rotation of `radians` around the axis `(x, y, z)`; the axis need not be normalised.
pub fn rotation(radians: f32, x: f32, y: f32, z: f32) -> Mat4 {
    let len = (x * x + y * y + z * z).sqrt();
    if len <= f32::EPSILON {
        return IDENTITY;
    }
    let (x, y, z) = (x / len, y / len, z / len);
    let (s, c) = radians.sin_cos();
    let ci = 1.0 - c;
    [
        [c + x * x * ci, y * x * ci + z * s, z * x * ci - y * s, 0.0],
        [x * y * ci - z * s, c + y * y * ci, z * y * ci + x * s, 0.0],
        [x * z * ci + y * s, y * z * ci - x * s, c + z * z * ci, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let ys = 1.0 / (fov_y * 0.5).tan();
    let xs = ys / aspect;
    let zs = far / (far - near);
    [
        [xs, 0.0, 0.0, 0.0],
        [0.0, ys, 0.0, 0.0],
        [0.0, 0.0, zs, 1.0],
        [0.0, 0.0, -near * zs, 0.0],
    ]
}

/// MVP of the flat presentation: the unit quad pushed to [`FLAT_DEPTH`].
pub fn flat_mvp() -> Mat4 {
    translation(0.0, 0.0, FLAT_DEPTH)
}

/// Orientation of the cube in the transitional view (angles in degrees).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CubeTransform {
    pub angle_x: f32,
    pub angle_y: f32,
    pub angle_z: f32,
    pub shift_x: f32,
    pub shift_y: f32,
    pub shift_z: f32,
}

impl CubeTransform {
    pub fn mvp(&self, aspect: f32) -> Mat4 {
        let x_angle = (-self.angle_x).to_radians();
        let y_angle = self.angle_y.to_radians();
        let z_angle = self.angle_z.to_radians();

        let proj = perspective(FOV_Y_DEGREES.to_radians(), aspect.max(f32::EPSILON), NEAR_Z, FAR_Z);
        let eye = translation(
            -self.shift_x,
            -self.shift_y,
            self.shift_z + EYE_DISTANCE - PIVOT_OFFSET,
        );
        let pivot = translation(0.0, 0.0, PIVOT_OFFSET);
        let rot_x = rotation(x_angle, 0.5, 0.0, 0.0);
        let rot_y = rotation(y_angle, 0.0, 0.5, 0.0);
        let rot_z = rotation(z_angle, 0.0, 0.0, 0.5);

        let model = [&rot_x, &pivot, &rot_y, &rot_z]
            .into_iter()
            .fold(eye, |acc, m| multiply(&acc, m));
        multiply(&proj, &model)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub uv: [f32; 2],
}

pub const VERTICES_PER_FACE: u32 = 6;
pub const CUBE_FACES: u32 = 6;

/// Two triangles spanning `origin`, `origin + u`, `origin + v`, `origin + u + v`.
///
/// `v` points "up" in texture space, so the top edge samples texture row 0.
fn face(origin: [f32; 3], u: [f32; 3], v: [f32; 3]) -> [Vertex; 6] {
    let corner = |su: f32, sv: f32| Vertex {
        position: [
            origin[0] + u[0] * su + v[0] * sv,
            origin[1] + u[1] * su + v[1] * sv,
            origin[2] + u[2] * su + v[2] * sv,
            1.0,
        ],
        uv: [su, 1.0 - sv],
    };
    let bl = corner(0.0, 0.0);
    let br = corner(1.0, 0.0);
    let tl = corner(0.0, 1.0);
    let tr = corner(1.0, 1.0);
    [bl, br, tr, bl, tr, tl]
}

/// Flat full-screen quad at `z = 0`; [`flat_mvp`] moves it to its depth.
pub fn flat_quad() -> [Vertex; 6] {
    face([-1.0, -1.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0])
}

/// Cube faces, front face first so drawing only the visible side is a prefix.
pub fn cube() -> Vec<Vertex> {
    let (x1, y1, z1) = (-CUBE_HALF_WIDTH, -CUBE_HALF_HEIGHT, -CUBE_HALF_DEPTH);
    let (x2, y2, z2) = (CUBE_HALF_WIDTH, CUBE_HALF_HEIGHT, CUBE_HALF_DEPTH);
    let (w, h, d) = (x2 - x1, y2 - y1, z2 - z1);
    let faces = [
        face([x1, y1, z1], [w, 0.0, 0.0], [0.0, h, 0.0]),
        face([x2, y1, z2], [-w, 0.0, 0.0], [0.0, h, 0.0]),
        face([x1, y1, z2], [0.0, 0.0, -d], [0.0, h, 0.0]),
        face([x2, y1, z1], [0.0, 0.0, d], [0.0, h, 0.0]),
        face([x1, y2, z1], [w, 0.0, 0.0], [0.0, 0.0, d]),
        face([x1, y1, z2], [w, 0.0, 0.0], [0.0, 0.0, -d]),
    ];
    faces.into_iter().flatten().collect()
}

/// Flat quad followed by the cube, as uploaded into one vertex buffer.
pub fn mesh() -> Vec<Vertex> {
    let mut vertices = flat_quad().to_vec();
    vertices.extend(cube());
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn identity_is_neutral() {
        let m = translation(1.0, 2.0, 3.0);
        assert_eq!(multiply(&IDENTITY, &m), m);
        assert_eq!(multiply(&m, &IDENTITY), m);
    }

    #[test]
    fn translation_moves_points() {
        let p = transform(&translation(1.0, -2.0, 0.5), [0.0, 0.0, 0.0, 1.0]);
        assert!(approx(p, [1.0, -2.0, 0.5, 1.0]));
    }

    #[test]
    fn quarter_turn_around_y() {
        let m = rotation(std::f32::consts::FRAC_PI_2, 0.0, 0.5, 0.0);
        let p = transform(&m, [1.0, 0.0, 0.0, 1.0]);
        assert!(approx(p, [0.0, 0.0, -1.0, 1.0]));
    }

    #[test]
    fn perspective_maps_near_and_far_planes() {
        let m = perspective(1.0, 1.0, 0.1, 100.0);
        let near = transform(&m, [0.0, 0.0, 0.1, 1.0]);
        let far = transform(&m, [0.0, 0.0, 100.0, 1.0]);
        assert!((near[2] / near[3]).abs() < 1e-5);
        assert!((far[2] / far[3] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn flat_quad_lands_inside_clip_volume() {
        let mvp = flat_mvp();
        for vertex in flat_quad() {
            let clip = transform(&mvp, vertex.position);
            assert!((clip[2] - FLAT_DEPTH).abs() < 1e-6);
            assert!(clip[0].abs() <= 1.0 && clip[1].abs() <= 1.0);
        }
    }

    #[test]
    fn resting_cube_front_face_fills_the_view() {
        let mvp = CubeTransform::default().mvp(4.0 / 3.0);
        for vertex in &cube()[..VERTICES_PER_FACE as usize] {
            let clip = transform(&mvp, vertex.position);
            let ndc_z = clip[2] / clip[3];
            assert!(clip[3] > 0.0);
            assert!((0.0..=1.0).contains(&ndc_z));
            // Corners sit on the viewport edge.
            assert!(((clip[0] / clip[3]).abs() - 1.0).abs() < 1e-2);
            assert!(((clip[1] / clip[3]).abs() - 1.0).abs() < 1e-2);
        }
    }

    #[test]
    fn mesh_holds_quad_plus_six_faces() {
        assert_eq!(
            mesh().len() as u32,
            VERTICES_PER_FACE + CUBE_FACES * VERTICES_PER_FACE
        );
    }
}
