//! Rotation and transform helpers.
//!
//! Values travel as plain `[f32; N]` arrays (quaternions are x,y,z,w); nalgebra
//! does the actual slerp, Euler composition and matrix decomposition.

use nalgebra::{Matrix3, Matrix4, Quaternion, Rotation3, UnitQuaternion, Vector3};

pub const IDENTITY_QUAT: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const ZERO_VEC3: [f32; 3] = [0.0, 0.0, 0.0];

#[inline]
pub fn to_unit(q: [f32; 4]) -> UnitQuaternion<f32> {
    UnitQuaternion::new_normalize(Quaternion::new(q[3], q[0], q[1], q[2]))
}

#[inline]
pub fn from_unit(q: &UnitQuaternion<f32>) -> [f32; 4] {
    [q.i, q.j, q.k, q.w]
}

/// Re-normalize a quaternion. Returns `None` for non-finite or (near) zero-length input.
pub fn normalize_quat(q: [f32; 4]) -> Option<[f32; 4]> {
    if q.iter().any(|c| !c.is_finite()) {
        return None;
    }
    let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    let inv = len.recip();
    Some([q[0] * inv, q[1] * inv, q[2] * inv, q[3] * inv])
}

/// Euler radians to quaternion, composed yaw (Y) then pitch (X) then roll (Z):
/// `q = Ry(yaw) * Rx(pitch) * Rz(roll)`.
pub fn quat_from_euler(pitch: f32, yaw: f32, roll: f32) -> [f32; 4] {
    let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pitch)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), roll);
    from_unit(&q)
}

#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

/// Spherical interpolation along the shortest arc.
pub fn slerp_quat(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let qa = to_unit(a);
    let mut qb = to_unit(b);
    if qa.coords.dot(&qb.coords) < 0.0 {
        qb = UnitQuaternion::new_unchecked(-qb.into_inner());
    }
    // Nearly parallel rotations have no unique great circle; fall back to nlerp.
    match qa.try_slerp(&qb, t, 1.0e-6) {
        Some(q) => from_unit(&q),
        None => from_unit(&qa.nlerp(&qb, t)),
    }
}

/// Angle in radians between two rotations (0 when equivalent, sign-agnostic).
/// Uses `atan2` rather than `acos(w)`, which loses small angles in f32.
pub fn quat_angle_between(a: [f32; 4], b: [f32; 4]) -> f32 {
    let d = to_unit(a).inverse() * to_unit(b);
    2.0 * d.imag().norm().atan2(d.w.abs())
}

/// Flip to the w >= 0 hemisphere so equal rotations export identically.
pub fn canonical_quat(q: [f32; 4]) -> [f32; 4] {
    if q[3] < 0.0 {
        [-q[0], -q[1], -q[2], -q[3]]
    } else {
        q
    }
}

#[inline]
pub fn is_identity_quat(q: [f32; 4], eps: f32) -> bool {
    quat_angle_between(q, IDENTITY_QUAT) <= eps
}

#[inline]
pub fn is_zero_vec3(v: [f32; 3], eps: f32) -> bool {
    v.iter().all(|c| c.abs() <= eps)
}

/// Translation * rotation matrix for a local bone transform.
pub fn compose_tr(translation: [f32; 3], rotation: [f32; 4]) -> Matrix4<f32> {
    Matrix4::new_translation(&Vector3::from(translation)) * to_unit(rotation).to_homogeneous()
}

/// Decomposed local transform; scale is reported but callers may discard it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Decomposed {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

/// Split an affine matrix into translation, rotation and scale.
/// Returns `None` when a basis column has collapsed to zero length.
pub fn decompose(m: &Matrix4<f32>) -> Option<Decomposed> {
    let translation = [m[(0, 3)], m[(1, 3)], m[(2, 3)]];
    let basis: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let mut scale = [
        basis.column(0).norm(),
        basis.column(1).norm(),
        basis.column(2).norm(),
    ];
    if scale.iter().any(|s| *s <= f32::EPSILON || !s.is_finite()) {
        return None;
    }
    // A reflected basis keeps a proper rotation by flipping one scale axis.
    if basis.determinant() < 0.0 {
        scale[0] = -scale[0];
    }
    let mut rot = basis;
    for (i, s) in scale.iter().enumerate() {
        let col = rot.column(i) / *s;
        rot.set_column(i, &col);
    }
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot));
    Some(Decomposed {
        translation,
        rotation: from_unit(&q),
        scale,
    })
}

/// `inverse(parent_world) * world`, or `None` when the parent matrix is singular.
pub fn local_from_world(parent_world: &Matrix4<f32>, world: &Matrix4<f32>) -> Option<Matrix4<f32>> {
    parent_world.try_inverse().map(|inv| inv * world)
}
