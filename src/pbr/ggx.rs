//! Anisotropic GGX microfacet math shared by the CPU and GPU energy
//! integrators. Tangent space is Z-up: `v.z` is the cosine against the surface
//! normal. The GPU kernel (energy_lut.wgsl) mirrors these functions and must
//! stay in sync.

use std::f32::consts::PI;

use glam::Vec3;

/// Roughness floor keeping the NDF and the stretched view vector finite.
pub const MIN_ALPHA: f32 = 0.001;

/// Map artist roughness and anisotropy to the GGX alpha pair.
pub fn anisotropic_alphas(roughness: f32, anisotropy: f32) -> (f32, f32) {
    let aspect = (1.0 - anisotropy.sqrt() * 0.9).sqrt();
    let ax = (roughness / aspect).max(MIN_ALPHA);
    let ay = (roughness * aspect).max(MIN_ALPHA);
    (ax, ay)
}

/// Anisotropic GGX normal distribution.
pub fn ggx_ndf(h: Vec3, ax: f32, ay: f32) -> f32 {
    let d = h.x * h.x / (ax * ax) + h.y * h.y / (ay * ay) + h.z * h.z;
    1.0 / (PI * ax * ay * d * d)
}

/// Smith masking auxiliary Lambda.
pub fn smith_lambda(v: Vec3, ax: f32, ay: f32) -> f32 {
    let a2 = (ax * v.x) * (ax * v.x) + (ay * v.y) * (ay * v.y);
    ((1.0 + a2 / (v.z * v.z)).sqrt() - 1.0) * 0.5
}

/// Smith visibility for a single direction, 1 / (1 + Lambda).
pub fn smith_g1(v: Vec3, ax: f32, ay: f32) -> f32 {
    1.0 / (1.0 + smith_lambda(v, ax, ay))
}

/// Sample the GGX distribution of visible normals (Heitz 2018): stretch the
/// view vector into the hemisphere configuration, sample a disk with the
/// Jacobian-safe half-plane mapping, project, unstretch.
pub fn sample_vndf(v: Vec3, ax: f32, ay: f32, u1: f32, u2: f32) -> Vec3 {
    let vh = Vec3::new(ax * v.x, ay * v.y, v.z).normalize();

    // Orthonormal basis around vh; lensq guards the normal-incidence case.
    let lensq = vh.x * vh.x + vh.y * vh.y;
    let t1 = if lensq > 0.0 {
        Vec3::new(-vh.y, vh.x, 0.0) / lensq.sqrt()
    } else {
        Vec3::X
    };
    let t2 = vh.cross(t1);

    let r = u1.sqrt();
    let phi = 2.0 * PI * u2;
    let p1 = r * phi.cos();
    let mut p2 = r * phi.sin();
    let s = 0.5 * (1.0 + vh.z);
    p2 = (1.0 - s) * (1.0 - p1 * p1).max(0.0).sqrt() + s * p2;

    let p3 = (1.0 - p1 * p1 - p2 * p2).max(0.0).sqrt();
    let nh = p1 * t1 + p2 * t2 + p3 * vh;

    Vec3::new(ax * nh.x, ay * nh.y, nh.z.max(0.0)).normalize()
}

/// Mirror `v` about the half-vector `h`.
pub fn reflect(v: Vec3, h: Vec3) -> Vec3 {
    2.0 * v.dot(h) * h - v
}

/// Refract `v` (pointing away from the surface) about `h`; `eta` is the
/// relative IOR across the interface. None on total internal reflection, where
/// callers fall back to the reflection estimator.
pub fn refract(v: Vec3, h: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = v.dot(h);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(-v * eta + h * (eta * cos_i - cos_t))
}

/// Dielectric Fresnel reflectance; `eta` is the relative IOR (incident over
/// transmitted). Total internal reflection returns 1.
pub fn fresnel_dielectric(cos_i: f32, eta: f32) -> f32 {
    let cos_i = cos_i.clamp(-1.0, 1.0).abs();
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    let r_perp = (eta * cos_i - cos_t) / (eta * cos_i + cos_t);
    let r_par = (cos_i - eta * cos_t) / (cos_i + eta * cos_t);
    0.5 * (r_perp * r_perp + r_par * r_par)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphas_reduce_to_isotropic_at_zero_anisotropy() {
        let (ax, ay) = anisotropic_alphas(0.5, 0.0);
        assert!((ax - ay).abs() < 1e-6);
        assert!((ax - 0.5).abs() < 1e-6);
    }

    #[test]
    fn alphas_respect_floor() {
        let (ax, ay) = anisotropic_alphas(0.0, 0.7);
        assert_eq!(ax, MIN_ALPHA);
        assert_eq!(ay, MIN_ALPHA);
    }

    #[test]
    fn g1_is_a_valid_visibility() {
        let v = Vec3::new(0.3, -0.2, 0.8).normalize();
        for &(ax, ay) in &[(0.01, 0.01), (0.3, 0.1), (1.0, 1.0)] {
            let g = smith_g1(v, ax, ay);
            assert!(g > 0.0 && g <= 1.0);
        }
    }

    #[test]
    fn vndf_samples_are_unit_upper_hemisphere() {
        let v = Vec3::new(0.5, 0.1, 0.6).normalize();
        let mut u = 0.05f32;
        for _ in 0..32 {
            let h = sample_vndf(v, 0.4, 0.2, u, 1.0 - u);
            assert!((h.length() - 1.0).abs() < 1e-4);
            assert!(h.z >= 0.0);
            assert!(v.dot(h) >= -1e-4, "sampled normal faces away from view");
            u = (u + 0.061) % 1.0;
        }
    }

    #[test]
    fn fresnel_normal_incidence_and_tir() {
        // air -> glass at normal incidence: ((1-n)/(1+n))^2 with n = 1.5
        let f0 = fresnel_dielectric(1.0, 1.0 / 1.5);
        assert!((f0 - 0.04).abs() < 1e-3);
        // glass -> air beyond the critical angle
        assert_eq!(fresnel_dielectric(0.2, 1.5), 1.0);
    }

    #[test]
    fn refract_bends_toward_the_surface() {
        let h = Vec3::Z;
        let v = Vec3::new(0.4, 0.0, 0.6).normalize();
        let t = refract(v, h, 1.0 / 1.5).expect("no TIR entering glass");
        assert!(t.z < 0.0);
        assert!((t.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn ndf_matches_isotropic_closed_form_at_normal() {
        // D(n) = 1 / (pi * a^2) for h = +Z in the isotropic case
        let a = 0.3f32;
        let d = ggx_ndf(Vec3::Z, a, a);
        assert!((d - 1.0 / (PI * a * a)).abs() / d < 1e-5);
    }
}
