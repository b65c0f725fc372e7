// src/path_tracing/alias_table.rs
// Alias table over an equirectangular environment map for O(1) importance
// sampling of emitted light. Texel weights are solid-angle corrected so the
// equirectangular stretch near the poles does not bias sampling, and the
// per-texel PDF is written back into the alpha channel for shader-side
// probability evaluation.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};

/// Entry in an alias table for efficient discrete sampling
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct AliasEntry {
    /// Probability of keeping this texel when it is drawn uniformly.
    pub importance: f32,
    /// Texel to redirect to when the importance test fails.
    pub alias: u32,
}

/// Alias table for O(1) discrete sampling from the energy-weighted texel
/// distribution of an environment map.
#[derive(Clone, Debug)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
    total_importance: f32,
}

impl AliasTable {
    /// Build from a mutable RGBA32F equirectangular radiance image.
    ///
    /// Texel importance is the row solid angle times max(R,G,B); the alpha
    /// channel receives `max(R,G,B) / sum` as the sampling PDF. A black map
    /// (zero total importance) produces an all-zero table and PDF instead of
    /// dividing by zero.
    pub fn from_equirect(pixels: &mut [f32], width: u32, height: u32) -> Self {
        let n = (width * height) as usize;
        assert_eq!(pixels.len(), n * 4, "expected an RGBA32F image");
        if n == 0 {
            return Self {
                entries: vec![],
                total_importance: 0.0,
            };
        }

        // Row solid angle: the band between theta0 and theta1 split into
        // `width` equal azimuth slices, theta sweeping from the top.
        let mut importance = vec![0.0f32; n];
        let mut sum = 0.0f32;
        for y in 0..height {
            let theta0 = y as f32 / height as f32 * PI;
            let theta1 = (y + 1) as f32 / height as f32 * PI;
            let area = (theta0.cos() - theta1.cos()) * (2.0 * PI / width as f32);
            for x in 0..width {
                let i = (y * width + x) as usize;
                let peak = pixels[i * 4]
                    .max(pixels[i * 4 + 1])
                    .max(pixels[i * 4 + 2]);
                importance[i] = area * peak;
                sum += importance[i];
            }
        }
        let average = sum / n as f32;

        let mut entries: Vec<AliasEntry> = (0..n)
            .map(|i| AliasEntry {
                importance: if average > 0.0 {
                    importance[i] / average
                } else {
                    0.0
                },
                alias: i as u32,
            })
            .collect();

        // Partition texels into under- and over-weighted groups: low indices
        // fill the scratch array from the front, high indices from the back.
        let mut scratch = vec![0u32; n];
        let mut low_count = 0usize;
        let mut high_start = n;
        for i in 0..n {
            if entries[i].importance < 1.0 {
                scratch[low_count] = i as u32;
                low_count += 1;
            } else {
                high_start -= 1;
                scratch[high_start] = i as u32;
            }
        }

        // Pair each low texel with the current high texel, moving the high's
        // excess weight onto the low. A high that drops below 1 stays in place
        // and is consumed as a low once low_counter reaches it.
        let mut low_counter = 0usize;
        let mut high_counter = high_start;
        while low_counter < high_counter && high_counter < n {
            let low = scratch[low_counter] as usize;
            let high = scratch[high_counter] as usize;
            entries[low].alias = high as u32;
            entries[high].importance -= 1.0 - entries[low].importance;
            if entries[high].importance < 1.0 {
                high_counter += 1;
            }
            low_counter += 1;
        }

        // PDF for shader-side evaluation of the sampled direction.
        for i in 0..n {
            let peak = pixels[i * 4]
                .max(pixels[i * 4 + 1])
                .max(pixels[i * 4 + 2]);
            pixels[i * 4 + 3] = if sum > 0.0 { peak / sum } else { 0.0 };
        }

        Self {
            entries,
            total_importance: sum,
        }
    }

    /// Sample a texel index: draw uniformly with `u1`, keep it when `u2` falls
    /// under its importance, otherwise follow the alias.
    pub fn sample(&self, u1: f32, u2: f32) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let n = self.entries.len();
        let i = ((u1 * n as f32) as usize).min(n - 1);
        let entry = self.entries[i];
        if u2 < entry.importance {
            i
        } else {
            entry.alias as usize
        }
    }

    /// Raw entries for GPU buffer upload.
    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    /// Sum of solid-angle weighted importance over all texels.
    pub fn total_importance(&self) -> f32 {
        self.total_importance
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_image(width: u32, height: u32, value: f32) -> Vec<f32> {
        let mut img = vec![0.0f32; (width * height * 4) as usize];
        for texel in img.chunks_exact_mut(4) {
            texel[0] = value;
            texel[1] = value;
            texel[2] = value;
        }
        img
    }

    #[test]
    fn final_importance_is_bounded() {
        let mut img = constant_image(8, 4, 0.0);
        // uneven radiance
        for (i, texel) in img.chunks_exact_mut(4).enumerate() {
            texel[0] = (i % 5) as f32;
            texel[1] = (i % 3) as f32 * 0.5;
        }
        let table = AliasTable::from_equirect(&mut img, 8, 4);
        assert_eq!(table.len(), 32);
        for entry in table.entries() {
            assert!(entry.importance >= 0.0 && entry.importance <= 1.0 + 1e-4);
            assert!((entry.alias as usize) < 32);
        }
    }

    #[test]
    fn black_map_is_all_zero_without_nan() {
        let mut img = constant_image(4, 4, 0.0);
        let table = AliasTable::from_equirect(&mut img, 4, 4);
        assert_eq!(table.total_importance(), 0.0);
        for entry in table.entries() {
            assert_eq!(entry.importance, 0.0);
        }
        for texel in img.chunks_exact(4) {
            assert_eq!(texel[3], 0.0);
        }
    }

    #[test]
    fn pdf_lands_in_alpha() {
        let mut img = constant_image(4, 2, 1.0);
        AliasTable::from_equirect(&mut img, 4, 2);
        // every texel has peak 1, so pdf = 1 / sum: all alphas equal, positive
        let pdf = img[3];
        assert!(pdf > 0.0);
        for texel in img.chunks_exact(4) {
            assert_eq!(texel[3], pdf);
        }
    }

    #[test]
    fn uniform_map_importance_near_one() {
        // Constant radiance: every texel's normalized importance is its solid
        // angle over the average, so rows near the equator sit above 1 and
        // polar rows below; after pairing everything is in [0, 1].
        let mut img = constant_image(16, 8, 2.5);
        let table = AliasTable::from_equirect(&mut img, 16, 8);
        assert!(table.total_importance() > 0.0);
        for entry in table.entries() {
            assert!(entry.importance >= 0.0 && entry.importance <= 1.0 + 1e-4);
        }
    }
}
