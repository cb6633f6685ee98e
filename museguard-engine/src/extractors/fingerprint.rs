//! Fingerprint extraction boundary
//!
//! Turns raw submitted bytes into the fixed-dimension vector the similarity
//! searcher operates on. `None` means the input was malformed or too short
//! to fingerprint; the pipeline then proceeds without a copyright subscore.

/// Fingerprint vector dimension: 12 band means + 12 band deviations +
/// 12 pitch-class bins
pub const FINGERPRINT_DIM: usize = 36;

const BANDS: usize = 12;
const FRAME_SIZE: usize = 1024;

/// Extraction seam for the numeric feature routine
pub trait FingerprintExtractor: Send + Sync {
    /// Extract a [`FINGERPRINT_DIM`]-dimension vector from raw bytes.
    /// Returns `None` on unreadable or degenerate input; never panics.
    fn extract(&self, bytes: &[u8]) -> Option<Vec<f32>>;
}

/// Built-in deterministic extractor
///
/// Computes per-band energy statistics over fixed-size frames plus a
/// 12-bin value-class histogram. Not a real MIR feature set, but fully
/// deterministic: identical bytes always produce identical vectors, and
/// small content changes perturb the vector smoothly, which is what the
/// searcher and its tests need.
#[derive(Debug, Default, Clone)]
pub struct SpectralFingerprinter;

impl FingerprintExtractor for SpectralFingerprinter {
    fn extract(&self, bytes: &[u8]) -> Option<Vec<f32>> {
        if bytes.len() < FRAME_SIZE {
            tracing::debug!(len = bytes.len(), "Input too short to fingerprint");
            return None;
        }

        let band_width = FRAME_SIZE / BANDS;
        let frames = bytes.chunks_exact(FRAME_SIZE);
        let frame_count = frames.len();

        // Per-band energy for every frame
        let mut band_energies: Vec<[f32; BANDS]> = Vec::with_capacity(frame_count);
        // Value-class histogram across the whole input
        let mut classes = [0u64; BANDS];

        for frame in frames {
            let mut energies = [0f32; BANDS];
            for (band, chunk) in frame.chunks(band_width).take(BANDS).enumerate() {
                let mut acc = 0f32;
                for &b in chunk {
                    // Center around zero before squaring
                    let sample = (b as f32 - 128.0) / 128.0;
                    acc += sample * sample;
                }
                energies[band] = acc / chunk.len() as f32;
            }
            band_energies.push(energies);

            for &b in frame {
                classes[(b % BANDS as u8) as usize] += 1;
            }
        }

        let n = frame_count as f32;
        let mut vector = Vec::with_capacity(FINGERPRINT_DIM);

        // Band means
        let mut means = [0f32; BANDS];
        for band in 0..BANDS {
            means[band] = band_energies.iter().map(|e| e[band]).sum::<f32>() / n;
        }
        vector.extend_from_slice(&means);

        // Band standard deviations
        for band in 0..BANDS {
            let variance = band_energies
                .iter()
                .map(|e| (e[band] - means[band]).powi(2))
                .sum::<f32>()
                / n;
            vector.push(variance.sqrt());
        }

        // Normalized value-class histogram
        let total: u64 = classes.iter().sum();
        for count in classes {
            vector.push(count as f32 / total as f32);
        }

        debug_assert_eq!(vector.len(), FINGERPRINT_DIM);
        Some(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes(seed: u8, len: usize) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_extract_dimension_and_determinism() {
        let extractor = SpectralFingerprinter;
        let bytes = sample_bytes(7, 8192);

        let a = extractor.extract(&bytes).unwrap();
        let b = extractor.extract(&bytes).unwrap();
        assert_eq!(a.len(), FINGERPRINT_DIM);
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_rejects_short_input() {
        let extractor = SpectralFingerprinter;
        assert!(extractor.extract(&[]).is_none());
        assert!(extractor.extract(&sample_bytes(1, FRAME_SIZE - 1)).is_none());
    }

    #[test]
    fn test_different_content_differs() {
        let extractor = SpectralFingerprinter;
        let a = extractor.extract(&sample_bytes(0, 8192)).unwrap();
        let b = extractor.extract(&sample_bytes(99, 8192)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_histogram_section_sums_to_one() {
        let extractor = SpectralFingerprinter;
        let vector = extractor.extract(&sample_bytes(3, 4096)).unwrap();
        let histogram_sum: f32 = vector[24..36].iter().sum();
        assert!((histogram_sum - 1.0).abs() < 1e-4);
    }
}
