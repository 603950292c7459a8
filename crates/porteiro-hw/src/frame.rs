//! Frame type and pixel-level helpers — YUYV conversion and mirroring.

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Mirror a grayscale frame horizontally in place (selfie view).
///
/// Detection and registration both run on the mirrored frame, so
/// signatures stay consistent between the two modes.
pub fn mirror_horizontal(gray: &mut [u8], width: u32, height: u32) {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || gray.len() < w * h {
        return;
    }
    for row in gray.chunks_exact_mut(w).take(h) {
        row.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_grayscale() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let yuyv = vec![100, 128, 200, 128];
        let gray = yuyv_to_grayscale(&yuyv, 2, 1).unwrap();
        assert_eq!(gray, vec![100, 200]);
    }

    #[test]
    fn test_yuyv_to_grayscale_4x2() {
        let yuyv: Vec<u8> = (0..16).collect();
        let gray = yuyv_to_grayscale(&yuyv, 4, 2).unwrap();
        assert_eq!(gray, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(yuyv_to_grayscale(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_mirror_horizontal() {
        // 3x2 frame, rows [1,2,3] and [4,5,6]
        let mut gray = vec![1, 2, 3, 4, 5, 6];
        mirror_horizontal(&mut gray, 3, 2);
        assert_eq!(gray, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_mirror_twice_is_identity() {
        let orig: Vec<u8> = (0..20).collect();
        let mut gray = orig.clone();
        mirror_horizontal(&mut gray, 5, 4);
        mirror_horizontal(&mut gray, 5, 4);
        assert_eq!(gray, orig);
    }

    #[test]
    fn test_mirror_short_buffer_is_noop() {
        let mut gray = vec![1, 2, 3];
        mirror_horizontal(&mut gray, 4, 4);
        assert_eq!(gray, vec![1, 2, 3]);
    }
}
