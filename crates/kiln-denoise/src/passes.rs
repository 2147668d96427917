//! The denoise pass layout.
//!
//! Feature buffers store one plane per pass channel, in the fixed order
//! below: the eight feature channels the transform reads come first,
//! followed by their variances for the filter kernels. Standalone
//! denoising matches file channels against the pass names to fill the
//! planes.

/// One channel group in the denoise buffer layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenoisePass {
    /// Pass name as stored in multilayer files
    pub name: &'static str,
    /// Channel labels, one letter per channel
    pub channels: &'static str,
    /// Plane index of the first channel
    pub plane: usize,
}

/// Number of buffer-backed feature planes the transform reads.
pub const FEATURE_PLANES: usize = 8;

/// Total planes in a full denoise buffer, variances included.
pub const TOTAL_PLANES: usize = 16;

/// All passes in plane order.
pub const DENOISE_PASSES: &[DenoisePass] = &[
    DenoisePass {
        name: "DenoiseDepth",
        channels: "Z",
        plane: 0,
    },
    DenoisePass {
        name: "DenoiseNormal",
        channels: "XYZ",
        plane: 1,
    },
    DenoisePass {
        name: "DenoiseAlbedo",
        channels: "RGB",
        plane: 4,
    },
    DenoisePass {
        name: "DenoiseShadow",
        channels: "A",
        plane: 7,
    },
    DenoisePass {
        name: "DenoiseDepthVar",
        channels: "Z",
        plane: 8,
    },
    DenoisePass {
        name: "DenoiseNormalVar",
        channels: "XYZ",
        plane: 9,
    },
    DenoisePass {
        name: "DenoiseAlbedoVar",
        channels: "RGB",
        plane: 12,
    },
    DenoisePass {
        name: "DenoiseShadowVar",
        channels: "A",
        plane: 15,
    },
];

/// Plane index of the first channel of a pass, by name.
pub fn pass_plane(name: &str) -> Option<usize> {
    DENOISE_PASSES
        .iter()
        .find(|pass| pass.name == name)
        .map(|pass| pass.plane)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planes_are_contiguous() {
        let mut next = 0;
        for pass in DENOISE_PASSES {
            assert_eq!(pass.plane, next, "pass {} out of order", pass.name);
            next += pass.channels.len();
        }
        assert_eq!(next, TOTAL_PLANES);
    }

    #[test]
    fn test_feature_planes_come_first() {
        assert_eq!(pass_plane("DenoiseDepth"), Some(0));
        assert_eq!(pass_plane("DenoiseShadow"), Some(7));
        assert_eq!(pass_plane("DenoiseDepthVar"), Some(FEATURE_PLANES));
        assert_eq!(pass_plane("Combined"), None);
    }
}
