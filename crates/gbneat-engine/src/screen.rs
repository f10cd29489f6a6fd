/// Width of the Game Boy LCD in pixels.
pub const SCREEN_WIDTH: usize = 160;
/// Height of the Game Boy LCD in pixels.
pub const SCREEN_HEIGHT: usize = 144;

/// A full-resolution screen capture, one luminance byte per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pixels: Vec<u8>,
}

impl Default for Screen {
    fn default() -> Self {
        Self::blank()
    }
}

impl Screen {
    /// An all-black screen.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            pixels: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
        }
    }

    /// Builds a screen from `SCREEN_WIDTH * SCREEN_HEIGHT` luminance bytes.
    ///
    /// Returns `None` when the buffer has the wrong size.
    #[must_use]
    pub fn from_luma(pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == SCREEN_WIDTH * SCREEN_HEIGHT).then_some(Self { pixels })
    }

    /// Builds a screen from packed RGB bytes, keeping only the first channel.
    ///
    /// Returns `None` when the buffer has the wrong size.
    #[must_use]
    pub fn from_rgb(rgb: &[u8]) -> Option<Self> {
        if rgb.len() != SCREEN_WIDTH * SCREEN_HEIGHT * 3 {
            return None;
        }
        Some(Self {
            pixels: rgb.chunks_exact(3).map(|px| px[0]).collect(),
        })
    }

    /// Like [`from_rgb`](Self::from_rgb), but logs a warning and returns a blank
    /// screen when the buffer has the wrong size.
    #[must_use]
    pub fn from_rgb_or_blank(rgb: &[u8]) -> Self {
        Self::from_rgb(rgb).unwrap_or_else(|| {
            tracing::warn!(
                len = rgb.len(),
                expected = SCREEN_WIDTH * SCREEN_HEIGHT * 3,
                "unexpected frame buffer size, using a blank screen"
            );
            Self::blank()
        })
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * SCREEN_WIDTH + x]
    }

    /// Mean-pools the screen over `factor x factor` blocks.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is zero or does not divide both screen dimensions.
    #[must_use]
    pub fn downscale(&self, factor: usize) -> Frame {
        assert!(
            factor > 0 && SCREEN_WIDTH % factor == 0 && SCREEN_HEIGHT % factor == 0,
            "downscale factor {factor} must divide {SCREEN_WIDTH}x{SCREEN_HEIGHT}"
        );
        let width = SCREEN_WIDTH / factor;
        let height = SCREEN_HEIGHT / factor;
        let block = factor * factor;
        let mut pixels = Vec::with_capacity(width * height);
        for by in 0..height {
            for bx in 0..width {
                let mut sum = 0usize;
                for y in by * factor..(by + 1) * factor {
                    let row = &self.pixels[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH];
                    sum += row[bx * factor..(bx + 1) * factor]
                        .iter()
                        .map(|&p| usize::from(p))
                        .sum::<usize>();
                }
                // truncation matches casting the float mean back to u8
                pixels.push(u8::try_from(sum / block).unwrap_or(u8::MAX));
            }
        }
        Frame {
            width,
            height,
            pixels,
        }
    }
}

/// A downscaled screen capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
