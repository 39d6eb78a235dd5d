use crate::error::{DotcamError, DotcamResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> DotcamResult<Self> {
        if den == 0 {
            return Err(DotcamError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(DotcamError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// The fixed capture/render target. No adaptive tuning.
    pub fn standard() -> Self {
        Self { num: 30, den: 1 }
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Whole frames per second, if the rate is integral (den == 1).
    pub fn as_integer(self) -> Option<u32> {
        (self.den == 1).then_some(self.num)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> DotcamResult<Self> {
        if width == 0 || height == 0 {
            return Err(DotcamError::validation("Canvas dimensions must be non-zero"));
        }
        Ok(Self { width, height })
    }

    pub fn byte_len_rgba8(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A full-resolution RGBA8 frame, either straight or premultiplied alpha.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn solid(canvas: Canvas, rgba: [u8; 4]) -> Self {
        let mut data = vec![0u8; canvas.byte_len_rgba8()];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Self {
            width: canvas.width,
            height: canvas.height,
            data,
            premultiplied: false,
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn validate(&self) -> DotcamResult<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.data.len() != expected {
            return Err(DotcamError::validation(format!(
                "frame byte length mismatch: got {}, expected {expected}",
                self.data.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rejects_zero_terms() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        assert!((Fps::standard().as_f64() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn fps_as_integer_requires_unit_den() {
        assert_eq!(Fps::standard().as_integer(), Some(30));
        assert_eq!(Fps::new(30000, 1001).unwrap().as_integer(), None);
    }

    #[test]
    fn solid_frame_has_expected_layout() {
        let canvas = Canvas::new(4, 2).unwrap();
        let f = FrameRGBA::solid(canvas, [10, 20, 30, 255]);
        f.validate().unwrap();
        assert_eq!(f.data.len(), 4 * 2 * 4);
        assert_eq!(&f.data[0..4], &[10, 20, 30, 255]);
        assert_eq!(&f.data[f.data.len() - 4..], &[10, 20, 30, 255]);
    }

    #[test]
    fn frame_validate_catches_short_buffer() {
        let f = FrameRGBA {
            width: 4,
            height: 4,
            data: vec![0u8; 7],
            premultiplied: false,
        };
        assert!(f.validate().is_err());
    }
}
