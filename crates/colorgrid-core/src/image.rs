use thiserror::Error;

/// Bytes per pixel of the interleaved B,G,R layout.
pub const BGR_CHANNELS: usize = 3;

/// Reasons a BGR buffer cannot be processed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ImageLayoutError {
    #[error("empty image (width={width}, height={height})")]
    Empty { width: usize, height: usize },
    #[error("invalid BGR buffer length (expected {expected} bytes, got {got})")]
    BufferLength { expected: usize, got: usize },
}

/// Borrowed 8-bit, 3-channel image, row-major, B,G,R interleaved.
#[derive(Clone, Copy, Debug)]
pub struct BgrImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // len = w*h*3
}

/// Owned counterpart of [`BgrImageView`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BgrImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl BgrImage {
    /// Image filled with a single B,G,R color.
    pub fn filled(width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * BGR_CHANNELS);
        for _ in 0..width * height {
            data.extend_from_slice(&bgr);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn view(&self) -> BgrImageView<'_> {
        BgrImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        self.view().pixel(x, y)
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, bgr: [u8; 3]) {
        let i = (y * self.width + x) * BGR_CHANNELS;
        self.data[i..i + BGR_CHANNELS].copy_from_slice(&bgr);
    }

    /// Paint an axis-aligned rectangle, clipped to the image.
    pub fn fill_rect(&mut self, x0: usize, y0: usize, w: usize, h: usize, bgr: [u8; 3]) {
        let x1 = (x0 + w).min(self.width);
        let y1 = (y0 + h).min(self.height);
        for y in y0.min(y1)..y1 {
            for x in x0.min(x1)..x1 {
                self.put_pixel(x, y, bgr);
            }
        }
    }
}

impl<'a> BgrImageView<'a> {
    /// Check the dimensions and buffer length.
    pub fn validate(&self) -> Result<(), ImageLayoutError> {
        if self.width == 0 || self.height == 0 {
            return Err(ImageLayoutError::Empty {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self
            .width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(BGR_CHANNELS))
            .ok_or(ImageLayoutError::Empty {
                width: self.width,
                height: self.height,
            })?;
        if self.data.len() != expected {
            return Err(ImageLayoutError::BufferLength {
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * BGR_CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn to_owned_image(&self) -> BgrImage {
        BgrImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

#[inline]
fn get_bgr_clamped(src: &BgrImageView<'_>, x: i32, y: i32) -> [f32; 3] {
    let xc = x.clamp(0, src.width as i32 - 1) as usize;
    let yc = y.clamp(0, src.height as i32 - 1) as usize;
    let p = src.pixel(xc, yc);
    [p[0] as f32, p[1] as f32, p[2] as f32]
}

/// Bilinear sample with edge-replicate extrapolation outside the image.
#[inline]
pub fn sample_bilinear_bgr(src: &BgrImageView<'_>, x: f32, y: f32) -> [f32; 3] {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_bgr_clamped(src, x0, y0);
    let p10 = get_bgr_clamped(src, x0 + 1, y0);
    let p01 = get_bgr_clamped(src, x0, y0 + 1);
    let p11 = get_bgr_clamped(src, x0 + 1, y0 + 1);

    let mut out = [0.0f32; 3];
    for c in 0..BGR_CHANNELS {
        let a = p00[c] + fx * (p10[c] - p00[c]);
        let b = p01[c] + fx * (p11[c] - p01[c]);
        out[c] = a + fy * (b - a);
    }
    out
}

#[inline]
pub fn sample_bilinear_bgr_u8(src: &BgrImageView<'_>, x: f32, y: f32) -> [u8; 3] {
    let v = sample_bilinear_bgr(src, x, y);
    [
        v[0].round().clamp(0.0, 255.0) as u8,
        v[1].round().clamp(0.0, 255.0) as u8,
        v[2].round().clamp(0.0, 255.0) as u8,
    ]
}
