use kurbo::Shape as _;

use crate::{
    core::{Canvas, FrameRGBA},
    error::{DotcamError, DotcamResult},
    style::{RasterBuffer, StyleConfig, adjust_contrast, to_grayscale},
};

#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Background the canvas is cleared to before dots are drawn.
    /// `None` leaves the surface transparent.
    pub clear_rgba: Option<[u8; 4]>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_rgba: Some([0, 0, 0, 255]),
        }
    }
}

/// CPU dot-grid renderer over a reusable `vello_cpu` surface.
pub struct CpuRenderer {
    canvas: Canvas,
    settings: RenderSettings,
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
    // Dot outline at the origin, cached per pixel_size.
    dot_path: Option<(u32, vello_cpu::kurbo::BezPath)>,
}

impl CpuRenderer {
    pub fn new(canvas: Canvas, settings: RenderSettings) -> DotcamResult<Self> {
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| DotcamError::render("canvas width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| DotcamError::render("canvas height exceeds u16"))?;

        Ok(Self {
            canvas,
            settings,
            width,
            height,
            pixmap: vello_cpu::Pixmap::new(width, height),
            dot_path: None,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Clear the surface, then draw one filled circle per raster sample in
    /// row-major order: radius `pixel_size / 2`, centered at
    /// `(x * cell, y * cell)`, filled with the contrast-adjusted grayscale of
    /// the sample at full opacity. Returns premultiplied RGBA8.
    pub fn render(&mut self, raster: &RasterBuffer, style: &StyleConfig) -> DotcamResult<FrameRGBA> {
        style.validate()?;

        let clear = self
            .settings
            .clear_rgba
            .map(|[r, g, b, a]| premul_rgba8(r, g, b, a))
            .unwrap_or([0, 0, 0, 0]);
        clear_pixmap(&mut self.pixmap, clear);

        let dot = self.dot_path_for(style.pixel_size).clone();
        let cell = f64::from(style.cell_size());

        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        for gy in 0..raster.height {
            for gx in 0..raster.width {
                let [r, g, b, _a] = raster.sample(gx, gy)?;
                let gray = adjust_contrast(to_grayscale(r, g, b), style.contrast_factor);
                let v = gray.round() as u8;

                ctx.set_transform(vello_cpu::kurbo::Affine::translate((
                    f64::from(gx) * cell,
                    f64::from(gy) * cell,
                )));
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(v, v, v, 255));
                ctx.fill_path(&dot);
            }
        }
        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);

        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn dot_path_for(&mut self, pixel_size: u32) -> &vello_cpu::kurbo::BezPath {
        if !matches!(&self.dot_path, Some((size, _)) if *size == pixel_size) {
            self.dot_path = None;
        }
        let (_, path) = self.dot_path.get_or_insert_with(|| {
            let radius = f64::from(pixel_size) / 2.0;
            let circle = kurbo::Circle::new(kurbo::Point::ORIGIN, radius);
            (pixel_size, bezpath_to_cpu(&circle.to_path(0.1)))
        });
        path
    }
}

fn premul_rgba8(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
    let af = (a as u16) + 1;
    let premul = |c: u8| -> u8 { (((c as u16) * af) >> 8) as u8 };
    [premul(r), premul(g), premul(b), a]
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    let data = pixmap.data_as_u8_slice_mut();
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &FrameRGBA, x: u32, y: u32) -> [u8; 4] {
        let off = (y as usize * frame.width as usize + x as usize) * 4;
        [
            frame.data[off],
            frame.data[off + 1],
            frame.data[off + 2],
            frame.data[off + 3],
        ]
    }

    #[test]
    fn render_is_deterministic_and_full_canvas() {
        let canvas = Canvas::new(64, 48).unwrap();
        let style = StyleConfig::default();
        let mut renderer = CpuRenderer::new(canvas, RenderSettings::default()).unwrap();

        let mut raster = RasterBuffer::new(10, 8);
        for (i, b) in raster.data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }

        let a = renderer.render(&raster, &style).unwrap();
        let b = renderer.render(&raster, &style).unwrap();
        assert_eq!(a.width, 64);
        assert_eq!(a.height, 48);
        assert!(a.premultiplied);
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn dot_centers_carry_sample_gray_and_gaps_stay_clear() {
        let canvas = Canvas::new(24, 24).unwrap();
        let style = StyleConfig::default(); // pixel 3, gap 3, cell 6
        let mut renderer = CpuRenderer::new(canvas, RenderSettings::default()).unwrap();

        let mut raster = RasterBuffer::new(4, 4);
        for px in raster.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[128, 128, 128, 255]);
        }

        let frame = renderer.render(&raster, &style).unwrap();
        // Pixel (0,0) lies entirely inside the dot centered at the origin.
        assert_eq!(pixel(&frame, 0, 0), [128, 128, 128, 255]);
        // Pixel (3,3) is well outside every dot: background shows through.
        assert_eq!(pixel(&frame, 3, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn mid_gray_raster_is_contrast_invariant() {
        let canvas = Canvas::new(24, 24).unwrap();
        let mut raster = RasterBuffer::new(4, 4);
        for px in raster.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[128, 128, 128, 255]);
        }

        let mut frames = Vec::new();
        for factor in [0.0, 1.0, 5.0] {
            let style = StyleConfig {
                contrast_factor: factor,
                ..StyleConfig::default()
            };
            let mut renderer = CpuRenderer::new(canvas, RenderSettings::default()).unwrap();
            frames.push(renderer.render(&raster, &style).unwrap().data);
        }
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[1], frames[2]);
    }

    #[test]
    fn dot_cache_follows_pixel_size_changes() {
        let canvas = Canvas::new(40, 40).unwrap();
        let mut raster = RasterBuffer::new(4, 4);
        for px in raster.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[200, 200, 200, 255]);
        }

        let small = StyleConfig {
            pixel_size: 3,
            gap_size: 3,
            contrast_factor: 1.0,
        };
        let large = StyleConfig {
            pixel_size: 7,
            gap_size: 3,
            contrast_factor: 1.0,
        };

        // A reused renderer must rebuild its dot outline when pixel_size
        // changes, matching what a fresh renderer produces.
        let mut reused = CpuRenderer::new(canvas, RenderSettings::default()).unwrap();
        reused.render(&raster, &small).unwrap();
        let reused_large = reused.render(&raster, &large).unwrap();

        let mut fresh = CpuRenderer::new(canvas, RenderSettings::default()).unwrap();
        let fresh_large = fresh.render(&raster, &large).unwrap();

        assert_eq!(reused_large.data, fresh_large.data);
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        let canvas = Canvas {
            width: 70_000,
            height: 16,
        };
        assert!(CpuRenderer::new(canvas, RenderSettings::default()).is_err());
    }
}
