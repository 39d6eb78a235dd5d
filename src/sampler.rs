use crate::{
    core::FrameRGBA,
    error::{DotcamError, DotcamResult},
    style::{RasterBuffer, StyleConfig},
};

/// Downsample a full-resolution frame into the raster sample grid.
///
/// Each output sample is the box average of its `cell_size x cell_size` source
/// region; cells on the right/bottom edge are clipped to the frame. The output
/// dimensions are always `floor(frame dim / cell_size)` per axis.
pub fn sample_frame(frame: &FrameRGBA, style: &StyleConfig) -> DotcamResult<RasterBuffer> {
    style.validate()?;
    frame.validate()?;

    let cell = style.cell_size();
    let (grid_w, grid_h) = style.grid_dims(frame.canvas());
    let mut raster = RasterBuffer::new(grid_w, grid_h);
    if grid_w == 0 || grid_h == 0 {
        return Ok(raster);
    }

    let stride = frame.width as usize * 4;
    for gy in 0..grid_h {
        let y0 = (gy * cell) as usize;
        let y1 = ((gy + 1) * cell).min(frame.height) as usize;
        for gx in 0..grid_w {
            let x0 = (gx * cell) as usize;
            let x1 = ((gx + 1) * cell).min(frame.width) as usize;

            let mut acc = [0u64; 4];
            for y in y0..y1 {
                let row = &frame.data[y * stride..(y + 1) * stride];
                for px in row[x0 * 4..x1 * 4].chunks_exact(4) {
                    acc[0] += u64::from(px[0]);
                    acc[1] += u64::from(px[1]);
                    acc[2] += u64::from(px[2]);
                    acc[3] += u64::from(px[3]);
                }
            }

            let count = ((y1 - y0) * (x1 - x0)) as u64;
            if count == 0 {
                return Err(DotcamError::render(format!(
                    "empty sample cell at ({gx},{gy}) (frame {}x{}, cell {cell})",
                    frame.width, frame.height
                )));
            }

            let off = (gy as usize * grid_w as usize + gx as usize) * 4;
            for c in 0..4 {
                raster.data[off + c] = ((acc[c] + count / 2) / count) as u8;
            }
        }
    }

    Ok(raster)
}
