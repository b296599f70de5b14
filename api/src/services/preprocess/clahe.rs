//! Contrast-limited adaptive histogram equalization on a single 8-bit plane

const BINS: usize = 256;

/// Equalize `plane` (row-major, `width * height`) using a `grid x grid` tile layout.
///
/// `clip_limit` is relative to the uniform bin height (`area / 256`); values <= 0
/// disable clipping. Tile mappings are blended bilinearly between tile centres.
pub fn equalize(plane: &[u8], width: u32, height: u32, clip_limit: f32, grid: u32) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return plane.to_vec();
    }

    let tiles_x = (grid as usize).clamp(1, width);
    let tiles_y = (grid as usize).clamp(1, height);

    let mut luts = vec![[0u8; BINS]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        let (y0, y1) = (ty * height / tiles_y, (ty + 1) * height / tiles_y);
        for tx in 0..tiles_x {
            let (x0, x1) = (tx * width / tiles_x, (tx + 1) * width / tiles_x);

            let mut hist = [0u32; BINS];
            for y in y0..y1 {
                for &v in &plane[y * width + x0..y * width + x1] {
                    hist[v as usize] += 1;
                }
            }
            let area = ((y1 - y0) * (x1 - x0)) as u32;
            luts[ty * tiles_x + tx] = tile_lut(&mut hist, area, clip_limit);
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;

    let mut out = vec![0u8; plane.len()];
    for y in 0..height {
        let (ty0, ty1, wy) = neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx0, tx1, wx) = neighbours(x, tile_w, tiles_x);
            let v = plane[y * width + x] as usize;

            let top = (1.0 - wx) * luts[ty0 * tiles_x + tx0][v] as f32
                + wx * luts[ty0 * tiles_x + tx1][v] as f32;
            let bottom = (1.0 - wx) * luts[ty1 * tiles_x + tx0][v] as f32
                + wx * luts[ty1 * tiles_x + tx1][v] as f32;
            out[y * width + x] = ((1.0 - wy) * top + wy * bottom).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Clip, redistribute, and integrate one tile histogram into a lookup table
fn tile_lut(hist: &mut [u32; BINS], area: u32, clip_limit: f32) -> [u8; BINS] {
    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);

        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let per_bin = excess / BINS as u32;
        let residual = (excess % BINS as u32) as usize;
        for bin in hist.iter_mut() {
            *bin += per_bin;
        }
        if residual > 0 {
            let step = (BINS / residual).max(1);
            for bin in hist.iter_mut().step_by(step).take(residual) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; BINS];
    let mut cumulative = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// The two tile indices around `pos` along one axis and the weight of the second
fn neighbours(pos: usize, tile_size: f32, tiles: usize) -> (usize, usize, f32) {
    let t = (pos as f32 + 0.5) / tile_size - 0.5;
    let lower = t.floor();
    let weight = t - lower;
    let last = tiles as i64 - 1;
    let first = (lower as i64).clamp(0, last) as usize;
    let second = (lower as i64 + 1).clamp(0, last) as usize;
    (first, second, weight)
}
