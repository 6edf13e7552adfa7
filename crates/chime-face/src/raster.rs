//! Grayscale raster helpers shared by the detector and the embedder.

/// Bilinear-resize a grayscale image.
pub fn resize_bilinear(src: &[u8], sw: usize, sh: usize, dw: usize, dh: usize) -> Vec<u8> {
    if sw == 0 || sh == 0 || dw == 0 || dh == 0 {
        return vec![0; dw * dh];
    }

    let x_ratio = sw as f32 / dw as f32;
    let y_ratio = sh as f32 / dh as f32;
    let mut dst = vec![0u8; dw * dh];

    for y in 0..dh {
        let src_y = (y as f32 + 0.5) * y_ratio - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, sh as i32 - 1) as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..dw {
            let src_x = (x as f32 + 0.5) * x_ratio - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, sw as i32 - 1) as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let top = src[y0 * sw + x0] as f32 * (1.0 - fx) + src[y0 * sw + x1] as f32 * fx;
            let bot = src[y1 * sw + x0] as f32 * (1.0 - fx) + src[y1 * sw + x1] as f32 * fx;
            let val = top * (1.0 - fy) + bot * fy;

            dst[y * dw + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }

    dst
}

/// Copy a `cw`×`ch` window starting at (`x0`, `y0`) out of the source
/// image. Pixels falling outside the source are zero-filled, so crops
/// near a frame edge stay rectangular.
pub fn crop(src: &[u8], sw: usize, sh: usize, x0: i32, y0: i32, cw: usize, ch: usize) -> Vec<u8> {
    let mut dst = vec![0u8; cw * ch];

    for y in 0..ch {
        let sy = y0 + y as i32;
        if sy < 0 || sy >= sh as i32 {
            continue;
        }
        for x in 0..cw {
            let sx = x0 + x as i32;
            if sx < 0 || sx >= sw as i32 {
                continue;
            }
            dst[y * cw + x] = src[sy as usize * sw + sx as usize];
        }
    }

    dst
}
