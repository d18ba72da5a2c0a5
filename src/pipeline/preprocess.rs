//! Preprocessing: bound the image size, then binarize it.
//!
//! Both steps exist to help a small vision model read text:
//!
//! * **Resize** caps the longest edge (1200 px by default). Phone photos at
//!   4000 px cost many more image tokens without adding legibility. The
//!   downscale uses area averaging, which behaves like a box low-pass filter
//!   and avoids the moiré that point-sampling produces on fine print.
//! * **Binarize** converts to grayscale and applies an adaptive Gaussian
//!   threshold. A global threshold fails on uneven lighting (shadows across a
//!   receipt); comparing each pixel to its own neighbourhood does not.
//!
//! Everything here is pure CPU work on `image` buffers, with no I/O; callers
//! run it inside `spawn_blocking`.

use crate::config::ExtractorConfig;
use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

/// Resize and binarize in one go, with the parameters from `config`.
pub fn preprocess(img: RgbImage, config: &ExtractorConfig) -> GrayImage {
    let resized = resize(img, config.max_dimension);
    binarize(&resized, config.block_size, config.threshold_c)
}

/// Output dimensions for an image whose longer side must not exceed
/// `max_dimension`, or `None` when no resize is needed.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longer = width.max(height);
    if longer <= max_dimension {
        return None;
    }
    let scale = max_dimension as f64 / longer as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    Some((w, h))
}

/// Bound the longer side of `img` to `max_dimension`, preserving aspect ratio.
///
/// Returns the input untouched when it already fits.
pub fn resize(img: RgbImage, max_dimension: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    match target_dimensions(w, h, max_dimension) {
        None => img,
        Some((dw, dh)) => {
            debug!("Resizing {}x{} → {}x{} (area)", w, h, dw, dh);
            resize_area(&img, dw, dh)
        }
    }
}

/// One output sample: source indices and their normalized overlap weights.
type Taps = Vec<(usize, f32)>;

/// Overlap weights for area-averaging `src_len` samples down to `dst_len`.
///
/// Output sample `d` covers the source interval `[d·s, (d+1)·s)` with
/// `s = src_len / dst_len`; every source sample contributes in proportion to
/// how much of that interval it overlaps.
fn area_taps(src_len: u32, dst_len: u32) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;
    let src_end = src_len as f64;

    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (start + scale).min(src_end);
            let span = end - start;
            let mut taps = Vec::with_capacity(scale.ceil() as usize + 1);
            let mut s = start.floor() as usize;
            while (s as f64) < end && s < src_len as usize {
                let overlap = end.min(s as f64 + 1.0) - start.max(s as f64);
                if overlap > 1e-9 {
                    taps.push((s, (overlap / span) as f32));
                }
                s += 1;
            }
            taps
        })
        .collect()
}

/// Area-averaging resize to exactly `dst_w × dst_h`. Separable: rows first,
/// then columns, accumulating in `f32`.
fn resize_area(img: &RgbImage, dst_w: u32, dst_h: u32) -> RgbImage {
    let (src_w, src_h) = img.dimensions();
    let x_taps = area_taps(src_w, dst_w);
    let y_taps = area_taps(src_h, dst_h);
    let raw = img.as_raw();

    // Horizontal pass: src_h rows × dst_w columns × 3 channels.
    let mut horiz = vec![0f32; src_h as usize * dst_w as usize * 3];
    for y in 0..src_h as usize {
        let row = &raw[y * src_w as usize * 3..(y + 1) * src_w as usize * 3];
        let out = &mut horiz[y * dst_w as usize * 3..(y + 1) * dst_w as usize * 3];
        for (dx, taps) in x_taps.iter().enumerate() {
            let mut acc = [0f32; 3];
            for &(sx, w) in taps {
                for c in 0..3 {
                    acc[c] += row[sx * 3 + c] as f32 * w;
                }
            }
            out[dx * 3..dx * 3 + 3].copy_from_slice(&acc);
        }
    }

    // Vertical pass.
    let mut out = RgbImage::new(dst_w, dst_h);
    let stride = dst_w as usize * 3;
    for (dy, taps) in y_taps.iter().enumerate() {
        for dx in 0..dst_w as usize {
            let mut acc = [0f32; 3];
            for &(sy, w) in taps {
                let base = sy * stride + dx * 3;
                for c in 0..3 {
                    acc[c] += horiz[base + c] * w;
                }
            }
            let px = out.get_pixel_mut(dx as u32, dy as u32);
            for c in 0..3 {
                px.0[c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// Convert to grayscale with the BT.601 luma weights.
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000;
        Luma([luma as u8])
    })
}

/// Grayscale + adaptive Gaussian threshold.
///
/// A pixel becomes white (255) when it is brighter than its Gaussian-weighted
/// `block_size × block_size` neighbourhood mean minus `c`, black (0)
/// otherwise. `block_size` must be odd; config validation guarantees it.
pub fn binarize(img: &RgbImage, block_size: u32, c: i32) -> GrayImage {
    let gray = to_grayscale(img);
    let mean = gaussian_blur(&gray, block_size);

    let (w, h) = gray.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let src = gray.get_pixel(x, y).0[0] as i32;
        let local = mean.get_pixel(x, y).0[0] as i32;
        if src - local > -c {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Normalized 1-D Gaussian kernel of odd length `ksize`.
///
/// Sigma is derived from the size as `0.3·((ksize − 1)·0.5 − 1) + 0.8`, the
/// usual convention for "Gaussian of this window" when no sigma is given.
pub fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    let sigma = 0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (ksize as i64 - 1) / 2;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let raw: Vec<f64> = (-half..=half)
        .map(|i| (-((i * i) as f64) / two_sigma_sq).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Separable Gaussian blur with replicated borders, rounded back to `u8`.
fn gaussian_blur(img: &GrayImage, ksize: u32) -> GrayImage {
    let kernel = gaussian_kernel(ksize);
    let half = (ksize / 2) as i64;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let (wi, hi) = (w as i64, h as i64);
    let raw = img.as_raw();

    let mut horiz = vec![0f32; (w * h) as usize];
    for y in 0..hi {
        let row = &raw[(y * wi) as usize..((y + 1) * wi) as usize];
        for x in 0..wi {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i64 - half).clamp(0, wi - 1);
                acc += row[sx as usize] as f32 * weight;
            }
            horiz[(y * wi + x) as usize] = acc;
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = 0f32;
        for (k, weight) in kernel.iter().enumerate() {
            let sy = (y as i64 + k as i64 - half).clamp(0, hi - 1);
            acc += horiz[(sy * wi + x as i64) as usize] * weight;
        }
        Luma([acc.round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::collections::BTreeSet;

    fn distinct_values(img: &GrayImage) -> BTreeSet<u8> {
        img.pixels().map(|p| p.0[0]).collect()
    }

    #[test]
    fn small_image_is_untouched() {
        let img = RgbImage::from_fn(800, 600, |x, y| Rgb([x as u8, y as u8, 7]));
        let out = resize(img.clone(), 1200);
        assert_eq!(out, img);
    }

    #[test]
    fn exact_bound_is_untouched() {
        let img = RgbImage::from_pixel(1200, 300, Rgb([1, 2, 3]));
        let out = resize(img.clone(), 1200);
        assert_eq!(out, img);
    }

    #[test]
    fn landscape_is_bounded() {
        let img = RgbImage::from_pixel(2000, 1000, Rgb([200, 100, 50]));
        let out = resize(img, 1200);
        assert_eq!(out.dimensions(), (1200, 600));
        // Uniform colour survives averaging.
        assert_eq!(out.get_pixel(599, 299).0, [200, 100, 50]);
    }

    #[test]
    fn portrait_is_bounded_with_aspect_ratio() {
        let img = RgbImage::new(1001, 3001);
        let out = resize(img, 1200);
        let (w, h) = out.dimensions();
        assert_eq!(h, 1200);
        let ratio_in = 1001.0 / 3001.0;
        let ratio_out = w as f64 / h as f64;
        assert!((ratio_in - ratio_out).abs() < 1.0 / 1200.0 + 1e-9);
    }

    #[test]
    fn extreme_strip_keeps_one_pixel() {
        assert_eq!(target_dimensions(10_000, 3, 1200), Some((1200, 1)));
    }

    #[test]
    fn halving_averages_blocks() {
        // 4x2 image: left 2x2 block black, right 2x2 block white.
        let img = RgbImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let out = resize_area(&img, 2, 1);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn fractional_scale_weights_partial_overlap() {
        let img = RgbImage::from_fn(3, 1, |x, _| {
            let v = (x * 90) as u8;
            Rgb([v, v, v])
        });
        let out = resize_area(&img, 2, 1);
        // [0, 1.5) → (0·1 + 90·0.5) / 1.5 = 30; [1.5, 3) → (90·0.5 + 180·1) / 1.5 = 150
        assert_eq!(out.get_pixel(0, 0).0[0], 30);
        assert_eq!(out.get_pixel(1, 0).0[0], 150);
    }

    #[test]
    fn area_taps_sum_to_one() {
        for taps in area_taps(2000, 1200) {
            let sum: f32 = taps.iter().map(|(_, w)| w).sum();
            assert!((sum - 1.0).abs() < 1e-4, "sum = {sum}");
        }
    }

    #[test]
    fn grayscale_weights() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let g = to_grayscale(&img);
        assert_eq!(g.get_pixel(0, 0).0[0], 76);
        assert_eq!(g.get_pixel(1, 0).0[0], 150);
        assert_eq!(g.get_pixel(2, 0).0[0], 29);
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(17);
        assert_eq!(k.len(), 17);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for i in 0..8 {
            assert!((k[i] - k[16 - i]).abs() < 1e-7);
        }
        assert!(k[8] > k[7]);
    }

    #[test]
    fn binarize_is_two_level() {
        // Smooth gradient with a superimposed dark grid, like uneven lighting.
        let img = RgbImage::from_fn(120, 80, |x, y| {
            let base = (40 + x + y) as u8;
            if x % 11 == 0 || y % 13 == 0 {
                Rgb([base / 4, base / 4, base / 4])
            } else {
                Rgb([base, base, base])
            }
        });
        let out = binarize(&img, 17, 7);
        let values = distinct_values(&out);
        assert_eq!(values, BTreeSet::from([0, 255]));
    }

    #[test]
    fn uniform_image_is_all_white() {
        let img = RgbImage::from_pixel(40, 40, Rgb([90, 90, 90]));
        let out = binarize(&img, 17, 7);
        assert_eq!(distinct_values(&out), BTreeSet::from([255]));
    }

    #[test]
    fn thin_dark_stroke_survives_shadow() {
        // Right half is in shadow; the stroke must be black on both sides.
        let img = RgbImage::from_fn(100, 40, |x, y| {
            let paper = if x < 50 { 230 } else { 110 };
            if y == 20 {
                Rgb([paper / 3, paper / 3, paper / 3])
            } else {
                Rgb([paper, paper, paper])
            }
        });
        let out = binarize(&img, 17, 7);
        assert_eq!(out.get_pixel(10, 20).0[0], 0);
        assert_eq!(out.get_pixel(90, 20).0[0], 0);
        assert_eq!(out.get_pixel(10, 5).0[0], 255);
        assert_eq!(out.get_pixel(90, 5).0[0], 255);
    }

    #[test]
    fn preprocess_uses_config() {
        let config = ExtractorConfig::builder().max_dimension(50).build().unwrap();
        let img = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        let out = preprocess(img, &config);
        assert_eq!(out.dimensions(), (50, 25));
    }
}
