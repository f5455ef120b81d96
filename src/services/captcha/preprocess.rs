//! 验证码图片预处理
//!
//! 灰度 → 对比度/锐度增强 → 2 倍放大 → 中值滤波 →
//! 全局 Otsu 阈值与局部自适应阈值两种二值化 → 膨胀后腐蚀

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};

use crate::error::{AppError, AppResult};

/// `imageops::contrast` 的百分比参数，约等于把灰度差放大 2 倍
const CONTRAST_PERCENT: f32 = 41.4;
const UNSHARP_SIGMA: f32 = 1.0;
const UNSHARP_THRESHOLD: i32 = 0;
const UPSCALE: u32 = 2;
/// 自适应阈值的偏移量
const ADAPTIVE_C: f32 = 2.0;
/// 11x11 高斯窗口对应的 sigma
const ADAPTIVE_SIGMA: f32 = 2.0;

/// 解码图片字节
pub fn decode(bytes: &[u8]) -> AppResult<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// 解析 `data:image/...;base64,` 形式的内嵌图片，其它 src 返回 `None`
pub fn decode_data_url(src: &str) -> Option<AppResult<DynamicImage>> {
    let rest = src.trim().strip_prefix("data:image")?;
    let (_, payload) = rest.split_once("base64,")?;
    Some(
        BASE64
            .decode(payload.trim())
            .map_err(|e| AppError::Ocr(format!("内嵌验证码解码失败: {}", e)))
            .and_then(|bytes| decode(&bytes)),
    )
}

/// 生成两张二值化候选图：Otsu 全局阈值、自适应高斯阈值
pub fn binarize_candidates(image: &DynamicImage) -> Vec<GrayImage> {
    let gray = image.to_luma8();
    let enhanced = enhance(&gray);
    let (w, h) = enhanced.dimensions();
    let scaled = imageops::resize(&enhanced, w * UPSCALE, h * UPSCALE, FilterType::CatmullRom);
    let denoised = median3(&scaled);

    let global = threshold(&denoised, otsu_level(&denoised));
    let adaptive = adaptive_threshold(&denoised);

    vec![clean(&global), clean(&adaptive)]
}

/// 先拉伸对比度，再做反锐化掩模
fn enhance(image: &GrayImage) -> GrayImage {
    let contrasted = imageops::contrast(image, CONTRAST_PERCENT);
    imageops::unsharpen(&contrasted, UNSHARP_SIGMA, UNSHARP_THRESHOLD)
}

/// 3x3 中值滤波，边缘按最近像素延伸
pub fn median3(image: &GrayImage) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    let mut window = [0u8; 9];
    for y in 0..h {
        for x in 0..w {
            let mut i = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                    window[i] = image.get_pixel(sx, sy).0[0];
                    i += 1;
                }
            }
            window.sort_unstable();
            out.put_pixel(x, y, Luma([window[4]]));
        }
    }
    out
}

/// Otsu 自动阈值
pub fn otsu_level(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for p in image.pixels() {
        histogram[p.0[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 127;
    }
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut best = (0u8, f64::MIN);
    let mut weight_bg = 0u64;
    let mut sum_bg = 0f64;
    for (level, &count) in histogram.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += level as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let between = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);
        if between > best.1 {
            best = (level as u8, between);
        }
    }
    best.0
}

/// 大于阈值为白，其余为黑
pub fn threshold(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] > level { 255 } else { 0 };
    }
    out
}

/// 与高斯加权的邻域均值比较
fn adaptive_threshold(image: &GrayImage) -> GrayImage {
    let local = imageops::blur(image, ADAPTIVE_SIGMA);
    let mut out = image.clone();
    for (p, m) in out.pixels_mut().zip(local.pixels()) {
        p.0[0] = if p.0[0] as f32 > m.0[0] as f32 - ADAPTIVE_C { 255 } else { 0 };
    }
    out
}

/// 2x2 膨胀后腐蚀
fn clean(image: &GrayImage) -> GrayImage {
    erode2(&dilate2(image))
}

fn dilate2(image: &GrayImage) -> GrayImage {
    morph2(image, |a, b| a.max(b))
}

fn erode2(image: &GrayImage) -> GrayImage {
    morph2(image, |a, b| a.min(b))
}

fn morph2(image: &GrayImage, pick: impl Fn(u8, u8) -> u8) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    for y in 0..h {
        for x in 0..w {
            let mut v = image.get_pixel(x, y).0[0];
            for (sx, sy) in [(x.saturating_sub(1), y), (x, y.saturating_sub(1)), (x.saturating_sub(1), y.saturating_sub(1))] {
                v = pick(v, image.get_pixel(sx, sy).0[0]);
            }
            out.put_pixel(x, y, Luma([v]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| if x < w / 2 { Luma([40]) } else { Luma([210]) })
    }

    #[test]
    fn test_otsu_separates_two_tones() {
        let level = otsu_level(&two_tone(20, 10));
        assert!((40..210).contains(&level));
        let bin = threshold(&two_tone(20, 10), level);
        assert_eq!(bin.get_pixel(0, 0).0[0], 0);
        assert_eq!(bin.get_pixel(19, 0).0[0], 255);
    }

    #[test]
    fn test_enhance_widens_tone_gap() {
        let img = GrayImage::from_fn(60, 20, |x, _| if x < 30 { Luma([100]) } else { Luma([160]) });
        let out = enhance(&img);
        assert!(out.get_pixel(5, 10).0[0] < 90);
        assert!(out.get_pixel(54, 10).0[0] > 170);
    }

    #[test]
    fn test_median_removes_salt_pixel() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([0]));
        img.put_pixel(2, 2, Luma([255]));
        assert_eq!(median3(&img).get_pixel(2, 2).0[0], 0);
    }

    #[test]
    fn test_candidates_are_upscaled_binary_images() {
        let img = DynamicImage::ImageLuma8(two_tone(30, 12));
        let candidates = binarize_candidates(&img);
        assert_eq!(candidates.len(), 2);
        for c in &candidates {
            assert_eq!(c.dimensions(), (60, 24));
            assert!(c.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        }
    }

    #[test]
    fn test_data_url_detection() {
        assert!(decode_data_url("/captcha/securimage_show.php").is_none());
        let broken = decode_data_url("data:image/png;base64,@@@@");
        assert!(matches!(broken, Some(Err(_))));
    }
}
