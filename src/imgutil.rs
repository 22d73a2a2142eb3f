use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, imageops};
use log::debug;

/// 送入 embedding 模型的标准查询尺寸
pub const QUERY_SIZE: u32 = 224;

/// 从字节内容检测图片的 MIME 类型，无法识别时回退到 image/png
pub fn detect_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        _ => "image/png",
    }
}

/// 把图片字节编码为前端可直接展示的 data URI
pub fn to_data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", detect_mime(bytes), STANDARD.encode(bytes))
}

/// 把前端传来的 data URI 还原为图片字节
///
/// 兼容裸 base64 字符串，解码失败时返回 None
pub fn from_data_uri(uri: &str) -> Option<Vec<u8>> {
    if uri.is_empty() {
        return None;
    }
    let b64 = match uri.split_once(";base64,") {
        Some((head, rest)) if head.starts_with("data:image/") => rest,
        _ => uri,
    };
    match STANDARD.decode(b64) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!("data URI 解码失败: {e}");
            None
        }
    }
}

/// 按用户框选区域裁剪图片，坐标截断取整并收缩到图片范围内
pub fn crop_image(img: &DynamicImage, x: f32, y: f32, width: f32, height: f32) -> DynamicImage {
    let (iw, ih) = (img.width(), img.height());
    let x = (x.max(0.0) as u32).min(iw.saturating_sub(1));
    let y = (y.max(0.0) as u32).min(ih.saturating_sub(1));
    let width = (width.max(0.0) as u32).min(iw - x).max(1);
    let height = (height.max(0.0) as u32).min(ih - y).max(1);
    img.crop_imm(x, y, width, height)
}

/// 等比缩放到 size×size 的正方形内，空余部分用白色填充
pub fn letterbox(img: &DynamicImage, size: u32) -> DynamicImage {
    let scaled = img.resize(size, size, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([255, 255, 255]));
    let x = i64::from((size - scaled.width()) / 2);
    let y = i64::from((size - scaled.height()) / 2);
    imageops::overlay(&mut canvas, &scaled.to_rgb8(), x, y);
    DynamicImage::ImageRgb8(canvas)
}

/// 归一化为 RGB 并重编码为 JPEG
pub fn to_rgb_jpeg(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

/// 用于预热请求的最小 1×1 白色 JPEG
pub fn warm_probe_jpeg() -> Result<Vec<u8>, image::ImageError> {
    to_rgb_jpeg(&DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 10, 10])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(&encode(ImageFormat::Jpeg)), "image/jpeg");
        assert_eq!(detect_mime(&encode(ImageFormat::Png)), "image/png");
        assert_eq!(detect_mime(&encode(ImageFormat::WebP)), "image/webp");
        // GIF 只识别魔数，不需要解码支持
        assert_eq!(detect_mime(b"GIF89a\x01\x00\x01\x00"), "image/gif");
    }

    #[test]
    fn test_detect_mime_fallback() {
        assert_eq!(detect_mime(b""), "image/png");
        assert_eq!(detect_mime(b"definitely not an image"), "image/png");
    }

    #[test]
    fn test_data_uri_roundtrip() {
        // 任意字节都应该能原样往返
        let payload = vec![0u8, 159, 146, 150, 255, 1];
        let uri = to_data_uri(&payload);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(from_data_uri(&uri).unwrap(), payload);
    }

    #[test]
    fn test_data_uri_mime_matches_content() {
        let jpeg = encode(ImageFormat::Jpeg);
        assert!(to_data_uri(&jpeg).starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_from_data_uri_bare_base64() {
        let encoded = STANDARD.encode(b"hello");
        assert_eq!(from_data_uri(&encoded).unwrap(), b"hello");
    }

    #[test]
    fn test_from_data_uri_invalid() {
        assert_eq!(from_data_uri(""), None);
        assert_eq!(from_data_uri("data:image/png;base64,@@@@"), None);
    }

    #[test]
    fn test_crop_image_clamps_to_bounds() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([0, 0, 0])));
        let cropped = crop_image(&img, 5.0, 5.0, 100.0, 100.0);
        assert_eq!((cropped.width(), cropped.height()), (5, 5));

        let cropped = crop_image(&img, -3.0, -3.0, 4.0, 4.0);
        assert_eq!((cropped.width(), cropped.height()), (4, 4));
    }

    #[test]
    fn test_letterbox_pads_to_square() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 50, Rgb([0, 0, 0])));
        let boxed = letterbox(&img, QUERY_SIZE);
        assert_eq!((boxed.width(), boxed.height()), (QUERY_SIZE, QUERY_SIZE));
        // 上下留白应为白色
        let rgb = boxed.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(QUERY_SIZE - 1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_to_rgb_jpeg() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        let jpeg = to_rgb_jpeg(&img).unwrap();
        assert_eq!(detect_mime(&jpeg), "image/jpeg");
    }

    #[test]
    fn test_warm_probe_is_tiny_jpeg() {
        let probe = warm_probe_jpeg().unwrap();
        let img = image::load_from_memory(&probe).unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
    }
}
