use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::ZapError;
use crate::api::models::zapping::FrameRef;

/// 文件名末尾的时间戳：10 位秒级或 13 位毫秒级，可带小数部分
static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])(\d{10}|\d{13})(?:[._](\d{1,6}))?$").expect("valid timestamp pattern")
});

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 采集帧（不含像素，由帧源持有）
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub identifier: String,
    /// 采集时间（秒）
    pub timestamp: f64,
    /// 在本批次中的序号
    pub index: usize,
    pub path: Option<PathBuf>,
}

impl Frame {
    pub fn to_ref(&self) -> FrameRef {
        FrameRef {
            identifier: self.identifier.clone(),
            timestamp: self.timestamp,
            index: self.index,
        }
    }
}

/// 按时间排序并截断后的帧批次
#[derive(Debug, Clone, Default)]
pub struct FrameBatch {
    pub frames: Vec<Frame>,
    /// 截断前满足时间条件的帧数
    pub available: usize,
}

impl FrameBatch {
    fn from_candidates(
        mut candidates: Vec<(String, f64, Option<PathBuf>)>,
        reference_ts: f64,
        max_images: usize,
    ) -> Self {
        candidates.retain(|(_, ts, _)| *ts >= reference_ts);
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let available = candidates.len();
        let frames = candidates
            .into_iter()
            .take(max_images)
            .enumerate()
            .map(|(index, (identifier, timestamp, path))| Frame {
                identifier,
                timestamp,
                index,
                path,
            })
            .collect();

        Self { frames, available }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// 分析区域（像素坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AnalysisRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 覆盖整帧的区域
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn validate_shape(&self) -> Result<(), ZapError> {
        if self.width == 0 || self.height == 0 {
            return Err(ZapError::InvalidRegion(format!(
                "{}x{} at ({}, {}) has no area",
                self.width, self.height, self.x, self.y
            )));
        }
        Ok(())
    }

    pub fn check_bounds(&self, frame_width: u32, frame_height: u32) -> Result<(), ZapError> {
        self.validate_shape()?;
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        if right > frame_width as u64 || bottom > frame_height as u64 {
            return Err(ZapError::InvalidRegion(format!(
                "{}x{} at ({}, {}) exceeds frame {}x{}",
                self.width, self.height, self.x, self.y, frame_width, frame_height
            )));
        }
        Ok(())
    }

    /// 区域内亮度值（行优先）
    pub fn luma_values<'a>(&self, luma: &'a GrayImage) -> impl Iterator<Item = u8> + 'a {
        let (x0, y0, w, h) = (self.x, self.y, self.width, self.height);
        (y0..y0 + h).flat_map(move |y| (x0..x0 + w).map(move |x| luma.get_pixel(x, y).0[0]))
    }

    /// 拷贝区域内亮度平面
    pub fn crop_luma(&self, luma: &GrayImage) -> Vec<u8> {
        self.luma_values(luma).collect()
    }
}

/// 已解码的帧
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub luma: GrayImage,
    pub image: DynamicImage,
}

impl DecodedFrame {
    pub fn new(frame: Frame, image: DynamicImage) -> Self {
        let luma = image.to_luma8();
        Self { frame, luma, image }
    }

    pub fn width(&self) -> u32 {
        self.luma.width()
    }

    pub fn height(&self) -> u32 {
        self.luma.height()
    }
}

/// 帧源：按时间筛选帧并负责解码
pub trait FrameSource: Send + Sync {
    fn frames_since(&self, reference_ts: f64, max_images: usize) -> Result<FrameBatch, ZapError>;

    fn load(&self, frame: &Frame) -> Result<DynamicImage, ZapError>;
}

/// 采集目录帧源，时间戳取自文件名
pub struct DirectoryFrameSource {
    dir: PathBuf,
}

impl DirectoryFrameSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSource for DirectoryFrameSource {
    fn frames_since(&self, reference_ts: f64, max_images: usize) -> Result<FrameBatch, ZapError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            warn!("📂 Cannot read frame directory {:?}: {}", self.dir, e);
            ZapError::NotFound(self.dir.clone())
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("⚠️ Skipping unreadable entry in {:?}: {}", self.dir, e);
                    continue;
                }
            };
            let path = entry.path();
            if !has_image_extension(&path) {
                continue;
            }
            let identifier = entry.file_name().to_string_lossy().into_owned();
            match path.file_stem().and_then(|s| s.to_str()).and_then(parse_timestamp) {
                Some(ts) => candidates.push((identifier, ts, Some(path))),
                None => warn!("⚠️ No timestamp in frame name {}, skipped", identifier),
            }
        }

        let batch = FrameBatch::from_candidates(candidates, reference_ts, max_images);
        debug!(
            "📊 {} frames since {:.3}s in {:?}, using {}",
            batch.available,
            reference_ts,
            self.dir,
            batch.frames.len()
        );
        Ok(batch)
    }

    fn load(&self, frame: &Frame) -> Result<DynamicImage, ZapError> {
        let path = frame
            .path
            .clone()
            .unwrap_or_else(|| self.dir.join(&frame.identifier));
        image::open(&path).map_err(|source| ZapError::Decode {
            frame: frame.identifier.clone(),
            source,
        })
    }
}

/// 内存帧源，适用于已持有解码帧的采集管线
#[derive(Default)]
pub struct InMemoryFrameSource {
    frames: Vec<(String, f64, DynamicImage)>,
}

impl InMemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标识符在帧源内唯一，重复时返回 `DuplicateFrame`
    pub fn push(
        &mut self,
        identifier: impl Into<String>,
        timestamp: f64,
        image: DynamicImage,
    ) -> Result<(), ZapError> {
        let identifier = identifier.into();
        if self.frames.iter().any(|(id, _, _)| *id == identifier) {
            return Err(ZapError::DuplicateFrame(identifier));
        }
        self.frames.push((identifier, timestamp, image));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for InMemoryFrameSource {
    fn frames_since(&self, reference_ts: f64, max_images: usize) -> Result<FrameBatch, ZapError> {
        let candidates = self
            .frames
            .iter()
            .map(|(id, ts, _)| (id.clone(), *ts, None))
            .collect();
        Ok(FrameBatch::from_candidates(candidates, reference_ts, max_images))
    }

    fn load(&self, frame: &Frame) -> Result<DynamicImage, ZapError> {
        self.frames
            .iter()
            .find(|(id, _, _)| *id == frame.identifier)
            .map(|(_, _, image)| image.clone())
            .ok_or_else(|| ZapError::NotFound(PathBuf::from(&frame.identifier)))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// 从文件名（不含扩展名）解析采集时间（秒）
pub fn parse_timestamp(stem: &str) -> Option<f64> {
    let caps = TIMESTAMP_RE.captures(stem)?;
    let digits = caps.get(1)?.as_str();
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("0");
    let value: f64 = format!("{}.{}", digits, fraction).parse().ok()?;

    if digits.len() == 13 {
        Some(value / 1000.0)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn gray_image(width: u32, height: u32, fill: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_pixel(width, height, Luma([fill])))
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("capture_1712345678"), Some(1712345678.0));
        assert_eq!(parse_timestamp("capture_1712345678_250"), Some(1712345678.25));
        assert_eq!(parse_timestamp("capture_1712345678.5"), Some(1712345678.5));
        assert_eq!(parse_timestamp("1712345678250"), Some(1712345678.25));
        assert_eq!(parse_timestamp("capture_thumbnail"), None);
        assert_eq!(parse_timestamp("frame_0001"), None);
    }

    #[test]
    fn test_region_bounds() {
        let region = AnalysisRegion::new(10, 10, 20, 20);
        assert!(region.check_bounds(30, 30).is_ok());
        assert!(matches!(
            region.check_bounds(25, 30),
            Err(ZapError::InvalidRegion(_))
        ));
        assert!(AnalysisRegion::new(0, 0, 0, 5).validate_shape().is_err());
    }

    #[test]
    fn test_region_crop_luma() {
        let mut img: GrayImage = ImageBuffer::from_pixel(4, 4, Luma([0u8]));
        img.put_pixel(1, 1, Luma([200]));
        let values = AnalysisRegion::new(1, 1, 2, 2).crop_luma(&img);
        assert_eq!(values, vec![200, 0, 0, 0]);
    }

    #[test]
    fn test_directory_source_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        for (name, fill) in [
            ("capture_1700000003.jpg", 10u8),
            ("capture_1700000001.jpg", 20),
            ("capture_1700000002.jpg", 30),
            ("capture_1699999999.jpg", 40),
            ("notes.txt", 0),
            ("capture_latest.jpg", 50),
        ] {
            let path = dir.path().join(name);
            if name.ends_with(".txt") {
                fs::write(&path, b"not an image").unwrap();
            } else {
                gray_image(8, 8, fill).to_rgb8().save(&path).unwrap();
            }
        }

        let source = DirectoryFrameSource::new(dir.path());
        let batch = source.frames_since(1700000000.0, 2).unwrap();
        assert_eq!(batch.available, 3);
        assert_eq!(batch.frames.len(), 2);
        assert_eq!(batch.frames[0].identifier, "capture_1700000001.jpg");
        assert_eq!(batch.frames[0].index, 0);
        assert_eq!(batch.frames[1].identifier, "capture_1700000002.jpg");
        assert_eq!(batch.frames[1].index, 1);

        let image = source.load(&batch.frames[0]).unwrap();
        assert_eq!(image.width(), 8);
    }

    #[test]
    fn test_directory_source_missing_dir() {
        let source = DirectoryFrameSource::new("/definitely/not/a/capture/dir");
        assert!(matches!(
            source.frames_since(0.0, 10),
            Err(ZapError::NotFound(_))
        ));
    }

    #[test]
    fn test_directory_source_nothing_qualifies() {
        let dir = tempfile::tempdir().unwrap();
        gray_image(8, 8, 0)
            .to_rgb8()
            .save(dir.path().join("capture_1600000000.png"))
            .unwrap();
        let batch = DirectoryFrameSource::new(dir.path())
            .frames_since(1700000000.0, 10)
            .unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.available, 0);
    }

    #[test]
    fn test_corrupt_frame_fails_decode() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("capture_1700000001.jpg"), b"garbage").unwrap();
        let source = DirectoryFrameSource::new(dir.path());
        let batch = source.frames_since(0.0, 10).unwrap();
        assert!(matches!(
            source.load(&batch.frames[0]),
            Err(ZapError::Decode { .. })
        ));
    }

    #[test]
    fn test_in_memory_source() {
        let mut source = InMemoryFrameSource::new();
        source.push("b", 2.0, gray_image(4, 4, 1)).unwrap();
        source.push("a", 1.0, gray_image(4, 4, 2)).unwrap();
        let batch = source.frames_since(0.5, 10).unwrap();
        assert_eq!(batch.frames[0].identifier, "a");
        let decoded = DecodedFrame::new(batch.frames[0].clone(), source.load(&batch.frames[0]).unwrap());
        assert_eq!(decoded.luma.get_pixel(0, 0).0[0], 2);
    }

    #[test]
    fn test_in_memory_source_rejects_duplicate_identifier() {
        let mut source = InMemoryFrameSource::new();
        source.push("shot", 1.0, gray_image(4, 4, 1)).unwrap();
        assert!(matches!(
            source.push("shot", 2.0, gray_image(4, 4, 9)),
            Err(ZapError::DuplicateFrame(id)) if id == "shot"
        ));
        assert_eq!(source.len(), 1);

        let batch = source.frames_since(0.0, 10).unwrap();
        assert_eq!(source.load(&batch.frames[0]).unwrap().to_luma8().get_pixel(0, 0).0[0], 1);
    }
}
