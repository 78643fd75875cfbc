use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};

/// Callback used to nudge the owning event loop when background work lands.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

const DEFAULT_BUILTIN_SIZE: u32 = 64;

/// Largest procedural glow, in pixels per side.
pub const MAX_BUILTIN_SIZE: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("failed to read sprite at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch sprite from {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode sprite: {0}")]
    Decode(#[from] image::ImageError),
    #[error("sprite image has no pixels")]
    Empty,
    #[error("sprite pixel buffer holds {actual} bytes, expected {expected}")]
    Size { expected: usize, actual: usize },
    #[error("failed to start sprite loader: {0}")]
    Worker(std::io::Error),
    #[error("sprite loader stopped without delivering a result")]
    Disconnected,
    #[error("sprite is {width}x{height} but the GPU accepts at most {max}x{max}")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Decoded RGBA8 sprite, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct SpriteImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl SpriteImage {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AssetLoadError> {
        if width == 0 || height == 0 {
            return Err(AssetLoadError::Empty);
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(AssetLoadError::Size {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decodes PNG, JPEG, BMP or GIF bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, AssetLoadError> {
        if bytes.is_empty() {
            return Err(AssetLoadError::Empty);
        }
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.into_raw())
    }

    /// Soft white disc whose alpha falls off quadratically from the centre.
    pub fn glow(size: u32) -> Self {
        let size = size.clamp(2, MAX_BUILTIN_SIZE);
        let half = size as f32 / 2.0;
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 + 0.5 - half) / half;
                let dy = (y as f32 + 0.5 - half) / half;
                let falloff = (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
                let alpha = (falloff * falloff * 255.0).round() as u8;
                pixels.extend_from_slice(&[255, 255, 255, alpha]);
            }
        }
        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Debug for SpriteImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Anything that can produce the point sprite. Runs on a worker thread.
pub trait SpriteFetch: Send + 'static {
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<SpriteImage, AssetLoadError>;
}

/// Where the point sprite comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpriteSource {
    File(PathBuf),
    Url(String),
    /// Procedural glow generated in memory.
    Builtin { size: u32 },
}

impl Default for SpriteSource {
    fn default() -> Self {
        SpriteSource::Builtin {
            size: DEFAULT_BUILTIN_SIZE,
        }
    }
}

impl FromStr for SpriteSource {
    type Err = std::convert::Infallible;

    /// `builtin` or `builtin:<size>` select the procedural glow, `http(s)://`
    /// prefixes select a download, anything else is a file path.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("builtin") {
            return Ok(SpriteSource::default());
        }
        if let Some(size) = trimmed
            .strip_prefix("builtin:")
            .and_then(|size| size.parse::<u32>().ok())
        {
            return Ok(SpriteSource::Builtin {
                size: size.min(MAX_BUILTIN_SIZE),
            });
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(SpriteSource::Url(trimmed.to_string()));
        }
        Ok(SpriteSource::File(PathBuf::from(trimmed)))
    }
}

impl fmt::Display for SpriteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpriteSource::File(path) => write!(f, "{}", path.display()),
            SpriteSource::Url(url) => f.write_str(url),
            SpriteSource::Builtin { size } => write!(f, "builtin:{size}"),
        }
    }
}

impl SpriteFetch for SpriteSource {
    fn describe(&self) -> String {
        self.to_string()
    }

    fn fetch(&self) -> Result<SpriteImage, AssetLoadError> {
        match self {
            SpriteSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|source| AssetLoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                SpriteImage::decode(&bytes)
            }
            SpriteSource::Url(url) => {
                let http = |source| AssetLoadError::Http {
                    url: url.clone(),
                    source,
                };
                let bytes = reqwest::blocking::get(url)
                    .and_then(|response| response.error_for_status())
                    .and_then(|response| response.bytes())
                    .map_err(http)?;
                SpriteImage::decode(&bytes)
            }
            SpriteSource::Builtin { size } => Ok(SpriteImage::glow(*size)),
        }
    }
}

/// Shared "still wanted" flag. Background work checks it before delivering.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag; returns whether it was still set.
    pub fn stop(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight sprite load. The result arrives at most once.
pub struct SpriteLoad {
    receiver: Receiver<Result<SpriteImage, AssetLoadError>>,
    source: String,
}

impl SpriteLoad {
    pub fn spawn(fetch: Box<dyn SpriteFetch>, liveness: Liveness, waker: Waker) -> Self {
        let (sender, receiver) = bounded(1);
        let source = fetch.describe();
        let label = source.clone();
        let spawned = thread::Builder::new()
            .name("starfield-sprite".into())
            .spawn(move || {
                let result = fetch.fetch();
                if !liveness.is_alive() {
                    tracing::trace!(source = %label, "sprite load finished after teardown");
                    return;
                }
                if sender.send(result).is_ok() {
                    waker();
                }
            });
        if let Err(err) = spawned {
            // The closure (and its sender) was dropped, so report through a fresh channel.
            let (sender, receiver) = bounded(1);
            let _ = sender.send(Err(AssetLoadError::Worker(err)));
            return Self { receiver, source };
        }
        Self { receiver, source }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn poll(&self) -> Option<Result<SpriteImage, AssetLoadError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AssetLoadError::Disconnected)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for(load: &SpriteLoad) -> Result<SpriteImage, AssetLoadError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = load.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "sprite load timed out");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn parses_sources() {
        assert_eq!("builtin".parse::<SpriteSource>(), Ok(SpriteSource::Builtin { size: 64 }));
        assert_eq!("builtin:16".parse::<SpriteSource>(), Ok(SpriteSource::Builtin { size: 16 }));
        assert_eq!(
            "https://example.com/star.png".parse::<SpriteSource>(),
            Ok(SpriteSource::Url("https://example.com/star.png".into()))
        );
        assert_eq!(
            "textures/star.png".parse::<SpriteSource>(),
            Ok(SpriteSource::File(PathBuf::from("textures/star.png")))
        );
    }

    #[test]
    fn builtin_size_is_capped() {
        assert_eq!(
            "builtin:20000".parse::<SpriteSource>(),
            Ok(SpriteSource::Builtin {
                size: MAX_BUILTIN_SIZE
            })
        );
        let glow = SpriteImage::glow(u32::MAX);
        assert_eq!(glow.width(), MAX_BUILTIN_SIZE);
        assert_eq!(glow.pixels().len(), (MAX_BUILTIN_SIZE * MAX_BUILTIN_SIZE * 4) as usize);
    }

    #[test]
    fn glow_is_bright_in_the_middle_and_clear_at_corners() {
        let glow = SpriteImage::glow(16);
        assert_eq!(glow.pixels().len(), 16 * 16 * 4);
        let alpha = |x: usize, y: usize| glow.pixels()[(y * 16 + x) * 4 + 3];
        assert_eq!(alpha(0, 0), 0);
        assert!(alpha(8, 8) > 200);
    }

    #[test]
    fn rejects_mismatched_buffers() {
        assert!(matches!(
            SpriteImage::from_rgba(0, 4, Vec::new()),
            Err(AssetLoadError::Empty)
        ));
        assert!(matches!(
            SpriteImage::from_rgba(2, 2, vec![0; 15]),
            Err(AssetLoadError::Size {
                expected: 16,
                actual: 15
            })
        ));
        assert!(matches!(
            SpriteImage::decode(b"not an image"),
            Err(AssetLoadError::Decode(_))
        ));
    }

    #[test]
    fn loads_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("star.png");
        let mut canvas = image::RgbaImage::new(4, 2);
        canvas.put_pixel(1, 1, image::Rgba([10, 20, 30, 40]));
        canvas.save(&path).unwrap();

        let source = SpriteSource::File(path);
        let sprite = source.fetch().unwrap();
        assert_eq!((sprite.width(), sprite.height()), (4, 2));
        assert_eq!(&sprite.pixels()[(4 + 1) * 4..(4 + 1) * 4 + 4], &[10, 20, 30, 40]);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let source = SpriteSource::File(PathBuf::from("/definitely/not/here.png"));
        assert!(matches!(source.fetch(), Err(AssetLoadError::Io { .. })));
    }

    #[test]
    fn background_load_delivers_and_wakes() {
        let woken = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&woken);
        let load = SpriteLoad::spawn(
            Box::new(SpriteSource::Builtin { size: 8 }),
            Liveness::new(),
            Arc::new(move || flag.store(true, Ordering::SeqCst)),
        );
        assert_eq!(load.source(), "builtin:8");
        let sprite = wait_for(&load).unwrap();
        assert_eq!(sprite.width(), 8);
        assert!(woken.load(Ordering::SeqCst));
    }

    #[test]
    fn stopped_load_never_delivers() {
        let liveness = Liveness::new();
        assert!(liveness.stop());
        assert!(!liveness.stop());
        let load = SpriteLoad::spawn(
            Box::new(SpriteSource::Builtin { size: 8 }),
            liveness,
            Arc::new(|| {}),
        );
        assert!(matches!(wait_for(&load), Err(AssetLoadError::Disconnected)));
    }
}
