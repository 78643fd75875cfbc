use glam::{EulerRot, Mat4, Vec3};
use rand::Rng;

/// Drawable area in logical pixels plus the display's scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    /// Effective device pixel ratio, capped at `max_ratio`.
    pub fn pixel_ratio(&self, max_ratio: f64) -> f64 {
        let ratio = if self.scale_factor.is_finite() && self.scale_factor > 0.0 {
            self.scale_factor
        } else {
            1.0
        };
        ratio.min(max_ratio.max(f64::MIN_POSITIVE))
    }

    /// Size of the offscreen drawing buffer.
    pub fn buffer_size(&self, max_ratio: f64) -> (u32, u32) {
        let ratio = self.pixel_ratio(max_ratio);
        (
            scale_dimension(self.width, ratio),
            scale_dimension(self.height, ratio),
        )
    }

    /// Size of the presentable surface in physical pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        let ratio = self.pixel_ratio(f64::MAX);
        (
            scale_dimension(self.width, ratio),
            scale_dimension(self.height, ratio),
        )
    }
}

fn scale_dimension(logical: u32, ratio: f64) -> u32 {
    ((logical as f64 * ratio).round() as u32).max(1)
}

/// Fixed camera parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSpec {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Distance along +Z from the origin the camera sits at, looking down -Z.
    pub distance: f32,
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            distance: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerspectiveCamera {
    spec: CameraSpec,
    aspect: f32,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(spec: CameraSpec, aspect: f32) -> Self {
        let mut camera = Self {
            spec,
            aspect,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera
    }

    pub fn spec(&self) -> CameraSpec {
        self.spec
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection();
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.spec.distance))
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view()
    }

    fn update_projection(&mut self) {
        self.projection = Mat4::perspective_rh(
            self.spec.fov_y_degrees.to_radians(),
            self.aspect,
            self.spec.near,
            self.spec.far,
        );
    }
}

/// Last pointer position in normalised device coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
}

impl PointerState {
    /// Maps a logical-pixel position inside `viewport` to `[-1, 1]` on both
    /// axes with +y up. Positions outside the viewport are clamped.
    pub fn from_pixels(x: f64, y: f64, viewport: &Viewport) -> Self {
        let width = viewport.width.max(1) as f64;
        let height = viewport.height.max(1) as f64;
        let nx = (x / width) * 2.0 - 1.0;
        let ny = -(y / height) * 2.0 + 1.0;
        Self {
            x: nx.clamp(-1.0, 1.0) as f32,
            y: ny.clamp(-1.0, 1.0) as f32,
        }
    }
}

/// Particle count and the axis-aligned box they are scattered through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSpec {
    pub count: usize,
    /// Full width of the box along x, y and z.
    pub extent: [f32; 3],
}

impl Default for ParticleSpec {
    fn default() -> Self {
        Self {
            count: 1500,
            extent: [60.0, 100.0, 20.0],
        }
    }
}

/// Angular spin plus how far the pointer tilts the cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    /// Radians per second around x and y.
    pub spin: [f32; 2],
    pub pointer_influence: f32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            spin: [0.3, 0.5],
            pointer_influence: 0.009,
        }
    }
}

impl MotionSettings {
    /// Rotation about x and y after `elapsed` seconds with the given pointer.
    pub fn rotation_at(&self, elapsed: f32, pointer: PointerState) -> [f32; 2] {
        [
            elapsed * self.spin[0] + pointer.y * self.pointer_influence,
            elapsed * self.spin[1] + pointer.x * self.pointer_influence,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 1.5,
            radius: 0.4,
            threshold: 0.1,
        }
    }
}

/// Randomly scattered points, generated once per controller.
#[derive(Debug, Clone)]
pub struct ParticleCloud {
    positions: Vec<[f32; 3]>,
    scales: Vec<f32>,
    rotation: [f32; 2],
}

impl ParticleCloud {
    /// Each coordinate is `(u - 0.5) * extent` with `u` uniform in `[0, 1)`;
    /// each scale is uniform in `[0, 1)`.
    pub fn generate<R: Rng + ?Sized>(spec: &ParticleSpec, rng: &mut R) -> Self {
        let mut positions = Vec::with_capacity(spec.count);
        let mut scales = Vec::with_capacity(spec.count);
        for _ in 0..spec.count {
            positions.push([
                (rng.gen::<f32>() - 0.5) * spec.extent[0],
                (rng.gen::<f32>() - 0.5) * spec.extent[1],
                (rng.gen::<f32>() - 0.5) * spec.extent[2],
            ]);
            scales.push(rng.gen::<f32>());
        }
        Self {
            positions,
            scales,
            rotation: [0.0, 0.0],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    pub fn rotation(&self) -> [f32; 2] {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: [f32; 2]) {
        self.rotation = rotation;
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_euler(EulerRot::XYZ, self.rotation[0], self.rotation[1], 0.0)
    }
}
