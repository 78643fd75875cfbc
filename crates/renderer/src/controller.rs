//! Owner of the particle scene.
//!
//! The controller is driven from a single thread. Worker threads (the sprite
//! loader, theme writers) only push messages and call the waker; everything
//! they produce is applied in [`ParticleController::pump`].

use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver};
use rand::rngs::StdRng;
use rand::SeedableRng;
use theme::{Subscription, ThemeCell, ThemeMode};
use tracing::{debug, error, info};

use crate::backend::{FrameError, FrameInputs, SceneBackend};
use crate::material::{Rgb, ThemePreset};
use crate::scene::{ParticleCloud, PerspectiveCamera, PointerState, Viewport};
use crate::sprite::{AssetLoadError, Liveness, SpriteFetch, SpriteImage, SpriteLoad, Waker};
use crate::types::FieldSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Waiting on the sprite; nothing is drawn.
    Loading,
    Running,
    /// Sprite load failed; only the background is drawn.
    Degraded,
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// The loop has not started yet.
    Idle,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    AssetLoadFailure,
}

/// A failure the controller absorbed instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

pub struct ParticleController<B: SceneBackend> {
    backend: B,
    settings: FieldSettings,
    camera: PerspectiveCamera,
    viewport: Viewport,
    pointer: PointerState,
    theme: ThemeCell,
    theme_events: Receiver<ThemeMode>,
    theme_subscription: Option<Subscription>,
    sprite_load: Option<SpriteLoad>,
    rng: StdRng,
    cloud: Option<ParticleCloud>,
    material: Option<ThemePreset>,
    background: Rgb,
    phase: ControllerPhase,
    loop_started_at: Option<Instant>,
    frames_rendered: u64,
    liveness: Liveness,
    diagnostics: Vec<Diagnostic>,
}

impl<B: SceneBackend> ParticleController<B> {
    pub fn new(
        backend: B,
        viewport: Viewport,
        settings: FieldSettings,
        theme: &ThemeCell,
        sprite: Box<dyn SpriteFetch>,
        waker: Waker,
    ) -> Self {
        let camera = PerspectiveCamera::new(settings.camera, viewport.aspect());
        let mode = theme.get();
        let background = settings.presets.background_for(mode);
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (theme_tx, theme_events) = unbounded();
        let theme_waker = waker.clone();
        let theme_subscription = theme.subscribe(move |mode| {
            if theme_tx.send(mode).is_ok() {
                theme_waker();
            }
        });

        let liveness = Liveness::new();
        let source = sprite.describe();
        let sprite_load = SpriteLoad::spawn(sprite, liveness.clone(), waker);

        let mut controller = Self {
            backend,
            settings,
            camera,
            viewport,
            pointer: PointerState::default(),
            theme: theme.clone(),
            theme_events,
            theme_subscription: Some(theme_subscription),
            sprite_load: Some(sprite_load),
            rng,
            cloud: None,
            material: None,
            background,
            phase: ControllerPhase::Loading,
            loop_started_at: None,
            frames_rendered: 0,
            liveness,
            diagnostics: Vec::new(),
        };
        controller.apply_viewport(viewport);
        controller.backend.set_background(background);
        info!(
            width = viewport.width,
            height = viewport.height,
            theme = %mode,
            sprite = %source,
            "particle controller initialised"
        );
        controller
    }

    /// Applies queued theme notifications and a finished sprite load.
    /// Returns `true` when anything changed.
    pub fn pump(&mut self) -> bool {
        if !self.liveness.is_alive() {
            return false;
        }
        let mut changed = false;

        if self.theme_events.try_iter().count() > 0 {
            self.apply_theme(self.theme.get());
            changed = true;
        }

        let completed = self.sprite_load.as_ref().and_then(SpriteLoad::poll);
        if let Some(result) = completed {
            let source = self
                .sprite_load
                .take()
                .map(|load| load.source().to_string())
                .unwrap_or_default();
            if self.liveness.is_alive() {
                match result {
                    Ok(sprite) => self.create_cloud(&source, &sprite),
                    Err(err) => self.record_load_failure(&source, err),
                }
                changed = true;
            }
        }
        changed
    }

    pub fn handle_resize(&mut self, viewport: Viewport) {
        if !self.liveness.is_alive() {
            return;
        }
        if viewport.is_empty() {
            debug!(
                width = viewport.width,
                height = viewport.height,
                "ignoring empty viewport"
            );
            return;
        }
        self.apply_viewport(viewport);
    }

    /// Re-applies the current viewport, e.g. after the surface was lost.
    pub fn reconfigure(&mut self) {
        if self.liveness.is_alive() {
            self.apply_viewport(self.viewport);
        }
    }

    /// `x`/`y` are logical pixels relative to the viewport's top-left corner.
    pub fn handle_pointer_moved(&mut self, x: f64, y: f64) {
        if !self.liveness.is_alive() {
            return;
        }
        self.pointer = PointerState::from_pixels(x, y, &self.viewport);
    }

    pub fn frame(&mut self, now: Instant) -> Result<FrameOutcome, FrameError> {
        if !self.liveness.is_alive() {
            return Ok(FrameOutcome::Stopped);
        }
        match self.phase {
            ControllerPhase::Loading => return Ok(FrameOutcome::Idle),
            ControllerPhase::TornDown => return Ok(FrameOutcome::Stopped),
            ControllerPhase::Running | ControllerPhase::Degraded => {}
        }

        let started = *self.loop_started_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started).as_secs_f32();
        let rotation = self.settings.motion.rotation_at(elapsed, self.pointer);
        let model = match self.cloud.as_mut() {
            Some(cloud) => {
                cloud.set_rotation(rotation);
                cloud.model_matrix()
            }
            None => glam::Mat4::IDENTITY,
        };

        let inputs = FrameInputs {
            view_projection: self.camera.view_projection(),
            model,
            aspect: self.camera.aspect(),
            elapsed,
        };
        self.backend.render(&inputs)?;
        self.frames_rendered += 1;
        Ok(FrameOutcome::Rendered)
    }

    /// Stops every observer and releases the backend. Returns `false` when
    /// the controller was already torn down.
    pub fn teardown(&mut self) -> bool {
        if !self.liveness.stop() {
            return false;
        }
        if let Some(mut subscription) = self.theme_subscription.take() {
            subscription.cancel();
        }
        self.sprite_load = None;
        self.cloud = None;
        self.backend.dispose();
        self.phase = ControllerPhase::TornDown;
        info!(frames = self.frames_rendered, "particle controller torn down");
        true
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Whether the host should keep scheduling frames.
    pub fn wants_frames(&self) -> bool {
        self.liveness.is_alive()
            && matches!(
                self.phase,
                ControllerPhase::Running | ControllerPhase::Degraded
            )
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn cloud(&self) -> Option<&ParticleCloud> {
        self.cloud.as_ref()
    }

    pub fn material(&self) -> Option<ThemePreset> {
        self.material
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn apply_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.camera.set_aspect(viewport.aspect());
        let buffer = viewport.buffer_size(self.settings.max_pixel_ratio);
        self.backend.resize(&viewport, buffer);
        debug!(
            width = viewport.width,
            height = viewport.height,
            buffer_width = buffer.0,
            buffer_height = buffer.1,
            aspect = self.camera.aspect(),
            "viewport applied"
        );
    }

    fn apply_theme(&mut self, mode: ThemeMode) {
        let background = self.settings.presets.background_for(mode);
        self.background = background;
        self.backend.set_background(background);
        if self.cloud.is_some() {
            let preset = self.settings.presets.preset_for(mode);
            self.backend.apply_material(&preset);
            self.material = Some(preset);
        }
        debug!(theme = %mode, background = %background, "theme applied");
    }

    fn create_cloud(&mut self, source: &str, sprite: &SpriteImage) {
        let mode = self.theme.get();
        let preset = self.settings.presets.preset_for(mode);
        let cloud = ParticleCloud::generate(&self.settings.particles, &mut self.rng);

        self.background = self.settings.presets.background_for(mode);
        self.backend.set_background(self.background);
        if let Err(err) = self.backend.install_cloud(&cloud, sprite, &preset) {
            self.record_load_failure(source, err);
            return;
        }
        info!(
            particles = cloud.len(),
            sprite_width = sprite.width(),
            sprite_height = sprite.height(),
            theme = %mode,
            "particle cloud ready"
        );
        self.cloud = Some(cloud);
        self.material = Some(preset);
        self.phase = ControllerPhase::Running;
    }

    fn record_load_failure(&mut self, source: &str, err: AssetLoadError) {
        error!(
            sprite = %source,
            error = %err,
            "failed to load point sprite; rendering background only"
        );
        self.diagnostics.push(Diagnostic {
            kind: DiagnosticKind::AssetLoadFailure,
            message: err.to_string(),
        });
        self.phase = ControllerPhase::Degraded;
    }
}

impl<B: SceneBackend> Drop for ParticleController<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crossbeam_channel::{bounded, Sender};

    use crate::material::BlendMode;
    use crate::scene::ParticleSpec;

    #[derive(Default)]
    struct RecordingBackend {
        sizes: Vec<(u32, u32)>,
        backgrounds: Vec<Rgb>,
        installs: usize,
        installed_count: usize,
        materials: Vec<ThemePreset>,
        frames: Vec<FrameInputs>,
        disposals: usize,
        /// Sprites wider or taller than this are refused.
        max_sprite: Option<u32>,
    }

    impl SceneBackend for RecordingBackend {
        fn resize(&mut self, _viewport: &Viewport, buffer: (u32, u32)) {
            self.sizes.push(buffer);
        }

        fn set_background(&mut self, color: Rgb) {
            self.backgrounds.push(color);
        }

        fn install_cloud(
            &mut self,
            cloud: &ParticleCloud,
            sprite: &SpriteImage,
            material: &ThemePreset,
        ) -> Result<(), AssetLoadError> {
            if let Some(max) = self.max_sprite {
                if sprite.width() > max || sprite.height() > max {
                    return Err(AssetLoadError::TooLarge {
                        width: sprite.width(),
                        height: sprite.height(),
                        max,
                    });
                }
            }
            self.installs += 1;
            self.installed_count = cloud.len();
            self.materials.push(*material);
            Ok(())
        }

        fn apply_material(&mut self, material: &ThemePreset) {
            self.materials.push(*material);
        }

        fn render(&mut self, frame: &FrameInputs) -> Result<(), FrameError> {
            if self.disposals > 0 {
                return Err(FrameError::Disposed);
            }
            self.frames.push(*frame);
            Ok(())
        }

        fn dispose(&mut self) {
            self.disposals += 1;
        }
    }

    struct Ready;

    impl SpriteFetch for Ready {
        fn describe(&self) -> String {
            "ready".into()
        }

        fn fetch(&self) -> Result<SpriteImage, AssetLoadError> {
            Ok(SpriteImage::glow(4))
        }
    }

    struct Failing;

    impl SpriteFetch for Failing {
        fn describe(&self) -> String {
            "failing".into()
        }

        fn fetch(&self) -> Result<SpriteImage, AssetLoadError> {
            Err(AssetLoadError::Empty)
        }
    }

    /// Blocks until the test releases it.
    struct Gated(Receiver<()>);

    impl SpriteFetch for Gated {
        fn describe(&self) -> String {
            "gated".into()
        }

        fn fetch(&self) -> Result<SpriteImage, AssetLoadError> {
            let _ = self.0.recv();
            Ok(SpriteImage::glow(4))
        }
    }

    fn gated() -> (Box<dyn SpriteFetch>, Sender<()>) {
        let (tx, rx) = bounded(1);
        (Box::new(Gated(rx)), tx)
    }

    fn settings() -> FieldSettings {
        FieldSettings {
            particles: ParticleSpec {
                count: 200,
                extent: [60.0, 100.0, 20.0],
            },
            seed: Some(11),
            ..FieldSettings::default()
        }
    }

    fn controller(
        viewport: Viewport,
        theme: &ThemeCell,
        sprite: Box<dyn SpriteFetch>,
    ) -> ParticleController<RecordingBackend> {
        ParticleController::new(
            RecordingBackend::default(),
            viewport,
            settings(),
            theme,
            sprite,
            Arc::new(|| {}),
        )
    }

    fn settle(controller: &mut ParticleController<RecordingBackend>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.phase() == ControllerPhase::Loading {
            controller.pump();
            assert!(Instant::now() < deadline, "sprite load never completed");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn resize_updates_aspect_and_buffers() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let mut controller = controller(Viewport::new(1920, 1080, 1.0), &theme, Box::new(Ready));
        assert!(approx(controller.camera().aspect(), 1.778));
        assert_eq!(controller.backend().sizes.last(), Some(&(1920, 1080)));

        controller.handle_resize(Viewport::new(375, 812, 1.0));
        assert!(approx(controller.camera().aspect(), 0.462));
        assert_eq!(controller.backend().sizes.last(), Some(&(375, 812)));
        let projection = controller.camera().projection();

        controller.handle_resize(Viewport::new(375, 812, 1.0));
        assert_eq!(controller.camera().projection(), projection);
        assert_eq!(controller.backend().sizes.last(), Some(&(375, 812)));
        assert_eq!(controller.viewport(), Viewport::new(375, 812, 1.0));
    }

    #[test]
    fn resize_before_load_and_empty_viewports_are_safe() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let (sprite, _gate) = gated();
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, sprite);
        controller.handle_resize(Viewport::new(1024, 512, 1.0));
        assert_eq!(controller.phase(), ControllerPhase::Loading);
        assert!(approx(controller.camera().aspect(), 2.0));

        let resizes = controller.backend().sizes.len();
        controller.handle_resize(Viewport::new(0, 512, 1.0));
        assert_eq!(controller.backend().sizes.len(), resizes);
        assert_eq!(controller.viewport().width, 1024);
    }

    #[test]
    fn high_density_displays_cap_the_buffer() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let mut controller = controller(Viewport::new(375, 812, 1.0), &theme, Box::new(Ready));
        controller.handle_resize(Viewport::new(375, 812, 3.0));
        assert_eq!(controller.backend().sizes.last(), Some(&(750, 1624)));
    }

    #[test]
    fn cloud_matches_configured_count_and_extent() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, Box::new(Ready));
        settle(&mut controller);

        assert_eq!(controller.phase(), ControllerPhase::Running);
        let cloud = controller.cloud().expect("cloud created");
        assert_eq!(cloud.len(), 200);
        assert_eq!(controller.backend().installed_count, 200);
        for position in cloud.positions() {
            assert!(position[0].abs() <= 30.0);
            assert!(position[1].abs() <= 50.0);
            assert!(position[2].abs() <= 10.0);
        }
        assert!(cloud.scales().iter().all(|s| (0.0..1.0).contains(s)));
    }

    #[test]
    fn theme_switch_applies_preset_tuple() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, Box::new(Ready));
        settle(&mut controller);
        let presets = settings().presets;
        assert_eq!(controller.material(), Some(presets.dark));

        theme.set(ThemeMode::Light);
        assert!(controller.pump());
        let material = controller.material().expect("material");
        assert_eq!(material, presets.light);
        assert_eq!(material.blend, BlendMode::Normal);
        assert_eq!(controller.background(), presets.light_background);
        assert_eq!(controller.backend().materials.last(), Some(&presets.light));
        assert_eq!(
            controller.backend().backgrounds.last(),
            Some(&presets.light_background)
        );

        theme.toggle();
        controller.pump();
        assert_eq!(controller.material(), Some(presets.dark));
        assert_eq!(controller.background(), presets.dark_background);
    }

    #[test]
    fn theme_change_during_load_is_picked_up_on_creation() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let (sprite, gate) = gated();
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, sprite);
        let presets = settings().presets;
        assert_eq!(controller.background(), presets.dark_background);

        theme.set(ThemeMode::Light);
        controller.pump();
        assert!(controller.cloud().is_none());
        assert!(controller.material().is_none());
        assert_eq!(controller.background(), presets.light_background);

        gate.send(()).unwrap();
        settle(&mut controller);
        assert_eq!(controller.material(), Some(presets.light));
        assert_eq!(controller.backend().materials, vec![presets.light]);
    }

    #[test]
    fn pointer_is_normalised() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, Box::new(Ready));
        controller.handle_pointer_moved(0.0, 0.0);
        assert_eq!(controller.pointer(), PointerState { x: -1.0, y: 1.0 });
        controller.handle_pointer_moved(600.0, 150.0);
        assert_eq!(controller.pointer(), PointerState { x: 0.5, y: 0.5 });
        controller.handle_pointer_moved(5000.0, -20.0);
        assert_eq!(controller.pointer(), PointerState { x: 1.0, y: 1.0 });
    }

    #[test]
    fn frames_rotate_with_time_and_pointer() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, Box::new(Ready));
        settle(&mut controller);
        controller.handle_pointer_moved(800.0, 600.0);

        let start = Instant::now();
        assert_eq!(controller.frame(start).unwrap(), FrameOutcome::Rendered);
        assert_eq!(controller.cloud().unwrap().rotation(), [-0.009, 0.009]);

        controller
            .frame(start + Duration::from_secs(2))
            .unwrap();
        let [rx, ry] = controller.cloud().unwrap().rotation();
        assert!(approx(rx, 0.6 - 0.009));
        assert!(approx(ry, 1.0 + 0.009));
        let last = controller.backend().frames.last().unwrap();
        assert!(approx(last.elapsed, 2.0));
        assert_eq!(last.model, controller.cloud().unwrap().model_matrix());
        assert_eq!(controller.frames_rendered(), 2);
    }

    #[test]
    fn nothing_renders_while_loading() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let (sprite, _gate) = gated();
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, sprite);
        assert!(!controller.wants_frames());
        assert_eq!(controller.frame(Instant::now()).unwrap(), FrameOutcome::Idle);
        assert!(controller.backend().frames.is_empty());
    }

    #[test]
    fn load_failure_degrades_to_background_only() {
        let theme = ThemeCell::new(ThemeMode::Light);
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, Box::new(Failing));
        settle(&mut controller);

        assert_eq!(controller.phase(), ControllerPhase::Degraded);
        assert_eq!(controller.diagnostics().len(), 1);
        assert_eq!(
            controller.diagnostics()[0].kind,
            DiagnosticKind::AssetLoadFailure
        );
        assert!(controller.cloud().is_none());
        assert!(controller.wants_frames());

        let now = Instant::now();
        for step in 0..3 {
            let outcome = controller.frame(now + Duration::from_millis(16 * step)).unwrap();
            assert_eq!(outcome, FrameOutcome::Rendered);
        }
        assert_eq!(controller.backend().installs, 0);
        assert_eq!(controller.backend().frames.len(), 3);

        theme.set(ThemeMode::Dark);
        controller.pump();
        assert_eq!(controller.diagnostics().len(), 1);
        assert!(controller.material().is_none());
    }

    #[test]
    fn sprite_refused_by_backend_degrades_to_background_only() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let backend = RecordingBackend {
            max_sprite: Some(2),
            ..RecordingBackend::default()
        };
        let mut controller = ParticleController::new(
            backend,
            Viewport::new(800, 600, 1.0),
            settings(),
            &theme,
            Box::new(Ready),
            Arc::new(|| {}),
        );
        settle(&mut controller);

        assert_eq!(controller.phase(), ControllerPhase::Degraded);
        assert_eq!(controller.diagnostics().len(), 1);
        assert_eq!(
            controller.diagnostics()[0].kind,
            DiagnosticKind::AssetLoadFailure
        );
        assert!(controller.diagnostics()[0].message.contains("4x4"));
        assert!(controller.cloud().is_none());
        assert!(controller.material().is_none());
        assert_eq!(controller.backend().installs, 0);
        assert_eq!(
            controller.frame(Instant::now()).unwrap(),
            FrameOutcome::Rendered
        );
    }

    #[test]
    fn teardown_is_idempotent_and_releases_once() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, Box::new(Ready));
        settle(&mut controller);
        assert_eq!(theme.subscriber_count(), 1);

        assert!(controller.teardown());
        assert!(!controller.teardown());
        assert_eq!(controller.backend().disposals, 1);
        assert_eq!(controller.phase(), ControllerPhase::TornDown);
        assert_eq!(theme.subscriber_count(), 0);
        assert!(controller.cloud().is_none());
        assert!(!controller.wants_frames());

        let sizes = controller.backend().sizes.len();
        controller.handle_resize(Viewport::new(10, 10, 1.0));
        controller.handle_pointer_moved(1.0, 1.0);
        assert_eq!(controller.backend().sizes.len(), sizes);
        assert_eq!(controller.pointer(), PointerState::default());
        assert_eq!(controller.frame(Instant::now()).unwrap(), FrameOutcome::Stopped);
        assert!(controller.backend().frames.is_empty());
    }

    #[test]
    fn load_completing_after_teardown_is_discarded() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let (sprite, gate) = gated();
        let mut controller = controller(Viewport::new(800, 600, 1.0), &theme, sprite);
        controller.teardown();
        gate.send(()).unwrap();
        thread::sleep(Duration::from_millis(20));

        assert!(!controller.pump());
        assert_eq!(controller.backend().installs, 0);
        assert!(controller.diagnostics().is_empty());
        assert_eq!(controller.phase(), ControllerPhase::TornDown);
    }

    #[test]
    fn drop_unsubscribes_from_theme() {
        let theme = ThemeCell::new(ThemeMode::Dark);
        let controller = controller(Viewport::new(800, 600, 1.0), &theme, Box::new(Ready));
        assert_eq!(theme.subscriber_count(), 1);
        drop(controller);
        assert_eq!(theme.subscriber_count(), 0);
    }
}
