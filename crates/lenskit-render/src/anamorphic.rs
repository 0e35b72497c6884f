//! Anamorphic light streaks.
//!
//! Bright pixels are extracted into a half-height streak buffer rotated to the
//! configured direction, blurred along one axis by a horizontal-only
//! downsample/upsample chain, optionally blended with the previous frame's
//! streaks, and composited over the frame.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::cache::PyramidCache;
use crate::camera::CameraView;
use crate::effect::{PostProcessEffect, clamp_to, load_program};
use crate::pass::{Bindings, ParamName, PassKind, PassList, PassSink, TextureRef, TextureSlot};
use crate::program::{ANAMORPHIC_PROGRAM, ProgramHandle, ProgramLibrary};
use crate::pyramid::{AnamorphicPyramid, AnamorphicShape, FadeState, MAX_MIP_LEVEL};
use crate::target::{TargetAllocator, TargetFormat};

/// User-facing parameters of the anamorphic effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnamorphicParams {
    /// Strength of the streaks. Range \[0, 1\]; 0 disables the effect.
    pub intensity: f32,
    /// Brightness above which pixels produce streaks. Range \[0, 10\].
    pub threshold: f32,
    /// Streak direction in degrees. Range \[0, 180\].
    pub direction: f32,
    /// How far streaks stretch. Range \[0, 1\].
    pub stretch: f32,
    /// Blend with the previous frame's streaks. Range \[0, 0.3\]; 0 disables.
    pub fade: f32,
    /// Linear RGBA tint.
    pub tint: [f32; 4],
}

impl AnamorphicParams {
    pub const INTENSITY: RangeInclusive<f32> = 0.0..=1.0;
    pub const THRESHOLD: RangeInclusive<f32> = 0.0..=10.0;
    pub const DIRECTION: RangeInclusive<f32> = 0.0..=180.0;
    pub const STRETCH: RangeInclusive<f32> = 0.0..=1.0;
    pub const FADE: RangeInclusive<f32> = 0.0..=0.3;

    /// Copy with every value clamped to its range.
    pub fn clamped(&self) -> Self {
        Self {
            intensity: clamp_to(self.intensity, Self::INTENSITY),
            threshold: clamp_to(self.threshold, Self::THRESHOLD),
            direction: clamp_to(self.direction, Self::DIRECTION),
            stretch: clamp_to(self.stretch, Self::STRETCH),
            fade: clamp_to(self.fade, Self::FADE),
            tint: self.tint,
        }
    }
}

impl Default for AnamorphicParams {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            threshold: 1.0,
            direction: 0.0,
            stretch: 1.0,
            fade: 0.0,
            tint: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Passes of the anamorphic program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnamorphicPass {
    Prefilter,
    Downsample,
    Upsample,
    Fade,
    Composition,
    FillBlack,
    Copy,
}

impl PassKind for AnamorphicPass {
    fn index(self) -> u32 {
        match self {
            AnamorphicPass::Prefilter => 0,
            AnamorphicPass::Downsample => 1,
            AnamorphicPass::Upsample => 2,
            AnamorphicPass::Fade => 3,
            AnamorphicPass::Composition => 4,
            AnamorphicPass::FillBlack => 5,
            AnamorphicPass::Copy => 6,
        }
    }

    fn label(self) -> &'static str {
        match self {
            AnamorphicPass::Prefilter => "anamorphic-prefilter",
            AnamorphicPass::Downsample => "anamorphic-downsample",
            AnamorphicPass::Upsample => "anamorphic-upsample",
            AnamorphicPass::Fade => "anamorphic-fade",
            AnamorphicPass::Composition => "anamorphic-composition",
            AnamorphicPass::FillBlack => "anamorphic-fill-black",
            AnamorphicPass::Copy => "anamorphic-copy",
        }
    }
}

/// Anamorphic streak effect with one streak pyramid per camera.
#[derive(Debug)]
pub struct AnamorphicEffect {
    params: AnamorphicParams,
    format: TargetFormat,
    program: Option<ProgramHandle>,
    pyramids: Option<PyramidCache<AnamorphicPyramid>>,
}

impl AnamorphicEffect {
    pub fn new(params: AnamorphicParams) -> Self {
        Self {
            params: params.clamped(),
            format: TargetFormat::default(),
            program: None,
            pyramids: None,
        }
    }

    /// Use `format` for every intermediate target.
    pub fn with_format(mut self, format: TargetFormat) -> Self {
        self.format = format;
        self
    }

    pub fn params(&self) -> &AnamorphicParams {
        &self.params
    }

    /// Replace the parameters, clamping each to its range.
    pub fn set_params(&mut self, params: AnamorphicParams) {
        self.params = params.clamped();
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// Cached streak pyramids, one per camera seen so far. `None` outside
    /// `setup`..`cleanup`.
    pub fn pyramids(&self) -> Option<&PyramidCache<AnamorphicPyramid>> {
        self.pyramids.as_ref()
    }

    /// Release one camera's pyramid, e.g. when the camera is destroyed.
    pub fn forget_camera(&mut self, allocator: &mut dyn TargetAllocator, camera: &CameraView) {
        if let Some(pyramids) = self.pyramids.as_mut() {
            pyramids.remove(allocator, camera.id);
        }
    }
}

impl Default for AnamorphicEffect {
    fn default() -> Self {
        Self::new(AnamorphicParams::default())
    }
}

impl PostProcessEffect for AnamorphicEffect {
    fn name(&self) -> &'static str {
        "anamorphic"
    }

    fn is_active(&self) -> bool {
        self.program.is_some() && self.params.intensity != 0.0
    }

    fn setup(&mut self, programs: &mut dyn ProgramLibrary) {
        if let Some(previous) = self.program.take() {
            programs.release(previous);
        }
        self.program = load_program(programs, self.name(), ANAMORPHIC_PROGRAM);
        self.pyramids.get_or_insert_with(PyramidCache::new);
    }

    fn render(
        &mut self,
        allocator: &mut dyn TargetAllocator,
        sink: &mut dyn PassSink,
        camera: &CameraView,
        source: TextureRef,
        destination: TextureRef,
    ) {
        let (Some(program), Some(pyramids)) = (self.program, self.pyramids.as_mut()) else {
            log::warn!("anamorphic: render called without a loaded program");
            return;
        };
        let params = &self.params;
        let shape = AnamorphicShape::new(params.direction, self.format);
        let pyramid = pyramids.get(allocator, camera, shape);

        let (Some(base), Some(fade_in), Some(fade_out)) =
            (pyramid.down(0), pyramid.fade_in(), pyramid.fade_out())
        else {
            log::error!("anamorphic: pyramid for camera {:?} has no targets", camera.id);
            return;
        };

        let shared = Bindings::new()
            .texture(TextureSlot::SourceTexture, source)
            .float(ParamName::Intensity, params.intensity)
            .float(ParamName::Threshold, params.threshold)
            .float(ParamName::Stretch, params.stretch)
            .float(ParamName::Angle, pyramid.angle())
            .vector(ParamName::AngleTextureScale, pyramid.texture_scale())
            .color(ParamName::Color, params.tint)
            .float(ParamName::Fade, params.fade);
        let mut passes = PassList::new(program, shared);

        let temporal = params.fade > 0.0 && camera.interactive;

        match pyramid.fade_state() {
            FadeState::Fresh => {
                passes.draw(AnamorphicPass::FillBlack, fade_in, Bindings::new());
                pyramid.mark_initialized();
            }
            FadeState::Initialized if temporal => {
                passes.draw(
                    AnamorphicPass::Copy,
                    fade_in,
                    Bindings::new().texture(TextureSlot::InputTexture, fade_out),
                );
            }
            FadeState::Initialized => {}
        }

        // source -> prefilter -> down[0]
        passes.draw(AnamorphicPass::Prefilter, base, Bindings::new());

        // down[level - 1] -> downsample -> down[level], until the chain ends
        let mut last = base;
        let mut top = 0;
        for level in 1..MAX_MIP_LEVEL {
            let Some(down) = pyramid.down(level) else {
                break;
            };
            passes.draw(
                AnamorphicPass::Downsample,
                down,
                Bindings::new().texture(TextureSlot::InputTexture, last),
            );
            last = down;
            top = level;
        }

        // (last, down[level]) -> upsample -> up[level], walking back to level 1
        for level in (1..top).rev() {
            let (Some(down), Some(up)) = (pyramid.down(level), pyramid.up(level)) else {
                continue;
            };
            passes.draw(
                AnamorphicPass::Upsample,
                up,
                Bindings::new()
                    .texture(TextureSlot::InputTexture, last)
                    .texture(TextureSlot::OtherTexture, down),
            );
            last = up;
        }

        if temporal {
            passes.draw(
                AnamorphicPass::Fade,
                fade_out,
                Bindings::new()
                    .texture(TextureSlot::InputTexture, last)
                    .texture(TextureSlot::OtherTexture, fade_in),
            );
            last = fade_out;
        }

        // (source, last) -> composition -> destination
        passes.draw(
            AnamorphicPass::Composition,
            destination,
            Bindings::new().texture(TextureSlot::InputTexture, last),
        );

        sink.submit(passes);
    }

    fn cleanup(&mut self, programs: &mut dyn ProgramLibrary, allocator: &mut dyn TargetAllocator) {
        if let Some(program) = self.program.take() {
            programs.release(program);
        }
        if let Some(mut pyramids) = self.pyramids.take() {
            pyramids.release_all(allocator);
        }
        log::info!("anamorphic: cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::{CommandList, HostTexture, ParamValue, PassDescriptor};
    use crate::program::ProgramRegistry;
    use crate::pyramid::{AnamorphicLayout, Pyramid};
    use crate::target::TrackingAllocator;

    const SOURCE: TextureRef = TextureRef::Host(HostTexture(1));
    const DESTINATION: TextureRef = TextureRef::Host(HostTexture(2));

    struct Harness {
        programs: ProgramRegistry,
        alloc: TrackingAllocator,
        sink: CommandList,
        effect: AnamorphicEffect,
    }

    impl Harness {
        fn new(params: AnamorphicParams) -> Self {
            let mut programs = ProgramRegistry::with_lens_flares();
            let mut effect = AnamorphicEffect::new(params);
            effect.setup(&mut programs);
            Self {
                programs,
                alloc: TrackingAllocator::new(),
                sink: CommandList::new(),
                effect,
            }
        }

        fn render(&mut self, camera: &CameraView) -> PassList {
            self.effect
                .render(&mut self.alloc, &mut self.sink, camera, SOURCE, DESTINATION);
            self.sink.last().cloned().expect("render should submit passes")
        }
    }

    fn active() -> AnamorphicParams {
        AnamorphicParams {
            intensity: 0.8,
            ..Default::default()
        }
    }

    fn input(pass: &PassDescriptor) -> Option<TextureRef> {
        pass.texture(TextureSlot::InputTexture)
    }

    #[test]
    fn test_defaults_and_clamping() {
        let params = AnamorphicParams::default();
        assert_eq!(params.intensity, 0.0);
        assert_eq!(params.threshold, 1.0);
        assert_eq!(params.stretch, 1.0);
        assert_eq!(params.tint, [1.0; 4]);

        let clamped = AnamorphicParams {
            intensity: 2.0,
            threshold: -1.0,
            direction: 270.0,
            stretch: 0.5,
            fade: 0.9,
            tint: [0.2, 0.3, 0.4, 1.0],
        }
        .clamped();
        assert_eq!(clamped.intensity, 1.0);
        assert_eq!(clamped.threshold, 0.0);
        assert_eq!(clamped.direction, 180.0);
        assert_eq!(clamped.stretch, 0.5);
        assert_eq!(clamped.fade, 0.3);
    }

    #[test]
    fn test_activity() {
        let mut programs = ProgramRegistry::with_lens_flares();
        let mut effect = AnamorphicEffect::new(active());
        assert!(!effect.is_active(), "inactive before setup");
        effect.setup(&mut programs);
        assert!(effect.is_active());
        effect.set_params(AnamorphicParams::default());
        assert!(!effect.is_active(), "zero intensity disables the effect");

        assert_eq!(effect.injection_point(), crate::effect::InjectionPoint::BeforePostProcess);
        assert!(!effect.visible_in_scene_view());
    }

    #[test]
    fn test_missing_program_disables_effect() {
        let mut programs = ProgramRegistry::new();
        let mut effect = AnamorphicEffect::new(active());
        effect.setup(&mut programs);
        assert!(!effect.is_active());

        let mut alloc = TrackingAllocator::new();
        let mut sink = CommandList::new();
        effect.render(&mut alloc, &mut sink, &CameraView::new(1, 64, 64), SOURCE, DESTINATION);
        assert!(sink.lists().is_empty());
        assert_eq!(alloc.live_count(), 0);
    }

    #[test]
    fn test_first_frame_clears_fade_buffer_once() {
        let mut h = Harness::new(active());
        let camera = CameraView::new(1, 640, 360);

        let first = h.render(&camera);
        assert_eq!(first.count(AnamorphicPass::FillBlack), 1);
        assert!(first.passes()[0].is(AnamorphicPass::FillBlack));

        let second = h.render(&camera);
        assert_eq!(second.count(AnamorphicPass::FillBlack), 0);
        assert_eq!(second.count(AnamorphicPass::Copy), 0, "no copy without fade");
    }

    #[test]
    fn test_pass_order_without_fade() {
        let mut h = Harness::new(active());
        let camera = CameraView::new(1, 640, 360);
        h.render(&camera);
        let passes = h.render(&camera);

        let populated = AnamorphicLayout::compute(640, 360, 0.0).populated_levels();
        let top = populated - 1;
        assert_eq!(passes.len(), 1 + top + (top - 1) + 1);
        assert_eq!(passes.count(AnamorphicPass::Downsample), top);
        assert_eq!(passes.count(AnamorphicPass::Upsample), top - 1);

        let pyramid = h.effect.pyramids().unwrap().peek(camera.id).unwrap();
        let list = passes.passes();
        assert!(list[0].is(AnamorphicPass::Prefilter));
        assert_eq!(list[0].target(), pyramid.down(0).unwrap().into());
        assert_eq!(list[0].texture(TextureSlot::SourceTexture), Some(SOURCE));

        for level in 1..=top {
            let pass = &list[level];
            assert!(pass.is(AnamorphicPass::Downsample));
            assert_eq!(input(pass), Some(pyramid.down(level - 1).unwrap().into()));
            assert_eq!(pass.target(), pyramid.down(level).unwrap().into());
        }

        let mut expected_input = pyramid.down(top).unwrap();
        for (offset, level) in (1..top).rev().enumerate() {
            let pass = &list[1 + top + offset];
            assert!(pass.is(AnamorphicPass::Upsample));
            assert_eq!(input(pass), Some(expected_input.into()));
            assert_eq!(
                pass.texture(TextureSlot::OtherTexture),
                Some(pyramid.down(level).unwrap().into())
            );
            expected_input = pyramid.up(level).unwrap();
            assert_eq!(pass.target(), expected_input.into());
        }

        let composition = list.last().unwrap();
        assert!(composition.is(AnamorphicPass::Composition));
        assert_eq!(composition.target(), DESTINATION);
        assert_eq!(input(composition), Some(pyramid.up(1).unwrap().into()));
        assert_eq!(composition.texture(TextureSlot::OtherTexture), None);
    }

    #[test]
    fn test_four_level_chain_counts() {
        let mut h = Harness::new(active());
        let camera = CameraView::new(1, 16, 16);
        // Base 32x16, then 16, 8, 4 wide: four populated levels.
        assert_eq!(AnamorphicLayout::compute(16, 16, 0.0).populated_levels(), 4);
        let first = h.render(&camera);
        assert_eq!(first.count(AnamorphicPass::Prefilter), 1);
        assert_eq!(first.count(AnamorphicPass::Downsample), 3);
        assert_eq!(first.count(AnamorphicPass::Upsample), 2);
        assert_eq!(first.count(AnamorphicPass::Composition), 1);
        assert_eq!(first.len(), 1 + 1 + 3 + 2 + 1);
    }

    #[test]
    fn test_fade_feedback_when_interactive() {
        let mut h = Harness::new(AnamorphicParams {
            fade: 0.2,
            ..active()
        });
        let camera = CameraView::new(1, 320, 180);
        let first = h.render(&camera);
        assert_eq!(first.count(AnamorphicPass::FillBlack), 1);
        assert_eq!(first.count(AnamorphicPass::Copy), 0);
        assert_eq!(first.count(AnamorphicPass::Fade), 1);

        let second = h.render(&camera);
        let pyramid = h.effect.pyramids().unwrap().peek(camera.id).unwrap();
        let fade_in = pyramid.fade_in().unwrap();
        let fade_out = pyramid.fade_out().unwrap();

        let copy = &second.passes()[0];
        assert!(copy.is(AnamorphicPass::Copy));
        assert_eq!(copy.target(), fade_in.into());
        assert_eq!(input(copy), Some(fade_out.into()));

        let list = second.passes();
        let fade = &list[list.len() - 2];
        assert!(fade.is(AnamorphicPass::Fade));
        assert_eq!(fade.target(), fade_out.into());
        assert_eq!(fade.texture(TextureSlot::OtherTexture), Some(fade_in.into()));
        assert_eq!(input(list.last().unwrap()), Some(fade_out.into()));
    }

    #[test]
    fn test_no_fade_in_static_preview() {
        let mut h = Harness::new(AnamorphicParams {
            fade: 0.2,
            ..active()
        });
        let camera = CameraView::new(1, 320, 180).preview();
        h.render(&camera);
        let second = h.render(&camera);
        assert_eq!(second.count(AnamorphicPass::Copy), 0);
        assert_eq!(second.count(AnamorphicPass::Fade), 0);
    }

    #[test]
    fn test_shared_parameters_on_every_pass() {
        let mut h = Harness::new(AnamorphicParams {
            direction: 30.0,
            threshold: 2.5,
            tint: [1.0, 0.5, 0.25, 1.0],
            ..active()
        });
        let camera = CameraView::new(9, 800, 450);
        let passes = h.render(&camera);
        let scale = AnamorphicLayout::compute(800, 450, 30.0).texture_scale;
        for pass in passes.iter() {
            assert_eq!(pass.float(ParamName::Angle), Some(30.0));
            assert_eq!(pass.float(ParamName::Threshold), Some(2.5));
            assert_eq!(pass.float(ParamName::Intensity), Some(0.8));
            assert_eq!(
                pass.param(ParamName::AngleTextureScale),
                Some(ParamValue::Vector(scale))
            );
            assert_eq!(
                pass.param(ParamName::Color),
                Some(ParamValue::Color([1.0, 0.5, 0.25, 1.0]))
            );
            assert_eq!(pass.texture(TextureSlot::SourceTexture), Some(SOURCE));
        }
    }

    #[test]
    fn test_direction_change_reallocates_and_clears_again() {
        let mut h = Harness::new(active());
        let camera = CameraView::new(1, 640, 360);
        h.render(&camera);
        h.render(&camera);
        let live = h.alloc.live_count();

        let mut params = active();
        params.direction = 90.0;
        h.effect.set_params(params);
        let passes = h.render(&camera);
        assert_eq!(passes.count(AnamorphicPass::FillBlack), 1);
        assert_eq!(h.alloc.releases(), live as u64);
        assert_eq!(h.effect.pyramids().unwrap().len(), 1);
    }

    #[test]
    fn test_cameras_get_independent_pyramids() {
        let mut h = Harness::new(active());
        let a = CameraView::new(1, 640, 360);
        let b = CameraView::new(2, 640, 360);
        let pa = h.render(&a);
        let pb = h.render(&b);
        assert_eq!(h.effect.pyramids().unwrap().len(), 2);
        assert_ne!(pa.passes()[1].target(), pb.passes()[1].target());

        h.effect.forget_camera(&mut h.alloc, &a);
        assert_eq!(h.effect.pyramids().unwrap().len(), 1);
        let ids = h.effect.pyramids().unwrap().peek(b.id).unwrap().target_ids();
        assert!(ids.iter().all(|id| h.alloc.is_live(*id)));
    }

    #[test]
    fn test_cleanup_releases_everything() {
        let mut h = Harness::new(active());
        for id in 0..3 {
            h.render(&CameraView::new(id, 400, 300));
        }
        h.effect.cleanup(&mut h.programs, &mut h.alloc);
        assert_eq!(h.alloc.live_count(), 0);
        assert_eq!(h.programs.total_references(), 0);
        assert!(h.effect.pyramids().is_none());
        assert!(!h.effect.is_active());

        h.effect.cleanup(&mut h.programs, &mut h.alloc);
        assert_eq!(h.alloc.invalid_releases(), 0);
    }

    #[test]
    fn test_nan_direction_reuses_pyramid() {
        let mut h = Harness::new(AnamorphicParams {
            direction: f32::NAN,
            fade: 0.2,
            ..active()
        });
        assert_eq!(h.effect.params().direction, 0.0);

        let camera = CameraView::new(1, 320, 180);
        h.render(&camera);
        let allocations = h.alloc.allocations();
        let second = h.render(&camera);
        assert_eq!(h.alloc.allocations(), allocations);
        assert_eq!(h.alloc.releases(), 0);
        assert_eq!(second.count(AnamorphicPass::FillBlack), 0);
        assert_eq!(second.count(AnamorphicPass::Copy), 1);
    }

    #[test]
    fn test_repeated_setup_holds_one_program_reference() {
        let mut h = Harness::new(active());
        h.effect.setup(&mut h.programs);
        assert_eq!(h.programs.total_references(), 1);

        let camera = CameraView::new(1, 320, 180);
        h.render(&camera);
        h.effect.setup(&mut h.programs);
        assert_eq!(h.effect.pyramids().unwrap().len(), 1, "setup keeps live pyramids");

        h.effect.cleanup(&mut h.programs, &mut h.alloc);
        assert_eq!(h.programs.total_references(), 0);
        assert_eq!(h.alloc.live_count(), 0);
    }

    #[test]
    fn test_setup_creates_empty_cache() {
        let mut programs = ProgramRegistry::with_lens_flares();
        let mut effect = AnamorphicEffect::new(active());
        assert!(effect.pyramids().is_none());
        effect.setup(&mut programs);
        assert!(effect.pyramids().is_some_and(|p| p.is_empty()));
    }
}
