//! Radial warp, ghosts and chromatic aberration.
//!
//! The frame is prefiltered and blurred down a separable pyramid. The deepest
//! level feeds a radial warp and a ghost pass, whose sum is split by a
//! spectral lookup, blurred again, box-filtered back up to full resolution and
//! added over the frame.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::cache::PyramidCache;
use crate::camera::CameraView;
use crate::effect::{PostProcessEffect, clamp_to, load_program};
use crate::pass::{
    Bindings, HostTexture, ParamName, PassKind, PassList, PassSink, TextureRef, TextureSlot,
};
use crate::program::{ProgramHandle, ProgramLibrary, RADIAL_WARP_PROGRAM};
use crate::pyramid::{FlarePyramid, FlareShape};
use crate::target::{TargetAllocator, TargetFormat, TargetId};

/// User-facing parameters of the radial warp and ghosts effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadialWarpParams {
    /// Strength of the composited flare. Range \[0, 1\]; 0 disables the effect.
    pub intensity: f32,
    /// Box filter spread on the way back up. Range \[0, 1\].
    pub blur: f32,
    /// Spectral lookup for the chromatic aberration pass. Not bound when absent.
    #[serde(skip)]
    pub spectral_lut: Option<HostTexture>,
    /// Range \[0, 1\].
    pub radial_warp_intensity: f32,
    /// Range \[0, 1\].
    pub radial_warp_length: f32,
    /// Range \[0, 20\].
    pub chromatic_aberration_multiplier: f32,
    /// Range \[0, 1\].
    pub ghost_intensity: f32,
    /// Size ratio between consecutive blur levels. Range \[1, 4\].
    pub downsample_factor: f32,
    /// Blur levels below full resolution. Range \[1, 4\].
    pub levels: u32,
}

impl RadialWarpParams {
    pub const INTENSITY: RangeInclusive<f32> = 0.0..=1.0;
    pub const BLUR: RangeInclusive<f32> = 0.0..=1.0;
    pub const RADIAL_WARP_INTENSITY: RangeInclusive<f32> = 0.0..=1.0;
    pub const RADIAL_WARP_LENGTH: RangeInclusive<f32> = 0.0..=1.0;
    pub const CHROMATIC_ABERRATION_MULTIPLIER: RangeInclusive<f32> = 0.0..=20.0;
    pub const GHOST_INTENSITY: RangeInclusive<f32> = 0.0..=1.0;
    pub const DOWNSAMPLE_FACTOR: RangeInclusive<f32> = 1.0..=4.0;
    pub const LEVELS: RangeInclusive<u32> = 1..=4;

    /// Copy with every value clamped to its range.
    pub fn clamped(&self) -> Self {
        Self {
            intensity: clamp_to(self.intensity, Self::INTENSITY),
            blur: clamp_to(self.blur, Self::BLUR),
            spectral_lut: self.spectral_lut,
            radial_warp_intensity: clamp_to(
                self.radial_warp_intensity,
                Self::RADIAL_WARP_INTENSITY,
            ),
            radial_warp_length: clamp_to(self.radial_warp_length, Self::RADIAL_WARP_LENGTH),
            chromatic_aberration_multiplier: clamp_to(
                self.chromatic_aberration_multiplier,
                Self::CHROMATIC_ABERRATION_MULTIPLIER,
            ),
            ghost_intensity: clamp_to(self.ghost_intensity, Self::GHOST_INTENSITY),
            downsample_factor: clamp_to(self.downsample_factor, Self::DOWNSAMPLE_FACTOR),
            levels: self
                .levels
                .clamp(*Self::LEVELS.start(), *Self::LEVELS.end()),
        }
    }

    /// True when the parameters produce no visible flare.
    pub fn is_noop(&self) -> bool {
        self.intensity == 0.0
            || (self.ghost_intensity == 0.0
                && (self.radial_warp_intensity == 0.0
                    || self.chromatic_aberration_multiplier == 0.0))
    }
}

impl Default for RadialWarpParams {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            blur: 0.5,
            spectral_lut: None,
            radial_warp_intensity: 0.0025,
            radial_warp_length: 0.5,
            chromatic_aberration_multiplier: 3.0,
            ghost_intensity: 0.005,
            downsample_factor: 2.0,
            levels: 1,
        }
    }
}

/// Passes of the radial warp program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadialWarpPass {
    Prefilter,
    HBlur,
    VBlur,
    RadialWarp,
    Ghost,
    ChromaticAberration,
    Box,
    Composition,
}

impl PassKind for RadialWarpPass {
    fn index(self) -> u32 {
        match self {
            RadialWarpPass::Prefilter => 0,
            RadialWarpPass::HBlur => 1,
            RadialWarpPass::VBlur => 2,
            RadialWarpPass::RadialWarp => 3,
            RadialWarpPass::Ghost => 4,
            RadialWarpPass::ChromaticAberration => 5,
            RadialWarpPass::Box => 6,
            RadialWarpPass::Composition => 7,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RadialWarpPass::Prefilter => "radial-warp-prefilter",
            RadialWarpPass::HBlur => "radial-warp-hblur",
            RadialWarpPass::VBlur => "radial-warp-vblur",
            RadialWarpPass::RadialWarp => "radial-warp",
            RadialWarpPass::Ghost => "radial-warp-ghost",
            RadialWarpPass::ChromaticAberration => "radial-warp-chromatic-aberration",
            RadialWarpPass::Box => "radial-warp-box",
            RadialWarpPass::Composition => "radial-warp-composition",
        }
    }
}

/// Radial warp and ghosts effect with one blur pyramid per camera.
#[derive(Debug)]
pub struct RadialWarpAndGhostsEffect {
    params: RadialWarpParams,
    format: TargetFormat,
    program: Option<ProgramHandle>,
    pyramids: Option<PyramidCache<FlarePyramid>>,
}

impl RadialWarpAndGhostsEffect {
    pub fn new(params: RadialWarpParams) -> Self {
        Self {
            params: params.clamped(),
            format: TargetFormat::default(),
            program: None,
            pyramids: None,
        }
    }

    pub fn with_format(mut self, format: TargetFormat) -> Self {
        self.format = format;
        self
    }

    pub fn params(&self) -> &RadialWarpParams {
        &self.params
    }

    /// Replace the parameters, clamping each to its range.
    pub fn set_params(&mut self, params: RadialWarpParams) {
        self.params = params.clamped();
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn pyramids(&self) -> Option<&PyramidCache<FlarePyramid>> {
        self.pyramids.as_ref()
    }

    pub fn forget_camera(&mut self, allocator: &mut dyn TargetAllocator, camera: &CameraView) {
        if let Some(pyramids) = self.pyramids.as_mut() {
            pyramids.remove(allocator, camera.id);
        }
    }

    fn shape(&self) -> FlareShape {
        FlareShape::new(
            self.params.levels as usize + 1,
            self.params.downsample_factor,
            self.format,
        )
    }
}

impl Default for RadialWarpAndGhostsEffect {
    fn default() -> Self {
        Self::new(RadialWarpParams::default())
    }
}

/// `(hblur, vblur)` of every allocated level, shallowest first.
fn blur_chain(pyramid: &FlarePyramid) -> Vec<(TargetId, TargetId)> {
    (0..=pyramid.max_downsample())
        .map_while(|level| Some((pyramid.hblur(level)?, pyramid.vblur(level)?)))
        .collect()
}

impl PostProcessEffect for RadialWarpAndGhostsEffect {
    fn name(&self) -> &'static str {
        "radial_warp_and_ghosts"
    }

    fn is_active(&self) -> bool {
        self.program.is_some() && !self.params.is_noop()
    }

    fn setup(&mut self, programs: &mut dyn ProgramLibrary) {
        if let Some(previous) = self.program.take() {
            programs.release(previous);
        }
        self.program = load_program(programs, self.name(), RADIAL_WARP_PROGRAM);
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
        let shape = self.shape();
        let (Some(program), Some(pyramids)) = (self.program, self.pyramids.as_mut()) else {
            log::warn!("radial_warp_and_ghosts: render called without a loaded program");
            return;
        };
        let params = &self.params;
        let pyramid = pyramids.get(allocator, camera, shape);

        let chain = blur_chain(pyramid);
        let (Some(radial), Some(ghosts), Some(aberration)) =
            (pyramid.radial_warped(), pyramid.ghosts(), pyramid.aberration())
        else {
            log::error!(
                "radial_warp_and_ghosts: pyramid for camera {:?} has no targets",
                camera.id
            );
            return;
        };
        let Some(&(deep_h, deep_v)) = chain.last() else {
            log::error!(
                "radial_warp_and_ghosts: pyramid for camera {:?} has no blur levels",
                camera.id
            );
            return;
        };
        let (base_h, base_v) = chain[0];

        let mut shared = Bindings::new()
            .texture(TextureSlot::SourceTexture, source)
            .float(ParamName::Intensity, params.intensity)
            .float(ParamName::RadialWarpLength, params.radial_warp_length)
            .float(ParamName::RadialWarpIntensity, params.radial_warp_intensity)
            .float(ParamName::GhostIntensity, params.ghost_intensity);
        if let Some(lut) = params.spectral_lut {
            shared = shared.texture(TextureSlot::ChromaticAberrationSpectrum, lut);
        }
        let mut passes = PassList::new(program, shared);
        let input = |texture: TargetId| Bindings::new().texture(TextureSlot::InputTexture, texture);

        passes.draw(RadialWarpPass::Prefilter, base_v, Bindings::new());

        // vblur[i - 1] -> hblur[i] -> vblur[i]
        for pair in chain.windows(2) {
            let (_, prev_v) = pair[0];
            let (h, v) = pair[1];
            passes.draw(RadialWarpPass::HBlur, h, input(prev_v));
            passes.draw(RadialWarpPass::VBlur, v, input(h));
        }

        passes.draw(RadialWarpPass::RadialWarp, radial, input(deep_v));
        passes.draw(RadialWarpPass::Ghost, ghosts, input(deep_v));
        passes.draw(
            RadialWarpPass::ChromaticAberration,
            aberration,
            input(ghosts)
                .texture(TextureSlot::AddTexture, radial)
                .float(ParamName::AddMultiplier, params.chromatic_aberration_multiplier),
        );

        passes.draw(RadialWarpPass::HBlur, deep_h, input(aberration));
        passes.draw(RadialWarpPass::VBlur, deep_v, input(deep_h));

        // vblur[i + 1] -> box -> vblur[i], back to level 0
        for pair in chain.windows(2).rev() {
            let (_, v) = pair[0];
            let (_, next_v) = pair[1];
            passes.draw(
                RadialWarpPass::Box,
                v,
                input(next_v).float(ParamName::Delta, params.blur),
            );
        }

        passes.draw(RadialWarpPass::HBlur, base_h, input(base_v));
        passes.draw(RadialWarpPass::VBlur, base_v, input(base_h));

        passes.draw(
            RadialWarpPass::Composition,
            destination,
            input(base_v).float(ParamName::AddMultiplier, params.intensity),
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
        log::info!("radial_warp_and_ghosts: cleaned up");
    }
}
