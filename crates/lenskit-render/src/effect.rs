//! Host-facing lifecycle shared by the lens flare effects.

use std::ops::RangeInclusive;

use crate::camera::CameraView;
use crate::pass::{PassSink, TextureRef};
use crate::program::{ProgramHandle, ProgramLibrary};
use crate::target::TargetAllocator;

/// Where in the host's post-processing chain an effect runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InjectionPoint {
    #[default]
    BeforePostProcess,
    AfterPostProcess,
}

/// A post-processing effect driven once per camera per frame.
///
/// The host calls [`setup`](Self::setup) once, then for every camera and
/// frame checks [`is_active`](Self::is_active) before calling
/// [`render`](Self::render), and finally calls [`cleanup`](Self::cleanup).
pub trait PostProcessEffect {
    fn name(&self) -> &'static str;

    fn injection_point(&self) -> InjectionPoint {
        InjectionPoint::BeforePostProcess
    }

    /// Whether the effect applies to editor scene views.
    fn visible_in_scene_view(&self) -> bool {
        false
    }

    /// False when the program failed to load or the parameters make the
    /// effect a no-op. Inactive effects must not be rendered.
    fn is_active(&self) -> bool;

    /// Load the pass program. A failed load leaves the effect inactive.
    fn setup(&mut self, programs: &mut dyn ProgramLibrary);

    /// Issue this frame's passes for `camera`, reading `source` and writing
    /// `destination`.
    fn render(
        &mut self,
        allocator: &mut dyn TargetAllocator,
        sink: &mut dyn PassSink,
        camera: &CameraView,
        source: TextureRef,
        destination: TextureRef,
    );

    /// Release the program and every cached pyramid. Calling it again is a no-op.
    fn cleanup(&mut self, programs: &mut dyn ProgramLibrary, allocator: &mut dyn TargetAllocator);
}

/// Load `name` for `effect`, logging the outcome.
pub(crate) fn load_program(
    programs: &mut dyn ProgramLibrary,
    effect: &str,
    name: &str,
) -> Option<ProgramHandle> {
    match programs.load(name) {
        Ok(handle) => {
            log::info!("{effect}: loaded program '{name}'");
            Some(handle)
        }
        Err(e) => {
            log::warn!("{effect}: {e}; effect disabled");
            None
        }
    }
}

/// Clamp `value` into `range`. NaN maps to the lower bound.
pub(crate) fn clamp_to(value: f32, range: RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        *range.start()
    } else {
        value.clamp(*range.start(), *range.end())
    }
}
