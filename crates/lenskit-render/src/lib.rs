//! Lens flare post-processing: per-camera target pyramids, ordered full-screen pass lists,
//! and the anamorphic and radial warp effects built on them.

pub mod anamorphic;
pub mod cache;
pub mod camera;
pub mod effect;
pub mod pass;
pub mod program;
pub mod pyramid;
pub mod radial_warp;
pub mod target;

pub use anamorphic::{AnamorphicEffect, AnamorphicParams, AnamorphicPass};
pub use cache::PyramidCache;
pub use camera::{CameraId, CameraView};
pub use effect::{InjectionPoint, PostProcessEffect};
pub use pass::{
    Bindings, CommandList, HostTexture, ParamName, ParamValue, PassDescriptor, PassKind, PassList,
    PassSink, TextureRef, TextureSlot,
};
pub use program::{
    ANAMORPHIC_PROGRAM, ProgramError, ProgramHandle, ProgramLibrary, ProgramRegistry,
    RADIAL_WARP_PROGRAM,
};
pub use pyramid::{AnamorphicPyramid, FadeState, FlarePyramid, Pyramid};
pub use radial_warp::{RadialWarpAndGhostsEffect, RadialWarpParams, RadialWarpPass};
pub use target::{
    GpuTargetAllocator, TargetAllocator, TargetDesc, TargetFormat, TargetHandle, TargetId,
    TrackingAllocator,
};
