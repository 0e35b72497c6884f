//! Per-camera mip pyramids of intermediate render targets.
//!
//! Both pyramids share only their lifecycle: allocate for an exact
//! `(width, height, shape)` tuple, answer whether they still match a request,
//! and release every target they own. Any mismatch means a full release and a
//! fresh allocation, never a partial resize.

mod anamorphic;
mod flare;

pub use anamorphic::{
    AnamorphicLayout, AnamorphicPyramid, AnamorphicShape, FadeState, MAX_MIP_LEVEL,
};
pub use flare::{FlareLayout, FlarePyramid, FlareShape};

use crate::target::{TargetAllocator, TargetDesc, TargetHandle, TargetId};

/// Levels whose width or height would fall below this many texels are left
/// unallocated and end the chain.
pub const MIN_LEVEL_SIZE: u32 = 4;

/// Allocation lifecycle shared by the effect pyramids.
pub trait Pyramid: Sized {
    /// Effect parameters that change the pyramid's layout.
    type Shape: Copy + PartialEq + std::fmt::Debug;

    /// Allocate every target for a `width` x `height` camera.
    fn allocate(
        allocator: &mut dyn TargetAllocator,
        width: u32,
        height: u32,
        shape: Self::Shape,
    ) -> Self;

    /// True if this pyramid was allocated for exactly this request.
    fn is_valid_for(&self, width: u32, height: u32, shape: &Self::Shape) -> bool;

    /// Hand every owned target back to `allocator`. Safe to call again on an
    /// already released pyramid.
    fn release(&mut self, allocator: &mut dyn TargetAllocator);

    /// Release everything, then allocate for the new request.
    fn reallocate(
        &mut self,
        allocator: &mut dyn TargetAllocator,
        width: u32,
        height: u32,
        shape: Self::Shape,
    ) {
        self.release(allocator);
        *self = Self::allocate(allocator, width, height, shape);
    }

    /// Ids of every target currently owned.
    fn target_ids(&self) -> Vec<TargetId>;
}

fn is_usable(width: u32, height: u32) -> bool {
    width >= MIN_LEVEL_SIZE && height >= MIN_LEVEL_SIZE
}

fn release_slot(allocator: &mut dyn TargetAllocator, slot: &mut Option<TargetHandle>) {
    if let Some(handle) = slot.take() {
        allocator.release(handle);
    }
}

fn alloc_slot(
    allocator: &mut dyn TargetAllocator,
    (width, height): (u32, u32),
    format: crate::target::TargetFormat,
) -> Option<TargetHandle> {
    Some(allocator.allocate(TargetDesc::new(width, height, format)))
}
