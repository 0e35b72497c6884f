//! Blur pyramid for the radial warp and ghosts effect.

use super::{Pyramid, alloc_slot, is_usable, release_slot};
use crate::target::{TargetAllocator, TargetFormat, TargetHandle, TargetId};

/// Parameters that determine the blur pyramid's layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlareShape {
    /// Requested level count, including the full-resolution level 0.
    pub levels: usize,
    /// Downsample factor between consecutive levels, at least 1.
    pub factor: f32,
    pub format: TargetFormat,
}

impl FlareShape {
    pub fn new(levels: usize, factor: f32, format: TargetFormat) -> Self {
        Self {
            levels,
            factor,
            format,
        }
    }
}

/// Dimensions of every target in a blur pyramid, computed without allocating.
#[derive(Clone, Debug, PartialEq)]
pub struct FlareLayout {
    /// Per-level `(width, height)` for each requested level; `None` past the
    /// point where a level would be too small.
    pub levels: Vec<Option<(u32, u32)>>,
    /// Levels actually allocated, counting level 0.
    pub effective_levels: usize,
    /// Size of the radial warp, ghost and aberration buffers: the smallest
    /// allocated level.
    pub aux_size: (u32, u32),
}

impl FlareLayout {
    pub fn compute(width: u32, height: u32, levels: usize, factor: f32) -> Self {
        let requested = levels.max(1);
        let factor = factor.max(1.0);

        let mut sizes = vec![None; requested];
        sizes[0] = Some((width, height));
        let mut effective = requested;
        let mut aux_size = (width, height);
        let (mut w, mut h) = (width, height);

        for (i, size) in sizes.iter_mut().enumerate().skip(1) {
            w = (w as f32 / factor) as u32;
            h = (h as f32 / factor) as u32;
            if effective < requested || !is_usable(w, h) {
                effective = effective.min(i);
            } else {
                aux_size = (w, h);
                *size = Some((w, h));
            }
        }

        Self {
            levels: sizes,
            effective_levels: effective,
            aux_size,
        }
    }

    /// Index of the deepest allocated level.
    pub fn max_downsample(&self) -> usize {
        self.effective_levels - 1
    }
}

#[derive(Debug, Default)]
struct BlurLevel {
    hblur: Option<TargetHandle>,
    vblur: Option<TargetHandle>,
}

/// Blur pyramid owned by one camera.
#[derive(Debug)]
pub struct FlarePyramid {
    base_width: u32,
    base_height: u32,
    shape: FlareShape,
    effective_levels: usize,
    levels: Vec<BlurLevel>,
    radial_warped: Option<TargetHandle>,
    ghosts: Option<TargetHandle>,
    aberration: Option<TargetHandle>,
}

impl FlarePyramid {
    /// Horizontal blur target of `level`, if that level exists.
    pub fn hblur(&self, level: usize) -> Option<TargetId> {
        self.levels
            .get(level)
            .and_then(|l| l.hblur.as_ref())
            .map(TargetHandle::id)
    }

    /// Vertical blur target of `level`, if that level exists.
    pub fn vblur(&self, level: usize) -> Option<TargetId> {
        self.levels
            .get(level)
            .and_then(|l| l.vblur.as_ref())
            .map(TargetHandle::id)
    }

    /// Handle of a level's vertical blur target, with its size.
    pub fn vblur_handle(&self, level: usize) -> Option<&TargetHandle> {
        self.levels.get(level).and_then(|l| l.vblur.as_ref())
    }

    pub fn radial_warped(&self) -> Option<TargetId> {
        self.radial_warped.as_ref().map(TargetHandle::id)
    }

    pub fn ghosts(&self) -> Option<TargetId> {
        self.ghosts.as_ref().map(TargetHandle::id)
    }

    pub fn aberration(&self) -> Option<TargetId> {
        self.aberration.as_ref().map(TargetHandle::id)
    }

    /// Levels allocated, counting level 0. May be below the requested count.
    pub fn effective_levels(&self) -> usize {
        self.effective_levels
    }

    /// Index of the deepest allocated level.
    pub fn max_downsample(&self) -> usize {
        self.effective_levels.saturating_sub(1)
    }

    pub fn base_size(&self) -> (u32, u32) {
        (self.base_width, self.base_height)
    }

    pub fn shape(&self) -> FlareShape {
        self.shape
    }
}

impl Pyramid for FlarePyramid {
    type Shape = FlareShape;

    fn allocate(
        allocator: &mut dyn TargetAllocator,
        width: u32,
        height: u32,
        shape: FlareShape,
    ) -> Self {
        let layout = FlareLayout::compute(width, height, shape.levels, shape.factor);
        let format = shape.format;

        let levels: Vec<BlurLevel> = layout
            .levels
            .iter()
            .enumerate()
            .map(|(i, size)| match *size {
                Some(size) => {
                    log::trace!("Blur level {i}: {}x{}", size.0, size.1);
                    BlurLevel {
                        hblur: alloc_slot(allocator, size, format),
                        vblur: alloc_slot(allocator, size, format),
                    }
                }
                None => BlurLevel::default(),
            })
            .collect();

        let radial_warped = alloc_slot(allocator, layout.aux_size, format);
        let ghosts = alloc_slot(allocator, layout.aux_size, format);
        let aberration = alloc_slot(allocator, layout.aux_size, format);

        if layout.effective_levels < shape.levels {
            log::debug!(
                "Blur chain for {width}x{height} clamped from {} to {} levels",
                shape.levels,
                layout.effective_levels
            );
        }
        log::debug!(
            "Allocated blur pyramid for {width}x{height}: {} levels, factor {}, aux {}x{}",
            layout.effective_levels,
            shape.factor,
            layout.aux_size.0,
            layout.aux_size.1
        );

        Self {
            base_width: width,
            base_height: height,
            shape,
            effective_levels: layout.effective_levels,
            levels,
            radial_warped,
            ghosts,
            aberration,
        }
    }

    /// Compares against the requested level count, so a clamped chain stays
    /// valid while the request is unchanged.
    fn is_valid_for(&self, width: u32, height: u32, shape: &FlareShape) -> bool {
        self.base_width == width && self.base_height == height && self.shape == *shape
    }

    fn release(&mut self, allocator: &mut dyn TargetAllocator) {
        release_slot(allocator, &mut self.radial_warped);
        release_slot(allocator, &mut self.ghosts);
        release_slot(allocator, &mut self.aberration);
        for level in &mut self.levels {
            release_slot(allocator, &mut level.hblur);
            release_slot(allocator, &mut level.vblur);
        }
    }

    fn target_ids(&self) -> Vec<TargetId> {
        self.levels
            .iter()
            .flat_map(|l| [l.hblur.as_ref(), l.vblur.as_ref()])
            .chain([
                self.radial_warped.as_ref(),
                self.ghosts.as_ref(),
                self.aberration.as_ref(),
            ])
            .flatten()
            .map(TargetHandle::id)
            .collect()
    }
}
