//! Streak pyramid for the anamorphic effect.
//!
//! The base level covers the axis-aligned bounds of the frame rotated by the
//! streak direction, padded by 16 texels and at half height. Later levels
//! halve only the width, so streaks grow along one axis.

use glam::Vec2;
use lenskit_math::{Bounds2, Matrix2x2};

use super::{Pyramid, alloc_slot, is_usable, release_slot};
use crate::target::{TargetAllocator, TargetFormat, TargetHandle, TargetId};

/// Maximum number of levels in the streak chain.
pub const MAX_MIP_LEVEL: usize = 16;

/// Padding added to each axis of the rotated bounds, in texels.
const STREAK_PADDING: u32 = 16;

const UNIT_SQUARE: [Vec2; 4] = [
    Vec2::new(-0.5, -0.5),
    Vec2::new(0.5, -0.5),
    Vec2::new(-0.5, 0.5),
    Vec2::new(0.5, 0.5),
];

/// Parameters that determine the streak pyramid's layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnamorphicShape {
    /// Streak direction in degrees.
    pub degree: f32,
    pub format: TargetFormat,
}

impl AnamorphicShape {
    pub fn new(degree: f32, format: TargetFormat) -> Self {
        Self { degree, format }
    }
}

/// Whether the fade feedback buffer has been cleared since allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeState {
    /// Freshly allocated; the fade input holds undefined contents.
    Fresh,
    /// The fade input has been cleared at least once.
    Initialized,
}

/// Dimensions of every target in a streak pyramid, computed without allocating.
#[derive(Clone, Debug, PartialEq)]
pub struct AnamorphicLayout {
    /// Rotation by the negated streak direction.
    pub rotation: Matrix2x2,
    /// Padded rotated-bounds size, before halving the height.
    pub streak_size: (u32, u32),
    /// `streak_size` relative to the frame size.
    pub texture_scale: Vec2,
    /// Per-level `(width, height)`; `None` once a level gets too small.
    pub levels: [Option<(u32, u32)>; MAX_MIP_LEVEL],
    /// Size of the fade feedback buffers (level 1's size).
    pub fade_size: (u32, u32),
}

impl AnamorphicLayout {
    pub fn compute(width: u32, height: u32, degree: f32) -> Self {
        let rotation = Matrix2x2::rotation(-degree);
        let bounds = Bounds2::from_points(UNIT_SQUARE.iter().map(|&p| rotation * p));
        let fraction = bounds.size();

        let streak_width = (fraction.x * width as f32).ceil() as u32 + STREAK_PADDING;
        let streak_height = (fraction.y * height as f32).ceil() as u32 + STREAK_PADDING;
        let texture_scale = Vec2::new(
            streak_width as f32 / width as f32,
            streak_height as f32 / height as f32,
        );

        let mut w = streak_width;
        let h = streak_height / 2;
        let mut levels = [None; MAX_MIP_LEVEL];
        levels[0] = Some((w, h));
        let mut fade_size = (w / 2, h);
        let mut ended = false;

        for (i, level) in levels.iter_mut().enumerate().skip(1) {
            w /= 2;
            if i == 1 {
                fade_size = (w, h);
            }
            ended |= !is_usable(w, h);
            if !ended {
                *level = Some((w, h));
            }
        }

        Self {
            rotation,
            streak_size: (streak_width, streak_height),
            texture_scale,
            levels,
            fade_size,
        }
    }

    /// Number of allocated levels, counting level 0.
    pub fn populated_levels(&self) -> usize {
        self.levels.iter().take_while(|l| l.is_some()).count()
    }
}

#[derive(Debug, Default)]
struct StreakLevel {
    down: Option<TargetHandle>,
    /// Absent on level 0.
    up: Option<TargetHandle>,
}

/// Streak pyramid owned by one camera.
#[derive(Debug)]
pub struct AnamorphicPyramid {
    base_width: u32,
    base_height: u32,
    shape: AnamorphicShape,
    rotation: Matrix2x2,
    texture_scale: Vec2,
    fade_state: FadeState,
    levels: Vec<StreakLevel>,
    fade_in: Option<TargetHandle>,
    fade_out: Option<TargetHandle>,
}

impl AnamorphicPyramid {
    /// Downsample target of `level`, if that level exists.
    pub fn down(&self, level: usize) -> Option<TargetId> {
        self.levels
            .get(level)
            .and_then(|l| l.down.as_ref())
            .map(TargetHandle::id)
    }

    /// Upsample target of `level`. Never present on level 0.
    pub fn up(&self, level: usize) -> Option<TargetId> {
        self.levels
            .get(level)
            .and_then(|l| l.up.as_ref())
            .map(TargetHandle::id)
    }

    /// Handle of a level's downsample target, with its size.
    pub fn down_handle(&self, level: usize) -> Option<&TargetHandle> {
        self.levels.get(level).and_then(|l| l.down.as_ref())
    }

    pub fn fade_in(&self) -> Option<TargetId> {
        self.fade_in.as_ref().map(TargetHandle::id)
    }

    pub fn fade_out(&self) -> Option<TargetId> {
        self.fade_out.as_ref().map(TargetHandle::id)
    }

    /// Number of consecutive levels with a downsample target, counting level 0.
    pub fn populated_levels(&self) -> usize {
        self.levels.iter().take_while(|l| l.down.is_some()).count()
    }

    /// Streak direction in degrees, as configured.
    pub fn angle(&self) -> f32 {
        self.shape.degree
    }

    pub fn rotation(&self) -> Matrix2x2 {
        self.rotation
    }

    /// Streak buffer size relative to the frame, for mapping back in composition.
    pub fn texture_scale(&self) -> Vec2 {
        self.texture_scale
    }

    pub fn fade_state(&self) -> FadeState {
        self.fade_state
    }

    /// Record that the fade input has been cleared.
    pub fn mark_initialized(&mut self) {
        self.fade_state = FadeState::Initialized;
    }

    pub fn base_size(&self) -> (u32, u32) {
        (self.base_width, self.base_height)
    }

    pub fn shape(&self) -> AnamorphicShape {
        self.shape
    }
}

impl Pyramid for AnamorphicPyramid {
    type Shape = AnamorphicShape;

    fn allocate(
        allocator: &mut dyn TargetAllocator,
        width: u32,
        height: u32,
        shape: AnamorphicShape,
    ) -> Self {
        let layout = AnamorphicLayout::compute(width, height, shape.degree);
        let format = shape.format;

        let levels: Vec<StreakLevel> = layout
            .levels
            .iter()
            .enumerate()
            .map(|(i, size)| match *size {
                Some(size) => {
                    log::trace!("Streak level {i}: {}x{}", size.0, size.1);
                    StreakLevel {
                        down: alloc_slot(allocator, size, format),
                        up: if i == 0 {
                            None
                        } else {
                            alloc_slot(allocator, size, format)
                        },
                    }
                }
                None => StreakLevel::default(),
            })
            .collect();

        let fade_in = alloc_slot(allocator, layout.fade_size, format);
        let fade_out = alloc_slot(allocator, layout.fade_size, format);

        log::debug!(
            "Allocated streak pyramid for {width}x{height} at {} degrees: base {}x{}, {} levels",
            shape.degree,
            layout.streak_size.0,
            layout.streak_size.1 / 2,
            layout.populated_levels()
        );

        Self {
            base_width: width,
            base_height: height,
            shape,
            rotation: layout.rotation,
            texture_scale: layout.texture_scale,
            fade_state: FadeState::Fresh,
            levels,
            fade_in,
            fade_out,
        }
    }

    fn is_valid_for(&self, width: u32, height: u32, shape: &AnamorphicShape) -> bool {
        self.base_width == width && self.base_height == height && self.shape == *shape
    }

    fn release(&mut self, allocator: &mut dyn TargetAllocator) {
        for level in &mut self.levels {
            release_slot(allocator, &mut level.up);
            release_slot(allocator, &mut level.down);
        }
        release_slot(allocator, &mut self.fade_in);
        release_slot(allocator, &mut self.fade_out);
    }

    fn target_ids(&self) -> Vec<TargetId> {
        self.levels
            .iter()
            .flat_map(|l| [l.down.as_ref(), l.up.as_ref()])
            .chain([self.fade_in.as_ref(), self.fade_out.as_ref()])
            .flatten()
            .map(TargetHandle::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{TargetDesc, TargetHandle, TargetId, TrackingAllocator};

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Alloc(TargetId),
        Release(TargetId),
    }

    /// Tracking allocator that also logs every call in order.
    #[derive(Default)]
    struct RecordingAllocator {
        inner: TrackingAllocator,
        events: Vec<Event>,
    }

    impl TargetAllocator for RecordingAllocator {
        fn allocate(&mut self, desc: TargetDesc) -> TargetHandle {
            let handle = self.inner.allocate(desc);
            self.events.push(Event::Alloc(handle.id()));
            handle
        }

        fn release(&mut self, handle: TargetHandle) {
            self.events.push(Event::Release(handle.id()));
            self.inner.release(handle);
        }
    }

    fn shape(degree: f32) -> AnamorphicShape {
        AnamorphicShape::new(degree, TargetFormat::Compact)
    }

    #[test]
    fn test_unrotated_layout_at_1080p() {
        let layout = AnamorphicLayout::compute(1920, 1080, 0.0);
        assert_eq!(layout.rotation, Matrix2x2::IDENTITY);
        assert_eq!(layout.streak_size, (1936, 1096));
        assert_eq!(layout.levels[0], Some((1936, 548)));
        assert_eq!(layout.levels[1], Some((968, 548)));
        assert_eq!(layout.levels[2], Some((484, 548)));
        assert_eq!(layout.fade_size, (968, 548));
        assert_eq!(layout.texture_scale, Vec2::new(1936.0 / 1920.0, 1096.0 / 1080.0));
        // 1936 >> 9 == 3, so levels 0..=8 are usable.
        assert_eq!(layout.populated_levels(), 9);
    }

    #[test]
    fn test_diagonal_streak_widens_bounds() {
        let layout = AnamorphicLayout::compute(1000, 1000, 45.0);
        // A unit square rotated by 45 degrees spans sqrt(2) on both axes.
        let expected = (2.0f32.sqrt() * 1000.0).ceil() as u32 + 16;
        assert!(layout.streak_size.0.abs_diff(expected) <= 1);
        assert!(layout.streak_size.1.abs_diff(expected) <= 1);
        assert!(layout.texture_scale.x > 1.4);
    }

    #[test]
    fn test_level_sizes_hold_for_all_directions() {
        for (w, h) in [(64u32, 64u32), (640, 360), (1920, 1080), (97, 1203)] {
            for step in 0..=36 {
                let degree = step as f32 * 5.0;
                let layout = AnamorphicLayout::compute(w, h, degree);
                let rotation = Matrix2x2::rotation(-degree);
                let size = Bounds2::from_points(UNIT_SQUARE.map(|p| rotation * p)).size();
                let sw = (size.x * w as f32).ceil() as u32 + 16;
                let sh = (size.y * h as f32).ceil() as u32 + 16;
                assert_eq!(layout.levels[0], Some((sw, sh / 2)), "{w}x{h} at {degree}");

                let populated = layout.populated_levels();
                assert!((1..=MAX_MIP_LEVEL).contains(&populated));
                assert!(layout.levels[populated..].iter().all(Option::is_none));
                for (i, level) in layout.levels.iter().enumerate().take(populated).skip(1) {
                    let (lw, lh) = level.unwrap();
                    assert_eq!(lw, sw >> i);
                    assert_eq!(lh, sh / 2);
                    assert!(lw >= 4 && lh >= 4);
                }
            }
        }
    }

    #[test]
    fn test_allocation_matches_layout() {
        let mut alloc = TrackingAllocator::new();
        let pyramid = AnamorphicPyramid::allocate(&mut alloc, 640, 360, shape(0.0));
        let layout = AnamorphicLayout::compute(640, 360, 0.0);
        let levels = layout.populated_levels();

        assert_eq!(pyramid.populated_levels(), levels);
        assert!(pyramid.up(0).is_none());
        for i in 1..levels {
            assert!(pyramid.up(i).is_some());
        }
        assert!(pyramid.down(levels).is_none());
        assert!(pyramid.up(levels).is_none());
        assert!(pyramid.down(MAX_MIP_LEVEL).is_none());
        // One down on level 0, down+up on the rest, plus the two fade buffers.
        assert_eq!(alloc.live_count(), 1 + 2 * (levels - 1) + 2);
        assert_eq!(pyramid.target_ids().len(), alloc.live_count());

        let fade = alloc.desc(pyramid.fade_in().unwrap()).unwrap();
        assert_eq!((fade.width, fade.height), layout.fade_size);
        assert_eq!(pyramid.fade_state(), FadeState::Fresh);
        assert_eq!(pyramid.angle(), 0.0);
    }

    #[test]
    fn test_validity_is_exact() {
        let mut alloc = TrackingAllocator::new();
        let pyramid = AnamorphicPyramid::allocate(&mut alloc, 800, 600, shape(30.0));
        assert!(pyramid.is_valid_for(800, 600, &shape(30.0)));
        assert!(!pyramid.is_valid_for(801, 600, &shape(30.0)));
        assert!(!pyramid.is_valid_for(800, 600, &shape(30.5)));
        assert!(!pyramid.is_valid_for(
            800,
            600,
            &AnamorphicShape::new(30.0, TargetFormat::Balanced)
        ));
    }

    #[test]
    fn test_release_returns_everything_and_is_idempotent() {
        let mut alloc = TrackingAllocator::new();
        let mut pyramid = AnamorphicPyramid::allocate(&mut alloc, 320, 200, shape(90.0));
        assert!(alloc.live_count() > 0);
        pyramid.release(&mut alloc);
        assert_eq!(alloc.live_count(), 0);
        pyramid.release(&mut alloc);
        assert_eq!(alloc.invalid_releases(), 0);
        assert_eq!(alloc.allocations(), alloc.releases());
        assert!(pyramid.down(0).is_none());
        assert!(pyramid.fade_in().is_none());
    }

    #[test]
    fn test_reallocate_releases_before_allocating() {
        let mut alloc = TrackingAllocator::new();
        let mut pyramid = AnamorphicPyramid::allocate(&mut alloc, 320, 200, shape(0.0));
        let old = pyramid.target_ids();
        let old_count = old.len() as u64;

        pyramid.reallocate(&mut alloc, 320, 200, shape(60.0));
        assert_eq!(alloc.releases(), old_count);
        assert!(old.iter().all(|id| !alloc.is_live(*id)));
        assert_eq!(alloc.live_count(), pyramid.target_ids().len());
        assert!(pyramid.is_valid_for(320, 200, &shape(60.0)));
        assert_eq!(pyramid.fade_state(), FadeState::Fresh);

        let layout = AnamorphicLayout::compute(320, 200, 60.0);
        let base = pyramid.down_handle(0).unwrap();
        assert_eq!(Some((base.width(), base.height())), layout.levels[0]);
    }

    #[test]
    fn test_reallocate_event_order() {
        let mut alloc = RecordingAllocator::default();
        let mut pyramid = AnamorphicPyramid::allocate(&mut alloc, 320, 200, shape(0.0));
        let old = pyramid.target_ids();
        alloc.events.clear();

        pyramid.reallocate(&mut alloc, 320, 200, shape(45.0));
        let (releases, allocs) = alloc.events.split_at(old.len());
        assert!(releases.iter().all(|e| matches!(e, Event::Release(id) if old.contains(id))));
        assert!(allocs.iter().all(|e| matches!(e, Event::Alloc(_))));
        assert_eq!(allocs.len(), pyramid.target_ids().len());
        assert_eq!(alloc.inner.live_count(), allocs.len());
    }

    #[test]
    fn test_tiny_frame_keeps_short_chain() {
        let mut alloc = TrackingAllocator::new();
        let pyramid = AnamorphicPyramid::allocate(&mut alloc, 1, 1, shape(0.0));
        // Base is 17x8, level 1 is 8x8, level 2 is 4x8, level 3 would be 2 wide.
        assert_eq!(pyramid.populated_levels(), 3);
        assert!(pyramid.down(3).is_none());
    }
}
