//! Per-frame camera description handed to effects by the host pipeline.

/// Stable identity of one camera instance. Pyramids are cached per id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u64);

/// What an effect needs to know about the camera it is rendering for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraView {
    pub id: CameraId,
    /// Actual render width in pixels.
    pub width: u32,
    /// Actual render height in pixels.
    pub height: u32,
    /// True while the host is playing, false for static previews. Temporal
    /// feedback only runs in interactive contexts.
    pub interactive: bool,
}

impl CameraView {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self {
            id: CameraId(id),
            width,
            height,
            interactive: true,
        }
    }

    /// Same camera, flagged as a static preview.
    pub fn preview(mut self) -> Self {
        self.interactive = false;
        self
    }
}
