//! Render-target allocation capability.
//!
//! Pyramids never create GPU resources directly. They ask a [`TargetAllocator`]
//! for a [`TargetHandle`] and give it back when they are done with it. Handles
//! are not `Clone`, and releasing one consumes it, so a target cannot be
//! released twice.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Pixel format for intermediate effect targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFormat {
    /// 4 x 32-bit float.
    HighPrecision,
    /// 4 x 16-bit float.
    Balanced,
    /// Packed 11/11/10-bit unsigned float, 32 bits per texel.
    #[default]
    Compact,
}

impl TargetFormat {
    /// The wgpu texture format backing this choice.
    pub fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            TargetFormat::HighPrecision => wgpu::TextureFormat::Rgba32Float,
            TargetFormat::Balanced => wgpu::TextureFormat::Rgba16Float,
            TargetFormat::Compact => wgpu::TextureFormat::Rg11b10Ufloat,
        }
    }

    /// Bytes per texel.
    pub fn texel_size(self) -> u64 {
        match self {
            TargetFormat::HighPrecision => 16,
            TargetFormat::Balanced => 8,
            TargetFormat::Compact => 4,
        }
    }
}

/// Size and format of a 2D render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
}

impl TargetDesc {
    pub fn new(width: u32, height: u32, format: TargetFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Memory footprint of one target with this description.
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.texel_size()
    }
}

/// Identifier of an allocated target, used to reference it from pass descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

/// Owned handle to an allocated render target.
///
/// The owner must hand it back through [`TargetAllocator::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct TargetHandle {
    id: TargetId,
    desc: TargetDesc,
}

impl TargetHandle {
    /// Wrap a freshly allocated target. Only allocators should call this.
    pub fn new(id: TargetId, desc: TargetDesc) -> Self {
        Self { id, desc }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn desc(&self) -> TargetDesc {
        self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }
}

/// Capability to create and destroy 2D render targets.
pub trait TargetAllocator {
    /// Allocate a target. Allocation is assumed to succeed.
    fn allocate(&mut self, desc: TargetDesc) -> TargetHandle;

    /// Return a target to the allocator.
    fn release(&mut self, handle: TargetHandle);
}

/// Allocator that only tracks handles, without touching a GPU.
///
/// Counts allocations and releases and keeps the set of live targets, which
/// makes leaks and foreign releases visible to hosts and tests.
#[derive(Debug, Default)]
pub struct TrackingAllocator {
    next_id: u64,
    live: FxHashMap<TargetId, TargetDesc>,
    allocations: u64,
    releases: u64,
    invalid_releases: u64,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets allocated and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// True if `id` is currently allocated.
    pub fn is_live(&self, id: TargetId) -> bool {
        self.live.contains_key(&id)
    }

    /// Description of a live target.
    pub fn desc(&self, id: TargetId) -> Option<TargetDesc> {
        self.live.get(&id).copied()
    }

    /// Total successful allocations since creation.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Total releases of live targets since creation.
    pub fn releases(&self) -> u64 {
        self.releases
    }

    /// Releases of handles this allocator did not know about.
    pub fn invalid_releases(&self) -> u64 {
        self.invalid_releases
    }

    /// Sum of the memory footprints of all live targets.
    pub fn live_bytes(&self) -> u64 {
        self.live.values().map(TargetDesc::byte_size).sum()
    }
}

impl TargetAllocator for TrackingAllocator {
    fn allocate(&mut self, desc: TargetDesc) -> TargetHandle {
        self.next_id += 1;
        let id = TargetId(self.next_id);
        self.live.insert(id, desc);
        self.allocations += 1;
        TargetHandle::new(id, desc)
    }

    fn release(&mut self, handle: TargetHandle) {
        if self.live.remove(&handle.id()).is_some() {
            self.releases += 1;
        } else {
            self.invalid_releases += 1;
            log::error!("release of unknown render target {:?}", handle.id());
        }
    }
}

/// Allocator backed by wgpu textures.
///
/// Each target is a single-mip, single-sample 2D texture usable both as a
/// render attachment and as a sampled input. [`TargetFormat::Compact`] is only
/// renderable with `RG11B10UFLOAT_RENDERABLE`; without it those targets are
/// created as [`TargetFormat::Balanced`].
pub struct GpuTargetAllocator<'a> {
    device: &'a wgpu::Device,
    compact_renderable: bool,
    next_id: u64,
    textures: FxHashMap<TargetId, (wgpu::Texture, wgpu::TextureView)>,
}

impl<'a> GpuTargetAllocator<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        let compact_renderable = device
            .features()
            .contains(wgpu::Features::RG11B10UFLOAT_RENDERABLE);
        if !compact_renderable {
            log::warn!(
                "RG11B10UFLOAT_RENDERABLE unavailable, compact targets fall back to Rgba16Float"
            );
        }
        Self {
            device,
            compact_renderable,
            next_id: 0,
            textures: FxHashMap::default(),
        }
    }

    /// Texture format actually used for `format` on this device.
    pub fn texture_format(&self, format: TargetFormat) -> wgpu::TextureFormat {
        match format {
            TargetFormat::Compact if !self.compact_renderable => {
                TargetFormat::Balanced.wgpu_format()
            }
            _ => format.wgpu_format(),
        }
    }

    /// Texture view for a live target, for binding in a pass executor.
    pub fn view(&self, id: TargetId) -> Option<&wgpu::TextureView> {
        self.textures.get(&id).map(|(_, view)| view)
    }

    /// Underlying texture for a live target.
    pub fn texture(&self, id: TargetId) -> Option<&wgpu::Texture> {
        self.textures.get(&id).map(|(texture, _)| texture)
    }

    /// Number of live textures.
    pub fn live_count(&self) -> usize {
        self.textures.len()
    }
}

impl TargetAllocator for GpuTargetAllocator<'_> {
    fn allocate(&mut self, desc: TargetDesc) -> TargetHandle {
        self.next_id += 1;
        let id = TargetId(self.next_id);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lens-flare-target"),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.texture_format(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::trace!("Allocated target {id:?}: {}x{} {:?}", desc.width, desc.height, desc.format);

        self.textures.insert(id, (texture, view));
        TargetHandle::new(id, desc)
    }

    fn release(&mut self, handle: TargetHandle) {
        match self.textures.remove(&handle.id()) {
            Some((texture, _view)) => texture.destroy(),
            None => log::error!("release of unknown render target {:?}", handle.id()),
        }
    }
}
