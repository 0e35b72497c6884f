//! One pyramid per camera, created lazily and revalidated every frame.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::camera::{CameraId, CameraView};
use crate::pyramid::Pyramid;
use crate::target::TargetAllocator;

/// Maps camera identities to the pyramid each one renders with.
///
/// Entries live until removed or until [`PyramidCache::release_all`]; there is
/// no eviction. Each camera's pyramid owns its own targets.
#[derive(Debug)]
pub struct PyramidCache<P: Pyramid> {
    pyramids: FxHashMap<CameraId, P>,
}

impl<P: Pyramid> PyramidCache<P> {
    pub fn new() -> Self {
        Self {
            pyramids: FxHashMap::default(),
        }
    }

    /// Pyramid for `camera`, allocated on first use and reallocated in place
    /// when the camera size or `shape` no longer matches.
    pub fn get(
        &mut self,
        allocator: &mut dyn TargetAllocator,
        camera: &CameraView,
        shape: P::Shape,
    ) -> &mut P {
        match self.pyramids.entry(camera.id) {
            Entry::Occupied(entry) => {
                let pyramid = entry.into_mut();
                if !pyramid.is_valid_for(camera.width, camera.height, &shape) {
                    log::debug!(
                        "Reallocating pyramid for camera {:?} ({}x{}, {:?})",
                        camera.id,
                        camera.width,
                        camera.height,
                        shape
                    );
                    pyramid.reallocate(allocator, camera.width, camera.height, shape);
                }
                pyramid
            }
            Entry::Vacant(entry) => {
                log::debug!("Creating pyramid for camera {:?}", camera.id);
                entry.insert(P::allocate(allocator, camera.width, camera.height, shape))
            }
        }
    }

    /// Pyramid for `camera` if one exists, without validating it.
    pub fn peek(&self, camera: CameraId) -> Option<&P> {
        self.pyramids.get(&camera)
    }

    /// Release and forget one camera's pyramid. Returns false if there was none.
    pub fn remove(&mut self, allocator: &mut dyn TargetAllocator, camera: CameraId) -> bool {
        match self.pyramids.remove(&camera) {
            Some(mut pyramid) => {
                pyramid.release(allocator);
                true
            }
            None => false,
        }
    }

    /// Release every pyramid, then clear the map.
    pub fn release_all(&mut self, allocator: &mut dyn TargetAllocator) {
        for pyramid in self.pyramids.values_mut() {
            pyramid.release(allocator);
        }
        self.pyramids.clear();
    }

    pub fn len(&self) -> usize {
        self.pyramids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pyramids.is_empty()
    }

    /// Cameras that currently hold a pyramid.
    pub fn cameras(&self) -> impl Iterator<Item = CameraId> + '_ {
        self.pyramids.keys().copied()
    }
}

impl<P: Pyramid> Default for PyramidCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pyramid> Drop for PyramidCache<P> {
    fn drop(&mut self) {
        if !self.pyramids.is_empty() {
            log::warn!(
                "Pyramid cache dropped with {} unreleased camera pyramids",
                self.pyramids.len()
            );
        }
    }
}
