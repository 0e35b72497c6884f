//! Compiled pass programs.
//!
//! Effects load one program at setup and reference it from every pass they
//! issue. Compilation itself belongs to the host; this module only names the
//! programs and tracks which handles are live.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Program with the anamorphic streak passes.
pub const ANAMORPHIC_PROGRAM: &str = "lens_flares/anamorphic";
/// Program with the radial warp, ghost and blur passes.
pub const RADIAL_WARP_PROGRAM: &str = "lens_flares/radial_warp_and_ghosts";

/// Opaque handle to a loaded pass program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

/// Error types for program loading.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("program '{name}' not found")]
    NotFound { name: String },

    #[error("program '{name}' failed to compile: {message}")]
    CompilationFailed { name: String, message: String },
}

/// Source of compiled pass programs.
pub trait ProgramLibrary {
    fn load(&mut self, name: &str) -> Result<ProgramHandle, ProgramError>;

    fn release(&mut self, handle: ProgramHandle);
}

/// In-memory program library for hosts that compile programs up front.
///
/// Names must be registered before they can be loaded. Each successful load
/// counts as one reference until released.
#[derive(Debug, Default)]
pub struct ProgramRegistry {
    next_handle: u64,
    handles: FxHashMap<String, ProgramHandle>,
    failures: FxHashMap<String, String>,
    loaded: FxHashMap<ProgramHandle, usize>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with both lens flare programs available.
    pub fn with_lens_flares() -> Self {
        let mut registry = Self::new();
        registry.register(ANAMORPHIC_PROGRAM);
        registry.register(RADIAL_WARP_PROGRAM);
        registry
    }

    /// Make `name` loadable. Registering twice returns the existing handle.
    pub fn register(&mut self, name: &str) -> ProgramHandle {
        self.failures.remove(name);
        if let Some(&handle) = self.handles.get(name) {
            return handle;
        }
        self.next_handle += 1;
        let handle = ProgramHandle(self.next_handle);
        self.handles.insert(name.to_string(), handle);
        handle
    }

    /// Record that `name` failed to compile; later loads report `message`.
    pub fn register_failure(&mut self, name: &str, message: &str) {
        self.handles.remove(name);
        self.failures.insert(name.to_string(), message.to_string());
    }

    /// Outstanding loads of `handle`.
    pub fn references(&self, handle: ProgramHandle) -> usize {
        self.loaded.get(&handle).copied().unwrap_or(0)
    }

    /// Sum of outstanding loads across all programs.
    pub fn total_references(&self) -> usize {
        self.loaded.values().sum()
    }
}

impl ProgramLibrary for ProgramRegistry {
    fn load(&mut self, name: &str) -> Result<ProgramHandle, ProgramError> {
        if let Some(message) = self.failures.get(name) {
            return Err(ProgramError::CompilationFailed {
                name: name.to_string(),
                message: message.clone(),
            });
        }
        let handle = *self
            .handles
            .get(name)
            .ok_or_else(|| ProgramError::NotFound {
                name: name.to_string(),
            })?;
        *self.loaded.entry(handle).or_insert(0) += 1;
        log::debug!("Loaded program '{}'", name);
        Ok(handle)
    }

    fn release(&mut self, handle: ProgramHandle) {
        match self.loaded.get_mut(&handle) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.loaded.remove(&handle);
            }
            None => log::warn!("release of program {:?} that was not loaded", handle),
        }
    }
}
