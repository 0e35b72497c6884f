//! Full-screen pass descriptors and the sink that receives them.
//!
//! An effect describes a frame as a [`PassList`]: an ordered sequence of
//! [`PassDescriptor`]s, each naming its program pass, its output target and
//! every texture and parameter it reads. Descriptors are built once and never
//! mutated, so a pass cannot observe a binding left behind by an earlier one.
//! The finished list is handed to a [`PassSink`] in a single call.

use glam::Vec2;

use crate::program::ProgramHandle;
use crate::target::{TargetHandle, TargetId};

/// Texture owned by the host pipeline (frame color, destination, lookup textures).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostTexture(pub u64);

/// Any texture a pass can read or write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureRef {
    /// Intermediate target owned by an effect pyramid.
    Target(TargetId),
    /// Texture owned by the host.
    Host(HostTexture),
}

impl From<TargetId> for TextureRef {
    fn from(id: TargetId) -> Self {
        TextureRef::Target(id)
    }
}

impl From<&TargetHandle> for TextureRef {
    fn from(handle: &TargetHandle) -> Self {
        TextureRef::Target(handle.id())
    }
}

impl From<HostTexture> for TextureRef {
    fn from(texture: HostTexture) -> Self {
        TextureRef::Host(texture)
    }
}

/// Logical texture inputs of the lens flare programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    SourceTexture,
    InputTexture,
    OtherTexture,
    AddTexture,
    ChromaticAberrationSpectrum,
}

impl TextureSlot {
    /// Uniform name in the pass programs.
    pub fn shader_name(self) -> &'static str {
        match self {
            TextureSlot::SourceTexture => "_SourceTexture",
            TextureSlot::InputTexture => "_InputTexture",
            TextureSlot::OtherTexture => "_OtherTexture",
            TextureSlot::AddTexture => "_AddTexture",
            TextureSlot::ChromaticAberrationSpectrum => "_ChromaticAberration_Spectrum",
        }
    }
}

/// Logical scalar, vector and color inputs of the lens flare programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamName {
    Intensity,
    Threshold,
    Stretch,
    Color,
    Angle,
    Fade,
    AngleTextureScale,
    Delta,
    GhostIntensity,
    RadialWarpIntensity,
    RadialWarpLength,
    AddMultiplier,
}

impl ParamName {
    /// Uniform name in the pass programs.
    pub fn shader_name(self) -> &'static str {
        match self {
            ParamName::Intensity => "_Intensity",
            ParamName::Threshold => "_Threshold",
            ParamName::Stretch => "_Stretch",
            ParamName::Color => "_Color",
            ParamName::Angle => "_Angle",
            ParamName::Fade => "_Fade",
            ParamName::AngleTextureScale => "_AngleTextureScale",
            ParamName::Delta => "_Delta",
            ParamName::GhostIntensity => "_GhostIntensity",
            ParamName::RadialWarpIntensity => "_RadialWarpIntensity",
            ParamName::RadialWarpLength => "_RadialWarpLength",
            ParamName::AddMultiplier => "_AddMultiplier",
        }
    }
}

/// Value bound to a [`ParamName`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Vector(Vec2),
    /// Linear RGBA.
    Color([f32; 4]),
}

/// Textures and parameters bound for one pass.
///
/// Setting a slot or name that is already bound replaces the earlier value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    textures: Vec<(TextureSlot, TextureRef)>,
    params: Vec<(ParamName, ParamValue)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(mut self, slot: TextureSlot, texture: impl Into<TextureRef>) -> Self {
        self.set_texture(slot, texture.into());
        self
    }

    pub fn float(self, name: ParamName, value: f32) -> Self {
        self.param(name, ParamValue::Float(value))
    }

    pub fn vector(self, name: ParamName, value: Vec2) -> Self {
        self.param(name, ParamValue::Vector(value))
    }

    pub fn color(self, name: ParamName, value: [f32; 4]) -> Self {
        self.param(name, ParamValue::Color(value))
    }

    pub fn param(mut self, name: ParamName, value: ParamValue) -> Self {
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    fn set_texture(&mut self, slot: TextureSlot, texture: TextureRef) {
        match self.textures.iter_mut().find(|(s, _)| *s == slot) {
            Some(entry) => entry.1 = texture,
            None => self.textures.push((slot, texture)),
        }
    }

    /// `self` with every binding of `other` layered on top.
    fn merged(&self, other: Bindings) -> Bindings {
        let mut merged = self.clone();
        for (slot, texture) in other.textures {
            merged.set_texture(slot, texture);
        }
        for (name, value) in other.params {
            merged = merged.param(name, value);
        }
        merged
    }

    pub fn get_texture(&self, slot: TextureSlot) -> Option<TextureRef> {
        self.textures
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, t)| *t)
    }

    pub fn get_param(&self, name: ParamName) -> Option<ParamValue> {
        self.params.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn textures(&self) -> &[(TextureSlot, TextureRef)] {
        &self.textures
    }

    pub fn params(&self) -> &[(ParamName, ParamValue)] {
        &self.params
    }
}

/// A pass of a specific program: its index in the program and a debug label.
pub trait PassKind: Copy {
    fn index(self) -> u32;
    fn label(self) -> &'static str;
}

/// One full-screen draw.
#[derive(Clone, Debug, PartialEq)]
pub struct PassDescriptor {
    program: ProgramHandle,
    pass_index: u32,
    label: &'static str,
    target: TextureRef,
    bindings: Bindings,
}

impl PassDescriptor {
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn pass_index(&self) -> u32 {
        self.pass_index
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Texture this pass writes.
    pub fn target(&self) -> TextureRef {
        self.target
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<TextureRef> {
        self.bindings.get_texture(slot)
    }

    pub fn param(&self, name: ParamName) -> Option<ParamValue> {
        self.bindings.get_param(name)
    }

    /// Scalar parameter, `None` if unbound or not a float.
    pub fn float(&self, name: ParamName) -> Option<f32> {
        match self.param(name) {
            Some(ParamValue::Float(v)) => Some(v),
            _ => None,
        }
    }

    /// Whether this is pass `kind`.
    pub fn is<P: PassKind>(&self, kind: P) -> bool {
        self.pass_index == kind.index() && self.label == kind.label()
    }
}

/// Ordered passes for one effect, one camera, one frame.
///
/// Every descriptor starts from the list's shared bindings (the per-frame
/// parameters) with the pass's own bindings layered on top.
#[derive(Clone, Debug, PartialEq)]
pub struct PassList {
    program: ProgramHandle,
    shared: Bindings,
    passes: Vec<PassDescriptor>,
}

impl PassList {
    pub fn new(program: ProgramHandle, shared: Bindings) -> Self {
        Self {
            program,
            shared,
            passes: Vec::new(),
        }
    }

    /// Append a draw of `pass` into `target`.
    pub fn draw<P: PassKind>(
        &mut self,
        pass: P,
        target: impl Into<TextureRef>,
        bindings: Bindings,
    ) {
        self.passes.push(PassDescriptor {
            program: self.program,
            pass_index: pass.index(),
            label: pass.label(),
            target: target.into(),
            bindings: self.shared.merged(bindings),
        });
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn passes(&self) -> &[PassDescriptor] {
        &self.passes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PassDescriptor> {
        self.passes.iter()
    }

    /// Number of passes of kind `kind`.
    pub fn count<P: PassKind>(&self, kind: P) -> usize {
        self.passes.iter().filter(|p| p.is(kind)).count()
    }

    /// Labels in issue order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.passes.iter().map(PassDescriptor::label).collect()
    }
}

impl IntoIterator for PassList {
    type Item = PassDescriptor;
    type IntoIter = std::vec::IntoIter<PassDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.passes.into_iter()
    }
}

/// Receiver of finished pass lists, typically the host's command encoder.
pub trait PassSink {
    fn submit(&mut self, passes: PassList);
}

/// Sink that records every submitted list.
#[derive(Debug, Default)]
pub struct CommandList {
    lists: Vec<PassList>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submitted lists in order.
    pub fn lists(&self) -> &[PassList] {
        &self.lists
    }

    /// Most recently submitted list.
    pub fn last(&self) -> Option<&PassList> {
        self.lists.last()
    }

    pub fn total_passes(&self) -> usize {
        self.lists.iter().map(PassList::len).sum()
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.lists.clear();
    }
}

impl PassSink for CommandList {
    fn submit(&mut self, passes: PassList) {
        self.lists.push(passes);
    }
}
