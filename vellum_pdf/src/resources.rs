// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deduplicating resource tables.
//!
//! Content streams name their resources (`/G0 gs`, `/X3 Do`, `/F1 12 Tf`,
//! `/P0 scn`) by kind and dense index. A [`ResourceTable`] interns values by
//! structural equality and hands out those indices; [`ResourceTables`] holds
//! one table per kind and writes the page's resource dictionary once the
//! document writer has assigned object numbers.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{self, Write as _};
use core::hash::{BuildHasher, Hash};

use hashbrown::{DefaultHashBuilder, HashMap};

use crate::ContentError;
use crate::font::FontResource;
use crate::graphic_state::{GraphicStateDesc, SoftMask};
use crate::ops::push;
use crate::shader::ShaderDesc;
use crate::xobject::{FormXObject, XObject};

/// Dense, zero-based index into one [`ResourceTable`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct ResourceIndex(u32);

impl ResourceIndex {
    /// Wrap a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns this index as a `usize`.
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw numeric index.
    #[inline]
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// The four kinds of page resources.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ResourceKind {
    /// `ExtGState` dictionaries.
    GraphicState,
    /// Nested forms and images.
    XObject,
    /// Font resources.
    Font,
    /// Shading patterns.
    Shader,
}

impl ResourceKind {
    /// All kinds in resource-dictionary order.
    pub const ALL: [Self; 4] = [Self::GraphicState, Self::XObject, Self::Font, Self::Shader];

    /// Prefix of resource names of this kind.
    pub fn prefix(self) -> char {
        match self {
            Self::GraphicState => 'G',
            Self::XObject => 'X',
            Self::Font => 'F',
            Self::Shader => 'P',
        }
    }

    fn from_prefix(byte: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.prefix() == char::from(byte))
    }

    /// Key of this kind's sub-dictionary in a resource dictionary.
    pub fn dict_key(self) -> &'static str {
        match self {
            Self::GraphicState => "ExtGState",
            Self::XObject => "XObject",
            Self::Font => "Font",
            Self::Shader => "Pattern",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dict_key())
    }
}

/// A reference to one interned resource.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResourceRef {
    /// Table the resource lives in.
    pub kind: ResourceKind,
    /// Index inside that table.
    pub index: ResourceIndex,
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.index.0)
    }
}

/// Interns resource values of one kind.
///
/// Values are stored once. Lookups use a hash-bucket index (hash -> small
/// list of candidate indices) so no second copy of a value is kept. Indices
/// are never reused or reassigned until [`clear`](Self::clear).
#[derive(Debug, Clone)]
pub struct ResourceTable<T> {
    kind: ResourceKind,
    limit: Option<usize>,
    values: Vec<T>,
    buckets: HashMap<u64, Vec<ResourceIndex>>,
    build_hasher: DefaultHashBuilder,
}

impl<T> ResourceTable<T>
where
    T: Eq + Hash,
{
    /// Creates an empty, unbounded table.
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            limit: None,
            values: Vec::new(),
            buckets: HashMap::new(),
            build_hasher: DefaultHashBuilder::default(),
        }
    }

    /// Creates an empty table holding at most `limit` values.
    #[must_use]
    pub fn with_limit(kind: ResourceKind, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(kind)
        }
    }

    /// Kind of the resources in this table.
    #[inline]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Configured capacity, if any.
    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Number of interned values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns `true` if `additional` new values fit under the capacity.
    pub fn has_room(&self, additional: usize) -> bool {
        self.limit
            .is_none_or(|limit| self.values.len() + additional <= limit)
    }

    /// The value behind `index`, if in range.
    #[must_use]
    pub fn get(&self, index: ResourceIndex) -> Option<&T> {
        self.values.get(index.as_usize())
    }

    /// Index of a structurally equal value, if one was interned.
    pub fn find(&self, value: &T) -> Option<ResourceIndex> {
        let hash = self.build_hasher.hash_one(value);
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|&index| self.values[index.as_usize()] == *value)
    }

    /// Interns `value` and returns its index.
    ///
    /// If an equal value was already interned this returns the existing index
    /// and drops `value`. The capacity is not consulted; tables with a
    /// capacity are filled through [`try_intern`](Self::try_intern).
    pub fn intern(&mut self, value: T) -> ResourceIndex {
        let hash = self.build_hasher.hash_one(&value);
        if let Some(indices) = self.buckets.get(&hash) {
            for &index in indices {
                if self.values[index.as_usize()] == value {
                    return index;
                }
            }
        }

        let index = ResourceIndex(
            u32::try_from(self.values.len()).expect("too many resources for ResourceIndex (u32)"),
        );
        self.values.push(value);
        self.buckets.entry(hash).or_default().push(index);
        index
    }

    /// Interns `value`, failing if it is new and the table is full.
    pub fn try_intern(&mut self, value: T) -> Result<ResourceIndex, ContentError> {
        if let Some(index) = self.find(&value) {
            return Ok(index);
        }
        match self.limit {
            Some(limit) if self.values.len() >= limit => Err(ContentError::ResourceExhausted {
                kind: self.kind,
                limit,
            }),
            _ => Ok(self.intern(value)),
        }
    }

    /// Values with their indices, in index order.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "intern keeps the length within u32"
    )]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (ResourceIndex, &T)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, value)| (ResourceIndex(i as u32), value))
    }

    /// Drops every value. Previously returned indices become invalid.
    pub fn clear(&mut self) {
        self.values.clear();
        self.buckets.clear();
    }
}

/// The prefix of every table that existed at some point.
///
/// Indices only grow, so a scope taken when a nested form is built still
/// names valid resources when the page is finished.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ResourceScope {
    /// Number of graphics states in scope.
    pub graphic_states: u32,
    /// Number of XObjects in scope.
    pub xobjects: u32,
    /// Number of fonts in scope.
    pub fonts: u32,
    /// Number of shaders in scope.
    pub shaders: u32,
}

impl ResourceScope {
    /// Number of resources of `kind` in scope.
    pub fn count(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::GraphicState => self.graphic_states,
            ResourceKind::XObject => self.xobjects,
            ResourceKind::Font => self.fonts,
            ResourceKind::Shader => self.shaders,
        }
    }

    /// References to every resource in scope, in resource-dictionary order.
    pub fn refs(&self) -> impl Iterator<Item = ResourceRef> + '_ {
        ResourceKind::ALL.into_iter().flat_map(move |kind| {
            (0..self.count(kind)).map(move |i| ResourceRef {
                kind,
                index: ResourceIndex(i),
            })
        })
    }
}

/// Where the resources of one set of tables landed in another.
#[derive(Clone, Debug, Default)]
pub(crate) struct ResourceRemap {
    graphic_states: Vec<ResourceIndex>,
    xobjects: Vec<ResourceIndex>,
    fonts: Vec<ResourceIndex>,
    shaders: Vec<ResourceIndex>,
}

impl ResourceRemap {
    fn table(&self, kind: ResourceKind) -> &[ResourceIndex] {
        match kind {
            ResourceKind::GraphicState => &self.graphic_states,
            ResourceKind::XObject => &self.xobjects,
            ResourceKind::Font => &self.fonts,
            ResourceKind::Shader => &self.shaders,
        }
    }

    /// New index of `index`, if it was moved.
    pub(crate) fn get(&self, kind: ResourceKind, index: ResourceIndex) -> Option<ResourceIndex> {
        self.table(kind).get(index.as_usize()).copied()
    }

    /// Copy `content`, renaming every resource name that was moved.
    ///
    /// Resource names are `/` followed by a kind prefix and a decimal index,
    /// ending at whitespace or a delimiter. Other names pass through.
    pub(crate) fn rewrite(&self, content: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(content.len());
        let mut rest = content;
        while let Some(slash) = rest.iter().position(|&b| b == b'/') {
            out.extend_from_slice(&rest[..=slash]);
            rest = &rest[slash + 1..];
            let Some((&prefix, tail)) = rest.split_first() else {
                break;
            };
            let Some(kind) = ResourceKind::from_prefix(prefix) else {
                continue;
            };
            let digits = tail.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 || tail.get(digits).is_some_and(|&b| !ends_name(b)) {
                continue;
            }
            let moved = core::str::from_utf8(&tail[..digits])
                .ok()
                .and_then(|number| number.parse::<u32>().ok())
                .and_then(|index| self.get(kind, ResourceIndex(index)));
            if let Some(index) = moved {
                push(&mut out, format_args!("{}", ResourceRef { kind, index }));
                rest = &tail[digits..];
            }
        }
        out.extend_from_slice(rest);
        out
    }
}

fn ends_name(byte: u8) -> bool {
    byte.is_ascii_whitespace() || b"()<>[]{}/%".contains(&byte)
}

/// One table per resource kind.
#[derive(Debug, Clone)]
pub struct ResourceTables {
    /// `ExtGState` dictionaries.
    pub graphic_states: ResourceTable<GraphicStateDesc>,
    /// Nested forms and images.
    pub xobjects: ResourceTable<XObject>,
    /// Font resources.
    pub fonts: ResourceTable<FontResource>,
    /// Shading patterns.
    pub shaders: ResourceTable<ShaderDesc>,
}

impl Default for ResourceTables {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ResourceTables {
    /// Empty tables; the XObject table is capped at `xobject_limit`.
    pub fn new(xobject_limit: Option<usize>) -> Self {
        Self {
            graphic_states: ResourceTable::new(ResourceKind::GraphicState),
            xobjects: match xobject_limit {
                Some(limit) => ResourceTable::with_limit(ResourceKind::XObject, limit),
                None => ResourceTable::new(ResourceKind::XObject),
            },
            fonts: ResourceTable::new(ResourceKind::Font),
            shaders: ResourceTable::new(ResourceKind::Shader),
        }
    }

    /// Everything interned so far.
    pub fn scope(&self) -> ResourceScope {
        let count = |len: usize| u32::try_from(len).unwrap_or(u32::MAX);
        ResourceScope {
            graphic_states: count(self.graphic_states.len()),
            xobjects: count(self.xobjects.len()),
            fonts: count(self.fonts.len()),
            shaders: count(self.shaders.len()),
        }
    }

    /// References to every resource: graphics states, XObjects, fonts, then
    /// shaders, each in index order.
    pub fn iter(&self) -> impl Iterator<Item = ResourceRef> {
        self.scope().refs().collect::<Vec<_>>().into_iter()
    }

    /// Returns `true` if no table holds anything.
    pub fn is_empty(&self) -> bool {
        self.graphic_states.is_empty()
            && self.xobjects.is_empty()
            && self.fonts.is_empty()
            && self.shaders.is_empty()
    }

    /// Empty every table.
    pub fn clear(&mut self) {
        self.graphic_states.clear();
        self.xobjects.clear();
        self.fonts.clear();
        self.shaders.clear();
    }

    /// Intern every resource of `other`, returning where each one landed.
    ///
    /// Nested forms are rewritten to name the new indices and take this
    /// device's scope. Fails if the XObject table fills up; resources
    /// interned before the failure stay.
    pub(crate) fn absorb(&mut self, other: &Self) -> Result<ResourceRemap, ContentError> {
        let mut remap = ResourceRemap::default();
        for (_, shader) in other.shaders.iter() {
            remap.shaders.push(self.shaders.intern(shader.clone()));
        }
        for (_, font) in other.fonts.iter() {
            remap.fonts.push(self.fonts.intern(*font));
        }

        // Soft masks name earlier XObjects and forms name earlier graphics
        // states, so alternate between the two tables in index order.
        let states = &other.graphic_states.values;
        let xobjects = &other.xobjects.values;
        loop {
            let mut progressed = false;
            while let Some(state) = states.get(remap.graphic_states.len()) {
                let soft_mask = match state.soft_mask {
                    SoftMask::Alpha { group, invert } => {
                        match remap.get(ResourceKind::XObject, group) {
                            Some(group) => SoftMask::Alpha { group, invert },
                            None => break,
                        }
                    }
                    mask => mask,
                };
                let state = GraphicStateDesc {
                    soft_mask,
                    ..state.clone()
                };
                remap.graphic_states.push(self.graphic_states.intern(state));
                progressed = true;
            }
            while let Some(xobject) = xobjects.get(remap.xobjects.len()) {
                let xobject = match xobject {
                    XObject::Form(form) => {
                        if form.resources.graphic_states as usize > remap.graphic_states.len() {
                            break;
                        }
                        XObject::Form(Arc::new(FormXObject {
                            content: remap.rewrite(&form.content),
                            resources: self.scope(),
                            ..(**form).clone()
                        }))
                    }
                    XObject::Image(image) => XObject::Image(*image),
                };
                remap.xobjects.push(self.xobjects.try_intern(xobject)?);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        Ok(remap)
    }

    /// Write a resource dictionary for `scope`.
    ///
    /// `object_for` maps each resource to the object number the document
    /// writer gave it.
    pub fn write_resource_dict(
        &self,
        scope: ResourceScope,
        out: &mut String,
        mut object_for: impl FnMut(ResourceRef) -> u32,
    ) {
        out.push_str("<< /ProcSet [/PDF /Text /ImageB /ImageC /ImageI]");
        for kind in ResourceKind::ALL {
            let count = scope.count(kind);
            if count == 0 {
                continue;
            }
            let _ = write!(out, " /{} <<", kind.dict_key());
            for i in 0..count {
                let resource = ResourceRef {
                    kind,
                    index: ResourceIndex(i),
                };
                let _ = write!(out, " /{resource} {} 0 R", object_for(resource));
            }
            out.push_str(" >>");
        }
        out.push_str(" >>");
    }
}
