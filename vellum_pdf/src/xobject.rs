// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Nested forms and image placements.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Write as _;
use core::hash::{Hash, Hasher};

use kurbo::Rect;
use vellum_imaging::ImageId;

use crate::ops::Num;
use crate::resources::ResourceScope;

/// A self-contained content stream drawn with `Do`.
#[derive(Clone, Debug)]
pub struct FormXObject {
    /// Content stream of the form.
    pub content: Vec<u8>,
    /// Page resources the content may name.
    pub resources: ResourceScope,
    /// Form bounding box in device space.
    pub bbox: Rect,
    /// Whether the form is an isolated transparency group.
    pub transparency_group: bool,
}

impl PartialEq for FormXObject {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
            && self.resources == other.resources
            && self.transparency_group == other.transparency_group
            && rect_bits(self.bbox) == rect_bits(other.bbox)
    }
}

impl Eq for FormXObject {}

impl Hash for FormXObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.content.hash(state);
        self.resources.hash(state);
        self.transparency_group.hash(state);
        rect_bits(self.bbox).hash(state);
    }
}

fn rect_bits(rect: Rect) -> [u64; 4] {
    [rect.x0, rect.y0, rect.x1, rect.y1].map(f64::to_bits)
}

impl FormXObject {
    /// Write the form's stream dictionary, without `/Length` or
    /// `/Resources`, which the document writer adds.
    pub fn write_dict(&self, out: &mut String) {
        let b = self.bbox;
        let _ = write!(
            out,
            "<< /Type /XObject /Subtype /Form /BBox [{} {} {} {}]",
            Num(b.x0),
            Num(b.y0),
            Num(b.x1),
            Num(b.y1)
        );
        if self.transparency_group {
            out.push_str(" /Group << /S /Transparency /CS /DeviceRGB /I true /K false >>");
        }
        out.push_str(" >>");
    }
}

/// An image placed by the host; pixels live with the document writer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ImageXObject {
    /// Host image.
    pub image: ImageId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Anything drawn with `Do`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum XObject {
    /// A nested form.
    Form(Arc<FormXObject>),
    /// An image.
    Image(ImageXObject),
}

impl XObject {
    /// The nested form, if this is one.
    pub fn as_form(&self) -> Option<&FormXObject> {
        match self {
            Self::Form(form) => Some(form),
            Self::Image(_) => None,
        }
    }
}
