// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device configuration.

use kurbo::{Affine, Rect, Size};

use crate::ContentError;

/// Maximum depth of the emulated `q`/`Q` stack unless configured otherwise.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 12;

/// US Letter in points.
pub const DEFAULT_PAGE_SIZE: Size = Size::new(612.0, 792.0);

/// Page geometry and engine limits for one [`PdfDevice`](crate::PdfDevice).
///
/// ```rust
/// use kurbo::Size;
/// use vellum_pdf::DeviceConfig;
///
/// let config = DeviceConfig::new(Size::new(595.0, 842.0))
///     .with_content_size(Size::new(500.0, 700.0))
///     .with_xobject_capacity(64);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    /// Size of the page (the media box) in points.
    pub page_size: Size,
    /// Size of the drawable content area in device units.
    pub content_size: Size,
    /// Transform from device space to page space, applied before the origin
    /// flip.
    pub initial_transform: Affine,
    /// Flip the y-down device space into PDF's y-up page space.
    pub flip_origin: bool,
    /// Maximum depth of the emulated graphics-state stack.
    pub max_stack_depth: usize,
    /// Capacity of the XObject table, if limited.
    pub xobject_capacity: Option<usize>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl DeviceConfig {
    /// A configuration whose content area fills the page.
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            content_size: page_size,
            initial_transform: Affine::IDENTITY,
            flip_origin: true,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            xobject_capacity: None,
        }
    }

    /// Set the content area size.
    #[must_use]
    pub fn with_content_size(mut self, size: Size) -> Self {
        self.content_size = size;
        self
    }

    /// Set the device-to-page transform.
    #[must_use]
    pub fn with_initial_transform(mut self, transform: Affine) -> Self {
        self.initial_transform = transform;
        self
    }

    /// Enable or disable the origin flip.
    #[must_use]
    pub fn with_flip_origin(mut self, flip: bool) -> Self {
        self.flip_origin = flip;
        self
    }

    /// Set the emulated stack depth limit.
    #[must_use]
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Limit the number of XObjects (nested forms and images).
    #[must_use]
    pub fn with_xobject_capacity(mut self, capacity: usize) -> Self {
        self.xobject_capacity = Some(capacity);
        self
    }

    /// The content area in device space.
    pub fn content_area(&self) -> Rect {
        Rect::from_origin_size((0.0, 0.0), self.content_size)
    }

    /// The transform the page content stream starts with.
    pub fn page_transform(&self) -> Affine {
        let flip = if self.flip_origin {
            Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, self.page_size.height])
        } else {
            Affine::IDENTITY
        };
        flip * self.initial_transform
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), ContentError> {
        let positive = |s: Size| {
            s.width.is_finite() && s.height.is_finite() && s.width > 0.0 && s.height > 0.0
        };
        if !positive(self.page_size) {
            return Err(ContentError::InvalidConfig("page size must be finite and positive"));
        }
        if !positive(self.content_size) {
            return Err(ContentError::InvalidConfig("content size must be finite and positive"));
        }
        let det = self.initial_transform.determinant();
        if !det.is_finite() || det == 0.0 {
            return Err(ContentError::InvalidConfig("initial transform must be invertible"));
        }
        // One level for the clip, one for the transform.
        if self.max_stack_depth < 2 {
            return Err(ContentError::InvalidConfig("stack depth must be at least 2"));
        }
        Ok(())
    }
}
