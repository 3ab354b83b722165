// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vellum PDF: the content-stream engine of a PDF page.
//!
//! A [`PdfDevice`] receives draw calls described with the `vellum_imaging`
//! vocabulary and turns them into the operators of one page content stream,
//! plus the resources that stream names.
//!
//! ## How content is assembled
//!
//! - **Entries**: every draw lands in a [`ContentEntry`] tagged with a
//!   [`GraphicsStateSnapshot`] (transform, clip, colour or pattern, graphics
//!   state, text state). Consecutive draws with an equal snapshot share one
//!   entry, so state operators are written once per run rather than per draw.
//! - **Clips**: a PDF clip can only be undone with `Q`. When the stream is
//!   written, an emulated graphics-state stack works out the `q`/`Q`/`cm`/`W n`
//!   operators each entry needs and keeps nesting bounded.
//! - **Compose modes**: PDF only paints source-over. Modes that read or
//!   replace the destination are drawn in isolation and composited back
//!   through soft masks built from nested form XObjects, or erase existing
//!   content first. Modes with no equivalent are drawn source-over and
//!   reported as a [`QualityLoss`].
//! - **Resources**: graphics states, XObjects, fonts and shading patterns are
//!   interned into [`ResourceTables`] so identical descriptions share one
//!   index.
//! - **Drawing areas**: the primary content and an overlay are recorded
//!   independently; the overlay is written last.
//!
//! ## Example
//!
//! ```rust
//! use kurbo::{Rect, Size};
//! use peniko::{Color, Compose};
//! use vellum_imaging::{CanvasStack, Paint, Primitive};
//! use vellum_pdf::{DeviceConfig, PdfDevice, ResourceKind};
//!
//! let config = DeviceConfig::new(Size::new(200.0, 200.0));
//! let mut device = PdfDevice::new(config).unwrap();
//! let mut canvas = CanvasStack::new(device.content_area());
//!
//! let red = Paint::solid(Color::from_rgba8(255, 0, 0, 255));
//! device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 100.0, 100.0)), &red);
//!
//! // Source-out over existing content needs isolation forms.
//! canvas.clip_rect(Rect::new(50.0, 50.0, 150.0, 150.0));
//! let blue = Paint::solid(Color::from_rgba8(0, 0, 255, 255)).with_blend(Compose::SrcOut);
//! device.draw(&canvas, &Primitive::Rect(Rect::new(60.0, 60.0, 140.0, 140.0)), &blue);
//!
//! let page = device.finish();
//! assert!(page.warnings.is_empty());
//! assert_eq!(page.resources.xobjects.len(), 3);
//! assert_eq!(page.resources.xobjects.kind(), ResourceKind::XObject);
//! ```
//!
//! ## Collaborators
//!
//! The device asks a [`FontResolver`] which font resource shows a glyph and
//! an [`OperatorEmitter`] for the path operators of each geometry kind. The
//! defaults cover a single multi-byte font per typeface and plain PDF paths.
//!
//! ## Logging
//!
//! Degraded draws are logged at `warn`, skipped draws at `debug` and entry
//! bookkeeping at `trace`, through the [`log`] facade.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. The default `std` feature is
//! forwarded to `kurbo`, `peniko`, `log` and `thiserror`; enable `libm` for
//! floating-point support without `std`.

#![no_std]

extern crate alloc;

mod config;
mod device;
mod emit;
mod entry;
mod error;
mod font;
mod glyphs;
mod graphic_state;
mod ops;
mod resources;
mod router;
mod serialize;
mod shader;
mod snapshot;
mod stack;
mod xobject;

pub use config::{DEFAULT_MAX_STACK_DEPTH, DEFAULT_PAGE_SIZE, DeviceConfig};
pub use device::{DrawingArea, PageContent, PdfDevice, ScopedContentEntry};
pub use emit::{OperatorEmitter, PdfOperatorEmitter};
pub use entry::{ContentChain, ContentEntry, EntryBounds, EntryHandle, Placement};
pub use error::{ContentError, DrawOutcome, QualityLoss, SkipReason};
pub use font::{DefaultFontResolver, FontDescriptor, FontResolver, FontResource};
pub use glyphs::GlyphUsage;
pub use graphic_state::{GraphicStateDesc, PdfBlendMode, Scalar, SoftMask};
pub use resources::{
    ResourceIndex, ResourceKind, ResourceRef, ResourceScope, ResourceTable, ResourceTables,
};
pub use shader::{ShaderDesc, ShadingGeometry};
pub use snapshot::{EntryDecision, GraphicsStateSnapshot, TextRenderMode, TextState, compare};
pub use xobject::{FormXObject, ImageXObject, XObject};
