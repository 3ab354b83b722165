// Copyright 2025 the Vellum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The PDF device: one page's drawing session.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Rect};
use log::{debug, warn};
use peniko::{Color, Compose, Fill};
use vellum_imaging::{
    CanvasState, ClipShape, ClipState, DrawContext, GlyphRun, Paint, PaintStyle, Primitive,
};

use crate::config::DeviceConfig;
use crate::emit::{OperatorEmitter, PdfOperatorEmitter};
use crate::entry::{ContentChain, ContentEntry, EntryHandle, Placement};
use crate::error::{ContentError, DrawOutcome, QualityLoss, SkipReason};
use crate::font::{DefaultFontResolver, FontResolver, FontResource};
use crate::glyphs::GlyphUsage;
use crate::graphic_state::{GraphicStateDesc, Scalar, alpha_to_u8};
use crate::ops::{self, Num, push};
use crate::resources::{ResourceIndex, ResourceKind, ResourceRef, ResourceScope, ResourceTables};
use crate::router::{Route, route};
use crate::serialize::write_entries;
use crate::shader::ShaderDesc;
use crate::snapshot::{GraphicsStateSnapshot, TextState};
use crate::stack::GraphicStackState;
use crate::xobject::{FormXObject, ImageXObject, XObject};

/// One of the two independent output targets of a page.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum DrawingArea {
    /// The page content proper.
    #[default]
    Content,
    /// Content drawn over everything else, such as margin decorations.
    ///
    /// Overlay content is always written after the primary content.
    Overlay,
}

/// Everything a document writer needs from a finished page.
#[derive(Clone, Debug)]
pub struct PageContent {
    /// The page content stream.
    pub content: Vec<u8>,
    /// Resources the content stream names.
    pub resources: ResourceTables,
    /// Glyphs shown per font, for subsetting.
    pub glyph_usage: GlyphUsage,
    /// Page media box.
    pub media_box: Rect,
    /// Draws recorded with reduced fidelity.
    pub warnings: Vec<QualityLoss>,
}

#[derive(Clone, Debug)]
enum Pending {
    Nothing,
    Isolation {
        compose: Compose,
        destination: Option<ResourceIndex>,
        clip: ClipState,
    },
}

/// The open content entry of one draw call.
///
/// Obtained from [`PdfDevice::begin_entry`]. Operators appended through it go
/// to the entry chosen for the draw's state. Dropping it finishes the draw:
/// the entry is closed and, for compose modes drawn in isolation, the result
/// is composited with the previous content.
#[derive(Debug)]
pub struct ScopedContentEntry<'a> {
    device: &'a mut PdfDevice,
    handle: EntryHandle,
    pending: Pending,
}

impl ScopedContentEntry<'_> {
    /// Append operators of unknown extent.
    pub fn append(&mut self, bytes: &[u8]) {
        self.device.active_chain_mut().append(self.handle, bytes);
    }

    /// Append operators lying within `bounds` (device space).
    pub fn append_bounded(&mut self, bytes: &[u8], bounds: Rect) {
        self.device
            .active_chain_mut()
            .append_bounded(self.handle, bytes, bounds);
    }

    fn current_font(&mut self) -> Option<(ResourceIndex, Scalar)> {
        self.device.active_chain_mut().font(self.handle)
    }

    fn set_font(&mut self, font: (ResourceIndex, Scalar)) {
        self.device.active_chain_mut().set_font(self.handle, font);
    }

    /// Give up on the draw before anything was appended.
    ///
    /// A destination moved aside for isolation is put back.
    fn abandon(&mut self) {
        if let Pending::Isolation {
            destination: Some(destination),
            ..
        } = core::mem::replace(&mut self.pending, Pending::Nothing)
        {
            self.device.prepend_form(destination);
        }
    }
}

impl Drop for ScopedContentEntry<'_> {
    fn drop(&mut self) {
        self.device.active_chain_mut().close();
        if let Pending::Isolation {
            compose,
            destination,
            clip,
        } = core::mem::replace(&mut self.pending, Pending::Nothing)
        {
            self.device.finish_isolation(compose, destination, &clip);
        }
    }
}

enum Opened<'a> {
    Entry(ScopedContentEntry<'a>),
    Done(DrawOutcome),
}

fn skip<'a>(reason: SkipReason) -> Opened<'a> {
    Opened::Done(DrawOutcome::Skipped(reason))
}

/// Rectangles share no interior.
fn disjoint(a: Rect, b: Rect) -> bool {
    a.x1 <= b.x0 || a.x0 >= b.x1 || a.y1 <= b.y0 || a.y0 >= b.y1
}

/// Turns draw calls into a PDF content stream and its resources.
///
/// ```rust
/// use kurbo::Rect;
/// use peniko::Color;
/// use vellum_imaging::{CanvasStack, Paint, Primitive};
/// use vellum_pdf::{DeviceConfig, PdfDevice};
///
/// let mut device = PdfDevice::new(DeviceConfig::default()).unwrap();
/// let canvas = CanvasStack::new(device.content_area());
/// let red = Paint::solid(Color::from_rgba8(255, 0, 0, 255));
/// let rect = Primitive::Rect(Rect::new(10.0, 10.0, 50.0, 30.0));
/// assert!(device.draw(&canvas, &rect, &red).is_recorded());
///
/// let page = device.finish();
/// assert_eq!(
///     page.content,
///     b"1 0 0 -1 0 792 cm\n1 0 0 rg\n1 0 0 RG\n/G0 gs\n10 10 40 20 re\nf\n"
/// );
/// ```
pub struct PdfDevice {
    config: DeviceConfig,
    content_area: Rect,
    primary: ContentChain,
    overlay: ContentChain,
    area: DrawingArea,
    resources: ResourceTables,
    glyphs: GlyphUsage,
    warnings: Vec<QualityLoss>,
    fonts: Box<dyn FontResolver + Send>,
    emitter: Box<dyn OperatorEmitter + Send>,
}

impl fmt::Debug for PdfDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDevice")
            .field("config", &self.config)
            .field("area", &self.area)
            .field("primary", &self.primary.entries().len())
            .field("overlay", &self.overlay.entries().len())
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

impl PdfDevice {
    /// A device with the default font resolver and operator emitter.
    pub fn new(config: DeviceConfig) -> Result<Self, ContentError> {
        Self::with_collaborators(
            config,
            Box::new(DefaultFontResolver),
            Box::new(PdfOperatorEmitter),
        )
    }

    /// A device with the given font resolver and operator emitter.
    pub fn with_collaborators(
        config: DeviceConfig,
        fonts: Box<dyn FontResolver + Send>,
        emitter: Box<dyn OperatorEmitter + Send>,
    ) -> Result<Self, ContentError> {
        config.validate()?;
        Ok(Self {
            content_area: config.content_area(),
            resources: ResourceTables::new(config.xobject_capacity),
            config,
            primary: ContentChain::new(),
            overlay: ContentChain::new(),
            area: DrawingArea::Content,
            glyphs: GlyphUsage::new(),
            warnings: Vec::new(),
            fonts,
            emitter,
        })
    }

    /// The configuration the device was built with.
    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// The drawable area in device space.
    #[inline]
    pub fn content_area(&self) -> Rect {
        self.content_area
    }

    /// The page media box.
    pub fn media_box(&self) -> Rect {
        Rect::from_origin_size((0.0, 0.0), self.config.page_size)
    }

    /// The area draws currently go to.
    #[inline]
    pub fn drawing_area(&self) -> DrawingArea {
        self.area
    }

    /// Direct subsequent draws to `area`.
    ///
    /// Entries never span a switch: both chains are sealed, so the next draw
    /// opens a new entry whichever area it lands in.
    pub fn switch_drawing_area(&mut self, area: DrawingArea) {
        self.primary.seal();
        self.overlay.seal();
        self.area = area;
    }

    /// Entries of `area`, in chain order.
    pub fn entries(&self, area: DrawingArea) -> &[ContentEntry] {
        self.chain(area).entries()
    }

    fn chain(&self, area: DrawingArea) -> &ContentChain {
        match area {
            DrawingArea::Content => &self.primary,
            DrawingArea::Overlay => &self.overlay,
        }
    }

    fn active_chain(&self) -> &ContentChain {
        self.chain(self.area)
    }

    fn active_chain_mut(&mut self) -> &mut ContentChain {
        match self.area {
            DrawingArea::Content => &mut self.primary,
            DrawingArea::Overlay => &mut self.overlay,
        }
    }

    /// Returns `true` if the active area has drawn nothing.
    pub fn is_empty(&self) -> bool {
        self.active_chain().is_empty()
    }

    /// Discard both areas and every resource.
    ///
    /// Glyph usage and warnings are kept.
    pub fn clear(&mut self) {
        self.primary.clear();
        self.overlay.clear();
        self.resources.clear();
    }

    /// Discard everything, then paint the content area with `color`.
    pub fn clear_to(&mut self, color: Color) -> DrawOutcome {
        self.clear();
        let canvas = DrawContext::new(self.content_area);
        self.draw(&canvas, &Primitive::Paint, &Paint::solid(color))
    }

    /// The resource tables.
    #[inline]
    pub fn resources(&self) -> &ResourceTables {
        &self.resources
    }

    /// Every interned resource: graphics states, XObjects, fonts, shaders.
    pub fn get_resources(&self) -> Vec<ResourceRef> {
        self.resources.iter().collect()
    }

    /// Draws recorded with reduced fidelity so far.
    #[inline]
    pub fn warnings(&self) -> &[QualityLoss] {
        &self.warnings
    }

    fn record_loss(&mut self, loss: QualityLoss) {
        warn!("{loss}");
        self.warnings.push(loss);
    }

    fn base_clip(&self) -> ClipState {
        ClipState::wide_open(self.content_area)
    }

    /// Drop entries of the active area that lie entirely outside `parent`.
    ///
    /// Hosts call this when a clip is popped, with the clip being restored.
    /// Returns the number of entries removed.
    pub fn invalidate_clip(&mut self, parent: &ClipState) -> usize {
        let bounds = parent.bounds();
        let removed = self
            .active_chain_mut()
            .prune(|entry| entry.bounds().lies_outside(bounds));
        if removed > 0 {
            debug!("clip invalidation removed {removed} entries");
        }
        removed
    }

    /// Open the entry a custom draw appends to.
    ///
    /// Returns `None` if the draw records nothing (empty clip, transparent
    /// source-over paint, or a compose mode that leaves nothing to draw).
    pub fn begin_entry(
        &mut self,
        canvas: &(impl CanvasState + ?Sized),
        paint: &Paint,
        has_text: bool,
    ) -> Option<ScopedContentEntry<'_>> {
        match self.open_entry(canvas.transform(), canvas.clip(), paint, has_text) {
            Opened::Entry(entry) => Some(entry),
            Opened::Done(outcome) => {
                if let DrawOutcome::Skipped(reason) = outcome {
                    debug!("entry not opened: {reason:?}");
                }
                None
            }
        }
    }

    fn precheck(&self, clip: &ClipState, paint: &Paint) -> Option<SkipReason> {
        if clip.is_empty() || disjoint(clip.bounds(), self.content_area) {
            Some(SkipReason::ClippedOut)
        } else if paint.blend.compose == Compose::SrcOver && alpha_to_u8(paint.alpha()) == 0 {
            Some(SkipReason::Transparent)
        } else {
            None
        }
    }

    /// Why `compose` leaves the active area as it is, if it does.
    fn discards(&self, compose: Compose) -> Option<SkipReason> {
        match route(compose, self.active_chain().is_empty()) {
            Route::Discard if compose == Compose::Dest => Some(SkipReason::NothingToDraw),
            Route::Discard => Some(SkipReason::EmptyDestination),
            _ => None,
        }
    }

    fn open_entry(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        paint: &Paint,
        has_text: bool,
    ) -> Opened<'_> {
        let compose = paint.blend.compose;
        if let Some(reason) = self
            .precheck(clip, paint)
            .or_else(|| self.discards(compose))
        {
            return skip(reason);
        }
        let destination_empty = self.active_chain().is_empty();
        let mut placement = Placement::Append;
        let mut pending = Pending::Nothing;
        let chosen = route(compose, destination_empty);
        match chosen {
            Route::Direct | Route::Discard => {}
            Route::Fallback(compose) => self.record_loss(QualityLoss::UnsupportedCompose(compose)),
            Route::Prepend => placement = Placement::Prepend,
            Route::Erase { draw_source } => {
                let erased = self.erase_clip(clip, compose, chosen.forms_needed(destination_empty));
                if !draw_source {
                    return if erased {
                        Opened::Done(DrawOutcome::Recorded)
                    } else {
                        skip(SkipReason::NothingToDraw)
                    };
                }
            }
            Route::Isolate(compose) => {
                if self
                    .resources
                    .xobjects
                    .has_room(chosen.forms_needed(destination_empty))
                {
                    let destination = if destination_empty {
                        Ok(None)
                    } else {
                        self.snapshot_active_area().map(Some)
                    };
                    match destination {
                        Ok(destination) => {
                            pending = Pending::Isolation {
                                compose,
                                destination,
                                clip: clip.clone(),
                            };
                        }
                        Err(err) => {
                            warn!("{err}");
                            self.record_loss(QualityLoss::IsolationDegraded(compose));
                        }
                    }
                } else {
                    self.record_loss(QualityLoss::IsolationDegraded(compose));
                }
            }
        }

        let snapshot = self.snapshot_for(transform, clip, paint, has_text);
        let handle = self
            .active_chain_mut()
            .begin_or_reuse_entry(snapshot, placement);
        Opened::Entry(ScopedContentEntry {
            device: self,
            handle,
            pending,
        })
    }

    fn snapshot_for(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        paint: &Paint,
        has_text: bool,
    ) -> GraphicsStateSnapshot {
        let mut color = paint.flat_color();
        let shader = match paint.pattern() {
            Some(pattern) => {
                let page = self.config.page_transform();
                match ShaderDesc::new(pattern, page * transform) {
                    Some(desc) => Some(self.resources.shaders.intern(desc)),
                    None => {
                        self.record_loss(QualityLoss::UnsupportedShader);
                        if let Some(stop) = pattern.stops.first() {
                            color = stop.color;
                        }
                        None
                    }
                }
            }
            None => None,
        };
        let rgba = color.to_rgba8();
        let graphic_state = self
            .resources
            .graphic_states
            .intern(GraphicStateDesc::from_paint(paint));
        GraphicsStateSnapshot {
            transform,
            clip: clip.clone(),
            color: [rgba.r, rgba.g, rgba.b],
            shader,
            graphic_state,
            text: has_text.then(|| TextState {
                scale_x: Scalar::new(paint.text.scale_x),
                render_mode: paint.style.into(),
            }),
        }
    }

    /// Move the active area's content into a nested form.
    ///
    /// The area is emptied only if the form could be interned.
    fn snapshot_active_area(&mut self) -> Result<ResourceIndex, ContentError> {
        let mut content = Vec::new();
        let mut stack = GraphicStackState::new(self.base_clip(), self.config.max_stack_depth);
        write_entries(self.active_chain().entries(), &mut stack, &mut content);
        let form = FormXObject {
            content,
            resources: self.resources.scope(),
            bbox: self.content_area,
            transparency_group: true,
        };
        let index = self
            .resources
            .xobjects
            .try_intern(XObject::Form(Arc::new(form)))?;
        self.active_chain_mut().clear();
        Ok(index)
    }

    /// Remove the clip area from the active area's content.
    ///
    /// Returns `true` if any content changed.
    fn erase_clip(&mut self, clip: &ClipState, compose: Compose, forms_needed: usize) -> bool {
        if self.active_chain().is_empty() {
            return false;
        }
        if clip.covers(self.content_area) {
            self.active_chain_mut().clear();
            return true;
        }
        let mut changed = false;
        if let Some(rect) = clip.as_exact_rect() {
            changed = self
                .active_chain_mut()
                .prune(|entry| entry.bounds().lies_within(rect))
                > 0;
            if self.active_chain().is_empty() {
                return changed;
            }
        }
        if !self.resources.xobjects.has_room(forms_needed) {
            self.record_loss(QualityLoss::EraseSkipped(compose));
            return changed;
        }
        let redrawn = self
            .snapshot_active_area()
            .and_then(|remaining| self.draw_form_with_clip(remaining, clip, true));
        match redrawn {
            Ok(()) => true,
            Err(err) => {
                warn!("{err}");
                self.record_loss(QualityLoss::EraseSkipped(compose));
                changed
            }
        }
    }

    /// Draw `form` masked by `clip`, or by everything outside `clip` if
    /// `invert`.
    fn draw_form_with_clip(
        &mut self,
        form: ResourceIndex,
        clip: &ClipState,
        invert: bool,
    ) -> Result<(), ContentError> {
        let mut content = Vec::new();
        for element in clip.elements() {
            match &element.shape {
                ClipShape::Rect(rect) => {
                    ops::append_rect(&mut content, *rect);
                    ops::append_clip(&mut content, Fill::NonZero);
                }
                ClipShape::Path { path, fill_rule } => {
                    ops::append_path(&mut content, path);
                    ops::append_clip(&mut content, *fill_rule);
                }
            }
        }
        ops::append_rect(&mut content, clip.bounds());
        ops::paint_path(&mut content, PaintStyle::Fill, Fill::NonZero);
        let mask = FormXObject {
            content,
            resources: ResourceScope::default(),
            bbox: self.content_area,
            transparency_group: true,
        };
        let mask = self
            .resources
            .xobjects
            .try_intern(XObject::Form(Arc::new(mask)))?;
        let bounds = if invert {
            self.content_area
        } else {
            clip.bounds()
        };
        let base = self.base_clip();
        self.composite(form, Some((mask, invert)), &base, bounds);
        Ok(())
    }

    /// Append a `Do` of `form`, optionally through the alpha of `mask`.
    fn composite(
        &mut self,
        form: ResourceIndex,
        mask: Option<(ResourceIndex, bool)>,
        clip: &ClipState,
        bounds: Rect,
    ) {
        let graphic_state = self
            .resources
            .graphic_states
            .intern(GraphicStateDesc::default());
        let mut bytes = Vec::new();
        match mask {
            Some((group, invert)) => {
                let masked = self
                    .resources
                    .graphic_states
                    .intern(GraphicStateDesc::soft_mask(group, invert));
                let unmasked = self
                    .resources
                    .graphic_states
                    .intern(GraphicStateDesc::no_soft_mask());
                ops::append_graphic_state(&mut bytes, masked);
                ops::append_xobject(&mut bytes, form);
                ops::append_graphic_state(&mut bytes, unmasked);
            }
            None => ops::append_xobject(&mut bytes, form),
        }
        let snapshot = GraphicsStateSnapshot {
            transform: Affine::IDENTITY,
            clip: clip.clone(),
            color: [0, 0, 0],
            shader: None,
            graphic_state,
            text: None,
        };
        let chain = self.active_chain_mut();
        let handle = chain.begin_or_reuse_entry(snapshot, Placement::Append);
        chain.append_bounded(handle, &bytes, bounds);
        chain.close();
    }

    /// Composite an isolated source with the destination it replaced.
    fn finish_isolation(
        &mut self,
        compose: Compose,
        destination: Option<ResourceIndex>,
        clip: &ClipState,
    ) {
        let source = if self.active_chain().is_empty() {
            self.active_chain_mut().clear();
            None
        } else {
            match self.snapshot_active_area() {
                Ok(source) => Some(source),
                Err(err) => {
                    // The source stays as drawn; put the destination back under it.
                    warn!("{err}");
                    self.record_loss(QualityLoss::IsolationDegraded(compose));
                    if let Some(destination) = destination {
                        self.prepend_form(destination);
                    }
                    return;
                }
            }
        };

        let base = self.base_clip();
        let content_area = self.content_area;
        let result = match (destination, source) {
            (None, None) => Ok(()),
            (None, Some(source)) => {
                if compose == Compose::SrcOut {
                    self.composite(source, None, &base, clip.bounds());
                }
                Ok(())
            }
            (Some(destination), None) if compose == Compose::DestOut => {
                self.composite(destination, None, &base, content_area);
                Ok(())
            }
            (Some(destination), None) => self.draw_form_with_clip(destination, clip, true),
            (Some(destination), Some(source)) => self
                .draw_form_with_clip(destination, clip, true)
                .map(|()| {
                    let (form, mask, invert) = match compose {
                        Compose::SrcIn => (source, destination, false),
                        Compose::SrcOut => (source, destination, true),
                        Compose::DestIn => (destination, source, false),
                        _ => (destination, source, true),
                    };
                    self.composite(form, Some((mask, invert)), clip, clip.bounds());
                }),
        };
        if let Err(err) = result {
            warn!("{err}");
            self.record_loss(QualityLoss::ResourceDropped(ResourceKind::XObject));
        }
    }

    fn prepend_form(&mut self, form: ResourceIndex) {
        let graphic_state = self
            .resources
            .graphic_states
            .intern(GraphicStateDesc::default());
        let snapshot = GraphicsStateSnapshot {
            transform: Affine::IDENTITY,
            clip: self.base_clip(),
            color: [0, 0, 0],
            shader: None,
            graphic_state,
            text: None,
        };
        let mut bytes = Vec::new();
        ops::append_xobject(&mut bytes, form);
        let content_area = self.content_area;
        let chain = self.active_chain_mut();
        let handle = chain.begin_or_reuse_entry(snapshot, Placement::Prepend);
        chain.append_bounded(handle, &bytes, content_area);
        chain.close();
    }

    /// Draw `primitive` with `paint` under the canvas's transform and clip.
    pub fn draw(
        &mut self,
        canvas: &(impl CanvasState + ?Sized),
        primitive: &Primitive,
        paint: &Paint,
    ) -> DrawOutcome {
        let outcome = self.draw_primitive(canvas.transform(), canvas.clip(), primitive, paint);
        if let DrawOutcome::Skipped(reason) = outcome {
            debug!("draw skipped: {reason:?}");
        }
        outcome
    }

    fn draw_primitive(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        primitive: &Primitive,
        paint: &Paint,
    ) -> DrawOutcome {
        if primitive.is_degenerate() {
            return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
        }
        let style = match primitive {
            Primitive::Points { .. } => PaintStyle::Stroke,
            Primitive::Paint | Primitive::Vertices { .. } | Primitive::Bitmap { .. } => {
                PaintStyle::Fill
            }
            _ => paint.style,
        };
        let paint = if style == paint.style {
            Cow::Borrowed(paint)
        } else {
            Cow::Owned(paint.clone().with_style(style))
        };
        if let Some(reason) = self.precheck(clip, &paint) {
            return DrawOutcome::Skipped(reason);
        }

        let visible = clip.bounds().intersect(self.content_area);
        let bounds = match primitive.local_bounds(&paint) {
            Some(local) => {
                let device = transform.transform_rect_bbox(local);
                if disjoint(device, visible) {
                    return DrawOutcome::Skipped(SkipReason::ClippedOut);
                }
                device.intersect(visible)
            }
            None => visible,
        };

        match primitive {
            Primitive::Paint => self.draw_paint(transform, clip, &paint, visible),
            Primitive::Points { mode, points } => {
                self.draw_geometry(transform, clip, &paint, bounds, |emitter, out| {
                    emitter.points(*mode, points, out);
                })
            }
            Primitive::Rect(rect) => {
                self.draw_geometry(transform, clip, &paint, bounds, |emitter, out| {
                    emitter.rect(*rect, style, out);
                })
            }
            Primitive::Path { path, fill_rule } => {
                self.draw_geometry(transform, clip, &paint, bounds, |emitter, out| {
                    emitter.path(path, *fill_rule, style, out);
                })
            }
            Primitive::Vertices { mode, vertices } => {
                self.draw_geometry(transform, clip, &paint, bounds, |emitter, out| {
                    emitter.vertices(*mode, vertices, out);
                })
            }
            Primitive::Bitmap {
                image,
                width,
                height,
                transform: image_transform,
            } => {
                let image = XObject::Image(ImageXObject {
                    image: *image,
                    width: *width,
                    height: *height,
                });
                // Images fill the unit square bottom-up.
                let placement = *image_transform
                    * Affine::scale_non_uniform(f64::from(*width), f64::from(*height))
                    * Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, 1.0]);
                let needed = usize::from(self.resources.xobjects.find(&image).is_none());
                self.draw_xobject(transform, clip, &paint, bounds, placement, needed, |device| {
                    device.resources.xobjects.try_intern(image)
                })
            }
            Primitive::Text(run) => self.draw_text(transform, clip, &paint, run, bounds),
        }
    }

    fn draw_geometry(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        paint: &Paint,
        bounds: Rect,
        emit: impl FnOnce(&dyn OperatorEmitter, &mut Vec<u8>),
    ) -> DrawOutcome {
        let mut bytes = Vec::new();
        emit(&*self.emitter, &mut bytes);
        self.draw_bytes(transform, clip, paint, false, &bytes, bounds)
    }

    fn draw_bytes(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        paint: &Paint,
        has_text: bool,
        bytes: &[u8],
        bounds: Rect,
    ) -> DrawOutcome {
        match self.open_entry(transform, clip, paint, has_text) {
            Opened::Entry(mut entry) => {
                entry.append_bounded(bytes, bounds);
                DrawOutcome::Recorded
            }
            Opened::Done(outcome) => outcome,
        }
    }

    /// Place an XObject that `intern` adds once the draw has an entry.
    ///
    /// `needed` is the number of new XObjects `intern` may add.
    fn draw_xobject(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        paint: &Paint,
        bounds: Rect,
        placement: Affine,
        needed: usize,
        intern: impl FnOnce(&mut Self) -> Result<ResourceIndex, ContentError>,
    ) -> DrawOutcome {
        if let Some(reason) = self.discards(paint.blend.compose) {
            return DrawOutcome::Skipped(reason);
        }
        // Clear erases without placing anything.
        if paint.blend.compose != Compose::Clear && !self.resources.xobjects.has_room(needed) {
            self.record_loss(QualityLoss::ResourceDropped(ResourceKind::XObject));
            return DrawOutcome::Skipped(SkipReason::ResourceExhausted);
        }
        let mut entry = match self.open_entry(transform, clip, paint, false) {
            Opened::Entry(entry) => entry,
            Opened::Done(outcome) => return outcome,
        };
        let index = match intern(&mut *entry.device) {
            Ok(index) => index,
            Err(err) => {
                warn!("{err}");
                entry.abandon();
                entry
                    .device
                    .record_loss(QualityLoss::ResourceDropped(ResourceKind::XObject));
                return DrawOutcome::Skipped(SkipReason::ResourceExhausted);
            }
        };
        let mut bytes = Vec::new();
        if placement == Affine::IDENTITY {
            ops::append_xobject(&mut bytes, index);
        } else {
            ops::append_save(&mut bytes);
            ops::append_transform(&mut bytes, placement);
            ops::append_xobject(&mut bytes, index);
            ops::append_restore(&mut bytes);
        }
        entry.append_bounded(&bytes, bounds);
        DrawOutcome::Recorded
    }

    fn draw_paint(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        paint: &Paint,
        visible: Rect,
    ) -> DrawOutcome {
        let det = transform.determinant();
        if !det.is_finite() || det == 0.0 {
            return DrawOutcome::Skipped(SkipReason::SingularTransform);
        }
        let local = transform.inverse().transform_rect_bbox(visible);
        self.draw_geometry(transform, clip, paint, visible, |emitter, out| {
            emitter.rect(local, PaintStyle::Fill, out);
        })
    }

    fn draw_text(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        paint: &Paint,
        run: &GlyphRun,
        bounds: Rect,
    ) -> DrawOutcome {
        let font = paint.text.font;
        let mut placed = Vec::with_capacity(run.glyphs.len());
        for glyph in &run.glyphs {
            match self.fonts.resolve(font, glyph.id) {
                Some(descriptor) => placed.push((FontResource { font, descriptor }, *glyph)),
                None => self.record_loss(QualityLoss::UnresolvedGlyph {
                    font,
                    glyph: glyph.id,
                }),
            }
        }
        if placed.is_empty() {
            return DrawOutcome::Skipped(SkipReason::UnresolvedGlyphs);
        }

        let mut entry = match self.open_entry(transform, clip, paint, true) {
            Opened::Entry(entry) => entry,
            Opened::Done(outcome) => return outcome,
        };
        let size = Scalar::new(paint.text.size);
        let mut selected = entry.current_font();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"BT\n");
        for (resource, glyph) in placed {
            let index = entry.device.resources.fonts.intern(resource);
            if selected != Some((index, size)) {
                ops::append_font(&mut bytes, index, size.get());
                selected = Some((index, size));
            }
            entry.device.glyphs.record_glyph(font, glyph.id);
            // Text space is y-up; device space is y-down.
            push(
                &mut bytes,
                format_args!("1 0 0 -1 {} {} Tm\n", Num(glyph.x), Num(glyph.y)),
            );
            resource.encode_glyph(glyph.id, &mut bytes);
            bytes.extend_from_slice(b" Tj\n");
        }
        bytes.extend_from_slice(b"ET\n");
        if let Some(selected) = selected {
            entry.set_font(selected);
        }
        entry.append_bounded(&bytes, bounds);
        DrawOutcome::Recorded
    }

    /// Draw everything recorded by `layer` as one nested form.
    ///
    /// The layer's resources are interned into this device's tables, its
    /// glyph usage and warnings are merged, and the form is placed under the
    /// canvas's transform and clip with `paint`'s alpha and blend mode. The
    /// layer's own page transform is not applied.
    pub fn draw_device(
        &mut self,
        canvas: &(impl CanvasState + ?Sized),
        layer: &Self,
        paint: &Paint,
    ) -> DrawOutcome {
        let outcome = self.draw_layer(canvas.transform(), canvas.clip(), layer, paint);
        if let DrawOutcome::Skipped(reason) = outcome {
            debug!("layer skipped: {reason:?}");
        }
        outcome
    }

    fn draw_layer(
        &mut self,
        transform: Affine,
        clip: &ClipState,
        layer: &Self,
        paint: &Paint,
    ) -> DrawOutcome {
        if layer.primary.is_empty() && layer.overlay.is_empty() {
            return DrawOutcome::Skipped(SkipReason::EmptyGeometry);
        }
        let paint = if paint.style == PaintStyle::Fill {
            Cow::Borrowed(paint)
        } else {
            Cow::Owned(paint.clone().with_style(PaintStyle::Fill))
        };
        if let Some(reason) = self.precheck(clip, &paint) {
            return DrawOutcome::Skipped(reason);
        }
        let visible = clip.bounds().intersect(self.content_area);
        let placed = transform.transform_rect_bbox(layer.content_area);
        if disjoint(placed, visible) {
            return DrawOutcome::Skipped(SkipReason::ClippedOut);
        }

        let needed = layer.resources.xobjects.len() + 1;
        let outcome = self.draw_xobject(
            transform,
            clip,
            &paint,
            placed.intersect(visible),
            Affine::IDENTITY,
            needed,
            |device| device.intern_layer(layer),
        );
        if outcome.is_recorded() {
            self.glyphs.merge(&layer.glyphs);
            self.warnings.extend_from_slice(&layer.warnings);
        }
        outcome
    }

    /// Intern `layer`'s resources and content as a nested form.
    fn intern_layer(&mut self, layer: &Self) -> Result<ResourceIndex, ContentError> {
        let remap = self.resources.absorb(&layer.resources)?;
        let mut content = Vec::new();
        layer.write_areas(&mut content);
        let form = FormXObject {
            content: remap.rewrite(&content),
            resources: self.resources.scope(),
            bbox: layer.content_area,
            transparency_group: true,
        };
        self.resources
            .xobjects
            .try_intern(XObject::Form(Arc::new(form)))
    }

    /// The page content stream.
    ///
    /// The page transform comes first, then the primary area (clipped to the
    /// content area when that is smaller than the page), then the overlay.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let page = self.config.page_transform();
        if page != Affine::IDENTITY {
            ops::append_transform(&mut out, page);
        }
        self.write_areas(&mut out);
        out
    }

    fn write_areas(&self, out: &mut Vec<u8>) {
        if !self.primary.is_empty() {
            let wrap = self.config.content_size != self.config.page_size;
            if wrap {
                ops::append_save(out);
                ops::append_rect(out, self.content_area);
                ops::append_clip(out, Fill::NonZero);
            }
            let mut stack = GraphicStackState::new(self.base_clip(), self.config.max_stack_depth);
            write_entries(self.primary.entries(), &mut stack, out);
            if wrap {
                ops::append_restore(out);
            }
        }
        let mut stack = GraphicStackState::new(self.base_clip(), self.config.max_stack_depth);
        write_entries(self.overlay.entries(), &mut stack, out);
    }

    /// End the session.
    pub fn finish(self) -> PageContent {
        let content = self.serialize();
        let media_box = self.media_box();
        PageContent {
            content,
            resources: self.resources,
            glyph_usage: self.glyphs,
            media_box,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use kurbo::Size;
    use vellum_imaging::{CanvasStack, ClipElement};

    fn device() -> PdfDevice {
        PdfDevice::new(DeviceConfig::new(Size::new(100.0, 100.0)).with_flip_origin(false))
            .unwrap()
    }

    fn red() -> Paint {
        Paint::solid(Color::from_rgba8(255, 0, 0, 255))
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn dest_over_prepends() {
        let mut device = device();
        let canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)), &red());
        let under = red().with_blend(Compose::DestOver);
        device.draw(&canvas, &Primitive::Rect(Rect::new(5.0, 5.0, 6.0, 6.0)), &under);
        let entries = device.entries(DrawingArea::Content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content(), b"5 5 1 1 re\nf\n");
    }

    #[test]
    fn dest_draws_nothing() {
        let mut device = device();
        let canvas = CanvasStack::new(device.content_area());
        let outcome = device.draw(
            &canvas,
            &Primitive::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)),
            &red().with_blend(Compose::Dest),
        );
        assert_eq!(outcome, DrawOutcome::Skipped(SkipReason::NothingToDraw));
        assert!(device.is_empty());
    }

    #[test]
    fn clear_over_whole_area_empties_it() {
        let mut device = device();
        let canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)), &red());
        let outcome = device.draw(&canvas, &Primitive::Paint, &red().with_blend(Compose::Clear));
        assert_eq!(outcome, DrawOutcome::Recorded);
        assert!(device.is_empty());
        assert!(device.resources().xobjects.is_empty());
    }

    #[test]
    fn copy_inside_rect_clip_prunes_covered_entries() {
        let mut device = device();
        let mut canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(10.0, 10.0, 20.0, 20.0)), &red());
        canvas.clip_rect(Rect::new(0.0, 0.0, 50.0, 50.0));
        let copy = Paint::solid(Color::from_rgba8(0, 0, 255, 255)).with_blend(Compose::Copy);
        device.draw(&canvas, &Primitive::Rect(Rect::new(30.0, 30.0, 40.0, 40.0)), &copy);
        let entries = device.entries(DrawingArea::Content);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].state().color, [0, 0, 255]);
        assert!(device.resources().xobjects.is_empty());
    }

    #[test]
    fn clear_through_path_clip_redraws_outside() {
        let mut device = device();
        let mut canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 100.0, 100.0)), &red());
        canvas.concat(Affine::rotate(0.3));
        canvas.clip_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
        let clear = Paint::default().with_blend(Compose::Clear);
        let outcome = device.draw(&canvas, &Primitive::Paint, &clear);
        assert_eq!(outcome, DrawOutcome::Recorded);
        // Remaining content plus the clip mask.
        assert_eq!(device.resources().xobjects.len(), 2);
        let content = text(device.serialize());
        assert!(content.contains("/X0 Do"));
        assert!(!content.contains("0 0 100 100 re\nf\n"));
    }

    #[test]
    fn erase_without_room_warns_and_keeps_content() {
        let mut device = PdfDevice::new(
            DeviceConfig::new(Size::new(100.0, 100.0)).with_xobject_capacity(1),
        )
        .unwrap();
        let mut canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 100.0, 100.0)), &red());
        canvas.clip_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
        device.draw(&canvas, &Primitive::Paint, &red().with_blend(Compose::Clear));
        assert_eq!(device.warnings(), &[QualityLoss::EraseSkipped(Compose::Clear)]);
        assert_eq!(device.entries(DrawingArea::Content).len(), 1);
    }

    #[test]
    fn src_in_over_content_builds_three_forms() {
        let mut device = device();
        let mut canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 50.0, 50.0)), &red());
        canvas.clip_rect(Rect::new(10.0, 10.0, 40.0, 40.0));
        let blue = Paint::solid(Color::from_rgba8(0, 0, 255, 255)).with_blend(Compose::SrcIn);
        let rect = Primitive::Rect(Rect::new(20.0, 20.0, 60.0, 60.0));
        let outcome = device.draw(&canvas, &rect, &blue);
        assert_eq!(outcome, DrawOutcome::Recorded);
        assert_eq!(device.resources().xobjects.len(), 3);
        let content = text(device.serialize());
        // Destination outside the clip, then source masked by destination.
        let outside = content.find("/X0 Do").unwrap();
        let inside = content.find("/X1 Do").unwrap();
        assert!(outside < inside);
        assert!(!content.contains("20 20 40 40 re"));
    }

    #[test]
    fn isolation_without_room_degrades() {
        let mut device = PdfDevice::new(
            DeviceConfig::new(Size::new(100.0, 100.0)).with_xobject_capacity(2),
        )
        .unwrap();
        let canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 50.0, 50.0)), &red());
        let paint = red().with_blend(Compose::DestOut);
        let rect = Primitive::Rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let outcome = device.draw(&canvas, &rect, &paint);
        assert_eq!(outcome, DrawOutcome::Recorded);
        assert_eq!(device.warnings(), &[QualityLoss::IsolationDegraded(Compose::DestOut)]);
        assert!(device.resources().xobjects.is_empty());
    }

    #[test]
    fn unsupported_compose_is_recorded_with_loss() {
        let mut device = device();
        let canvas = CanvasStack::new(device.content_area());
        let paint = red().with_blend(Compose::Xor);
        let outcome = device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)), &paint);
        assert_eq!(outcome, DrawOutcome::Recorded);
        assert_eq!(device.warnings(), &[QualityLoss::UnsupportedCompose(Compose::Xor)]);
    }

    #[test]
    fn invalidate_clip_prunes_outside_parent() {
        let mut device = device();
        let canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 10.0, 10.0)), &red());
        device.draw(
            &canvas,
            &Primitive::Rect(Rect::new(80.0, 80.0, 90.0, 90.0)),
            &Paint::default(),
        );
        let parent = ClipState::wide_open(device.content_area())
            .intersect(ClipElement::rect(Rect::new(0.0, 0.0, 50.0, 50.0)));
        assert_eq!(device.invalidate_clip(&parent), 1);
        assert_eq!(device.entries(DrawingArea::Content).len(), 1);
    }

    #[test]
    fn singular_paint_is_skipped() {
        let mut device = device();
        let mut canvas = CanvasStack::new(device.content_area());
        canvas.concat(Affine::scale_non_uniform(1.0, 0.0));
        assert_eq!(
            device.draw(&canvas, &Primitive::Paint, &red()),
            DrawOutcome::Skipped(SkipReason::SingularTransform)
        );
    }

    #[test]
    fn bitmap_is_placed_through_xobject() {
        let mut device = device();
        let canvas = CanvasStack::new(device.content_area());
        let bitmap = Primitive::Bitmap {
            image: vellum_imaging::ImageId(4),
            width: 2,
            height: 3,
            transform: Affine::translate((10.0, 20.0)),
        };
        assert!(device.draw(&canvas, &bitmap, &Paint::default()).is_recorded());
        assert_eq!(
            device.entries(DrawingArea::Content)[0].content(),
            b"q\n2 0 0 -3 10 23 cm\n/X0 Do\nQ\n"
        );
    }

    #[test]
    fn clear_to_resets_resources_and_paints() {
        let mut device = device();
        let canvas = CanvasStack::new(device.content_area());
        let multiply = red().with_blend(peniko::Mix::Multiply);
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 1.0, 1.0)), &multiply);
        assert_eq!(device.resources().graphic_states.len(), 1);
        device.clear_to(Color::WHITE);
        assert_eq!(device.entries(DrawingArea::Content).len(), 1);
        assert_eq!(device.resources().graphic_states.len(), 1);
        assert_eq!(
            device.entries(DrawingArea::Content)[0].content(),
            b"0 0 100 100 re\nf\n"
        );
    }
    #[test]
    fn layer_without_room_restores_isolated_destination() {
        let config = DeviceConfig::new(Size::new(100.0, 100.0))
            .with_flip_origin(false)
            .with_xobject_capacity(4);
        let mut device = PdfDevice::new(config).unwrap();
        let canvas = CanvasStack::new(device.content_area());
        device.draw(&canvas, &Primitive::Rect(Rect::new(0.0, 0.0, 10.0, 10.0)), &red());

        let mut layer = self::device();
        for id in 1..=3 {
            let bitmap = Primitive::Bitmap {
                image: vellum_imaging::ImageId(id),
                width: 1,
                height: 1,
                transform: Affine::IDENTITY,
            };
            assert!(layer.draw(&canvas, &bitmap, &Paint::default()).is_recorded());
        }

        // The destination takes one slot, the layer's images three more.
        let src_in = red().with_blend(Compose::SrcIn);
        assert_eq!(
            device.draw_device(&canvas, &layer, &src_in),
            DrawOutcome::Skipped(SkipReason::ResourceExhausted)
        );
        assert_eq!(
            device.warnings(),
            &[QualityLoss::ResourceDropped(ResourceKind::XObject)]
        );
        let content = text(device.serialize());
        assert!(content.contains("/X0 Do\n"), "{content}");
        assert!(device.glyphs.is_empty());
    }
}
