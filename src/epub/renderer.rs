//! Drives a `Surface` through chapters and pages, keeping the reading
//! position stable across restyles and resizes.

use log::{debug, error, warn};
use std::sync::Arc;

use super::cfi;
use super::chapter::load_chapter;
use super::parser::EpubParser;
use super::resolver::{Blob, ResourceResolver};
use super::styler::{ContentStyle, content_style, snap_margins_to_grid};
use super::surface::{LayoutMode, Surface};
use super::tracker::{LocationTracker, fuzz_px, page_for_offset, total_pages};
use super::types::{DisplayTarget, EpubPackage, LayoutInfo, Location};
use crate::settings::{ReaderSettings, ReaderSettingsUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Idle,
    Loading(usize),
    Rendered { spine_index: usize, page: usize },
    Resizing,
}

type RelocatedCallback = Box<dyn FnMut(&Location)>;

pub struct EpubRenderer<S: Surface> {
    parser: EpubParser,
    package: EpubPackage,
    options: ReaderSettings,
    prefers_dark: bool,
    surface: S,
    resolver: ResourceResolver,
    tracker: LocationTracker,
    style: ContentStyle,
    state: RendererState,
    spine_index: usize,
    page: usize,
    total_pages: usize,
    busy: bool,
    last_cfi: Option<String>,
    on_relocated: Option<RelocatedCallback>,
}

impl<S: Surface> EpubRenderer<S> {
    pub fn new(parser: EpubParser, package: EpubPackage, options: ReaderSettings, surface: S) -> Self {
        let tracker = LocationTracker::new(&package);
        let (width, height) = surface.container_size();
        let style = content_style(&options, false, width, height);
        Self {
            parser,
            package,
            options,
            prefers_dark: false,
            surface,
            resolver: ResourceResolver::new(),
            tracker,
            style,
            state: RendererState::Idle,
            spine_index: 0,
            page: 0,
            total_pages: 0,
            busy: false,
            last_cfi: None,
            on_relocated: None,
        }
    }

    pub fn set_on_relocated(&mut self, callback: impl FnMut(&Location) + 'static) {
        self.on_relocated = Some(Box::new(callback));
    }

    /// Host colour scheme, used when the theme is `System`. Takes effect on
    /// the next restyle.
    pub fn set_prefers_dark(&mut self, prefers_dark: bool) {
        self.prefers_dark = prefers_dark;
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn spine_index(&self) -> usize {
        self.spine_index
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn layout(&self) -> &LayoutInfo {
        &self.style.layout
    }

    pub fn style(&self) -> &ContentStyle {
        &self.style
    }

    pub fn options(&self) -> &ReaderSettings {
        &self.options
    }

    pub fn package(&self) -> &EpubPackage {
        &self.package
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// CFI the next resize will restore.
    pub fn last_cfi(&self) -> Option<&str> {
        self.last_cfi.as_deref()
    }

    pub fn display(&mut self, target: DisplayTarget) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        let (shown, from_cfi) = match target {
            DisplayTarget::Cfi(cfi) => (self.show_cfi(&cfi, true), true),
            DisplayTarget::SpineIndex(index) => {
                (self.show_spine_index(index, false, LayoutMode::Async), false)
            }
            DisplayTarget::Start => (self.show_spine_index(0, false, LayoutMode::Async), false),
        };
        if shown && !from_cfi {
            self.remember_position();
        }
        self.busy = false;
        self.notify_relocated(false);
        shown
    }

    pub fn display_cfi(&mut self, cfi: &str, suppress_paint: bool) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        let shown = self.show_cfi(cfi, suppress_paint);
        self.busy = false;
        self.notify_relocated(false);
        shown
    }

    pub fn display_spine_index(
        &mut self,
        index: usize,
        skip_initial_page: bool,
        mode: LayoutMode,
        suppress_paint: bool,
    ) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        let was_visible = self.surface.is_visible();
        if suppress_paint {
            self.surface.set_visible(false);
        }
        let shown = self.show_spine_index(index, skip_initial_page, mode);
        if suppress_paint {
            self.surface.set_visible(was_visible);
        }
        if shown {
            self.remember_position();
        }
        self.busy = false;
        self.notify_relocated(false);
        shown
    }

    /// Opens the chapter a table of contents entry points at.
    pub fn display_href(&mut self, href: &str) -> bool {
        match self.package.spine_index_for_href(href) {
            Some(index) => self.display_spine_index(index, false, LayoutMode::Async, false),
            None => {
                warn!("No spine item for {href}");
                false
            }
        }
    }

    pub fn next(&mut self) -> bool {
        if self.busy {
            return false;
        }
        if self.page + 1 < self.total_pages {
            self.turn_to(self.page + 1);
            true
        } else if self.spine_index + 1 < self.package.spine.len() {
            self.display_spine_index(self.spine_index + 1, false, LayoutMode::Async, true)
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.busy {
            return false;
        }
        if self.page > 0 {
            self.turn_to(self.page - 1);
            return true;
        }
        if self.spine_index == 0 {
            return false;
        }

        self.busy = true;
        let was_visible = self.surface.is_visible();
        self.surface.set_visible(false);
        let shown = self.show_spine_index(self.spine_index - 1, true, LayoutMode::Async);
        if shown {
            self.go_to_page(self.total_pages.saturating_sub(1));
            self.remember_position();
        }
        self.surface.set_visible(was_visible);
        self.busy = false;
        self.notify_relocated(false);
        shown
    }

    /// Relayout for the current container size, then return to the last
    /// known position.
    pub fn handle_resize(&mut self) -> bool {
        if self.busy || self.surface.document().is_none() {
            return false;
        }
        self.busy = true;
        self.state = RendererState::Resizing;
        debug!("Resizing to {:?}", self.surface.container_size());

        let cfi = self.last_cfi.clone();
        self.restyle(true);
        self.surface.settle(LayoutMode::Sync);
        self.calculate_pages();
        match cfi {
            Some(cfi) => {
                self.show_cfi(&cfi, false);
            }
            None => {
                self.go_to_page(self.page);
                self.mark_rendered();
            }
        }

        self.busy = false;
        self.notify_relocated(false);
        true
    }

    pub fn update_settings(&mut self, update: ReaderSettingsUpdate) -> bool {
        self.options.merge(update);
        self.handle_resize()
    }

    pub fn current_location(&self, basic: bool) -> Option<Location> {
        self.tracker.current_location(
            &self.surface,
            &self.style.layout,
            self.spine_index,
            self.page,
            self.total_pages,
            basic,
        )
    }

    /// Looks up a resource URL handed out while rendering.
    pub fn resource(&self, url: &str) -> Option<Arc<Blob>> {
        self.resolver.blob(url)
    }

    /// Releases every resource URL and the mounted chapter.
    pub fn destroy(&mut self) {
        self.resolver.destroy();
        self.surface.unmount();
        self.on_relocated = None;
        self.state = RendererState::Idle;
        self.total_pages = 0;
        self.page = 0;
    }

    fn show_cfi(&mut self, target: &str, suppress_paint: bool) -> bool {
        let was_visible = self.surface.is_visible();
        if suppress_paint {
            self.surface.set_visible(false);
        }
        let shown = match cfi::parse(target) {
            None => {
                debug!("Unreadable CFI {target}, opening the first chapter");
                let shown = self.show_spine_index(0, false, LayoutMode::Async);
                if shown {
                    self.remember_position();
                }
                shown
            }
            Some(parsed) => {
                let shown = self.show_spine_index(parsed.spine_index, true, LayoutMode::Async);
                if shown {
                    let page = self.page_for_cfi(&parsed.path, parsed.offset).unwrap_or_else(|| {
                        warn!("CFI path not found in document: {}", parsed.path);
                        0
                    });
                    self.go_to_page(page);
                    self.last_cfi = Some(target.to_string());
                }
                shown
            }
        };
        if suppress_paint {
            self.surface.set_visible(was_visible);
        }
        shown
    }

    fn page_for_cfi(&self, path: &str, offset: usize) -> Option<usize> {
        let doc = self.surface.document()?;
        let element = cfi::element_by_path(doc, doc.root(), path)?;
        let char_left = if offset > 0 {
            cfi::target_char_rect(&self.surface, element, offset).map(|rect| rect.left())
        } else {
            None
        };
        let left = char_left
            .or_else(|| self.surface.client_rects(element).first().map(|rect| rect.left()))
            .unwrap_or(0.0);
        let fuzz = fuzz_px(self.surface.device_pixel_ratio());
        Some(page_for_offset(left, &self.style.layout, self.total_pages, fuzz))
    }

    fn show_spine_index(&mut self, index: usize, skip_initial_page: bool, mode: LayoutMode) -> bool {
        let Some(spine_item) = self.package.spine.get(index) else {
            error!("Invalid spine index: {index}");
            return false;
        };
        let Some(href) = self
            .package
            .manifest_item(&spine_item.idref)
            .map(|item| item.href.clone())
        else {
            error!("Manifest item not found: {}", spine_item.idref);
            return false;
        };

        let preserve_translate = self.surface.document().is_some() && index == self.spine_index;
        self.state = RendererState::Loading(index);
        self.spine_index = index;
        debug!(
            "Loading spine item {index} ({})",
            self.package.chapter_path(index).unwrap_or_default()
        );

        let document = load_chapter(&self.parser, &mut self.resolver, &href);
        self.surface.mount(document);
        self.restyle(preserve_translate);
        // Restyling the mounted chapter reflows at once.
        self.surface.settle(if preserve_translate { LayoutMode::Sync } else { mode });
        self.calculate_pages();
        if !skip_initial_page {
            self.go_to_page(0);
        }
        self.mark_rendered();
        true
    }

    fn restyle(&mut self, preserve_translate: bool) {
        let (width, height) = self.surface.container_size();
        self.style = content_style(&self.options, self.prefers_dark, width, height);
        self.surface.apply_style(&self.style, preserve_translate);
        let font_size = self.options.font_size;
        if let Some(doc) = self.surface.document_mut() {
            let root = doc.root();
            snap_margins_to_grid(doc, root, font_size);
        }
    }

    fn calculate_pages(&mut self) {
        self.total_pages = total_pages(self.surface.scroll_width(), &self.style.layout);
    }

    fn go_to_page(&mut self, page: usize) {
        self.page = page.min(self.total_pages.saturating_sub(1));
        self.surface
            .set_translate(self.page as f64 * self.style.layout.page_stride);
        self.mark_rendered();
    }

    /// A page turn inside the current chapter.
    fn turn_to(&mut self, page: usize) {
        self.go_to_page(page);
        self.remember_position();
        self.notify_relocated(true);
    }

    fn mark_rendered(&mut self) {
        self.state = RendererState::Rendered {
            spine_index: self.spine_index,
            page: self.page,
        };
    }

    fn remember_position(&mut self) {
        if let Some(cfi) = self
            .current_location(false)
            .and_then(|location| location.start.cfi)
        {
            self.last_cfi = Some(cfi);
        }
    }

    fn notify_relocated(&mut self, basic: bool) {
        if self.busy || self.on_relocated.is_none() {
            return;
        }
        let Some(location) = self.current_location(basic) else {
            return;
        };
        if let Some(callback) = self.on_relocated.as_mut() {
            callback(&location);
        }
    }
}
