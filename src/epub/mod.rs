//! Paginated EPUB reading: package parsing, chapter preparation, column
//! layout and position tracking.

pub mod cfi;
pub mod chapter;
pub mod dom;
pub mod flow;
pub mod parser;
pub mod renderer;
pub mod resolver;
pub mod styler;
pub mod surface;
pub mod tracker;
pub mod types;
pub mod xml;

pub use dom::{Document, NodeId};
pub use flow::FlowSurface;
pub use parser::EpubParser;
pub use renderer::{EpubRenderer, RendererState};
pub use resolver::ResourceResolver;
pub use surface::{LayoutMode, Rect, Surface};
pub use tracker::LocationTracker;
pub use types::{
    DisplayTarget, EpubMetadata, EpubPackage, LayoutInfo, Location, LocationDisplayed,
    LocationStart, ManifestItem, NavPoint, SpineItem,
};
