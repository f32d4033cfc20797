//! The note editor: line tokenizer, renderer, smart-editing features and the
//! input pipeline that ties them to a live buffer.

pub mod block;
pub mod editor;
pub mod features;
pub mod inline;
pub mod input;
pub mod render;
pub mod selection;
pub mod text;

pub use editor::{process_before_input, process_tab, EditorSession, InputEvent};
pub use features::{renumber_ordered_list, toggle_checkbox, Feature, FEATURES};
pub use render::{render_markdown, RenderElement, RenderNode};
pub use text::{EditResult, Selection};
