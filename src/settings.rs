use serde::{Deserialize, Serialize};

pub const DEFAULT_FONT_FAMILY: &str = "Literata, Georgia, serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Sepia,
    #[default]
    System,
}

impl Theme {
    /// Resolves `System` against the host's colour scheme preference.
    pub fn effective(self, prefers_dark: bool) -> Theme {
        match self {
            Theme::System if prefers_dark => Theme::Dark,
            Theme::System => Theme::Light,
            theme => theme,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub theme: Theme,
    /// Percentage of the 16px base font.
    pub font_size: u32,
    pub font_family: String,
    /// Page margin in pixels.
    pub margin: u32,
    pub invert_images: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            font_size: 100,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            margin: 20,
            invert_images: false,
        }
    }
}

/// A partial change to `ReaderSettings`; unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderSettingsUpdate {
    pub theme: Option<Theme>,
    pub font_size: Option<u32>,
    pub font_family: Option<String>,
    pub margin: Option<u32>,
    pub invert_images: Option<bool>,
}

impl ReaderSettings {
    pub fn merge(&mut self, other: ReaderSettingsUpdate) {
        if let Some(theme) = other.theme {
            self.theme = theme;
        }
        if let Some(font_size) = other.font_size {
            self.font_size = font_size;
        }
        if let Some(font_family) = other.font_family {
            self.font_family = font_family;
        }
        if let Some(margin) = other.margin {
            self.margin = margin;
        }
        if let Some(invert_images) = other.invert_images {
            self.invert_images = invert_images;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorPreferences {
    pub monospace: bool,
    pub custom_caret: bool,
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            monospace: false,
            custom_caret: true,
        }
    }
}

pub type SubscriptionId = usize;

/// Owns one settings value and tells subscribers whenever it changes.
pub struct SettingsStore<T> {
    value: T,
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, Box<dyn FnMut(&T)>)>,
}

impl<T> SettingsStore<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.notify();
    }

    pub fn update(&mut self, change: impl FnOnce(&mut T)) {
        change(&mut self.value);
        self.notify();
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&T) + 'static) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscriber_id, _)| *subscriber_id != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&self.value);
        }
    }
}

impl<T: Default> Default for SettingsStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SettingsStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("value", &self.value)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
