//! Remote page description
//!
//! A page is a flat set of positioned text and list elements on the
//! 576×288 display. Apps build pages from session state; quicktest loads
//! them from a declarative file. [`PageDescription::validate`] enforces the
//! limits the device accepts.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DISPLAY_WIDTH: u32 = 576;
pub const DISPLAY_HEIGHT: u32 = 288;

/// The device refuses pages with more containers than this.
pub const MAX_ELEMENTS: usize = 4;

/// Upper bound on the bytes of a single text element.
pub const MAX_TEXT_LEN: usize = 1000;

/// Identifies an element for partial updates: numeric container id plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId {
    pub id: u32,
    pub name: String,
}

impl ElementId {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn fits_display(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.saturating_add(self.width) <= DISPLAY_WIDTH
            && self.y.saturating_add(self.height) <= DISPLAY_HEIGHT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextElement {
    #[serde(flatten)]
    pub id: ElementId,
    #[serde(flatten)]
    pub rect: Rect,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub event_capture: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListElement {
    #[serde(flatten)]
    pub id: ElementId,
    #[serde(flatten)]
    pub rect: Rect,
    pub items: Vec<String>,
    #[serde(default)]
    pub item_width: u32,
    #[serde(default = "default_true")]
    pub select_border: bool,
    #[serde(default)]
    pub event_capture: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Text(TextElement),
    List(ListElement),
}

impl Element {
    pub fn text(id: ElementId, rect: Rect, content: impl Into<String>) -> Self {
        Element::Text(TextElement {
            id,
            rect,
            content: content.into(),
            event_capture: false,
        })
    }

    pub fn list(id: ElementId, rect: Rect, items: Vec<String>, item_width: u32) -> Self {
        Element::List(ListElement {
            id,
            rect,
            items,
            item_width,
            select_border: true,
            event_capture: false,
        })
    }

    /// Builder: mark this element as the page's event receiver.
    pub fn capturing(mut self) -> Self {
        match &mut self {
            Element::Text(t) => t.event_capture = true,
            Element::List(l) => l.event_capture = true,
        }
        self
    }

    pub fn id(&self) -> &ElementId {
        match self {
            Element::Text(t) => &t.id,
            Element::List(l) => &l.id,
        }
    }

    pub fn rect(&self) -> Rect {
        match self {
            Element::Text(t) => t.rect,
            Element::List(l) => l.rect,
        }
    }

    pub fn is_event_capture(&self) -> bool {
        match self {
            Element::Text(t) => t.event_capture,
            Element::List(l) => l.event_capture,
        }
    }

    /// Text content if this is a text element.
    pub fn content(&self) -> Option<&str> {
        match self {
            Element::Text(t) => Some(&t.content),
            Element::List(_) => None,
        }
    }
}

/// A complete page as sent in a full render.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageDescription {
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl PageDescription {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id() == id)
    }

    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id().name == name)
    }

    /// Parse a declarative page from JSON or TOML text.
    ///
    /// The format is picked from the first non-blank character: `{` means
    /// JSON, anything else TOML (`[[elements]]` tables). The result is
    /// validated before it is returned.
    pub fn from_source(source: &str) -> Result<Self> {
        let page: PageDescription = if source.trim_start().starts_with('{') {
            serde_json::from_str(source)?
        } else {
            toml::from_str(source).map_err(|e| Error::layout(e.to_string()))?
        };
        page.validate()?;
        Ok(page)
    }

    /// Check the page against device limits.
    pub fn validate(&self) -> Result<()> {
        if self.elements.is_empty() {
            return Err(Error::layout("page has no elements"));
        }
        if self.elements.len() > MAX_ELEMENTS {
            return Err(Error::layout(format!(
                "page has {} elements, at most {MAX_ELEMENTS} allowed",
                self.elements.len()
            )));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        let mut capture_count = 0;

        for element in &self.elements {
            let id = element.id();
            if id.name.trim().is_empty() {
                return Err(Error::layout(format!("element {} has an empty name", id.id)));
            }
            if !ids.insert(id.id) {
                return Err(Error::layout(format!("duplicate element id {}", id.id)));
            }
            if !names.insert(id.name.as_str()) {
                return Err(Error::layout(format!("duplicate element name '{}'", id.name)));
            }
            if !element.rect().fits_display() {
                return Err(Error::layout(format!(
                    "element {id} does not fit the {DISPLAY_WIDTH}x{DISPLAY_HEIGHT} display"
                )));
            }
            if element.is_event_capture() {
                capture_count += 1;
            }
            match element {
                Element::Text(t) if t.content.len() > MAX_TEXT_LEN => {
                    return Err(Error::layout(format!(
                        "element {id} text exceeds {MAX_TEXT_LEN} bytes"
                    )));
                }
                Element::List(l) if l.items.is_empty() => {
                    return Err(Error::layout(format!("list {id} has no items")));
                }
                Element::List(l) if l.item_width > l.rect.width => {
                    return Err(Error::layout(format!(
                        "list {id} item width {} exceeds element width {}",
                        l.item_width, l.rect.width
                    )));
                }
                _ => {}
            }
        }

        if capture_count > 1 {
            return Err(Error::layout("more than one event-capture element"));
        }
        Ok(())
    }
}
