use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

/// The native-element state the core reads and writes through a
/// [`DomManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomElement {
    pub value: String,
    pub checked: bool,
    pub selected: Option<String>,
    pub focused: bool,
    pub enabled: bool,
    pub classes: Vec<String>,
    pub aria: BTreeMap<String, String>,
}

impl Default for DomElement {
    fn default() -> Self {
        Self {
            value: String::new(),
            checked: false,
            selected: None,
            focused: false,
            enabled: true,
            classes: Vec::new(),
            aria: BTreeMap::new(),
        }
    }
}

/// Opaque key-value store over native input elements, addressed by field id.
///
/// Setters return `false` when no element is registered under `id`.
pub trait DomManager: fmt::Debug {
    fn register(&mut self, id: &str, element: DomElement);
    fn exists(&self, id: &str) -> bool;
    fn get(&self, id: &str) -> Option<&DomElement>;
    fn set_value(&mut self, id: &str, value: &str) -> bool;
    fn set_checked(&mut self, id: &str, checked: bool) -> bool;
    fn set_focus(&mut self, id: &str, focused: bool) -> bool;
    fn set_selected(&mut self, id: &str, option_id: Option<&str>) -> bool;
    fn set_enabled(&mut self, id: &str, enabled: bool) -> bool;
    fn set_class(&mut self, id: &str, classes: &[String]) -> bool;
    fn aria_set(&mut self, id: &str, attribute: &str, value: &str) -> bool;
    fn clear(&mut self, id: &str) -> bool;

    fn update_aria(&mut self, id: &str, attributes: &[(&str, String)]) -> bool {
        attributes
            .iter()
            .all(|(attribute, value)| self.aria_set(id, attribute, value))
    }
}

/// In-memory [`DomManager`], used headless and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDom {
    elements: IndexMap<String, DomElement>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn update(&mut self, id: &str, apply: impl FnOnce(&mut DomElement)) -> bool {
        match self.elements.get_mut(id) {
            Some(element) => {
                apply(element);
                true
            }
            None => false,
        }
    }
}

impl DomManager for MemoryDom {
    fn register(&mut self, id: &str, element: DomElement) {
        self.elements.insert(id.to_string(), element);
    }

    fn exists(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<&DomElement> {
        self.elements.get(id)
    }

    fn set_value(&mut self, id: &str, value: &str) -> bool {
        self.update(id, |element| element.value = value.to_string())
    }

    fn set_checked(&mut self, id: &str, checked: bool) -> bool {
        self.update(id, |element| element.checked = checked)
    }

    fn set_focus(&mut self, id: &str, focused: bool) -> bool {
        self.update(id, |element| element.focused = focused)
    }

    fn set_selected(&mut self, id: &str, option_id: Option<&str>) -> bool {
        self.update(id, |element| element.selected = option_id.map(str::to_string))
    }

    fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        self.update(id, |element| element.enabled = enabled)
    }

    fn set_class(&mut self, id: &str, classes: &[String]) -> bool {
        self.update(id, |element| element.classes = classes.to_vec())
    }

    fn aria_set(&mut self, id: &str, attribute: &str, value: &str) -> bool {
        self.update(id, |element| {
            element
                .aria
                .insert(attribute.to_string(), value.to_string());
        })
    }

    fn clear(&mut self, id: &str) -> bool {
        self.update(id, |element| {
            element.value.clear();
            element.checked = false;
            element.selected = None;
        })
    }
}
