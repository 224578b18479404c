//! Introspection GUI tree as seen by the constraints: categories addressed by path,
//! holding named elements whose content is pulled from callbacks at display time.
//!
//! Callbacks must not hold a mutable borrow of anything the control loop touches.
//! Checkbox toggles are expected to only queue a request that the owner applies
//! between control cycles.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use nalgebra::Point3;

/// Path of a category, from the root.
pub type Category = Vec<String>;

#[derive(Clone)]
pub enum Element {
    Checkbox {
        name: String,
        state: Rc<dyn Fn() -> bool>,
        toggle: Rc<dyn Fn()>,
    },
    Label {
        name: String,
        text: Rc<dyn Fn() -> String>,
    },
    /// Arrow from `start` to `end`, both in world frame.
    Arrow {
        name: String,
        start: Rc<dyn Fn() -> Point3<f64>>,
        end: Rc<dyn Fn() -> Point3<f64>>,
    },
}

impl Element {
    pub fn checkbox(
        name: impl Into<String>,
        state: impl Fn() -> bool + 'static,
        toggle: impl Fn() + 'static,
    ) -> Self {
        Element::Checkbox { name: name.into(), state: Rc::new(state), toggle: Rc::new(toggle) }
    }

    pub fn label(name: impl Into<String>, text: impl Fn() -> String + 'static) -> Self {
        Element::Label { name: name.into(), text: Rc::new(text) }
    }

    pub fn arrow(
        name: impl Into<String>,
        start: impl Fn() -> Point3<f64> + 'static,
        end: impl Fn() -> Point3<f64> + 'static,
    ) -> Self {
        Element::Arrow { name: name.into(), start: Rc::new(start), end: Rc::new(end) }
    }

    pub fn name(&self) -> &str {
        match self {
            Element::Checkbox { name, .. } | Element::Label { name, .. } | Element::Arrow { name, .. } => name,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Element::Checkbox { .. } => "Checkbox",
            Element::Label { .. } => "Label",
            Element::Arrow { .. } => "Arrow",
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind(), self.name())
    }
}

/// Shared GUI tree. Elements are unique by name within a category; adding an element
/// with an existing name replaces it.
#[derive(Default)]
pub struct Gui {
    categories: RefCell<BTreeMap<Category, Vec<Element>>>,
}

impl Gui {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element(&self, category: &[String], element: Element) {
        let mut categories = self.categories.borrow_mut();
        let elements = categories.entry(category.to_vec()).or_default();
        match elements.iter_mut().find(|e| e.name() == element.name()) {
            Some(existing) => *existing = element,
            None => elements.push(element),
        }
    }

    /// Returns true if the element existed.
    pub fn remove_element(&self, category: &[String], name: &str) -> bool {
        let mut categories = self.categories.borrow_mut();
        let Some(elements) = categories.get_mut(category) else {
            return false;
        };
        let before = elements.len();
        elements.retain(|e| e.name() != name);
        let removed = elements.len() != before;
        if elements.is_empty() {
            categories.remove(category);
        }
        removed
    }

    /// Removes the category together with all its sub-categories.
    pub fn remove_category(&self, category: &[String]) {
        self.categories.borrow_mut().retain(|path, _| !path.starts_with(category));
    }

    pub fn has_element(&self, category: &[String], name: &str) -> bool {
        self.find(category, name).is_some()
    }

    /// Names of the elements directly in this category, in insertion order.
    pub fn element_names(&self, category: &[String]) -> Vec<String> {
        self.categories
            .borrow()
            .get(category)
            .map(|elements| elements.iter().map(|e| e.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Every element of the tree as (category, name), sorted.
    pub fn snapshot(&self) -> Vec<(Category, String)> {
        let mut all: Vec<(Category, String)> = self
            .categories
            .borrow()
            .iter()
            .flat_map(|(path, elements)| {
                elements.iter().map(move |e| (path.clone(), e.name().to_string()))
            })
            .collect();
        all.sort();
        all
    }

    pub fn is_empty(&self) -> bool {
        self.categories.borrow().is_empty()
    }

    pub fn label_text(&self, category: &[String], name: &str) -> Option<String> {
        match self.find(category, name)? {
            Element::Label { text, .. } => Some(text()),
            _ => None,
        }
    }

    pub fn arrow_points(&self, category: &[String], name: &str) -> Option<(Point3<f64>, Point3<f64>)> {
        match self.find(category, name)? {
            Element::Arrow { start, end, .. } => Some((start(), end())),
            _ => None,
        }
    }

    pub fn checkbox_state(&self, category: &[String], name: &str) -> Option<bool> {
        match self.find(category, name)? {
            Element::Checkbox { state, .. } => Some(state()),
            _ => None,
        }
    }

    /// Acts as a user click on a checkbox. Returns false if there is no such checkbox.
    pub fn click(&self, category: &[String], name: &str) -> bool {
        match self.find(category, name) {
            Some(Element::Checkbox { toggle, .. }) => {
                toggle();
                true
            }
            _ => false,
        }
    }

    /// Clones the element out so that callbacks run without the tree borrowed.
    fn find(&self, category: &[String], name: &str) -> Option<Element> {
        self.categories
            .borrow()
            .get(category)?
            .iter()
            .find(|e| e.name() == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn path(items: &[&str]) -> Category {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_replace_remove() {
        let gui = Gui::new();
        let category = path(&["Collisions", "a/b"]);
        gui.add_element(&category, Element::label("x", || "1".to_string()));
        gui.add_element(&category, Element::label("x", || "2".to_string()));
        assert_eq!(gui.element_names(&category), vec!["x".to_string()]);
        assert_eq!(gui.label_text(&category, "x").as_deref(), Some("2"));

        assert!(gui.remove_element(&category, "x"));
        assert!(!gui.remove_element(&category, "x"));
        assert!(gui.is_empty());
    }

    #[test]
    fn test_remove_category_is_recursive() {
        let gui = Gui::new();
        let root = path(&["Collisions", "a/b"]);
        let mut monitors = root.clone();
        monitors.push("Monitors".into());
        let other = path(&["Collisions", "a/c"]);
        gui.add_element(&root, Element::label("l", String::new));
        gui.add_element(&monitors, Element::checkbox("m", || false, || {}));
        gui.add_element(&other, Element::label("l", String::new));

        gui.remove_category(&root);
        assert_eq!(gui.snapshot(), vec![(other, "l".to_string())]);
    }

    #[test]
    fn test_click_checkbox() {
        let gui = Gui::new();
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let category = path(&["c"]);
        gui.add_element(&category, Element::checkbox("box", || true, move || counter.set(counter.get() + 1)));
        assert!(gui.click(&category, "box"));
        assert!(!gui.click(&category, "missing"));
        assert_eq!(clicks.get(), 1);
        assert_eq!(gui.checkbox_state(&category, "box"), Some(true));
        assert_eq!(gui.label_text(&category, "box"), None);
    }
}
