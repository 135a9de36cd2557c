use indexmap::IndexMap;

use super::state::Formular;
use crate::error::{FormularError, Result};

/// Forms addressed by id, owned by whoever hosts them.
#[derive(Debug, Default)]
pub struct FormRegistry {
    forms: IndexMap<String, Formular>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, form: Formular) -> Result<&mut Formular> {
        let id = form.id().to_string();
        if self.forms.contains_key(&id) {
            return Err(FormularError::DuplicateForm(id));
        }
        Ok(self.forms.entry(id).or_insert(form))
    }

    pub fn get(&self, id: &str) -> Option<&Formular> {
        self.forms.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Formular> {
        self.forms.get_mut(id)
    }

    /// Removes and disposes the form.
    pub fn remove(&mut self, id: &str) -> Option<Formular> {
        let mut form = self.forms.shift_remove(id)?;
        form.dispose();
        Some(form)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.forms.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn tick_all(&mut self) -> usize {
        self.forms.values_mut().map(Formular::tick).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormularOptions;
    use crate::tracking::Tracker;

    fn form(id: &str) -> Formular {
        Formular::new(id, FormularOptions::default().with_tracker(Tracker::new()))
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = FormRegistry::new();
        registry.register(form("a")).unwrap();
        let err = registry.register(form("a")).unwrap_err();
        assert_eq!(err, FormularError::DuplicateForm("a".into()));
        registry.register(form("b")).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(registry.remove("a").is_some());
        assert!(registry.get("a").is_none());
    }
}
