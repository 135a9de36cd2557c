//! Type-keyed getters and setters for field values.

mod strategies;

use std::fmt;
use std::rc::Rc;

use crate::domain::{FieldType, ValueCategory};
use crate::error::{FormularError, Result};
use crate::form::field::{DomManager, FieldState, FieldValue};
use crate::tracking::Tracker;

pub use strategies::default_value_strategies;

const SOURCE: &str = "formular.values";

/// Which representation a caller wants back from [`ValueManager::get_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValuePurpose {
    Validation,
    Display,
    Submission,
    All,
}

/// The native element property a strategy reads its intermediate value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueProperty {
    Checked,
    Value,
    SelectedOption,
}

pub type ValueGetter = Rc<dyn Fn(&FieldState, ValuePurpose) -> Option<FieldValue>>;
pub type ValueSetter = Rc<dyn Fn(&mut FieldState, FieldValue) -> Result<()>>;

#[derive(Clone)]
pub struct ValueStrategy {
    id: String,
    concerned_types: Vec<FieldType>,
    field_value_property: ValueProperty,
    getter: ValueGetter,
    setter: ValueSetter,
}

impl ValueStrategy {
    pub fn new<G, S>(
        id: impl Into<String>,
        concerned_types: impl Into<Vec<FieldType>>,
        field_value_property: ValueProperty,
        getter: G,
        setter: S,
    ) -> Self
    where
        G: Fn(&FieldState, ValuePurpose) -> Option<FieldValue> + 'static,
        S: Fn(&mut FieldState, FieldValue) -> Result<()> + 'static,
    {
        Self {
            id: id.into(),
            concerned_types: concerned_types.into(),
            field_value_property,
            getter: Rc::new(getter),
            setter: Rc::new(setter),
        }
    }

    /// A strategy covering every field type of `category`.
    pub fn for_category<G, S>(
        id: impl Into<String>,
        category: ValueCategory,
        field_value_property: ValueProperty,
        getter: G,
        setter: S,
    ) -> Self
    where
        G: Fn(&FieldState, ValuePurpose) -> Option<FieldValue> + 'static,
        S: Fn(&mut FieldState, FieldValue) -> Result<()> + 'static,
    {
        let types: Vec<FieldType> = FieldType::ALL
            .into_iter()
            .filter(|field_type| field_type.category() == category)
            .collect();
        Self::new(id, types, field_value_property, getter, setter)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn concerned_types(&self) -> &[FieldType] {
        &self.concerned_types
    }

    pub fn field_value_property(&self) -> ValueProperty {
        self.field_value_property
    }

    pub fn handles(&self, field_type: FieldType) -> bool {
        self.concerned_types.contains(&field_type)
    }
}

impl fmt::Debug for ValueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStrategy")
            .field("id", &self.id)
            .field("concerned_types", &self.concerned_types)
            .field("field_value_property", &self.field_value_property)
            .finish_non_exhaustive()
    }
}

/// Reads and writes field values through the first strategy whose concerned
/// types include the field's type.
#[derive(Debug, Clone)]
pub struct ValueManager {
    strategies: Vec<ValueStrategy>,
    tracker: Tracker,
}

impl ValueManager {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            strategies: Vec::new(),
            tracker,
        }
    }

    pub fn with_defaults(tracker: Tracker) -> Self {
        let mut manager = Self::new(tracker);
        manager.add_value_strategies(default_value_strategies());
        manager
    }

    /// Appends strategies, skipping ids already present. Returns how many were added.
    pub fn add_value_strategies(
        &mut self,
        strategies: impl IntoIterator<Item = ValueStrategy>,
    ) -> usize {
        let mut added = 0;
        for strategy in strategies {
            if self.strategies.iter().any(|known| known.id == strategy.id) {
                self.tracker.internal_info(
                    SOURCE,
                    format!("value strategy `{}` already registered", strategy.id),
                );
                continue;
            }
            self.strategies.push(strategy);
            added += 1;
        }
        added
    }

    pub fn strategy_for(&self, field_type: FieldType) -> Option<&ValueStrategy> {
        self.strategies
            .iter()
            .find(|strategy| strategy.handles(field_type))
    }

    /// `None` when no strategy handles the field's type.
    pub fn get_value(&self, field: &FieldState, purpose: ValuePurpose) -> Option<FieldValue> {
        match self.strategy_for(field.field_type) {
            Some(strategy) => (strategy.getter)(field, purpose),
            None => {
                self.tracker.internal_warning(
                    SOURCE,
                    FormularError::NoValueStrategy(field.field_type).to_string(),
                );
                None
            }
        }
    }

    /// Writes `value` through the type's strategy and refreshes the dirty
    /// flags. A failed write leaves the field untouched and returns `false`.
    pub fn set_value(&self, field: &mut FieldState, value: FieldValue) -> bool {
        let Some(strategy) = self.strategy_for(field.field_type) else {
            self.tracker.internal_warning(
                SOURCE,
                FormularError::NoValueStrategy(field.field_type).to_string(),
            );
            return false;
        };
        match (strategy.setter)(field, value) {
            Ok(()) => {
                field.refresh_dirty();
                true
            }
            Err(err) => {
                self.tracker.internal_warning(SOURCE, err.to_string());
                false
            }
        }
    }

    /// Reads the native element's property for the field's strategy and
    /// writes it through [`ValueManager::set_value`].
    pub fn set_value_from_html_element(&self, field: &mut FieldState, dom: &dyn DomManager) -> bool {
        let Some(element) = dom.get(&field.id) else {
            self.tracker.internal_warning(
                SOURCE,
                format!("no element registered for field `{}`", field.id),
            );
            return false;
        };
        let Some(strategy) = self.strategy_for(field.field_type) else {
            self.tracker.internal_warning(
                SOURCE,
                FormularError::NoValueStrategy(field.field_type).to_string(),
            );
            return false;
        };
        let raw = match strategy.field_value_property {
            ValueProperty::Checked => FieldValue::Bool(element.checked),
            ValueProperty::Value => FieldValue::Text(element.value.clone()),
            ValueProperty::SelectedOption => match &element.selected {
                Some(id) => FieldValue::Text(id.clone()),
                None => FieldValue::Empty,
            },
        };
        self.set_value(field, raw)
    }

    /// The string view used for display and rule comparisons. Dates use the
    /// canonical `yyyy/mm/dd` form, options show their text.
    pub fn get_as_string(&self, field: &FieldState) -> String {
        match field.field_type.category() {
            ValueCategory::Option => field
                .selected_option()
                .map(|option| option.text.clone())
                .unwrap_or_default(),
            ValueCategory::Date => match &field.value {
                FieldValue::Date(_) => field.value.to_string(),
                _ => String::new(),
            },
            _ => self
                .get_value(field, ValuePurpose::Display)
                .map(|value| value.to_string())
                .unwrap_or_default(),
        }
    }
}
