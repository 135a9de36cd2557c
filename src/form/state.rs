use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use super::field::{Field, FieldCore, FieldSnapshot};
use super::options::FormularOptions;
use super::values::ValuePurpose;
use crate::domain::{FieldDescriptor, FormDescriptor};
use crate::error::Result;
use crate::events::{EventTag, Payload, create_event};
use crate::notify::{Notifier, ObservableSubject, Subscriber, SubscriberList};
use crate::tracking::Tracker;

/// Tags after which a field may have changed a form-level flag.
const LINKED_TAGS: [EventTag; 6] = [
    EventTag::OnChange,
    EventTag::OnValidate,
    EventTag::OnClear,
    EventTag::OnSelect,
    EventTag::OnFocus,
    EventTag::OnBlur,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFlags {
    pub is_valid: bool,
    pub is_dirty: bool,
    pub is_busy: bool,
    pub submitted: bool,
}

impl Default for FormFlags {
    fn default() -> Self {
        Self {
            is_valid: true,
            is_dirty: false,
            is_busy: false,
            submitted: false,
        }
    }
}

/// Ids of fields that reported a change since the form last looked.
#[derive(Debug, Default)]
struct ChangeSignal {
    sources: RefCell<Vec<String>>,
}

impl ChangeSignal {
    fn raise(&self, field_id: &str) {
        let mut sources = self.sources.borrow_mut();
        if !sources.iter().any(|id| id == field_id) {
            sources.push(field_id.to_string());
        }
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.sources.borrow_mut())
    }

    fn is_raised(&self) -> bool {
        !self.sources.borrow().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Valid(Map<String, Value>),
    Invalid {
        /// Failing rule results across all fields.
        issues: usize,
        fields: Vec<String>,
    },
}

impl SubmitOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, SubmitOutcome::Valid(_))
    }
}

/// Serializable view of a whole form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub id: String,
    pub flags: FormFlags,
    pub data: Map<String, Value>,
    pub fields: Vec<FieldSnapshot>,
}

/// An ordered set of fields with derived form-level flags.
#[derive(Debug)]
pub struct Formular {
    id: String,
    fields: IndexMap<String, Field>,
    trigger_mode: Vec<EventTag>,
    options: FormularOptions,
    /// Flags as of the last observer notification.
    published: FormFlags,
    changes: Rc<ChangeSignal>,
    observers: ObservableSubject,
    tracker: Tracker,
    source: String,
}

impl Formular {
    pub fn new(id: impl Into<String>, options: FormularOptions) -> Self {
        let id = id.into();
        let source = format!("formular.form.{id}");
        Self {
            observers: ObservableSubject::new(
                source.clone(),
                Rc::clone(&options.clock),
                options.tracker.clone(),
            ),
            trigger_mode: options.trigger_mode.clone(),
            tracker: options.tracker.clone(),
            id,
            fields: IndexMap::new(),
            options,
            published: FormFlags::default(),
            changes: Rc::new(ChangeSignal::default()),
            source,
        }
    }

    /// Builds a form and its fields from a document. The descriptor's options
    /// are laid over `options`.
    pub fn from_descriptor(descriptor: FormDescriptor, options: FormularOptions) -> Result<Self> {
        let options = options.apply_descriptor(&descriptor.options);
        let mut form = Self::new(descriptor.id, options);
        let fields = descriptor
            .fields
            .into_iter()
            .map(|field| form.create_field(field))
            .collect::<Result<Vec<_>>>()?;
        form.add_fields(fields);
        Ok(form)
    }

    /// A field configured with this form's options, not yet added.
    pub fn create_field(&self, descriptor: FieldDescriptor) -> Result<Field> {
        Field::new(descriptor, &self.options)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn options(&self) -> &FormularOptions {
        &self.options
    }

    /// Adds fields whose id is not present yet. Returns how many were added.
    pub fn add_fields(&mut self, fields: impl IntoIterator<Item = Field>) -> usize {
        let mut added = 0;
        for mut field in fields {
            if self.fields.contains_key(field.id()) {
                self.tracker.internal_info(
                    &self.source,
                    format!("field `{}` already belongs to the form", field.id()),
                );
                continue;
            }
            field.set_trigger_mode(self.trigger_mode.clone());
            field.set_validate_after_first_submit(self.options.validate_after_first_submit);
            if self.published.submitted {
                field.mark_submitted();
            }
            self.link_field(&mut field);
            self.fields.insert(field.id().to_string(), field);
            added += 1;
        }
        if added > 0 {
            self.check_changes();
        }
        added
    }

    pub fn remove_field(&mut self, id: &str) -> Option<Field> {
        let mut field = self.fields.shift_remove(id)?;
        field.remove_notifier(&self.link_id());
        self.check_changes();
        Some(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn field_by_id(&self, id: &str) -> Option<&Field> {
        self.fields.get(id)
    }

    pub fn field_by_id_mut(&mut self, id: &str) -> Option<&mut Field> {
        self.fields.get_mut(id)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.values().find(|field| field.name() == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.values_mut().find(|field| field.name() == name)
    }

    /// Runs `update` on the named field and refreshes the form flags.
    pub fn update_field<R>(&mut self, name: &str, update: impl FnOnce(&mut Field) -> R) -> Option<R> {
        let result = update(self.field_mut(name)?);
        self.check_changes();
        Some(result)
    }

    pub fn trigger_mode(&self) -> &[EventTag] {
        &self.trigger_mode
    }

    /// Applies `tags` to every field and re-links each one to the form.
    pub fn set_validation_trigger_mode(&mut self, tags: impl Into<Vec<EventTag>>) {
        self.trigger_mode = tags.into();
        self.options.trigger_mode = self.trigger_mode.clone();
        let link_id = self.link_id();
        let mut fields = std::mem::take(&mut self.fields);
        for field in fields.values_mut() {
            field.set_trigger_mode(self.trigger_mode.clone());
            field.remove_notifier(&link_id);
            self.link_field(field);
        }
        self.fields = fields;
    }

    /// Validates every field and returns the aggregate validity.
    pub fn validate(&mut self) -> bool {
        for field in self.fields.values_mut() {
            field.validate();
        }
        self.check_changes();
        self.is_valid()
    }

    /// Marks the form submitted, delivers pending work, then validates.
    pub fn submit(&mut self) -> SubmitOutcome {
        self.published.submitted = true;
        for field in self.fields.values_mut() {
            field.mark_submitted();
            field.flush_pending_notifications();
        }
        if self.validate() {
            self.tracker.internal_info(&self.source, "form submitted");
            return SubmitOutcome::Valid(self.get_data());
        }
        let mut issues = 0;
        let mut fields = Vec::new();
        for field in self.fields.values().filter(|field| !field.is_valid()) {
            issues += field
                .state()
                .validation_results()
                .iter()
                .filter(|result| result.is_failure())
                .count();
            fields.push(field.name().to_string());
        }
        self.tracker.internal_warning(
            &self.source,
            format!("submit rejected: {issues} issue(s) in {}", fields.join(", ")),
        );
        SubmitOutcome::Invalid { issues, fields }
    }

    /// Submission values keyed by field name.
    pub fn get_data(&self) -> Map<String, Value> {
        self.fields
            .values()
            .map(|field| {
                let value = field
                    .get_value(ValuePurpose::Submission)
                    .map(|value| value.to_json())
                    .unwrap_or(Value::Null);
                (field.name().to_string(), value)
            })
            .collect()
    }

    /// Compares the live flags with those observers last saw and triggers the
    /// observers when one differs.
    pub fn check_changes(&mut self) -> bool {
        self.changes.take();
        let next = self.flags();
        if next == self.published {
            return false;
        }
        self.published = next;
        self.observers.trigger();
        true
    }

    /// Runs due work on every field, then folds field changes into the form flags.
    pub fn tick(&mut self) -> usize {
        let delivered: usize = self.fields.values_mut().map(Field::tick).sum();
        self.observers.poll();
        if self.changes.is_raised() || delivered > 0 {
            self.check_changes();
        }
        delivered
    }

    pub fn flush_pending_notifications(&mut self) -> usize {
        let delivered: usize = self
            .fields
            .values_mut()
            .map(Field::flush_pending_notifications)
            .sum();
        self.check_changes();
        delivered
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.fields
            .values()
            .filter_map(Field::next_deadline)
            .chain(self.observers.next_deadline())
            .min()
    }

    /// Form flags derived from the fields as they are now.
    pub fn flags(&self) -> FormFlags {
        FormFlags {
            is_valid: self.is_valid(),
            is_dirty: self.is_dirty(),
            is_busy: self.is_busy(),
            submitted: self.published.submitted,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.fields.values().all(Field::is_valid)
    }

    pub fn is_dirty(&self) -> bool {
        self.fields.values().any(Field::is_dirty)
    }

    pub fn is_busy(&self) -> bool {
        self.fields.values().any(Field::is_busy)
    }

    pub fn is_submitted(&self) -> bool {
        self.published.submitted
    }

    pub fn subscribe(&mut self, subscriber: &Subscriber, use_weak: bool) {
        self.observers.subscribe(subscriber, use_weak);
    }

    pub fn un_subscribe(&mut self, subscriber: &Subscriber, for_weak: bool) -> bool {
        self.observers.un_subscribe(subscriber, for_weak)
    }

    pub fn dispose(&mut self) {
        for field in self.fields.values_mut() {
            field.dispose();
        }
        self.observers.un_subscribe_all(SubscriberList::All);
        self.observers.cancel_pending();
    }

    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            id: self.id.clone(),
            flags: self.flags(),
            data: self.get_data(),
            fields: self.fields.values().map(Field::snapshot).collect(),
        }
    }

    fn link_id(&self) -> String {
        format!("formular:{}:check-changes", self.id)
    }

    fn link_field(&self, field: &mut Field) {
        let mut tags: Vec<EventTag> = LINKED_TAGS.to_vec();
        tags.extend(self.trigger_mode.iter().copied());
        let event = create_event(field.name(), self.source.clone(), &tags, "check-changes");
        let signal = Rc::clone(&self.changes);
        field.accept(Notifier::new(
            self.link_id(),
            event,
            move |core: &mut FieldCore, _: &Payload| {
                signal.raise(core.state().id());
                Ok(())
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;
    use crate::domain::{FieldType, ValidationOptions};
    use crate::time::ManualClock;

    fn options(clock: &ManualClock) -> FormularOptions {
        FormularOptions::default()
            .with_clock(clock.shared())
            .with_tracker(Tracker::new())
    }

    fn form(clock: &ManualClock) -> Formular {
        let mut form = Formular::new("signup", options(clock));
        let name = form
            .create_field(
                FieldDescriptor::new("1", "name").with_validation(ValidationOptions::required()),
            )
            .unwrap();
        let age = form
            .create_field(
                FieldDescriptor::new("2", "age")
                    .with_type(FieldType::Number)
                    .with_value(json!(30)),
            )
            .unwrap();
        assert_eq!(form.add_fields([name, age]), 2);
        form
    }

    #[test]
    fn duplicate_field_ids_are_skipped() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        let again = form.create_field(FieldDescriptor::new("1", "other")).unwrap();
        assert_eq!(form.add_fields([again]), 0);
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn aggregate_validity_follows_fields() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        assert!(!form.validate());
        form.update_field("name", |field| field.set_value("Ada"));
        assert!(form.validate());
    }

    #[test]
    fn debounced_validation_reaches_form_flags() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        let renders = Rc::new(Cell::new(0));
        let seen = Rc::clone(&renders);
        let subscriber: Subscriber = Rc::new(move || seen.set(seen.get() + 1));
        form.subscribe(&subscriber, false);

        form.field_mut("name").unwrap().set_value("x");
        form.field_mut("name").unwrap().set_value("");
        clock.advance_ms(500);
        form.tick();
        assert!(!form.is_valid());
        assert!(!form.is_dirty());
        assert!(renders.get() >= 1);
    }

    #[test]
    fn submit_reports_invalid_fields() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        match form.submit() {
            SubmitOutcome::Invalid { issues, fields } => {
                assert_eq!(issues, 1);
                assert_eq!(fields, vec!["name".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        form.update_field("name", |field| field.set_value("Ada"));
        let outcome = form.submit();
        assert_eq!(
            outcome,
            SubmitOutcome::Valid(
                json!({"name": "Ada", "age": 30})
                    .as_object()
                    .unwrap()
                    .clone()
            )
        );
    }

    #[test]
    fn validation_waits_for_first_submit() {
        let clock = ManualClock::new();
        let mut form = Formular::new(
            "late",
            options(&clock).with_validate_after_first_submit(true),
        );
        let name = form
            .create_field(
                FieldDescriptor::new("1", "name").with_validation(ValidationOptions::required()),
            )
            .unwrap();
        form.add_fields([name]);
        assert!(form.validate());
        assert!(!form.submit().is_valid());
    }

    #[test]
    fn trigger_mode_propagates_and_relinks() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        form.set_validation_trigger_mode([EventTag::OnBlur]);
        let name = form.field("name").unwrap();
        assert_eq!(name.state().trigger_mode(), &[EventTag::OnBlur]);
        let link = name.notifier().get("formular:signup:check-changes").unwrap();
        assert!(link.event().handles(EventTag::OnBlur));

        form.field_mut("name").unwrap().blur();
        form.tick();
        assert!(!form.is_valid());
    }
}
