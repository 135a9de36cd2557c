//! One form control: state, collaborators and the notifier that drives it.
//!
//! A [`Field`] pairs a [`FieldCore`] (everything the handlers mutate) with a
//! [`NotificationManager`] whose context is that core. Built-in handlers are
//! ordinary notifiers registered at construction; follow-up work they request
//! (a debounced validation, a chained change notification) is queued as a
//! [`FieldEffect`] and applied by the field once the current delivery returns.

pub(crate) mod convert;
mod dom;
mod flags;
mod handlers;
mod style;
mod value;

use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::domain::{FieldDescriptor, FieldOption, FieldType};
use crate::error::{FormularError, Result};
use crate::events::{EventTag, Payload, create_event};
use crate::form::options::FormularOptions;
use crate::form::validation::{
    ValidationManager, ValidationResult, ValidationSummary, compile_patterns,
};
use crate::form::values::{ValueManager, ValuePurpose};
use crate::notify::{Notifier, NotificationManager, QueuedNotification, Subscriber};
use crate::tracking::Tracker;

pub use dom::{DomElement, DomManager, MemoryDom};
pub use flags::{FieldFlags, FieldState};
pub use style::{Drawer, OpenState, StyleFlags};
pub use value::FieldValue;

pub type BeforeValidationHook = Rc<dyn Fn(&FieldState) -> bool>;
pub type AfterValidationHook = Rc<dyn Fn(&FieldState)>;

/// Chained notifications deeper than this are dropped with an error record.
const MAX_EFFECT_ROUNDS: usize = 16;

/// Follow-up work requested by a handler.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldEffect {
    Notify(EventTag, Payload),
    Debounce(EventTag, Payload),
    Cancel(EventTag),
}

/// The mutable half of a field, handed to every notifier method.
pub struct FieldCore {
    pub(crate) state: FieldState,
    pub(crate) values: Rc<ValueManager>,
    pub(crate) validation: Option<Rc<ValidationManager>>,
    pub(crate) dom: Box<dyn DomManager>,
    pub(crate) drawer: Option<Drawer>,
    pub(crate) debounce_delay: Duration,
    pub(crate) validate_after_first_submit: bool,
    pub(crate) submitted: bool,
    pub(crate) before_validation: Option<BeforeValidationHook>,
    pub(crate) after_validation: Option<AfterValidationHook>,
    pub(crate) effects: Vec<FieldEffect>,
    pub(crate) tracker: Tracker,
    source: String,
}

impl fmt::Debug for FieldCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCore")
            .field("state", &self.state)
            .field("dom", &self.dom)
            .field("drawer", &self.drawer)
            .field("has_validation", &self.validation.is_some())
            .field("submitted", &self.submitted)
            .finish_non_exhaustive()
    }
}

impl FieldCore {
    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub fn dom(&self) -> &dyn DomManager {
        self.dom.as_ref()
    }

    pub fn drawer(&self) -> Option<&Drawer> {
        self.drawer.as_ref()
    }

    pub fn values(&self) -> &ValueManager {
        &self.values
    }

    /// Runs one guarded validation pass. `None` when a guard interrupted it.
    pub(crate) fn run_validation(&mut self) -> Option<ValidationSummary> {
        let Some(manager) = self.validation.clone() else {
            self.tracker.internal_warning(
                &self.source,
                format!("field `{}` has no validation manager", self.state.id),
            );
            return None;
        };
        if let Some(hook) = self.before_validation.clone() {
            if !hook(&self.state) {
                self.tracker
                    .internal_info(&self.source, "validation interrupted by before hook");
                return None;
            }
        }
        if self.validate_after_first_submit && !self.submitted {
            return None;
        }
        let summary = manager.validate_many([&mut *self], false);
        if let Some(hook) = self.after_validation.clone() {
            hook(&self.state);
        }
        self.refresh_style();
        Some(summary)
    }

    pub(crate) fn reset_validation(&mut self) {
        match self.validation.clone() {
            Some(manager) => {
                manager.validate_many([&mut *self], true);
            }
            None => self.state.clear_validation_results(),
        }
        self.refresh_style();
    }

    /// Queues a debounced validation when `tag` is one of the field's triggers.
    pub(crate) fn schedule_validation(&mut self, tag: EventTag) {
        let triggered = self.state.trigger_mode.contains(&tag)
            || (matches!(tag, EventTag::OnSelect | EventTag::OnClick)
                && self.state.trigger_mode.contains(&EventTag::OnChange));
        if triggered && self.state.should_validate {
            self.effects
                .push(FieldEffect::Debounce(EventTag::OnValidate, Payload::Empty));
        }
    }

    /// Pushes the current value out to the native element.
    pub(crate) fn sync_dom_value(&mut self) {
        let id = self.state.id.clone();
        let found = if self.state.field_type.is_option_based() {
            let selected = self.state.value.as_choice().map(str::to_string);
            let found = self.dom.set_selected(&id, selected.as_deref());
            if self.state.field_type.is_checkable() {
                self.dom.set_checked(&id, selected.is_some());
            }
            found
        } else if self.state.field_type.is_checkable() {
            let checked = self.state.value.as_bool().unwrap_or(false);
            self.dom.set_checked(&id, checked)
        } else {
            let text = self.values.get_as_string(&self.state);
            self.dom.set_value(&id, &text)
        };
        if !found {
            self.tracker
                .internal_warning(&self.source, format!("no element registered for `{id}`"));
        }
    }

    pub(crate) fn style_flags(&self) -> StyleFlags {
        StyleFlags::from_state(&self.state.flags, self.drawer.as_ref())
    }

    /// Pushes classes and aria attributes derived from the flags.
    pub(crate) fn refresh_style(&mut self) {
        let id = self.state.id.clone();
        let classes = self.style_flags().classes();
        self.dom.set_class(&id, &classes);
        let mut aria = vec![
            ("aria-invalid", (!self.state.flags.is_valid).to_string()),
            ("aria-required", self.state.flags.required.to_string()),
        ];
        if let Some(drawer) = &self.drawer {
            aria.push(("aria-expanded", drawer.is_open().to_string()));
        }
        self.dom.update_aria(&id, &aria);
    }
}

/// Serializable view of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSnapshot {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: Value,
    pub display: String,
    pub flags: FieldFlags,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_results: Vec<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_state: Option<OpenState>,
}

#[derive(Debug)]
pub struct Field {
    core: FieldCore,
    notifier: NotificationManager<FieldCore>,
}

impl Field {
    /// Builds a field backed by an in-memory DOM.
    pub fn new(descriptor: FieldDescriptor, options: &FormularOptions) -> Result<Self> {
        Self::with_dom(descriptor, options, Box::new(MemoryDom::new()))
    }

    /// Builds a field over `dom`. Fails when the descriptor lacks an id or a name.
    pub fn with_dom(
        descriptor: FieldDescriptor,
        options: &FormularOptions,
        dom: Box<dyn DomManager>,
    ) -> Result<Self> {
        let id = descriptor
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or(FormularError::MissingDescriptorField("id"))?;
        let name = descriptor
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or(FormularError::MissingDescriptorField("name"))?;

        let mut core = initialize_properties(&descriptor, id, name, options, dom);
        initialize_validation(&mut core, options);
        initialize_value_strategy(&mut core, &descriptor, options);

        let mut field = Self {
            notifier: wire_notifiers(&core, options),
            core,
        };
        field.seed_checked();
        field.mark_required();
        Ok(field)
    }

    pub fn id(&self) -> &str {
        &self.core.state.id
    }

    pub fn name(&self) -> &str {
        &self.core.state.name
    }

    pub fn field_type(&self) -> FieldType {
        self.core.state.field_type
    }

    pub fn state(&self) -> &FieldState {
        &self.core.state
    }

    pub fn flags(&self) -> &FieldFlags {
        &self.core.state.flags
    }

    pub fn core(&self) -> &FieldCore {
        &self.core
    }

    /// Direct access for batch validation through a shared
    /// [`ValidationManager`].
    pub fn core_mut(&mut self) -> &mut FieldCore {
        &mut self.core
    }

    pub fn notifier(&self) -> &NotificationManager<FieldCore> {
        &self.notifier
    }

    pub fn value(&self) -> &FieldValue {
        &self.core.state.value
    }

    pub fn original_value(&self) -> &FieldValue {
        &self.core.state.original_value
    }

    pub fn is_valid(&self) -> bool {
        self.core.state.flags.is_valid
    }

    pub fn is_dirty(&self) -> bool {
        self.core.state.flags.is_dirty
    }

    pub fn is_pristine(&self) -> bool {
        self.core.state.flags.is_pristine
    }

    pub fn is_focus(&self) -> bool {
        self.core.state.flags.is_focus
    }

    pub fn is_busy(&self) -> bool {
        self.core.state.flags.is_busy
    }

    pub fn has_errors(&self) -> bool {
        self.core.state.flags.has_errors
    }

    pub fn is_enabled(&self) -> bool {
        self.core.state.flags.enabled
    }

    pub fn drawer(&self) -> Option<&Drawer> {
        self.core.drawer.as_ref()
    }

    pub fn dom(&self) -> &dyn DomManager {
        self.core.dom.as_ref()
    }

    pub fn accept(&mut self, notifier: Notifier<FieldCore>) -> bool {
        self.notifier.accept(notifier)
    }

    /// Registers `method` for `tag` under `id`.
    pub fn listen<F>(&mut self, id: impl Into<String>, tag: EventTag, method: F) -> bool
    where
        F: Fn(&mut FieldCore, &Payload) -> anyhow::Result<()> + 'static,
    {
        let id = id.into();
        let event = create_event(self.name(), id.clone(), &[tag], "listen");
        self.notifier.accept(Notifier::new(id, event, method))
    }

    pub fn remove_notifier(&mut self, id: &str) -> bool {
        self.notifier.remove(id).is_some()
    }

    pub fn subscribe(&mut self, subscriber: &Subscriber, use_weak: bool) {
        self.notifier.subscribe(subscriber, use_weak);
    }

    pub fn un_subscribe(&mut self, subscriber: &Subscriber, for_weak: bool) -> bool {
        self.notifier.un_subscribe(subscriber, for_weak)
    }

    pub fn notify(&mut self, tag: EventTag, data: &Payload) -> usize {
        let delivered = self.notifier.notify(&mut self.core, tag, data);
        delivered + self.drain_effects()
    }

    pub fn debounce_notify(&mut self, tag: EventTag, delay: Duration, data: Payload) -> bool {
        self.notifier.debounce_notify(tag, delay, data)
    }

    pub fn is_debounce_pending(&self, tag: EventTag) -> bool {
        self.notifier.is_debounce_pending(tag)
    }

    pub fn queue_notification(&mut self, item: QueuedNotification) -> usize {
        let delivered = self.notifier.queue_notification(&mut self.core, item);
        delivered + self.drain_effects()
    }

    pub fn batch_notify(&mut self, items: Vec<QueuedNotification>) -> usize {
        let delivered = self.notifier.batch_notify(&mut self.core, items);
        delivered + self.drain_effects()
    }

    pub fn schedule_batch(&mut self) -> usize {
        let delivered = self.notifier.schedule_batch(&mut self.core);
        delivered + self.drain_effects()
    }

    /// Delivers everything pending now, including work the flush itself
    /// schedules.
    pub fn flush_pending_notifications(&mut self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_EFFECT_ROUNDS {
            let round = self.notifier.flush_pending_notifications(&mut self.core);
            delivered += round + self.drain_effects();
            if self.notifier.next_deadline().is_none() {
                break;
            }
        }
        delivered
    }

    /// Performs due timer work against the field's clock.
    pub fn tick(&mut self) -> usize {
        let delivered = self.notifier.poll(&mut self.core);
        delivered + self.drain_effects()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.notifier.next_deadline()
    }

    pub fn dispose(&mut self) {
        self.notifier.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.notifier.is_disposed()
    }

    /// Writes `value` and notifies `onChange`. Returns `false` when the value
    /// cannot be represented by the field's type.
    pub fn set_value(&mut self, value: impl Into<FieldValue>) -> bool {
        if !self.core.values.set_value(&mut self.core.state, value.into()) {
            return false;
        }
        self.core.sync_dom_value();
        let payload = Payload::Value(self.core.state.value.clone());
        self.notify(EventTag::OnChange, &payload);
        true
    }

    pub fn get_value(&self, purpose: ValuePurpose) -> Option<FieldValue> {
        self.core.values.get_value(&self.core.state, purpose)
    }

    pub fn get_as_string(&self) -> String {
        self.core.values.get_as_string(&self.core.state)
    }

    /// Mirrors a native `input` event: the element's value is replaced by
    /// `raw` and re-read through the value strategy.
    pub fn handle_change(&mut self, raw: &str) -> bool {
        if !self.accepts_dom_events("change") {
            return false;
        }
        let id = self.core.state.id.clone();
        let written = if self.field_type().is_option_based() {
            self.core.dom.set_selected(&id, Some(raw))
        } else if self.field_type().is_checkable() {
            let checked = convert::parse_bool(raw).unwrap_or(false);
            self.core.dom.set_checked(&id, checked)
        } else {
            self.core.dom.set_value(&id, raw)
        };
        if !written {
            return false;
        }
        // Rejected input never reaches listeners; the element gets the old value back.
        let core = &mut self.core;
        if !core.values.set_value_from_html_element(&mut core.state, core.dom.as_ref()) {
            core.sync_dom_value();
            return false;
        }
        let event = create_event(self.name(), "formular.field.input", &[EventTag::OnChange], "input")
            .with_target(id);
        self.notify(EventTag::OnChange, &Payload::Event(event));
        true
    }

    pub fn focus(&mut self) {
        if self.accepts_dom_events("focus") {
            self.notify(EventTag::OnFocus, &Payload::Empty);
        }
    }

    pub fn blur(&mut self) {
        if self.accepts_dom_events("blur") {
            self.notify(EventTag::OnBlur, &Payload::Empty);
        }
    }

    pub fn click(&mut self) {
        if self.accepts_dom_events("click") {
            self.notify(EventTag::OnClick, &Payload::Empty);
        }
    }

    pub fn clear(&mut self) {
        self.notify(EventTag::OnClear, &Payload::Empty);
    }

    pub fn select_item(&mut self, option: &FieldOption) -> bool {
        if !self.accepts_dom_events("select") {
            return false;
        }
        self.notify(EventTag::OnSelect, &Payload::Option(option.clone()));
        self.value().as_choice() == Some(option.id.as_str())
    }

    /// Selects by option id, falling back to value and sequence id.
    pub fn select_by_id(&mut self, key: &str) -> bool {
        let state = &self.core.state;
        let option = state
            .option_by_id(key)
            .or_else(|| state.option_by_value(key))
            .or_else(|| {
                key.parse::<usize>()
                    .ok()
                    .and_then(|sequence_id| state.option_by_sequence_id(sequence_id))
            })
            .cloned();
        match option {
            Some(option) => self.select_item(&option),
            None => {
                self.core.tracker.internal_warning(
                    &self.core.source,
                    FormularError::OptionNotFound {
                        field: self.core.state.id.clone(),
                        key: key.to_string(),
                    }
                    .to_string(),
                );
                false
            }
        }
    }

    /// Runs a guarded validation pass now and returns the resulting validity.
    pub fn validate(&mut self) -> bool {
        self.core.run_validation();
        self.is_valid()
    }

    pub fn reset_validation(&mut self) {
        self.core.reset_validation();
    }

    pub fn set_trigger_mode(&mut self, tags: Vec<EventTag>) {
        self.core.state.trigger_mode = tags;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.core.state.flags.enabled = enabled;
        let id = self.core.state.id.clone();
        self.core.dom.set_enabled(&id, enabled);
        self.core.refresh_style();
    }

    pub fn set_before_validation<F>(&mut self, hook: F)
    where
        F: Fn(&FieldState) -> bool + 'static,
    {
        self.core.before_validation = Some(Rc::new(hook));
    }

    pub fn set_after_validation<F>(&mut self, hook: F)
    where
        F: Fn(&FieldState) + 'static,
    {
        self.core.after_validation = Some(Rc::new(hook));
    }

    pub fn set_validation_manager(&mut self, manager: Option<Rc<ValidationManager>>) {
        self.core.validation = manager;
    }

    pub fn set_validate_after_first_submit(&mut self, enabled: bool) {
        self.core.validate_after_first_submit = enabled;
    }

    pub fn mark_submitted(&mut self) {
        self.core.submitted = true;
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        let state = &self.core.state;
        FieldSnapshot {
            id: state.id.clone(),
            name: state.name.clone(),
            field_type: state.field_type,
            value: self
                .get_value(ValuePurpose::Submission)
                .map(|value| value.to_json())
                .unwrap_or(Value::Null),
            display: self.get_as_string(),
            flags: state.flags,
            validation_results: state.validation_results.clone(),
            open_state: self.core.drawer.map(|drawer| drawer.open_state()),
        }
    }

    fn accepts_dom_events(&self, action: &str) -> bool {
        if self.core.state.flags.enabled {
            return true;
        }
        self.core.tracker.internal_info(
            &self.core.source,
            format!("{action} ignored on disabled field `{}`", self.core.state.id),
        );
        false
    }

    fn drain_effects(&mut self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_EFFECT_ROUNDS {
            let effects = std::mem::take(&mut self.core.effects);
            if effects.is_empty() {
                return delivered;
            }
            for effect in effects {
                match effect {
                    FieldEffect::Notify(tag, payload) => {
                        delivered += self.notifier.notify(&mut self.core, tag, &payload);
                    }
                    FieldEffect::Debounce(tag, payload) => {
                        self.notifier
                            .debounce_notify(tag, self.core.debounce_delay, payload);
                    }
                    FieldEffect::Cancel(tag) => {
                        self.notifier.cancel_debounce(tag);
                    }
                }
            }
        }
        if !self.core.effects.is_empty() {
            self.core.effects.clear();
            self.core.tracker.internal_error(
                &self.core.source,
                format!("field `{}` exceeded {MAX_EFFECT_ROUNDS} chained notifications", self.core.state.id),
            );
        }
        delivered
    }

    fn seed_checked(&mut self) {
        if !self.field_type().is_checkable() {
            return;
        }
        let checked = match &self.core.state.value {
            FieldValue::Bool(flag) => *flag,
            other => !other.is_empty(),
        };
        let id = self.core.state.id.clone();
        self.core.dom.set_checked(&id, checked);
    }

    fn mark_required(&mut self) {
        self.core.state.flags.required = self.core.state.validation_options.is_required();
        self.core.refresh_style();
    }
}

fn initialize_properties(
    descriptor: &FieldDescriptor,
    id: String,
    name: String,
    options: &FormularOptions,
    mut dom: Box<dyn DomManager>,
) -> FieldCore {
    let field_type = descriptor.field_type;
    let flags = FieldFlags {
        enabled: descriptor.enabled,
        ..FieldFlags::default()
    };
    let state = FieldState {
        id: id.clone(),
        name,
        label: descriptor.label.clone(),
        field_type,
        value: FieldValue::Empty,
        original_value: FieldValue::Empty,
        options: descriptor.options.clone(),
        selected_option_id: None,
        validation_results: Vec::new(),
        flags,
        validation_options: descriptor.validation_options.clone(),
        patterns: compile_patterns(&descriptor.validation_options),
        expected_value: descriptor.expected_value.clone(),
        should_validate: descriptor.should_validate,
        mask: descriptor.mask.clone(),
        trigger_mode: options.trigger_mode.clone(),
    };
    if !dom.exists(&id) {
        dom.register(
            &id,
            DomElement {
                enabled: descriptor.enabled,
                ..DomElement::default()
            },
        );
    }
    FieldCore {
        state,
        values: Rc::new(ValueManager::new(options.tracker.clone())),
        validation: None,
        dom,
        drawer: field_type.is_option_based().then(Drawer::default),
        debounce_delay: options.debounce_delay,
        validate_after_first_submit: options.validate_after_first_submit,
        submitted: false,
        before_validation: None,
        after_validation: None,
        effects: Vec::new(),
        tracker: options.tracker.clone(),
        source: format!("formular.field.{id}"),
    }
}

fn initialize_validation(core: &mut FieldCore, options: &FormularOptions) {
    if !options.validation_enabled {
        return;
    }
    let mut manager = ValidationManager::new(Rc::clone(&options.clock), options.tracker.clone())
        .with_timeout(options.validation_timeout);
    manager.add_validation_strategies(options.validation_strategies.iter().cloned());
    core.validation = Some(Rc::new(manager));
}

fn initialize_value_strategy(
    core: &mut FieldCore,
    descriptor: &FieldDescriptor,
    options: &FormularOptions,
) {
    let mut values = ValueManager::with_defaults(options.tracker.clone());
    values.add_value_strategies(options.value_strategies.iter().cloned());

    let initial = descriptor
        .initial_value()
        .map(FieldValue::from_json)
        .unwrap_or_default();
    if !values.set_value(&mut core.state, initial) {
        let empty = core.state.empty_value();
        values.set_value(&mut core.state, empty);
    }
    core.state.original_value = core.state.value.clone();
    core.state.refresh_dirty();
    core.values = Rc::new(values);
    core.sync_dom_value();
}

fn wire_notifiers(core: &FieldCore, options: &FormularOptions) -> NotificationManager<FieldCore> {
    let state = &core.state;
    let mut manager =
        NotificationManager::new(state.id.clone(), Rc::clone(&options.clock), options.tracker.clone())
            .with_batch_config(options.batch);
    manager.set_auto_tracker(options.auto_tracker.clone());
    for (tag, action, method) in handlers::BUILT_IN {
        let event = create_event(
            state.name.clone(),
            format!("formular.field.{action}"),
            &[tag],
            action,
        );
        manager.accept(Notifier::new(format!("{}:{tag}", state.id), event, method));
    }
    manager
}
