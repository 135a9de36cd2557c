//! Field lifecycle vocabulary: event tags, immutable event records and the
//! payloads carried by notifications.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::FieldOption;
use crate::form::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum EventTag {
    OnChange,
    OnBlur,
    OnFocus,
    OnClick,
    OnSelect,
    OnValidate,
    OnClear,
    OnKeyDown,
    OnKeyUp,
    OnSubmit,
    OnRegister,
    OnCheckChanges,
}

impl EventTag {
    pub fn as_str(self) -> &'static str {
        match self {
            EventTag::OnChange => "onChange",
            EventTag::OnBlur => "onBlur",
            EventTag::OnFocus => "onFocus",
            EventTag::OnClick => "onClick",
            EventTag::OnSelect => "onSelect",
            EventTag::OnValidate => "onValidate",
            EventTag::OnClear => "onClear",
            EventTag::OnKeyDown => "onKeyDown",
            EventTag::OnKeyUp => "onKeyUp",
            EventTag::OnSubmit => "onSubmit",
            EventTag::OnRegister => "onRegister",
            EventTag::OnCheckChanges => "onCheckChanges",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened and why. Built once by [`create_event`] and never mutated.
///
/// `emitter_name` tells apart several handlers reacting to the same tag on the
/// same field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    field_name: String,
    emitter_name: String,
    types: Vec<EventTag>,
    action: String,
    target: Option<String>,
}

impl Event {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn emitter_name(&self) -> &str {
        &self.emitter_name
    }

    pub fn types(&self) -> &[EventTag] {
        &self.types
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn handles(&self, tag: EventTag) -> bool {
        self.types.contains(&tag)
    }

    pub fn with_target(self, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..self
        }
    }
}

pub fn create_event(
    field_name: impl Into<String>,
    emitter_name: impl Into<String>,
    types: &[EventTag],
    action: impl Into<String>,
) -> Event {
    let mut unique = Vec::with_capacity(types.len());
    for tag in types {
        if !unique.contains(tag) {
            unique.push(*tag);
        }
    }
    Event {
        field_name: field_name.into(),
        emitter_name: emitter_name.into(),
        types: unique,
        action: action.into(),
        target: None,
    }
}

/// Data handed to notifier methods.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Value(FieldValue),
    Option(FieldOption),
    Event(Event),
    /// Several payloads delivered together by a batch flush, in arrival order.
    Group(Vec<Payload>),
}

impl Payload {
    /// The payload that wins under last-write-wins: the last member of a group,
    /// otherwise the payload itself.
    pub fn latest(&self) -> &Payload {
        match self {
            Payload::Group(items) => items.last().map_or(self, Payload::latest),
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Group(items) => items.is_empty(),
            _ => false,
        }
    }
}
