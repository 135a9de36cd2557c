use serde::Serialize;

use super::flags::FieldFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OpenState {
    Open,
    #[default]
    Closed,
}

/// Open/closed state of the option list attached to option-based fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Drawer {
    open_state: OpenState,
}

impl Drawer {
    pub fn open_state(&self) -> OpenState {
        self.open_state
    }

    pub fn is_open(&self) -> bool {
        self.open_state == OpenState::Open
    }

    pub fn open(&mut self) {
        self.open_state = OpenState::Open;
    }

    pub fn close(&mut self) {
        self.open_state = OpenState::Closed;
    }

    pub fn toggle(&mut self) {
        self.open_state = match self.open_state {
            OpenState::Open => OpenState::Closed,
            OpenState::Closed => OpenState::Open,
        };
    }
}

/// Presentation flags derived from field state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StyleFlags {
    pub has_errors: bool,
    pub is_dirty: bool,
    pub is_focus: bool,
    pub is_busy: bool,
    pub is_disabled: bool,
    pub is_required: bool,
    pub is_open: bool,
}

impl StyleFlags {
    pub fn from_state(flags: &FieldFlags, drawer: Option<&Drawer>) -> Self {
        Self {
            has_errors: flags.has_errors,
            is_dirty: flags.is_dirty,
            is_focus: flags.is_focus,
            is_busy: flags.is_busy,
            is_disabled: !flags.enabled,
            is_required: flags.required,
            is_open: drawer.is_some_and(Drawer::is_open),
        }
    }

    pub fn classes(&self) -> Vec<String> {
        let mut classes = vec!["formular-field".to_string()];
        let toggles = [
            (self.has_errors, "has-errors"),
            (self.is_dirty, "is-dirty"),
            (!self.is_dirty, "is-pristine"),
            (self.is_focus, "is-focus"),
            (self.is_busy, "is-busy"),
            (self.is_disabled, "is-disabled"),
            (self.is_required, "is-required"),
            (self.is_open, "is-open"),
        ];
        classes.extend(
            toggles
                .into_iter()
                .filter(|(on, _)| *on)
                .map(|(_, class)| class.to_string()),
        );
        classes
    }
}
