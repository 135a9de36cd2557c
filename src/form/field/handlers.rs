use anyhow::{anyhow, bail};

use super::{FieldCore, FieldEffect, FieldValue};
use crate::events::{EventTag, Payload};

pub(super) type Handler = fn(&mut FieldCore, &Payload) -> anyhow::Result<()>;

/// Notifiers every field registers, in registration order.
pub(super) const BUILT_IN: [(EventTag, &str, Handler); 7] = [
    (EventTag::OnChange, "change", on_change),
    (EventTag::OnFocus, "focus", on_focus),
    (EventTag::OnBlur, "blur", on_blur),
    (EventTag::OnClick, "click", on_click),
    (EventTag::OnSelect, "select", on_select),
    (EventTag::OnClear, "clear", on_clear),
    (EventTag::OnValidate, "validate", on_validate),
];

fn on_change(core: &mut FieldCore, payload: &Payload) -> anyhow::Result<()> {
    // Native events carry no value; the element is the source of truth.
    if let Payload::Event(_) = payload.latest() {
        if !core.values.set_value_from_html_element(&mut core.state, core.dom.as_ref()) {
            bail!("`{}` could not read its element", core.state.id);
        }
    }
    core.sync_dom_value();
    core.refresh_style();
    core.schedule_validation(EventTag::OnChange);
    Ok(())
}

fn on_focus(core: &mut FieldCore, _payload: &Payload) -> anyhow::Result<()> {
    set_focus(core, true);
    if core.state.trigger_mode.contains(&EventTag::OnFocus) && core.state.should_validate {
        core.run_validation();
    }
    Ok(())
}

fn on_blur(core: &mut FieldCore, _payload: &Payload) -> anyhow::Result<()> {
    if let Some(drawer) = core.drawer.as_mut() {
        drawer.close();
    }
    set_focus(core, false);
    if core.state.trigger_mode.contains(&EventTag::OnBlur) && core.state.should_validate {
        core.run_validation();
    }
    Ok(())
}

fn set_focus(core: &mut FieldCore, focused: bool) {
    core.state.flags.is_focus = focused;
    let id = core.state.id.clone();
    core.dom.set_focus(&id, focused);
    core.refresh_style();
}

fn on_click(core: &mut FieldCore, _payload: &Payload) -> anyhow::Result<()> {
    if core.state.field_type.is_option_based() {
        if let Some(drawer) = core.drawer.as_mut() {
            drawer.toggle();
        }
        core.refresh_style();
        return Ok(());
    }
    if core.state.field_type.is_checkable() {
        let next = FieldValue::Bool(!core.state.value.as_bool().unwrap_or(false));
        if !core.values.set_value(&mut core.state, next.clone()) {
            bail!("`{}` rejected its toggled value", core.state.id);
        }
        core.effects
            .push(FieldEffect::Notify(EventTag::OnChange, Payload::Value(next)));
    }
    Ok(())
}

fn on_select(core: &mut FieldCore, payload: &Payload) -> anyhow::Result<()> {
    let key = match payload.latest() {
        Payload::Option(option) => {
            if option.disabled {
                bail!("option `{}` is disabled", option.id);
            }
            option.id.clone()
        }
        Payload::Value(value) => value.to_string(),
        Payload::Event(event) => event
            .target()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("select event without target"))?,
        other => bail!("cannot select from {other:?}"),
    };
    if !core
        .values
        .set_value(&mut core.state, FieldValue::Choice(key.clone()))
    {
        bail!("`{}` has no option `{key}`", core.state.id);
    }
    if let Some(drawer) = core.drawer.as_mut() {
        drawer.close();
    }
    core.sync_dom_value();
    core.refresh_style();
    core.schedule_validation(EventTag::OnSelect);
    Ok(())
}

fn on_clear(core: &mut FieldCore, _payload: &Payload) -> anyhow::Result<()> {
    let empty = core.state.empty_value();
    core.values.set_value(&mut core.state, empty);
    core.state.clear_validation_results();
    let id = core.state.id.clone();
    core.dom.clear(&id);
    core.effects.push(FieldEffect::Cancel(EventTag::OnValidate));
    core.refresh_style();
    Ok(())
}

fn on_validate(core: &mut FieldCore, _payload: &Payload) -> anyhow::Result<()> {
    core.run_validation();
    Ok(())
}
