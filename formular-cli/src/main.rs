use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};
use color_eyre::eyre::{Report, Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use formular::io::emit;
use formular::{
    Clock, DocumentFormat, FieldValue, FormDescriptor, FormSnapshot, Formular, FormularError,
    FormularOptions, ManualClock, OutputDestination, OutputOptions, SubmitOutcome,
    descriptor_schema, parse_document_str,
};

#[derive(Debug, Parser)]
#[command(
    name = "formular",
    version,
    about = "Replay field events against a form descriptor and print the resulting state"
)]
struct Cli {
    /// Form descriptor spec: file path, inline payload, or "-" for stdin
    #[arg(short = 'f', long = "form", value_name = "SPEC", required_unless_present = "print_schema")]
    form: Option<String>,

    /// Event script spec: file path, inline payload, or "-" for stdin
    #[arg(short = 'e', long = "events", value_name = "SPEC")]
    events: Option<String>,

    /// Print the JSON Schema of the descriptor format and exit
    #[arg(long = "print-schema")]
    print_schema: bool,

    /// Output destinations ("-" writes to stdout). Defaults to stdout.
    #[arg(short = 'o', long = "output", value_name = "DEST", num_args = 1.., action = ArgAction::Append)]
    outputs: Vec<String>,

    /// Emit compact JSON/TOML rather than pretty formatting
    #[arg(long = "no-pretty")]
    no_pretty: bool,

    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

/// One scripted interaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum Step {
    Set { field: String, value: Value },
    Input { field: String, value: String },
    Focus { field: String },
    Blur { field: String },
    Click { field: String },
    Clear { field: String },
    Select { field: String, option: String },
    Validate { field: Option<String> },
    Wait { ms: u64 },
    Flush,
    Submit,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Script {
    Steps(Vec<Step>),
    Wrapped { steps: Vec<Step> },
}

impl Script {
    fn into_steps(self) -> Vec<Step> {
        match self {
            Script::Steps(steps) | Script::Wrapped { steps } => steps,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReport {
    valid: bool,
    issues: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
}

impl From<SubmitOutcome> for SubmitReport {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Valid(data) => Self {
                valid: true,
                issues: 0,
                fields: Vec::new(),
                data: Some(data),
            },
            SubmitOutcome::Invalid { issues, fields } => Self {
                valid: false,
                issues,
                fields,
                data: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayReport {
    steps: usize,
    elapsed_ms: u64,
    form: FormSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    submit: Option<SubmitReport>,
}

#[derive(Debug)]
enum InputSource {
    File(PathBuf),
    Stdin,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut diagnostics = DiagnosticCollector::default();
    let output = build_output_options(&cli, &mut diagnostics);

    if cli.print_schema {
        diagnostics.into_result()?;
        emit(&descriptor_schema(), &output).map_err(|err| eyre!("{err:#}"))?;
        return Ok(());
    }

    let form_spec = cli.form.as_deref();
    let events_spec = cli.events.as_deref();
    if form_spec == Some("-") && events_spec == Some("-") {
        diagnostics.push_input(
            "form/events",
            "cannot read form and events from stdin simultaneously; provide inline content or files",
        );
        diagnostics.into_result()?;
    }

    let form_value = load_optional_value(form_spec, "form", &mut diagnostics);
    let events_value = load_optional_value(events_spec, "events", &mut diagnostics);
    diagnostics.into_result()?;

    let form_value = form_value.ok_or_else(|| eyre!("provide --form"))?;
    let descriptor: FormDescriptor =
        serde_json::from_value(form_value).wrap_err("invalid form descriptor")?;
    let steps = match events_value {
        Some(value) => serde_json::from_value::<Script>(value)
            .wrap_err("invalid event script")?
            .into_steps(),
        None => Vec::new(),
    };

    let clock = ManualClock::new();
    let options = FormularOptions::default().with_clock(clock.shared());
    let mut form = Formular::from_descriptor(descriptor, options)?;
    let report = replay(&mut form, &clock, &steps)?;
    emit(&report, &output).map_err(|err| eyre!("{err:#}"))?;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn replay(form: &mut Formular, clock: &ManualClock, steps: &[Step]) -> Result<ReplayReport> {
    let mut submit = None;
    for step in steps {
        match step {
            Step::Set { field, value } => {
                with_field(form, field, |target| {
                    target.set_value(FieldValue::from_json(value));
                })?;
            }
            Step::Input { field, value } => {
                with_field(form, field, |target| {
                    target.handle_change(value);
                })?;
            }
            Step::Focus { field } => with_field(form, field, |target| target.focus())?,
            Step::Blur { field } => with_field(form, field, |target| target.blur())?,
            Step::Click { field } => with_field(form, field, |target| target.click())?,
            Step::Clear { field } => with_field(form, field, |target| target.clear())?,
            Step::Select { field, option } => {
                with_field(form, field, |target| {
                    target.select_by_id(option);
                })?;
            }
            Step::Validate { field: Some(field) } => {
                with_field(form, field, |target| {
                    target.validate();
                })?;
            }
            Step::Validate { field: None } => {
                form.validate();
            }
            Step::Wait { ms } => wait(form, clock, Duration::from_millis(*ms)),
            Step::Flush => {
                form.flush_pending_notifications();
            }
            Step::Submit => submit = Some(SubmitReport::from(form.submit())),
        }
    }
    Ok(ReplayReport {
        steps: steps.len(),
        elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        form: form.snapshot(),
        submit,
    })
}

fn with_field(
    form: &mut Formular,
    name: &str,
    apply: impl FnOnce(&mut formular::Field),
) -> Result<()> {
    form.update_field(name, apply)
        .ok_or_else(|| Report::new(FormularError::UnknownField(name.to_string())))
}

/// Advances the clock through every deadline up to `duration` from now,
/// ticking the form at each one.
fn wait(form: &mut Formular, clock: &ManualClock, duration: Duration) {
    let target = clock.now() + duration;
    while let Some(deadline) = form.next_deadline().filter(|deadline| *deadline <= target) {
        let now = clock.now();
        if deadline > now {
            clock.advance(deadline - now);
        }
        if form.tick() == 0 && form.next_deadline() == Some(deadline) {
            break;
        }
    }
    let now = clock.now();
    if target > now {
        clock.advance(target - now);
    }
    form.tick();
}

fn load_optional_value(
    spec: Option<&str>,
    label: &str,
    diagnostics: &mut DiagnosticCollector,
) -> Option<Value> {
    let raw = spec?;
    match load_value(raw, label) {
        Ok(value) => Some(value),
        Err(err) => {
            diagnostics.push_input(label, format!("{err:#}"));
            None
        }
    }
}

fn load_value(spec: &str, label: &str) -> Result<Value> {
    if spec == "-" {
        let contents = read_from_source(&InputSource::Stdin)?;
        return parse_contents(&contents, DocumentFormat::Json, label);
    }

    let trimmed = spec.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return parse_contents(spec, DocumentFormat::Json, &format!("inline {label}"));
    }

    let path = PathBuf::from(spec);
    let format = DocumentFormat::from_path(&path);
    match read_from_source(&InputSource::File(path.clone())) {
        Ok(contents) => parse_contents(&contents, format, label),
        Err(err) => {
            if is_not_found(&err) {
                let inline_label = format!("inline {label}");
                return parse_contents(spec, format, &inline_label);
            }
            Err(err.wrap_err(format!("failed to load {label} from {}", path.display())))
        }
    }
}

fn read_from_source(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .wrap_err("failed to read from stdin")?;
            Ok(buffer)
        }
        InputSource::File(path) => fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read file {}", path.display())),
    }
}

fn is_not_found(err: &Report) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
}

/// Tries `format` first, then every other compiled-in format.
fn parse_contents(contents: &str, format: DocumentFormat, label: &str) -> Result<Value> {
    match parse_document_str(contents, format) {
        Ok(value) => Ok(value),
        Err(primary) => {
            for candidate in DocumentFormat::available() {
                if candidate == format {
                    continue;
                }
                if let Ok(value) = parse_document_str(contents, candidate) {
                    return Ok(value);
                }
            }
            Err(eyre!(
                "failed to parse {label}: tried {} (first error: {primary:#})",
                format_list()
            ))
        }
    }
}

fn format_list() -> String {
    let items: Vec<String> = DocumentFormat::available()
        .into_iter()
        .map(|format| format.to_string())
        .collect();
    items.join(", ")
}

#[derive(Default)]
struct DiagnosticCollector {
    messages: Vec<String>,
}

impl DiagnosticCollector {
    fn push_input(&mut self, label: &str, message: impl Into<String>) {
        self.messages
            .push(format!("input ({label}): {}", message.into()));
    }

    fn push_output(&mut self, message: impl Into<String>) {
        self.messages.push(format!("output: {}", message.into()));
    }

    fn into_result(&mut self) -> Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        let mut body = String::from("encountered input/output issues:\n");
        for (idx, msg) in self.messages.drain(..).enumerate() {
            let _ = writeln!(body, "  {}. {}", idx + 1, msg);
        }
        Err(eyre!(body))
    }
}

fn build_output_options(cli: &Cli, diagnostics: &mut DiagnosticCollector) -> OutputOptions {
    let mut destinations = Vec::new();
    for raw in &cli.outputs {
        if raw.trim().is_empty() {
            diagnostics.push_output("output destination cannot be empty");
        } else if raw == "-" {
            destinations.push(OutputDestination::Stdout);
        } else {
            destinations.push(OutputDestination::file(raw));
        }
    }
    if destinations.is_empty() {
        destinations.push(OutputDestination::Stdout);
    }

    let format = destinations
        .iter()
        .find_map(|destination| match destination {
            OutputDestination::File(path) => Some(output_format(path, diagnostics)),
            OutputDestination::Stdout => None,
        })
        .unwrap_or_default();

    OutputOptions::new(format)
        .with_pretty(!cli.no_pretty)
        .with_destinations(destinations)
}

fn output_format(path: &Path, diagnostics: &mut DiagnosticCollector) -> DocumentFormat {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_string())
        .unwrap_or_default();
    DocumentFormat::from_extension(&extension).unwrap_or_else(|| {
        diagnostics.push_output(format!(
            "cannot infer format from output file {}; use one of {}",
            path.display(),
            format_list()
        ));
        DocumentFormat::Json
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn form(clock: &ManualClock) -> Formular {
        let descriptor: FormDescriptor = serde_json::from_value(json!({
            "id": "signup",
            "fields": [
                {"id": "name", "name": "name",
                 "validationOptions": {"requiredData": {"required": true}}},
                {"id": "plan", "name": "plan", "type": "select",
                 "options": [{"id": "f", "value": "free", "text": "Free", "sequenceId": 0}]}
            ]
        }))
        .unwrap();
        let options = FormularOptions::default()
            .with_clock(clock.shared())
            .with_tracker(formular::Tracker::new());
        Formular::from_descriptor(descriptor, options).unwrap()
    }

    #[test]
    fn scripts_accept_bare_and_wrapped_lists() {
        let bare: Script = serde_json::from_value(json!([{"action": "submit"}])).unwrap();
        assert_eq!(bare.into_steps().len(), 1);
        let wrapped: Script =
            serde_json::from_value(json!({"steps": [{"action": "wait", "ms": 10}]})).unwrap();
        assert!(matches!(wrapped.into_steps()[0], Step::Wait { ms: 10 }));
    }

    #[test]
    fn wait_runs_debounced_validation() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        let steps: Vec<Step> = serde_json::from_value(json!([
            {"action": "set", "field": "name", "value": "Ada"},
            {"action": "set", "field": "name", "value": ""},
            {"action": "wait", "ms": 600}
        ]))
        .unwrap();
        let report = replay(&mut form, &clock, &steps).unwrap();
        assert_eq!(report.elapsed_ms, 600);
        assert!(!report.form.flags.is_valid);
    }

    #[test]
    fn unknown_fields_abort_the_replay() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        let steps = vec![Step::Focus {
            field: "missing".into(),
        }];
        let err = replay(&mut form, &clock, &steps).unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert_eq!(
            err.downcast_ref::<FormularError>(),
            Some(&FormularError::UnknownField("missing".into()))
        );
    }

    #[test]
    fn replay_report_serializes_in_camel_case() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        let report = replay(&mut form, &clock, &[Step::Submit]).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"], json!(1));
        assert_eq!(json["elapsedMs"], json!(0));
        assert_eq!(json["submit"]["valid"], json!(false));
    }

    #[test]
    fn submit_reports_selected_values() {
        let clock = ManualClock::new();
        let mut form = form(&clock);
        let steps: Vec<Step> = serde_json::from_value(json!([
            {"action": "set", "field": "name", "value": "Ada"},
            {"action": "select", "field": "plan", "option": "f"},
            {"action": "submit"}
        ]))
        .unwrap();
        let report = replay(&mut form, &clock, &steps).unwrap();
        let submit = report.submit.unwrap();
        assert!(submit.valid);
        assert_eq!(submit.data.unwrap()["plan"], json!("free"));
    }
}
