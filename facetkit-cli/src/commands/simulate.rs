//! Replay a scripted navigation session against one facet.
//!
//! The script stands in for both the user and the network: it shows and
//! hides the facet, changes its state, raises events and answers the
//! requests the facet issues. One JSON trace line is printed per step.

use anyhow::{bail, Context, Result};
use chrono::Duration;
use facetkit_core::facet::ErrorReport;
use facetkit_core::fetch::{BatchResponse, OutgoingRequest};
use facetkit_core::{
    ActionOutcome, AutoConfirm, BuiltFacet, ConsoleBuilder, ConsoleConfig, FacetEvent, FacetLifecycle, FetchError,
    FetchId, ManualClock, NavigationRequest, Response, StateSnapshot, Summary, Token,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Script {
    /// Steps with data are written as one-key maps, e.g. `dirty: true`
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    Show,
    Hide,
    SetState(StateSnapshot),
    ResetState(StateSnapshot),
    Event {
        name: String,
        #[serde(default)]
        payload: Value,
    },
    /// Answer a request; the oldest outstanding one unless `id` is given
    Complete {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        batch: Option<BatchResponse>,
    },
    Fail {
        #[serde(default)]
        id: Option<u64>,
        name: String,
        message: String,
        #[serde(default)]
        code: Option<i64>,
    },
    Advance {
        seconds: i64,
    },
    Select(Vec<String>),
    Dirty(bool),
    Execute {
        action: String,
        #[serde(default = "default_confirm")]
        confirm: bool,
    },
}

fn default_confirm() -> bool {
    true
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Show => "show",
            Step::Hide => "hide",
            Step::SetState(_) => "set_state",
            Step::ResetState(_) => "reset_state",
            Step::Event { .. } => "event",
            Step::Complete { .. } => "complete",
            Step::Fail { .. } => "fail",
            Step::Advance { .. } => "advance",
            Step::Select(_) => "select",
            Step::Dirty(_) => "dirty",
            Step::Execute { .. } => "execute",
        }
    }
}

#[derive(Serialize)]
struct Trace<'a> {
    step: usize,
    op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<String>,
    needs_update: bool,
    tokens: Vec<Token>,
    summary: Summary,
    actions: Vec<ActionFlags<'a>>,
    issued: Vec<OutgoingRequest>,
    outstanding: Vec<FetchId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    navigation: Vec<NavigationRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<TableTrace<'a>>,
}

#[derive(Serialize)]
struct ActionFlags<'a> {
    name: &'a str,
    enabled: bool,
    visible: bool,
}

#[derive(Serialize)]
struct TableTrace<'a> {
    page: Option<usize>,
    total_pages: usize,
    rows: Vec<&'a str>,
    selected: &'a [String],
    summary: String,
}

struct Session {
    facet: BuiltFacet,
    clock: ManualClock,
    outstanding: Vec<OutgoingRequest>,
    navigation: Arc<Mutex<Vec<NavigationRequest>>>,
}

impl Session {
    fn new(mut facet: BuiltFacet, clock: ManualClock) -> Self {
        let navigation = Arc::new(Mutex::new(Vec::new()));
        let sink = navigation.clone();
        facet
            .lifecycle_mut()
            .core_mut()
            .on_navigate(move |request| sink.lock().push(request.clone()));
        Self {
            facet,
            clock,
            outstanding: Vec::new(),
            navigation,
        }
    }

    fn apply(&mut self, step: Step) -> Result<Option<String>> {
        let facet = self.facet.lifecycle_mut();
        let outcome = match step {
            Step::Show => Some(describe(facet.show()?)),
            Step::Hide => {
                facet.hide()?;
                None
            }
            Step::SetState(partial) => Some(describe(facet.set_state(partial)?)),
            Step::ResetState(full) => Some(describe(facet.reset_state(full)?)),
            Step::Event { name, payload } => {
                facet.emit(event(name, payload));
                None
            }
            Step::Complete { id, data, batch } => {
                let id = self.take_request(id)?;
                let response = match batch {
                    Some(batch) => Response::Batch(batch),
                    None => Response::Single(data),
                };
                self.facet.lifecycle_mut().complete_fetch(id, Ok(response))?;
                Some(format!("completed {}", id))
            }
            Step::Fail { id, name, message, code } => {
                let id = self.take_request(id)?;
                let mut error = FetchError::new(name, message);
                if let Some(code) = code {
                    error = error.with_code(code);
                }
                self.facet.lifecycle_mut().complete_fetch(id, Err(error))?;
                Some(format!("failed {}", id))
            }
            Step::Advance { seconds } => {
                self.clock.advance(Duration::seconds(seconds));
                None
            }
            Step::Select(keys) => {
                match &mut self.facet {
                    BuiltFacet::Table(table) => table.select(keys)?,
                    BuiltFacet::Plain(facet) => facet.emit(FacetEvent::SelectChanged(keys)),
                }
                None
            }
            Step::Dirty(dirty) => {
                facet.core_mut().notify_dirty(dirty);
                None
            }
            Step::Execute { action, confirm } => {
                let outcome = facet.execute_action(&action, &mut AutoConfirm(confirm))?;
                Some(match outcome {
                    ActionOutcome::Refused => "refused".to_string(),
                    ActionOutcome::Cancelled => "cancelled".to_string(),
                    ActionOutcome::Completed => "completed".to_string(),
                    ActionOutcome::Failed(err) => format!("failed: {}", err),
                })
            }
        };
        Ok(outcome)
    }

    /// Remove a request from the outstanding list; unknown ids pass through
    fn take_request(&mut self, id: Option<u64>) -> Result<FetchId> {
        let index = match id {
            Some(id) => match self.outstanding.iter().position(|req| req.id == FetchId(id)) {
                Some(index) => index,
                None => return Ok(FetchId(id)),
            },
            None if self.outstanding.is_empty() => bail!("No outstanding request to answer"),
            None => 0,
        };
        Ok(self.outstanding.remove(index).id)
    }

    fn trace(&mut self, step: usize, op: &'static str, outcome: Option<String>) -> Trace<'_> {
        let issued = self.facet.lifecycle_mut().core_mut().take_requests();
        self.outstanding.extend(issued.iter().cloned());
        let navigation = std::mem::take(&mut *self.navigation.lock());

        let facet = self.facet.lifecycle();
        let core = facet.core();
        let actions = core
            .actions
            .iter()
            .map(|action| ActionFlags {
                name: &action.name,
                enabled: action.is_enabled(),
                visible: action.is_visible(),
            })
            .collect();

        let table = self.facet.as_table().map(|table| {
            let content = table.content();
            TableTrace {
                page: content.current_page(),
                total_pages: content.total_pages(),
                rows: content.rows().iter().map(|row| row.pkey.as_str()).collect(),
                selected: content.selected_values(),
                summary: content.summary().to_string(),
            }
        });

        Trace {
            step,
            op,
            outcome,
            needs_update: facet.needs_update(None),
            tokens: core.tokens(),
            summary: core.summary(),
            actions,
            issued,
            outstanding: self.outstanding.iter().map(|req| req.id).collect(),
            navigation,
            error: core.error_report(),
            table,
        }
    }
}

fn describe(outcome: facetkit_core::facet::StateOutcome) -> String {
    match outcome.stale {
        Some(reason) if outcome.refreshed => format!("refreshed ({})", reason),
        Some(reason) => format!("stale ({})", reason),
        None => "current".to_string(),
    }
}

fn event(name: String, payload: Value) -> FacetEvent {
    match name.as_str() {
        "post_load" => FacetEvent::PostLoad,
        "dirty_changed" => FacetEvent::DirtyChanged(payload.as_bool().unwrap_or(false)),
        "select_changed" => FacetEvent::SelectChanged(
            payload
                .as_array()
                .map(|keys| keys.iter().filter_map(|k| k.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
        ),
        _ => FacetEvent::Custom { name, payload },
    }
}

/// Build the facet and replay every step of the script.
pub fn simulate(config_path: &Path, facet: &str, script_path: &Path, container: &str) -> Result<()> {
    let config = ConsoleConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let contents = fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script {}", script_path.display()))?;
    let script: Script = serde_yaml::from_str(&contents).context("Failed to parse script")?;

    let clock = ManualClock::default();
    let builder = ConsoleBuilder::new(config)
        .context("Invalid configuration")?
        .with_clock(Arc::new(clock.clone()));
    let built = builder
        .build(facet, Some(container))
        .with_context(|| format!("Failed to build facet '{}'", facet))?;

    tracing::info!(facet, steps = script.steps.len(), "replaying script");
    let mut session = Session::new(built, clock);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (index, step) in script.steps.into_iter().enumerate() {
        let op = step.name();
        let outcome = session
            .apply(step)
            .with_context(|| format!("Step {} ({}) failed", index + 1, op))?;
        let trace = session.trace(index + 1, op, outcome);
        writeln!(out, "{}", serde_json::to_string(&trace)?)?;
    }

    Ok(())
}
