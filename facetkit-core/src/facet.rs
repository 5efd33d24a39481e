//! Facet lifecycle driver
//!
//! A facet is one navigable view of one entity. [`FacetCore`] holds
//! everything a facet owns (state, staleness bookkeeping, action state,
//! actions, header, dialogs, fetch outbox and mount) while a
//! [`FacetContent`] specialization supplies the content hooks. [`Facet`]
//! glues the two together and implements the create → show → clear →
//! refresh protocol behind the object-safe [`FacetLifecycle`] interface.
//!
//! The lifecycle:
//! - unmounted: no view materialized, state changes only mark the facet expired
//! - mounted/hidden: view exists, state changes clear and refresh when stale
//! - mounted/active: the on-screen facet

use crate::action::{ActionHolder, ActionOutcome};
use crate::action_state::{ActionState, Summary, SummaryCondition};
use crate::clock::{Clock, SystemClock};
use crate::dialog::{Confirm, Dialog, DialogRegistry, DialogResult};
use crate::diff::{changed_keys, state_diff};
use crate::entity::{key_capacity, merge_pkeys, Entity};
use crate::error::{FacetError, FacetResult};
use crate::evaluator::{Attributes, EvalContext, FacetEvent};
use crate::fetch::{
    Command, FetchError, FetchId, FetchPurpose, FetchResult, OutgoingRequest, Outbox, Request, Response,
};
use crate::header::FacetHeader;
use crate::signal::{Signal, SubscriptionId};
use crate::staleness::{StaleReason, Staleness, DEFAULT_EXPIRE_TIMEOUT};
use crate::state::{FacetState, StateChange};
use chrono::{DateTime, Utc};
use facetkit_types::{FacetRef, StateSnapshot, StateValue, Token};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Server error codes meaning "this entity is unusable, go elsewhere"
pub const DEFAULT_REDIRECT_CODES: &[i64] = &[4001];

/// Notice appended to every error report
pub const PROBLEM_PERSISTS: &str = "If the problem persists please contact the system administrator.";

/// Explicit redirect target overriding the entity's fallback facet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectInfo {
    pub entity: Option<String>,
    pub facet: Option<String>,
}

/// Which region of a mounted facet is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Content,
    Error,
}

/// The materialized view of a facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub container: String,
    pub active: bool,
    pub region: Region,
}

/// User-triggered way out of an error display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOption {
    /// Refresh this facet again
    Retry,
    /// Navigate to the default view
    MainPage,
    /// Full hard reload
    Reload,
}

/// What the error region shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub title: String,
    pub message: String,
    pub code: Option<i64>,
    pub options: Vec<RecoveryOption>,
    pub problem_persists: String,
}

impl ErrorReport {
    pub fn from_fetch_error(error: &FetchError) -> Self {
        Self {
            title: format!("{} Error", error.name),
            message: error.message.clone(),
            code: error.code,
            options: vec![RecoveryOption::Retry, RecoveryOption::MainPage, RecoveryOption::Reload],
            problem_persists: PROBLEM_PERSISTS.to_string(),
        }
    }
}

/// Requests for the navigation collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationRequest {
    Show { target: FacetRef, pkeys: Vec<String> },
    ShowDefault,
    HardReload,
}

/// Raised for every applied state change, before staleness is evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetStateChange {
    pub facet: String,
    pub state: StateSnapshot,
}

/// Result of a show or state change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateOutcome {
    /// Why the facet was found stale, if it was
    pub stale: Option<StaleReason>,
    /// Whether the content was cleared and a refresh started
    pub refreshed: bool,
}

/// Declarative construction parameters of a facet
#[derive(Debug, Clone)]
pub struct FacetOptions {
    pub name: String,
    pub entity: Option<Arc<Entity>>,
    pub label: Option<String>,
    pub title: Option<String>,
    pub tab_label: Option<String>,
    pub display_class: Option<String>,
    pub facet_group: Option<String>,
    /// Seconds; zero or less disables time-based expiry
    pub expire_timeout: i64,
    /// Fixed staleness result overriding every check
    pub no_update: Option<bool>,
    pub attributes: Attributes,
    pub redirect_info: Option<RedirectInfo>,
    pub redirect_codes: Vec<i64>,
    pub summary_conditions: Vec<SummaryCondition>,
    /// Tab labels of the facets sharing this facet's entity
    pub tab_labels: BTreeMap<String, String>,
    pub container: Option<String>,
}

impl FacetOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: None,
            label: None,
            title: None,
            tab_label: None,
            display_class: None,
            facet_group: None,
            expire_timeout: DEFAULT_EXPIRE_TIMEOUT,
            no_update: None,
            attributes: Attributes::new(),
            redirect_info: None,
            redirect_codes: DEFAULT_REDIRECT_CODES.to_vec(),
            summary_conditions: Vec::new(),
            tab_labels: BTreeMap::new(),
            container: None,
        }
    }

    pub fn with_entity(mut self, entity: Arc<Entity>) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_expire_timeout(mut self, seconds: i64) -> Self {
        self.expire_timeout = seconds;
        self
    }

    pub fn with_no_update(mut self, no_update: bool) -> Self {
        self.no_update = Some(no_update);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_summary_conditions(mut self, conditions: Vec<SummaryCondition>) -> Self {
        self.summary_conditions = conditions;
        self
    }

    pub fn with_redirect_info(mut self, info: RedirectInfo) -> Self {
        self.redirect_info = Some(info);
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

/// Everything a facet owns, shared by every content specialization
pub struct FacetCore {
    name: String,
    entity: Option<Arc<Entity>>,
    label: Option<String>,
    title: Option<String>,
    tab_label: Option<String>,
    display_class: Option<String>,
    facet_group: Option<String>,
    pub attributes: Attributes,
    state: FacetState,
    /// State the displayed content corresponds to
    old_state: StateSnapshot,
    staleness: Staleness,
    clock: Arc<dyn Clock>,
    pub action_state: ActionState,
    pub actions: ActionHolder,
    pub header: FacetHeader,
    pub dialogs: DialogRegistry,
    outbox: Outbox,
    container: Option<String>,
    mount: Option<Mount>,
    error: Option<ErrorReport>,
    data: Option<Value>,
    deferred: VecDeque<StateSnapshot>,
    redirect_info: Option<RedirectInfo>,
    redirect_codes: Vec<i64>,
    state_change: Signal<FacetStateChange>,
    navigate: Signal<NavigationRequest>,
}

impl FacetCore {
    pub fn new(options: FacetOptions) -> Self {
        let label = options.label;
        let title = options.title.or_else(|| label.clone());
        let tab_label = options.tab_label.or_else(|| label.clone());

        let mut tab_labels = options.tab_labels;
        if let Some(tab) = &tab_label {
            tab_labels.entry(options.name.clone()).or_insert_with(|| tab.clone());
        }
        let header = FacetHeader::new(title.clone().unwrap_or_else(|| options.name.clone()), tab_labels);

        Self {
            name: options.name,
            entity: options.entity,
            label,
            title,
            tab_label,
            display_class: options.display_class,
            facet_group: options.facet_group,
            attributes: options.attributes,
            state: FacetState::new(),
            old_state: StateSnapshot::new(),
            staleness: Staleness::new(options.expire_timeout, options.no_update),
            clock: Arc::new(SystemClock),
            action_state: ActionState::new(options.summary_conditions),
            actions: ActionHolder::new(),
            header,
            dialogs: DialogRegistry::new(),
            outbox: Outbox::new(),
            container: options.container,
            mount: None,
            error: None,
            data: None,
            deferred: VecDeque::new(),
            redirect_info: options.redirect_info,
            redirect_codes: options.redirect_codes,
            state_change: Signal::new(),
            navigate: Signal::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self) -> Option<&Arc<Entity>> {
        self.entity.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn tab_label(&self) -> Option<&str> {
        self.tab_label.as_deref()
    }

    pub fn display_class(&self) -> Option<&str> {
        self.display_class.as_deref()
    }

    pub fn facet_group(&self) -> Option<&str> {
        self.facet_group.as_deref()
    }

    pub fn facet_ref(&self) -> FacetRef {
        FacetRef {
            entity: self.entity.as_ref().map(|e| e.name.clone()),
            facet: self.name.clone(),
        }
    }

    /// Whether a boolean attribute is set to `true`
    pub fn attribute_flag(&self, name: &str) -> bool {
        self.attributes.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    // ---- state ----

    pub fn state(&self) -> &FacetState {
        &self.state
    }

    pub fn state_value(&self, key: &str) -> Option<&StateValue> {
        self.state.get(key)
    }

    pub fn get_state(&self) -> StateSnapshot {
        self.state.clone_state()
    }

    /// State the displayed content was last reconciled against
    pub fn old_state(&self) -> &StateSnapshot {
        &self.old_state
    }

    /// Subscribe to raw state changes
    pub fn on_state_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&StateChange) + Send + 'static,
    {
        self.state.on_change(callback)
    }

    /// Subscribe to the facet state-change event
    pub fn on_facet_state_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&FacetStateChange) + Send + 'static,
    {
        self.state_change.subscribe(callback)
    }

    pub fn on_navigate<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&NavigationRequest) + Send + 'static,
    {
        self.navigate.subscribe(callback)
    }

    /// Queue a state correction to be applied once the current hook returns
    pub fn defer_state(&mut self, partial: StateSnapshot) {
        self.deferred.push_back(partial);
    }

    fn take_deferred(&mut self) -> Option<StateSnapshot> {
        self.deferred.pop_front()
    }

    // ---- pkeys ----

    fn current_pkeys(&self) -> Vec<String> {
        match self.state.get("pkeys") {
            Some(StateValue::List(keys)) => keys.clone(),
            Some(other) => other.as_str().map(|s| vec![s.to_string()]).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Current pkeys merged with `supplied`, padded to the entity's key capacity
    pub fn get_pkeys(&self, supplied: Option<&[String]>) -> FacetResult<Vec<String>> {
        let capacity = key_capacity(self.entity.as_deref());
        merge_pkeys(capacity, &self.current_pkeys(), supplied.unwrap_or(&[]))
    }

    /// The last pkey, or an empty string
    pub fn get_pkey(&self) -> String {
        self.get_pkeys(None)
            .ok()
            .and_then(|mut keys| keys.pop())
            .unwrap_or_default()
    }

    /// Every pkey but the last
    pub fn get_pkey_prefix(&self) -> Vec<String> {
        let mut keys = self.get_pkeys(None).unwrap_or_default();
        keys.pop();
        keys
    }

    /// Pad a supplied `pkeys` entry to the full key list
    fn normalize(&self, mut state: StateSnapshot) -> FacetResult<StateSnapshot> {
        let supplied = match state.get("pkeys") {
            Some(StateValue::List(keys)) => Some(keys.clone()),
            Some(StateValue::Text(key)) => Some(vec![key.clone()]),
            _ => None,
        };
        if let Some(supplied) = supplied {
            let keys = self.get_pkeys(Some(&supplied))?;
            state.insert("pkeys", keys);
        }
        Ok(state)
    }

    // ---- staleness ----

    pub fn staleness(&self) -> &Staleness {
        &self.staleness
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn set_expired_flag(&mut self) {
        self.staleness.set_expired_flag();
    }

    /// Clear the expired flag and stamp the refresh time
    pub fn clear_expired_flag(&mut self) {
        let now = self.clock.now();
        self.staleness.clear_expired_flag(now);
    }

    /// Why the facet is stale against `candidate` (default: current state)
    pub fn stale_reason(&self, candidate: Option<&StateSnapshot>) -> Option<StaleReason> {
        let candidate = candidate.unwrap_or_else(|| self.state.values());
        self.staleness
            .check(self.clock.now(), self.error_displayed(), || state_diff(&self.old_state, candidate))
    }

    pub fn needs_update(&self, candidate: Option<&StateSnapshot>) -> bool {
        self.stale_reason(candidate).is_some()
    }

    // ---- mount ----

    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn set_container(&mut self, container: impl Into<String>) {
        self.container = Some(container.into());
    }

    pub fn mount(&self) -> Option<&Mount> {
        self.mount.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.mount.as_ref().is_some_and(|m| m.active)
    }

    /// Switch the mounted view to its content region
    pub fn show_content(&mut self) {
        if let Some(mount) = self.mount.as_mut() {
            mount.region = Region::Content;
        }
    }

    pub fn error_displayed(&self) -> bool {
        self.mount.as_ref().is_some_and(|m| m.region == Region::Error)
    }

    pub fn error_report(&self) -> Option<&ErrorReport> {
        self.error.as_ref()
    }

    /// Last loaded payload
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    // ---- fetches ----

    pub fn issue(&mut self, purpose: FetchPurpose, command: Command) -> FetchId {
        self.outbox.issue(purpose, command)
    }

    pub fn take_requests(&mut self) -> Vec<OutgoingRequest> {
        self.outbox.take_requests()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    // ---- events and action state ----

    /// Feed an event through the evaluators into the actions and header
    pub fn emit(&mut self, event: FacetEvent) {
        let ctx = EvalContext {
            attributes: &self.attributes,
        };
        let published = self.action_state.dispatch(&event, &ctx);
        if published.is_empty() {
            return;
        }
        for tokens in &published {
            self.actions.state_changed(tokens);
        }
        let summary = self.action_state.summary();
        self.header.update_summary(&summary);
    }

    /// Raise `dirty_changed`
    pub fn notify_dirty(&mut self, dirty: bool) {
        self.emit(FacetEvent::DirtyChanged(dirty));
    }

    /// Load completion: `post_load` for evaluators, then republish the
    /// merged tokens so listeners and actions see the loaded state
    fn post_load(&mut self) {
        self.emit(FacetEvent::PostLoad);
        let tokens = self.action_state.notify();
        self.actions.state_changed(&tokens);
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.action_state.get()
    }

    pub fn summary(&self) -> Summary {
        self.action_state.summary()
    }

    pub fn register_dialog(&mut self, dialog: Box<dyn Dialog>) {
        self.dialogs.register(dialog);
    }

    // ---- errors and redirects ----

    /// Where to go when this facet's entity becomes unusable
    pub fn get_redirect_facet(&self) -> Option<FacetRef> {
        let mut entity = self.entity.as_ref().map(|e| e.top_level().name.clone());
        let mut facet = self.entity.as_ref().and_then(|e| e.redirect_facet.clone());

        if let Some(info) = &self.redirect_info {
            entity = info.entity.clone().or(entity);
            facet = info.facet.clone().or(facet);
        }

        facet.map(|facet| FacetRef { entity, facet })
    }

    /// Ask the navigation collaborator to show another facet
    pub fn navigate(&mut self, request: NavigationRequest) {
        self.navigate.emit(&request);
    }

    /// Ask the navigation collaborator to show the redirect target
    pub fn redirect(&mut self) -> bool {
        let Some(target) = self.get_redirect_facet() else {
            return false;
        };
        tracing::info!(facet = %self.name, target = %target, "redirecting");
        self.navigate.emit(&NavigationRequest::Show {
            target,
            pkeys: Vec::new(),
        });
        true
    }

    pub fn redirect_codes(&self) -> &[i64] {
        &self.redirect_codes
    }

    /// Swap the view into its error region
    pub fn report_error(&mut self, error: &FetchError) {
        tracing::warn!(facet = %self.name, error = %error, code = ?error.code, "facet error");
        self.error = Some(ErrorReport::from_fetch_error(error));
        if let Some(mount) = self.mount.as_mut() {
            mount.region = Region::Error;
        }
    }

    /// Redirect on a designated code, otherwise report the error
    pub fn redirect_error(&mut self, error: &FetchError) {
        let redirectable = error.code.is_some_and(|code| self.redirect_codes.contains(&code));
        if redirectable && self.redirect() {
            return;
        }
        self.report_error(error);
    }
}

impl fmt::Debug for FacetCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetCore")
            .field("name", &self.name)
            .field("entity", &self.entity.as_ref().map(|e| &e.name))
            .field("state", &self.state.values())
            .field("old_state", &self.old_state)
            .field("staleness", &self.staleness)
            .field("action_state", &self.action_state)
            .field("mount", &self.mount)
            .finish()
    }
}

/// Content hooks of a facet specialization
///
/// Every hook receives the owning core; state corrections made from a hook
/// go through [`FacetCore::defer_state`].
pub trait FacetContent: Send {
    /// Build fresh content for a new mount
    fn create_content(&mut self, _core: &mut FacetCore) {}

    /// Reset displayed content to empty
    fn clear(&mut self, _core: &mut FacetCore) {}

    /// Start fetching data
    fn refresh(&mut self, _core: &mut FacetCore) {}

    /// Apply the result of a refresh fetch
    fn load(&mut self, _core: &mut FacetCore, _response: &Response) {}

    /// Handle a fetch that was not issued for a refresh
    fn on_response(&mut self, core: &mut FacetCore, purpose: FetchPurpose, result: FetchResult) {
        tracing::debug!(facet = %core.name(), ?purpose, ok = result.is_ok(), "unhandled fetch response");
    }

    /// Whether the content holds unsaved edits
    fn is_dirty(&self, _core: &FacetCore) -> bool {
        false
    }
}

/// Base content: optionally fetches one command per refresh
#[derive(Debug, Clone, Default)]
pub struct PlainContent {
    /// Method called on the facet's entity with the pkeys as arguments
    pub method: Option<String>,
    dirty: bool,
}

impl PlainContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetching(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            dirty: false,
        }
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

impl FacetContent for PlainContent {
    fn refresh(&mut self, core: &mut FacetCore) {
        let Some(method) = &self.method else {
            return;
        };
        let args: Vec<String> = core
            .get_pkeys(None)
            .unwrap_or_default()
            .into_iter()
            .filter(|key| !key.is_empty())
            .collect();
        let entity = core.entity().map(|e| e.name.clone());
        let request = Request::new(entity, method.clone()).with_args(args);
        core.issue(FetchPurpose::Refresh, Command::Single(request));
    }

    fn is_dirty(&self, _core: &FacetCore) -> bool {
        self.dirty
    }
}

/// Object-safe lifecycle interface used by the view and navigation layers
pub trait FacetLifecycle: Send {
    fn core(&self) -> &FacetCore;

    fn core_mut(&mut self) -> &mut FacetCore;

    /// Materialize the view; a second call rebuilds it
    fn create(&mut self) -> FacetResult<()>;

    /// Make this the active facet, refreshing when stale
    fn show(&mut self) -> FacetResult<StateOutcome>;

    fn hide(&mut self) -> FacetResult<()>;

    /// Apply fetched data
    fn load(&mut self, response: &Response) -> FacetResult<()>;

    fn clear(&mut self);

    fn refresh(&mut self) -> FacetResult<()>;

    fn needs_update(&self, candidate: Option<&StateSnapshot>) -> bool {
        self.core().needs_update(candidate)
    }

    /// Merge route-derived values into the state
    fn set_state(&mut self, partial: StateSnapshot) -> FacetResult<StateOutcome>;

    /// Replace the whole state
    fn reset_state(&mut self, full: StateSnapshot) -> FacetResult<StateOutcome>;

    fn report_error(&mut self, error: &FetchError) {
        self.core_mut().report_error(error);
    }

    /// Hand back the result of an issued fetch; each id completes once
    fn complete_fetch(&mut self, id: FetchId, result: FetchResult) -> FacetResult<()>;

    fn is_dirty(&self) -> bool;

    fn can_leave(&self) -> bool {
        !self.is_dirty()
    }

    fn emit(&mut self, event: FacetEvent) {
        self.core_mut().emit(event);
    }

    /// Run a named action, confirming first when it asks for it
    fn execute_action(&mut self, name: &str, confirm: &mut dyn Confirm) -> FacetResult<ActionOutcome>;
}

/// A facet: the shared core driven through a content specialization
pub struct Facet<C: FacetContent> {
    core: FacetCore,
    content: C,
}

/// The base facet
pub type PlainFacet = Facet<PlainContent>;

impl<C: FacetContent> Facet<C> {
    pub fn new(core: FacetCore, content: C) -> Self {
        Self { core, content }
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    /// Run `f` against the content and core, then apply deferred corrections
    pub fn with_content<R, F>(&mut self, f: F) -> FacetResult<R>
    where
        F: FnOnce(&mut C, &mut FacetCore) -> R,
    {
        let result = f(&mut self.content, &mut self.core);
        self.drain_deferred()?;
        Ok(result)
    }

    pub fn set_pkeys(&mut self, keys: Vec<String>) -> FacetResult<StateOutcome> {
        self.set_state(StateSnapshot::new().with("pkeys", keys))
    }

    pub fn show_content(&mut self) {
        self.core.show_content();
    }

    /// Run one of the error report's recovery options
    pub fn recover(&mut self, option: RecoveryOption) -> FacetResult<()> {
        tracing::debug!(facet = %self.core.name, ?option, "recovering from error");
        match option {
            RecoveryOption::Retry => {
                self.core.show_content();
                self.refresh()
            }
            RecoveryOption::MainPage => {
                self.core.navigate.emit(&NavigationRequest::ShowDefault);
                Ok(())
            }
            RecoveryOption::Reload => {
                self.core.navigate.emit(&NavigationRequest::HardReload);
                Ok(())
            }
        }
    }

    pub fn take_requests(&mut self) -> Vec<OutgoingRequest> {
        self.core.take_requests()
    }

    fn apply_change(&mut self, change: Option<StateChange>) -> FacetResult<StateOutcome> {
        let Some(change) = change else {
            return Ok(StateOutcome::default());
        };
        let outcome = self.on_state_change(change.new)?;
        self.drain_deferred()?;
        Ok(outcome)
    }

    /// Reconcile the view with a newly applied state
    fn on_state_change(&mut self, state: StateSnapshot) -> FacetResult<StateOutcome> {
        self.core.state_change.emit(&FacetStateChange {
            facet: self.core.name.clone(),
            state: state.clone(),
        });

        let stale = self.core.stale_reason(Some(&state));
        tracing::trace!(
            facet = %self.core.name,
            changed = ?changed_keys(&self.core.old_state, &state),
            "state keys changed"
        );
        self.core.old_state = state;

        if !self.core.is_mounted() {
            if stale.is_some() {
                self.core.set_expired_flag();
            }
            tracing::debug!(facet = %self.core.name, stale = ?stale, "state changed while unmounted");
            return Ok(StateOutcome { stale, refreshed: false });
        }

        tracing::debug!(facet = %self.core.name, stale = ?stale, "state changed");
        if stale.is_some() {
            self.clear();
        }
        self.core.show_content();
        self.core.header.select_tab();
        if stale.is_some() {
            self.refresh()?;
        }

        Ok(StateOutcome {
            stale,
            refreshed: stale.is_some(),
        })
    }

    fn drain_deferred(&mut self) -> FacetResult<()> {
        while let Some(partial) = self.core.take_deferred() {
            tracing::debug!(facet = %self.core.name, state = ?partial, "applying deferred state");
            self.set_state(partial)?;
        }
        Ok(())
    }

    fn load_completed(&mut self, response: &Response) -> FacetResult<()> {
        self.load(response)?;
        self.core.clear_expired_flag();
        self.core.post_load();
        self.drain_deferred()
    }
}

impl<C: FacetContent> FacetLifecycle for Facet<C> {
    fn core(&self) -> &FacetCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FacetCore {
        &mut self.core
    }

    fn create(&mut self) -> FacetResult<()> {
        let Some(container) = self.core.container.clone() else {
            return Err(FacetError::MissingContainer {
                facet: self.core.name.clone(),
            });
        };

        if self.core.mount.is_some() {
            tracing::debug!(facet = %self.core.name, "rebuilding facet view");
        }
        self.core.mount = Some(Mount {
            container,
            active: false,
            region: Region::Content,
        });
        self.content.create_content(&mut self.core);
        Ok(())
    }

    fn show(&mut self) -> FacetResult<StateOutcome> {
        if let Some(mount) = self.core.mount.as_mut() {
            mount.active = true;
            self.core.show_content();
            self.core.header.select_tab();
            return Ok(StateOutcome::default());
        }

        self.create()?;

        let state = self.core.get_state();
        let stale = self.core.stale_reason(Some(&state));
        self.core.old_state = state;

        if stale.is_some() {
            self.clear();
        }
        if let Some(mount) = self.core.mount.as_mut() {
            mount.active = true;
        }
        self.core.show_content();
        self.core.header.select_tab();

        tracing::debug!(facet = %self.core.name, stale = ?stale, "facet shown");
        if stale.is_some() {
            self.refresh()?;
        }

        Ok(StateOutcome {
            stale,
            refreshed: stale.is_some(),
        })
    }

    fn hide(&mut self) -> FacetResult<()> {
        let Some(mount) = self.core.mount.as_mut() else {
            return Err(FacetError::NotMounted {
                facet: self.core.name.clone(),
            });
        };
        mount.active = false;
        self.core.header.deselect_tab();
        Ok(())
    }

    fn load(&mut self, response: &Response) -> FacetResult<()> {
        let data = response.to_value();
        let pkey = self.core.get_pkey();
        let entity = self.core.entity.clone();
        let groups = entity.as_ref().map(|e| e.facet_groups.as_slice()).unwrap_or(&[]);
        self.core.header.load(Some(&data), &pkey, groups);
        self.core.data = Some(data);

        self.content.load(&mut self.core, response);
        Ok(())
    }

    fn clear(&mut self) {
        self.core.header.clear();
        self.content.clear(&mut self.core);
    }

    fn refresh(&mut self) -> FacetResult<()> {
        tracing::debug!(facet = %self.core.name, "refresh");
        self.content.refresh(&mut self.core);
        self.drain_deferred()
    }

    fn set_state(&mut self, partial: StateSnapshot) -> FacetResult<StateOutcome> {
        let partial = self.core.normalize(partial)?;
        let change = self.core.state.set(partial);
        self.apply_change(change)
    }

    fn reset_state(&mut self, full: StateSnapshot) -> FacetResult<StateOutcome> {
        let full = self.core.normalize(full)?;
        let change = self.core.state.reset(full);
        self.apply_change(change)
    }

    fn complete_fetch(&mut self, id: FetchId, result: FetchResult) -> FacetResult<()> {
        let purpose = self.core.outbox.resolve(id).ok_or(FacetError::UnknownFetch(id))?;
        tracing::debug!(facet = %self.core.name, fetch = %id, ok = result.is_ok(), "fetch completed");

        match (purpose, result) {
            (FetchPurpose::Refresh, Ok(response)) => self.load_completed(&response),
            (FetchPurpose::Refresh, Err(error)) => {
                self.core.redirect_error(&error);
                Ok(())
            }
            (purpose, result) => {
                self.content.on_response(&mut self.core, purpose, result);
                self.drain_deferred()
            }
        }
    }

    fn is_dirty(&self) -> bool {
        self.content.is_dirty(&self.core)
    }

    fn execute_action(&mut self, name: &str, confirm: &mut dyn Confirm) -> FacetResult<ActionOutcome> {
        let action = self
            .core
            .actions
            .get(name)
            .ok_or_else(|| FacetError::UnknownAction(name.to_string()))?;

        if !action.is_executable() {
            tracing::debug!(facet = %self.core.name, action = name, "action refused");
            return Ok(ActionOutcome::Refused);
        }

        let needs_confirm = action.needs_confirm;
        let message = action.confirm_message().to_string();
        let dialog = action.confirm_dialog.clone();
        let handler = action.handler().cloned();

        if needs_confirm {
            let confirmed = match dialog {
                Some(dialog) => {
                    let dialog = self
                        .core
                        .dialogs
                        .get_mut(&dialog)
                        .ok_or(FacetError::UnknownDialog(dialog))?;
                    dialog.open(&message) == DialogResult::Confirmed
                }
                None => confirm.confirm(&message),
            };
            if !confirmed {
                tracing::debug!(facet = %self.core.name, action = name, "action cancelled");
                return Ok(ActionOutcome::Cancelled);
            }
        }

        let Some(handler) = handler else {
            return Ok(ActionOutcome::Completed);
        };

        let outcome = match handler(&mut *self) {
            Ok(()) => ActionOutcome::Completed,
            Err(err) => {
                tracing::warn!(facet = %self.core.name, action = name, error = %err, "action failed");
                ActionOutcome::Failed(err)
            }
        };
        self.drain_deferred()?;
        Ok(outcome)
    }
}

impl<C: FacetContent + fmt::Debug> fmt::Debug for Facet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facet")
            .field("core", &self.core)
            .field("content", &self.content)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::clock::ManualClock;
    use crate::dialog::AutoConfirm;
    use crate::entity::FacetGroup;
    use crate::error::ActionError;
    use crate::evaluator::SelectedEvaluator;
    use chrono::Duration;
    use facetkit_types::tokens;
    use parking_lot::Mutex;
    use serde_json::json;

    fn nested_entity() -> Arc<Entity> {
        let zone = Arc::new(Entity::new("dnszone").with_redirect_facet(Some("search".into())));
        Arc::new(
            Entity::new("dnsrecord")
                .contained_in(zone)
                .with_redirect_facet(Some("records".into())),
        )
    }

    fn facet(options: FacetOptions) -> (PlainFacet, ManualClock) {
        let clock = ManualClock::default();
        let core = FacetCore::new(options.with_container("main")).with_clock(Arc::new(clock.clone()));
        (Facet::new(core, PlainContent::fetching("show")), clock)
    }

    fn refresh_once(facet: &mut PlainFacet) {
        let requests = facet.take_requests();
        let id = requests.last().expect("refresh issued").id;
        facet
            .complete_fetch(id, Ok(Response::Single(json!({"result": {}}))))
            .unwrap();
    }

    #[test]
    fn test_create_requires_container() {
        let mut facet = Facet::new(FacetCore::new(FacetOptions::new("details")), PlainContent::new());
        assert_eq!(
            facet.create(),
            Err(FacetError::MissingContainer {
                facet: "details".into()
            })
        );
        assert!(facet.hide().is_err());
    }

    #[test]
    fn test_first_show_refreshes_and_second_does_not() {
        let (mut facet, _clock) = facet(FacetOptions::new("details"));

        let outcome = facet.show().unwrap();
        assert_eq!(outcome.stale, Some(StaleReason::NeverRefreshed));
        assert!(outcome.refreshed);
        assert!(facet.core().is_active());
        assert!(facet.core().header.tab_selected);

        refresh_once(&mut facet);
        facet.hide().unwrap();
        assert!(!facet.core().is_active());

        let outcome = facet.show().unwrap();
        assert_eq!(outcome, StateOutcome::default());
        assert!(facet.take_requests().is_empty());
    }

    #[test]
    fn test_state_change_while_unmounted_marks_expired() {
        let (mut facet, _clock) = facet(FacetOptions::new("details").with_expire_timeout(0));
        let outcome = facet.set_state(StateSnapshot::new().with("page", 2)).unwrap();

        assert!(!outcome.refreshed);
        assert!(facet.core().staleness().is_expired());
        assert_eq!(facet.core().old_state().get("page"), Some(&StateValue::Int(2)));
    }

    #[test]
    fn test_state_change_while_mounted_refreshes_when_stale() {
        let (mut facet, _clock) = facet(FacetOptions::new("details").with_expire_timeout(0));
        facet.show().unwrap();
        refresh_once(&mut facet);
        assert!(!facet.needs_update(None));

        let outcome = facet.set_state(StateSnapshot::new().with("filter", "adm")).unwrap();
        assert_eq!(outcome.stale, Some(StaleReason::StateChanged));
        assert_eq!(facet.take_requests().len(), 1);

        let outcome = facet.set_state(StateSnapshot::new().with("filter", "adm")).unwrap();
        assert_eq!(outcome.stale, None);
        assert!(facet.take_requests().is_empty());
    }

    #[test]
    fn test_expiry_uses_clock() {
        let (mut facet, clock) = facet(FacetOptions::new("details").with_expire_timeout(60));
        facet.show().unwrap();
        refresh_once(&mut facet);

        clock.advance(Duration::seconds(60));
        assert!(!facet.needs_update(None));
        clock.advance(Duration::seconds(1));
        assert!(facet.needs_update(None));
    }

    #[test]
    fn test_pkeys_are_normalized() {
        let (mut facet, _clock) = facet(FacetOptions::new("records").with_entity(nested_entity()));

        facet.set_pkeys(vec!["www".into()]).unwrap();
        assert_eq!(
            facet.core().state_value("pkeys"),
            Some(&StateValue::from(vec!["", "www"]))
        );

        facet
            .set_state(StateSnapshot::new().with("pkeys", vec!["example.com", "www"]))
            .unwrap();
        assert_eq!(facet.core().get_pkey(), "www");
        assert_eq!(facet.core().get_pkey_prefix(), vec!["example.com".to_string()]);

        let err = facet
            .set_state(StateSnapshot::new().with("pkeys", vec!["a", "b", "c"]))
            .unwrap_err();
        assert!(matches!(err, FacetError::TooManyKeys { supplied: 3, capacity: 2 }));
    }

    #[test]
    fn test_fetch_completes_once() {
        let (mut facet, _clock) = facet(FacetOptions::new("details"));
        facet.show().unwrap();
        let id = facet.take_requests()[0].id;

        facet.complete_fetch(id, Ok(Response::Single(json!({})))).unwrap();
        assert_eq!(
            facet.complete_fetch(id, Ok(Response::Single(json!({})))),
            Err(FacetError::UnknownFetch(id))
        );
    }

    #[test]
    fn test_error_display_and_retry() {
        let (mut facet, _clock) = facet(FacetOptions::new("details").with_expire_timeout(0));
        facet.show().unwrap();
        let id = facet.take_requests()[0].id;

        facet
            .complete_fetch(id, Err(FetchError::new("NetworkError", "timed out")))
            .unwrap();
        assert!(facet.core().error_displayed());
        assert!(facet.needs_update(None));
        let report = facet.core().error_report().unwrap();
        assert_eq!(report.options.len(), 3);

        facet.recover(RecoveryOption::Retry).unwrap();
        assert!(!facet.core().error_displayed());
        assert_eq!(facet.take_requests().len(), 1);
    }

    #[test]
    fn test_redirect_on_designated_code() {
        let (mut facet, _clock) = facet(FacetOptions::new("records").with_entity(nested_entity()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        facet.core_mut().on_navigate(move |req| sink.lock().push(req.clone()));

        facet.show().unwrap();
        let id = facet.take_requests()[0].id;
        facet
            .complete_fetch(id, Err(FetchError::new("NotFound", "no such zone").with_code(4001)))
            .unwrap();

        assert!(!facet.core().error_displayed());
        assert_eq!(
            *seen.lock(),
            vec![NavigationRequest::Show {
                target: FacetRef::new(Some("dnszone"), "records"),
                pkeys: vec![],
            }]
        );
    }

    #[test]
    fn test_redirect_info_overrides_target() {
        let core = FacetCore::new(
            FacetOptions::new("records")
                .with_entity(nested_entity())
                .with_redirect_info(RedirectInfo {
                    entity: None,
                    facet: Some("details".into()),
                }),
        );
        assert_eq!(core.get_redirect_facet(), Some(FacetRef::new(Some("dnszone"), "details")));
    }

    #[test]
    fn test_execute_action_paths() {
        let (mut facet, _clock) = facet(FacetOptions::new("search"));
        let runs = Arc::new(Mutex::new(0));
        let counter = runs.clone();

        facet.core_mut().action_state.add_evaluator(Box::new(SelectedEvaluator::default()));
        facet.core_mut().actions.add(
            Action::new("remove")
                .with_enable_cond(tokens(["item-selected"]), vec![])
                .with_confirm(None, None)
                .with_handler(move |facet| {
                    *counter.lock() += 1;
                    facet.core_mut().set_expired_flag();
                    Ok(())
                }),
        );
        facet.core_mut().actions.add(
            Action::new("fail").with_handler(|_| Err(ActionError::Failed("denied".into()))),
        );
        facet.core_mut().actions.state_changed(&[]);

        assert_eq!(
            facet.execute_action("remove", &mut AutoConfirm(true)).unwrap(),
            ActionOutcome::Refused
        );

        facet.emit(FacetEvent::SelectChanged(vec!["admins".into()]));
        assert_eq!(
            facet.execute_action("remove", &mut AutoConfirm(false)).unwrap(),
            ActionOutcome::Cancelled
        );
        assert_eq!(*runs.lock(), 0);

        assert_eq!(
            facet.execute_action("remove", &mut AutoConfirm(true)).unwrap(),
            ActionOutcome::Completed
        );
        assert_eq!(*runs.lock(), 1);

        assert_eq!(
            facet.execute_action("fail", &mut AutoConfirm(true)).unwrap(),
            ActionOutcome::Failed(ActionError::Failed("denied".into()))
        );
        assert!(matches!(
            facet.execute_action("missing", &mut AutoConfirm(true)),
            Err(FacetError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_state_change_event_carries_new_state() {
        let (mut facet, _clock) = facet(FacetOptions::new("details"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        facet
            .core_mut()
            .on_facet_state_change(move |change| sink.lock().push(change.state.clone()));

        facet.set_state(StateSnapshot::new().with("page", 3)).unwrap();
        facet.reset_state(StateSnapshot::new()).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![StateSnapshot::new().with("page", 3), StateSnapshot::new()]
        );
    }

    #[test]
    fn test_plain_refresh_request_uses_pkeys() {
        let (mut facet, _clock) = facet(FacetOptions::new("details").with_entity(nested_entity()));
        facet
            .set_state(StateSnapshot::new().with("pkeys", vec!["example.com", "www"]))
            .unwrap();
        facet.show().unwrap();

        let requests = facet.take_requests();
        assert_eq!(
            requests[0].command,
            Command::Single(
                Request::new(Some("dnsrecord".into()), "show").with_args(vec!["example.com".into(), "www".into()])
            )
        );
    }

    #[test]
    fn test_dirty_content_blocks_leaving() {
        let (mut facet, _clock) = facet(FacetOptions::new("details"));
        assert!(!facet.is_dirty());
        assert!(facet.can_leave());

        facet.with_content(|content, _| content.set_dirty(true)).unwrap();
        assert!(facet.is_dirty());
        assert!(!facet.can_leave());

        facet.with_content(|content, _| content.set_dirty(false)).unwrap();
        assert!(facet.can_leave());
    }

    struct Scripted {
        name: &'static str,
        answer: DialogResult,
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl Dialog for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn open(&mut self, message: &str) -> DialogResult {
            self.messages.lock().push(message.to_string());
            self.answer
        }
    }

    #[test]
    fn test_named_dialog_confirms_action() {
        let (mut facet, _clock) = facet(FacetOptions::new("details"));
        let messages = Arc::new(Mutex::new(Vec::new()));
        facet.core_mut().register_dialog(Box::new(Scripted {
            name: "revert",
            answer: DialogResult::Cancelled,
            messages: messages.clone(),
        }));
        facet.core_mut().actions.add(
            Action::new("revert").with_confirm(Some("Discard changes?".into()), Some("revert".into())),
        );
        facet.core_mut().actions.add(Action::new("delete").with_confirm(None, Some("delete".into())));
        facet.core_mut().actions.state_changed(&[]);

        // the named dialog answers, the fallback prompt is never asked
        let mut asked = |_: &str| -> bool { panic!("fallback prompt used") };
        assert_eq!(
            facet.execute_action("revert", &mut asked).unwrap(),
            ActionOutcome::Cancelled
        );
        assert_eq!(*messages.lock(), vec!["Discard changes?".to_string()]);

        facet.core_mut().register_dialog(Box::new(Scripted {
            name: "revert",
            answer: DialogResult::Confirmed,
            messages: messages.clone(),
        }));
        assert_eq!(
            facet.execute_action("revert", &mut AutoConfirm(false)).unwrap(),
            ActionOutcome::Completed
        );
        assert_eq!(messages.lock().len(), 2);

        assert_eq!(
            facet.execute_action("delete", &mut AutoConfirm(true)),
            Err(FacetError::UnknownDialog("delete".into()))
        );
    }

    #[test]
    fn test_recovery_navigates_away() {
        let (mut facet, _clock) = facet(FacetOptions::new("details"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        facet.core_mut().on_navigate(move |req| sink.lock().push(req.clone()));

        facet.show().unwrap();
        let id = facet.take_requests()[0].id;
        facet
            .complete_fetch(id, Err(FetchError::new("NetworkError", "timed out")))
            .unwrap();
        assert!(facet.core().error_displayed());

        facet.recover(RecoveryOption::MainPage).unwrap();
        facet.recover(RecoveryOption::Reload).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![NavigationRequest::ShowDefault, NavigationRequest::HardReload]
        );
        assert!(facet.take_requests().is_empty());
    }

    #[test]
    fn test_create_again_rebuilds_mount() {
        let (mut facet, _clock) = facet(FacetOptions::new("details").with_expire_timeout(0));
        facet.show().unwrap();
        let id = facet.take_requests()[0].id;
        facet
            .complete_fetch(id, Err(FetchError::new("NetworkError", "timed out")))
            .unwrap();
        assert!(facet.core().error_displayed());
        assert!(facet.core().is_active());

        facet.create().unwrap();
        assert!(facet.core().is_mounted());
        assert!(!facet.core().is_active());
        assert!(!facet.core().error_displayed());
    }

    #[test]
    fn test_load_republishes_tokens() {
        let (mut facet, _clock) = facet(FacetOptions::new("members"));
        facet.core_mut().action_state.add_evaluator(Box::new(SelectedEvaluator::default()));
        facet.emit(FacetEvent::SelectChanged(vec!["admins".into()]));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        facet
            .core_mut()
            .action_state
            .on_change(move |tokens| sink.lock().push(tokens.clone()));

        facet.show().unwrap();
        assert!(seen.lock().is_empty());
        refresh_once(&mut facet);
        assert_eq!(*seen.lock(), vec![tokens(["item-selected"])]);
    }

    #[test]
    fn test_clear_drops_group_labels() {
        let entity = Arc::new(
            Entity::new("user").with_facet_group(FacetGroup::new("settings", None).with_facet("details")),
        );
        let (mut facet, _clock) = facet(
            FacetOptions::new("details")
                .with_entity(entity)
                .with_expire_timeout(0),
        );
        facet.show().unwrap();
        refresh_once(&mut facet);
        assert_eq!(facet.core().header.groups.len(), 1);

        facet.set_state(StateSnapshot::new().with("filter", "adm")).unwrap();
        assert!(facet.core().header.groups.is_empty());

        refresh_once(&mut facet);
        assert_eq!(facet.core().header.groups[0].tabs[0].facet, "details");
    }
}
