//! Table facets
//!
//! A table facet lists the records of a managed entity. With pagination on,
//! the refresh fetches primary keys only; the current page is cut out
//! locally and its full records are fetched in a second batch. With
//! pagination off, every returned record is shown at once.

use crate::entity::Entity;
use crate::error::FacetResult;
use crate::facet::{Facet, FacetContent, FacetCore, NavigationRequest};
use crate::evaluator::FacetEvent;
use crate::fetch::{Command, FetchPurpose, FetchResult, Request, Response};
use facetkit_types::{FacetRef, StateSnapshot};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_PAGE_LENGTH: usize = 20;

/// One record as returned by the server
pub type Record = Map<String, Value>;

/// A table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Whether values link to the record's details facet
    #[serde(default = "default_true")]
    pub link: bool,
}

fn default_true() -> bool {
    true
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            link: true,
        }
    }
}

/// Table behavior knobs
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Entity whose records are listed; defaults to the facet's entity
    pub managed_entity: Option<Arc<Entity>>,
    pub pagination: bool,
    /// Refresh returns complete records, no second-stage fetch needed
    pub search_all_entries: bool,
    pub sort_enabled: bool,
    pub selectable: bool,
    pub row_enabled_attribute: Option<String>,
    pub row_disabled_attribute: Option<String>,
    pub details_facet: String,
    pub table_name: Option<String>,
    pub columns: Vec<Column>,
    pub page_length: usize,
    /// Method used by the refresh command
    pub method: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            managed_entity: None,
            pagination: true,
            search_all_entries: false,
            sort_enabled: true,
            selectable: true,
            row_enabled_attribute: None,
            row_disabled_attribute: None,
            details_facet: "default".to_string(),
            table_name: None,
            columns: Vec::new(),
            page_length: DEFAULT_PAGE_LENGTH,
            method: "find".to_string(),
        }
    }
}

/// Status line under the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableSummary {
    Empty,
    Text { text: String },
    Truncated { count: u64 },
    NoEntries,
    Paging { start: usize, end: usize, total: usize },
    Error { name: String, message: String },
}

impl fmt::Display for TableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSummary::Empty => Ok(()),
            TableSummary::Text { text } => write!(f, "{}", text),
            TableSummary::Truncated { count } => write!(
                f,
                "Query returned more results than the configured size limit. Displaying the first {} results.",
                count
            ),
            TableSummary::NoEntries => write!(f, "No entries."),
            TableSummary::Paging { start, end, total } => {
                write!(f, "Showing {} to {} of {} entries.", start, end, total)
            }
            TableSummary::Error { name, message } => write!(f, "{}: {}", name, message),
        }
    }
}

/// A displayed row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub pkey: String,
    pub record: Record,
    pub enabled: bool,
}

/// Page cut out of the key list, waiting for its full records
#[derive(Debug, Clone)]
struct PendingPage {
    generation: u64,
    records: Vec<(String, Record)>,
}

/// Content of a table facet
#[derive(Debug, Clone)]
pub struct TableContent {
    options: TableOptions,
    rows: Vec<Row>,
    summary: TableSummary,
    current_page: Option<usize>,
    total_pages: usize,
    pagination_visible: bool,
    selectable: bool,
    selected_values: Vec<String>,
    /// Bumped whenever displayed content is discarded
    generation: u64,
    pending: Option<PendingPage>,
}

pub type TableFacet = Facet<TableContent>;

impl TableContent {
    pub fn new(options: TableOptions) -> Self {
        let selectable = options.selectable;
        Self {
            options,
            rows: Vec::new(),
            summary: TableSummary::Empty,
            current_page: None,
            total_pages: 1,
            pagination_visible: false,
            selectable,
            selected_values: Vec::new(),
            generation: 0,
            pending: None,
        }
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn columns(&self) -> &[Column] {
        &self.options.columns
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.options.columns.iter().find(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn summary(&self) -> &TableSummary {
        &self.summary
    }

    pub fn current_page(&self) -> Option<usize> {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn pagination_visible(&self) -> bool {
        self.pagination_visible
    }

    /// Selection is off for read-only facets
    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn selected_values(&self) -> &[String] {
        &self.selected_values
    }

    /// Whether a second-stage fetch is outstanding for the displayed page
    pub fn awaiting_records(&self) -> bool {
        self.pending.is_some()
    }

    fn managed_entity<'a>(&'a self, core: &'a FacetCore) -> Option<&'a Arc<Entity>> {
        self.options.managed_entity.as_ref().or(core.entity())
    }

    fn primary_key(&self, core: &FacetCore) -> String {
        self.managed_entity(core)
            .map(|e| e.primary_key.clone())
            .unwrap_or_else(|| "cn".to_string())
    }

    /// Name the second-stage batch is issued under
    pub fn get_records_command_name(&self, core: &FacetCore) -> String {
        let entity = self.managed_entity(core).map(|e| e.name.as_str()).unwrap_or("");
        format!("{}_get_records", entity)
    }

    /// Find command for the current state: pkey prefix plus filter
    pub fn create_refresh_command(&self, core: &FacetCore) -> Command {
        let mut args = core.get_pkey_prefix();
        let filter = core
            .state_value("filter")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        args.push(filter);

        let entity = self.managed_entity(core).map(|e| e.name.clone());
        let mut request = Request::new(entity, self.options.method.clone()).with_args(args);
        if self.options.pagination {
            if !self.options.search_all_entries {
                request = request.with_option("pkey_only", Value::Bool(true));
            }
            request = request.with_option("sizelimit", Value::from(0));
        }
        Command::Single(request)
    }

    /// Batch of `show` commands for the given keys
    pub fn create_get_records_command(&self, core: &FacetCore, keys: &[String]) -> Command {
        let entity = self.managed_entity(core);
        let no_members = entity.is_some_and(|e| e.has_members);
        let commands = keys
            .iter()
            .map(|key| {
                let request = Request::new(entity.map(|e| e.name.clone()), "show").with_args(vec![key.clone()]);
                if no_members {
                    request.with_option("no_members", Value::Bool(true))
                } else {
                    request
                }
            })
            .collect();
        Command::Batch {
            name: self.get_records_command_name(core),
            commands,
        }
    }

    fn row_enabled(&self, record: &Record) -> bool {
        if let Some(attr) = &self.options.row_enabled_attribute {
            return record.get(attr).map(value_flag).unwrap_or(true);
        }
        if let Some(attr) = &self.options.row_disabled_attribute {
            return !record.get(attr).map(value_flag).unwrap_or(false);
        }
        true
    }

    fn load_records(&mut self, records: Vec<(String, Record)>) {
        self.rows = records
            .into_iter()
            .map(|(pkey, record)| Row {
                enabled: self.row_enabled(&record),
                pkey,
                record,
            })
            .collect();
    }

    fn load_all(&mut self, core: &FacetCore, data: &Value) {
        let pkey_name = self.primary_key(core);
        let records = result_records(data)
            .map(|record| (record_pkey(&record, &pkey_name), record))
            .collect();
        self.load_records(records);

        let truncated = data.pointer("/result/truncated").and_then(Value::as_bool).unwrap_or(false);
        self.summary = if truncated {
            TableSummary::Truncated {
                count: data.pointer("/result/count").and_then(Value::as_u64).unwrap_or(0),
            }
        } else {
            TableSummary::Text {
                text: data
                    .pointer("/result/summary")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            }
        };
    }

    fn load_page(&mut self, core: &mut FacetCore, data: &Value) {
        let pkey_name = self.primary_key(core);
        let mut records: IndexMap<String, Record> = IndexMap::new();
        for record in result_records(data) {
            records.insert(record_pkey(&record, &pkey_name), record);
        }

        let total = records.len();
        let page_length = self.options.page_length.max(1);
        self.total_pages = if total > 0 { total.div_ceil(page_length) } else { 1 };
        self.current_page = None;

        let page = match core.state_value("page").and_then(|v| v.as_int()) {
            None | Some(0) => 1,
            Some(page) => page,
        };
        if page < 1 {
            core.defer_state(StateSnapshot::new().with("page", 1_i64));
            return;
        }
        if page as usize > self.total_pages {
            core.defer_state(StateSnapshot::new().with("page", self.total_pages as i64));
            return;
        }
        let page = page as usize;
        self.current_page = Some(page);

        if total == 0 {
            self.summary = TableSummary::NoEntries;
            self.load_records(Vec::new());
            return;
        }

        let start = (page - 1) * page_length + 1;
        let end = (page * page_length).min(total);
        self.summary = TableSummary::Paging { start, end, total };

        if self.options.sort_enabled {
            records.sort_keys();
        }
        let page_records: Vec<(String, Record)> = records.into_iter().skip(start - 1).take(end - start + 1).collect();

        if self.options.columns.len() == 1 || self.options.search_all_entries {
            self.load_records(page_records);
            return;
        }

        let keys: Vec<String> = page_records.iter().map(|(key, _)| key.clone()).collect();
        let command = self.create_get_records_command(core, &keys);
        core.issue(
            FetchPurpose::Records {
                generation: self.generation,
                keys,
            },
            command,
        );
        self.pending = Some(PendingPage {
            generation: self.generation,
            records: page_records,
        });
    }

    /// Merge second-stage records into the pending page
    fn load_get_records(&mut self, core: &FacetCore, generation: u64, result: FetchResult) {
        let pending = match self.pending.take() {
            Some(pending) if pending.generation == generation => pending,
            other => {
                self.pending = other;
                tracing::debug!(facet = %core.name(), generation, "ignoring stale record batch");
                return;
            }
        };

        let failure = match &result {
            Err(error) => Some(error.clone()),
            Ok(Response::Batch(batch)) => batch.errors.first().cloned(),
            Ok(Response::Single(_)) => None,
        };
        if let Some(error) = failure {
            tracing::warn!(facet = %core.name(), error = %error, "record batch failed");
            self.load_records(Vec::new());
            self.summary = TableSummary::Error {
                name: error.name,
                message: error.message,
            };
            return;
        }

        let successes = match result {
            Ok(Response::Batch(batch)) => batch.successes,
            _ => Vec::new(),
        };
        let records = pending
            .records
            .into_iter()
            .enumerate()
            .map(|(i, (key, mut record))| {
                let full = successes.get(i).map(|s| s.get("result").unwrap_or(s));
                if let Some(Value::Object(full)) = full {
                    for (name, value) in full {
                        record.insert(name.clone(), value.clone());
                    }
                }
                (key, record)
            })
            .collect();
        self.load_records(records);
    }

    /// Replace the selection and raise `select_changed`
    pub fn select(&mut self, core: &mut FacetCore, values: Vec<String>) {
        if !self.selectable {
            tracing::debug!(facet = %core.name(), "selection ignored on a non-selectable table");
            return;
        }
        self.selected_values = values.clone();
        core.emit(FacetEvent::SelectChanged(values));
    }

    pub fn prev_page(&mut self, core: &mut FacetCore) -> bool {
        match self.current_page {
            Some(page) if page > 1 => {
                core.set_expired_flag();
                core.defer_state(StateSnapshot::new().with("page", (page - 1) as i64));
                true
            }
            _ => false,
        }
    }

    pub fn next_page(&mut self, core: &mut FacetCore) -> bool {
        match self.current_page {
            Some(page) if page < self.total_pages => {
                core.set_expired_flag();
                core.defer_state(StateSnapshot::new().with("page", (page + 1) as i64));
                true
            }
            _ => false,
        }
    }

    /// Jump to a page, clamped to the known page range
    pub fn set_page(&mut self, core: &mut FacetCore, page: i64) {
        let page = page.clamp(1, self.total_pages.max(1) as i64);
        core.set_expired_flag();
        core.defer_state(StateSnapshot::new().with("page", page));
    }

    /// Details facet and pkeys a linked primary-key value navigates to
    pub fn link_target(&self, core: &FacetCore, value: &str) -> Option<NavigationRequest> {
        let entity = self.managed_entity(core)?;
        let column = self.get_column(&entity.primary_key)?;
        if !column.link {
            return None;
        }

        let nested_in_owner = match (entity.containing_entity(), core.entity()) {
            (Some(containing), Some(owner)) => containing.name == owner.name,
            _ => false,
        };
        let mut pkeys = if nested_in_owner {
            core.get_pkeys(None).unwrap_or_default()
        } else {
            Vec::new()
        };
        pkeys.push(value.to_string());

        Some(NavigationRequest::Show {
            target: FacetRef::new(Some(entity.name.clone()), self.options.details_facet.clone()),
            pkeys,
        })
    }
}

impl FacetContent for TableContent {
    fn create_content(&mut self, core: &mut FacetCore) {
        self.selectable = self.options.selectable && !core.attribute_flag("read_only");
        self.rows.clear();
        self.pagination_visible = false;
    }

    fn clear(&mut self, _core: &mut FacetCore) {
        self.rows.clear();
        self.summary = TableSummary::Empty;
        self.pending = None;
        self.generation += 1;
    }

    fn refresh(&mut self, core: &mut FacetCore) {
        let command = self.create_refresh_command(core);
        core.issue(FetchPurpose::Refresh, command);
    }

    fn load(&mut self, core: &mut FacetCore, response: &Response) {
        self.generation += 1;
        self.pending = None;

        let data = match response.as_single() {
            Some(data) if !data.is_null() => data,
            _ => {
                self.rows.clear();
                self.summary = TableSummary::Empty;
                self.pagination_visible = false;
                return;
            }
        };

        self.current_page = Some(1);
        self.total_pages = 1;
        if self.options.pagination {
            self.load_page(core, data);
        } else {
            self.load_all(core, data);
        }
        self.pagination_visible = true;
    }

    fn on_response(&mut self, core: &mut FacetCore, purpose: FetchPurpose, result: FetchResult) {
        match purpose {
            FetchPurpose::Records { generation, .. } => self.load_get_records(core, generation, result),
            other => tracing::debug!(facet = %core.name(), purpose = ?other, "unhandled table response"),
        }
    }
}

impl Facet<TableContent> {
    pub fn select(&mut self, values: Vec<String>) -> FacetResult<()> {
        self.with_content(|table, core| table.select(core, values))
    }

    pub fn prev_page(&mut self) -> FacetResult<bool> {
        self.with_content(|table, core| table.prev_page(core))
    }

    pub fn next_page(&mut self) -> FacetResult<bool> {
        self.with_content(|table, core| table.next_page(core))
    }

    pub fn set_page(&mut self, page: i64) -> FacetResult<()> {
        self.with_content(|table, core| table.set_page(core, page))
    }

    /// Follow a primary-key link; false when the value is not linkable
    pub fn open_record(&mut self, value: &str) -> FacetResult<bool> {
        self.with_content(|table, core| match table.link_target(core, value) {
            Some(request) => {
                core.navigate(request);
                true
            }
            None => false,
        })
    }
}

fn result_records(data: &Value) -> impl Iterator<Item = Record> + '_ {
    data.pointer("/result/result")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|record| record.as_object().cloned())
}

/// Primary key of a record; multi-valued attributes use their first value
fn record_pkey(record: &Record, pkey_name: &str) -> String {
    match record.get(pkey_name) {
        Some(Value::Array(values)) => values.first().map(scalar_text).unwrap_or_default(),
        Some(value) => scalar_text(value),
        None => String::new(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Boolean reading of a record attribute (`TRUE`, `true`, `[true]`, ...)
fn value_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(values) => values.first().is_some_and(value_flag),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::{FacetLifecycle, FacetOptions};
    use crate::fetch::{BatchResponse, FetchError, OutgoingRequest};
    use facetkit_types::StateValue;
    use serde_json::json;

    fn user() -> Arc<Entity> {
        Arc::new(Entity::new("user").with_primary_key("uid").with_members(true))
    }

    fn table(options: TableOptions) -> TableFacet {
        let core = FacetCore::new(FacetOptions::new("search").with_entity(user()).with_container("main"));
        Facet::new(core, TableContent::new(options))
    }

    fn columns(names: &[&str]) -> Vec<Column> {
        names.iter().map(|n| Column::new(*n)).collect()
    }

    fn keys(n: usize) -> Value {
        let result: Vec<Value> = (0..n).map(|i| json!({"uid": [format!("user{:02}", i)]})).collect();
        json!({"result": {"result": result, "count": n}})
    }

    fn refresh_id(facet: &mut TableFacet) -> OutgoingRequest {
        facet.take_requests().into_iter().next().expect("refresh issued")
    }

    #[test]
    fn test_refresh_command_uses_prefix_and_filter() {
        let mut facet = table(TableOptions::default());
        facet.set_state(StateSnapshot::new().with("filter", "adm")).unwrap();
        facet.show().unwrap();

        let request = refresh_id(&mut facet);
        let Command::Single(find) = request.command else {
            panic!("expected a single find command");
        };
        assert_eq!(find.entity.as_deref(), Some("user"));
        assert_eq!(find.method, "find");
        assert_eq!(find.args, vec!["adm".to_string()]);
        assert_eq!(find.options.get("pkey_only"), Some(&json!(true)));
    }

    #[test]
    fn test_page_is_cut_and_records_fetched() {
        let mut facet = table(TableOptions {
            columns: columns(&["uid", "mail"]),
            page_length: 10,
            ..Default::default()
        });
        facet.set_state(StateSnapshot::new().with("page", 2)).unwrap();
        facet.show().unwrap();
        let refresh = refresh_id(&mut facet);

        facet.complete_fetch(refresh.id, Ok(Response::Single(keys(25)))).unwrap();
        assert_eq!(facet.content().total_pages(), 3);
        assert_eq!(facet.content().current_page(), Some(2));
        assert_eq!(
            facet.content().summary(),
            &TableSummary::Paging {
                start: 11,
                end: 20,
                total: 25
            }
        );
        assert!(facet.content().awaiting_records());

        let batch = refresh_id(&mut facet);
        let Command::Batch { name, commands } = &batch.command else {
            panic!("expected a batch");
        };
        assert_eq!(name, "user_get_records");
        assert_eq!(commands.len(), 10);
        assert_eq!(commands[0].args, vec!["user10".to_string()]);
        assert_eq!(commands[0].options.get("no_members"), Some(&json!(true)));

        let successes = (10..20)
            .map(|i| json!({"result": {"uid": [format!("user{:02}", i)], "mail": [format!("u{}@example.com", i)]}}))
            .collect();
        facet
            .complete_fetch(
                batch.id,
                Ok(Response::Batch(BatchResponse {
                    successes,
                    errors: vec![],
                })),
            )
            .unwrap();

        let rows = facet.content().rows();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].record["mail"], json!(["u10@example.com"]));
        assert!(!facet.content().awaiting_records());
    }

    #[test]
    fn test_page_out_of_range_is_clamped() {
        let mut facet = table(TableOptions {
            columns: columns(&["uid"]),
            ..Default::default()
        });
        facet.set_state(StateSnapshot::new().with("page", 9)).unwrap();
        facet.show().unwrap();
        let refresh = refresh_id(&mut facet);

        facet.complete_fetch(refresh.id, Ok(Response::Single(keys(30)))).unwrap();

        assert_eq!(facet.core().state_value("page"), Some(&StateValue::Int(2)));
        // the corrected state is stale against the displayed one, so it refreshes again
        let again = refresh_id(&mut facet);
        facet.complete_fetch(again.id, Ok(Response::Single(keys(30)))).unwrap();
        assert_eq!(facet.content().current_page(), Some(2));
        assert_eq!(facet.content().rows().len(), 10);
        assert_eq!(facet.content().rows()[0].pkey, "user20");
    }

    #[test]
    fn test_batch_error_degrades_inline() {
        let mut facet = table(TableOptions {
            columns: columns(&["uid", "mail"]),
            ..Default::default()
        });
        facet.show().unwrap();
        let refresh = refresh_id(&mut facet);
        facet.complete_fetch(refresh.id, Ok(Response::Single(keys(3)))).unwrap();
        let batch = refresh_id(&mut facet);

        facet
            .complete_fetch(batch.id, Err(FetchError::new("NetworkError", "connection reset")))
            .unwrap();

        assert!(facet.content().rows().is_empty());
        assert_eq!(facet.content().summary().to_string(), "NetworkError: connection reset");
        assert!(!facet.core().error_displayed());
    }

    #[test]
    fn test_stale_record_batch_is_ignored() {
        let mut facet = table(TableOptions {
            columns: columns(&["uid", "mail"]),
            ..Default::default()
        });
        facet.show().unwrap();
        let refresh = refresh_id(&mut facet);
        facet.complete_fetch(refresh.id, Ok(Response::Single(keys(3)))).unwrap();
        let old_batch = refresh_id(&mut facet);

        facet.set_state(StateSnapshot::new().with("filter", "x")).unwrap();
        let refresh = refresh_id(&mut facet);
        facet.complete_fetch(refresh.id, Ok(Response::Single(keys(2)))).unwrap();

        facet
            .complete_fetch(
                old_batch.id,
                Ok(Response::Batch(BatchResponse {
                    successes: vec![json!({"result": {"mail": ["stale"]}}); 3],
                    errors: vec![],
                })),
            )
            .unwrap();

        assert!(facet.content().rows().is_empty());
        assert!(facet.content().awaiting_records());
    }

    #[test]
    fn test_load_all_reports_truncation() {
        let mut facet = table(TableOptions {
            pagination: false,
            row_disabled_attribute: Some("nsaccountlock".into()),
            ..Default::default()
        });
        facet.show().unwrap();
        let refresh = refresh_id(&mut facet);
        let data = json!({"result": {
            "result": [{"uid": ["a"], "nsaccountlock": ["TRUE"]}, {"uid": ["b"]}],
            "count": 2,
            "truncated": true
        }});

        facet.complete_fetch(refresh.id, Ok(Response::Single(data))).unwrap();

        let table = facet.content();
        assert_eq!(table.rows().len(), 2);
        assert!(!table.rows()[0].enabled);
        assert!(table.rows()[1].enabled);
        assert_eq!(table.summary(), &TableSummary::Truncated { count: 2 });
        assert!(table.pagination_visible());
    }

    #[test]
    fn test_create_again_discards_rows() {
        let mut facet = table(TableOptions {
            pagination: false,
            ..Default::default()
        });
        facet.show().unwrap();
        let refresh = refresh_id(&mut facet);
        let data = json!({"result": {"result": [{"uid": ["a"]}, {"uid": ["b"]}], "count": 2}});
        facet.complete_fetch(refresh.id, Ok(Response::Single(data))).unwrap();
        assert_eq!(facet.content().rows().len(), 2);

        facet.create().unwrap();
        assert!(facet.content().rows().is_empty());
        assert!(!facet.content().pagination_visible());
        assert!(!facet.core().is_active());
    }

    #[test]
    fn test_paging_sets_expired_and_page() {
        let mut facet = table(TableOptions {
            columns: columns(&["uid"]),
            ..Default::default()
        });
        facet.show().unwrap();
        let refresh = refresh_id(&mut facet);
        facet.complete_fetch(refresh.id, Ok(Response::Single(keys(45)))).unwrap();

        assert!(!facet.prev_page().unwrap());
        assert!(facet.next_page().unwrap());
        assert_eq!(facet.core().state_value("page"), Some(&StateValue::Int(2)));
        assert_eq!(facet.take_requests().len(), 1);

        facet.set_page(99).unwrap();
        assert_eq!(facet.core().state_value("page"), Some(&StateValue::Int(3)));
    }

    #[test]
    fn test_read_only_disables_selection() {
        let core = FacetCore::new(
            FacetOptions::new("search")
                .with_entity(user())
                .with_container("main")
                .with_attribute("read_only", json!(true)),
        );
        let mut facet = Facet::new(core, TableContent::new(TableOptions::default()));
        facet.show().unwrap();
        assert!(!facet.content().is_selectable());

        facet.select(vec!["admin".into()]).unwrap();
        assert!(facet.content().selected_values().is_empty());
    }

    #[test]
    fn test_link_target_for_nested_entity() {
        let zone = Arc::new(Entity::new("dnszone").with_primary_key("idnsname"));
        let record = Arc::new(
            Entity::new("dnsrecord")
                .with_primary_key("idnsname")
                .contained_in(zone.clone()),
        );
        let core = FacetCore::new(FacetOptions::new("records").with_entity(zone));
        let mut facet = Facet::new(
            core,
            TableContent::new(TableOptions {
                managed_entity: Some(record),
                columns: columns(&["idnsname"]),
                ..Default::default()
            }),
        );
        facet
            .set_state(StateSnapshot::new().with("pkeys", vec!["example.com"]))
            .unwrap();

        let target = facet.content().link_target(facet.core(), "www").unwrap();
        assert_eq!(
            target,
            NavigationRequest::Show {
                target: FacetRef::new(Some("dnsrecord"), "default"),
                pkeys: vec!["example.com".into(), "www".into()],
            }
        );
    }

    #[test]
    fn test_value_flag() {
        assert!(value_flag(&json!(["TRUE"])));
        assert!(value_flag(&json!(true)));
        assert!(!value_flag(&json!("FALSE")));
        assert!(!value_flag(&json!([])));
    }
}
