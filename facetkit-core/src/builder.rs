//! Build entities and facets from a validated configuration

use crate::action::Action;
use crate::clock::{Clock, SystemClock};
use crate::config::{ActionSpec, ConfigError, ConsoleConfig, EntitySpec, EvaluatorSpec, FacetSpec};
use crate::entity::{Entity, FacetGroup};
use crate::evaluator::{DirtyEvaluator, FacetAttrEvaluator, SelectedEvaluator, SelfServiceEvaluator, StateEvaluator};
use crate::facet::{Facet, FacetCore, FacetLifecycle, FacetOptions, PlainContent, PlainFacet};
use crate::table::{TableContent, TableFacet, TableOptions};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Process-wide session facts injected into evaluators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub self_service: bool,
}

/// A facet built from configuration
pub enum BuiltFacet {
    Plain(PlainFacet),
    Table(TableFacet),
}

impl BuiltFacet {
    pub fn lifecycle(&self) -> &dyn FacetLifecycle {
        match self {
            BuiltFacet::Plain(facet) => facet,
            BuiltFacet::Table(facet) => facet,
        }
    }

    pub fn lifecycle_mut(&mut self) -> &mut dyn FacetLifecycle {
        match self {
            BuiltFacet::Plain(facet) => facet,
            BuiltFacet::Table(facet) => facet,
        }
    }

    pub fn as_table(&self) -> Option<&TableFacet> {
        match self {
            BuiltFacet::Table(facet) => Some(facet),
            BuiltFacet::Plain(_) => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableFacet> {
        match self {
            BuiltFacet::Table(facet) => Some(facet),
            BuiltFacet::Plain(_) => None,
        }
    }
}

/// Turns a [`ConsoleConfig`] into entities and facets
pub struct ConsoleBuilder {
    config: ConsoleConfig,
    entities: IndexMap<String, Arc<Entity>>,
    session: SessionContext,
    clock: Arc<dyn Clock>,
}

impl ConsoleBuilder {
    pub fn new(config: ConsoleConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut entities = IndexMap::new();
        for spec in &config.entities {
            build_entity(&config, spec, &mut entities)?;
        }

        let session = SessionContext {
            self_service: config.session.self_service,
        };

        Ok(Self {
            config,
            entities,
            session,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn session(&self) -> SessionContext {
        self.session
    }

    pub fn entity(&self, name: &str) -> Option<&Arc<Entity>> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.entities.values()
    }

    /// Build the facet named `name` or `entity/name`
    pub fn build(&self, query: &str, container: Option<&str>) -> Result<BuiltFacet, ConfigError> {
        let spec = self
            .config
            .facet(query)
            .ok_or_else(|| ConfigError::UnknownFacet(query.to_string()))?;
        self.build_facet(spec, container)
    }

    pub fn build_facet(&self, spec: &FacetSpec, container: Option<&str>) -> Result<BuiltFacet, ConfigError> {
        let entity = self.lookup(spec.entity.as_deref(), &spec.qualified_name())?;

        let mut options = FacetOptions::new(spec.name.clone());
        options.entity = entity;
        options.label = spec.label.clone();
        options.title = spec.title.clone();
        options.tab_label = spec.tab_label.clone();
        options.display_class = spec.display_class.clone();
        options.facet_group = spec.facet_group.clone();
        options.expire_timeout = spec.expire_timeout;
        options.no_update = spec.no_update;
        options.attributes = spec.attributes.clone();
        options.redirect_info = spec.redirect_info.clone();
        options.redirect_codes = spec.redirect_error_codes.clone();
        options.summary_conditions = spec.state.summary_conditions.clone();
        options.tab_labels = self.tab_labels(spec.entity.as_deref());
        options.container = container.map(str::to_string);

        let mut core = FacetCore::new(options).with_clock(self.clock.clone());
        for evaluator in &spec.state.evaluators {
            core.action_state.add_evaluator(self.build_evaluator(evaluator));
        }
        for action in &spec.actions {
            core.actions.add(build_action(action));
        }

        tracing::debug!(
            facet = %spec.qualified_name(),
            table = spec.table.is_some(),
            evaluators = spec.state.evaluators.len(),
            actions = spec.actions.len(),
            "facet built"
        );

        let Some(table) = &spec.table else {
            let content = match &spec.method {
                Some(method) => PlainContent::fetching(method.clone()),
                None => PlainContent::new(),
            };
            return Ok(BuiltFacet::Plain(Facet::new(core, content)));
        };

        let options = TableOptions {
            managed_entity: self.lookup(table.managed_entity.as_deref(), &spec.qualified_name())?,
            pagination: table.pagination,
            search_all_entries: table.search_all_entries,
            sort_enabled: table.sort_enabled,
            selectable: table.selectable,
            row_enabled_attribute: table.row_enabled_attribute.clone(),
            row_disabled_attribute: table.row_disabled_attribute.clone(),
            details_facet: table.details_facet.clone(),
            table_name: table.table_name.clone(),
            columns: table.columns.iter().map(|c| c.to_column()).collect(),
            page_length: table.page_length,
            method: table.method.clone(),
        };
        Ok(BuiltFacet::Table(Facet::new(core, TableContent::new(options))))
    }

    fn lookup(&self, name: Option<&str>, referenced_by: &str) -> Result<Option<Arc<Entity>>, ConfigError> {
        let Some(name) = name else {
            return Ok(None);
        };
        self.entities
            .get(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| ConfigError::UnknownEntity {
                name: name.to_string(),
                referenced_by: format!("facet '{}'", referenced_by),
            })
    }

    /// Tab labels of every facet declared for an entity
    fn tab_labels(&self, entity: Option<&str>) -> BTreeMap<String, String> {
        self.config
            .facets_of(entity)
            .filter_map(|f| {
                f.tab_label
                    .clone()
                    .or_else(|| f.label.clone())
                    .map(|label| (f.name.clone(), label))
            })
            .collect()
    }

    fn build_evaluator(&self, spec: &EvaluatorSpec) -> Box<dyn StateEvaluator> {
        match spec.clone() {
            EvaluatorSpec::Dirty { name, event } => Box::new(DirtyEvaluator::new(name, event)),
            EvaluatorSpec::Selected { name, event } => Box::new(SelectedEvaluator::new(name, event)),
            EvaluatorSpec::SelfService { name, event } => {
                Box::new(SelfServiceEvaluator::new(name, event, self.session.self_service))
            }
            EvaluatorSpec::FacetAttr {
                name,
                event,
                attribute,
                value,
                state_value,
            } => Box::new(FacetAttrEvaluator::new(name, event, attribute, value, state_value)),
            EvaluatorSpec::ReadOnly { name, event } => Box::new(FacetAttrEvaluator::read_only(name, event)),
            EvaluatorSpec::AssociationType { name, event } => {
                Box::new(FacetAttrEvaluator::association_type(name, event))
            }
        }
    }
}

/// Build an entity after its containing entity
fn build_entity(
    config: &ConsoleConfig,
    spec: &EntitySpec,
    built: &mut IndexMap<String, Arc<Entity>>,
) -> Result<Arc<Entity>, ConfigError> {
    if let Some(entity) = built.get(&spec.name) {
        return Ok(entity.clone());
    }

    let mut entity = Entity::new(spec.name.clone())
        .with_defines_key(spec.defines_key)
        .with_primary_key(spec.primary_key.clone())
        .with_redirect_facet(spec.redirect_facet.clone())
        .with_members(spec.has_members);

    if let Some(parent) = &spec.containing_entity {
        let parent_spec = config.entity(parent).ok_or_else(|| ConfigError::UnknownEntity {
            name: parent.clone(),
            referenced_by: format!("entity '{}'", spec.name),
        })?;
        let parent = build_entity(config, parent_spec, built)?;
        entity = entity.contained_in(parent);
    }

    for group in &spec.facet_groups {
        let mut facet_group = FacetGroup::new(group.name.clone(), group.label.clone());
        for facet in &group.facets {
            facet_group.add_facet(facet.clone());
        }
        entity = entity.with_facet_group(facet_group);
    }

    let entity = Arc::new(entity);
    built.insert(spec.name.clone(), entity.clone());
    Ok(entity)
}

fn build_action(spec: &ActionSpec) -> Action {
    let mut action = Action::new(spec.name.clone())
        .with_enable_cond(spec.enable_cond.clone(), spec.disable_cond.clone())
        .with_show_cond(spec.show_cond.clone(), spec.hide_cond.clone())
        .with_initial_flags(spec.enabled, spec.visible);
    if let Some(label) = &spec.label {
        action = action.with_label(label.clone());
    }
    if spec.needs_confirm {
        action = action.with_confirm(spec.confirm_msg.clone(), spec.confirm_dialog.clone());
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::FacetEvent;
    use facetkit_types::tokens;

    const CONFIG: &str = r#"
entities:
  - name: group
    has_members: true
    facet_groups:
      - name: member
        label: "${primary_key} members"
        facets: [member_user]
  - name: user
    primary_key: uid
facets:
  - name: details
    entity: group
    label: Settings
    method: show
    state:
      evaluators:
        - type: self_service
        - type: dirty
  - name: member_user
    entity: group
    tab_label: Users
    attributes:
      read_only: true
    actions:
      - name: remove
        enable_cond: [item-selected]
        disable_cond: [read-only]
        needs_confirm: true
        confirm_msg: Remove members?
    state:
      evaluators:
        - type: selected
        - type: read_only
    table:
      managed_entity: user
      columns: [uid]
session:
  self_service: true
"#;

    fn builder() -> ConsoleBuilder {
        ConsoleBuilder::new(ConsoleConfig::parse(CONFIG).unwrap()).unwrap()
    }

    #[test]
    fn test_entities_built() {
        let builder = builder();
        let group = builder.entity("group").unwrap();
        assert!(group.has_members);
        assert_eq!(group.facet_group("member").unwrap().facets(), ["member_user".to_string()]);
        assert_eq!(builder.entity("user").unwrap().primary_key, "uid");
        assert_eq!(builder.entities().count(), 2);
    }

    #[test]
    fn test_plain_facet_with_injected_session() {
        let builder = builder();
        let mut facet = builder.build("group/details", Some("main")).unwrap();
        assert!(facet.as_table().is_none());

        let facet = facet.lifecycle_mut();
        assert_eq!(facet.core().title(), Some("Settings"));
        facet.emit(FacetEvent::PostLoad);
        assert_eq!(facet.core().tokens(), tokens(["self-service"]));
    }

    #[test]
    fn test_table_facet_actions_and_evaluators() {
        let builder = builder();
        let mut built = builder.build("member_user", Some("main")).unwrap();
        let table = built.as_table().unwrap();
        assert!(table.content().options().managed_entity.is_some());
        assert_eq!(table.content().columns().len(), 1);

        let facet = built.lifecycle_mut();
        let remove = facet.core().actions.get("remove").unwrap();
        assert!(remove.needs_confirm);
        assert_eq!(remove.confirm_message(), "Remove members?");

        facet.emit(FacetEvent::PostLoad);
        facet.emit(FacetEvent::SelectChanged(vec!["alice".into()]));
        assert_eq!(facet.core().tokens(), tokens(["item-selected", "read-only"]));
        assert!(!facet.core().actions.get("remove").unwrap().is_enabled());
    }

    #[test]
    fn test_tab_labels_fall_back_to_label() {
        let builder = builder();
        let labels = builder.tab_labels(Some("group"));
        assert_eq!(labels.get("details").map(String::as_str), Some("Settings"));
        assert_eq!(labels.get("member_user").map(String::as_str), Some("Users"));
    }

    #[test]
    fn test_unknown_facet() {
        let builder = builder();
        assert!(matches!(
            builder.build("nope", None),
            Err(ConfigError::UnknownFacet(_))
        ));
    }
}
