//! Configuration parsing and validation.
//!
//! A console configuration declares the entity hierarchy and the facets
//! shown for each entity. It is loaded from YAML and checked for dangling
//! references before anything is built from it.

use crate::action_state::SummaryCondition;
use crate::facet::{RedirectInfo, DEFAULT_REDIRECT_CODES};
use crate::staleness::DEFAULT_EXPIRE_TIMEOUT;
use crate::table::{Column, DEFAULT_PAGE_LENGTH};
use facetkit_types::Token;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Unknown entity '{name}' referenced by {referenced_by}")]
    UnknownEntity { name: String, referenced_by: String },

    #[error("Entity '{0}' is declared more than once")]
    DuplicateEntity(String),

    #[error("Entity '{0}' contains itself")]
    EntityCycle(String),

    #[error("Facet '{0}' is declared more than once")]
    DuplicateFacet(String),

    #[error("No facet named '{0}'")]
    UnknownFacet(String),
}

/// Root of a console configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub entities: Vec<EntitySpec>,

    #[serde(default)]
    pub facets: Vec<FacetSpec>,

    #[serde(default)]
    pub session: SessionSpec,
}

fn default_true() -> bool {
    true
}

fn default_primary_key() -> String {
    String::from("cn")
}

fn default_redirect_facet() -> Option<String> {
    Some(String::from("search"))
}

fn default_expire_timeout() -> i64 {
    DEFAULT_EXPIRE_TIMEOUT
}

fn default_redirect_codes() -> Vec<i64> {
    DEFAULT_REDIRECT_CODES.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,

    #[serde(default)]
    pub containing_entity: Option<String>,

    #[serde(default = "default_true")]
    pub defines_key: bool,

    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    #[serde(default = "default_redirect_facet")]
    pub redirect_facet: Option<String>,

    #[serde(default)]
    pub has_members: bool,

    #[serde(default)]
    pub facet_groups: Vec<FacetGroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetGroupSpec {
    pub name: String,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub facets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetSpec {
    pub name: String,

    #[serde(default)]
    pub entity: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub tab_label: Option<String>,

    #[serde(default)]
    pub display_class: Option<String>,

    #[serde(default)]
    pub facet_group: Option<String>,

    /// Seconds; zero or less disables time-based expiry
    #[serde(default = "default_expire_timeout")]
    pub expire_timeout: i64,

    #[serde(default)]
    pub no_update: Option<bool>,

    #[serde(default)]
    pub redirect_info: Option<RedirectInfo>,

    #[serde(default = "default_redirect_codes")]
    pub redirect_error_codes: Vec<i64>,

    /// Method a non-table facet calls on refresh, with its pkeys as arguments
    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub actions: Vec<ActionSpec>,

    #[serde(default)]
    pub state: StateSpec,

    #[serde(default)]
    pub table: Option<TableSpec>,
}

impl FacetSpec {
    /// `entity/name`, or just the name for top-level facets
    pub fn qualified_name(&self) -> String {
        match &self.entity {
            Some(entity) => format!("{}/{}", entity, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSpec {
    #[serde(default)]
    pub evaluators: Vec<EvaluatorSpec>,

    #[serde(default)]
    pub summary_conditions: Vec<SummaryCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub visible: bool,

    #[serde(default)]
    pub enable_cond: Vec<Token>,

    #[serde(default)]
    pub disable_cond: Vec<Token>,

    #[serde(default)]
    pub show_cond: Vec<Token>,

    #[serde(default)]
    pub hide_cond: Vec<Token>,

    #[serde(default)]
    pub needs_confirm: bool,

    #[serde(default)]
    pub confirm_msg: Option<String>,

    #[serde(default)]
    pub confirm_dialog: Option<String>,
}

/// State evaluator declaration, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluatorSpec {
    Dirty {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        event: Option<String>,
    },
    Selected {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        event: Option<String>,
    },
    SelfService {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        event: Option<String>,
    },
    FacetAttr {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        event: Option<String>,
        attribute: String,
        value: serde_json::Value,
        state_value: Token,
    },
    ReadOnly {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        event: Option<String>,
    },
    AssociationType {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        event: Option<String>,
    },
}

/// A column given as a bare name or in full
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Name(String),
    Full(Column),
}

impl ColumnSpec {
    pub fn to_column(&self) -> Column {
        match self {
            ColumnSpec::Name(name) => Column::new(name.clone()),
            ColumnSpec::Full(column) => column.clone(),
        }
    }
}

fn default_details_facet() -> String {
    String::from("default")
}

fn default_page_length() -> usize {
    DEFAULT_PAGE_LENGTH
}

fn default_method() -> String {
    String::from("find")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    #[serde(default)]
    pub managed_entity: Option<String>,

    #[serde(default = "default_true")]
    pub pagination: bool,

    #[serde(default)]
    pub search_all_entries: bool,

    #[serde(default = "default_true")]
    pub sort_enabled: bool,

    #[serde(default = "default_true")]
    pub selectable: bool,

    #[serde(default)]
    pub row_enabled_attribute: Option<String>,

    #[serde(default)]
    pub row_disabled_attribute: Option<String>,

    #[serde(default = "default_details_facet")]
    pub details_facet: String,

    #[serde(default)]
    pub table_name: Option<String>,

    #[serde(default)]
    pub columns: Vec<ColumnSpec>,

    #[serde(default = "default_page_length")]
    pub page_length: usize,

    #[serde(default = "default_method")]
    pub method: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSpec {
    #[serde(default)]
    pub self_service: bool,
}

impl ConsoleConfig {
    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&contents)
    }

    /// Parse and validate YAML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: ConsoleConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySpec> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Find a facet by `name` or `entity/name`
    pub fn facet(&self, query: &str) -> Option<&FacetSpec> {
        match query.split_once('/') {
            Some((entity, name)) => self
                .facets
                .iter()
                .find(|f| f.name == name && f.entity.as_deref() == Some(entity)),
            None => self.facets.iter().find(|f| f.name == query),
        }
    }

    /// Facets shown for one entity, in declaration order
    pub fn facets_of<'a>(&'a self, entity: Option<&'a str>) -> impl Iterator<Item = &'a FacetSpec> + 'a {
        self.facets.iter().filter(move |f| f.entity.as_deref() == entity)
    }

    /// Check every cross-reference
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut entities: IndexMap<&str, &EntitySpec> = IndexMap::new();
        for entity in &self.entities {
            if entities.insert(entity.name.as_str(), entity).is_some() {
                return Err(ConfigError::DuplicateEntity(entity.name.clone()));
            }
        }

        for entity in &self.entities {
            if let Some(parent) = &entity.containing_entity {
                if !entities.contains_key(parent.as_str()) {
                    return Err(ConfigError::UnknownEntity {
                        name: parent.clone(),
                        referenced_by: format!("entity '{}'", entity.name),
                    });
                }
            }

            let mut seen = HashSet::new();
            let mut current = Some(entity);
            while let Some(e) = current {
                if !seen.insert(e.name.as_str()) {
                    return Err(ConfigError::EntityCycle(entity.name.clone()));
                }
                current = e
                    .containing_entity
                    .as_deref()
                    .and_then(|parent| entities.get(parent).copied());
            }
        }

        let mut facets = HashSet::new();
        for facet in &self.facets {
            let qualified = facet.qualified_name();
            if !facets.insert(qualified.clone()) {
                return Err(ConfigError::DuplicateFacet(qualified));
            }

            let referenced = facet
                .entity
                .iter()
                .chain(facet.table.iter().filter_map(|t| t.managed_entity.as_ref()))
                .chain(facet.redirect_info.iter().filter_map(|r| r.entity.as_ref()));
            for name in referenced {
                if !entities.contains_key(name.as_str()) {
                    return Err(ConfigError::UnknownEntity {
                        name: name.clone(),
                        referenced_by: format!("facet '{}'", qualified),
                    });
                }
            }
        }

        tracing::debug!(
            entities = self.entities.len(),
            facets = self.facets.len(),
            "configuration validated"
        );
        Ok(())
    }
}
