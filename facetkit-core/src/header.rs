//! Facet header model
//!
//! Holds what the view needs to render a facet header: whether the facet's
//! tab is selected, facet-group labels, per-facet tab labels with record
//! counts, and the current action-state summary. Rendering itself is left
//! to the view.

use crate::action_state::Summary;
use crate::entity::FacetGroup;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Longest pkey shown inside a group label
pub const MAX_LABEL_PKEY: usize = 20;

/// Label of one facet tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabLabel {
    pub facet: String,
    pub text: String,
    pub count: Option<usize>,
}

/// Label of one facet group and its tabs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupHeader {
    pub name: String,
    pub label: String,
    /// Full pkey, shown as a tooltip when the label truncates it
    pub title: Option<String>,
    pub tabs: Vec<TabLabel>,
}

/// Header state of one facet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetHeader {
    pub title: String,
    pub tab_selected: bool,
    pub groups: Vec<GroupHeader>,
    /// Space-separated status classes from the last non-empty summary
    pub status_class: Option<String>,
    pub status_tooltip: Option<String>,
    #[serde(skip)]
    tab_labels: BTreeMap<String, String>,
}

impl FacetHeader {
    /// `tab_labels` maps sibling facet names to their tab labels
    pub fn new(title: impl Into<String>, tab_labels: BTreeMap<String, String>) -> Self {
        Self {
            title: title.into(),
            tab_labels,
            ..Default::default()
        }
    }

    pub fn select_tab(&mut self) {
        self.tab_selected = true;
    }

    pub fn deselect_tab(&mut self) {
        self.tab_selected = false;
    }

    fn tab_label(&self, facet: &str) -> String {
        self.tab_labels
            .get(facet)
            .cloned()
            .unwrap_or_else(|| facet.to_string())
    }

    /// Rebuild group and tab labels from loaded data
    ///
    /// A loaded result object carrying a list under a facet's name shows that
    /// list's length next to the facet's tab label.
    pub fn load(&mut self, data: Option<&Value>, pkey: &str, groups: &[FacetGroup]) {
        let Some(data) = data else {
            return;
        };
        let result = data.pointer("/result/result");

        self.groups = groups
            .iter()
            .filter(|group| group.get_facet_count() > 0)
            .map(|group| {
                let label = match (&group.label, pkey.is_empty()) {
                    (Some(label), false) => label.replace("${primary_key}", &limit_text(pkey, MAX_LABEL_PKEY)),
                    _ => String::new(),
                };

                let tabs = group
                    .facets()
                    .iter()
                    .map(|facet| {
                        let tab_label = self.tab_label(facet);
                        let count = result
                            .and_then(|r| r.get(facet.as_str()))
                            .and_then(Value::as_array)
                            .map(Vec::len);
                        let text = match count {
                            Some(n) => format!("{} ({})", tab_label, n),
                            None => tab_label,
                        };
                        TabLabel {
                            facet: facet.clone(),
                            text,
                            count,
                        }
                    })
                    .collect();

                GroupHeader {
                    name: group.name.clone(),
                    label,
                    title: (!pkey.is_empty()).then(|| pkey.to_string()),
                    tabs,
                }
            })
            .collect();
    }

    /// Apply a summary; summaries with no status classes leave the header alone
    pub fn update_summary(&mut self, summary: &Summary) {
        if summary.state.is_empty() {
            return;
        }
        let classes: Vec<&str> = summary.state.iter().map(|t| t.as_str()).collect();
        self.status_class = Some(classes.join(" "));
        self.status_tooltip = Some(summary.description.clone());
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Shorten text to `max` characters, ending with an ellipsis when cut
pub fn limit_text(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let kept: String = value.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
