use std::sync::Arc;

use serde::Serialize;

use crate::condition::{ComplexCondition, Condition, LogicalOperator};
use crate::datasource::DataSourceRef;
use crate::error::{Result, SearchError};
use crate::query::QueryContext;

/// The search term treated as "no term" besides the empty string.
pub const WILDCARD_TERM: &str = "*";

/// A complete description of what to search for: a data source, a free
/// text term and a structured condition tree.
///
/// Filters are plain values. Queries compare them to decide whether a
/// dispatch is needed, so everything relevant to the comparison lives in
/// the three serialized fields; the context only carries session flags.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    data_source: DataSourceRef,

    search_term: String,

    root_condition: Condition,

    #[serde(skip)]
    ctx: Arc<QueryContext>,
}

impl Filter {
    pub fn new(ctx: Arc<QueryContext>, data_source: DataSourceRef) -> Self {
        Self {
            data_source,
            search_term: String::new(),
            root_condition: Condition::empty_root(),
            ctx,
        }
    }

    #[inline]
    pub fn data_source(&self) -> &DataSourceRef {
        &self.data_source
    }

    #[inline]
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    #[inline]
    pub fn root_condition(&self) -> &Condition {
        &self.root_condition
    }

    pub(crate) fn ctx(&self) -> &Arc<QueryContext> {
        &self.ctx
    }

    /// Value equality: data source identity, term equality and structural
    /// equality of the condition tree. The session context is excluded.
    pub fn equals(&self, other: &Filter) -> bool {
        self.data_source == other.data_source
            && self.search_term == other.search_term
            && self.root_condition == other.root_condition
    }

    pub fn set_search_term(&mut self, search_term: impl Into<String>) {
        self.search_term = search_term.into();
    }

    /// Switches the filter to another data source.
    ///
    /// A no-op for the identical data source; otherwise the condition
    /// tree is reset, conditions never carry across data source changes.
    pub fn set_data_source(&mut self, data_source: DataSourceRef) {
        if self.data_source == data_source {
            return;
        }

        self.data_source = data_source;
        match &mut self.root_condition {
            Condition::Complex(root) => root.reset_conditions(),
            root => *root = Condition::empty_root(),
        }
    }

    pub fn set_root_condition(&mut self, root_condition: Condition) {
        self.root_condition = root_condition;
    }

    /// Inserts a condition into the attribute group it belongs to.
    ///
    /// Top level children of the root act as per-attribute `Or` groups.
    /// The group matching the condition's attribute is reused when
    /// present, created otherwise, and an already contained equal
    /// condition is left alone so the group never holds duplicates.
    pub fn auto_insert_condition(&mut self, condition: Condition) -> Result<()> {
        let root = match &mut self.root_condition {
            Condition::Complex(root) => root,
            Condition::Simple(_) => {
                return Err(SearchError::CanOnlyAutoInsertComplexCondition)
            },
        };

        let attribute = condition.first_attribute().map(str::to_owned);

        let group_index = root.conditions.iter().position(|child| {
            matches!(
                child,
                Condition::Complex(group)
                    if group.first_attribute() == attribute.as_deref()
            )
        });

        let group_index = match group_index {
            Some(index) => index,
            None => {
                root.conditions
                    .push(Condition::Complex(ComplexCondition::new(LogicalOperator::Or)));
                root.conditions.len() - 1
            },
        };

        if let Condition::Complex(group) = &mut root.conditions[group_index] {
            if group.conditions.iter().any(|existing| existing == &condition) {
                debug!(
                    "condition for attribute {:?} already present, skipping insert",
                    attribute,
                );
                return Ok(());
            }

            group.conditions.push(condition);
        }

        Ok(())
    }

    /// Removes every condition structurally equal to the given one, at
    /// any depth, and prunes complex groups left without children.
    pub fn auto_remove_condition(&mut self, condition: &Condition) {
        if let Condition::Complex(root) = &mut self.root_condition {
            remove_matching(root, condition);
        }
    }

    /// True when the filter describes pure folder navigation: folder
    /// mode is enabled, a folder attribute exists, it is the only
    /// constrained attribute and there is no effective search term.
    pub fn is_folder_mode(&self) -> bool {
        if !self.ctx.folder_mode {
            return false;
        }

        let folder_attribute = match self.data_source.folder_attribute() {
            Some(attribute) => attribute,
            None => return false,
        };

        let constrained = self.root_condition.attributes();
        if constrained.len() != 1 || constrained[0] != folder_attribute {
            return false;
        }

        self.search_term.is_empty() || self.search_term == WILDCARD_TERM
    }

    /// The attribute folder navigation is anchored on.
    ///
    /// Asking a data source without any hierarchy facet for its folder
    /// attribute is a logic bug upstream, not a user error.
    pub fn folder_attribute(&self) -> Result<String> {
        match self.data_source.folder_attribute() {
            Some(attribute) => Ok(attribute.to_string()),
            None => Err(SearchError::Program(format!(
                "data source {:?} declares no folder attribute",
                self.data_source.id(),
            ))),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Replaces data source and condition tree in one step without the
    /// reset semantics of the setters. Used by the dispatch transform,
    /// which must keep everything else exactly as captured.
    pub(crate) fn replace_for_dispatch(
        &mut self,
        data_source: DataSourceRef,
        root_condition: Condition,
    ) {
        self.data_source = data_source;
        self.root_condition = root_condition;
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

fn remove_matching(parent: &mut ComplexCondition, condition: &Condition) {
    let mut index = 0;
    while index < parent.conditions.len() {
        let remove = {
            let child = &mut parent.conditions[index];
            if child == condition {
                true
            } else if let Condition::Complex(group) = child {
                remove_matching(group, condition);
                group.conditions.is_empty()
            } else {
                false
            }
        };

        if remove {
            parent.conditions.remove(index);
        } else {
            index += 1;
        }
    }
}
