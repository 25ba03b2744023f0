use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::condition::Condition;

/// The kind of target a data source describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSourceType {
    /// A searchable collection of business objects.
    BusinessObject,

    /// A grouping of other data sources, e.g. the implicit `All` source.
    Category,

    /// A user defined grouping of data sources.
    UserCategory,
}

/// How a hierarchy attached to a data source or attribute is presented.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HierarchyDisplayType {
    StaticHierarchyFacet,
    DynamicHierarchyFacet,
    HierarchyResultView,
}

/// Metadata for a single attribute of a data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMetadata {
    pub id: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub is_hierarchy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_display_type: Option<HierarchyDisplayType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_name: Option<String>,
}

impl AttributeMetadata {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            is_hierarchy: false,
            hierarchy_display_type: None,
            hierarchy_name: None,
        }
    }

    pub fn hierarchy(
        id: impl Into<String>,
        label: impl Into<String>,
        display_type: HierarchyDisplayType,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            is_hierarchy: true,
            hierarchy_display_type: Some(display_type),
            hierarchy_name: None,
        }
    }
}

/// A queryable target.
///
/// Data sources are immutable value objects once registered; their
/// identity is the `id`, which the session registry keeps unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,

    pub label: String,

    #[serde(rename = "type")]
    pub ds_type: DataSourceType,

    #[serde(default)]
    pub is_hierarchy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_display_type: Option<HierarchyDisplayType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_attribute: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes_metadata: Vec<AttributeMetadata>,
}

impl DataSource {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        ds_type: DataSourceType,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ds_type,
            is_hierarchy: false,
            hierarchy_display_type: None,
            hierarchy_attribute: None,
            attributes_metadata: Vec::new(),
        }
    }

    /// The attribute folder navigation is anchored on, if any.
    ///
    /// Either an attribute declaring a static hierarchy facet, or the
    /// data source's own hierarchy attribute when the source itself is a
    /// hierarchy result view.
    pub fn folder_attribute(&self) -> Option<&str> {
        for attribute in &self.attributes_metadata {
            if attribute.is_hierarchy
                && attribute.hierarchy_display_type
                    == Some(HierarchyDisplayType::StaticHierarchyFacet)
            {
                return Some(&attribute.id);
            }
        }

        if self.is_hierarchy
            && self.hierarchy_display_type == Some(HierarchyDisplayType::HierarchyResultView)
        {
            return self.hierarchy_attribute.as_deref();
        }

        None
    }
}

/// A virtual view over a real data source.
///
/// A filtered data source is never queried directly. Any query built on
/// top of it is rewritten at dispatch time to target the underlying data
/// source with `filter_condition` merged into the query's own condition
/// tree.
#[derive(Debug, Clone)]
pub struct FilteredDataSource {
    pub id: String,
    pub label: String,
    pub data_source: Arc<DataSource>,
    pub filter_condition: Condition,
}

impl FilteredDataSource {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        data_source: Arc<DataSource>,
        filter_condition: Condition,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            data_source,
            filter_condition,
        }
    }
}

impl Serialize for FilteredDataSource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("FilteredDataSource", 5)?;
        state.serialize_field("type", "filtered")?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("dataSource", self.data_source.as_ref())?;
        state.serialize_field("filterCondition", &self.filter_condition)?;
        state.end()
    }
}

/// A shared handle onto a registered data source.
///
/// Comparison is identity comparison over the variant and id, never a
/// deep comparison of the metadata.
#[derive(Debug, Clone)]
pub enum DataSourceRef {
    Plain(Arc<DataSource>),
    Filtered(Arc<FilteredDataSource>),
}

impl DataSourceRef {
    pub fn plain(data_source: DataSource) -> Self {
        Self::Plain(Arc::new(data_source))
    }

    pub fn filtered(data_source: FilteredDataSource) -> Self {
        Self::Filtered(Arc::new(data_source))
    }

    #[inline]
    pub fn id(&self) -> &str {
        match self {
            Self::Plain(ds) => &ds.id,
            Self::Filtered(ds) => &ds.id,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        match self {
            Self::Plain(ds) => &ds.label,
            Self::Filtered(ds) => &ds.label,
        }
    }

    /// The effective type; a filtered source presents as its base type.
    pub fn ds_type(&self) -> DataSourceType {
        match self {
            Self::Plain(ds) => ds.ds_type,
            Self::Filtered(ds) => ds.data_source.ds_type,
        }
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered(_))
    }

    pub fn is_business_object(&self) -> bool {
        self.ds_type() == DataSourceType::BusinessObject
    }

    /// Attribute metadata; a filtered source exposes its base's.
    pub fn attributes_metadata(&self) -> &[AttributeMetadata] {
        match self {
            Self::Plain(ds) => &ds.attributes_metadata,
            Self::Filtered(ds) => &ds.data_source.attributes_metadata,
        }
    }

    /// See [`DataSource::folder_attribute`].
    pub fn folder_attribute(&self) -> Option<&str> {
        match self {
            Self::Plain(ds) => ds.folder_attribute(),
            Self::Filtered(ds) => ds.data_source.folder_attribute(),
        }
    }
}

impl PartialEq for DataSourceRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a.id == b.id,
            (Self::Filtered(a), Self::Filtered(b)) => a.id == b.id,
            _ => false,
        }
    }
}

impl Serialize for DataSourceRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Plain(ds) => ds.serialize(serializer),
            Self::Filtered(ds) => ds.serialize(serializer),
        }
    }
}
