use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A comparison operand.
///
/// This is deliberately a small closed set; richer values (dates,
/// geometries) are passed through as their text form by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Double(f64),
    Bool(bool),
}

impl AttributeValue {
    pub fn as_string(&self) -> String {
        match self {
            Self::Text(v) => v.clone(),
            Self::Integer(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// The comparison applied by a simple condition.
///
/// `ChildOf` and `DescendantOf` express hierarchy navigation and are what
/// folder style filters are built from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
    BetweenIncluding,
    ChildOf,
    DescendantOf,
}

/// How the children of a complex condition are combined.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

/// An attribute level comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleCondition {
    pub attribute: String,

    pub operator: ComparisonOperator,

    pub value: AttributeValue,

    /// Lower bound for `BetweenIncluding` conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_low: Option<AttributeValue>,

    /// Upper bound for `BetweenIncluding` conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_high: Option<AttributeValue>,
}

impl SimpleCondition {
    pub fn new(
        attribute: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: value.into(),
            value_low: None,
            value_high: None,
        }
    }

    /// A range comparison over `[low, high]`.
    ///
    /// The primary value mirrors the lower bound so a between condition
    /// still carries a single representative value.
    pub fn between(
        attribute: impl Into<String>,
        low: impl Into<AttributeValue>,
        high: impl Into<AttributeValue>,
    ) -> Self {
        let low = low.into();
        Self {
            attribute: attribute.into(),
            operator: ComparisonOperator::BetweenIncluding,
            value: low.clone(),
            value_low: Some(low),
            value_high: Some(high.into()),
        }
    }
}

/// A boolean combination of conditions.
///
/// The order of `conditions` is significant for equality and for the
/// serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexCondition {
    pub operator: LogicalOperator,
    pub conditions: Vec<Condition>,
}

impl ComplexCondition {
    pub fn new(operator: LogicalOperator) -> Self {
        Self {
            operator,
            conditions: Vec::new(),
        }
    }

    pub fn with_conditions(operator: LogicalOperator, conditions: Vec<Condition>) -> Self {
        Self {
            operator,
            conditions,
        }
    }

    /// Empties the children in place, keeping the operator identity.
    pub fn reset_conditions(&mut self) {
        self.conditions.clear();
    }

    /// The attribute of the first simple condition found depth first.
    ///
    /// Complex conditions handled by the filter's auto insert/remove
    /// machinery are assumed to be attribute homogeneous, so the first
    /// hit stands in for the whole group. Mixed attribute groups are not
    /// detected and would be grouped by their first attribute only.
    pub fn first_attribute(&self) -> Option<&str> {
        for condition in &self.conditions {
            if let Some(attribute) = condition.first_attribute() {
                return Some(attribute);
            }
        }

        None
    }
}

/// A node of the condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    Simple(SimpleCondition),
    Complex(ComplexCondition),
}

impl Condition {
    /// A fresh, empty `And` combination, the default root of a filter.
    pub fn empty_root() -> Self {
        Self::Complex(ComplexCondition::new(LogicalOperator::And))
    }

    pub fn simple(
        attribute: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self::Simple(SimpleCondition::new(attribute, operator, value))
    }

    /// True when the node holds no effective comparison, i.e. a complex
    /// condition whose children are all empty themselves.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Simple(_) => false,
            Self::Complex(complex) => complex.conditions.iter().all(|c| c.is_empty()),
        }
    }

    /// See [`ComplexCondition::first_attribute`].
    pub fn first_attribute(&self) -> Option<&str> {
        match self {
            Self::Simple(simple) => Some(&simple.attribute),
            Self::Complex(complex) => complex.first_attribute(),
        }
    }

    /// Every attribute referenced anywhere in the tree, deduplicated,
    /// in first visit order.
    pub fn attributes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut collected = Vec::new();
        self.collect_attributes(&mut seen, &mut collected);

        collected
    }

    fn collect_attributes(&self, seen: &mut HashSet<String>, collected: &mut Vec<String>) {
        match self {
            Self::Simple(simple) => {
                if seen.insert(simple.attribute.clone()) {
                    collected.push(simple.attribute.clone());
                }
            },
            Self::Complex(complex) => {
                for child in &complex.conditions {
                    child.collect_attributes(seen, collected);
                }
            },
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn country(value: &str) -> Condition {
        Condition::simple("Country", ComparisonOperator::Eq, value)
    }

    #[test]
    fn structural_equality_ignores_references() {
        let a = country("US");
        let b = country("US");

        assert_eq!(a, b);
        assert_ne!(a, country("DE"));
    }

    #[test]
    fn complex_equality_is_order_significant() {
        let a = Condition::Complex(ComplexCondition::with_conditions(
            LogicalOperator::Or,
            vec![country("US"), country("DE")],
        ));
        let b = Condition::Complex(ComplexCondition::with_conditions(
            LogicalOperator::Or,
            vec![country("DE"), country("US")],
        ));

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn clone_is_deep() {
        let original = Condition::Complex(ComplexCondition::with_conditions(
            LogicalOperator::And,
            vec![country("US")],
        ));

        let mut cloned = original.clone();
        if let Condition::Complex(complex) = &mut cloned {
            complex.conditions.push(country("DE"));
        }

        if let Condition::Complex(complex) = &original {
            assert_eq!(complex.conditions.len(), 1);
        } else {
            panic!("root should stay complex");
        }
    }

    #[test]
    fn attributes_are_collected_across_nesting() {
        let tree = Condition::Complex(ComplexCondition::with_conditions(
            LogicalOperator::And,
            vec![
                Condition::Complex(ComplexCondition::with_conditions(
                    LogicalOperator::Or,
                    vec![country("US"), country("DE")],
                )),
                Condition::simple("City", ComparisonOperator::Eq, "Berlin"),
            ],
        ));

        assert_eq!(tree.attributes(), vec!["Country".to_string(), "City".to_string()]);
        assert_eq!(tree.first_attribute(), Some("Country"));
    }

    #[test]
    fn reset_conditions_keeps_operator() {
        let mut complex = ComplexCondition::with_conditions(
            LogicalOperator::Or,
            vec![country("US")],
        );

        complex.reset_conditions();

        assert!(complex.conditions.is_empty());
        assert_eq!(complex.operator, LogicalOperator::Or);
    }

    #[test]
    fn nested_empty_complexes_count_as_empty() {
        let tree = Condition::Complex(ComplexCondition::with_conditions(
            LogicalOperator::And,
            vec![Condition::Complex(ComplexCondition::new(LogicalOperator::Or))],
        ));

        assert!(tree.is_empty());
        assert!(!country("US").is_empty());
    }

    #[test]
    fn serialized_shape_is_tagged() {
        let condition = Condition::simple("Country", ComparisonOperator::Eq, "US");
        let value = condition.to_json().unwrap();

        assert_eq!(value["type"], "simple");
        assert_eq!(value["attribute"], "Country");
        assert_eq!(value["operator"], "eq");
        assert_eq!(value["value"], "US");
    }

    #[test]
    fn between_serializes_bounds() {
        let condition = Condition::Simple(SimpleCondition::between("Price", 10i64, 20i64));
        let value = condition.to_json().unwrap();

        assert_eq!(value["operator"], "between-including");
        assert_eq!(value["valueLow"], 10);
        assert_eq!(value["valueHigh"], 20);
    }
}
