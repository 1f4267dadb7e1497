//! Condition model for key conditions and filter chains.
//!
//! A [`Condition`] compares one attribute against one or two literal operands.
//! A [`ConditionChain`] joins conditions with [`LogicalOperator`]s. Nothing in
//! this module knows about expression text; see
//! [`expression`](crate::dynamodb::expression) for rendering.

use aws_sdk_dynamodb::types::AttributeValue;
use std::fmt;
use std::str::FromStr;

use crate::dynamodb::{IntoAttributeValue, Result, TableError};

/// Comparison operators supported in key conditions and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equals,
    LessThan,
    LessThanOrEqual,
    MoreThan,
    MoreThanOrEqual,
    Between,
    BeginsWith,
    /// Substring or membership test; filters only.
    Contains,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::MoreThan => ">",
            Self::MoreThanOrEqual => ">=",
            Self::Between => "BETWEEN",
            Self::BeginsWith => "BEGINS_WITH",
            Self::Contains => "CONTAINS",
        }
    }

    /// Whether the operator takes a second operand.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Between)
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonOp {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "=" => Ok(Self::Equals),
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessThanOrEqual),
            ">" => Ok(Self::MoreThan),
            ">=" => Ok(Self::MoreThanOrEqual),
            "BETWEEN" => Ok(Self::Between),
            "BEGINS_WITH" => Ok(Self::BeginsWith),
            "CONTAINS" => Ok(Self::Contains),
            other => Err(TableError::validation(format!(
                "Unknown comparison operator '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalOperator {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(TableError::validation(format!(
                "Unknown logical operator '{other}'"
            ))),
        }
    }
}

/// A single comparison of an attribute against literal operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    attribute: String,
    operator: ComparisonOp,
    operand1: AttributeValue,
    operand2: Option<AttributeValue>,
}

impl Condition {
    /// Builds a condition, checking operand arity.
    ///
    /// `operand2` is required for `BETWEEN` and forbidden for every other operator.
    pub fn try_new(
        attribute: impl Into<String>,
        operator: ComparisonOp,
        operand1: Option<AttributeValue>,
        operand2: Option<AttributeValue>,
    ) -> Result<Self> {
        let attribute = attribute.into();
        let operand1 = operand1.ok_or_else(|| {
            TableError::validation(format!("No value provided for '{attribute}'"))
        })?;
        match (operator.is_range(), &operand2) {
            (true, None) => Err(TableError::validation(
                "BETWEEN operator requires two values, but only one was provided",
            )),
            (false, Some(_)) => Err(TableError::validation(format!(
                "{operator} operator takes a single value, but two were provided"
            ))),
            _ => Ok(Self {
                attribute,
                operator,
                operand1,
                operand2,
            }),
        }
    }

    fn binary(attribute: impl Into<String>, operator: ComparisonOp, value: AttributeValue) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            operand1: value,
            operand2: None,
        }
    }

    pub fn eq(attribute: impl Into<String>, value: impl IntoAttributeValue) -> Self {
        Self::binary(attribute, ComparisonOp::Equals, value.into_attribute_value())
    }

    pub fn lt(attribute: impl Into<String>, value: impl IntoAttributeValue) -> Self {
        Self::binary(attribute, ComparisonOp::LessThan, value.into_attribute_value())
    }

    pub fn le(attribute: impl Into<String>, value: impl IntoAttributeValue) -> Self {
        Self::binary(
            attribute,
            ComparisonOp::LessThanOrEqual,
            value.into_attribute_value(),
        )
    }

    pub fn gt(attribute: impl Into<String>, value: impl IntoAttributeValue) -> Self {
        Self::binary(attribute, ComparisonOp::MoreThan, value.into_attribute_value())
    }

    pub fn ge(attribute: impl Into<String>, value: impl IntoAttributeValue) -> Self {
        Self::binary(
            attribute,
            ComparisonOp::MoreThanOrEqual,
            value.into_attribute_value(),
        )
    }

    pub fn begins_with(attribute: impl Into<String>, prefix: impl IntoAttributeValue) -> Self {
        Self::binary(attribute, ComparisonOp::BeginsWith, prefix.into_attribute_value())
    }

    pub fn contains(attribute: impl Into<String>, value: impl IntoAttributeValue) -> Self {
        Self::binary(attribute, ComparisonOp::Contains, value.into_attribute_value())
    }

    /// Inclusive range `low <= attribute <= high`.
    pub fn between(
        attribute: impl Into<String>,
        low: impl IntoAttributeValue,
        high: impl IntoAttributeValue,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator: ComparisonOp::Between,
            operand1: low.into_attribute_value(),
            operand2: Some(high.into_attribute_value()),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn operator(&self) -> ComparisonOp {
        self.operator
    }

    pub fn operand1(&self) -> &AttributeValue {
        &self.operand1
    }

    pub fn operand2(&self) -> Option<&AttributeValue> {
        self.operand2.as_ref()
    }
}

/// One element of an alternating condition sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainLink {
    Condition(Condition),
    Operator(LogicalOperator),
}

impl From<Condition> for ChainLink {
    fn from(condition: Condition) -> Self {
        Self::Condition(condition)
    }
}

impl From<LogicalOperator> for ChainLink {
    fn from(operator: LogicalOperator) -> Self {
        Self::Operator(operator)
    }
}

/// Conditions joined by logical operators, `c1 OP c2 OP c3 ...`.
///
/// The chain always begins and ends on a condition and never holds two
/// adjacent operators, so `len()` is odd.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionChain {
    first: Condition,
    rest: Vec<(LogicalOperator, Condition)>,
}

impl ConditionChain {
    pub fn new(first: Condition) -> Self {
        Self {
            first,
            rest: Vec::new(),
        }
    }

    pub fn and(self, condition: Condition) -> Self {
        self.join(LogicalOperator::And, condition)
    }

    pub fn or(self, condition: Condition) -> Self {
        self.join(LogicalOperator::Or, condition)
    }

    pub fn join(mut self, operator: LogicalOperator, condition: Condition) -> Self {
        self.rest.push((operator, condition));
        self
    }

    /// Builds a chain from an alternating sequence of links.
    pub fn from_links(links: impl IntoIterator<Item = ChainLink>) -> Result<Self> {
        let mut links = links.into_iter();
        let first = match links.next() {
            Some(ChainLink::Condition(condition)) => condition,
            Some(ChainLink::Operator(op)) => {
                return Err(TableError::validation(format!(
                    "Condition chain cannot start with {op}"
                )))
            }
            None => return Err(TableError::validation("Condition chain is empty")),
        };

        let mut chain = Self::new(first);
        while let Some(link) = links.next() {
            let ChainLink::Operator(op) = link else {
                return Err(TableError::validation(
                    "Conditions in a chain must be joined by AND or OR",
                ));
            };
            match links.next() {
                Some(ChainLink::Condition(condition)) => chain = chain.join(op, condition),
                Some(ChainLink::Operator(_)) => {
                    return Err(TableError::validation(
                        "Condition chain cannot hold two adjacent operators",
                    ))
                }
                None => {
                    return Err(TableError::validation(format!(
                        "Condition chain cannot end with {op}"
                    )))
                }
            }
        }
        Ok(chain)
    }

    /// Joins every condition with AND. `None` when `conditions` is empty.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Option<Self> {
        let mut conditions = conditions.into_iter();
        let first = conditions.next()?;
        Some(conditions.fold(Self::new(first), Self::and))
    }

    /// Tokenized search: every lower-cased whitespace token of `text` must be
    /// contained in `attribute`.
    pub fn search(attribute: &str, text: &str) -> Option<Self> {
        Self::all(
            text.split_whitespace()
                .map(|token| Condition::contains(attribute, token.to_lowercase())),
        )
    }

    pub fn first(&self) -> &Condition {
        &self.first
    }

    pub fn rest(&self) -> &[(LogicalOperator, Condition)] {
        &self.rest
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        std::iter::once(&self.first).chain(self.rest.iter().map(|(_, c)| c))
    }

    /// Number of links, conditions and operators together.
    pub fn len(&self) -> usize {
        1 + 2 * self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Groups of AND-joined conditions, split at each OR.
    ///
    /// The store evaluates AND before OR, so a chain holds when any group holds entirely.
    pub fn disjuncts(&self) -> Vec<Vec<&Condition>> {
        let mut groups = Vec::new();
        let mut current = vec![&self.first];
        for (op, condition) in &self.rest {
            match op {
                LogicalOperator::And => current.push(condition),
                LogicalOperator::Or => {
                    groups.push(std::mem::replace(&mut current, vec![condition]))
                }
            }
        }
        groups.push(current);
        groups
    }
}

impl From<Condition> for ConditionChain {
    fn from(condition: Condition) -> Self {
        Self::new(condition)
    }
}

/// A requested sort-key comparison, operands still unchecked.
#[derive(Debug, Clone, PartialEq)]
pub struct SortQuery {
    pub op: ComparisonOp,
    pub value1: Option<AttributeValue>,
    pub value2: Option<AttributeValue>,
}

impl SortQuery {
    pub fn new(
        op: ComparisonOp,
        value1: Option<AttributeValue>,
        value2: Option<AttributeValue>,
    ) -> Self {
        Self { op, value1, value2 }
    }

    pub fn with(op: ComparisonOp, value: impl IntoAttributeValue) -> Self {
        Self::new(op, Some(value.into_attribute_value()), None)
    }

    pub fn eq(value: impl IntoAttributeValue) -> Self {
        Self::with(ComparisonOp::Equals, value)
    }

    pub fn begins_with(prefix: impl IntoAttributeValue) -> Self {
        Self::with(ComparisonOp::BeginsWith, prefix)
    }

    pub fn between(low: impl IntoAttributeValue, high: impl IntoAttributeValue) -> Self {
        Self::new(
            ComparisonOp::Between,
            Some(low.into_attribute_value()),
            Some(high.into_attribute_value()),
        )
    }
}

/// Resolves the optional sort-key comparison of a query.
///
/// Returns `Ok(None)` when no operator is requested.
pub fn sort_condition(
    sort_key: Option<&str>,
    op: Option<ComparisonOp>,
    value1: Option<AttributeValue>,
    value2: Option<AttributeValue>,
) -> Result<Option<Condition>> {
    let Some(op) = op else {
        return Ok(None);
    };
    let Some(sort_key) = sort_key else {
        return Err(TableError::schema(
            "Query attempted to use sort condition but table has no sort key",
        ));
    };
    if value1.is_none() {
        return Err(TableError::validation(format!(
            "No value provided for sort key '{sort_key}'"
        )));
    }
    if op == ComparisonOp::Contains {
        return Err(TableError::validation(
            "CONTAINS cannot be used in a key condition",
        ));
    }
    // A stray second operand on a binary operator is ignored, as for any unused query argument.
    let value2 = if op.is_range() { value2 } else { None };
    Condition::try_new(sort_key, op, value1, value2).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_condition_absent_operator() {
        let condition = sort_condition(Some("created"), None, None, None).unwrap();
        assert!(condition.is_none());
    }

    #[test]
    fn test_sort_condition_without_sort_key() {
        let err = sort_condition(
            None,
            Some(ComparisonOp::Equals),
            Some(1.into_attribute_value()),
            None,
        )
        .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_sort_condition_missing_value() {
        let err = sort_condition(Some("created"), Some(ComparisonOp::MoreThan), None, None)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_between_requires_two_values() {
        let err = sort_condition(
            Some("created"),
            Some(ComparisonOp::Between),
            Some(2.into_attribute_value()),
            None,
        )
        .unwrap_err();
        assert!(err.is_validation());

        let condition = sort_condition(
            Some("created"),
            Some(ComparisonOp::Between),
            Some(2.into_attribute_value()),
            Some(3.into_attribute_value()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(condition.operator(), ComparisonOp::Between);
        assert_eq!(condition.operand2(), Some(&AttributeValue::N("3".into())));
    }

    #[test]
    fn test_sort_condition_rejects_contains() {
        let err = sort_condition(
            Some("clientId"),
            Some(ComparisonOp::Contains),
            Some("c".into_attribute_value()),
            None,
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_try_new_forbids_second_operand() {
        let err = Condition::try_new(
            "age",
            ComparisonOp::Equals,
            Some(1.into_attribute_value()),
            Some(2.into_attribute_value()),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_chain_from_links() {
        let chain = ConditionChain::from_links([
            Condition::eq("state", "WA").into(),
            LogicalOperator::And.into(),
            Condition::gt("age", 18).into(),
            LogicalOperator::Or.into(),
            Condition::begins_with("firstname", "Al").into(),
        ])
        .unwrap();

        assert_eq!(chain.len(), 5);
        assert_eq!(chain.conditions().count(), 3);
        assert_eq!(chain.disjuncts().len(), 2);
        assert_eq!(chain.disjuncts()[0].len(), 2);
    }

    #[test]
    fn test_chain_from_invalid_links() {
        let leading = ConditionChain::from_links([
            LogicalOperator::And.into(),
            Condition::eq("a", 1).into(),
        ]);
        assert!(leading.unwrap_err().is_validation());

        let trailing = ConditionChain::from_links([
            Condition::eq("a", 1).into(),
            LogicalOperator::Or.into(),
        ]);
        assert!(trailing.unwrap_err().is_validation());

        let adjacent_conditions = ConditionChain::from_links([
            Condition::eq("a", 1).into(),
            Condition::eq("b", 2).into(),
        ]);
        assert!(adjacent_conditions.unwrap_err().is_validation());

        let adjacent_operators = ConditionChain::from_links([
            Condition::eq("a", 1).into(),
            LogicalOperator::And.into(),
            LogicalOperator::Or.into(),
            Condition::eq("b", 2).into(),
        ]);
        assert!(adjacent_operators.unwrap_err().is_validation());

        let empty = ConditionChain::from_links(Vec::new());
        assert!(empty.unwrap_err().is_validation());
    }

    #[test]
    fn test_search_chain() {
        let chain = ConditionChain::search("searchStrings", "  Alice  SMITH ").unwrap();
        let conditions: Vec<_> = chain.conditions().collect();

        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].operator(), ComparisonOp::Contains);
        assert_eq!(conditions[0].operand1(), &AttributeValue::S("alice".into()));
        assert_eq!(conditions[1].operand1(), &AttributeValue::S("smith".into()));
        assert!(chain.rest().iter().all(|(op, _)| *op == LogicalOperator::And));

        assert!(ConditionChain::search("searchStrings", "   ").is_none());
    }

    #[test]
    fn test_comparison_op_from_str() {
        assert_eq!("<=".parse::<ComparisonOp>().unwrap(), ComparisonOp::LessThanOrEqual);
        assert_eq!(
            "begins_with".parse::<ComparisonOp>().unwrap(),
            ComparisonOp::BeginsWith
        );
        assert!("LIKE".parse::<ComparisonOp>().is_err());
    }
}
