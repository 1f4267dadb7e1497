//! Renders conditions into DynamoDB expression text.
//!
//! Attribute names are bound to `#attrN` placeholders and literal operands to
//! `:valN` placeholders; no literal is ever interpolated into the text.

use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

use crate::dynamodb::{ComparisonOp, Condition, ConditionChain};

/// Expression text with its bound names and values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub text: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Allocates placeholders while rendering one request's expressions.
///
/// A key condition and a filter rendered through the same builder share one
/// placeholder namespace, so their maps can be merged into a single request.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: HashMap<String, String>,
    placeholders: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an attribute name, reusing the placeholder for repeated names.
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.placeholders.get(attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#attr{}", self.names.len());
        self.names
            .insert(placeholder.clone(), attribute.to_string());
        self.placeholders
            .insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    /// Binds a literal operand to a fresh placeholder.
    pub fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":val{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    pub fn condition(&mut self, condition: &Condition) -> String {
        let attr = self.name(condition.attribute());
        let v1 = self.value(condition.operand1());
        match condition.operator() {
            ComparisonOp::BeginsWith => format!("begins_with({attr}, {v1})"),
            ComparisonOp::Contains => format!("contains({attr}, {v1})"),
            ComparisonOp::Between => {
                // Conditions are arity-checked on construction.
                let v2 = match condition.operand2() {
                    Some(high) => self.value(high),
                    None => v1.clone(),
                };
                format!("{attr} BETWEEN {v1} AND {v2}")
            }
            op => format!("{attr} {op} {v1}"),
        }
    }

    pub fn chain(&mut self, chain: &ConditionChain) -> String {
        let mut text = self.condition(chain.first());
        for (op, condition) in chain.rest() {
            let rendered = self.condition(condition);
            text.push_str(&format!(" {op} {rendered}"));
        }
        text
    }

    /// Partition-key equality, optionally followed by a sort-key condition.
    pub fn key_condition(
        &mut self,
        partition_key: &str,
        partition_value: &AttributeValue,
        sort: Option<&Condition>,
    ) -> String {
        let pk = self.name(partition_key);
        let pk_value = self.value(partition_value);
        let mut text = format!("{pk} = {pk_value}");
        if let Some(sort) = sort {
            let rendered = self.condition(sort);
            text.push_str(&format!(" AND {rendered}"));
        }
        text
    }

    /// Returns the bound maps; `None` for an empty map so requests can skip them.
    pub fn finish(
        self,
    ) -> (
        Option<HashMap<String, String>>,
        Option<HashMap<String, AttributeValue>>,
    ) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }

    /// Renders a whole filter chain into a standalone expression.
    pub fn render_chain(chain: &ConditionChain) -> Expression {
        let mut builder = Self::new();
        let text = builder.chain(chain);
        Expression {
            text,
            names: builder.names,
            values: builder.values,
        }
    }
}
