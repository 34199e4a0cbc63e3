//! Type checking for attendance-register decision expressions.
//!
//! A decision is a non-empty JSON array of expressions:
//!
//! ```json
//! [{ "type": "SingleDecision", "property": "StudentPercentageOfClassAttended",
//!    "operator": "gte", "value": 85 }]
//! ```
//!
//! `MultipleDecision` nests further expressions joined by `"AND"` or `"OR"`.

use serde_json::{Map, Value};
use thiserror::Error;

const NUMERIC_PROPERTIES: &[&str] = &[
    "StudentNumberOfClassAttended",
    "StudentPercentageOfClassAttended",
    "NumberOfClassTaught",
];

const TEXT_PROPERTIES: &[&str] = &[
    "StudentName",
    "StudentDepartment",
    "StudentFaculty",
    "StudentRegno",
    "StudentGender",
    "StudentLevel",
];

const NUMERIC_OPERATORS: &[&str] = &["eq", "ne", "gt", "gte", "lt", "lte"];
const TEXT_OPERATORS: &[&str] = &["eq", "ne", "contains"];
const JOIN_OPERATORS: &[&str] = &["AND", "OR"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("Invalid decision format")]
    NotAnArray,

    #[error("Decision must contain at least one expression")]
    Empty,

    #[error("Decision expression must be an object")]
    NotAnObject,

    #[error("Decision expression is missing '{0}'")]
    MissingField(&'static str),

    #[error("Unknown decision type '{0}'")]
    UnknownType(String),

    #[error("Unknown decision property '{0}'")]
    UnknownProperty(String),

    #[error("Operator '{operator}' is not valid for '{property}'")]
    InvalidOperator { property: String, operator: String },

    #[error("Invalid value for decision property '{0}'")]
    InvalidValue(String),

    #[error("Invalid join operator '{0}'")]
    InvalidJoin(String),
}

pub fn check_decision(decision: &Value) -> Result<(), DecisionError> {
    let expressions = decision.as_array().ok_or(DecisionError::NotAnArray)?;
    check_expressions(expressions)
}

fn check_expressions(expressions: &[Value]) -> Result<(), DecisionError> {
    if expressions.is_empty() {
        return Err(DecisionError::Empty);
    }
    expressions.iter().try_for_each(check_expression)
}

fn check_expression(expression: &Value) -> Result<(), DecisionError> {
    let expr = expression.as_object().ok_or(DecisionError::NotAnObject)?;
    match text_field(expr, "type")? {
        "SingleDecision" => check_single(expr),
        "MultipleDecision" => {
            let join = text_field(expr, "operator")?;
            if !JOIN_OPERATORS.contains(&join) {
                return Err(DecisionError::InvalidJoin(join.to_string()));
            }
            let nested = expr
                .get("decisions")
                .ok_or(DecisionError::MissingField("decisions"))?
                .as_array()
                .ok_or(DecisionError::NotAnArray)?;
            check_expressions(nested)
        }
        other => Err(DecisionError::UnknownType(other.to_string())),
    }
}

fn check_single(expr: &Map<String, Value>) -> Result<(), DecisionError> {
    let property = text_field(expr, "property")?;
    let operator = text_field(expr, "operator")?;
    let value = expr.get("value").ok_or(DecisionError::MissingField("value"))?;

    let (operators, value_ok) = if NUMERIC_PROPERTIES.contains(&property) {
        (NUMERIC_OPERATORS, value.is_number())
    } else if TEXT_PROPERTIES.contains(&property) {
        (TEXT_OPERATORS, value.is_string())
    } else {
        return Err(DecisionError::UnknownProperty(property.to_string()));
    };

    if !operators.contains(&operator) {
        return Err(DecisionError::InvalidOperator {
            property: property.to_string(),
            operator: operator.to_string(),
        });
    }
    if !value_ok {
        return Err(DecisionError::InvalidValue(property.to_string()));
    }
    Ok(())
}

fn text_field<'a>(
    expr: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, DecisionError> {
    expr.get(field)
        .and_then(Value::as_str)
        .ok_or(DecisionError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_register_decision_is_valid() {
        let decision = json!([{
            "type": "SingleDecision",
            "value": 85,
            "operator": "gte",
            "property": "StudentPercentageOfClassAttended"
        }]);
        assert_eq!(check_decision(&decision), Ok(()));
    }

    #[test]
    fn nested_decisions_are_checked() {
        let decision = json!([{
            "type": "MultipleDecision",
            "operator": "OR",
            "decisions": [
                { "type": "SingleDecision", "property": "StudentLevel", "operator": "eq", "value": "L_100" },
                { "type": "SingleDecision", "property": "NumberOfClassTaught", "operator": "contains", "value": 3 }
            ]
        }]);
        assert_eq!(
            check_decision(&decision),
            Err(DecisionError::InvalidOperator {
                property: "NumberOfClassTaught".into(),
                operator: "contains".into(),
            })
        );
    }

    #[test]
    fn shape_errors() {
        assert_eq!(check_decision(&json!({})), Err(DecisionError::NotAnArray));
        assert_eq!(check_decision(&json!([])), Err(DecisionError::Empty));
        assert_eq!(check_decision(&json!([1])), Err(DecisionError::NotAnObject));
        assert_eq!(
            check_decision(&json!([{ "type": "Guess" }])),
            Err(DecisionError::UnknownType("Guess".into()))
        );
        assert_eq!(
            check_decision(&json!([{
                "type": "SingleDecision", "property": "StudentRegno", "operator": "eq", "value": 7
            }])),
            Err(DecisionError::InvalidValue("StudentRegno".into()))
        );
    }
}
