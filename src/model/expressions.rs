//! Annotation expression values
//!
//! Expressions are reduced bottom-up: each expression element computes its value when
//! it closes and hands it to the frame one level up (see `TreeBuilder::update_value`).

use serde_json::{json, Map, Value};

use crate::edm::attributes::numeric_literal;
use crate::edm::names::{enum_member_value, AliasTable};
use crate::edm::{ConstantKind, ExprKind, PathKind};

/// Typed value of a constant expression.
pub fn constant_value(kind: ConstantKind, text: &str) -> Value {
    match kind {
        ConstantKind::Bool => match text.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        ConstantKind::Int => match text.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(text.trim().to_string()),
        },
        ConstantKind::Decimal | ConstantKind::Float => {
            numeric_literal(text.trim()).unwrap_or_else(|| Value::String(text.trim().to_string()))
        }
        ConstantKind::EnumMember => Value::String(enum_member_value(text)),
        ConstantKind::String => Value::String(text.to_string()),
        ConstantKind::Binary
        | ConstantKind::Date
        | ConstantKind::DateTimeOffset
        | ConstantKind::Duration
        | ConstantKind::Guid
        | ConstantKind::TimeOfDay => Value::String(text.trim().to_string()),
    }
}

/// `{"$Path": "..."}` and friends, with aliases and term names normalized.
pub fn path_value(kind: PathKind, text: &str, aliases: &AliasTable) -> Value {
    let mut object = Map::new();
    object.insert(
        kind.json_key().to_string(),
        Value::String(aliases.target(text.trim())),
    );
    Value::Object(object)
}

/// Value of an expression written as an attribute: `<Annotation Path="..."/>`.
pub fn inline_value(kind: ExprKind, raw: &str, aliases: &AliasTable) -> Value {
    match kind {
        ExprKind::Constant(c) => constant_value(c, raw),
        ExprKind::Path(p) => path_value(p, raw, aliases),
        ExprKind::UrlRef => json!({ "$UrlRef": raw }),
        _ => Value::String(raw.to_string()),
    }
}

/// Initial operand of an expression frame: list-valued expressions collect their
/// children, every other expression is replaced by its single child.
pub fn initial_operand(kind: ExprKind) -> Option<Value> {
    match kind {
        ExprKind::Collection | ExprKind::Binary(_) | ExprKind::If | ExprKind::Apply => {
            Some(Value::Array(Vec::new()))
        }
        _ => None,
    }
}

/// Final value of an expression element.
///
/// `object` holds the converted attributes and nested annotations, `operand` the
/// reduced child expressions and `text` the character data.
pub fn reduce(
    kind: ExprKind,
    object: Map<String, Value>,
    operand: Option<Value>,
    text: &str,
    aliases: &AliasTable,
) -> Value {
    let operand = operand.unwrap_or(Value::Null);
    match kind {
        ExprKind::Constant(c) => constant_value(c, text),
        ExprKind::Path(p) => path_value(p, text, aliases),
        ExprKind::LabeledElementReference => {
            json!({ "$LabeledElementReference": aliases.qualified_name(text.trim()) })
        }
        ExprKind::Collection => operand,
        ExprKind::Record => Value::Object(object),
        ExprKind::Null => {
            if object.is_empty() {
                Value::Null
            } else {
                with_leading("$Null", Value::Null, object)
            }
        }
        ExprKind::Binary(op) => with_leading(&format!("${}", op), operand, object),
        ExprKind::Not => with_leading("$Not", operand, object),
        ExprKind::Neg => with_leading("$Neg", operand, object),
        ExprKind::If => with_leading("$If", operand, object),
        ExprKind::Apply => with_leading("$Apply", operand, object),
        ExprKind::Cast => with_leading("$Cast", operand, object),
        ExprKind::IsOf => with_leading("$IsOf", operand, object),
        ExprKind::LabeledElement => with_leading("$LabeledElement", operand, object),
        ExprKind::UrlRef => with_leading("$UrlRef", operand, object),
    }
}

/// Object with `key` first, followed by the members of `rest`.
fn with_leading(key: &str, value: Value, rest: Map<String, Value>) -> Value {
    let mut object = Map::new();
    object.insert(key.to_string(), value);
    object.extend(rest);
    Value::Object(object)
}

/// Parse an embedded JSON document; values that are not JSON text are kept.
pub fn parse_embedded_json(value: Value) -> Value {
    if let Value::String(text) = &value {
        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            return parsed;
        }
    }
    value
}
