//! Builtin function dispatch (spec §4.H "Builtins").

use crate::error::{Result, RuntimeError};
use crate::gc::{GcHeap, ObjectId, Value};

use super::value::stringify;

/// Whether `name` (after stripping an optional `std::math::` prefix for the
/// math functions) names a builtin.
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&strip_math_prefix(name))
}

const BUILTIN_NAMES: &[&str] = &[
    "print",
    "println",
    "string_length",
    "string_equals",
    "string_concat",
    "string_repeat",
    "string_slice",
    "string_lower",
    "string_upper",
    "string_trim",
    "array_push",
    "array_pop",
    "array_join",
    "array_fill",
    "array_sum",
    "read_line",
    "sqrt",
    "sin",
    "cos",
    "tan",
    "abs",
    "floor",
    "ceil",
    "round",
    "exp",
    "log",
    "log10",
    "pow",
];

fn strip_math_prefix(name: &str) -> &str {
    name.strip_prefix("std::math::").unwrap_or(name)
}

/// Invoke the builtin named `name`. `read_line` draws from `read_line_fn`;
/// `print`/`println` append to `output`.
pub fn call(
    name: &str,
    args: &[Value],
    heap: &mut GcHeap,
    output: &mut String,
    read_line_fn: &mut dyn FnMut() -> String,
) -> Result<Value> {
    match strip_math_prefix(name) {
        "print" | "println" => {
            let parts: Vec<String> = args.iter().map(|v| stringify(v, heap)).collect();
            output.push_str(&parts.join(" "));
            if name == "println" {
                output.push('\n');
            }
            Ok(Value::Number(0.0))
        }
        "string_length" => Ok(Value::Number(expect_string(args, 0, name)?.chars().count() as f64)),
        "string_equals" => Ok(bool_value(
            expect_string(args, 0, name)? == expect_string(args, 1, name)?,
        )),
        "string_concat" => Ok(Value::Str(format!(
            "{}{}",
            expect_string(args, 0, name)?,
            expect_string(args, 1, name)?
        ))),
        "string_repeat" => {
            let s = expect_string(args, 0, name)?;
            let count = expect_non_negative_count(args, 1, name)?;
            Ok(Value::Str(s.repeat(count)))
        }
        "string_slice" => {
            let s = expect_string(args, 0, name)?;
            let chars: Vec<char> = s.chars().collect();
            let start = expect_non_negative_count(args, 1, name)?.min(chars.len());
            let end = expect_non_negative_count(args, 2, name)?.min(chars.len()).max(start);
            Ok(Value::Str(chars[start..end].iter().collect()))
        }
        "string_lower" => Ok(Value::Str(expect_string(args, 0, name)?.to_lowercase())),
        "string_upper" => Ok(Value::Str(expect_string(args, 0, name)?.to_uppercase())),
        "string_trim" => Ok(Value::Str(expect_string(args, 0, name)?.trim().to_string())),
        "array_push" => {
            let id = expect_object(args, 0, name)?;
            let value = args.get(1).cloned().unwrap_or(Value::Nil);
            let len = heap.push_element(id, value).unwrap_or(0);
            Ok(Value::Number(len as f64))
        }
        "array_pop" => {
            let id = expect_object(args, 0, name)?;
            Ok(heap.pop_element(id).unwrap_or(Value::Nil))
        }
        "array_join" => {
            let id = expect_object(args, 0, name)?;
            let separator = expect_string(args, 1, name)?;
            let parts: Vec<String> = heap
                .object(id)
                .map(|obj| obj.elements.iter().map(|v| stringify(v, heap)).collect())
                .unwrap_or_default();
            Ok(Value::Str(parts.join(separator)))
        }
        "array_fill" => {
            let id = expect_object(args, 0, name)?;
            let value = args.get(1).cloned().unwrap_or(Value::Nil);
            if let Some(object) = heap.object_mut(id) {
                for slot in &mut object.elements {
                    *slot = value.clone();
                }
            }
            Ok(Value::Object(id))
        }
        "array_sum" => {
            let id = expect_object(args, 0, name)?;
            let sum = heap
                .object(id)
                .map(|obj| obj.elements.iter().filter_map(Value::as_number).sum())
                .unwrap_or(0.0);
            Ok(Value::Number(sum))
        }
        "read_line" => Ok(Value::Str(read_line_fn())),
        "sqrt" => Ok(Value::Number(expect_number(args, 0, name)?.sqrt())),
        "sin" => Ok(Value::Number(expect_number(args, 0, name)?.sin())),
        "cos" => Ok(Value::Number(expect_number(args, 0, name)?.cos())),
        "tan" => Ok(Value::Number(expect_number(args, 0, name)?.tan())),
        "abs" => Ok(Value::Number(expect_number(args, 0, name)?.abs())),
        "floor" => Ok(Value::Number(expect_number(args, 0, name)?.floor())),
        "ceil" => Ok(Value::Number(expect_number(args, 0, name)?.ceil())),
        "round" => Ok(Value::Number(expect_number(args, 0, name)?.round())),
        "exp" => Ok(Value::Number(expect_number(args, 0, name)?.exp())),
        "log" => Ok(Value::Number(expect_number(args, 0, name)?.ln())),
        "log10" => Ok(Value::Number(expect_number(args, 0, name)?.log10())),
        "pow" => Ok(Value::Number(
            expect_number(args, 0, name)?.powf(expect_number(args, 1, name)?),
        )),
        other => Err(RuntimeError::UnknownCallee {
            name: other.to_string(),
        }
        .into()),
    }
}

fn bool_value(b: bool) -> Value {
    Value::Number(if b { 1.0 } else { 0.0 })
}

fn expect_number(args: &[Value], idx: usize, op: &str) -> Result<f64> {
    args.get(idx)
        .and_then(Value::as_number)
        .ok_or_else(|| RuntimeError::NonNumericOperand { op: op.to_string() }.into())
}

fn expect_string<'a>(args: &'a [Value], idx: usize, op: &str) -> Result<&'a str> {
    match args.get(idx) {
        Some(Value::Str(s)) => Ok(s.as_str()),
        _ => Err(RuntimeError::NonNumericOperand { op: op.to_string() }.into()),
    }
}

fn expect_object(args: &[Value], idx: usize, op: &str) -> Result<ObjectId> {
    match args.get(idx) {
        Some(Value::Object(id)) => Ok(*id),
        _ => Err(RuntimeError::NonNumericOperand { op: op.to_string() }.into()),
    }
}

fn expect_non_negative_count(args: &[Value], idx: usize, op: &str) -> Result<usize> {
    let n = expect_number(args, idx, op)?;
    if n < 0.0 {
        return Err(RuntimeError::NonNumericOperand { op: op.to_string() }.into());
    }
    Ok(n as usize)
}
