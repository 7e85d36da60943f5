//! Runtime value helpers used by the interpreter and its builtins.
//!
//! The [`Value`]/[`ObjectId`] types themselves live in [`crate::gc`]
//! alongside the heap that owns object storage; this module re-exports them
//! under the interpreter's namespace and adds interpreter-only helpers
//! (stringification for `print`/`println`, typed accessors for builtins).

use crate::gc::{GcHeap, ObjectId, Value};

/// Render `value` the way `print`/`println` do: numbers without a trailing
/// `.0` when they're integral, strings verbatim, arrays as `[e0, e1, ...]`.
#[must_use]
pub fn stringify(value: &Value, heap: &GcHeap) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Number(n) => format_number(*n),
        Value::Str(s) => s.clone(),
        Value::Object(id) => stringify_object(*id, heap),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

fn stringify_object(id: ObjectId, heap: &GcHeap) -> String {
    let Some(object) = heap.object(id) else {
        return "nil".to_string();
    };
    let parts: Vec<String> = object.elements.iter().map(|v| stringify(v, heap)).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_print_without_a_decimal_point() {
        let heap = GcHeap::new(1024, 2);
        assert_eq!(stringify(&Value::Number(5.0), &heap), "5");
    }

    #[test]
    fn non_integral_numbers_keep_their_fraction() {
        let heap = GcHeap::new(1024, 2);
        assert_eq!(stringify(&Value::Number(5.5), &heap), "5.5");
    }
}
