//! Structural matchers comparing expected and observed JSON values.

use flowstate_types::{MatchResult, Mismatch};
use serde_json::{Number, Value};

/// Decides whether an observed value satisfies an expectation.
pub trait Matcher: Send + Sync {
    fn matches(&self, expected: &Value, observed: &Value) -> MatchResult;
}

/// Expected objects must be embedded in the observed ones: every expected key must be present
/// and match recursively, extra observed keys are ignored. Arrays match element-wise and must
/// have the same length. Scalars match by value.
#[derive(Debug, Default, Clone, Copy)]
pub struct Embeds;

/// Values must be identical, apart from integer/float representation of equal numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Equals;

impl Matcher for Embeds {
    fn matches(&self, expected: &Value, observed: &Value) -> MatchResult {
        verdict(expected, observed, true)
    }
}

impl Matcher for Equals {
    fn matches(&self, expected: &Value, observed: &Value) -> MatchResult {
        verdict(expected, observed, false)
    }
}

fn verdict(expected: &Value, observed: &Value, embeds: bool) -> MatchResult {
    let mut mismatches = Vec::new();
    compare("$", expected, observed, embeds, &mut mismatches);
    if mismatches.is_empty() {
        MatchResult::passed()
    } else {
        MatchResult::failed(mismatches)
    }
}

fn compare(path: &str, expected: &Value, observed: &Value, embeds: bool, mismatches: &mut Vec<Mismatch>) {
    match (expected, observed) {
        (Value::Object(expected_map), Value::Object(observed_map)) => {
            let same_keys =
                expected_map.len() == observed_map.len() && expected_map.keys().all(|key| observed_map.contains_key(key));
            if !embeds && !same_keys {
                mismatches.push(mismatch(path, expected, Some(observed)));
                return;
            }
            for (key, expected_value) in expected_map {
                let child_path = object_path(path, key);
                match observed_map.get(key) {
                    Some(observed_value) => compare(&child_path, expected_value, observed_value, embeds, mismatches),
                    None => mismatches.push(mismatch(&child_path, expected_value, None)),
                }
            }
        }
        (Value::Array(expected_items), Value::Array(observed_items)) => {
            if expected_items.len() != observed_items.len() {
                mismatches.push(mismatch(path, expected, Some(observed)));
                return;
            }
            for (index, (expected_item, observed_item)) in expected_items.iter().zip(observed_items).enumerate() {
                compare(&format!("{path}[{index}]"), expected_item, observed_item, embeds, mismatches);
            }
        }
        (Value::Number(expected_number), Value::Number(observed_number)) => {
            if !numbers_equal(expected_number, observed_number) {
                mismatches.push(mismatch(path, expected, Some(observed)));
            }
        }
        _ => {
            if expected != observed {
                mismatches.push(mismatch(path, expected, Some(observed)));
            }
        }
    }
}

fn mismatch(path: &str, expected: &Value, observed: Option<&Value>) -> Mismatch {
    Mismatch {
        path: path.to_string(),
        expected: expected.clone(),
        observed: observed.cloned(),
    }
}

fn object_path(parent: &str, key: &str) -> String {
    let is_identifier = !key.is_empty()
        && key.chars().all(|character| character.is_ascii_alphanumeric() || character == '_')
        && !key.starts_with(|character: char| character.is_ascii_digit());
    if is_identifier {
        format!("{parent}.{key}")
    } else {
        format!("{parent}[{}]", Value::String(key.to_string()))
    }
}

fn numbers_equal(left: &Number, right: &Number) -> bool {
    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        return left == right;
    }
    if let (Some(left), Some(right)) = (left.as_u64(), right.as_u64()) {
        return left == right;
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
