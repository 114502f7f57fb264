//! Named values substituted into block text as `{{key}}`.
//!
//! A value may itself reference other variables and do simple arithmetic,
//! e.g. `total = {{price}}*{{tax}}`. Resolution goes one level deep: only
//! variables whose own value is plain text are visible to an expression, so
//! two variables referring to each other cannot loop.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::EnumString;
use tracing::debug;

use crate::ids::VariableId;

/// One entry in the store. An empty key means the entry is inactive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Variable {
            key: key.into(),
            value: value.into(),
        }
    }

    fn placeholder(&self) -> Option<String> {
        if self.key.is_empty() {
            None
        } else {
            Some(format!("{{{{{}}}}}", self.key))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum VariableField {
    Key,
    Value,
}

/// Insertion-ordered variable table.
///
/// Keys are not unique. Substitution walks the table in order, so for a
/// duplicated key the first entry replaces every occurrence.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    entries: IndexMap<VariableId, Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, key: impl Into<String>, value: impl Into<String>) -> VariableId {
        let id = VariableId::new();
        self.entries.insert(id, Variable::new(key, value));
        id
    }

    /// Insert under a known id, as when restoring a snapshot. An existing
    /// entry with the same id is replaced in place.
    pub(crate) fn insert_with_id(&mut self, id: VariableId, variable: Variable) {
        self.entries.insert(id, variable);
    }

    pub fn update(&mut self, id: VariableId, field: VariableField, text: impl Into<String>) -> bool {
        let Some(variable) = self.entries.get_mut(&id) else {
            return false;
        };
        let text = text.into();
        let slot = match field {
            VariableField::Key => &mut variable.key,
            VariableField::Value => &mut variable.value,
        };
        if *slot == text {
            return false;
        }
        *slot = text;
        true
    }

    pub fn delete(&mut self, id: VariableId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    pub fn get(&self, id: VariableId) -> Option<&Variable> {
        self.entries.get(&id)
    }

    /// The entry substitution would use for `key`: the first one with it.
    pub fn get_by_key(&self, key: &str) -> Option<(VariableId, &Variable)> {
        if key.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(_, v)| v.key == key)
            .map(|(id, v)| (*id, v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.entries.iter().map(|(id, v)| (*id, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every `{{key}}` in `text` with the variable's effective value.
    pub fn substitute(&self, text: &str) -> String {
        let mut result = text.to_string();
        for variable in self.entries.values() {
            let Some(placeholder) = variable.placeholder() else {
                continue;
            };
            if !result.contains(&placeholder) {
                continue;
            }
            let value = if variable.value.contains("{{") {
                self.evaluate_expression(&variable.value)
            } else {
                variable.value.clone()
            };
            result = result.replace(&placeholder, &value);
        }
        result
    }

    /// Resolve a value that references other variables.
    ///
    /// Placeholders are filled from plain-valued variables only, leftover
    /// `{{`/`}}` markers are dropped, and if what remains is pure arithmetic
    /// it is evaluated. Anything that fails to evaluate comes back as the
    /// substituted text.
    pub fn evaluate_expression(&self, expr: &str) -> String {
        let mut result = expr.to_string();
        for variable in self.entries.values() {
            if variable.value.contains("{{") {
                continue;
            }
            if let Some(placeholder) = variable.placeholder() {
                result = result.replace(&placeholder, &variable.value);
            }
        }
        let result = result.replace("{{", "").replace("}}", "");

        if !is_arithmetic(&result) {
            return result;
        }
        match calc::eval_str(&result) {
            Ok(n) => calc::format_number(n),
            Err(err) => {
                debug!(expression = %result, error = %err, "expression left unevaluated");
                result
            }
        }
    }
}

/// Digits, whitespace, `+ - * / ( ) .` and nothing else, with at least one
/// non-whitespace character.
fn is_arithmetic(text: &str) -> bool {
    !text.trim().is_empty()
        && text.chars().all(|c| {
            c.is_ascii_digit() || c.is_whitespace() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> VariableStore {
        let mut vars = VariableStore::new();
        vars.create("price", "1000");
        vars.create("tax", "0.2");
        vars.create("total", "{{price}}*{{tax}}");
        vars
    }

    #[test]
    fn plain_substitution() {
        let mut vars = VariableStore::new();
        vars.create("product_name", "Widget");
        assert_eq!(
            vars.substitute("Buy {{product_name}} now, {{product_name}}!"),
            "Buy Widget now, Widget!"
        );
    }

    #[test]
    fn computed_total() {
        let vars = pricing();
        assert_eq!(vars.evaluate_expression("{{price}}*{{tax}}"), "200");
        assert_eq!(vars.substitute("Total: {{total}}"), "Total: 200");
    }

    #[test]
    fn empty_key_is_inactive() {
        let mut vars = VariableStore::new();
        vars.create("", "nope");
        assert_eq!(vars.substitute("a {{}} b"), "a {{}} b");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let vars = pricing();
        assert_eq!(vars.substitute("{{missing}} costs {{price}}"), "{{missing}} costs 1000");
    }

    #[test]
    fn first_duplicate_key_wins() {
        let mut vars = VariableStore::new();
        vars.create("name", "first");
        vars.create("name", "second");
        assert_eq!(vars.substitute("{{name}}"), "first");
        assert_eq!(vars.get_by_key("name").unwrap().1.value, "first");
    }

    #[test]
    fn non_arithmetic_expression_is_returned_substituted() {
        let mut vars = VariableStore::new();
        vars.create("name", "Widget");
        vars.create("label", "{{name}} v2");
        assert_eq!(vars.substitute("{{label}}"), "Widget v2");
    }

    #[test]
    fn nested_expression_is_one_level_deep() {
        let mut vars = pricing();
        vars.create("grand", "{{total}}+1");
        // `total` is itself an expression, so it is not visible here; its
        // braces are stripped and the text is no longer arithmetic.
        assert_eq!(vars.substitute("{{grand}}"), "total+1");
    }

    #[test]
    fn self_reference_does_not_loop() {
        let mut vars = VariableStore::new();
        vars.create("x", "{{x}}+1");
        assert_eq!(vars.substitute("{{x}}"), "x+1");
    }

    #[test]
    fn malformed_arithmetic_fails_closed() {
        let mut vars = VariableStore::new();
        vars.create("a", "5");
        vars.create("broken", "{{a}}*/2");
        vars.create("zero", "{{a}}/0");
        assert_eq!(vars.substitute("{{broken}}"), "5*/2");
        assert_eq!(vars.substitute("{{zero}}"), "5/0");
    }

    #[test]
    fn update_and_delete() {
        let mut vars = pricing();
        let (price, _) = vars.get_by_key("price").unwrap();
        assert!(vars.update(price, VariableField::Value, "500"));
        assert!(!vars.update(price, VariableField::Value, "500"));
        assert_eq!(vars.substitute("{{total}}"), "100");

        assert!(vars.update(price, VariableField::Key, "cost"));
        assert_eq!(vars.substitute("{{total}}"), "price*0.2");

        assert!(vars.delete(price));
        assert!(!vars.delete(price));
        assert!(!vars.update(price, VariableField::Key, "x"));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn delete_preserves_order() {
        let mut vars = VariableStore::new();
        let a = vars.create("a", "1");
        vars.create("b", "2");
        vars.create("c", "3");
        vars.delete(a);
        let keys: Vec<_> = vars.iter().map(|(_, v)| v.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn arithmetic_class() {
        assert!(is_arithmetic("1000*0.2"));
        assert!(is_arithmetic(" (1 + 2) / 3 "));
        assert!(!is_arithmetic("   "));
        assert!(!is_arithmetic("1e3"));
        assert!(!is_arithmetic("price*2"));
    }

    #[test]
    fn oversized_expression_is_left_as_text() {
        let mut vars = VariableStore::new();
        vars.create("one", "1");
        vars.create("big", vec!["{{one}}"; 20_000].join("+"));
        let out = vars.substitute("{{big}}");
        assert_eq!(out.len(), 20_000 * 2 - 1);
        assert!(out.starts_with("1+1+"));

        vars.create("sum", vec!["{{one}}"; 300].join("+"));
        assert_eq!(vars.substitute("{{sum}}"), "300");
    }
}
