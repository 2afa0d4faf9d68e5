use serde::Serialize;
use serde_json::Value;

use super::rules::{Outcome, Rule, RuleParseError};
use crate::errors::{Exception, FieldErrors};

pub const INVALID_PARAMETERS_MESSAGE: &str = "invalid request parameters";

#[derive(Debug, Clone)]
struct FieldRules {
    name: String,
    label: String,
    rules: Vec<Rule>,
}

/// Declarative constraints over the top-level fields of a JSON object
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldRules>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain `name`, reporting failures under the same name
    pub fn field(self, name: impl Into<String>, rules: &[Rule]) -> Self {
        let name = name.into();
        self.labeled(name.clone(), name, rules)
    }

    /// Constrain `name`, reporting failures under `label`
    pub fn labeled(mut self, name: impl Into<String>, label: impl Into<String>, rules: &[Rule]) -> Self {
        self.fields.push(FieldRules {
            name: name.into(),
            label: label.into(),
            rules: rules.to_vec(),
        });
        self
    }

    /// Constrain `name` with a tag list such as `required,email`
    pub fn tagged(self, name: impl Into<String>, tags: &str) -> Result<Self, RuleParseError> {
        let rules = Rule::parse_list(tags)?;
        Ok(self.field(name, &rules))
    }

    /// Check every field; the map holds the first failure per field label
    pub fn validate(&self, value: &Value) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        for entry in &self.fields {
            let field = value.get(&entry.name).unwrap_or(&Value::Null);
            if let Some(message) = first_failure(&entry.label, field, &entry.rules) {
                errors.insert(entry.label.clone(), message);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate any serializable value, failing with `invalid_parameter`
    pub fn check<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), Exception> {
        let value = serde_json::to_value(value).map_err(|e| {
            Exception::internal("failed to inspect request parameters").with_cause(e)
        })?;

        self.validate(&value)
            .map_err(|errors| Exception::invalid_parameter(INVALID_PARAMETERS_MESSAGE, errors))
    }
}

/// Validate a standalone value under `label`
pub fn validate_value(label: &str, value: &Value, rules: &[Rule]) -> Result<(), FieldErrors> {
    match first_failure(label, value, rules) {
        Some(message) => Err(FieldErrors::from([(label.to_string(), message)])),
        None => Ok(()),
    }
}

fn first_failure(label: &str, value: &Value, rules: &[Rule]) -> Option<String> {
    // Only `required` looks at absent values
    let absent = value.is_null();

    rules.iter().find_map(|rule| {
        if absent && *rule != Rule::Required {
            return None;
        }
        match rule.check(value) {
            Outcome::Pass => None,
            Outcome::Fail => Some(rule.message(label)),
            Outcome::Unsupported => Some(format!("{} is not valid", label)),
        }
    })
}

/// Types whose JSON form is checked against a fixed schema
pub trait Validate {
    fn schema() -> &'static Schema;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    fn signup() -> Schema {
        Schema::new()
            .labeled("email", "Email", &[Rule::Required, Rule::Email])
            .labeled("name", "Name", &[Rule::Required, Rule::Min(3.0), Rule::Max(20.0)])
            .tagged("age", "gte=18,lt=130")
            .unwrap()
            .tagged("phone", "phone")
            .unwrap()
    }

    #[test]
    fn test_valid_payload() {
        let payload = json!({"email": "a@b.io", "name": "Alice", "age": 30, "phone": "+14155552671"});
        assert!(signup().validate(&payload).is_ok());
    }

    #[test]
    fn test_reports_first_failure_per_field() {
        let payload = json!({"email": "not-an-email", "name": "Al", "age": 12});
        let errors = signup().validate(&payload).unwrap_err();

        assert_eq!(errors.len(), 3);
        assert_eq!(errors["Email"], "Email is not a valid email");
        assert_eq!(errors["Name"], "Name must be at least 3");
        assert_eq!(errors["age"], "age must be greater than or equal to 18");
    }

    #[test]
    fn test_missing_fields() {
        let errors = signup().validate(&json!({})).unwrap_err();

        // Optional fields without `required` are skipped when absent
        assert_eq!(errors.len(), 2);
        assert_eq!(errors["Email"], "Email is required");
        assert_eq!(errors["Name"], "Name is required");
    }

    #[test]
    fn test_null_treated_as_absent() {
        let payload = json!({"email": "a@b.io", "name": "Alice", "age": null});
        assert!(signup().validate(&payload).is_ok());
    }

    #[test]
    fn test_unmeasurable_value() {
        let schema = Schema::new().field("count", &[Rule::Gt(0.0)]);
        let errors = schema.validate(&json!({"count": true})).unwrap_err();
        assert_eq!(errors["count"], "count is not valid");
    }

    #[test]
    fn test_non_object_input() {
        let errors = signup().validate(&json!("just a string")).unwrap_err();
        assert_eq!(errors["Email"], "Email is required");
    }

    #[test]
    fn test_validate_value() {
        assert!(validate_value("Code", &json!("1234"), &[Rule::Len(4), Rule::Number]).is_ok());

        let errors = validate_value("Code", &json!("12a4"), &[Rule::Len(4), Rule::Number]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["Code"], "Code must be a number");
    }

    #[test]
    fn test_check_builds_invalid_parameter() {
        #[derive(Serialize)]
        struct Login<'a> {
            email: &'a str,
        }

        let schema = Schema::new().field("email", &[Rule::Required, Rule::Email]);
        assert!(schema.check(&Login { email: "x@y.dev" }).is_ok());

        let exc = schema.check(&Login { email: "" }).unwrap_err();
        assert_eq!(exc.kind(), ErrorKind::InvalidParameter);
        assert_eq!(exc.message(), INVALID_PARAMETERS_MESSAGE);
        assert_eq!(exc.field_errors().unwrap()["email"], "email is required");
    }
}
