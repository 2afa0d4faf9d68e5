use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest local part and whole address accepted by [`Rule::Email`]
const MAX_EMAIL_LOCAL_LENGTH: usize = 64;
const MAX_EMAIL_LENGTH: usize = 254;

/// Digit bounds for [`Rule::Phone`]
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// A single field constraint.
///
/// Size rules measure strings by character count, numbers by value and
/// arrays/objects by length.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Email,
    Min(f64),
    Max(f64),
    Len(usize),
    Gte(f64),
    Gt(f64),
    Lte(f64),
    Lt(f64),
    /// Number, or a string holding a signed decimal
    Numeric,
    /// Number, or a string of digits only
    Number,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("unknown validation tag {0:?}")]
    UnknownTag(String),

    #[error("validation tag {0:?} requires a parameter")]
    MissingParameter(String),

    #[error("validation tag {0:?} takes no parameter")]
    UnexpectedParameter(String),

    #[error("invalid parameter {param:?} for validation tag {tag:?}")]
    InvalidParameter { tag: String, param: String },
}

/// Result of applying one rule to one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Pass,
    Fail,
    /// The rule cannot measure this kind of value
    Unsupported,
}

impl Rule {
    /// Parse a comma separated tag list such as `required,email,min=3`
    pub fn parse_list(tags: &str) -> Result<Vec<Rule>, RuleParseError> {
        tags.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(Rule::from_str)
            .collect()
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Email => "email",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Len(_) => "len",
            Rule::Gte(_) => "gte",
            Rule::Gt(_) => "gt",
            Rule::Lte(_) => "lte",
            Rule::Lt(_) => "lt",
            Rule::Numeric => "numeric",
            Rule::Number => "number",
            Rule::Phone => "phone",
        }
    }

    /// Human readable failure message for `field`
    pub fn message(&self, field: &str) -> String {
        match self {
            Rule::Required => format!("{} is required", field),
            Rule::Email => format!("{} is not a valid email", field),
            Rule::Min(p) => format!("{} must be at least {}", field, p),
            Rule::Max(p) => format!("{} must be at most {}", field, p),
            Rule::Len(p) => format!("{} must be {} characters long", field, p),
            Rule::Gte(p) => format!("{} must be greater than or equal to {}", field, p),
            Rule::Gt(p) => format!("{} must be greater than {}", field, p),
            Rule::Lte(p) => format!("{} must be less than or equal to {}", field, p),
            Rule::Lt(p) => format!("{} must be less than {}", field, p),
            Rule::Numeric => format!("{} must be numeric", field),
            Rule::Number => format!("{} must be a number", field),
            Rule::Phone => format!("{} invalid phone number", field),
        }
    }

    pub(crate) fn check(&self, value: &Value) -> Outcome {
        let passed = match self {
            Rule::Required => is_present(value),
            Rule::Email => value.as_str().is_some_and(is_email),
            Rule::Phone => value.as_str().is_some_and(is_phone),
            Rule::Numeric => match value {
                Value::Number(_) => true,
                Value::String(s) => is_signed_decimal(s),
                _ => false,
            },
            Rule::Number => match value {
                Value::Number(_) => true,
                Value::String(s) => !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
                _ => false,
            },
            Rule::Len(expected) => match measure(value) {
                Some(size) => size == *expected as f64,
                None => return Outcome::Unsupported,
            },
            Rule::Min(bound) | Rule::Gte(bound) => match measure(value) {
                Some(size) => size >= *bound,
                None => return Outcome::Unsupported,
            },
            Rule::Max(bound) | Rule::Lte(bound) => match measure(value) {
                Some(size) => size <= *bound,
                None => return Outcome::Unsupported,
            },
            Rule::Gt(bound) => match measure(value) {
                Some(size) => size > *bound,
                None => return Outcome::Unsupported,
            },
            Rule::Lt(bound) => match measure(value) {
                Some(size) => size < *bound,
                None => return Outcome::Unsupported,
            },
        };

        if passed {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }
}

impl FromStr for Rule {
    type Err = RuleParseError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let (name, param) = match tag.split_once('=') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (tag.trim(), None),
        };

        let number = |param: Option<&str>| -> Result<f64, RuleParseError> {
            let raw = param.ok_or_else(|| RuleParseError::MissingParameter(name.to_string()))?;
            raw.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| RuleParseError::InvalidParameter {
                    tag: name.to_string(),
                    param: raw.to_string(),
                })
        };

        let bare = |rule: Rule| -> Result<Rule, RuleParseError> {
            match param {
                Some(_) => Err(RuleParseError::UnexpectedParameter(name.to_string())),
                None => Ok(rule),
            }
        };

        match name {
            "required" => bare(Rule::Required),
            "email" => bare(Rule::Email),
            "numeric" => bare(Rule::Numeric),
            "number" => bare(Rule::Number),
            "phone" => bare(Rule::Phone),
            "min" => number(param).map(Rule::Min),
            "max" => number(param).map(Rule::Max),
            "gte" => number(param).map(Rule::Gte),
            "gt" => number(param).map(Rule::Gt),
            "lte" => number(param).map(Rule::Lte),
            "lt" => number(param).map(Rule::Lt),
            "len" => {
                let raw = param.ok_or_else(|| RuleParseError::MissingParameter(name.to_string()))?;
                raw.parse()
                    .map(Rule::Len)
                    .map_err(|_| RuleParseError::InvalidParameter {
                        tag: name.to_string(),
                        param: raw.to_string(),
                    })
            }
            other => Err(RuleParseError::UnknownTag(other.to_string())),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Min(p) | Rule::Max(p) | Rule::Gte(p) | Rule::Gt(p) | Rule::Lte(p) | Rule::Lt(p) => {
                write!(f, "{}={}", self.tag(), p)
            }
            Rule::Len(p) => write!(f, "len={}", p),
            _ => f.write_str(self.tag()),
        }
    }
}

/// Zero values (null, "", 0, false) count as absent
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Number(n) => n.as_f64(),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        Value::Null | Value::Bool(_) => None,
    }
}

fn is_signed_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix(&['+', '-'][..]).unwrap_or(s);
    let (int, frac) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (unsigned, None),
    };

    let digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    digits(int) && frac.map_or(true, digits)
}

fn is_email(s: &str) -> bool {
    if s.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local.len() <= MAX_EMAIL_LOCAL_LENGTH
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c));

    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    local_ok && domain_ok
}

fn is_phone(s: &str) -> bool {
    let s = s.trim();
    let body = s.strip_prefix('+').unwrap_or(s);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || " -()".contains(c)) {
        return false;
    }

    let digits = body.chars().filter(char::is_ascii_digit).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}
