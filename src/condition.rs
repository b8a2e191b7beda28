//! Condition documents: MongoDB-style predicates over an [`AttributeValue`] tree.
//!
//! Conditions arrive from the backend as JSON documents and are parsed once into a closed tree of
//! combinators, field clauses and operator clauses. Parsing only fails on structural problems
//! (e.g., `$or` operand that is not an array). Clauses that are well-formed JSON but cannot be
//! evaluated meaningfully (unknown operator, bad regex, ill-typed operand) are kept in the tree
//! and evaluate to `false`.
use std::{cmp::Ordering, fmt};

use regex::Regex;
use serde::{de, Deserialize, Deserializer};

use crate::{AttributeValue, Attributes, Error, Result};

/// Prefix reserved for operator and combinator names.
pub const OPERATOR_PREFIX: char = '$';

/// A predicate over an attribute tree.
#[derive(Debug, Clone)]
pub enum Condition {
    /// True if the list is empty or any sub-condition is true.
    Or(Vec<Condition>),
    /// Negation of [`Condition::Or`].
    Nor(Vec<Condition>),
    /// True if every sub-condition is true.
    And(Vec<Condition>),
    /// Negation of a single sub-condition.
    Not(Box<Condition>),
    /// Field clauses, implicitly AND-ed.
    Fields(Vec<FieldClause>),
}

/// `path: value` entry of a field-clause map.
#[derive(Debug, Clone)]
pub struct FieldClause {
    pub path: String,
    pub value: ClauseValue,
}

/// Right-hand side of a field clause.
#[derive(Debug, Clone)]
pub enum ClauseValue {
    /// An object whose every key is an operator. Operators are implicitly AND-ed.
    Operators(Vec<OperatorClause>),
    /// Any other value, matched by deep equality.
    Literal(AttributeValue),
}

/// Relation used by ordered and version comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    /// Return `true` if `ordering` (of attribute relative to operand) satisfies the relation.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
        }
    }
}

/// A single `$operator: operand` pair.
#[derive(Debug, Clone)]
pub enum OperatorClause {
    /// `$eq`
    Eq(AttributeValue),
    /// `$ne`
    Ne(AttributeValue),
    /// `$lt`, `$lte`, `$gt`, `$gte`
    Ordered(Comparison, AttributeValue),
    /// `$regex`
    Regex(RegexOperand),
    /// `$in`
    In(AttributeValue),
    /// `$nin`
    Nin(AttributeValue),
    /// `$all`. `None` if the operand is not an array.
    All(Option<Vec<ClauseValue>>),
    /// `$elemMatch`
    ElemMatch(ElemMatch),
    /// `$size`
    Size(Box<ClauseValue>),
    /// `$exists`. `None` if the operand is not a boolean.
    Exists(Option<bool>),
    /// `$type`
    Type(String),
    /// `$not`
    Not(Box<ClauseValue>),
    /// `$veq`, `$vne`, `$vlt`, `$vlte`, `$vgt`, `$vgte`
    Version(Comparison, String),
    /// Any operator this engine does not know. Always evaluates to `false`.
    Unknown(String),
}

/// Operand of `$elemMatch`. An array element matches if it satisfies either interpretation.
#[derive(Debug, Clone)]
pub struct ElemMatch {
    /// Set when the operand is an operator object, e.g. `{"$gt": 5}`.
    pub operators: Option<Vec<OperatorClause>>,
    /// Set when the operand parses as a condition, e.g. `{"sku": "gem_pack"}`.
    pub condition: Option<Box<Condition>>,
}

/// Regex source along with its compiled form. Compilation errors are kept, so evaluation can
/// fail closed.
#[derive(Debug, Clone)]
pub struct RegexOperand {
    pub pattern: String,
    pub compiled: std::result::Result<Regex, regex::Error>,
}

impl RegexOperand {
    fn new(pattern: String) -> RegexOperand {
        let compiled = Regex::new(&pattern);
        RegexOperand { pattern, compiled }
    }
}

impl Condition {
    /// Parse a condition document.
    ///
    /// ```
    /// # use questline::Condition;
    /// let condition = Condition::from_json(r#"{"$or": [{"country": "DE"}, {"level": {"$gte": 10}}]}"#)?;
    /// assert!(matches!(condition, Condition::Or(_)));
    /// # Ok::<(), questline::Error>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Condition> {
        let document: AttributeValue = serde_json::from_str(json)?;
        Condition::parse(&document)
    }

    /// Parse a condition from an already-decoded document.
    pub fn parse(document: &AttributeValue) -> Result<Condition> {
        let AttributeValue::Object(map) = document else {
            return Err(Error::InvalidCondition(format!(
                "expected an object, found {}",
                document.type_name()
            )));
        };

        let combinators: [(&str, fn(Vec<Condition>) -> Condition); 3] = [
            ("$or", Condition::Or),
            ("$nor", Condition::Nor),
            ("$and", Condition::And),
        ];
        for (combinator, make) in combinators {
            if let Some(operand) = map.get(combinator) {
                warn_ignored_siblings(combinator, map);
                return Ok(make(parse_list(combinator, operand)?));
            }
        }

        if let Some(operand) = map.get("$not") {
            warn_ignored_siblings("$not", map);
            return Ok(Condition::Not(Box::new(Condition::parse(operand)?)));
        }

        Ok(Condition::Fields(
            map.iter()
                .map(|(path, value)| FieldClause {
                    path: path.clone(),
                    value: ClauseValue::parse(value),
                })
                .collect(),
        ))
    }

    /// A condition that matches everything.
    pub fn always() -> Condition {
        Condition::Fields(Vec::new())
    }
}

fn parse_list(combinator: &str, operand: &AttributeValue) -> Result<Vec<Condition>> {
    let AttributeValue::Array(items) = operand else {
        return Err(Error::InvalidCondition(format!(
            "{combinator} expects an array, found {}",
            operand.type_name()
        )));
    };
    items.iter().map(Condition::parse).collect()
}

fn warn_ignored_siblings(combinator: &str, map: &Attributes) {
    if map.len() > 1 {
        log::warn!(target: "questline",
                   combinator,
                   keys:serde = map.keys().collect::<Vec<_>>();
                   "keys next to a combinator are ignored");
    }
}

/// Return `true` if every key of the map is an operator name. Vacuously true for `{}`.
pub(crate) fn is_operator_object(map: &Attributes) -> bool {
    map.keys().all(|key| key.starts_with(OPERATOR_PREFIX))
}

impl ClauseValue {
    /// Classify a clause value: operator objects become [`ClauseValue::Operators`], everything
    /// else is a literal.
    pub fn parse(value: &AttributeValue) -> ClauseValue {
        match value {
            AttributeValue::Object(map) if is_operator_object(map) => {
                ClauseValue::Operators(parse_operators(map))
            }
            _ => ClauseValue::Literal(value.clone()),
        }
    }
}

fn parse_operators(map: &Attributes) -> Vec<OperatorClause> {
    map.iter()
        .map(|(name, operand)| OperatorClause::parse(name, operand))
        .collect()
}

impl OperatorClause {
    /// Build an operator clause from its name and operand. Never fails: unknown operators become
    /// [`OperatorClause::Unknown`].
    pub fn parse(name: &str, operand: &AttributeValue) -> OperatorClause {
        use Comparison::*;

        match name {
            "$eq" => Self::Eq(operand.clone()),
            "$ne" => Self::Ne(operand.clone()),
            "$lt" => Self::Ordered(Lt, operand.clone()),
            "$lte" => Self::Ordered(Lte, operand.clone()),
            "$gt" => Self::Ordered(Gt, operand.clone()),
            "$gte" => Self::Ordered(Gte, operand.clone()),
            "$regex" => Self::Regex(RegexOperand::new(operand.to_string_form().into_owned())),
            "$in" => Self::In(operand.clone()),
            "$nin" => Self::Nin(operand.clone()),
            "$all" => Self::All(
                operand
                    .as_array()
                    .map(|items| items.iter().map(ClauseValue::parse).collect()),
            ),
            "$elemMatch" => Self::ElemMatch(ElemMatch::parse(operand)),
            "$size" => Self::Size(Box::new(ClauseValue::parse(operand))),
            "$exists" => Self::Exists(match operand {
                AttributeValue::Boolean(b) => Some(*b),
                _ => None,
            }),
            "$type" => Self::Type(operand.to_string_form().into_owned()),
            "$not" => Self::Not(Box::new(ClauseValue::parse(operand))),
            "$veq" => Self::Version(Eq, operand.to_string_form().into_owned()),
            "$vne" => Self::Version(Ne, operand.to_string_form().into_owned()),
            "$vlt" => Self::Version(Lt, operand.to_string_form().into_owned()),
            "$vlte" => Self::Version(Lte, operand.to_string_form().into_owned()),
            "$vgt" => Self::Version(Gt, operand.to_string_form().into_owned()),
            "$vgte" => Self::Version(Gte, operand.to_string_form().into_owned()),
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// Operator name as written in condition documents.
    pub fn name(&self) -> &str {
        use Comparison::*;

        match self {
            Self::Eq(_) => "$eq",
            Self::Ne(_) => "$ne",
            Self::Ordered(Lt, _) => "$lt",
            Self::Ordered(Lte, _) => "$lte",
            Self::Ordered(Gt, _) => "$gt",
            Self::Ordered(Gte, _) => "$gte",
            Self::Ordered(Eq, _) => "$eq",
            Self::Ordered(Ne, _) => "$ne",
            Self::Regex(_) => "$regex",
            Self::In(_) => "$in",
            Self::Nin(_) => "$nin",
            Self::All(_) => "$all",
            Self::ElemMatch(_) => "$elemMatch",
            Self::Size(_) => "$size",
            Self::Exists(_) => "$exists",
            Self::Type(_) => "$type",
            Self::Not(_) => "$not",
            Self::Version(Eq, _) => "$veq",
            Self::Version(Ne, _) => "$vne",
            Self::Version(Lt, _) => "$vlt",
            Self::Version(Lte, _) => "$vlte",
            Self::Version(Gt, _) => "$vgt",
            Self::Version(Gte, _) => "$vgte",
            Self::Unknown(name) => name,
        }
    }
}

impl ElemMatch {
    /// Every object operand is read as a condition rooted at the element. Operator objects
    /// (`{"$gt": 5}`) are additionally applied to the element itself.
    fn parse(operand: &AttributeValue) -> ElemMatch {
        let operators = match operand {
            AttributeValue::Object(map) if is_operator_object(map) => Some(parse_operators(map)),
            _ => None,
        };
        let condition = Condition::parse(operand).ok().map(Box::new);
        if operators.is_none() && condition.is_none() {
            log::warn!(target: "questline",
                       operand:display = operand;
                       "$elemMatch operand is neither an operator object nor a condition");
        }
        ElemMatch {
            operators,
            condition,
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let document = AttributeValue::deserialize(deserializer)?;
        Condition::parse(&document).map_err(de::Error::custom)
    }
}

impl TryFrom<&AttributeValue> for Condition {
    type Error = Error;

    fn try_from(value: &AttributeValue) -> Result<Condition> {
        Condition::parse(value)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
        })
    }
}
