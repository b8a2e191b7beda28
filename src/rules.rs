use crate::{
    condition::{ClauseValue, Condition, ElemMatch, OperatorClause, RegexOperand},
    version::{compare_versions, ordinal_cmp},
    AttributeValue,
};

/// Evaluate `condition` against `attributes`.
///
/// Total and side-effect free (apart from logging): clauses that cannot be applied evaluate to
/// `false`.
///
/// ```
/// # use questline::{evaluate, AttributeValue, Condition};
/// let user: AttributeValue = serde_json::json!({"country": "DE", "level": 12}).into();
/// let condition = Condition::from_json(r#"{"country": {"$in": ["DE", "AT"]}, "level": {"$gte": 10}}"#)?;
/// assert!(evaluate(&user, &condition));
/// # Ok::<(), questline::Error>(())
/// ```
pub fn evaluate(attributes: &AttributeValue, condition: &Condition) -> bool {
    condition.eval(attributes)
}

impl Condition {
    /// Evaluate the condition with `attributes` as the root for field paths.
    pub fn eval(&self, attributes: &AttributeValue) -> bool {
        match self {
            Condition::Or(conditions) => eval_or(attributes, conditions),
            Condition::Nor(conditions) => !eval_or(attributes, conditions),
            Condition::And(conditions) => conditions
                .iter()
                .all(|condition| condition.eval(attributes)),
            Condition::Not(condition) => !condition.eval(attributes),
            Condition::Fields(fields) => fields
                .iter()
                .all(|field| field.value.eval(attributes.lookup(&field.path))),
        }
    }
}

/// Vacuously true for an empty list.
fn eval_or(attributes: &AttributeValue, conditions: &[Condition]) -> bool {
    conditions.is_empty()
        || conditions
            .iter()
            .any(|condition| condition.eval(attributes))
}

impl ClauseValue {
    /// Match the clause against a resolved attribute (`None` if the path is missing).
    pub(crate) fn eval(&self, attribute: Option<&AttributeValue>) -> bool {
        match self {
            ClauseValue::Operators(operators) => {
                operators.iter().all(|operator| operator.eval(attribute))
            }
            ClauseValue::Literal(expected) => expected == or_null(attribute),
        }
    }
}

/// Missing attributes compare like explicit nulls.
fn or_null(attribute: Option<&AttributeValue>) -> &AttributeValue {
    attribute.unwrap_or(&AttributeValue::Null)
}

impl OperatorClause {
    /// Applying the operator to the attribute. Returns `false` if the operator cannot be applied or
    /// there's a misconfiguration.
    fn eval(&self, attribute: Option<&AttributeValue>) -> bool {
        let result = self.try_eval(attribute).unwrap_or(false);
        log::trace!(target: "questline",
                    operator = self.name(),
                    attribute:serde = attribute,
                    result;
                    "evaluated operator clause");
        result
    }

    /// Try applying the operator, returning `None` if the operator cannot be applied.
    fn try_eval(&self, attribute: Option<&AttributeValue>) -> Option<bool> {
        match self {
            Self::Eq(expected) => Some(or_null(attribute) == expected),
            Self::Ne(expected) => Some(or_null(attribute) != expected),

            Self::Ordered(comparison, operand) => {
                let ordering = match (attribute?, operand) {
                    (AttributeValue::Number(a), AttributeValue::Number(b)) => a.partial_cmp(b)?,
                    (AttributeValue::String(a), AttributeValue::String(b)) => ordinal_cmp(a, b),
                    _ => return None,
                };
                Some(comparison.holds(ordering))
            }

            Self::Regex(RegexOperand { pattern, compiled }) => {
                let attribute = attribute?;
                match compiled {
                    Ok(regex) => Some(regex.is_match(&attribute.to_string_form())),
                    Err(err) => {
                        log::warn!(target: "questline",
                                   pattern = pattern.as_str();
                                   "invalid $regex pattern, failing the condition: {}", err);
                        None
                    }
                }
            }

            Self::In(operand) => is_in(attribute, operand),
            Self::Nin(operand) => is_in(attribute, operand).map(|found| !found),

            Self::All(expected) => {
                let Some(expected) = expected else {
                    log::warn!(target: "questline", "$all expects an array operand");
                    return None;
                };
                let items = attribute?.as_array()?;
                Some(
                    expected
                        .iter()
                        .all(|clause| items.iter().any(|item| clause.eval(Some(item)))),
                )
            }

            Self::ElemMatch(elem_match) => Some(elem_match.matches(attribute?.as_array()?)),

            Self::Size(expected) => {
                let items = attribute?.as_array()?;
                Some(expected.eval(Some(&AttributeValue::Number(items.len() as f64))))
            }

            Self::Exists(expected) => {
                let Some(expected) = expected else {
                    log::warn!(target: "questline", "$exists expects a boolean operand");
                    return None;
                };
                let present = attribute.is_some_and(|value| !value.is_null());
                Some(present == *expected)
            }

            Self::Type(expected) => {
                let actual = attribute.map_or("null", AttributeValue::type_name);
                Some(actual == expected.as_str())
            }

            Self::Not(clause) => Some(!clause.eval(attribute)),

            Self::Version(comparison, operand) => {
                let actual = attribute?.to_string_form();
                Some(comparison.holds(compare_versions(&actual, operand)))
            }

            Self::Unknown(name) => {
                log::warn!(target: "questline",
                           operator = name.as_str();
                           "unsupported operator, failing the condition");
                None
            }
        }
    }
}

/// `$in` membership. `None` if the operand is not an array.
///
/// Array attributes match if they share at least one element with the operand. Scalar attributes
/// match an equal operand element, or else if their string form occurs in the operand's indented
/// JSON text.
fn is_in(attribute: Option<&AttributeValue>, operand: &AttributeValue) -> Option<bool> {
    let Some(candidates) = operand.as_array() else {
        log::warn!(target: "questline", operand:display = operand; "$in/$nin expects an array operand");
        return None;
    };

    Some(match attribute {
        Some(AttributeValue::Array(items)) => items.iter().any(|item| candidates.contains(item)),
        Some(value) => {
            candidates.contains(value) || {
                let needle = value.to_string_form();
                !needle.trim().is_empty() && operand.to_indented_string().contains(&*needle)
            }
        }
        None => false,
    })
}

impl ElemMatch {
    fn matches(&self, items: &[AttributeValue]) -> bool {
        items.iter().any(|item| {
            self.operators
                .as_ref()
                .is_some_and(|operators| operators.iter().all(|op| op.eval(Some(item))))
                || self
                    .condition
                    .as_ref()
                    .is_some_and(|condition| condition.eval(item))
        })
    }
}
