//! Single-column predicates and the rules for using them against key columns.
//!
//! Relations are combined by conjunction only. The same [`Relation`] is used in two
//! ways: resolved against a table's key columns to decide which partitions and
//! clustering ranges to visit, and evaluated against the values of a retrieved row.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    error::{Result, WideRowError},
    row::canonical_name,
    schema::ClusteringColumn,
    Row, Value,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equals,
    In,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Comparison {
    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equals => "=",
            Comparison::In => "IN",
            Comparison::GreaterThan => ">",
            Comparison::GreaterThanOrEqual => ">=",
            Comparison::LessThan => "<",
            Comparison::LessThanOrEqual => "<=",
        }
    }

    fn is_lower_bound(&self) -> bool {
        matches!(self, Comparison::GreaterThan | Comparison::GreaterThanOrEqual)
    }

    fn is_upper_bound(&self) -> bool {
        matches!(self, Comparison::LessThan | Comparison::LessThanOrEqual)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    column: String,
    comparison: Comparison,
    terms: Vec<Value>,
}

fn relation<C: AsRef<str>>(column: C, comparison: Comparison, terms: Vec<Value>) -> Relation {
    Relation {
        column: canonical_name(column.as_ref()),
        comparison,
        terms,
    }
}

pub fn eq<C: AsRef<str>, V: Into<Value>>(column: C, value: V) -> Relation {
    relation(column, Comparison::Equals, vec![value.into()])
}

/// Set membership. `is_in(c, [v])` behaves exactly like `eq(c, v)`.
pub fn is_in<C, I>(column: C, values: I) -> Relation
where
    C: AsRef<str>,
    I: IntoIterator,
    I::Item: Into<Value>,
{
    relation(
        column,
        Comparison::In,
        values.into_iter().map(Into::into).collect(),
    )
}

pub fn gt<C: AsRef<str>, V: Into<Value>>(column: C, value: V) -> Relation {
    relation(column, Comparison::GreaterThan, vec![value.into()])
}

pub fn gte<C: AsRef<str>, V: Into<Value>>(column: C, value: V) -> Relation {
    relation(column, Comparison::GreaterThanOrEqual, vec![value.into()])
}

pub fn lt<C: AsRef<str>, V: Into<Value>>(column: C, value: V) -> Relation {
    relation(column, Comparison::LessThan, vec![value.into()])
}

pub fn lte<C: AsRef<str>, V: Into<Value>>(column: C, value: V) -> Relation {
    relation(column, Comparison::LessThanOrEqual, vec![value.into()])
}

impl Relation {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn terms(&self) -> &[Value] {
        &self.terms
    }

    /// Equality, or IN with exactly one literal.
    pub fn is_equality(&self) -> bool {
        match self.comparison {
            Comparison::Equals => true,
            Comparison::In => self.terms.len() == 1,
            _ => false,
        }
    }

    /// Evaluates the relation against a stored value. Values that cannot be
    /// compared with the literal never match.
    pub fn accepts(&self, value: &Value) -> bool {
        use std::cmp::Ordering::*;

        let ordering = || self.terms.first().and_then(|t| value.canonical_cmp(t));
        match self.comparison {
            Comparison::Equals | Comparison::In => {
                self.terms.iter().any(|term| value.canonical_eq(term))
            }
            Comparison::GreaterThan => ordering() == Some(Greater),
            Comparison::GreaterThanOrEqual => matches!(ordering(), Some(Greater | Equal)),
            Comparison::LessThan => ordering() == Some(Less),
            Comparison::LessThanOrEqual => matches!(ordering(), Some(Less | Equal)),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.comparison {
            Comparison::In => {
                write!(f, "{} IN (", self.column)?;
                for (i, term) in self.terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{term}")?;
                }
                write!(f, ")")
            }
            comparison => match self.terms.first() {
                Some(term) => write!(f, "{} {} {}", self.column, comparison.symbol(), term),
                None => write!(f, "{} {} ?", self.column, comparison.symbol()),
            },
        }
    }
}

/// Renders a relation set the way it would read in a WHERE clause.
pub fn describe(relations: &[Relation]) -> String {
    relations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Applies relations to a retrieved row (AND logic). A relation on a column the
/// row does not have fails.
pub fn apply_filters<'r, I>(row: &Row, relations: I) -> bool
where
    I: IntoIterator<Item = &'r Relation>,
{
    relations.into_iter().all(|relation| match row.get(&relation.column) {
        Some(value) => {
            let matches = relation.accepts(value);
            trace!(%relation, ?value, matches, "Applying value filter");
            matches
        }
        None => false,
    })
}

fn relations_on<'r>(relations: &'r [Relation], column: &str) -> Vec<&'r Relation> {
    relations.iter().filter(|r| r.column == column).collect()
}

/// Every combination of one value per column, in column order then literal order.
pub(crate) fn cartesian(choices: &[Vec<Value>]) -> Vec<Vec<Value>> {
    choices.iter().fold(vec![Vec::new()], |resolved, options| {
        resolved
            .iter()
            .flat_map(|prefix| {
                options.iter().map(move |value| {
                    let mut key = prefix.clone();
                    key.push(value.clone());
                    key
                })
            })
            .collect()
    })
}

/// Resolves relations over the partition key columns into the full list of
/// partition keys to visit, in the order their IN literals were given.
///
/// Every partition column must be bound. All but the last need a single equality;
/// the last may use IN.
pub fn resolve_partition_keys(columns: &[String], relations: &[Relation]) -> Result<Vec<Vec<Value>>> {
    let mut choices = Vec::with_capacity(columns.len());
    for (position, column) in columns.iter().enumerate() {
        let is_last = position + 1 == columns.len();
        let bound = relations_on(relations, column);
        let relation = match bound.as_slice() {
            [] => return Err(WideRowError::MissingKeyPart(column.clone())),
            [relation] => *relation,
            _ => {
                return Err(WideRowError::invalid_key_usage(
                    column,
                    "partition key column is restricted more than once",
                ))
            }
        };
        match relation.comparison {
            Comparison::Equals | Comparison::In if relation.is_equality() || is_last => {
                choices.push(relation.terms.clone())
            }
            Comparison::In => {
                return Err(WideRowError::invalid_key_usage(
                    column,
                    "IN is only allowed on the last partition key column",
                ))
            }
            _ => {
                return Err(WideRowError::invalid_key_usage(
                    column,
                    "partition key columns only accept equality or IN",
                ))
            }
        }
    }
    Ok(cartesian(&choices))
}

/// The part of a partition a set of clustering relations selects.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusteringSelection {
    /// Equality prefixes; all have the same length. A single empty prefix selects
    /// the whole partition.
    pub prefixes: Vec<Vec<Value>>,
    /// Ordering bounds on the clustering column that follows the prefix.
    pub range: Vec<Relation>,
}

impl ClusteringSelection {
    pub fn whole_partition() -> Self {
        Self {
            prefixes: vec![Vec::new()],
            range: Vec::new(),
        }
    }

    pub fn prefix_len(&self) -> usize {
        self.prefixes.first().map_or(0, Vec::len)
    }

    /// True when every prefix names a single column group.
    pub fn is_exact(&self, clustering_len: usize) -> bool {
        self.range.is_empty() && self.prefix_len() == clustering_len
    }
}

/// Resolves relations over the clustering columns.
///
/// Restricted columns must form a prefix of the clustering key. Each of them
/// carries a single equality, except the last restricted column, which may use IN
/// or up to one lower and one upper bound. With no clustering relations at all the
/// whole partition is selected.
pub fn resolve_clustering(
    columns: &[ClusteringColumn],
    relations: &[Relation],
) -> Result<ClusteringSelection> {
    let mut choices: Vec<Vec<Value>> = Vec::new();
    let mut range = Vec::new();
    let mut unrestricted: Option<&str> = None;
    let mut terminal: Option<&str> = None;

    for column in columns {
        let bound = relations_on(relations, &column.name);
        if bound.is_empty() {
            if unrestricted.is_none() {
                unrestricted = Some(column.name.as_str());
            }
            continue;
        }
        if let Some(previous) = unrestricted {
            return Err(WideRowError::invalid_key_usage(
                &column.name,
                format!("preceding clustering column '{previous}' is not restricted"),
            ));
        }
        if let Some(previous) = terminal {
            return Err(WideRowError::invalid_key_usage(
                previous,
                format!(
                    "IN or a range must be on the last restricted clustering column, '{}' follows",
                    column.name
                ),
            ));
        }

        match bound.as_slice() {
            [relation] if relation.is_equality() => choices.push(relation.terms.clone()),
            [relation] if relation.comparison == Comparison::In => {
                choices.push(relation.terms.clone());
                terminal = Some(column.name.as_str());
            }
            bounds if bounds.iter().all(|r| r.comparison.is_lower_bound() || r.comparison.is_upper_bound()) => {
                let lower = bounds.iter().filter(|r| r.comparison.is_lower_bound()).count();
                let upper = bounds.len() - lower;
                if lower > 1 || upper > 1 {
                    return Err(WideRowError::invalid_key_usage(
                        &column.name,
                        "at most one lower and one upper bound are allowed",
                    ));
                }
                range = bounds.iter().map(|r| (*r).clone()).collect();
                terminal = Some(column.name.as_str());
            }
            _ => {
                return Err(WideRowError::invalid_key_usage(
                    &column.name,
                    "clustering column mixes equality with other restrictions",
                ))
            }
        }
    }

    Ok(ClusteringSelection {
        prefixes: cartesian(&choices),
        range,
    })
}
