//! Query filter builder.
//!
//! ```
//! use hub_binding::filter::{Any, Filter};
//!
//! let filter = Filter::new()
//!     .and("name").eq("Elmer")
//!     .and("age").gt(10)
//!     .and("pet").eq(Any::of(["cat", "dog"]));
//! assert_eq!(filter.to_string(), "name=Elmer,age>10,pet=(cat|dog)");
//! ```
//!
//! Terms are AND-joined with `,`. The whole expression travels as a single
//! `filter=` query parameter.

use std::fmt;

use crate::path::Param;

/// Query parameter key carrying the expression.
pub const PARAM: &str = "filter";

const AND: char = ',';
const OR: char = '|';
const QUOTE: char = '\'';

/// Characters that force a string literal to be quoted.
const RESERVED: &[char] = &['=', '!', '~', '>', '<', ',', '|', '(', ')', ' '];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("ambiguous literal for field '{field}': {literal}")]
    Ambiguous { field: String, literal: String },
}

/// Predicate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Like,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Like => "~",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i128),
    Bool(bool),
    /// Matches any listed value.
    Any(Vec<Value>),
    /// Matches all listed values.
    All(Vec<Value>),
}

/// List literal matching any item.
pub struct Any;

/// List literal matching all items.
pub struct All;

impl Any {
    pub fn of<I, V>(items: I) -> Value
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Any(items.into_iter().map(Into::into).collect())
    }
}

impl All {
    pub fn of<I, V>(items: I) -> Value
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::All(items.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Self::Int(n as i128)
            }
        })*
    };
}

int_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl Value {
    fn ambiguous(&self) -> Option<&str> {
        match self {
            Self::Str(s) if s.contains(QUOTE) => Some(s),
            Self::Any(items) | Self::All(items) => items.iter().find_map(Value::ambiguous),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) if s.is_empty() || s.contains(RESERVED) => write!(f, "{QUOTE}{s}{QUOTE}"),
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Any(items) => write_list(f, items, OR),
            Self::All(items) => write_list(f, items, AND),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value], separator: char) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

/// Single `<field><op><literal>` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.field, self.operator, self.value)
    }
}

/// Filter expression builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a term on `field`; the operator call completes it.
    pub fn and(self, field: impl Into<String>) -> Term {
        Term {
            filter: self,
            field: field.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Reject literals whose quoting would be ambiguous.
    pub fn validate(&self) -> Result<(), FilterError> {
        for p in &self.predicates {
            if let Some(literal) = p.value.ambiguous() {
                return Err(FilterError::Ambiguous {
                    field: p.field.clone(),
                    literal: literal.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The `filter=` query parameter; `None` when the filter is empty.
    pub fn param(&self) -> Result<Option<Param>, FilterError> {
        if self.is_empty() {
            return Ok(None);
        }
        self.validate()?;
        Ok(Some(Param::new(PARAM, self)))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, "{AND}")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

/// Pending term; consumed by an operator.
#[must_use]
#[derive(Debug)]
pub struct Term {
    filter: Filter,
    field: String,
}

impl Term {
    pub fn op(mut self, operator: Operator, value: impl Into<Value>) -> Filter {
        self.filter.predicates.push(Predicate {
            field: self.field,
            operator,
            value: value.into(),
        });
        self.filter
    }

    pub fn eq(self, value: impl Into<Value>) -> Filter {
        self.op(Operator::Eq, value)
    }

    pub fn not_eq(self, value: impl Into<Value>) -> Filter {
        self.op(Operator::NotEq, value)
    }

    pub fn like(self, value: impl Into<Value>) -> Filter {
        self.op(Operator::Like, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Filter {
        self.op(Operator::Gt, value)
    }

    pub fn gt_eq(self, value: impl Into<Value>) -> Filter {
        self.op(Operator::GtEq, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Filter {
        self.op(Operator::Lt, value)
    }

    pub fn lt_eq(self, value: impl Into<Value>) -> Filter {
        self.op(Operator::LtEq, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_has_no_param() {
        let filter = Filter::new();
        assert_eq!(filter.to_string(), "");
        assert_eq!(filter.param().unwrap(), None);
    }

    #[test]
    fn test_two_terms() {
        let filter = Filter::new().and("name").eq("x").and("kind").eq("y");
        assert_eq!(filter.to_string(), "name=x,kind=y");
        assert_eq!(
            filter.param().unwrap(),
            Some(Param::new("filter", "name=x,kind=y"))
        );
    }

    #[test]
    fn test_operators() {
        let filter = Filter::new()
            .and("a").not_eq(1)
            .and("b").like("Rov*")
            .and("c").gt_eq(2u64)
            .and("d").lt(-3)
            .and("e").lt_eq(4)
            .and("f").gt(5);
        assert_eq!(filter.to_string(), "a!=1,b~Rov*,c>=2,d<-3,e<=4,f>5");
    }

    #[test]
    fn test_literal_rendering() {
        let filter = Filter::new()
            .and("enabled").eq(true)
            .and("name").eq("two words")
            .and("expr").eq("a=b")
            .and("list").eq("a,b")
            .and("blank").eq("");
        assert_eq!(
            filter.to_string(),
            "enabled=true,name='two words',expr='a=b',list='a,b',blank=''"
        );
    }

    #[test]
    fn test_list_literals() {
        let filter = Filter::new()
            .and("id").eq(Any::of([1, 2, 3]))
            .and("tag").eq(All::of(["a", "b c"]));
        assert_eq!(filter.to_string(), "id=(1|2|3),tag=(a,'b c')");
    }

    #[test]
    fn test_ambiguous_literal_rejected() {
        let filter = Filter::new().and("name").eq("it's");
        assert_eq!(
            filter.param().unwrap_err(),
            FilterError::Ambiguous {
                field: "name".into(),
                literal: "it's".into()
            }
        );

        let nested = Filter::new().and("name").eq(Any::of(["ok", "o'k"]));
        assert!(nested.validate().is_err());
    }
}
