//! Filter AST types.
//!
//! The filter language is naturally recursive, so the tree is a tagged
//! union with boxed children. `Display` renders a parseable filter string;
//! re-parsing the rendered form yields the same tree modulo `Group`
//! wrappers (see [`Filter::without_groups`]).

use std::fmt;

/// A parsed SCIM filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// The empty filter. Matches every document.
    Empty,
    /// `path op literal`, e.g. `userName eq "john"`.
    Compare(AttrExpr),
    /// `path pr`, attribute presence.
    Present(AttrPath),
    /// Logical conjunction; left operand evaluated first.
    And(Box<Filter>, Box<Filter>),
    /// Logical disjunction; left operand evaluated first.
    Or(Box<Filter>, Box<Filter>),
    /// Logical negation. Strictly unary.
    Not(Box<Filter>),
    /// A parenthesized sub-expression. Transparent to evaluation.
    Group(Box<Filter>),
}

/// An attribute comparison: path, operator, literal.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrExpr {
    pub path: AttrPath,
    pub op: CompareOp,
    pub value: Literal,
}

/// An attribute path as it appears inside a filter.
///
/// The path may carry a value-path filter on its root attribute,
/// e.g. `emails[type eq "work"].value`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrPath {
    /// Root attribute name (may carry a `urn:` prefix).
    pub attribute: String,
    /// Bracketed value filter selecting elements of a multi-valued root.
    pub value_filter: Option<Box<Filter>>,
    /// Dotted sub-attribute continuations, outermost first.
    pub sub_attributes: Vec<String>,
}

impl AttrPath {
    /// A plain single-attribute path.
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            attribute: name.into(),
            value_filter: None,
            sub_attributes: Vec::new(),
        }
    }

    /// A `root.sub` path.
    pub fn sub_attribute(root: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            attribute: root.into(),
            value_filter: None,
            sub_attributes: vec![sub.into()],
        }
    }
}

/// Comparison operators of the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Co,
    Sw,
    Ew,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// Recognize an operator keyword, case-insensitively.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "co" => Some(Self::Co),
            "sw" => Some(Self::Sw),
            "ew" => Some(Self::Ew),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Co => "co",
            Self::Sw => "sw",
            Self::Ew => "ew",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }
}

/// A comparison literal: string, number, boolean, or null.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

impl Filter {
    /// Strip `Group` wrappers recursively. Grouping affects parsing only,
    /// never meaning, so equivalence checks compare ungrouped trees.
    pub fn without_groups(&self) -> Filter {
        match self {
            Filter::Group(inner) => inner.without_groups(),
            Filter::And(l, r) => Filter::And(
                Box::new(l.without_groups()),
                Box::new(r.without_groups()),
            ),
            Filter::Or(l, r) => Filter::Or(
                Box::new(l.without_groups()),
                Box::new(r.without_groups()),
            ),
            Filter::Not(inner) => Filter::Not(Box::new(inner.without_groups())),
            other => other.clone(),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent_is_and: bool) -> fmt::Result {
        // An `or` under an `and` (or a nested right-hand operand of the
        // same operator) needs parentheses to reparse with the same shape.
        let needs_parens = match self {
            Filter::Or(..) => parent_is_and,
            _ => false,
        };
        if needs_parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Empty => Ok(()),
            Filter::Compare(expr) => write!(f, "{} {} {}", expr.path, expr.op.keyword(), expr.value),
            Filter::Present(path) => write!(f, "{} pr", path),
            Filter::And(l, r) => {
                l.fmt_operand(f, true)?;
                f.write_str(" and ")?;
                match r.as_ref() {
                    // Right-nested same-op trees must keep their shape.
                    Filter::And(..) | Filter::Or(..) => write!(f, "({})", r),
                    _ => r.fmt_operand(f, true),
                }
            }
            Filter::Or(l, r) => {
                l.fmt_operand(f, false)?;
                f.write_str(" or ")?;
                match r.as_ref() {
                    Filter::Or(..) => write!(f, "({})", r),
                    _ => r.fmt_operand(f, false),
                }
            }
            Filter::Not(inner) => write!(f, "not ({})", inner),
            Filter::Group(inner) => write!(f, "({})", inner),
        }
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attribute)?;
        if let Some(inner) = &self.value_filter {
            write!(f, "[{}]", inner)?;
        }
        for sub in &self.sub_attributes {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str("\"")
            }
            Literal::Num(n) => write!(f, "{}", n),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(attr: &str, op: CompareOp, value: Literal) -> Filter {
        Filter::Compare(AttrExpr {
            path: AttrPath::attribute(attr),
            op,
            value,
        })
    }

    #[test]
    fn display_renders_filter_syntax() {
        let f = Filter::And(
            Box::new(compare("userName", CompareOp::Eq, Literal::Str("john".into()))),
            Box::new(compare("active", CompareOp::Eq, Literal::Bool(true))),
        );
        assert_eq!(f.to_string(), "userName eq \"john\" and active eq true");
    }

    #[test]
    fn display_parenthesizes_or_under_and() {
        let f = Filter::And(
            Box::new(Filter::Or(
                Box::new(compare("a", CompareOp::Eq, Literal::Num(1.0))),
                Box::new(compare("b", CompareOp::Eq, Literal::Num(2.0))),
            )),
            Box::new(compare("c", CompareOp::Eq, Literal::Num(3.0))),
        );
        assert_eq!(f.to_string(), "(a eq 1 or b eq 2) and c eq 3");
    }

    #[test]
    fn display_escapes_string_literals() {
        let f = compare("title", CompareOp::Eq, Literal::Str("say \"hi\"\\now".into()));
        assert_eq!(f.to_string(), "title eq \"say \\\"hi\\\"\\\\now\"");
    }

    #[test]
    fn without_groups_strips_recursively() {
        let leaf = compare("a", CompareOp::Eq, Literal::Num(1.0));
        let grouped = Filter::Group(Box::new(Filter::Not(Box::new(Filter::Group(Box::new(
            leaf.clone(),
        ))))));
        assert_eq!(grouped.without_groups(), Filter::Not(Box::new(leaf)));
    }

    #[test]
    fn value_path_display() {
        let path = AttrPath {
            attribute: "emails".into(),
            value_filter: Some(Box::new(compare(
                "type",
                CompareOp::Eq,
                Literal::Str("work".into()),
            ))),
            sub_attributes: vec!["value".into()],
        };
        assert_eq!(path.to_string(), "emails[type eq \"work\"].value");
    }
}
