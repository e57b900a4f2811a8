//! Filter string parser.
//!
//! Recursive-descent over nom combinators. Precedence is encoded in the
//! grammar levels: `or_level` > `and_level` > `primary`, with `not` and
//! parentheses handled in `primary`. Keywords (`and`, `or`, `not`, `pr`,
//! the comparison operators, `true`, `false`, `null`) are case-insensitive
//! and recognized by maximal-munch: a keyword followed by another name
//! character is an identifier, not a keyword.
//!
//! Value paths (`emails[type eq "work"].value`) recurse straight back into
//! the expression grammar, so brackets nest to any depth.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, value, verify},
    multi::{fold_many0, many0},
    number::complete::double,
    sequence::{delimited, preceded, terminated},
    IResult,
};

use super::ast::{AttrExpr, AttrPath, CompareOp, Filter, Literal};
use crate::error::{ScimError, ScimResult};

/// Parse a complete filter string.
///
/// The empty (or all-whitespace) string parses to [`Filter::Empty`]; any
/// other deviation from the grammar is an `InvalidFilter` error.
pub fn parse_filter(input: &str) -> ScimResult<Filter> {
    if input.trim().is_empty() {
        return Ok(Filter::Empty);
    }
    match all_consuming(terminated(or_level, multispace0))(input) {
        Ok((_, filter)) => Ok(filter),
        Err(err) => Err(ScimError::InvalidFilter(describe_error(input, err))),
    }
}

/// Entry point for the path parser: a filter expression without the
/// trailing end-of-input check, used for bracketed value filters.
pub(crate) fn filter_expression(input: &str) -> IResult<&str, Filter> {
    or_level(input)
}

fn describe_error(input: &str, err: nom::Err<nom::error::Error<&str>>) -> String {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let consumed = input.len() - e.input.len();
            format!(
                "unexpected input at offset {}: {:?}",
                consumed,
                truncate(e.input)
            )
        }
        nom::Err::Incomplete(_) => format!("incomplete filter: {:?}", truncate(input)),
    }
}

fn truncate(s: &str) -> &str {
    let end = s
        .char_indices()
        .nth(32)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[..end]
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '$')
}

/// A word of name characters, accepted only if it spells the given
/// keyword (case-insensitively). Maximal munch gives the boundary rule:
/// `android` never matches `and`.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    verify(take_while1(is_name_char), move |word: &str| {
        word.eq_ignore_ascii_case(kw)
    })
}

fn or_level(input: &str) -> IResult<&str, Filter> {
    let (input, first) = and_level(input)?;
    fold_many0(
        preceded(preceded(multispace0, keyword("or")), and_level),
        move || first.clone(),
        |acc, rhs| Filter::Or(Box::new(acc), Box::new(rhs)),
    )(input)
}

fn and_level(input: &str) -> IResult<&str, Filter> {
    let (input, first) = primary(input)?;
    fold_many0(
        preceded(preceded(multispace0, keyword("and")), primary),
        move || first.clone(),
        |acc, rhs| Filter::And(Box::new(acc), Box::new(rhs)),
    )(input)
}

fn primary(input: &str) -> IResult<&str, Filter> {
    preceded(multispace0, alt((not_expr, group, attr_expr)))(input)
}

fn not_expr(input: &str) -> IResult<&str, Filter> {
    map(preceded(keyword("not"), primary), |inner| {
        Filter::Not(Box::new(inner))
    })(input)
}

fn group(input: &str) -> IResult<&str, Filter> {
    map(
        delimited(
            char('('),
            terminated(or_level, multispace0),
            char(')'),
        ),
        |inner| Filter::Group(Box::new(inner)),
    )(input)
}

fn attr_expr(input: &str) -> IResult<&str, Filter> {
    let (input, path) = attr_path(input)?;
    let (input, _) = multispace0(input)?;
    if let Ok((rest, _)) = keyword("pr")(input) {
        return Ok((rest, Filter::Present(path)));
    }
    let (input, op) = compare_op(input)?;
    let (input, literal) = preceded(multispace0, literal)(input)?;
    Ok((input, Filter::Compare(AttrExpr { path, op, value: literal })))
}

pub(crate) fn attr_path(input: &str) -> IResult<&str, AttrPath> {
    let (input, attribute) = attr_name(input)?;
    let (input, value_filter) = opt(delimited(
        char('['),
        terminated(or_level, multispace0),
        char(']'),
    ))(input)?;
    let (input, sub_attributes) = many0(preceded(char('.'), attr_name))(input)?;
    Ok((
        input,
        AttrPath {
            attribute: attribute.to_string(),
            value_filter: value_filter.map(Box::new),
            sub_attributes: sub_attributes.into_iter().map(String::from).collect(),
        },
    ))
}

fn attr_name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char)(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    let (rest, word) = take_while1(is_name_char)(input)?;
    match CompareOp::from_keyword(word) {
        Some(op) => Ok((rest, op)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(string_literal, Literal::Str),
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("false")),
        value(Literal::Null, keyword("null")),
        map(double, Literal::Num),
    ))(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                take_while1(|c| c != '"' && c != '\\'),
                '\\',
                alt((
                    value('"', char('"')),
                    value('\\', char('\\')),
                    value('/', char('/')),
                    value('\n', char('n')),
                    value('\t', char('t')),
                    value('\r', char('r')),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Filter {
        parse_filter(input).expect("filter should parse")
    }

    #[test]
    fn parses_simple_comparison() {
        let f = parse("userName eq \"john\"");
        assert_eq!(
            f,
            Filter::Compare(AttrExpr {
                path: AttrPath::attribute("userName"),
                op: CompareOp::Eq,
                value: Literal::Str("john".into()),
            })
        );
    }

    #[test]
    fn parses_conjunction_with_boolean() {
        let f = parse("userName eq \"john\" and active eq true");
        match f {
            Filter::And(l, r) => {
                assert!(matches!(*l, Filter::Compare(ref e) if e.path.attribute == "userName"));
                assert!(matches!(
                    *r,
                    Filter::Compare(ref e)
                        if e.path.attribute == "active" && e.value == Literal::Bool(true)
                ));
            }
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let f = parse("a pr or b pr and c pr");
        match f {
            Filter::Or(l, r) => {
                assert!(matches!(*l, Filter::Present(_)));
                assert!(matches!(*r, Filter::And(..)));
            }
            other => panic!("expected Or at the root, got {:?}", other),
        }
    }

    #[test]
    fn not_binds_tighter_than_and() {
        let f = parse("not (a pr) and b pr");
        assert!(matches!(f, Filter::And(l, _) if matches!(*l, Filter::Not(_))));
    }

    #[test]
    fn logical_chains_are_left_associative() {
        let f = parse("a pr and b pr and c pr");
        match f {
            Filter::And(l, r) => {
                assert!(matches!(*l, Filter::And(..)));
                assert!(matches!(*r, Filter::Present(_)));
            }
            other => panic!("expected left-nested And, got {:?}", other),
        }
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let f = parse("a pr AND b PR Or NOT (c Pr)");
        assert!(matches!(f, Filter::Or(..)));
    }

    #[test]
    fn keyword_prefixes_are_identifiers() {
        // "prefix", "andrew", "nota" all start with keywords
        let f = parse("prefix eq 1");
        assert!(matches!(f, Filter::Compare(ref e) if e.path.attribute == "prefix"));
        let f = parse("nota pr");
        assert!(matches!(f, Filter::Present(ref p) if p.attribute == "nota"));
    }

    #[test]
    fn parses_value_path_with_sub_attribute() {
        let f = parse("emails[type eq \"work\"].value ew \"@example.com\"");
        match f {
            Filter::Compare(expr) => {
                assert_eq!(expr.path.attribute, "emails");
                assert_eq!(expr.path.sub_attributes, vec!["value".to_string()]);
                assert_eq!(expr.op, CompareOp::Ew);
                let inner = expr.path.value_filter.expect("inner filter");
                assert!(matches!(*inner, Filter::Compare(ref e) if e.path.attribute == "type"));
            }
            other => panic!("expected Compare, got {:?}", other),
        }
    }

    #[test]
    fn brackets_nest() {
        let f = parse("groups[members[value eq \"u1\"] pr] pr");
        assert!(matches!(f, Filter::Present(ref p) if p.value_filter.is_some()));
    }

    #[test]
    fn parses_number_and_null_literals() {
        assert!(matches!(
            parse("height gt 1.75"),
            Filter::Compare(ref e) if e.value == Literal::Num(1.75)
        ));
        assert!(matches!(
            parse("manager ne null"),
            Filter::Compare(ref e) if e.value == Literal::Null
        ));
        assert!(matches!(
            parse("score ge -3"),
            Filter::Compare(ref e) if e.value == Literal::Num(-3.0)
        ));
    }

    #[test]
    fn parses_string_escapes() {
        let f = parse(r#"title eq "a \"quoted\" name\n""#);
        assert!(matches!(
            f,
            Filter::Compare(ref e) if e.value == Literal::Str("a \"quoted\" name\n".into())
        ));
    }

    #[test]
    fn empty_string_is_the_empty_filter() {
        assert_eq!(parse_filter("").unwrap(), Filter::Empty);
        assert_eq!(parse_filter("   ").unwrap(), Filter::Empty);
    }

    #[test]
    fn urn_prefixed_attribute_names() {
        let f = parse("urn:ietf:params:scim:schemas:core:userName sw \"j\"");
        assert!(matches!(
            f,
            Filter::Compare(ref e)
                if e.path.attribute == "urn:ietf:params:scim:schemas:core:userName"
        ));
    }

    #[test]
    fn rejects_malformed_filters() {
        for bad in [
            "userName eq",
            "eq \"john\"",
            "userName xx \"john\"",
            "(userName eq \"j\"",
            "userName eq \"j\" and",
            "emails[type eq \"work\" pr",
            "userName eq2",
            "a pr b pr",
            "not",
            "x-custom eq 1",
        ] {
            let err = parse_filter(bad).unwrap_err();
            assert!(
                matches!(err, ScimError::InvalidFilter(_)),
                "{:?} should be InvalidFilter, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn group_wrapper_survives_parsing() {
        let f = parse("(a pr)");
        assert!(matches!(f, Filter::Group(_)));
    }
}
