//! A `nom`-based parser for the XPath 1.0 expression language.
//!
//! The grammar is resolved by position rather than by a separate lexer: at an
//! operand position `*` is a wildcard and `div` is an element name, after an
//! operand they are operators.

use super::ast::*;
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0, satisfy},
    combinator::{map, map_res, not, opt, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};

// --- Main Public Parser ---

/// Parses a complete XPath expression. Trailing input that is not part of the
/// expression is a syntax error.
pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    let fail = |message: String| Err(XPathError::XPathParse(input.to_string(), message));
    if input.trim().is_empty() {
        return fail("Empty expression".to_string());
    }
    match expression(input) {
        Ok((rem, expr)) if rem.trim().is_empty() => Ok(expr),
        Ok((rem, _)) => fail(unexpected_input(rem)),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => fail(unexpected_input(e.input)),
        Err(nom::Err::Incomplete(_)) => fail("Unexpected end of expression".to_string()),
    }
}

fn unexpected_input(rem: &str) -> String {
    let rem = rem.trim();
    if rem.is_empty() {
        "Unexpected end of expression".to_string()
    } else {
        format!("Unexpected input at '{}'", rem)
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// An operator name such as `and` or `div`, which must not run into a following name.
fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(satisfy(is_name_char)))
}

fn build_binary_expr_parser<'a, F, G>(
    sub_expr_parser: F,
    op_parser: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, first) = sub_expr_parser.clone().parse(input)?;
        let (input, rest) =
            many0(pair(ws(op_parser.clone()), sub_expr_parser.clone())).parse(input)?;

        // Operators at one precedence level associate to the left.
        let expr = rest
            .into_iter()
            .fold(first, |left, (op, right)| Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        Ok((input, expr))
    }
}

fn descendant_or_self_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        node_test: NodeTest::NodeType(NodeTypeTest::Node),
        predicates: vec![],
    }
}

/// Appends steps that followed a `/` or `//` separator, expanding `//`.
fn push_steps(steps: &mut Vec<Step>, separated: Vec<(&str, Step)>) {
    for (sep, next_step) in separated {
        if sep == "//" {
            steps.push(descendant_or_self_step());
        }
        steps.push(next_step);
    }
}

// --- Expression Parsers (in order of precedence) ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::Or, keyword("or")).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::And, keyword("and")).parse(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::Equals, char('=')),
        value(BinaryOperator::NotEquals, tag("!=")),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    // Queries copied out of XML attributes may keep their escaped forms.
    alt((
        value(BinaryOperator::LessThanOrEqual, alt((tag("<="), tag("&lt;=")))),
        value(BinaryOperator::GreaterThanOrEqual, alt((tag(">="), tag("&gt;=")))),
        value(BinaryOperator::LessThan, alt((tag("<"), tag("&lt;")))),
        value(BinaryOperator::GreaterThan, alt((tag(">"), tag("&gt;")))),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::Plus, char('+')),
        value(BinaryOperator::Minus, char('-')),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::Multiply, char('*')),
        value(BinaryOperator::Divide, keyword("div")),
        value(BinaryOperator::Modulo, keyword("mod")),
    ))
    .parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::Union, char('|')).parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(equality_expr, and_op)(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(relational_expr, equality_op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(additive_expr, relational_op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    alt((
        map(preceded(ws(char('-')), unary_expr), |expr| {
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            }
        }),
        union_expr,
    ))
    .parse(input)
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(path_expr, union_op)(input)
}

/// A location path, or a filter expression optionally continued by a relative path.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    // Primary expressions go first so `position()` is read as a call rather than
    // as a step named `position` followed by leftover parentheses.
    ws(alt((
        filter_path,
        map(location_path, Expression::LocationPath),
    )))
    .parse(input)
}

fn filter_path(input: &str) -> IResult<&str, Expression> {
    let (i, primary) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    let filtered = if predicates.is_empty() {
        primary
    } else {
        Expression::Filter {
            primary: Box::new(primary),
            predicates,
        }
    };

    let (i, tail) = opt(pair(path_separator, relative_path)).parse(i)?;
    let Some((sep, rest)) = tail else {
        return Ok((i, filtered));
    };
    let mut steps = Vec::new();
    if sep == "//" {
        steps.push(descendant_or_self_step());
    }
    steps.extend(rest);
    Ok((
        i,
        Expression::LocationPath(LocationPath {
            start_point: Some(Box::new(filtered)),
            is_absolute: false,
            steps,
        }),
    ))
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    alt((
        variable_reference,
        map(number_literal, Expression::Number),
        map(string_literal, Expression::Literal),
        function_call,
        delimited(char('('), expression, ws(char(')'))),
    ))
    .parse(input)
}

// --- Literal Parsers ---

/// `Digits ('.' Digits?)? | '.' Digits`. Exponents, `inf` and `nan` are not XPath numbers.
fn number_literal(input: &str) -> IResult<&str, f64> {
    map_res(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        |s: &str| s.parse::<f64>(),
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), q_name), Expression::Variable).parse(input)
}

// --- Name and NodeTest Parsers ---

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_name_start), take_while(is_name_char))).parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(nc_name, opt(pair(char(':'), nc_name)))),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(
            delimited(
                pair(tag("processing-instruction"), ws(char('('))),
                opt(ws(string_literal)),
                char(')'),
            ),
            |target| NodeTest::NodeType(NodeTypeTest::ProcessingInstruction(target)),
        ),
        map(
            terminated(
                alt((
                    value(NodeTypeTest::Text, tag("text")),
                    value(NodeTypeTest::Comment, tag("comment")),
                    value(NodeTypeTest::Node, tag("node")),
                )),
                pair(ws(char('(')), char(')')),
            ),
            NodeTest::NodeType,
        ),
    ))
    .parse(input)
}

pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        node_type_test,
        value(NodeTest::Wildcard, char('*')),
        map(terminated(nc_name, tag(":*")), |prefix| {
            NodeTest::NamespaceWildcard(prefix.to_string())
        }),
        map(q_name, |name| NodeTest::from_qname(&name)),
    ))
    .parse(input)
}

// --- Path Parsers ---

fn axis_name(input: &str) -> IResult<&str, Axis> {
    // Longer names first: `ancestor` is a prefix of `ancestor-or-self`.
    alt((
        value(Axis::AncestorOrSelf, tag("ancestor-or-self")),
        value(Axis::Ancestor, tag("ancestor")),
        value(Axis::Attribute, tag("attribute")),
        value(Axis::Child, tag("child")),
        value(Axis::DescendantOrSelf, tag("descendant-or-self")),
        value(Axis::Descendant, tag("descendant")),
        value(Axis::FollowingSibling, tag("following-sibling")),
        value(Axis::Following, tag("following")),
        value(Axis::Parent, tag("parent")),
        value(Axis::PrecedingSibling, tag("preceding-sibling")),
        value(Axis::Preceding, tag("preceding")),
        value(Axis::SelfAxis, tag("self")),
    ))
    .parse(input)
}

fn axis_specifier(input: &str) -> IResult<&str, Axis> {
    alt((
        value(Axis::Attribute, terminated(char('@'), multispace0)),
        terminated(axis_name, ws(tag("::"))),
    ))
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn abbreviated_step(input: &str) -> IResult<&str, Step> {
    map(
        alt((value(Axis::Parent, tag("..")), value(Axis::SelfAxis, char('.')))),
        |axis| Step {
            axis,
            node_test: NodeTest::NodeType(NodeTypeTest::Node),
            predicates: vec![],
        },
    )
    .parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    if let Ok(parsed) = abbreviated_step(input) {
        return Ok(parsed);
    }
    let (i, axis) = opt(axis_specifier).parse(input)?;
    let (i, node_test) = node_test(i)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            axis: axis.unwrap_or(Axis::Child),
            node_test,
            predicates,
        },
    ))
}

fn path_separator(input: &str) -> IResult<&str, &str> {
    ws(alt((tag("//"), tag("/")))).parse(input)
}

fn relative_path(input: &str) -> IResult<&str, Vec<Step>> {
    let (i, first) = step(input)?;
    let (i, rest) = many0(pair(path_separator, step)).parse(i)?;
    let mut steps = vec![first];
    push_steps(&mut steps, rest);
    Ok((i, steps))
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    alt((
        map(preceded(tag("//"), relative_path), |rest| {
            let mut steps = vec![descendant_or_self_step()];
            steps.extend(rest);
            LocationPath {
                start_point: None,
                is_absolute: true,
                steps,
            }
        }),
        // A lone `/` selects the root.
        map(
            preceded(char('/'), opt(preceded(multispace0, relative_path))),
            |steps| LocationPath {
                start_point: None,
                is_absolute: true,
                steps: steps.unwrap_or_default(),
            },
        ),
        map(relative_path, |steps| LocationPath {
            start_point: None,
            is_absolute: false,
            steps,
        }),
    ))
    .parse(input)
}

// --- Function Call Parser ---

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (i, name) = q_name(input)?;

    // Node-type tests like text() look like calls but belong to the step parser.
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (i, args) = delimited(
        ws(char('(')),
        separated_list0(char(','), expression),
        char(')'),
    )
    .parse(i)?;

    Ok((i, Expression::FunctionCall { name, args }))
}
