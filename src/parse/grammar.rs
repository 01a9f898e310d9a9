use winnow::ascii::{digit1, till_line_ending};
use winnow::combinator::{alt, cut_err, delimited, fail, opt, preceded, repeat, separated};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};
use winnow::Stateful;

use crate::{
    AggregateExpr, AggregateOp, AtModifier, BinaryExpr, BinaryOp, Call, Duration, Expr,
    GroupModifier, Grouping, MatchOp, Matcher, MatchingAxis, MatrixSelector, SubqueryExpr,
    UnaryOp, VectorMatching, VectorSelector,
};

/// Sub-expressions may nest at most this deep.
const MAX_NESTING: usize = 64;

/// Current sub-expression nesting, carried alongside the input.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Depth(usize);

pub(crate) type Input<'i> = Stateful<&'i str, Depth>;

type ExprParser = for<'i> fn(&mut Input<'i>) -> ModalResult<Expr>;
type OpParser = for<'i> fn(&mut Input<'i>) -> ModalResult<BinaryOp>;

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

/// Fail without backtracking, reporting what was expected at this point.
fn reject<O>(input: &mut Input<'_>, what: &'static str) -> ModalResult<O> {
    cut_err(fail.context(expected(what))).parse_next(input)
}

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut Input<'_>) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

// -- Identifiers ------------------------------------------------------------

fn metric_ident<'i>(input: &mut Input<'i>) -> ModalResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_' || c == ':'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == ':'),
    )
        .take()
        .parse_next(input)
}

fn label_name<'i>(input: &mut Input<'i>) -> ModalResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// A whole-word, case-insensitive keyword.
fn keyword<'i>(kw: &'static str) -> impl FnMut(&mut Input<'i>) -> ModalResult<()> {
    move |input: &mut Input<'i>| {
        metric_ident
            .verify(|word: &str| word.eq_ignore_ascii_case(kw))
            .void()
            .parse_next(input)
    }
}

fn label_list(input: &mut Input<'_>) -> ModalResult<Vec<String>> {
    (ws, '(').parse_next(input)?;
    let labels: Vec<String> = separated(
        0..,
        preceded(ws, label_name).map(|s: &str| s.to_owned()),
        (ws, ','),
    )
    .parse_next(input)?;
    (ws, opt(','), ws, cut_err(')').context(expected("')' closing label list")))
        .parse_next(input)?;
    Ok(labels)
}

// -- Literals ---------------------------------------------------------------

fn next_char(input: &mut Input<'_>) -> ModalResult<char> {
    any.parse_next(input)
}

fn string_literal(input: &mut Input<'_>) -> ModalResult<String> {
    let quote = one_of(['"', '\'', '`']).parse_next(input)?;
    let mut bytes = Vec::new();
    loop {
        let ch = cut_err(next_char)
            .context(expected("closing quote"))
            .parse_next(input)?;
        match ch {
            c if c == quote => break,
            '\\' if quote != '`' => escape(quote, &mut bytes, input)?,
            c => push_char(&mut bytes, c),
        }
    }
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(_) => reject(input, "escapes forming valid UTF-8"),
    }
}

fn push_char(bytes: &mut Vec<u8>, c: char) {
    bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes());
}

fn hex_digits<'i>(count: usize) -> impl FnMut(&mut Input<'i>) -> ModalResult<&'i str> {
    move |input: &mut Input<'i>| take_while(count, |c: char| c.is_ascii_hexdigit()).parse_next(input)
}

/// Decode the escape sequence following a backslash.
///
/// `\xNN` and octal `\NNN` produce raw bytes, so multi-byte UTF-8 may be
/// spelled out byte by byte; the finished string must still be valid UTF-8.
fn escape(quote: char, bytes: &mut Vec<u8>, input: &mut Input<'_>) -> ModalResult<()> {
    let esc = cut_err(next_char)
        .context(expected("escape sequence"))
        .parse_next(input)?;
    let c = match esc {
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0c}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{0b}',
        '\\' => '\\',
        c if c == quote => c,
        'x' => {
            let byte = cut_err(hex_digits(2).try_map(|s: &str| u8::from_str_radix(s, 16)))
                .context(expected("two hex digits after \\x"))
                .parse_next(input)?;
            bytes.push(byte);
            return Ok(());
        }
        'u' | 'U' => {
            let width = if esc == 'u' { 4 } else { 8 };
            let c = cut_err(hex_digits(width).verify_map(|s: &str| {
                u32::from_str_radix(s, 16).ok().and_then(char::from_u32)
            }))
            .context(expected("unicode code point"))
            .parse_next(input)?;
            push_char(bytes, c);
            return Ok(());
        }
        '0'..='7' => {
            let rest = cut_err(take_while(2, |c: char| c.is_digit(8)))
                .context(expected("three octal digits"))
                .parse_next(input)?;
            let value = std::iter::once(esc)
                .chain(rest.chars())
                .filter_map(|c| c.to_digit(8))
                .fold(0, |acc, d| acc * 8 + d);
            let Ok(byte) = u8::try_from(value) else {
                return reject(input, "octal escape at most \\377");
            };
            bytes.push(byte);
            return Ok(());
        }
        _ => return reject(input, "known escape sequence"),
    };
    push_char(bytes, c);
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn hex_literal(input: &mut Input<'_>) -> ModalResult<f64> {
    preceded(
        alt(("0x", "0X")),
        take_while(1.., |c: char| c.is_ascii_hexdigit()),
    )
    .try_map(|digits: &str| u64::from_str_radix(digits, 16))
    .map(|v| v as f64)
    .parse_next(input)
}

fn decimal_literal(input: &mut Input<'_>) -> ModalResult<f64> {
    (
        take_while(0.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(0.., |c: char| c.is_ascii_digit()))),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .verify(|s: &str| {
            s.split(['e', 'E'])
                .next()
                .is_some_and(|mantissa| mantissa.bytes().any(|b| b.is_ascii_digit()))
        })
        .try_map(|s: &str| s.parse::<f64>())
        .parse_next(input)
}

fn number_literal(input: &mut Input<'_>) -> ModalResult<f64> {
    alt((hex_literal, decimal_literal)).parse_next(input)
}

fn duration_unit(input: &mut Input<'_>) -> ModalResult<i64> {
    alt(("ms", "s", "m", "h", "d", "w", "y"))
        .verify_map(Duration::unit_millis)
        .parse_next(input)
}

fn duration(input: &mut Input<'_>) -> ModalResult<Duration> {
    let parts: Vec<i64> = repeat(
        1..,
        (digit1.try_map(|s: &str| s.parse::<i64>()), duration_unit)
            .verify_map(|(count, unit): (i64, i64)| count.checked_mul(unit)),
    )
    .parse_next(input)?;
    match parts.into_iter().try_fold(0i64, i64::checked_add) {
        Some(total) => Ok(Duration::from_millis(total)),
        None => reject(input, "duration within range"),
    }
}

fn signed_duration(input: &mut Input<'_>) -> ModalResult<Duration> {
    (opt('-'), duration)
        .map(|(neg, d)| if neg.is_some() { -d } else { d })
        .parse_next(input)
}

// -- Selectors --------------------------------------------------------------

fn match_op(input: &mut Input<'_>) -> ModalResult<MatchOp> {
    alt((
        "=~".value(MatchOp::Regex),
        "!~".value(MatchOp::NotRegex),
        "!=".value(MatchOp::NotEqual),
        "=".value(MatchOp::Equal),
    ))
    .parse_next(input)
}

fn label_matcher(input: &mut Input<'_>) -> ModalResult<Matcher> {
    ws.parse_next(input)?;
    let name = label_name.parse_next(input)?;
    ws.parse_next(input)?;
    let op = cut_err(match_op)
        .context(expected("label match operator"))
        .parse_next(input)?;
    ws.parse_next(input)?;
    let value = cut_err(string_literal)
        .context(expected("quoted label value"))
        .parse_next(input)?;
    Ok(Matcher::new(name, op, value))
}

fn label_matchers(input: &mut Input<'_>) -> ModalResult<Vec<Matcher>> {
    '{'.parse_next(input)?;
    let matchers: Vec<Matcher> = separated(0.., label_matcher, (ws, ',')).parse_next(input)?;
    (ws, opt(','), ws, cut_err('}').context(expected("'}' closing matchers")))
        .parse_next(input)?;
    Ok(matchers)
}

fn brace_selector(input: &mut Input<'_>) -> ModalResult<Expr> {
    label_matchers
        .map(|matchers| {
            Expr::Vector(VectorSelector {
                matchers,
                ..VectorSelector::default()
            })
        })
        .parse_next(input)
}

// -- Calls & aggregations ---------------------------------------------------

fn call(func: &str, input: &mut Input<'_>) -> ModalResult<Expr> {
    '('.parse_next(input)?;
    let args: Vec<Expr> = separated(0.., expr, (ws, ',')).parse_next(input)?;
    (ws, cut_err(')').context(expected("')' closing call"))).parse_next(input)?;
    Ok(Expr::Call(Call {
        func: func.to_owned(),
        args,
    }))
}

fn grouping(input: &mut Input<'_>) -> ModalResult<Grouping> {
    let by = alt((keyword("by").value(true), keyword("without").value(false))).parse_next(input)?;
    let labels = cut_err(label_list).parse_next(input)?;
    Ok(if by {
        Grouping::By(labels)
    } else {
        Grouping::Without(labels)
    })
}

fn aggregate(op: AggregateOp, input: &mut Input<'_>) -> ModalResult<Expr> {
    let leading = opt(preceded(ws, grouping)).parse_next(input)?;
    ws.parse_next(input)?;
    cut_err('(')
        .context(expected("'(' after aggregation"))
        .parse_next(input)?;

    let arity = if op.takes_param() { 2 } else { 1 };
    let mut args: Vec<Expr> = cut_err(
        separated(1.., expr, (ws, ','))
            .verify(move |args: &Vec<Expr>| args.len() == arity)
            .context(expected(if arity == 2 {
                "parameter and expression"
            } else {
                "single expression"
            })),
    )
    .parse_next(input)?;
    (ws, cut_err(')').context(expected("')' closing aggregation"))).parse_next(input)?;

    let trailing = if leading.is_none() {
        opt(preceded(ws, grouping)).parse_next(input)?
    } else {
        None
    };

    let Some(inner) = args.pop() else {
        return reject(input, "aggregation argument");
    };
    Ok(Expr::Aggregate(AggregateExpr {
        op,
        param: args.pop().map(Box::new),
        expr: Box::new(inner),
        grouping: leading.or(trailing),
    }))
}

/// Aggregation, function call, `Inf`/`NaN`, or a named vector selector.
fn ident_led(input: &mut Input<'_>) -> ModalResult<Expr> {
    let name = metric_ident.parse_next(input)?;
    if let Some(op) = AggregateOp::from_name(name) {
        return aggregate(op, input);
    }

    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if input.starts_with('(') {
        return call(name, input);
    }
    if input.starts_with('{') {
        let matchers = label_matchers.parse_next(input)?;
        return Ok(Expr::Vector(VectorSelector {
            name: Some(name.to_owned()),
            matchers,
            ..VectorSelector::default()
        }));
    }
    input.reset(&checkpoint);

    if name.eq_ignore_ascii_case("inf") {
        return Ok(Expr::Number(f64::INFINITY));
    }
    if name.eq_ignore_ascii_case("nan") {
        return Ok(Expr::Number(f64::NAN));
    }
    Ok(Expr::Vector(VectorSelector::new(name)))
}

fn paren_expr(input: &mut Input<'_>) -> ModalResult<Expr> {
    delimited(
        '(',
        expr,
        (ws, cut_err(')').context(expected("')' closing group"))),
    )
    .map(|inner| Expr::Paren(Box::new(inner)))
    .parse_next(input)
}

fn primary(input: &mut Input<'_>) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        paren_expr,
        string_literal.map(Expr::String),
        number_literal.map(Expr::Number),
        brace_selector,
        ident_led,
    ))
    .context(expected("expression"))
    .parse_next(input)
}

// -- Postfix: ranges, subqueries, offset, @ ---------------------------------

fn range_suffix(target: Expr, input: &mut Input<'_>) -> ModalResult<Expr> {
    '['.parse_next(input)?;
    ws.parse_next(input)?;
    let range = cut_err(duration)
        .context(expected("range duration"))
        .parse_next(input)?;
    ws.parse_next(input)?;
    let step = opt(preceded((':', ws), opt(duration))).parse_next(input)?;
    (ws, cut_err(']').context(expected("']' closing range"))).parse_next(input)?;

    match (target, step) {
        (Expr::Vector(vector), None) if vector.offset.is_none() && vector.at.is_none() => {
            Ok(Expr::Matrix(MatrixSelector { vector, range }))
        }
        (target, Some(step)) => Ok(Expr::Subquery(SubqueryExpr {
            expr: Box::new(target),
            range,
            step,
            offset: None,
            at: None,
        })),
        (_, None) => reject(input, "range on a selector without offset or @"),
    }
}

fn at_value(input: &mut Input<'_>) -> ModalResult<AtModifier> {
    ws.parse_next(input)?;
    alt((
        (keyword("start"), ws, '(', ws, ')').value(AtModifier::Start),
        (keyword("end"), ws, '(', ws, ')').value(AtModifier::End),
        (opt('-'), number_literal)
            .map(|(neg, v)| AtModifier::Timestamp(if neg.is_some() { -v } else { v })),
    ))
    .parse_next(input)
}

fn with_offset(target: Expr, offset: Duration, input: &mut Input<'_>) -> ModalResult<Expr> {
    let slot = match target {
        Expr::Vector(mut v) => {
            if v.offset.replace(offset).is_none() {
                return Ok(Expr::Vector(v));
            }
            "single offset modifier"
        }
        Expr::Matrix(mut m) => {
            if m.vector.offset.replace(offset).is_none() {
                return Ok(Expr::Matrix(m));
            }
            "single offset modifier"
        }
        Expr::Subquery(mut sq) => {
            if sq.offset.replace(offset).is_none() {
                return Ok(Expr::Subquery(sq));
            }
            "single offset modifier"
        }
        _ => "offset on a selector or subquery",
    };
    reject(input, slot)
}

fn with_at(target: Expr, at: AtModifier, input: &mut Input<'_>) -> ModalResult<Expr> {
    let slot = match target {
        Expr::Vector(mut v) => {
            if v.at.replace(at).is_none() {
                return Ok(Expr::Vector(v));
            }
            "single @ modifier"
        }
        Expr::Matrix(mut m) => {
            if m.vector.at.replace(at).is_none() {
                return Ok(Expr::Matrix(m));
            }
            "single @ modifier"
        }
        Expr::Subquery(mut sq) => {
            if sq.at.replace(at).is_none() {
                return Ok(Expr::Subquery(sq));
            }
            "single @ modifier"
        }
        _ => "@ on a selector or subquery",
    };
    reject(input, slot)
}

fn postfix(input: &mut Input<'_>) -> ModalResult<Expr> {
    let mut target = primary(input)?;
    loop {
        let checkpoint = input.checkpoint();
        ws.parse_next(input)?;
        if input.starts_with('[') {
            target = range_suffix(target, input)?;
        } else if input.starts_with('@') {
            '@'.parse_next(input)?;
            let at = cut_err(at_value)
                .context(expected("@ timestamp, start() or end()"))
                .parse_next(input)?;
            target = with_at(target, at, input)?;
        } else if opt(keyword("offset")).parse_next(input)?.is_some() {
            ws.parse_next(input)?;
            let offset = cut_err(signed_duration)
                .context(expected("offset duration"))
                .parse_next(input)?;
            target = with_offset(target, offset, input)?;
        } else {
            input.reset(&checkpoint);
            return Ok(target);
        }
    }
}

// -- Operators (precedence: or < and/unless < comparison < +- < */% < ^) ----

struct Modifiers {
    return_bool: bool,
    matching: Option<VectorMatching>,
}

impl Modifiers {
    fn apply(self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(BinaryExpr {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            return_bool: self.return_bool,
            matching: self.matching,
        })
    }
}

fn group_modifier(input: &mut Input<'_>) -> ModalResult<GroupModifier> {
    alt((
        preceded(keyword("group_left"), opt(label_list))
            .map(|labels| GroupModifier::Left(labels.unwrap_or_default())),
        preceded(keyword("group_right"), opt(label_list))
            .map(|labels| GroupModifier::Right(labels.unwrap_or_default())),
    ))
    .parse_next(input)
}

fn bin_modifiers(op: BinaryOp, input: &mut Input<'_>) -> ModalResult<Modifiers> {
    let return_bool = opt(preceded(ws, keyword("bool")))
        .parse_next(input)?
        .is_some();
    if return_bool && !op.is_comparison() {
        return reject(input, "comparison operator before 'bool'");
    }

    let axis = opt(preceded(
        ws,
        alt((
            preceded(keyword("on"), cut_err(label_list)).map(MatchingAxis::On),
            preceded(keyword("ignoring"), cut_err(label_list)).map(MatchingAxis::Ignoring),
        )),
    ))
    .parse_next(input)?;

    let matching = match axis {
        Some(axis) => {
            let group = opt(preceded(ws, group_modifier)).parse_next(input)?;
            if group.is_some() && op.is_set_operator() {
                return reject(input, "no group modifier on set operators");
            }
            Some(VectorMatching { axis, group })
        }
        None => None,
    };

    Ok(Modifiers {
        return_bool,
        matching,
    })
}

fn left_assoc(input: &mut Input<'_>, operand: ExprParser, operator: OpParser) -> ModalResult<Expr> {
    let mut lhs = operand(input)?;
    loop {
        let checkpoint = input.checkpoint();
        ws.parse_next(input)?;
        let Ok(op) = operator(input) else {
            input.reset(&checkpoint);
            return Ok(lhs);
        };
        let modifiers = bin_modifiers(op, input)?;
        let rhs = cut_err(operand).parse_next(input)?;
        lhs = modifiers.apply(op, lhs, rhs);
    }
}

fn or_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    keyword("or").value(BinaryOp::Or).parse_next(input)
}

fn and_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    alt((
        keyword("and").value(BinaryOp::And),
        keyword("unless").value(BinaryOp::Unless),
    ))
    .parse_next(input)
}

fn cmp_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    alt((
        "==".value(BinaryOp::Eq),
        "!=".value(BinaryOp::Neq),
        ">=".value(BinaryOp::Gte),
        "<=".value(BinaryOp::Lte),
        ">".value(BinaryOp::Gt),
        "<".value(BinaryOp::Lt),
    ))
    .parse_next(input)
}

fn add_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    alt(('+'.value(BinaryOp::Add), '-'.value(BinaryOp::Sub))).parse_next(input)
}

fn mul_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    alt((
        '*'.value(BinaryOp::Mul),
        '/'.value(BinaryOp::Div),
        '%'.value(BinaryOp::Mod),
        keyword("atan2").value(BinaryOp::Atan2),
    ))
    .parse_next(input)
}

/// `^` is right-associative and binds tighter than unary minus.
fn pow_expr(input: &mut Input<'_>) -> ModalResult<Expr> {
    let base = postfix(input)?;
    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if opt('^').parse_next(input)?.is_none() {
        input.reset(&checkpoint);
        return Ok(base);
    }
    let modifiers = bin_modifiers(BinaryOp::Pow, input)?;
    let exponent = cut_err(unary).parse_next(input)?;
    Ok(modifiers.apply(BinaryOp::Pow, base, exponent))
}

/// Every recursive path through the grammar passes here, so this is where
/// nesting is bounded.
fn unary(input: &mut Input<'_>) -> ModalResult<Expr> {
    if input.state.0 >= MAX_NESTING {
        return reject(input, "at most 64 nested sub-expressions");
    }
    input.state.0 += 1;
    let parsed = signed(input);
    input.state.0 -= 1;
    parsed
}

fn signed(input: &mut Input<'_>) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    match opt(one_of(['-', '+'])).parse_next(input)? {
        Some(sign) => {
            let inner = cut_err(unary).parse_next(input)?;
            let op = if sign == '-' {
                UnaryOp::Neg
            } else {
                UnaryOp::Pos
            };
            Ok(Expr::Unary(op, Box::new(inner)))
        }
        None => pow_expr(input),
    }
}

fn mul_expr(input: &mut Input<'_>) -> ModalResult<Expr> {
    left_assoc(input, unary, mul_op)
}

fn add_expr(input: &mut Input<'_>) -> ModalResult<Expr> {
    left_assoc(input, mul_expr, add_op)
}

fn cmp_expr(input: &mut Input<'_>) -> ModalResult<Expr> {
    left_assoc(input, add_expr, cmp_op)
}

fn and_expr(input: &mut Input<'_>) -> ModalResult<Expr> {
    left_assoc(input, cmp_expr, and_op)
}

fn or_expr(input: &mut Input<'_>) -> ModalResult<Expr> {
    left_assoc(input, and_expr, or_op)
}

fn expr(input: &mut Input<'_>) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    or_expr(input)
}

// -- Top-level parser -------------------------------------------------------

pub(crate) fn query(input: &mut Input<'_>) -> ModalResult<Expr> {
    let parsed = expr(input)?;
    ws.parse_next(input)?;
    Ok(parsed)
}
