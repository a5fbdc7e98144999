//! Relation lines in diagram source.
//!
//! A relation line has the shape `endpoint arrow endpoint [: label]`, e.g.
//! `"Web App" --> [Database] : reads`. Endpoints are quoted, bracketed,
//! parenthesized or bare words. Arrows are a shaft of `-` or `.` runs,
//! optionally carrying a `[style]` or direction word (`-up->`, `-[#red]->`),
//! with a head on at least one side. A head only on the left (`A <-- B`)
//! reverses the edge.

use winnow::{
    Parser as _,
    ascii::{space0, space1},
    combinator::{alt, delimited, opt, peek, terminated},
    error::ModalResult,
    token::{literal, one_of, take_till, take_while},
};

/// One parsed relation, already oriented source to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RelationLine<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub label: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Parses one source line. Returns `None` when the line is not a relation.
pub(crate) fn parse_relation(line: &str) -> Option<RelationLine<'_>> {
    let mut input = line.trim();
    let (left, direction, right) = relation(&mut input).ok()?;
    if left.is_empty() || right.is_empty() {
        return None;
    }

    let (source, target) = match direction {
        Direction::Forward => (left, right),
        Direction::Backward => (right, left),
    };
    Some(RelationLine {
        source,
        target,
        label: label_of(input),
    })
}

/// Text after the first `:` of the remainder; activation marks such as `++` fall before it.
fn label_of(rest: &str) -> &str {
    rest.split_once(':')
        .map(|(_, label)| label.trim().trim_matches('"').trim())
        .unwrap_or_default()
}

fn relation<'a>(input: &mut &'a str) -> ModalResult<(&'a str, Direction, &'a str)> {
    (endpoint, space0, arrow, space0, endpoint)
        .map(|(source, _, direction, _, target)| (source, direction, target))
        .parse_next(input)
}

fn endpoint<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((quoted, bracketed, parenthesized, bare))
        .map(|name: &'a str| name.trim())
        .parse_next(input)
}

fn quoted<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    delimited('"', take_till(0.., |c: char| c == '"' || c == '\n'), '"').parse_next(input)
}

fn bracketed<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    delimited('[', take_till(1.., |c: char| c == ']' || c == '\n'), ']').parse_next(input)
}

fn parenthesized<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    delimited('(', take_till(1.., |c: char| c == ')' || c == '\n'), ')').parse_next(input)
}

fn bare<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

fn is_shaft(c: char) -> bool {
    c == '-' || c == '.'
}

fn arrow(input: &mut &str) -> ModalResult<Direction> {
    (opt(left_head), shaft, opt(right_head))
        .verify_map(|(backward, (), forward)| match (backward, forward) {
            (_, Some(_)) => Some(Direction::Forward),
            (Some(_), None) => Some(Direction::Backward),
            (None, None) => None,
        })
        .parse_next(input)
}

fn left_head<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((literal("<<"), literal("<|"), literal("<"))).parse_next(input)
}

/// Forward heads, including the lost/circle decorations `->x` and `->o`.
fn right_head<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    terminated(
        alt((
            literal(">>"),
            literal("|>"),
            literal(">"),
            literal("\\\\"),
            literal("\\"),
            literal("//"),
            literal("/"),
        )),
        opt(terminated(one_of(['x', 'o']), peek(space1))),
    )
    .parse_next(input)
}

fn shaft(input: &mut &str) -> ModalResult<()> {
    (
        take_while(1.., is_shaft),
        opt((arrow_style, take_while(0.., is_shaft))),
    )
        .void()
        .parse_next(input)
}

/// `[#color,dashed]` or a direction word embedded in the shaft.
fn arrow_style<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        delimited('[', take_till(0.., |c: char| c == ']' || c == '\n'), ']'),
        terminated(
            alt((
                literal("left"),
                literal("right"),
                literal("down"),
                literal("up"),
                literal("le"),
                literal("ri"),
                literal("do"),
                literal("l"),
                literal("r"),
                literal("d"),
                literal("u"),
            )),
            peek(one_of(|c: char| is_shaft(c) || c == '>')),
        ),
    ))
    .parse_next(input)
}
