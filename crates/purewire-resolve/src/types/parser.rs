//! Type expression parser built on `nom`.
//!
//! Grammar:
//!
//! ```text
//! type    := base suffix*
//! base    := tuple | named
//! tuple   := '(' type (',' type)+ ')'
//! named   := ident ('.' ident)* ('<' type (',' type)* '>')?
//! suffix  := '[' ']' | '?'
//! ```
//!
//! Whitespace is allowed between tokens. The nullable suffix `?` is accepted
//! and dropped.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, opt, recognize},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded},
};

use purewire_common::error::{PurewireError, Result};

use super::{TypeRef, is_builtin_marker};

/// Suffix applied after a base type.
#[derive(Debug, Clone, Copy)]
enum Suffix {
    Array,
    Nullable,
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '@'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_continue))).parse(input)
}

fn dotted_name(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(char('.'), identifier)).parse(input)
}

fn symbol<'a>(c: char) -> impl Parser<&'a str, Output = char, Error = nom::error::Error<&'a str>> {
    delimited(multispace0, char(c), multispace0)
}

fn type_list(input: &str) -> IResult<&str, Vec<TypeRef>> {
    separated_list1(symbol(','), type_expr).parse(input)
}

fn named(input: &str) -> IResult<&str, TypeRef> {
    let (input, name) = dotted_name(input)?;
    let (input, args) = opt(delimited(symbol('<'), type_list, symbol('>'))).parse(input)?;
    let args = args.unwrap_or_default();
    if args.is_empty() && is_builtin_marker(name) {
        return Ok((input, TypeRef::Marker(name.to_string())));
    }
    Ok((
        input,
        TypeRef::Named {
            name: name.to_string(),
            args,
        },
    ))
}

fn tuple(input: &str) -> IResult<&str, TypeRef> {
    let (rest, items) = delimited(symbol('('), type_list, symbol(')')).parse(input)?;
    if items.len() < 2 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::SeparatedList,
        )));
    }
    Ok((rest, TypeRef::Tuple(items)))
}

fn suffix(input: &str) -> IResult<&str, Suffix> {
    preceded(
        multispace0,
        alt((
            pair(char('['), preceded(multispace0, char(']'))).map(|_| Suffix::Array),
            char('?').map(|_| Suffix::Nullable),
        )),
    )
    .parse(input)
}

fn type_expr(input: &str) -> IResult<&str, TypeRef> {
    let (input, _) = multispace0(input)?;
    let (input, base) = alt((tuple, named)).parse(input)?;
    let (input, suffixes) = many0(suffix).parse(input)?;
    let ty = suffixes.into_iter().fold(base, |ty, s| match s {
        Suffix::Array => TypeRef::array(ty),
        Suffix::Nullable => ty,
    });
    Ok((input, ty))
}

/// Parses a complete type expression.
///
/// # Errors
///
/// Returns [`PurewireError::TypeSyntax`] with the offset where parsing stopped.
pub fn parse_type(input: &str) -> Result<TypeRef> {
    match all_consuming(delimited(multispace0, type_expr, multispace0)).parse(input) {
        Ok((_, ty)) => Ok(ty),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(PurewireError::TypeSyntax {
            input: input.to_string(),
            offset: input.len() - e.input.len(),
            message: format!("unexpected input ({:?})", e.code),
        }),
        Err(nom::Err::Incomplete(_)) => Err(PurewireError::TypeSyntax {
            input: input.to_string(),
            offset: input.len(),
            message: "unexpected end of input".into(),
        }),
    }
}
