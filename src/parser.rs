//! Parse DSL source into AST using PEST.
//!
//! Parsing is purely syntactic; no symbol is looked up here.

use crate::ast::*;
use crate::dictionary::Access;
use crate::error::{CompileError, Location};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DictionaryParser;

/// Parse DSL source into AST.
pub fn parse(source: &str) -> Result<Source, CompileError> {
    let pairs = DictionaryParser::parse(Rule::file, source).map_err(pest_error)?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| CompileError::parse(Location::default(), "Empty parse"))?;
    build_source(pair)
}

fn pest_error(e: pest::error::Error<Rule>) -> CompileError {
    let (line, column) = match e.line_col {
        pest::error::LineColLocation::Pos(pos) => pos,
        pest::error::LineColLocation::Span(start, _) => start,
    };
    CompileError::parse(Location::new(line, column), e.variant.message().to_string())
}

fn location(pair: &Pair<Rule>) -> Location {
    let (line, column) = pair.as_span().start_pos().line_col();
    Location::new(line, column)
}

fn build_source(pair: Pair<Rule>) -> Result<Source, CompileError> {
    let mut statements = Vec::new();
    for inner in pair.into_inner() {
        let statement = match inner.as_rule() {
            Rule::make_stmt => Statement::Make(build_make(inner)?),
            Rule::assign_stmt => Statement::Assign(build_assign(inner)?),
            Rule::variable_stmt => Statement::Variable(build_variable(inner)?),
            Rule::array_stmt => Statement::Array(build_array(inner)?),
            Rule::record_stmt => Statement::Record(build_record(inner)?),
            _ => continue,
        };
        statements.push(statement);
    }
    Ok(Source { statements })
}

fn build_make(pair: Pair<Rule>) -> Result<MakeStatement, CompileError> {
    let loc = location(&pair);
    let mut generator = None;
    let mut args = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => generator = Some(inner.as_str().to_string()),
            Rule::string => args.push(unquote(inner.as_str())),
            Rule::make_arg => args.push(inner.as_str().to_string()),
            _ => {}
        }
    }
    Ok(MakeStatement {
        location: loc,
        generator: generator.ok_or_else(|| CompileError::parse(loc, "make: missing generator name"))?,
        args,
    })
}

fn build_assign(pair: Pair<Rule>) -> Result<Assignment, CompileError> {
    let loc = location(&pair);
    let mut symbol = None;
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => symbol = Some(inner.as_str().to_string()),
            Rule::expr => value = Some(build_expr(inner)?),
            _ => {}
        }
    }
    Ok(Assignment {
        location: loc,
        symbol: symbol.ok_or_else(|| CompileError::parse(loc, "assignment: missing name"))?,
        value: value.ok_or_else(|| CompileError::parse(loc, "assignment: missing value"))?,
    })
}

fn build_variable(pair: Pair<Rule>) -> Result<VariableDecl, CompileError> {
    let loc = location(&pair);
    let mut type_name = None;
    let mut access = Access::NONE;
    let mut symbol = None;
    let mut index = None;
    let mut default = None;
    let mut description = None;
    let mut properties = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_name => type_name = Some(inner.as_str().to_string()),
            Rule::access => access = build_access(inner)?,
            Rule::name => symbol = Some(inner.as_str().to_string()),
            Rule::index_spec => set_once(&mut index, build_spec_expr(inner)?, loc, "index")?,
            Rule::default_spec => set_once(&mut default, build_spec_expr(inner)?, loc, "default")?,
            Rule::description => set_once(&mut description, build_description(inner), loc, "description")?,
            Rule::property => properties.push(build_property(inner)?),
            _ => {}
        }
    }
    Ok(VariableDecl {
        location: loc,
        type_name: type_name.ok_or_else(|| CompileError::parse(loc, "variable: missing type"))?,
        access,
        symbol: symbol.ok_or_else(|| CompileError::parse(loc, "variable: missing name"))?,
        index,
        default,
        description,
        properties,
    })
}

fn build_array(pair: Pair<Rule>) -> Result<ArrayDecl, CompileError> {
    let loc = location(&pair);
    let mut type_name = None;
    let mut access = Access::NONE;
    let mut symbol = None;
    let mut size = None;
    let mut index = None;
    let mut description = None;
    let mut properties = Vec::new();
    let mut values = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_name => type_name = Some(inner.as_str().to_string()),
            Rule::access => access = build_access(inner)?,
            Rule::name => symbol = Some(inner.as_str().to_string()),
            Rule::array_size => {
                if let Some(e) = inner.into_inner().next() {
                    size = Some(build_expr(e)?);
                }
            }
            Rule::index_spec => set_once(&mut index, build_spec_expr(inner)?, loc, "index")?,
            Rule::description => set_once(&mut description, build_description(inner), loc, "description")?,
            Rule::property => properties.push(build_property(inner)?),
            Rule::array_init => {
                if let Some(list) = inner.into_inner().next() {
                    for item in list.into_inner() {
                        values.push(build_list_item(item)?);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(ArrayDecl {
        location: loc,
        type_name: type_name.ok_or_else(|| CompileError::parse(loc, "array: missing type"))?,
        access,
        symbol: symbol.ok_or_else(|| CompileError::parse(loc, "array: missing name"))?,
        size,
        index,
        description,
        properties,
        values,
    })
}

fn build_record(pair: Pair<Rule>) -> Result<RecordDecl, CompileError> {
    let loc = location(&pair);
    let mut access = Access::NONE;
    let mut symbol = None;
    let mut instances = Vec::new();
    let mut index = None;
    let mut description = None;
    let mut properties = Vec::new();
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::access => access = build_access(inner)?,
            Rule::name => symbol = Some(inner.as_str().to_string()),
            Rule::record_instance => instances.push(build_instance(inner)?),
            Rule::index_spec => set_once(&mut index, build_spec_expr(inner)?, loc, "index")?,
            Rule::description => set_once(&mut description, build_description(inner), loc, "description")?,
            Rule::property => properties.push(build_property(inner)?),
            Rule::sub_stmt => fields.push(build_sub(inner)?),
            _ => {}
        }
    }
    Ok(RecordDecl {
        location: loc,
        access,
        symbol: symbol.ok_or_else(|| CompileError::parse(loc, "record: missing name"))?,
        instances,
        index,
        description,
        properties,
        fields,
    })
}

fn build_instance(pair: Pair<Rule>) -> Result<RecordInstance, CompileError> {
    let loc = location(&pair);
    let mut it = pair.into_inner();
    let index = it
        .next()
        .ok_or_else(|| CompileError::parse(loc, "record instance: missing index"))?;
    let description = it
        .next()
        .ok_or_else(|| CompileError::parse(loc, "record instance: missing description"))?;
    Ok(RecordInstance {
        index: build_expr(index)?,
        description: unquote(description.as_str()),
    })
}

fn build_sub(pair: Pair<Rule>) -> Result<SubDecl, CompileError> {
    let loc = location(&pair);
    let mut type_name = None;
    let mut access = Access::NONE;
    let mut symbol = None;
    let mut subindex = None;
    let mut default = None;
    let mut description = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_name => type_name = Some(inner.as_str().to_string()),
            Rule::access => access = build_access(inner)?,
            Rule::ident => symbol = Some(inner.as_str().to_string()),
            Rule::index_spec => set_once(&mut subindex, build_spec_expr(inner)?, loc, "subindex")?,
            Rule::default_spec => set_once(&mut default, build_spec_expr(inner)?, loc, "default")?,
            Rule::description => set_once(&mut description, build_description(inner), loc, "description")?,
            _ => {}
        }
    }
    Ok(SubDecl {
        location: loc,
        type_name: type_name.ok_or_else(|| CompileError::parse(loc, "field: missing type"))?,
        access,
        symbol: symbol.ok_or_else(|| CompileError::parse(loc, "field: missing name"))?,
        subindex,
        default,
        description,
    })
}

fn set_once<T>(slot: &mut Option<T>, value: T, loc: Location, what: &str) -> Result<(), CompileError> {
    if slot.is_some() {
        return Err(CompileError::parse(loc, format!("{} given more than once", what)));
    }
    *slot = Some(value);
    Ok(())
}

fn build_access(pair: Pair<Rule>) -> Result<Access, CompileError> {
    let mut access = Access::NONE;
    for kw in pair.into_inner() {
        access |= Access::from_keyword(kw.as_str())
            .ok_or_else(|| CompileError::parse(location(&kw), format!("unknown access keyword {}", kw.as_str())))?;
    }
    Ok(access)
}

fn build_property(pair: Pair<Rule>) -> Result<Property, CompileError> {
    let loc = location(&pair);
    let mut it = pair.into_inner();
    let key = it.next().ok_or_else(|| CompileError::parse(loc, "property: missing key"))?;
    let value = it.next().ok_or_else(|| CompileError::parse(loc, "property: missing value"))?;
    Ok(Property {
        key: key.as_str().to_string(),
        value: build_expr(value)?,
    })
}

fn build_description(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|s| unquote(s.as_str()))
        .unwrap_or_default()
}

/// `index_spec` / `default_spec`: the single `expr` child.
fn build_spec_expr(pair: Pair<Rule>) -> Result<Expr, CompileError> {
    let loc = location(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| CompileError::parse(loc, "missing expression"))?;
    build_expr(inner)
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, CompileError> {
    let loc = location(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| CompileError::parse(loc, "Empty expression"))?;
    match inner.as_rule() {
        Rule::literal => Ok(Expr::Literal(build_literal(inner)?)),
        Rule::ref_expr => Ok(Expr::Symbol(Deref::Reference, operand(inner)?)),
        Rule::idx_expr => Ok(Expr::Symbol(Deref::Index, operand(inner)?)),
        Rule::name => Ok(Expr::Symbol(Deref::Default, inner.as_str().to_string())),
        r => Err(CompileError::parse(loc, format!("Unhandled expression rule: {:?}", r))),
    }
}

fn build_list_item(pair: Pair<Rule>) -> Result<ListItem, CompileError> {
    let loc = location(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| CompileError::parse(loc, "Empty list item"))?;
    match inner.as_rule() {
        Rule::literal => Ok(ListItem::Literal(build_literal(inner)?)),
        Rule::wild_ref => Ok(ListItem::Pattern(Deref::Reference, operand(inner)?)),
        Rule::wild_idx => Ok(ListItem::Pattern(Deref::Index, operand(inner)?)),
        Rule::wild_name => Ok(ListItem::Pattern(Deref::Default, inner.as_str().to_string())),
        r => Err(CompileError::parse(loc, format!("Unhandled list item rule: {:?}", r))),
    }
}

/// Name following a `&` / `$` prefix.
fn operand(pair: Pair<Rule>) -> Result<String, CompileError> {
    let loc = location(&pair);
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| CompileError::parse(loc, "missing symbol name"))
}

fn build_literal(pair: Pair<Rule>) -> Result<Literal, CompileError> {
    let loc = location(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| CompileError::parse(loc, "Empty literal"))?;
    let s = inner.as_str();
    let out_of_range = || CompileError::parse(loc, format!("literal out of range: {}", s));
    match inner.as_rule() {
        Rule::hex => {
            let n = u64::from_str_radix(&s[2..], 16).map_err(|_| out_of_range())?;
            Ok(Literal::Int(i64::try_from(n).map_err(|_| out_of_range())?))
        }
        Rule::int => Ok(Literal::Int(s.parse().map_err(|_| out_of_range())?)),
        Rule::real => Ok(Literal::Real(s.parse().map_err(|_| out_of_range())?)),
        Rule::string => Ok(Literal::Str(unquote(s))),
        r => Err(CompileError::parse(loc, format!("Unhandled literal rule: {:?}", r))),
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    let inner = if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
