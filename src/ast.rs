//! Abstract Syntax Tree for the object dictionary DSL.
//!
//! The tree is purely syntactic: symbol names are kept as written and every
//! expression is evaluated later, in declaration order, by [`crate::resolve`].

use crate::dictionary::Access;
use crate::error::Location;

/// Root: the ordered statements of one source file.
#[derive(Debug, Clone, Default)]
pub struct Source {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Make(MakeStatement),
    Assign(Assignment),
    Variable(VariableDecl),
    Record(RecordDecl),
    Array(ArrayDecl),
}

impl Statement {
    pub fn location(&self) -> Location {
        match self {
            Statement::Make(s) => s.location,
            Statement::Assign(s) => s.location,
            Statement::Variable(s) => s.location,
            Statement::Record(s) => s.location,
            Statement::Array(s) => s.location,
        }
    }
}

/// `make <generator> [args ...];`
#[derive(Debug, Clone)]
pub struct MakeStatement {
    pub location: Location,
    pub generator: String,
    pub args: Vec<String>,
}

/// `<name> = <expr>;`
#[derive(Debug, Clone)]
pub struct Assignment {
    pub location: Location,
    pub symbol: String,
    pub value: Expr,
}

/// How a symbol operand is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deref {
    /// bare `name`: the default value
    Default,
    /// `&name`: packed index/subindex/bitsize reference
    Reference,
    /// `$name`: the 16-bit object index
    Index,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Real(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Symbol(Deref, String),
}

/// Element of a `{ ... }` initializer: a literal or a shell-glob pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Literal(Literal),
    Pattern(Deref, String),
}

/// `.key = value` annotation on an object declaration.
#[derive(Debug, Clone)]
pub struct Property {
    pub key: String,
    pub value: Expr,
}

/// `<TYPE> [access] name [@index] [= default] ["description"] [.key = value]*;`
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub location: Location,
    pub type_name: String,
    pub access: Access,
    pub symbol: String,
    pub index: Option<Expr>,
    pub default: Option<Expr>,
    pub description: Option<String>,
    pub properties: Vec<Property>,
}

/// Field line inside a record body.
#[derive(Debug, Clone)]
pub struct SubDecl {
    pub location: Location,
    pub type_name: String,
    pub access: Access,
    pub symbol: String,
    pub subindex: Option<Expr>,
    pub default: Option<Expr>,
    pub description: Option<String>,
}

/// One `(index, "description")` group of a templated record.
#[derive(Debug, Clone)]
pub struct RecordInstance {
    pub index: Expr,
    pub description: String,
}

/// `record [access] name [(index, "desc")]* [@index] ["desc"] [.key = value]* { fields };`
#[derive(Debug, Clone)]
pub struct RecordDecl {
    pub location: Location,
    pub access: Access,
    pub symbol: String,
    /// Non-empty for the templated form, which declares `symbol_0 .. symbol_{N-1}`.
    pub instances: Vec<RecordInstance>,
    pub index: Option<Expr>,
    pub description: Option<String>,
    pub properties: Vec<Property>,
    pub fields: Vec<SubDecl>,
}

/// `<TYPE> [access] name[size] [@index] ["desc"] [= { items }];`
#[derive(Debug, Clone)]
pub struct ArrayDecl {
    pub location: Location,
    pub type_name: String,
    pub access: Access,
    pub symbol: String,
    pub size: Option<Expr>,
    pub index: Option<Expr>,
    pub description: Option<String>,
    pub properties: Vec<Property>,
    pub values: Vec<ListItem>,
}
