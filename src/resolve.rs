//! Symbol resolution: evaluates the AST in declaration order into a [`Dictionary`] and [`Settings`].
//!
//! Every expression is evaluated when its statement is reached, against the
//! symbols published so far. Referring to a name declared later is an
//! [`CompileError::UndefinedSymbol`]; there is no second pass.

use crate::ast::{
    ArrayDecl, Assignment, Deref, Expr, ListItem, Literal, MakeStatement, Property, RecordDecl,
    Source, Statement, VariableDecl,
};
use crate::dictionary::{
    default_object_description, ArraySpec, Dictionary, FieldSpec, Object, PdoDirection,
    RecordSpec, VariableSpec,
};
use crate::error::{CompileError, Location};
use crate::parser;
use crate::settings::Settings;
use crate::types;
use crate::value::Value;
use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeMap;

/// The resolved dictionary and settings every generator works on.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub dictionary: Dictionary,
    pub settings: Settings,
}

/// A `make` statement, kept for the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct MakeDirective {
    pub location: Location,
    pub generator: String,
    pub args: Vec<String>,
}

/// Output of a successful compile.
#[derive(Debug, Clone, Default)]
pub struct Compiled {
    pub world: World,
    pub makes: Vec<MakeDirective>,
    /// Every published symbol, by qualified name.
    pub symbols: BTreeMap<String, Entity>,
}

/// Parse and resolve DSL source.
pub fn compile(source: &str) -> Result<Compiled, CompileError> {
    let ast = parser::parse(source)?;
    resolve(&ast)
}

/// Resolve a parsed source. Fails on the first semantic error.
pub fn resolve(source: &Source) -> Result<Compiled, CompileError> {
    let mut session = Session::default();
    for statement in &source.statements {
        if let Err(e) = session.statement(statement) {
            debug!("resolution stopped at {}: {}", statement.location(), e);
            return Err(e);
        }
    }
    Ok(session.finish())
}

/// Object lookup used to evaluate symbol-table entities.
pub trait ObjectLookup {
    fn object(&self, index: u16) -> Option<&Object>;
}

impl ObjectLookup for Dictionary {
    fn object(&self, index: u16) -> Option<&Object> {
        self.get(index)
    }
}

/// What a published name stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Object(u16),
    SubObject(u16, u8),
    Literal(Value),
}

impl Entity {
    /// `$name`: the 16-bit object index.
    pub fn as_index(&self, symbol: &str) -> Result<u16, CompileError> {
        match *self {
            Entity::Object(index) | Entity::SubObject(index, _) => Ok(index),
            Entity::Literal(_) => Err(CompileError::NonReferenceable(format!("${}", symbol))),
        }
    }

    /// `&name`: packed mapping reference. Only sub-objects and variables have one.
    pub fn as_reference(&self, symbol: &str, objects: &impl ObjectLookup) -> Result<u32, CompileError> {
        let non_referenceable = || CompileError::NonReferenceable(format!("&{}", symbol));
        match *self {
            Entity::Object(index) => {
                let object = objects.object(index).ok_or_else(non_referenceable)?;
                if !object.is_variable() {
                    return Err(non_referenceable());
                }
                object.sub(0).map(|so| so.reference()).ok_or_else(non_referenceable)
            }
            Entity::SubObject(index, subindex) => objects
                .object(index)
                .and_then(|o| o.sub(subindex))
                .map(|so| so.reference())
                .ok_or_else(non_referenceable),
            Entity::Literal(_) => Err(non_referenceable()),
        }
    }

    /// Bare `name`: the default value. Arrays and records have none.
    pub fn as_default(&self, symbol: &str, objects: &impl ObjectLookup) -> Result<Value, CompileError> {
        let non_referenceable = || CompileError::NonReferenceable(symbol.to_string());
        match self {
            Entity::Object(index) => {
                let object = objects.object(*index).ok_or_else(non_referenceable)?;
                if !object.is_variable() {
                    return Err(non_referenceable());
                }
                object.sub(0).map(|so| so.default.clone()).ok_or_else(non_referenceable)
            }
            Entity::SubObject(index, subindex) => objects
                .object(*index)
                .and_then(|o| o.sub(*subindex))
                .map(|so| so.default.clone())
                .ok_or_else(non_referenceable),
            Entity::Literal(value) => Ok(value.clone()),
        }
    }

    fn deref(&self, deref: Deref, symbol: &str, objects: &impl ObjectLookup) -> Result<Value, CompileError> {
        match deref {
            Deref::Default => self.as_default(symbol, objects),
            Deref::Reference => self.as_reference(symbol, objects).map(Value::from),
            Deref::Index => self.as_index(symbol).map(|i| Value::Int(i64::from(i))),
        }
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Anchored regex for a shell glob: `*` any run, `?` any one character.
fn glob_regex(pattern: &str) -> Result<Regex, CompileError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| CompileError::Unsupported(format!("pattern {}: {}", pattern, e)))
}

/// One compile: the symbol table, the dictionary under construction and the running index.
#[derive(Debug, Default)]
struct Session {
    dictionary: Dictionary,
    symbols: BTreeMap<String, Entity>,
    last_index: u16,
    /// Record whose fields are being resolved; visible to lookups before it is inserted.
    pending: Option<Object>,
    makes: Vec<MakeDirective>,
}

impl ObjectLookup for Session {
    fn object(&self, index: u16) -> Option<&Object> {
        match &self.pending {
            Some(object) if object.index == index => Some(object),
            _ => self.dictionary.get(index),
        }
    }
}

impl Session {
    fn statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Make(s) => {
                self.make(s);
                Ok(())
            }
            Statement::Assign(s) => self.assign(s),
            Statement::Variable(s) => self.variable(s),
            Statement::Record(s) => self.record(s),
            Statement::Array(s) => self.array(s),
        }
    }

    fn finish(self) -> Compiled {
        let mut settings = Settings::new();
        for (name, entity) in &self.symbols {
            if let Ok(value) = entity.as_default(name, &self.dictionary) {
                settings.insert(name.clone(), value);
            }
        }
        debug!(
            "resolved {} objects, {} symbols, {} make directives",
            self.dictionary.len(),
            self.symbols.len(),
            self.makes.len()
        );
        Compiled {
            world: World {
                dictionary: self.dictionary,
                settings,
            },
            makes: self.makes,
            symbols: self.symbols,
        }
    }

    fn publish(&mut self, name: impl Into<String>, entity: Entity) {
        let name = name.into();
        if let Some(previous) = self.symbols.insert(name.clone(), entity) {
            debug!("{} redefined (was {:?})", name, previous);
        }
    }

    fn lookup(&self, name: &str) -> Result<&Entity, CompileError> {
        self.symbols
            .get(name)
            .ok_or_else(|| CompileError::UndefinedSymbol(name.to_string()))
    }

    fn eval(&self, expr: &Expr) -> Result<Value, CompileError> {
        match expr {
            Expr::Literal(lit) => Ok(literal(lit)),
            Expr::Symbol(deref, name) => self.lookup(name)?.deref(*deref, name, self),
        }
    }

    fn eval_int(&self, expr: &Expr, what: &str) -> Result<i64, CompileError> {
        let value = self.eval(expr)?;
        value.as_i64().ok_or_else(|| CompileError::TypeMismatch {
            context: what.to_string(),
            expected: "integer",
            found: value.to_string(),
        })
    }

    fn eval_index(&self, expr: &Expr, what: &str) -> Result<u16, CompileError> {
        let v = self.eval_int(expr, what)?;
        u16::try_from(v).map_err(|_| CompileError::overflow(what, v))
    }

    /// Explicit `@index`, or the previous top-level index + 1.
    fn next_index(&self, index: Option<&Expr>, symbol: &str) -> Result<u16, CompileError> {
        match index {
            Some(expr) => self.eval_index(expr, &format!("{} index", symbol)),
            None => self
                .last_index
                .checked_add(1)
                .ok_or_else(|| CompileError::overflow(format!("{} index", symbol), 0x10000)),
        }
    }

    /// Expand an initializer list. Glob patterns expand to the matching values in
    /// ascending order; entities the operator does not apply to are skipped.
    fn eval_list(&self, items: &[ListItem]) -> Result<Vec<Value>, CompileError> {
        let mut out = Vec::new();
        for item in items {
            match item {
                ListItem::Literal(lit) => out.push(literal(lit)),
                ListItem::Pattern(deref, pattern) if !is_glob(pattern) => {
                    out.push(self.lookup(pattern)?.deref(*deref, pattern, self)?);
                }
                ListItem::Pattern(deref, pattern) => {
                    let re = glob_regex(pattern)?;
                    let mut matched = Vec::new();
                    for (name, entity) in self.symbols.iter().filter(|(name, _)| re.is_match(name)) {
                        match entity.deref(*deref, name, self) {
                            Ok(value) => matched.push(value),
                            Err(CompileError::NonReferenceable(_)) => {
                                debug!("{}: skipping {}", pattern, name);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    if matched.is_empty() {
                        warn!("pattern {} matches nothing", pattern);
                    }
                    matched.sort_by(Value::sort_cmp);
                    out.extend(matched);
                }
            }
        }
        Ok(out)
    }

    fn properties(&mut self, object: &mut Object, properties: &[Property]) -> Result<(), CompileError> {
        for property in properties {
            let value = self.eval(&property.value)?;
            self.publish(
                format!("{}.{}", object.symbol, property.key),
                Entity::Literal(value.clone()),
            );
            object.properties.insert(property.key.clone(), value);
        }
        Ok(())
    }

    /// Check defaults fit their types, then add to the dictionary.
    fn insert(&mut self, object: Object) -> Result<(), CompileError> {
        for sub in object.subs() {
            sub.encoded_default()?;
        }
        debug!(
            "{} 0x{:04X} {} ({} sub-objects)",
            object.code.name(),
            object.index,
            object.symbol,
            object.subs().len()
        );
        self.last_index = object.index;
        self.dictionary.insert(object)
    }

    fn make(&mut self, s: &MakeStatement) {
        self.makes.push(MakeDirective {
            location: s.location,
            generator: s.generator.clone(),
            args: s.args.clone(),
        });
    }

    fn assign(&mut self, s: &Assignment) -> Result<(), CompileError> {
        let value = self.eval(&s.value)?;
        self.publish(s.symbol.clone(), Entity::Literal(value));
        Ok(())
    }

    fn variable(&mut self, s: &VariableDecl) -> Result<(), CompileError> {
        let basic_type = types::lookup(&s.type_name)?;
        let index = self.next_index(s.index.as_ref(), &s.symbol)?;
        let default = match &s.default {
            Some(expr) => self.eval(expr)?,
            None => Value::default(),
        };
        let description = s
            .description
            .clone()
            .unwrap_or_else(|| default_object_description(index));
        let spec = VariableSpec {
            access: s.access,
            basic_type,
            default,
        };
        let mut object = Object::variable(index, s.symbol.clone(), description, spec);
        self.properties(&mut object, &s.properties)?;
        self.insert(object)?;
        self.publish(s.symbol.clone(), Entity::Object(index));
        Ok(())
    }

    fn array(&mut self, s: &ArrayDecl) -> Result<(), CompileError> {
        let basic_type = types::lookup(&s.type_name)?;
        let index = self.next_index(s.index.as_ref(), &s.symbol)?;
        let size = match &s.size {
            Some(expr) => {
                let what = format!("{} size", s.symbol);
                let n = self.eval_int(expr, &what)?;
                Some(usize::try_from(n).map_err(|_| CompileError::overflow(what, n))?)
            }
            None => None,
        };
        let values = self.eval_list(&s.values)?;
        let description = s
            .description
            .clone()
            .unwrap_or_else(|| default_object_description(index));
        let spec = ArraySpec {
            access: s.access,
            basic_type,
            size,
            values,
        };
        let mut object = Object::array(index, s.symbol.clone(), description, spec)?;
        self.properties(&mut object, &s.properties)?;
        let mapping = PdoDirection::from_map_index(index).map(|direction| {
            let references: Vec<i64> = object
                .payload()
                .iter()
                .filter_map(|so| so.default.as_i64())
                .collect();
            (direction, references)
        });
        self.insert(object)?;
        self.publish(s.symbol.clone(), Entity::Object(index));
        if let Some((direction, references)) = mapping {
            self.tag_mapping(&s.symbol, direction, &references);
        }
        Ok(())
    }

    fn tag_mapping(&mut self, symbol: &str, direction: PdoDirection, references: &[i64]) {
        for &reference in references {
            let tagged = u32::try_from(reference)
                .map(|r| self.dictionary.tag_pdo(r, direction))
                .unwrap_or(false);
            if !tagged && reference != 0 {
                warn!("{}: mapping entry 0x{:08X} refers to no sub-object", symbol, reference);
            }
        }
    }

    fn record(&mut self, s: &RecordDecl) -> Result<(), CompileError> {
        if s.instances.is_empty() {
            let index = self.next_index(s.index.as_ref(), &s.symbol)?;
            let description = s
                .description
                .clone()
                .unwrap_or_else(|| default_object_description(index));
            return self.record_instance(s, index, s.symbol.clone(), description);
        }
        if s.index.is_some() || s.description.is_some() {
            warn!(
                "{}: @index and description are ignored on a templated record",
                s.symbol
            );
        }
        for (i, instance) in s.instances.iter().enumerate() {
            let symbol = format!("{}_{}", s.symbol, i);
            let index = self.eval_index(&instance.index, &format!("{} index", symbol))?;
            self.record_instance(s, index, symbol, instance.description.clone())?;
        }
        Ok(())
    }

    fn record_instance(
        &mut self,
        s: &RecordDecl,
        index: u16,
        symbol: String,
        description: String,
    ) -> Result<(), CompileError> {
        let mut spec = RecordSpec::default();
        self.pending = Some(Object::record(index, symbol.clone(), description.clone(), &spec)?);
        self.publish(symbol.clone(), Entity::Object(index));

        let fields = self.record_fields(s, index, &symbol, &description, &mut spec);
        let object = self.pending.take();
        fields?;
        let Some(mut object) = object else {
            return Err(CompileError::UndefinedSymbol(symbol));
        };
        self.properties(&mut object, &s.properties)?;
        self.insert(object)
    }

    /// Add fields one at a time, rebuilding the pending record so later fields can refer to earlier ones.
    fn record_fields(
        &mut self,
        s: &RecordDecl,
        index: u16,
        symbol: &str,
        description: &str,
        spec: &mut RecordSpec,
    ) -> Result<(), CompileError> {
        for field in &s.fields {
            let qualified = format!("{}.{}", symbol, field.symbol);
            let subindex = match &field.subindex {
                Some(expr) => {
                    let what = format!("{} subindex", qualified);
                    let v = self.eval_int(expr, &what)?;
                    Some(u8::try_from(v).map_err(|_| CompileError::overflow(what, v))?)
                }
                None => None,
            };
            let default = match &field.default {
                Some(expr) => self.eval(expr)?,
                None => Value::default(),
            };
            spec.fields.push(FieldSpec {
                subindex,
                access: field.access | s.access,
                basic_type: types::lookup(&field.type_name)?,
                symbol: field.symbol.clone(),
                default,
                description: field.description.clone(),
            });
            let object = Object::record(index, symbol, description, spec)?;
            let subindex = object.max_subindex();
            self.pending = Some(object);
            self.publish(qualified, Entity::SubObject(index, subindex));
        }
        Ok(())
    }
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Int(x) => Value::Int(*x),
        Literal::Real(x) => Value::Real(*x),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_translation() {
        let re = glob_regex("a.*").unwrap();
        assert!(re.is_match("a.x"));
        assert!(re.is_match("a."));
        assert!(!re.is_match("ab.x"));
        assert!(!re.is_match("b.a.x"));
        let re = glob_regex("tx_map_?").unwrap();
        assert!(re.is_match("tx_map_1"));
        assert!(!re.is_match("tx_map_12"));
    }
}
