//! Context tree handed to the C source templater, serialized as JSON.
//!
//! Keys ending in `?` are section switches for the templates.

use crate::dictionary::{Dictionary, Object, SubObject};
use crate::error::CompileError;
use crate::pdo;
use crate::settings::Settings;
use crate::value::{hex_i64, Value};
use serde::Serialize;
use std::collections::BTreeMap;

/// Indentation the templates expect between generated C statements.
const CODE_SEPARATOR: &str = "\n            ";

/// Keys of `Context` besides the flattened settings.
const CONTEXT_KEYS: &[&str] = &["objects", "date", "appname"];

/// Keys of `ObjectContext` besides the flattened properties.
const OBJECT_KEYS: &[&str] = &[
    "hex_index",
    "variable?",
    "array?",
    "record?",
    "max_subindex",
    "subs",
    "dsubs",
    "mapped_subs",
    "description",
    "symbol",
    "hex_defaults",
    "pdo_data_bitsize",
    "deftype",
    "objflags",
    "tx_pdo_map?",
    "rx_pdo_map?",
];

/// Flattened maps share one JSON object with the fixed keys, so a clash would emit the key twice.
fn check_reserved(map: &BTreeMap<String, Value>, reserved: &[&str], what: &str) -> Result<(), CompileError> {
    match map.keys().find(|k| reserved.contains(&k.as_str())) {
        Some(key) => Err(CompileError::Unsupported(format!(
            "{} `{}` collides with a context key",
            what, key
        ))),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Context {
    /// Every setting; integers outside -9..=9 as hex strings.
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
    pub objects: Vec<ObjectContext>,
    pub date: String,
    pub appname: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectContext {
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
    pub hex_index: String,
    #[serde(rename = "variable?")]
    pub variable: bool,
    #[serde(rename = "array?")]
    pub array: bool,
    #[serde(rename = "record?")]
    pub record: bool,
    pub max_subindex: u8,
    pub subs: Vec<SubContext>,
    /// `subs` without the count entry.
    pub dsubs: Vec<SubContext>,
    /// Present for PDO mapping objects only.
    pub mapped_subs: Option<Vec<MappedSubContext>>,
    pub description: String,
    pub symbol: String,
    pub hex_defaults: String,
    pub pdo_data_bitsize: u32,
    pub deftype: String,
    pub objflags: String,
    #[serde(rename = "tx_pdo_map?")]
    pub tx_pdo_map: bool,
    #[serde(rename = "rx_pdo_map?")]
    pub rx_pdo_map: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubContext {
    pub subindex: u8,
    pub hex_subindex: String,
    pub ctype: String,
    pub subsymbol: String,
    pub deftype: String,
    pub pdo_bitsize: u32,
    pub sdo_bitsize: u32,
    pub access_code_hex: String,
    pub access: String,
    pub description: String,
    #[serde(rename = "null?")]
    pub null: bool,
    #[serde(rename = "txpdo?")]
    pub txpdo: bool,
    #[serde(rename = "rxpdo?")]
    pub rxpdo: bool,
    pub default: Value,
    pub cfg_type: &'static str,
}

/// A sub-object referenced by a mapping object, with its transfer code.
#[derive(Debug, Clone, Serialize)]
pub struct MappedSubContext {
    /// Collect: live value into the transmit buffer.
    pub tx_pdo_code: String,
    /// Scatter: receive buffer into the live value.
    pub rx_pdo_code: String,
    pub subindex: u8,
    pub ctype: String,
    pub subsymbol: String,
    pub deftype: String,
    pub pdo_bitsize: u32,
    pub sdo_bitsize: u32,
    pub access_code_hex: String,
    pub description: String,
    #[serde(rename = "txpdo?")]
    pub txpdo: bool,
    #[serde(rename = "rxpdo?")]
    pub rxpdo: bool,
    pub default: Value,
}

/// Slave stack configuration tool type of a basic type; `//` comments the entry out.
fn cfg_type(type_name: &str) -> &'static str {
    match type_name {
        "BOOL" => "bit lbloo",
        "SINT" | "USINT" => "byte _u",
        "INT" | "UINT" => "word _u",
        "DINT" | "UDINT" => "long _u",
        "REAL" => "float _uf",
        _ => "//",
    }
}

fn sub_context(so: &SubObject) -> SubContext {
    SubContext {
        subindex: so.subindex,
        hex_subindex: format!("{:02x}", so.subindex),
        ctype: so.ctype(),
        subsymbol: so.symbol.clone(),
        deftype: so.deftype(),
        pdo_bitsize: so.pdo_bitsize(),
        sdo_bitsize: so.sdo_bitsize(),
        access_code_hex: so.access.hex(),
        access: so.access.to_string(),
        description: so.description.clone(),
        null: so.is_null(),
        txpdo: so.access.is_tx_pdo(),
        rxpdo: so.access.is_rx_pdo(),
        default: so.default.clone(),
        cfg_type: cfg_type(so.basic_type.name),
    }
}

/// Sub-object contexts. Arrays keep the count entry and one `aEntries[N]` declaration.
fn subs_context(object: &Object) -> Result<Vec<SubContext>, CompileError> {
    let mut subs: Vec<SubContext> = object.subs().iter().map(sub_context).collect();
    if object.is_array() {
        subs.truncate(2);
        if let Some(element) = subs.get_mut(1) {
            if element.ctype.contains(':') {
                return Err(CompileError::Unsupported(format!(
                    "{}: arrays of bit types",
                    object.symbol
                )));
            }
            let base = element.ctype.split_whitespace().next().unwrap_or_default().to_string();
            element.ctype = format!("{} aEntries[{}]", base, object.max_subindex());
        }
    }
    Ok(subs)
}

fn mapped_subs_context(dictionary: &Dictionary, map: &Object) -> Result<Option<Vec<MappedSubContext>>, CompileError> {
    if map.pdo_direction().is_none() {
        return Ok(None);
    }
    let entries = dictionary.map_entries(map)?;
    let packing = pdo::synthesize_map(dictionary, map)?;
    let subs = entries
        .iter()
        .zip(&packing.fields)
        .map(|(so, packed)| MappedSubContext {
            tx_pdo_code: packed.collect().join(CODE_SEPARATOR),
            rx_pdo_code: packed.scatter().join(CODE_SEPARATOR),
            subindex: so.subindex,
            ctype: so.ctype(),
            subsymbol: so.symbol.clone(),
            deftype: so.deftype(),
            pdo_bitsize: so.pdo_bitsize(),
            sdo_bitsize: so.sdo_bitsize(),
            access_code_hex: so.access.hex(),
            description: so.description.clone(),
            txpdo: so.access.is_tx_pdo(),
            rxpdo: so.access.is_rx_pdo(),
            default: so.default.clone(),
        })
        .collect();
    Ok(Some(subs))
}

fn object_context(dictionary: &Dictionary, object: &Object) -> Result<ObjectContext, CompileError> {
    check_reserved(&object.properties, OBJECT_KEYS, &format!("property of {}", object.symbol))?;
    let subs = subs_context(object)?;
    let dsubs = subs.iter().skip(1).cloned().collect();
    Ok(ObjectContext {
        properties: object.properties.clone(),
        hex_index: object.hex_index(),
        variable: object.is_variable(),
        array: object.is_array(),
        record: object.is_record(),
        max_subindex: object.max_subindex(),
        subs,
        dsubs,
        mapped_subs: mapped_subs_context(dictionary, object)?,
        description: object.description.clone(),
        symbol: object.symbol.clone(),
        hex_defaults: object.hex_defaults(),
        pdo_data_bitsize: object.pdo_data_bitsize(),
        deftype: object.deftype(),
        objflags: format!("{:#x}", object.object_flags()),
        tx_pdo_map: object.is_tx_pdo_map(),
        rx_pdo_map: object.is_rx_pdo_map(),
    })
}

/// Settings as the templates see them.
fn settings_context(settings: &Settings) -> BTreeMap<String, Value> {
    settings
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Int(x) if !(-9..=9).contains(x) => Value::Str(hex_i64(*x)),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

/// Build the templating context for the whole dictionary.
pub fn build_context(dictionary: &Dictionary, settings: &Settings) -> Result<Context, CompileError> {
    let settings = settings_context(settings);
    check_reserved(&settings, CONTEXT_KEYS, "setting")?;
    let objects = dictionary
        .iter()
        .map(|object| object_context(dictionary, object))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Context {
        settings,
        objects,
        date: chrono::Local::now().format("%A, %d %B %Y").to_string(),
        appname: env!("CARGO_PKG_NAME").to_string(),
    })
}

impl Context {
    pub fn to_json(&self) -> Result<String, CompileError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CompileError::Unsupported(format!("context serialization: {}", e)))
    }
}
