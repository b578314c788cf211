//! Settings mapping and the derivation pass that fills and derives device configuration keys.
//!
//! The mapping is populated by the resolver from every published symbol with a
//! default. [`derive`] then fills the fallback table and computes the values the
//! SII serializer and the slave stack configuration expect. It reads the
//! dictionary but never changes it.

use crate::dictionary::{Dictionary, PdoDirection};
use crate::error::CompileError;
use crate::value::Value;
use log::debug;
use serde::Serialize;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Name-keyed settings, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Insert only if `key` is absent. Returns true when the value was inserted.
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_string(), value.into());
        true
    }

    /// Integer setting; a missing key is an undefined symbol.
    pub fn int(&self, key: &str) -> Result<i64, CompileError> {
        match self.values.get(key) {
            Some(v) => v.as_i64().ok_or_else(|| CompileError::TypeMismatch {
                context: key.to_string(),
                expected: "integer",
                found: v.to_string(),
            }),
            None => Err(CompileError::UndefinedSymbol(key.to_string())),
        }
    }

    pub fn int_or(&self, key: &str, fallback: i64) -> Result<i64, CompileError> {
        if self.contains(key) {
            self.int(key)
        } else {
            Ok(fallback)
        }
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Truthiness of a switch; absent means off.
    pub fn flag(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(Value::is_truthy)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overwrite with every entry of `other`.
    pub fn merge(&mut self, other: Settings) {
        self.values.extend(other.values);
    }
}

impl<'a> IntoIterator for &'a Settings {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Settings {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Integer fallbacks, mostly slave stack `ecat_def.h` switches.
const INT_DEFAULTS: &[(&str, i64)] = &[
    // identification
    ("VENDOR_ID", 0xffff_ffff),
    ("PRODUCT_CODE", 0xffff_ffff),
    ("REVISION_NUMBER", 0),
    ("SERIAL_NUMBER", 0),
    ("DEVICE_PROFILE_TYPE", 0x0000_1389),
    // generic
    ("EXPLICIT_DEVICE_ID", 0),
    ("ESC_SM_WD_SUPPORTED", 0),
    ("STATIC_OBJECT_DIC", 0),
    ("ESC_EEPROM_ACCESS_SUPPORT", 0),
    // hardware
    ("MCI_HW", 0),
    ("ESC_16BIT_ACCESS", 0),
    ("ESC_32BIT_ACCESS", 0),
    ("CONTROLLER_16BIT", 0),
    ("CONTROLLER_32BIT", 0),
    ("MBX_16BIT_ACCESS", 0),
    ("BIG_ENDIAN_16BIT", 0),
    ("BIG_ENDIAN_FORMAT", 0),
    ("EXT_DEBUGER_INTERFACE", 0),
    ("UC_SET_ECAT_LED", 0),
    ("ESC_SUPPORT_ECAT_LED", 0),
    ("ESC_EEPROM_EMULATION", 0),
    ("CREATE_EEPROM_CONTENT", 0),
    ("ESC_EEPROM_SIZE", 0x800),
    ("EEPROM_READ_SIZE", 8),
    ("EEPROM_WRITE_SIZE", 2),
    // state machine
    ("BOOTSTRAPMODE_SUPPORTED", 0),
    ("OP_PD_REQUIRED", 1),
    ("PREOPTIMEOUT", 0x7d0),
    ("SAFEOP2OPTIMEOUT", 0x2328),
    // synchronization
    ("AL_EVENT_ENABLED", 1),
    ("DC_SUPPORTED", 1),
    ("ECAT_TIMER_INT", 0),
    ("MIN_PD_CYCLE_TIME", 0x186a0),
    ("MAX_PD_CYCLE_TIME", 0xc350_0000),
    ("PD_OUTPUT_DELAY_TIME", 0),
    ("PD_OUTPUT_CALC_AND_COPY_TIME", 0),
    ("PD_INPUT_CALC_AND_COPY_TIME", 0),
    ("PD_INPUT_DELAY_TIME", 0),
    // application
    ("CiA402_DEVICE", 0),
    ("SAMPLE_APPLICATION", 0),
    ("SAMPLE_APPLICATION_INTERFACE", 0),
    ("USE_DEFAULT_MAIN", 1),
    // process data
    ("MIN_PD_WRITE_ADDRESS", 0x1000),
    ("DEF_PD_WRITE_ADDRESS", 0x1800),
    ("MAX_PD_WRITE_ADDRESS", 0x3000),
    ("MIN_PD_READ_ADDRESS", 0x1000),
    ("DEF_PD_READ_ADDRESS", 0x1c00),
    ("MAX_PD_READ_ADDRESS", 0x3000),
    // mailbox
    ("MAILBOX_QUEUE", 1),
    ("AOE_SUPPORTED", 0),
    ("COE_SUPPORTED", 1),
    ("COMPLETE_ACCESS_SUPPORTED", 1),
    ("SEGMENTED_SDO_SUPPORTED", 1),
    ("SDO_RES_INTERFACE", 1),
    ("USE_SINGLE_PDO_MAPPING_ENTRY_DESCR", 0),
    ("BACKUP_PARAMETER_SUPPORTED", 0),
    ("STORE_BACKUP_PARAMETER_IMMEDIATELY", 0),
    ("DIAGNOSIS_SUPPORTED", 0),
    ("MAX_DIAG_MSG", 0x14),
    ("EMERGENCY_SUPPORTED", 0),
    ("MAX_EMERGENCIES", 1),
    ("VOE_SUPPORTED", 0),
    ("SOE_SUPPORTED", 0),
    ("EOE_SUPPORTED", 0),
    ("STATIC_ETHERNET_BUFFER", 0),
    ("FOE_SUPPORTED", 0),
    ("FOE_SAVE_FILES", 0),
    ("MAX_FILE_SIZE", 0x500),
    ("MIN_MBX_SIZE", 0x22),
    ("MAX_MBX_SIZE", 0x100),
    ("MIN_MBX_WRITE_ADDRESS", 0x1000),
    ("DEF_MBX_WRITE_ADDRESS", 0x1000),
    ("MAX_MBX_WRITE_ADDRESS", 0x3000),
    ("MIN_MBX_READ_ADDRESS", 0x1000),
    ("DEF_MBX_READ_ADDRESS", 0x1400),
    ("MAX_MBX_READ_ADDRESS", 0x3000),
];

const STR_DEFAULTS: &[(&str, &str)] = &[
    ("DEVICE_NAME", "Undefined"),
    ("DEVICE_HW_VERSION", "0.00"),
    ("DEVICE_SW_VERSION", "0.00"),
    ("HW_ACCESS_FILE", "#include \"tieschw.h\""),
    ("MAKE_PTR_TO_ESC", ""),
    ("APPLICATION_FILE", "#include \"tiescappl.h\""),
    ("physics", "YY"),
];

/// Mailbox protocol switch and its `mbx_protocol` bit (ETG.1000.6 table 18).
const MAILBOX_PROTOCOLS: &[(&str, i64)] = &[
    ("AOE_SUPPORTED", 0x01),
    ("EOE_SUPPORTED", 0x02),
    ("COE_SUPPORTED", 0x04),
    ("FOE_SUPPORTED", 0x08),
    ("SOE_SUPPORTED", 0x10),
    ("VOE_SUPPORTED", 0x20),
];

const MAILBOX_SIZE: i64 = 128;

/// Fill fallbacks and derive the SII / slave stack configuration keys.
///
/// Keys already present are left alone, except `mbx_protocol`, which
/// accumulates the bits of every enabled mailbox protocol.
pub fn derive(dictionary: &Dictionary, settings: &mut Settings) -> Result<(), CompileError> {
    for &(key, value) in INT_DEFAULTS {
        settings.set_default(key, value);
    }
    for &(key, value) in STR_DEFAULTS {
        settings.set_default(key, value);
    }

    // EEPROM size is advertised in kibibit - 1
    let eeprom_bytes = settings.int("ESC_EEPROM_SIZE")?;
    settings.set_default("sii.size", eeprom_bytes.saturating_mul(8) / 1024 - 1);

    let physics = settings.str("physics").unwrap_or_default().to_string();
    settings.set_default("sii.phys_port", phys_port(&physics)?);

    let mut mbx_protocol = settings.int_or("mbx_protocol", 0)?;
    for &(switch, bit) in MAILBOX_PROTOCOLS {
        if settings.flag(switch) {
            mbx_protocol |= bit;
        }
    }
    settings.insert("mbx_protocol", mbx_protocol);
    settings.set_default("MAILBOX_SUPPORTED", i64::from(mbx_protocol != 0));

    let mut coe_details = settings.int_or("coe_details", 0)?;
    if settings.flag("COE_SUPPORTED") {
        coe_details |= 0x03;
    }
    if settings.flag("COMPLETE_ACCESS_SUPPORTED") {
        coe_details |= 0x20;
    }
    settings.insert("coe_details", coe_details);
    settings.set_default("foe_details", i64::from(settings.flag("FOE_SUPPORTED")));
    settings.set_default("eoe_details", i64::from(settings.flag("EOE_SUPPORTED")));

    let write_address = settings.int("DEF_MBX_WRITE_ADDRESS")?;
    let read_address = settings.int("DEF_MBX_READ_ADDRESS")?;
    for prefix in ["bs", "std"] {
        settings.set_default(&format!("{}_mbx_rx_off", prefix), write_address);
        settings.set_default(&format!("{}_mbx_rx_size", prefix), MAILBOX_SIZE);
        settings.set_default(&format!("{}_mbx_tx_off", prefix), read_address);
        settings.set_default(&format!("{}_mbx_tx_size", prefix), MAILBOX_SIZE);
    }

    for key in ["DEVICE_NAME", "DEVICE_HW_VERSION", "DEVICE_SW_VERSION"] {
        let len = settings.str(key).map(str::len).unwrap_or(0);
        settings.set_default(&format!("{}_LEN", key), len as i64);
    }

    let rx_bytes = process_data_bytes(dictionary, PdoDirection::Receive)?;
    let tx_bytes = process_data_bytes(dictionary, PdoDirection::Transmit)?;
    settings.set_default("MAX_PD_OUTPUT_SIZE", rx_bytes);
    settings.set_default("MAX_PD_INPUT_SIZE", tx_bytes);

    let interrupts = ["DC_SUPPORTED", "AL_EVENT_ENABLED", "ECAT_TIMER_INT"]
        .iter()
        .any(|k| settings.flag(k));
    settings.set_default("INTERRUPTS_SUPPORTED", i64::from(interrupts));

    debug!(
        "derived settings: {} keys, rx {} bytes, tx {} bytes",
        settings.len(),
        rx_bytes,
        tx_bytes
    );
    Ok(())
}

/// SII physical port nibbles: `Y` (MII) = 1, `K` (EBUS) = 3, anything else unused.
pub fn phys_port(physics: &str) -> Result<i64, CompileError> {
    if physics.chars().count() > 4 {
        return Err(CompileError::overflow("sii.phys_port", physics));
    }
    Ok(physics
        .chars()
        .enumerate()
        .map(|(i, port)| {
            let code = match port {
                'Y' => 1,
                'K' => 3,
                _ => 0,
            };
            code << (i * 4)
        })
        .sum())
}

fn process_data_bytes(dictionary: &Dictionary, direction: PdoDirection) -> Result<i64, CompileError> {
    let bits: u32 = dictionary
        .mapped_subobjects(direction)?
        .iter()
        .map(|so| so.pdo_bitsize())
        .sum();
    Ok(i64::from(bits.div_ceil(8)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phys_port_nibbles() {
        assert_eq!(phys_port("YY").unwrap(), 0x11);
        assert_eq!(phys_port("KKYY").unwrap(), 0x1133);
        assert_eq!(phys_port("Y-K").unwrap(), 0x301);
        assert!(phys_port("YYYYY").is_err());
    }
}
