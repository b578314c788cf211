//! # coedsl: EtherCAT CoE object dictionary compiler
//!
//! A DSL for describing the CoE object dictionary of an EtherCAT slave once, with
//! a PEST grammar, compiled into:
//!
//! - a [`Dictionary`] of variables, arrays and records with their sub-objects,
//! - a [`Settings`] mapping of device configuration keys,
//! - a byte-exact SII EEPROM image ([`sii`]),
//! - a context tree for C source templates ([`context`]), including the PDO
//!   pack/unpack code synthesized by [`pdo`].
//!
//! ## DSL structure
//!
//! - **Assignments**: `NAME = value;` set configuration keys and constants
//! - **Variables**: `TYPE [access] name [@index] [= default] ["description"];`
//! - **Arrays**: `TYPE [access] name[size] [@index] = { values or patterns };`
//! - **Records**: `record [access] name [@index] ["description"] { fields };`
//! - **make**: `make generator [args];` runs a generator after compilation
//!
//! Expressions: integers, reals, strings, `name` (default value), `&name`
//! (packed PDO mapping reference), `$name` (object index). Initializer lists
//! accept shell globs (`&inputs.*`), expanded in ascending value order.
//! Symbols must be declared before use.
//!
//! ## Example DSL
//!
//! ```text
//! VENDOR_ID = 0x0000ABCD;
//! record read tx_pdo_mapping inputs @0x6000 "Inputs" {
//!     BOOL b0 "Bit 0";
//!     PAD7 gap;
//!     UINT count;
//! };
//! UDINT read tx_map[] @0x1A00 = { &inputs.* };
//! UINT read tx_assign[1] @0x1C13 = { $tx_map };
//! make settings;
//! make sii eeprom.bin;
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! let compiled = coedsl::compile("UDINT read device_type @0x1000 = 0x1389;")?;
//! assert_eq!(compiled.world.dictionary.len(), 1);
//! # Ok::<(), coedsl::CompileError>(())
//! ```

pub mod ast;
pub mod context;
pub mod dictionary;
pub mod dump;
pub mod error;
pub mod generator;
pub mod parser;
pub mod pdo;
pub mod resolve;
pub mod settings;
pub mod sii;
pub mod types;
pub mod value;

pub use dictionary::{Access, Dictionary, Object, ObjectCode, PdoDirection, SubObject};
pub use error::{CompileError, Location};
pub use parser::parse;
pub use resolve::{compile, resolve, Compiled, Entity, MakeDirective, World};
pub use settings::Settings;
pub use types::BasicType;
pub use value::Value;
