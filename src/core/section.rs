//! Flat auxiliary records: sections, libraries, modules, and the opaque
//! extension sideband.
//!
//! These carry no internal graph structure. Vertices reference libraries and
//! modules by index; sections and extension records are standalone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A mapped region of the executable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
    pub address: u64,
    pub size: u64,
    pub flag_r: bool,
    pub flag_w: bool,
    pub flag_x: bool,
}

impl Section {
    pub fn new(address: u64, size: u64, flag_r: bool, flag_w: bool, flag_x: bool) -> Self {
        Self {
            address,
            size,
            flag_r,
            flag_w,
            flag_x,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.flag_x
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.address && address - self.address < self.size
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut perms = String::new();
        perms.push(if self.flag_r { 'r' } else { '-' });
        perms.push(if self.flag_w { 'w' } else { '-' });
        perms.push(if self.flag_x { 'x' } else { '-' });
        write!(f, "{:#x}+{:#x} {}", self.address, self.size, perms)
    }
}

/// A linked library referenced by imported or library vertices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    pub is_static: bool,
    /// Base address for statically linked libraries, when known.
    pub load_address: Option<u64>,
}

/// A module namespace, e.g. a class name on object-oriented targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
}

/// Opaque extension record.
///
/// The payload is carried verbatim, order-preserving, and never interpreted;
/// it exists so producers can attach side data without revising the format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MdIndex {
    pub key: String,
    pub payload: Vec<u8>,
}
