//! The three typed symbol stores: texts, routines, tables.

pub mod tables;

use parking_lot::Mutex;
use std::collections::BTreeMap;
use tables::Node;

/// Root container for all three stores. Each store is individually locked;
/// handlers only ever hold one store lock at a time and never call back into
/// `Context::execute` while holding it, so these locks never nest with the
/// dispatch gate in a way that could deadlock.
pub struct Stores {
    /// `texts -> sub -> key -> scalar`.
    pub texts: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    /// `routines -> name -> ordered steps`.
    pub routines: Mutex<BTreeMap<String, Vec<String>>>,
    /// The single tree root for `#`.
    pub tables: Mutex<Node>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            texts: Mutex::new(BTreeMap::new()),
            routines: Mutex::new(BTreeMap::new()),
            tables: Mutex::new(Node::new_interior()),
        }
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new()
    }
}
