//! Recorded variable names and their dense indices.

use core::fmt;

use hashbrown::HashMap;

/// Which end of a pathway a projected synaptic variable is viewed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathSide {
    /// `r.` names: the selected unit receives; the queried layer sends.
    Recv,
    /// `s.` names: the selected unit sends; the queried layer receives.
    Send,
}

/// A variable as requested by a viewer.
///
/// Unit variables live in the ring-indexed unit store. Synaptic projections
/// are resolved against the latest synapse record relative to the selected
/// unit, so they carry no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarRef<'a> {
    Unit(&'a str),
    Synaptic { name: &'a str, side: PathSide },
}

impl<'a> VarRef<'a> {
    /// Resolve the viewer's `r.Name` / `s.Name` convention once.
    pub fn parse(name: &'a str) -> Self {
        if let Some(rest) = name.strip_prefix("r.") {
            Self::Synaptic {
                name: rest,
                side: PathSide::Recv,
            }
        } else if let Some(rest) = name.strip_prefix("s.") {
            Self::Synaptic {
                name: rest,
                side: PathSide::Send,
            }
        } else {
            Self::Unit(name)
        }
    }

    pub fn name(&self) -> &'a str {
        match *self {
            Self::Unit(name) => name,
            Self::Synaptic { name, .. } => name,
        }
    }
}

impl fmt::Display for VarRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(name) => f.write_str(name),
            Self::Synaptic {
                name,
                side: PathSide::Recv,
            } => write!(f, "r.{name}"),
            Self::Synaptic {
                name,
                side: PathSide::Send,
            } => write!(f, "s.{name}"),
        }
    }
}

/// An ordered name list with a name -> index map.
#[derive(Debug, Clone, Default)]
pub struct VarList {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl VarList {
    pub fn from_names(names: &[String]) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self {
            names: names.to_vec(),
            index,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn matches(&self, names: &[String]) -> bool {
        self.names.as_slice() == names
    }
}

/// What a [`VariableCatalog::sync`] call rebuilt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogChange {
    pub units: bool,
    pub synapses: bool,
}

/// Unit and synaptic variables currently being recorded.
#[derive(Debug, Clone, Default)]
pub struct VariableCatalog {
    units: VarList,
    synapses: VarList,
}

impl VariableCatalog {
    pub fn new(unit_vars: &[String], syn_vars: &[String]) -> Self {
        Self {
            units: VarList::from_names(unit_vars),
            synapses: VarList::from_names(syn_vars),
        }
    }

    /// Rebuild whichever list differs from the network's current names.
    /// A rebuilt unit list invalidates all unit history.
    pub fn sync(&mut self, unit_vars: &[String], syn_vars: &[String]) -> CatalogChange {
        let mut change = CatalogChange::default();
        if !self.units.matches(unit_vars) {
            self.units = VarList::from_names(unit_vars);
            change.units = true;
        }
        if !self.synapses.matches(syn_vars) {
            self.synapses = VarList::from_names(syn_vars);
            change.synapses = true;
        }
        change
    }

    pub fn units(&self) -> &VarList {
        &self.units
    }

    pub fn synapses(&self) -> &VarList {
        &self.synapses
    }
}
