//! # Live reconfiguration
//!
//! Holds the live-tunable parameters of a module as a single versioned
//! snapshot. Readers take the current snapshot once per cycle and so always
//! see a consistent set of values. Writers replace the snapshot wholesale, a
//! snapshot is never modified once published.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, RwLock};

use log::{info, warn};
use serde::Serialize;
use util::maths::in_range;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Declaration of a live parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamDef {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
}

/// A snapshot of the parameters with the number of updates applied before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Store of the current parameter snapshot, shared between the thread applying
/// updates and the threads reading the values.
pub struct ParamStore<T> {
    current: RwLock<Arc<Versioned<T>>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconfError {
    #[error("There is no parameter called {0:?}")]
    UnknownParam(String),

    #[error("{name} = {value} is outside of the allowed range [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("The parameter store lock was poisoned")]
    Poisoned,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A set of named scalar parameters which can be changed at runtime.
pub trait Reconfigurable: Clone + Send + Sync {
    /// The parameters which can be changed and their allowed ranges.
    fn param_defs() -> &'static [ParamDef];

    /// Get the current value of a parameter.
    fn get(&self, name: &str) -> Option<f64>;

    /// Set a parameter. Returns false if there's no parameter with that name.
    fn set(&mut self, name: &str, value: f64) -> bool;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T: Reconfigurable> ParamStore<T> {
    /// Create a new store, checking the initial values against their ranges.
    pub fn new(initial: T) -> Result<Self, ReconfError> {
        for def in T::param_defs() {
            if let Some(v) = initial.get(def.name) {
                check_range(def, v)?;
            }
        }

        Ok(Self {
            current: RwLock::new(Arc::new(Versioned {
                version: 0,
                value: initial,
            })),
        })
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Result<Arc<Versioned<T>>, ReconfError> {
        self.current
            .read()
            .map(|c| c.clone())
            .map_err(|_| ReconfError::Poisoned)
    }

    /// Get the current value of a parameter by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.snapshot().ok().and_then(|s| s.value.get(name))
    }

    /// Set a parameter, publishing a new snapshot.
    ///
    /// Returns the version of the new snapshot.
    pub fn set(&self, name: &str, value: f64) -> Result<u64, ReconfError> {
        let def = match T::param_defs().iter().find(|d| d.name == name) {
            Some(d) => d,
            None => {
                warn!("Rejected update of unknown parameter {:?}", name);
                return Err(ReconfError::UnknownParam(name.to_string()));
            }
        };

        if let Err(e) = check_range(def, value) {
            warn!("Rejected parameter update: {}", e);
            return Err(e);
        }

        let mut current = self.current.write().map_err(|_| ReconfError::Poisoned)?;

        let mut value_set = current.value.clone();
        if !value_set.set(name, value) {
            return Err(ReconfError::UnknownParam(name.to_string()));
        }

        let version = current.version + 1;
        *current = Arc::new(Versioned {
            version,
            value: value_set,
        });

        info!("Parameter {} set to {} (version {})", name, value, version);

        Ok(version)
    }
}

fn check_range(def: &ParamDef, value: f64) -> Result<(), ReconfError> {
    if value.is_finite() && in_range(value, def.min, def.max) {
        Ok(())
    } else {
        Err(ReconfError::OutOfRange {
            name: def.name.to_string(),
            value,
            min: def.min,
            max: def.max,
        })
    }
}
