//! Class id to name resolution

use aqua_core::UNKNOWN_LABEL;
use std::collections::HashMap;

/// Names for the detector's numeric class ids
#[derive(Debug, Clone, Default)]
pub struct ClassNames {
    names: HashMap<u32, String>,
}

impl ClassNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table where the position in `names` is the class id
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .enumerate()
            .map(|(id, name)| (id as u32, name.into()))
            .collect();
        Self { names }
    }

    pub fn insert(&mut self, id: u32, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Name for `id`, or [`UNKNOWN_LABEL`] when the id is not in the table
    pub fn resolve(&self, id: u32) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
