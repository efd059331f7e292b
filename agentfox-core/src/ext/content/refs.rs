//! Reference map: snapshot references to page element markers.
//!
//! Every snapshot resets the map and assigns `e0`, `e1`, ... in depth-first
//! traversal order to interactive nodes. A reference resolves to the marker
//! value the capture walker stamped onto the element
//! (`data-agentfox-id="<n>"`); action handlers look the element up by that
//! marker and report staleness when it is gone.

use indexmap::IndexMap;

/// Attribute the capture walker stamps onto every recorded element.
pub const MARKER_ATTR: &str = "data-agentfox-id";

#[derive(Debug, Default)]
pub struct RefMap {
    map: IndexMap<String, u64>,
    next: usize,
}

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all references; called at the start of every tree build.
    pub fn reset(&mut self) {
        self.map.clear();
        self.next = 0;
    }

    /// Assign the next reference to the given marker value.
    pub fn assign(&mut self, marker: u64) -> String {
        let ref_id = format!("e{}", self.next);
        self.next += 1;
        self.map.insert(ref_id.clone(), marker);
        ref_id
    }

    /// Marker value behind a reference, if the reference is known.
    pub fn resolve(&self, ref_id: &str) -> Option<u64> {
        self.map.get(ref_id).copied()
    }

    /// Drop a reference whose element turned out to be gone.
    pub fn remove(&mut self, ref_id: &str) {
        self.map.shift_remove(ref_id);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_zero_based_depth_first_labels() {
        let mut refs = RefMap::new();
        assert_eq!(refs.assign(11), "e0");
        assert_eq!(refs.assign(17), "e1");
        assert_eq!(refs.resolve("e0"), Some(11));
        assert_eq!(refs.resolve("e1"), Some(17));
        assert_eq!(refs.resolve("e2"), None);
    }

    #[test]
    fn reset_drops_every_prior_reference() {
        let mut refs = RefMap::new();
        refs.assign(1);
        refs.assign(2);
        refs.reset();
        assert!(refs.is_empty());
        assert_eq!(refs.resolve("e0"), None);
        // Numbering restarts from zero after a reset.
        assert_eq!(refs.assign(3), "e0");
    }

    #[test]
    fn remove_evicts_single_entry() {
        let mut refs = RefMap::new();
        refs.assign(1);
        refs.assign(2);
        refs.remove("e0");
        assert_eq!(refs.resolve("e0"), None);
        assert_eq!(refs.resolve("e1"), Some(2));
        assert_eq!(refs.len(), 1);
    }
}
