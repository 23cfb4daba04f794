//! Identifier Generator
//!
//! Deterministic, per-group counters. Element ids and template helper names share
//! one counter map, so generated names depend on compile order.

use std::collections::HashMap;

/// Group used for element ids the library injects into tags.
pub const ELEMENT_ID_GROUP: &str = "weft";

#[derive(Debug, Default)]
pub struct Generator {
    counters: HashMap<String, u64>,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `"{group}_{n}"`, counting from zero per group.
    pub fn next_id(&mut self, group: &str) -> String {
        let counter = self.counters.entry(group.to_string()).or_insert(0);
        let id = format!("{}_{}", group, counter);
        *counter += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_count_independently() {
        let mut generator = Generator::new();
        assert_eq!(generator.next_id("cond"), "cond_0");
        assert_eq!(generator.next_id("cond"), "cond_1");
        assert_eq!(generator.next_id(ELEMENT_ID_GROUP), "weft_0");
        assert_eq!(generator.next_id("cond"), "cond_2");
    }
}
