//! Unique, collision-free entity-name generation (spec.md §4.5 `EntityNamer`).

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityNamerStrategy {
    Handle,
    LayerHandle,
    BlockName,
    LayerIndex,
}

impl Default for EntityNamerStrategy {
    fn default() -> Self {
        EntityNamerStrategy::LayerIndex
    }
}

/// Generate a unique name for a freshly-decoded entity and reserve it in
/// `existing`. `handle`/`block_name` are source-format hints which may be
/// absent; `layer_index` and `global_index` are always available counters
/// maintained by the calling parser.
#[allow(clippy::too_many_arguments)]
pub fn generate(
    strategy: EntityNamerStrategy,
    layer: &str,
    entity_type: &str,
    handle: Option<&str>,
    layer_index: u32,
    global_index: u32,
    existing: &mut HashSet<String>,
    block_name: Option<&str>,
) -> String {
    let base = match strategy {
        EntityNamerStrategy::Handle => match handle {
            Some(h) => format!("{}_{h}", entity_type.to_uppercase()),
            None => format!("{entity_type}_{global_index:05}"),
        },
        EntityNamerStrategy::LayerHandle => match handle {
            Some(h) => format!("{layer}_{h}"),
            None => format!("{layer}_{entity_type}_{layer_index:04}"),
        },
        EntityNamerStrategy::BlockName => match block_name {
            Some(b) => b.to_string(),
            None => format!("{layer}_{entity_type}_{layer_index:04}"),
        },
        EntityNamerStrategy::LayerIndex => format!("{layer}_{entity_type}_{layer_index:04}"),
    };

    let mut name = base.clone();
    let mut suffix = 0u32;
    while existing.contains(&name) {
        suffix += 1;
        name = format!("{base}_{suffix}");
    }
    if suffix > 0 {
        tracing::debug!(%base, %name, "entity name collision resolved with suffix");
    }
    existing.insert(name.clone());
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_strategy_uses_handle_when_present() {
        let mut existing = HashSet::new();
        let name = generate(EntityNamerStrategy::Handle, "L1", "line", Some("2A"), 0, 5, &mut existing, None);
        assert_eq!(name, "LINE_2A");
    }

    #[test]
    fn handle_strategy_falls_back_to_global_index() {
        let mut existing = HashSet::new();
        let name = generate(EntityNamerStrategy::Handle, "L1", "line", None, 0, 7, &mut existing, None);
        assert_eq!(name, "line_00007");
    }

    #[test]
    fn layer_index_default_format() {
        let mut existing = HashSet::new();
        let name = generate(EntityNamerStrategy::LayerIndex, "Bench1", "point", None, 3, 0, &mut existing, None);
        assert_eq!(name, "Bench1_point_0003");
    }

    #[test]
    fn block_name_strategy_prefers_block_name() {
        let mut existing = HashSet::new();
        let name = generate(EntityNamerStrategy::BlockName, "L1", "poly", None, 0, 0, &mut existing, Some("MyBlock"));
        assert_eq!(name, "MyBlock");
    }

    /// Property 6 — uniqueness over a shared existing-set.
    #[test]
    fn repeated_calls_stay_unique_and_legal() {
        let mut existing = HashSet::new();
        let mut names = Vec::new();
        for _ in 0..20 {
            names.push(generate(EntityNamerStrategy::LayerIndex, "L", "point", None, 1, 0, &mut existing, None));
        }
        let unique: HashSet<_> = names.iter().cloned().collect();
        assert_eq!(unique.len(), names.len());
        for n in &names {
            assert!(n.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }
}
