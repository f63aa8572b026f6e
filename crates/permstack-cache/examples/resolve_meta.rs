//! Meta stack resolution example.
//!
//! Builds a small group hierarchy in memory, resolves a user's prefix with a
//! track-aware stack and shows how recalculation picks up a promotion.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=permstack_cache=debug cargo run --example resolve_meta
//! ```

use parking_lot::RwLock;
use permstack_cache::prelude::*;
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// One group: own prefixes and parents in inheritance order
struct Group {
    prefixes: Vec<(i32, &'static str)>,
    parents: Vec<&'static str>,
}

/// A user resolved against a shared group table
struct User {
    id: HolderIdentifier,
    groups: RwLock<Vec<&'static str>>,
    table: Arc<HashMap<&'static str, Group>>,
}

impl User {
    /// Pre-order walk of the user's groups, skipping ones already visited
    fn walk(&self, group: &'static str, seen: &mut Vec<&'static str>, out: &mut Vec<ChatMetaNode>) {
        if seen.contains(&group) {
            return;
        }
        seen.push(group);
        let Some(entry) = self.table.get(group) else {
            return;
        };
        for (priority, value) in &entry.prefixes {
            out.push(ChatMetaNode::prefix(*priority, *value).with_origin(HolderIdentifier::group(group)));
        }
        for parent in &entry.parents {
            self.walk(*parent, seen, out);
        }
    }
}

impl HolderResolver for User {
    fn identifier(&self) -> &HolderIdentifier {
        &self.id
    }

    fn resolve_permissions(&self, _: &QueryOptions) -> CacheResult<HashMap<String, bool>> {
        let groups = self.groups.read();
        Ok(groups
            .iter()
            .map(|group| (format!("group.{group}"), true))
            .collect())
    }

    fn resolve_meta(&self, accumulator: &mut MetaAccumulator, _: &QueryOptions) -> CacheResult<()> {
        accumulator.accumulate_chat_meta(&ChatMetaNode::prefix(1, "[Steve]").with_origin(self.id.clone()))?;

        let mut seen = Vec::new();
        let mut nodes = Vec::new();
        for group in self.groups.read().iter() {
            self.walk(*group, &mut seen, &mut nodes);
        }
        for node in &nodes {
            accumulator.accumulate_chat_meta(node)?;
        }
        accumulator.accumulate_node(MetaNode::meta("homes", "3"))?;
        accumulator.accumulate_node(MetaNode::meta("homes", "10"))
    }
}

#[tokio::main]
async fn main() -> CacheResult<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let table = Arc::new(HashMap::from([
        ("default", Group { prefixes: vec![(10, "[Member]")], parents: vec![] }),
        ("vip", Group { prefixes: vec![(60, "[VIP]")], parents: vec!["default"] }),
        ("helper", Group { prefixes: vec![(40, "[Helper]")], parents: vec!["default"] }),
        ("mod", Group { prefixes: vec![(50, "[Mod]")], parents: vec!["helper"] }),
    ]));

    let registry = Arc::new(TrackRegistry::new());
    registry.set_track("staff", ["helper", "mod"]);
    let tracks: Arc<dyn TrackProvider> = registry;

    let config = CacheConfig::from_json(
        r#"{
            "prefix_stack": {
                "elements": ["highest_on_track_staff", "highest_not_on_track_staff", "highest_own"],
                "duplicates": "first-only",
                "middle_spacer": " "
            },
            "meta_value_selectors": { "homes": "highest-number" }
        }"#,
    )?;

    let user = Arc::new(User {
        id: HolderIdentifier::user("steve"),
        groups: RwLock::new(vec!["helper", "vip"]),
        table,
    });
    let manager = Arc::new(CachedDataManager::new(Arc::clone(&user), tracks, config)?);
    let _housekeeper = Housekeeper::for_manager(&manager)?;

    let query = QueryOptions::contextual(ContextSet::of("server", "survival"));
    let meta = manager.meta_data(&query).await?;
    info!(prefix = ?meta.prefix(), homes = ?meta.meta_value("homes"), "resolved");

    // Promote to mod and refresh every cached context
    user.groups.write()[0] = "mod";
    manager.recalculate_meta().try_join().await?;
    manager.recalculate_permissions().try_join().await?;

    let promoted = manager.meta_data(&query).await?;
    info!(before = ?meta.prefix(), after = ?promoted.prefix(), "after promotion");

    let permissions = manager.permission_data(&query).await?;
    info!(is_mod = ?permissions.check_permission("group.mod"), "permission check");

    let stats = manager.stats();
    info!(
        loads = stats.load_count,
        recalculations = stats.recalculation_count,
        hit_rate = stats.hit_rate(),
        "cache stats"
    );
    Ok(())
}
