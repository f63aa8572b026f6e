//! Meta stack resolution through the public API
//!
//! Candidates are streamed in inheritance pre-order the way a holder resolver
//! would produce them, and the formatted stacks are checked end to end.

use permstack_cache::{
    HolderIdentifier, MetaAccumulator,
    node::{ChatMetaNode, ChatMetaType},
    stack::{DuplicateRemoval, MetaStack, MetaStackDefinition, MetaStackElement},
    track::{TrackProvider, TrackRegistry},
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn notch() -> HolderIdentifier {
    HolderIdentifier::user("notch")
}

fn stack(elements: &[&str], duplicates: DuplicateRemoval) -> MetaStackDefinition {
    MetaStackDefinition::parse(elements, duplicates, "", " ", "")
        .unwrap_or_else(|err| panic!("bad test definition: {err}"))
}

fn resolve(definition: MetaStackDefinition, tracks: &Arc<dyn TrackProvider>, nodes: &[ChatMetaNode]) -> Option<String> {
    let mut meta_stack = MetaStack::new(definition, ChatMetaType::Prefix, &notch(), tracks);
    for node in nodes {
        meta_stack.accumulate_to_all(node);
    }
    meta_stack.to_formatted_string()
}

fn staff_tracks() -> Arc<TrackRegistry> {
    let registry = Arc::new(TrackRegistry::new());
    registry.set_track("staff", ["helper", "mod", "admin"]);
    registry
}

#[test]
fn test_highest_own_ignores_inherited_candidates() {
    let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
    let nodes = [
        ChatMetaNode::prefix(100, "[Admin]").with_origin(HolderIdentifier::group("admin")),
        ChatMetaNode::prefix(20, "[Notch]").with_origin(notch()),
        ChatMetaNode::prefix(30, "[Untagged]"),
        ChatMetaNode::prefix(10, "[Old]").with_origin(notch()),
    ];

    assert_eq!(
        resolve(stack(&["highest_own"], DuplicateRemoval::RetainAll), &tracks, &nodes),
        Some("[Notch]".to_string())
    );
    assert_eq!(
        resolve(stack(&["highest_inherited"], DuplicateRemoval::RetainAll), &tracks, &nodes),
        Some("[Admin]".to_string())
    );

    let inherited_only = &nodes[..1];
    assert_eq!(
        resolve(stack(&["highest_own"], DuplicateRemoval::RetainAll), &tracks, inherited_only),
        None
    );
}

#[test]
fn test_track_elements_split_staff_and_donor_prefixes() {
    let registry = staff_tracks();
    let tracks: Arc<dyn TrackProvider> = registry.clone();
    let nodes = [
        ChatMetaNode::prefix(90, "[VIP]").with_origin(HolderIdentifier::group("vip")),
        ChatMetaNode::prefix(50, "[Mod]").with_origin(HolderIdentifier::group("mod")),
        ChatMetaNode::prefix(40, "[Helper]").with_origin(HolderIdentifier::group("helper")),
    ];
    let definition = stack(
        &["highest_on_track_staff", "highest_not_on_track_staff"],
        DuplicateRemoval::FirstOnly,
    );

    assert_eq!(
        resolve(definition.clone(), &tracks, &nodes),
        Some("[Mod] [VIP]".to_string())
    );

    // Membership is read live for every pass
    registry.set_track("staff", ["helper"]);
    assert_eq!(
        resolve(definition.clone(), &tracks, &nodes),
        Some("[Helper] [VIP]".to_string())
    );

    // An unknown track rejects group origins on both sides
    registry.remove_track("staff");
    assert_eq!(resolve(definition.clone(), &tracks, &nodes), None);

    // A node set directly on the holder is never on a track
    let mut with_direct = nodes.to_vec();
    with_direct.push(ChatMetaNode::prefix(10, "[Self]"));
    assert_eq!(
        resolve(definition, &tracks, &with_direct),
        Some("[Self]".to_string())
    );
}

#[test]
fn test_group_scoped_elements() {
    let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
    let nodes = [
        ChatMetaNode::prefix(10, "[Builder]").with_origin(HolderIdentifier::group("builder")),
        ChatMetaNode::prefix(70, "[Admin]").with_origin(HolderIdentifier::group("admin")),
        ChatMetaNode::prefix(5, "[Direct]"),
    ];

    assert_eq!(
        resolve(
            stack(&["highest_from_group_builder", "lowest_not_from_group_builder"], DuplicateRemoval::RetainAll),
            &tracks,
            &nodes
        ),
        Some("[Builder] [Direct]".to_string())
    );
}

#[test]
fn test_duplicate_removal_policies() {
    let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
    let nodes = [
        ChatMetaNode::prefix(100, "[A]").with_origin(notch()),
        ChatMetaNode::prefix(50, "[B]").with_origin(HolderIdentifier::group("b")),
    ];
    let layers = ["highest", "highest_inherited", "highest_own"];

    assert_eq!(
        resolve(stack(&layers, DuplicateRemoval::RetainAll), &tracks, &nodes),
        Some("[A] [B] [A]".to_string())
    );
    assert_eq!(
        resolve(stack(&layers, DuplicateRemoval::FirstOnly), &tracks, &nodes),
        Some("[A] [B]".to_string())
    );
    assert_eq!(
        resolve(stack(&layers, DuplicateRemoval::LastOnly), &tracks, &nodes),
        Some("[B] [A]".to_string())
    );
}

#[test]
fn test_spacers_wrap_the_joined_values() {
    let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
    let definition = MetaStackDefinition::new(
        vec![MetaStackElement::lowest(), MetaStackElement::highest()],
        DuplicateRemoval::RetainAll,
        "<",
        "|",
        ">",
    );
    let nodes = [ChatMetaNode::prefix(1, "a"), ChatMetaNode::prefix(2, "b")];

    assert_eq!(resolve(definition.clone(), &tracks, &nodes), Some("<a|b>".to_string()));
    assert_eq!(resolve(definition, &tracks, &[]), None);
}

#[test]
fn test_empty_definition_is_legal() -> Result<(), Box<dyn std::error::Error>> {
    let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
    let empty = MetaStackDefinition::new(Vec::new(), DuplicateRemoval::RetainAll, "", "", "");
    let mut acc = MetaAccumulator::new(empty.clone(), empty, &notch(), &tracks);
    acc.accumulate_chat_meta(&ChatMetaNode::prefix(1, "[A]"))?;
    acc.complete();

    assert_eq!(acc.formatted(ChatMetaType::Prefix)?, None);
    assert_eq!(acc.prefixes()?.len(), 1);
    Ok(())
}

#[test]
fn test_suffix_nodes_do_not_reach_prefix_stack() {
    let tracks: Arc<dyn TrackProvider> = Arc::new(TrackRegistry::new());
    let nodes = [ChatMetaNode::suffix(100, "!"), ChatMetaNode::prefix(1, "[A]")];
    assert_eq!(
        resolve(stack(&["highest"], DuplicateRemoval::RetainAll), &tracks, &nodes),
        Some("[A]".to_string())
    );
}
