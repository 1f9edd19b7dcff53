//! Take forest: creation, ancestry resolution, status changes.

use narrative_state::index::IndexKind;
use narrative_state::state::{NarrativeState, StateBuilder, TakeForest};
use narrative_state::types::{ErrorKind, Moment, Take, TakeStatus};

// ==================== Helper ====================

fn state_with_moments() -> NarrativeState {
    let mut builder = StateBuilder::with_dimension(8);
    builder.moment("m1", 1.0).moment("m2", 2.0).moment("m3", 3.0);
    builder.build().unwrap()
}

// ==================== Creation ====================

#[test]
fn test_take_ids_start_at_one_and_increase() {
    let mut state = state_with_moments();
    let a = state.add_take(None, None, None).unwrap();
    let b = state.add_take(Some(a), Some("m2".into()), None).unwrap();
    let c = state.add_take(None, None, Some("second root".into())).unwrap();
    assert_eq!((a, b, c), (1, 2, 3));
}

#[test]
fn test_new_takes_are_active() {
    let mut state = state_with_moments();
    let root = state.add_take(None, None, None).unwrap();
    let take = state.takes().get(root).unwrap();
    assert_eq!(take.status, TakeStatus::Active);
    assert!(take.is_root());
}

#[test]
fn test_missing_parent_is_not_found() {
    let mut state = state_with_moments();
    let err = state.add_take(Some(7), None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(state.takes().is_empty());
}

#[test]
fn test_unknown_branch_point_is_not_found() {
    let mut state = state_with_moments();
    let root = state.add_take(None, None, None).unwrap();
    let err = state
        .add_take(Some(root), Some("nowhere".into()), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("nowhere"));
}

// ==================== Ancestry ====================

#[test]
fn test_root_is_its_own_ancestry() {
    let mut state = state_with_moments();
    let root = state.add_take(None, None, None).unwrap();
    let ancestry = state.ancestry(root).unwrap();
    assert_eq!(ancestry.chain(), &[root]);
    assert_eq!(ancestry.root(), root);
    assert!(ancestry.contains(root));
}

#[test]
fn test_ancestry_walks_to_root() {
    let mut state = state_with_moments();
    let t1 = state.add_take(None, None, None).unwrap();
    let t2 = state.add_take(Some(t1), Some("m1".into()), None).unwrap();
    let t3 = state.add_take(Some(t2), Some("m2".into()), None).unwrap();

    let ancestry = state.ancestry(t3).unwrap();
    assert_eq!(ancestry.chain(), &[t3, t2, t1]);
    assert_eq!(ancestry.len(), 3);
    assert_eq!(ancestry.root(), t1);
}

#[test]
fn test_siblings_are_not_ancestors() {
    let mut state = state_with_moments();
    let parent = state.add_take(None, None, None).unwrap();
    let left = state.add_take(Some(parent), Some("m2".into()), None).unwrap();
    let right = state.add_take(Some(parent), Some("m2".into()), None).unwrap();

    let ancestry = state.ancestry(left).unwrap();
    assert!(ancestry.contains(parent));
    assert!(!ancestry.contains(right));

    let parent_ancestry = state.ancestry(parent).unwrap();
    assert!(!parent_ancestry.contains(left));
}

#[test]
fn test_unknown_take_ancestry_is_not_found() {
    let state = state_with_moments();
    let err = state.ancestry(42).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("42"));
    assert!(err.to_string().contains("get_ancestry"));
}

#[test]
fn test_deep_chain_ancestry() {
    let mut state = state_with_moments();
    let mut tip = state.add_take(None, None, None).unwrap();
    for _ in 0..50_000 {
        tip = state.add_take(Some(tip), None, None).unwrap();
    }
    let ancestry = state.ancestry(tip).unwrap();
    assert_eq!(ancestry.len(), 50_001);
    assert_eq!(ancestry.root(), 1);
}

// ==================== Status & listing ====================

#[test]
fn test_set_status() {
    let mut state = state_with_moments();
    let root = state.add_take(None, None, None).unwrap();
    state.set_take_status(root, TakeStatus::Trunk).unwrap();
    assert_eq!(state.takes().get(root).unwrap().status, TakeStatus::Trunk);

    let err = state.set_take_status(99, TakeStatus::Archived).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_status_names() {
    assert_eq!(TakeStatus::from_name("TRUNK"), Some(TakeStatus::Trunk));
    assert_eq!(TakeStatus::from_name("archived"), Some(TakeStatus::Archived));
    assert_eq!(TakeStatus::from_name("deleted"), None);
    assert_eq!(TakeStatus::Active.to_string(), "active");
}

#[test]
fn test_list_and_children() {
    let mut builder = StateBuilder::with_dimension(8);
    builder.moment("m1", 1.0).moment("m2", 2.0);
    let trunk = builder.trunk();
    let a = builder.branch(trunk, "m1");
    builder.notes("the heist goes wrong");
    let b = builder.branch(trunk, "m2");
    let state = builder.build().unwrap();

    assert_eq!(state.takes().children(trunk), vec![a, b]);
    assert!(state.takes().children(a).is_empty());

    let trunks = state.takes().list(Some(TakeStatus::Trunk), None);
    assert_eq!(trunks.len(), 1);
    assert_eq!(trunks[0].id, trunk);

    let at_m1 = state.takes().list(None, Some("m1"));
    assert_eq!(at_m1.len(), 1);
    assert_eq!(at_m1[0].notes.as_deref(), Some("the heist goes wrong"));
}

// ==================== Arena invariants ====================

#[test]
fn test_forest_from_takes_rejects_forward_parent() {
    let takes = vec![
        Take {
            id: 1,
            parent_take_id: Some(2),
            branch_point: None,
            status: TakeStatus::Active,
            notes: None,
            created_at: 0,
        },
        Take {
            id: 2,
            parent_take_id: None,
            branch_point: None,
            status: TakeStatus::Active,
            notes: None,
            created_at: 0,
        },
    ];
    assert!(TakeForest::from_takes(takes).is_err());
}

#[test]
fn test_forest_from_takes_rejects_gaps() {
    let takes = vec![Take {
        id: 3,
        parent_take_id: None,
        branch_point: None,
        status: TakeStatus::Active,
        notes: None,
        created_at: 0,
    }];
    assert!(TakeForest::from_takes(takes).is_err());
}

#[test]
fn test_branch_point_is_informational() {
    // A write in a branch may be tagged with a moment before its branch point.
    let mut state = NarrativeState::new(8, IndexKind::Flat);
    state.add_moment(Moment::new("early", 1.0)).unwrap();
    state.add_moment(Moment::new("late", 5.0)).unwrap();
    let root = state.add_take(None, None, None).unwrap();
    let branch = state.add_take(Some(root), Some("late".into()), None).unwrap();
    let fact = state.add_fact("backstory", "lore", "early").unwrap();
    state
        .add_character(narrative_state::types::Character::new("ann", "Ann"))
        .unwrap();
    state
        .add_knowledge(narrative_state::types::NewKnowledge::new("ann", fact, "early", branch))
        .unwrap();
    assert_eq!(state.knowledge_of("ann").len(), 1);
}
