// tests/placement.rs

use hostdag::engine::{DataLocation, FirstPrerequisite, MajorityData, PlacementHints};
use hostdag::engine::placement::for_strategy;
use hostdag::types::PlacementStrategy;

#[test]
fn majority_keeps_hosts_above_half_of_best() {
    let inputs = [
        DataLocation::new(["h1"], 10),
        DataLocation::new(["h2"], 4),
        DataLocation::new(["h3", "h1"], 2),
        DataLocation::new(["h3"], 5),
    ];
    // h1 = 12, h3 = 7, h2 = 4; threshold is > 6.
    assert_eq!(MajorityData.derive(&inputs), vec!["h1", "h3"]);
}

#[test]
fn majority_excludes_exactly_half_and_breaks_ties_by_name() {
    let inputs = [
        DataLocation::new(["b"], 4),
        DataLocation::new(["a"], 4),
        DataLocation::new(["c"], 2),
    ];
    assert_eq!(MajorityData.derive(&inputs), vec!["a", "b"]);
}

#[test]
fn majority_saturates_on_huge_sizes() {
    let half = 1u64 << 63;
    let inputs = [
        DataLocation::new(["h1"], half),
        DataLocation::new(["h1", "h2"], half),
        DataLocation::new(["h3"], half >> 1),
    ];
    // h1 saturates at u64::MAX; h2 sits just above half of it.
    assert_eq!(MajorityData.derive(&inputs), vec!["h1", "h2"]);
}

#[test]
fn majority_without_locations_is_empty() {
    assert!(MajorityData.derive(&[]).is_empty());
    let unknown = [DataLocation::new(Vec::<String>::new(), 10)];
    assert!(MajorityData.derive(&unknown).is_empty());
}

#[test]
fn first_prerequisite_uses_first_input_only() {
    let inputs = [
        DataLocation::new(["h2", "h3"], 1),
        DataLocation::new(["h1"], 100),
    ];
    assert_eq!(FirstPrerequisite.derive(&inputs), vec!["h2", "h3"]);
    assert!(FirstPrerequisite.derive(&[]).is_empty());
}

#[test]
fn strategy_selects_implementation() {
    let inputs = [DataLocation::new(["h2"], 1), DataLocation::new(["h1"], 100)];
    assert_eq!(for_strategy(PlacementStrategy::Majority).derive(&inputs), vec!["h1"]);
    assert_eq!(
        for_strategy(PlacementStrategy::FirstPrerequisite).derive(&inputs),
        vec!["h2"]
    );
}
