use std::cmp::Ordering;

use treeline_ordered_map::OrderedMap;

fn map_of(keys: &[i32]) -> OrderedMap<i32, String> {
    let mut map = OrderedMap::new();
    for &k in keys {
        map = map.insert(k, format!("v{k}"));
    }
    map
}

#[test]
fn insert_get_and_replace() {
    let map = map_of(&[3, 1, 2]);
    assert_eq!(map.len(), 3);
    assert_eq!(map.get(&2), Some(&"v2".to_string()));
    assert_eq!(map.get(&4), None);

    let replaced = map.insert(2, "replaced".to_string());
    assert_eq!(replaced.len(), 3);
    assert_eq!(replaced.get(&2), Some(&"replaced".to_string()));
}

#[test]
fn removal_leaves_the_rest_intact() {
    let map = map_of(&[5, 1, 9, 3, 7]);
    let removed = map.remove(&3);
    assert_eq!(removed.len(), 4);
    assert!(!removed.contains_key(&3));
    for k in [5, 1, 9, 7] {
        assert!(removed.contains_key(&k));
    }
    // Removing an absent key is a no-op.
    assert_eq!(removed.remove(&100).len(), 4);
}

#[test]
fn old_versions_survive_mutation() {
    let base = map_of(&[1, 2, 3]);
    let grown = base.insert(4, "v4".to_string());
    let shrunk = base.remove(&1);

    assert_eq!(base.len(), 3);
    assert!(base.contains_key(&1));
    assert!(!base.contains_key(&4));
    assert_eq!(grown.len(), 4);
    assert_eq!(shrunk.len(), 2);
}

#[test]
fn iteration_is_sorted_both_ways() {
    let map = map_of(&[8, 2, 6, 4, 10]);
    let forward: Vec<i32> = map.iter().map(|(k, _)| *k).collect();
    assert_eq!(forward, vec![2, 4, 6, 8, 10]);
    let backward: Vec<i32> = map.iter_reverse().map(|(k, _)| *k).collect();
    assert_eq!(backward, vec![10, 8, 6, 4, 2]);
}

#[test]
fn bounded_iteration_starts_at_the_nearest_key() {
    let map = map_of(&[1, 3, 5, 7]);
    let from_four: Vec<i32> = map.iter_from(&4).map(|(k, _)| *k).collect();
    assert_eq!(from_four, vec![5, 7]);
    let back_from_four: Vec<i32> = map.iter_reverse_from(&4).map(|(k, _)| *k).collect();
    assert_eq!(back_from_four, vec![3, 1]);
    // Exact starts are inclusive.
    let from_five: Vec<i32> = map.iter_from(&5).map(|(k, _)| *k).collect();
    assert_eq!(from_five, vec![5, 7]);
}

#[test]
fn predecessor_walks_the_ordering() {
    let map = map_of(&[10, 20, 30, 40]);
    assert_eq!(map.predecessor_key(&10), None);
    assert_eq!(map.predecessor_key(&20), Some(&10));
    assert_eq!(map.predecessor_key(&40), Some(&30));
    assert_eq!(map.min_key(), Some(&10));
    assert_eq!(map.max_key(), Some(&40));
}

#[test]
fn custom_comparators_drive_the_order() {
    fn reversed(a: &i32, b: &i32) -> Ordering {
        b.cmp(a)
    }
    let mut map: OrderedMap<i32, ()> = OrderedMap::with_comparator(reversed);
    for k in [1, 2, 3] {
        map = map.insert(k, ());
    }
    let keys: Vec<i32> = map.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![3, 2, 1]);
    assert_eq!(map.predecessor_key(&2), Some(&3));
}

#[test]
fn traversal_can_abort_early() {
    let map = map_of(&[1, 2, 3, 4]);
    let mut seen = Vec::new();
    let aborted = map.inorder_traversal(&mut |k, _| {
        seen.push(*k);
        *k == 2
    });
    assert!(aborted);
    assert_eq!(seen, vec![1, 2]);
}

#[test]
fn large_maps_stay_consistent() {
    let mut map = OrderedMap::new();
    for k in (0..200).rev() {
        map = map.insert(k, k * 2);
    }
    assert_eq!(map.len(), 200);
    let keys: Vec<i32> = map.iter().map(|(k, _)| *k).collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));

    for k in (0..200).step_by(2) {
        map = map.remove(&k);
    }
    assert_eq!(map.len(), 100);
    assert!(map.iter().all(|(k, v)| k % 2 == 1 && *v == k * 2));
}
