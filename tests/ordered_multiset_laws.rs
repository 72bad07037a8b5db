//! Property-based tests for OrderedMultiset.
//!
//! These tests check the red-black invariants after every mutation and
//! compare the multiset against a sorted `Vec` model.

use ordtree::multiset::OrderedMultiset;
use ordtree::tree::Arena;
use proptest::prelude::*;

// =============================================================================
// Strategies for Generating Test Data
// =============================================================================

/// Keys from a narrow domain, so that duplicates are frequent.
fn keys(max_size: usize) -> impl Strategy<Value = Vec<i16>> {
    prop::collection::vec(-20_i16..20, 0..max_size)
}

#[derive(Debug, Clone)]
enum Operation {
    Insert(i16),
    InsertAtEnd(i16),
    EraseFirstOf(i16),
    RemoveAll(i16),
    PopFirst,
    PopLast,
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => (-20_i16..20).prop_map(Operation::Insert),
        1 => (-20_i16..20).prop_map(Operation::InsertAtEnd),
        3 => (-20_i16..20).prop_map(Operation::EraseFirstOf),
        1 => (-20_i16..20).prop_map(Operation::RemoveAll),
        1 => Just(Operation::PopFirst),
        1 => Just(Operation::PopLast),
    ]
}

fn sorted(mut model: Vec<i16>) -> Vec<i16> {
    model.sort_unstable();
    model
}

// =============================================================================
// Invariant Laws
// =============================================================================

proptest! {
    /// Law: every mutation leaves a valid red-black tree whose in-order
    /// sequence equals the sorted model.
    #[test]
    fn prop_mutations_preserve_invariants(operations in prop::collection::vec(operation(), 0..120)) {
        let mut bag: OrderedMultiset<i16> = OrderedMultiset::new();
        let mut model: Vec<i16> = Vec::new();

        for operation in operations {
            match operation {
                Operation::Insert(key) => {
                    bag.insert(key).unwrap();
                    model.push(key);
                }
                Operation::InsertAtEnd(key) => {
                    let end = bag.end();
                    bag.insert_with_hint(end, key).unwrap();
                    model.push(key);
                }
                Operation::EraseFirstOf(key) => {
                    let cursor = bag.find(&key);
                    if let Some(position) = model.iter().position(|&existing| existing == key) {
                        bag.erase(cursor).unwrap();
                        model.swap_remove(position);
                    } else {
                        prop_assert!(cursor.is_end());
                    }
                }
                Operation::RemoveAll(key) => {
                    let expected = model.iter().filter(|&&existing| existing == key).count();
                    prop_assert_eq!(bag.remove(&key), expected);
                    model.retain(|&existing| existing != key);
                }
                Operation::PopFirst => {
                    let model_sorted = sorted(model.clone());
                    prop_assert_eq!(bag.pop_first(), model_sorted.first().copied());
                    if let Some(smallest) = model_sorted.first()
                        && let Some(position) = model.iter().position(|existing| existing == smallest)
                    {
                        model.swap_remove(position);
                    }
                }
                Operation::PopLast => {
                    let model_sorted = sorted(model.clone());
                    prop_assert_eq!(bag.pop_last(), model_sorted.last().copied());
                    if let Some(largest) = model_sorted.last()
                        && let Some(position) = model.iter().position(|existing| existing == largest)
                    {
                        model.swap_remove(position);
                    }
                }
            }

            prop_assert!(bag.check_invariants().is_ok());
            prop_assert_eq!(bag.len(), model.len());
        }

        let contents: Vec<i16> = bag.iter().copied().collect();
        prop_assert_eq!(contents, sorted(model));
    }

    /// Law: the height of a tree with n elements never exceeds 2 * log2(n + 1).
    #[test]
    fn prop_height_is_logarithmic(input in keys(300)) {
        let bag: OrderedMultiset<i16> = input.iter().copied().collect();
        let bound = 2.0 * ((input.len() + 1) as f64).log2();
        prop_assert!(bag.as_tree().height() as f64 <= bound);
    }
}

// =============================================================================
// Ordering Laws
// =============================================================================

proptest! {
    /// Law: iteration yields a non-decreasing sequence, forwards and
    /// backwards.
    #[test]
    fn prop_iteration_is_sorted(input in keys(100)) {
        let bag: OrderedMultiset<i16> = input.into_iter().collect();
        let forward: Vec<i16> = bag.iter().copied().collect();
        prop_assert!(forward.windows(2).all(|pair| pair[0] <= pair[1]));

        let mut backward: Vec<i16> = bag.iter().rev().copied().collect();
        backward.reverse();
        prop_assert_eq!(forward, backward);
    }

    /// Law: count(k) equals the number of times k was inserted, and the
    /// bounds bracket exactly that run.
    #[test]
    fn prop_count_matches_model(input in keys(100), needle in -22_i16..22) {
        let bag: OrderedMultiset<i16> = input.iter().copied().collect();
        let expected = input.iter().filter(|&&key| key == needle).count();
        prop_assert_eq!(bag.count(&needle), expected);

        let (first, last) = bag.equal_range(&needle);
        let run = bag.iter_between(first, last).unwrap().count();
        prop_assert_eq!(run, expected);
        prop_assert_eq!(bag.contains(&needle), expected > 0);
    }

    /// Law: lower_bound is the first element >= k and upper_bound the first
    /// element > k.
    #[test]
    fn prop_bounds_match_model(input in keys(100), needle in -22_i16..22) {
        let bag: OrderedMultiset<i16> = input.iter().copied().collect();
        let model = sorted(input);

        let lower = model.iter().find(|&&key| key >= needle);
        let upper = model.iter().find(|&&key| key > needle);
        prop_assert_eq!(bag.get(bag.lower_bound(&needle)).ok(), lower);
        prop_assert_eq!(bag.get(bag.upper_bound(&needle)).ok(), upper);
    }

    /// Law: range(a..b) yields exactly the model elements in [a, b).
    #[test]
    fn prop_range_matches_model(input in keys(100), start in -22_i16..22, end in -22_i16..22) {
        let bag: OrderedMultiset<i16> = input.iter().copied().collect();
        let expected: Vec<i16> = sorted(input)
            .into_iter()
            .filter(|&key| start <= key && key < end)
            .collect();
        let actual: Vec<i16> = bag.range(start..end).copied().collect();
        prop_assert_eq!(actual, expected);
    }
}

// =============================================================================
// Round-Trip and Identity Laws
// =============================================================================

proptest! {
    /// Law: inserting n keys and erasing each once leaves an empty multiset.
    #[test]
    fn prop_round_trip_to_empty(input in keys(80)) {
        let mut bag: OrderedMultiset<i16> = input.iter().copied().collect();
        for key in &input {
            let cursor = bag.find(key);
            bag.erase(cursor).unwrap();
            prop_assert!(bag.check_invariants().is_ok());
        }
        prop_assert!(bag.is_empty());
        prop_assert!(bag.begin().is_end());
    }

    /// Law: equal multisets compare equal regardless of insertion order.
    #[test]
    fn prop_equality_ignores_insertion_order(input in keys(60)) {
        let forward: OrderedMultiset<i16> = input.iter().copied().collect();
        let backward: OrderedMultiset<i16> = input.iter().rev().copied().collect();
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward.cmp(&backward), std::cmp::Ordering::Equal);
    }

    /// Law: multiset order agrees with lexicographic order of sorted vectors.
    #[test]
    fn prop_ordering_is_lexicographic(left in keys(20), right in keys(20)) {
        let left_bag: OrderedMultiset<i16> = left.iter().copied().collect();
        let right_bag: OrderedMultiset<i16> = right.iter().copied().collect();
        prop_assert_eq!(left_bag.cmp(&right_bag), sorted(left).cmp(&sorted(right)));
    }

    /// Law: a cursor keeps naming its element while other elements come and
    /// go.
    #[test]
    fn prop_cursor_survives_other_mutations(input in keys(60), anchor in -20_i16..20) {
        let mut bag: OrderedMultiset<i16> = OrderedMultiset::new();
        let cursor = bag.insert(anchor).unwrap();
        for key in &input {
            bag.insert(*key).unwrap();
        }
        for key in input.iter().step_by(2) {
            let victim = bag.find(key);
            if victim != cursor {
                bag.erase(victim).unwrap();
            }
        }
        prop_assert_eq!(bag.get(cursor), Ok(&anchor));
    }

    /// Law: a refused allocation changes nothing.
    #[test]
    fn prop_allocation_failure_is_atomic(input in keys(40), extra in -20_i16..20) {
        let limit = input.len();
        let mut bag = OrderedMultiset::with_allocator(Arena::bounded(limit));
        bag.insert_iter(input.iter().copied()).unwrap();
        let before: Vec<i16> = bag.iter().copied().collect();

        prop_assert!(bag.insert(extra).unwrap_err().is_allocation_failure());
        let after: Vec<i16> = bag.iter().copied().collect();
        prop_assert_eq!(before, after);
        prop_assert!(bag.check_invariants().is_ok());
    }
}
