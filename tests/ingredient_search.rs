use foodgram_api::{models::Ingredient, services::ingredient_service::rank_by_name};
use proptest::prelude::*;
use uuid::Uuid;

fn ingredient(name: &str) -> Ingredient {
    Ingredient {
        id: Uuid::new_v4(),
        name: name.to_string(),
        measurement_unit: "g".to_string(),
    }
}

fn names(items: &[Ingredient]) -> Vec<&str> {
    items.iter().map(|i| i.name.as_str()).collect()
}

#[test]
fn substring_matches_follow_prefix_matches() {
    let all = vec![
        ingredient("Apple pie filling"),
        ingredient("Pineapple"),
        ingredient("Grape"),
    ];
    let ranked = rank_by_name("pp", all);
    assert_eq!(names(&ranked), vec!["Apple pie filling", "Pineapple"]);
}

#[test]
fn prefix_group_comes_first_even_when_listed_later() {
    let all = vec![
        ingredient("Green apple"),
        ingredient("Apple"),
        ingredient("Apple juice"),
        ingredient("Pear"),
    ];
    let ranked = rank_by_name("apple", all);
    assert_eq!(names(&ranked), vec!["Apple", "Apple juice", "Green apple"]);
}

#[test]
fn empty_query_returns_everything_in_order() {
    let all = vec![ingredient("b"), ingredient("a"), ingredient("c")];
    let ranked = rank_by_name("", all.clone());
    assert_eq!(ranked, all);
}

#[test]
fn matching_ignores_case_for_cyrillic_names() {
    let all = vec![
        ingredient("абрикосы"),
        ingredient("Сахар"),
        ingredient("ванильный сахар"),
    ];
    let ranked = rank_by_name("САХ", all);
    assert_eq!(names(&ranked), vec!["Сахар", "ванильный сахар"]);
}

#[test]
fn no_match_yields_empty_list() {
    let all = vec![ingredient("Salt"), ingredient("Pepper")];
    assert!(rank_by_name("xyz", all).is_empty());
}

proptest! {
    #[test]
    fn ranked_results_are_unique_matching_and_prefix_first(
        raw in proptest::collection::vec("[a-cA-C]{0,5}", 0..20),
        query in "[a-c]{1,2}",
    ) {
        let all: Vec<Ingredient> = raw.iter().map(|n| ingredient(n)).collect();
        let ranked = rank_by_name(&query, all.clone());

        let mut ids: Vec<Uuid> = ranked.iter().map(|i| i.id).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), ranked.len());

        for item in &ranked {
            prop_assert!(item.name.to_lowercase().contains(&query));
        }

        let expected = all
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&query))
            .count();
        prop_assert_eq!(ranked.len(), expected);

        let first_non_prefix = ranked
            .iter()
            .position(|i| !i.name.to_lowercase().starts_with(&query))
            .unwrap_or(ranked.len());
        for item in &ranked[first_non_prefix..] {
            prop_assert!(!item.name.to_lowercase().starts_with(&query));
        }
    }
}
