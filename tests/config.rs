use foodgram_api::config::RecipeLimits;

#[test]
fn default_limits_are_one() {
    let limits = RecipeLimits::default();
    assert_eq!(limits.min_cooking_time, 1);
    assert_eq!(limits.min_ingredient_amount, 1);
}

#[test]
fn limits_below_schema_floor_are_rejected() {
    let err = RecipeLimits::new(1, 0).unwrap_err();
    assert!(err.to_string().contains("MIN_INGREDIENT_AMOUNT"), "{err}");

    let err = RecipeLimits::new(0, 1).unwrap_err();
    assert!(err.to_string().contains("MIN_COOKING_TIME"), "{err}");
}

#[test]
fn raised_limits_are_accepted() {
    let limits = RecipeLimits::new(5, 10).expect("valid limits");
    assert_eq!(limits.min_cooking_time, 5);
    assert_eq!(limits.min_ingredient_amount, 10);
}
