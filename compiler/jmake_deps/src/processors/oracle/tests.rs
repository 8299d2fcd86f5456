use super::*;

#[test]
fn test_method_pattern_display() {
    let pattern = MethodPattern {
        return_type: "int".to_string(),
        name: "size".to_string(),
        params: vec!["java.lang.String".to_string(), "long[]".to_string()],
    };
    assert_eq!(
        pattern.to_string(),
        "int size(java.lang.String arg0, long[] arg1)"
    );
}

#[test]
fn test_zero_budget_is_exhausted() {
    assert!(SearchBudget::starting_now(Duration::ZERO).is_exhausted());
    assert!(!SearchBudget::starting_now(Duration::from_secs(3600)).is_exhausted());
}
