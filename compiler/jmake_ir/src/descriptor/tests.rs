use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_method_parts() {
    assert_eq!(
        method_parts("(ILjava/lang/String;)V"),
        Some(("(ILjava/lang/String;)", "V"))
    );
    assert_eq!(method_parts("()[I"), Some(("()", "[I")));
    assert_eq!(method_parts("I"), None);
}

#[test]
fn test_parameter_types() {
    assert_eq!(
        parameter_types("(I[JLjava/lang/String;[[Lp/A;)V"),
        Some(vec!["I", "[J", "Ljava/lang/String;", "[[Lp/A;"])
    );
    assert_eq!(parameter_types("()V"), Some(vec![]));
    assert_eq!(parameter_types("(Q)V"), None);
    assert_eq!(parameter_types("(Ljava/lang/String"), None);
}

#[test]
fn test_descriptor_classes() {
    assert_eq!(
        descriptor_classes("(Ljava/lang/String;I[Lp/A;Ljava/lang/String;)Lp/B;"),
        vec!["java.lang.String", "p.A", "p.B"]
    );
    assert!(descriptor_classes("(IJ)V").is_empty());
}

#[test]
fn test_signature_classes_class_signature() {
    // class Box<T extends Comparable<T>> extends Base<T> implements Marker
    let sig = "<T::Ljava/lang/Comparable<TT;>;>Lp/Base<TT;>;Lp/Marker;";
    assert_eq!(
        signature_classes(sig),
        vec!["java.lang.Comparable", "p.Base", "p.Marker"]
    );
}

#[test]
fn test_signature_classes_method_signature() {
    let sig = "<E:Ljava/lang/Exception;>(Ljava/util/List<+Lp/A;>;[TE;)Ljava/util/Map<Ljava/lang/String;*>;^TE;^Lp/Failure;";
    assert_eq!(
        signature_classes(sig),
        vec![
            "java.lang.Exception",
            "p.A",
            "java.util.List",
            "java.lang.String",
            "java.util.Map",
            "p.Failure",
        ]
    );
}

#[test]
fn test_signature_classes_inner_class() {
    assert_eq!(
        signature_classes("Lp/Outer<Ljava/lang/String;>.Inner;"),
        vec!["java.lang.String", "p.Outer$Inner"]
    );
}

#[test]
fn test_signature_classes_malformed_keeps_prefix() {
    assert_eq!(signature_classes("Lp/A;Lp/B"), vec!["p.A"]);
}

#[test]
fn test_strip_type_parameters() {
    assert_eq!(
        strip_type_parameters("<T:Ljava/util/List<TT;>;>Lp/Base;"),
        "Lp/Base;"
    );
    assert_eq!(strip_type_parameters("Lp/Base;"), "Lp/Base;");
}

#[test]
fn test_split_method_signature() {
    assert_eq!(
        split_method_signature("<T:Ljava/lang/Object;>(TT;)TT;^Ljava/io/IOException;"),
        Some(("(TT;)", "TT;"))
    );
    assert_eq!(split_method_signature("(I)V"), Some(("(I)", "V")));
}

#[test]
fn test_to_source_type() {
    assert_eq!(to_source_type("I").as_deref(), Some("int"));
    assert_eq!(to_source_type("[[J").as_deref(), Some("long[][]"));
    assert_eq!(
        to_source_type("[Ljava/lang/String;").as_deref(),
        Some("java.lang.String[]")
    );
    assert_eq!(to_source_type("V").as_deref(), Some("void"));
    assert_eq!(to_source_type("Q"), None);
}

#[test]
fn test_identifiers() {
    assert!(is_identifier("run"));
    assert!(is_identifier("$jacoco"));
    assert!(!is_identifier("<init>"));
    assert!(!is_identifier("1abc"));
    assert!(!is_identifier(""));
}

#[test]
fn test_anonymous_classes() {
    assert!(is_anonymous_class("p.Outer$1"));
    assert!(is_anonymous_class("p.Outer$Inner$12"));
    assert!(!is_anonymous_class("p.Outer$Inner"));
    assert!(!is_anonymous_class("p.Outer"));
    assert!(!is_anonymous_class("p.Outer$"));
}
