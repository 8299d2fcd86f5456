use super::*;
use pretty_assertions::assert_eq;

fn sym(raw: u32) -> Symbol {
    Symbol::from_raw(raw)
}

#[test]
fn test_group_by_referencing_class() {
    let records = vec![
        ReferencerRecord::method(sym(2), sym(10), sym(11)),
        ReferencerRecord::class(sym(1)),
        ReferencerRecord::field(sym(2), sym(20)),
        ReferencerRecord::class(sym(2)),
        ReferencerRecord::field(sym(2), sym(20)),
    ];

    let grouped = Dependency::group(records);
    assert_eq!(grouped.len(), 2);

    assert_eq!(grouped[0].class, sym(1));
    assert!(grouped[0].fields.is_empty());
    assert!(grouped[0].methods.is_empty());

    assert_eq!(grouped[1].class, sym(2));
    assert_eq!(grouped[1].fields.len(), 1);
    assert!(grouped[1].fields.contains(&sym(20)));
    assert!(grouped[1].methods.contains(&MethodRef {
        name: sym(10),
        descriptor: sym(11),
    }));
}

#[test]
fn test_referencer_equality_includes_discriminator() {
    assert_ne!(
        ReferencerRecord::class(sym(1)),
        ReferencerRecord::field(sym(1), sym(2))
    );
    assert_eq!(
        ReferencerRecord::method(sym(1), sym(2), sym(3)),
        ReferencerRecord::method(sym(1), sym(2), sym(3))
    );
}

#[test]
fn test_reference_owner() {
    let field = ClassReference::Field {
        owner: sym(5),
        name: sym(6),
    };
    assert_eq!(field.owner(), sym(5));
    assert_eq!(ClassReference::Class(sym(7)).owner(), sym(7));
}
