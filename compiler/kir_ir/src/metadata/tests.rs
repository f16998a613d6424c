use pretty_assertions::assert_eq;

use super::*;

#[test]
fn builtins_map_work_item_accessors() {
    let metadata = Metadata::with_builtins();
    let owner = ClassName::new(WORK_ITEM_CLASS);
    assert_eq!(
        metadata.function(&owner, "global_id"),
        Some(&HelperFunction {
            name: "get_global_id".to_owned(),
            literal: false,
        })
    );
    assert_eq!(
        metadata
            .function(&owner, "global_size")
            .map(|f| f.name.as_str()),
        Some("get_global_size")
    );
}

#[test]
fn unknown_function_is_absent() {
    let metadata = Metadata::with_builtins();
    assert!(metadata
        .function(&ClassName::new("demo.Math"), "sqrt")
        .is_none());
    assert!(metadata
        .function(&ClassName::new(WORK_ITEM_CLASS), "sqrt")
        .is_none());
}

#[test]
fn type_metadata_carries_element_count() {
    let float2 = ClassName::new("demo.Float2");
    let metadata = Metadata::new().with_type(&float2, "float2", Some(2));
    assert_eq!(
        metadata.type_info(&float2),
        Some(&TypeMetadata {
            name: "float2".to_owned(),
            element_count: Some(2),
        })
    );
}
