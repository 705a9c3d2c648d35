#![cfg_attr(fuzzing, no_main)]

#[cfg(not(fuzzing))]
fn main() {}

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;
#[cfg(fuzzing)]
use treelens_core::{decode, describe, PlainLanguageRules, NO_CHILD};

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if data.len() > 50_000 || data.len() < 2 {
        return;
    }

    // Same layout as `decode_tree`: a split point, then primary and aux bytes
    let split = u16::from_le_bytes([data[0], data[1]]) as usize;
    let body = &data[2..];
    let (primary, aux) = body.split_at(split.min(body.len()));

    let features: Vec<String> = (0..4).map(|i| format!("f{i}")).collect();
    let domains: Vec<Option<Vec<String>>> = vec![
        None,
        Some((0..12).map(|l| format!("l{l}")).collect()),
        None,
        Some((0..70).map(|l| format!("l{l}")).collect()),
    ];

    if let Ok(tree) = decode(primary, aux, &features, &domains) {
        let props = describe(&tree, PlainLanguageRules::True);
        assert_eq!(props.len(), tree.len());
        assert_eq!(props.left_children.len(), props.len());
        assert_eq!(props.node_ids[0], props.root_node_id);

        let children = props
            .left_children
            .iter()
            .chain(&props.right_children)
            .filter(|c| **c != NO_CHILD)
            .count();
        assert_eq!(children, tree.len() - 1);
    }
});
