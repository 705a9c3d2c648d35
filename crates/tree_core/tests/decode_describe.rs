//! End-to-end checks: encoded fixtures are decoded, validated and described.

use treelens_core::{
    count_na_splits, decode, describe, encode_tree, validate, DecodedTree, NaDir, NodeId,
    PlainLanguageRules, TreeProperties, TreeSketch, NO_CHILD,
};

fn airline_names() -> Vec<String> {
    ["DepTime", "Origin", "Distance", "IsDepDelayed"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn airline_domains() -> Vec<Option<Vec<String>>> {
    let origins = ["ABQ", "ATL", "BOS", "DEN", "JFK", "LAX", "ORD", "SFO"];
    vec![
        None,
        Some(origins.iter().map(|s| s.to_string()).collect()),
        None,
        None,
    ]
}

/// Mixed numeric and categorical tree, with a repeated split on `Origin`
fn airline_tree() -> DecodedTree {
    let sketch = TreeSketch::numeric(
        0,
        1230.5,
        NaDir::Left,
        TreeSketch::categorical(
            1,
            vec![1, 4, 6],
            NaDir::Right,
            TreeSketch::leaf(0.42).with_weight(120.0),
            TreeSketch::categorical(
                1,
                vec![0, 3],
                NaDir::Left,
                TreeSketch::leaf(-0.1).with_weight(40.0),
                TreeSketch::leaf(0.05).with_weight(35.0),
            ),
        ),
        TreeSketch::numeric(
            2,
            650.0,
            NaDir::Right,
            TreeSketch::leaf(0.7).with_weight(80.0),
            TreeSketch::na_vs_rest(
                2,
                NaDir::Left,
                TreeSketch::leaf(0.0).with_weight(1.0),
                TreeSketch::leaf(0.9).with_weight(60.0),
            ),
        ),
    );
    let blobs = sketch.encode().unwrap();
    decode(&blobs.primary, &blobs.aux, &airline_names(), &airline_domains()).unwrap()
}

fn assert_parallel(props: &TreeProperties, nodes: usize) {
    assert_eq!(props.len(), nodes);
    assert_eq!(props.left_children.len(), nodes);
    assert_eq!(props.right_children.len(), nodes);
    assert_eq!(props.descriptions.len(), nodes);
    assert_eq!(props.thresholds.len(), nodes);
    assert_eq!(props.features.len(), nodes);
    assert_eq!(props.levels.len(), nodes);
    assert_eq!(props.nas.len(), nodes);
    assert_eq!(props.predictions.len(), nodes);
    assert_eq!(props.decision_paths.len(), nodes);
}

/// Replay the flattened arrays the way a consumer would and count the
/// non-root nodes discovered
fn replay_discovered(props: &TreeProperties) -> usize {
    let position = |id: i32| props.node_ids.iter().position(|&n| n as i32 == id);
    let mut queue = std::collections::VecDeque::from([0usize]);
    let mut discovered = 0;
    while let Some(entry) = queue.pop_front() {
        for child in [props.left_children[entry], props.right_children[entry]] {
            if child != NO_CHILD {
                discovered += 1;
                queue.push_back(position(child).unwrap());
            }
        }
    }
    discovered
}

fn count_na_recursive(tree: &DecodedTree, id: NodeId) -> usize {
    let node = tree.node(id).unwrap();
    match (node.left, node.right) {
        (Some(left), Some(right)) => {
            usize::from(node.na_left != node.na_right)
                + count_na_recursive(tree, left)
                + count_na_recursive(tree, right)
        }
        _ => 0,
    }
}

#[test]
fn test_airline_tree_properties() {
    let tree = airline_tree();
    assert_eq!(tree.len(), 11);
    validate(&tree).unwrap();

    let props = describe(&tree, PlainLanguageRules::False);
    assert_parallel(&props, tree.len());
    assert_eq!(replay_discovered(&props), tree.len() - 1);

    assert_eq!(props.root_node_id, 0);
    assert!(props.descriptions[0].starts_with("Node has id 0 and splits on column 'DepTime'."));
    assert_eq!(props.features[0].as_deref(), Some("DepTime"));
    assert_eq!(props.thresholds[0], Some(1230.5));

    let non_empty_nas = props.nas.iter().filter(|n| n.is_some()).count();
    assert_eq!(non_empty_nas, count_na_splits(&tree));
    assert_eq!(non_empty_nas, count_na_recursive(&tree, NodeId::ROOT));
}

#[test]
fn test_repeated_categorical_split_uses_reachable_levels() {
    let tree = airline_tree();
    let props = describe(&tree, PlainLanguageRules::True);
    // Node 3 splits Origin again below the right side of node 1
    let entry = props.node_ids.iter().position(|&id| id == 3).unwrap();
    assert_eq!(
        props.levels[entry],
        Some(vec!["ABQ".to_string(), "DEN".to_string()])
    );
    assert!(props.descriptions[entry].contains(
        "levels [BOS, LAX, SFO] go to the right node (id 5)."
    ));
    assert_eq!(
        props.decision_paths[entry].as_deref(),
        Some(
            "(DepTime < 1230.5 or DepTime is NA) and \
             (Origin in [ABQ, BOS, DEN, LAX, SFO] or Origin is NA)"
        )
    );
}

#[test]
fn test_describe_is_idempotent() {
    let first = describe(&airline_tree(), PlainLanguageRules::True);
    let second = describe(&airline_tree(), PlainLanguageRules::True);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn test_single_leaf_tree() {
    let blobs = TreeSketch::leaf(3.5).encode().unwrap();
    let tree = blobs.decode(&airline_names(), &airline_domains()).unwrap();
    let props = describe(&tree, PlainLanguageRules::True);
    assert_parallel(&props, 1);
    assert_eq!(
        props.descriptions,
        vec!["Leaf node has id 0. Predicted value at leaf node is 3.5.".to_string()]
    );
    assert_eq!(props.left_children, vec![NO_CHILD]);
    assert_eq!(props.tree_decision_path.as_deref(), Some("Pred: 3.5"));
    assert_eq!(replay_discovered(&props), 0);
}

#[test]
fn test_flipped_na_byte_is_reported() {
    let tree = airline_tree();
    let mut blobs = treelens_core::encode_tree(&tree).unwrap();
    // Root record: node type, column, then the NA direction byte
    blobs.primary[3] = NaDir::None.to_byte();
    let broken = blobs.decode(&airline_names(), &airline_domains()).unwrap();
    let violation = validate(&broken).unwrap_err();
    assert_eq!(violation.node, NodeId::ROOT);
    assert!(violation.to_string().contains("neither child inclusive"));
}

/// Right-leaning chain built byte by byte: every record has an inline left
/// leaf, so no size fields are needed
fn deep_chain(depth: u32) -> (Vec<u8>, Vec<u8>) {
    let mut primary = Vec::new();
    let mut aux = (2 * depth + 1).to_le_bytes().to_vec();
    for level in 0..depth {
        let last = level + 1 == depth;
        let node_type = 0b0001_0000 | if last { 0b0010_0000 } else { 0 };
        primary.extend([node_type, 0, 0, NaDir::Right.to_byte()]);
        primary.extend((level as f32).to_le_bytes());
        primary.extend((level as f32 * 0.5).to_le_bytes());

        aux.extend((2 * level).to_le_bytes());
        let remaining = (depth - level) as f32;
        for value in [1.0, remaining, level as f32 * 0.5, 1.0, 0.0, 0.0] {
            aux.extend(value.to_le_bytes());
        }
    }
    primary.extend(1.0f32.to_le_bytes());
    (primary, aux)
}

#[test]
fn test_deep_unbalanced_tree() {
    let depth = 400;
    let (primary, aux) = deep_chain(depth);
    let tree = decode(&primary, &aux, &airline_names(), &airline_domains()).unwrap();
    assert_eq!(tree.len(), 2 * depth as usize + 1);
    assert_eq!(tree.max_depth(), depth);
    validate(&tree).unwrap();
    assert_eq!(count_na_splits(&tree), depth as usize);

    let props = describe(&tree, PlainLanguageRules::True);
    assert_parallel(&props, tree.len());
    assert_eq!(replay_discovered(&props), tree.len() - 1);

    let deepest = props.decision_paths.last().unwrap().as_deref().unwrap();
    assert_eq!(deepest.matches(" and ").count(), depth as usize - 1);
    let rendered = props.tree_decision_path.unwrap();
    assert_eq!(rendered.matches("If (").count(), depth as usize);
}

#[test]
fn test_deep_chain_reencodes_to_same_blobs() {
    let depth = 50_000;
    let (primary, aux) = deep_chain(depth);
    let tree = decode(&primary, &aux, &airline_names(), &airline_domains()).unwrap();
    assert_eq!(tree.max_depth(), depth);

    let sketch = TreeSketch::from_tree(&tree);
    assert_eq!(sketch.node_count(), tree.len());
    let blobs = sketch.encode().unwrap();
    assert_eq!(blobs.primary, primary);
    assert_eq!(blobs.aux, aux);
    drop(sketch);

    assert_eq!(encode_tree(&tree).unwrap(), blobs);
}
