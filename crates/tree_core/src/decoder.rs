//! Single-pass decoder for compressed trees
//!
//! The primary blob is walked once, front to back, with an explicit stack of
//! pending child slots. A slot remembers the offset where its record has to
//! start, so a corrupt left-subtree size is caught as soon as the right child
//! is reached instead of silently shifting every later record.

use crate::errors::{BlobKind, MalformedTreeError, Result};
use crate::format::{NaDir, NodeType, SplitKind, AUX_RECORD_LEN, SINGLE_LEAF_COLUMN};
use crate::reader::BlobReader;
use crate::tree::{DecodedTree, NodeId, Side, Split, SplitCondition, TreeNode};
use crate::validate;
use tracing::{debug, warn};

/// Knobs for [`decode_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Run the NA routing validator after decoding and record its findings
    pub check_na_routing: bool,
}

/// Decode a tree from its primary and auxiliary blobs
pub fn decode(
    primary: &[u8],
    aux: &[u8],
    feature_names: &[String],
    domains: &[Option<Vec<String>>],
) -> Result<DecodedTree> {
    decode_with(primary, aux, feature_names, domains, &DecodeOptions::default())
}

/// Decode a tree, optionally checking NA routing on the result.
///
/// NA findings never fail the decode; they are logged and exposed through
/// [`DecodedTree::na_findings`].
pub fn decode_with(
    primary: &[u8],
    aux: &[u8],
    feature_names: &[String],
    domains: &[Option<Vec<String>>],
    options: &DecodeOptions,
) -> Result<DecodedTree> {
    let mut nodes = decode_primary(primary, feature_names, domains)?;
    apply_aux(&mut nodes, aux)?;

    let mut tree = DecodedTree::from_parts(nodes, feature_names.to_vec(), domains.to_vec());
    debug!(
        nodes = tree.len(),
        leaves = tree.leaf_count(),
        depth = tree.max_depth(),
        "decoded tree"
    );

    if options.check_na_routing {
        let findings = validate::find_violations(&tree);
        for finding in &findings {
            warn!(node = %finding.node, feature = finding.feature, "{}", finding);
        }
        tree.set_na_findings(findings);
    }

    Ok(tree)
}

struct Slot {
    parent: Option<(NodeId, Side)>,
    start: usize,
    inline_leaf: bool,
    depth: u32,
}

fn decode_primary(
    primary: &[u8],
    feature_names: &[String],
    domains: &[Option<Vec<String>>],
) -> Result<Vec<TreeNode>> {
    let mut reader = BlobReader::new(primary, BlobKind::Primary);
    let mut nodes: Vec<TreeNode> = Vec::new();
    let mut stack = vec![Slot {
        parent: None,
        start: 0,
        inline_leaf: false,
        depth: 0,
    }];

    while let Some(slot) = stack.pop() {
        if reader.position() != slot.start {
            return Err(MalformedTreeError::OffsetMismatch {
                expected: slot.start,
                actual: reader.position(),
            });
        }

        let id = NodeId(nodes.len() as u32);

        if slot.inline_leaf {
            let value = reader.f32()?;
            push_node(&mut nodes, TreeNode::leaf(id, value), &slot);
            continue;
        }

        let record_start = reader.position();
        let type_byte = reader.u8()?;
        let column = reader.u16()?;

        if column == SINGLE_LEAF_COLUMN && slot.parent.is_none() {
            let value = reader.f32()?;
            push_node(&mut nodes, TreeNode::leaf(id, value), &slot);
            continue;
        }

        let node_type = NodeType::parse(type_byte, record_start)?;
        let feature = column as usize;
        if feature >= feature_names.len() {
            return Err(MalformedTreeError::UnknownFeature {
                feature,
                feature_count: feature_names.len(),
            });
        }

        let na_offset = reader.position();
        let na_byte = reader.u8()?;
        let na = NaDir::parse(na_byte, na_offset)?;

        let condition = match node_type.kind {
            SplitKind::Numeric => SplitCondition::Numeric {
                threshold: reader.f32()?,
            },
            SplitKind::SmallBitset => {
                let bits = reader.u32()?;
                let levels = (0..32u32).filter(|i| bits & (1 << i) != 0).collect();
                categorical(feature, levels, feature_names, domains)?
            }
            SplitKind::LargeBitset => {
                let offset = reader.u16()? as u32;
                let byte_len = reader.u16()? as usize;
                let bytes = reader.take(byte_len)?;
                let mut levels = Vec::new();
                for (byte_index, byte) in bytes.iter().enumerate() {
                    for bit in 0..8u32 {
                        if byte & (1 << bit) != 0 {
                            levels.push(offset + byte_index as u32 * 8 + bit);
                        }
                    }
                }
                categorical(feature, levels, feature_names, domains)?
            }
            SplitKind::NaVsRest => {
                if na == NaDir::None {
                    return Err(MalformedTreeError::InvalidNaDirection {
                        value: na_byte,
                        offset: na_offset,
                    });
                }
                SplitCondition::NaVsRest
            }
        };

        let left_len = if node_type.left_leaf {
            4
        } else {
            reader.uint(node_type.size_width)?
        };
        let left_start = reader.position();
        let right_start = left_start.checked_add(left_len).ok_or(MalformedTreeError::OutOfBounds {
            blob: BlobKind::Primary,
            offset: left_start,
            needed: left_len,
            len: reader.len(),
        })?;
        let right_len = if node_type.right_leaf { 4 } else { 1 };
        reader.check_range(right_start, right_len)?;

        let node = TreeNode {
            id,
            parent: None,
            left: None,
            right: None,
            depth: slot.depth,
            split: Some(Split { feature, condition }),
            na_left: na == NaDir::Left,
            na_right: na == NaDir::Right,
            prediction: 0.0,
            weight: None,
            squared_error: None,
        };
        push_node(&mut nodes, node, &slot);

        stack.push(Slot {
            parent: Some((id, Side::Right)),
            start: right_start,
            inline_leaf: node_type.right_leaf,
            depth: slot.depth + 1,
        });
        stack.push(Slot {
            parent: Some((id, Side::Left)),
            start: left_start,
            inline_leaf: node_type.left_leaf,
            depth: slot.depth + 1,
        });
    }

    if reader.remaining() != 0 {
        return Err(MalformedTreeError::TrailingBytes {
            blob: BlobKind::Primary,
            remaining: reader.remaining(),
        });
    }

    Ok(nodes)
}

fn push_node(nodes: &mut Vec<TreeNode>, mut node: TreeNode, slot: &Slot) {
    node.depth = slot.depth;
    if let Some((parent, side)) = slot.parent {
        node.parent = Some(parent);
        let parent_node = &mut nodes[parent.index()];
        match side {
            Side::Left => parent_node.left = Some(node.id),
            Side::Right => parent_node.right = Some(node.id),
        }
    }
    nodes.push(node);
}

fn categorical(
    feature: usize,
    levels: Vec<u32>,
    feature_names: &[String],
    domains: &[Option<Vec<String>>],
) -> Result<SplitCondition> {
    let name = || feature_names[feature].clone();
    let domain = domains
        .get(feature)
        .and_then(|d| d.as_ref())
        .ok_or_else(|| MalformedTreeError::MissingDomain { feature: name() })?;

    if let Some(&category) = levels.iter().find(|&&l| l as usize >= domain.len()) {
        return Err(MalformedTreeError::CategoryOutOfDomain {
            feature: name(),
            category,
            domain_size: domain.len(),
        });
    }

    Ok(SplitCondition::Categorical {
        left_levels: levels,
    })
}

fn apply_aux(nodes: &mut [TreeNode], aux: &[u8]) -> Result<()> {
    let mut reader = BlobReader::new(aux, BlobKind::Auxiliary);
    let aux_count = reader.u32()? as usize;
    if aux_count != nodes.len() {
        return Err(MalformedTreeError::AuxNodeCountMismatch {
            primary: nodes.len(),
            aux: aux_count,
        });
    }

    let internal = nodes.iter().filter(|n| !n.is_leaf()).count();
    reader.check_range(reader.position(), internal * AUX_RECORD_LEN)?;

    let mut seen = vec![false; nodes.len()];
    for _ in 0..internal {
        let raw_id = reader.u32()?;
        let index = raw_id as usize;
        let (left, right) = match nodes.get(index) {
            None => {
                return Err(MalformedTreeError::AuxRecordMismatch {
                    node: raw_id,
                    reason: "no such node".to_string(),
                })
            }
            Some(node) => match (node.left, node.right) {
                (Some(left), Some(right)) => (left, right),
                _ => {
                    return Err(MalformedTreeError::AuxRecordMismatch {
                        node: raw_id,
                        reason: "node is a leaf".to_string(),
                    })
                }
            },
        };
        if seen[index] {
            return Err(MalformedTreeError::AuxRecordMismatch {
                node: raw_id,
                reason: "duplicate record".to_string(),
            });
        }
        seen[index] = true;

        let weight_left = reader.f32()?;
        let weight_right = reader.f32()?;
        let pred_left = reader.f32()?;
        let pred_right = reader.f32()?;
        let sq_err_left = reader.f32()?;
        let sq_err_right = reader.f32()?;

        for (child, weight, pred, sq_err) in [
            (left, weight_left, pred_left, sq_err_left),
            (right, weight_right, pred_right, sq_err_right),
        ] {
            let node = &mut nodes[child.index()];
            node.weight = Some(weight);
            node.squared_error = Some(sq_err);
            if !node.is_leaf() {
                node.prediction = pred;
            }
        }
    }

    if reader.remaining() != 0 {
        return Err(MalformedTreeError::TrailingBytes {
            blob: BlobKind::Auxiliary,
            remaining: reader.remaining(),
        });
    }

    if let (Some(left), Some(right)) = (nodes[0].left, nodes[0].right) {
        let (l, r) = (&nodes[left.index()], &nodes[right.index()]);
        let wl = l.weight.unwrap_or(0.0) as f64;
        let wr = r.weight.unwrap_or(0.0) as f64;
        let total = wl + wr;
        let prediction = if total > 0.0 {
            (wl * l.prediction as f64 + wr * r.prediction as f64) / total
        } else {
            (l.prediction as f64 + r.prediction as f64) / 2.0
        };
        nodes[0].weight = Some(total as f32);
        nodes[0].prediction = prediction as f32;
    }

    Ok(())
}
