//! Writer for the compressed tree format
//!
//! Trees are described with [`TreeSketch`], a plain recursive value, and
//! written in the same pre-order the decoder reads them back in. Missing
//! statistics are filled in: leaves weigh 1, an internal node weighs the sum
//! of its children and predicts their weighted mean.

use crate::blob::CompressedTree;
use crate::errors::EncodeError;
use crate::format::{size_width_for, NaDir, NodeType, SplitKind, SINGLE_LEAF_COLUMN};
use crate::tree::{DecodedTree, NodeId, Side, Split, SplitCondition};

/// A tree to be encoded
#[derive(Debug, Clone, PartialEq)]
pub enum TreeSketch {
    Leaf {
        value: f32,
        weight: f32,
        squared_error: f32,
    },
    Split {
        split: Split,
        na: NaDir,
        prediction: Option<f32>,
        weight: Option<f32>,
        squared_error: f32,
        left: Box<TreeSketch>,
        right: Box<TreeSketch>,
    },
}

impl TreeSketch {
    pub fn leaf(value: f32) -> Self {
        TreeSketch::Leaf {
            value,
            weight: 1.0,
            squared_error: 0.0,
        }
    }

    pub fn split(split: Split, na: NaDir, left: TreeSketch, right: TreeSketch) -> Self {
        TreeSketch::Split {
            split,
            na,
            prediction: None,
            weight: None,
            squared_error: 0.0,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn numeric(feature: usize, threshold: f32, na: NaDir, left: Self, right: Self) -> Self {
        Self::split(Split::numeric(feature, threshold), na, left, right)
    }

    pub fn categorical(
        feature: usize,
        left_levels: Vec<u32>,
        na: NaDir,
        left: Self,
        right: Self,
    ) -> Self {
        Self::split(Split::categorical(feature, left_levels), na, left, right)
    }

    pub fn na_vs_rest(feature: usize, na: NaDir, left: Self, right: Self) -> Self {
        Self::split(Split::na_vs_rest(feature), na, left, right)
    }

    pub fn with_weight(mut self, w: f32) -> Self {
        match &mut self {
            TreeSketch::Leaf { weight, .. } => *weight = w,
            TreeSketch::Split { weight, .. } => *weight = Some(w),
        }
        self
    }

    pub fn with_squared_error(mut self, e: f32) -> Self {
        match &mut self {
            TreeSketch::Leaf { squared_error, .. } | TreeSketch::Split { squared_error, .. } => {
                *squared_error = e
            }
        }
        self
    }

    /// Set the aggregate prediction of an internal node; ignored for leaves
    pub fn with_prediction(mut self, p: f32) -> Self {
        if let TreeSketch::Split { prediction, .. } = &mut self {
            *prediction = Some(p);
        }
        self
    }

    /// Rebuild a sketch from a decoded tree, keeping its statistics
    pub fn from_tree(tree: &DecodedTree) -> Self {
        // Pre-order ids; walked in reverse, every child is built before its parent.
        let mut order = Vec::with_capacity(tree.len());
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some((left, right)) = tree.node(id).and_then(|n| n.left.zip(n.right)) {
                stack.push(right);
                stack.push(left);
            }
        }

        let mut built: Vec<Option<TreeSketch>> = Vec::new();
        built.resize_with(tree.len(), || None);
        for id in order.into_iter().rev() {
            let Some(node) = tree.node(id) else { continue };
            let children = match (&node.split, node.left, node.right) {
                (Some(split), Some(left), Some(right)) => {
                    let left = built.get_mut(left.index()).and_then(Option::take);
                    let right = built.get_mut(right.index()).and_then(Option::take);
                    left.zip(right).map(|(l, r)| (split, l, r))
                }
                _ => None,
            };
            built[id.index()] = Some(match children {
                Some((split, left, right)) => TreeSketch::Split {
                    split: split.clone(),
                    na: NaDir::from_flags(node.na_left, node.na_right),
                    prediction: Some(node.prediction),
                    weight: node.weight,
                    squared_error: node.squared_error.unwrap_or(0.0),
                    left: Box::new(left),
                    right: Box::new(right),
                },
                None => TreeSketch::Leaf {
                    value: node.prediction,
                    weight: node.weight.unwrap_or(1.0),
                    squared_error: node.squared_error.unwrap_or(0.0),
                },
            });
        }

        built
            .into_iter()
            .next()
            .flatten()
            .unwrap_or_else(|| TreeSketch::leaf(tree.root().prediction))
    }

    /// Number of nodes, leaves included
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(sketch) = stack.pop() {
            count += 1;
            if let TreeSketch::Split { left, right, .. } = sketch {
                stack.push(&**right);
                stack.push(&**left);
            }
        }
        count
    }

    pub fn encode(&self) -> Result<CompressedTree, EncodeError> {
        let nodes = flatten(self);
        let count =
            u32::try_from(nodes.len()).map_err(|_| EncodeError::TooManyNodes(nodes.len()))?;
        let mut aux = count.to_le_bytes().to_vec();

        if let [FlatNode::Leaf { value, .. }] = nodes.as_slice() {
            let mut primary = vec![0];
            primary.extend(SINGLE_LEAF_COLUMN.to_le_bytes());
            primary.extend(value.to_le_bytes());
            return Ok(CompressedTree::new(primary, aux));
        }

        // Children follow their parent in pre-order, so a reverse sweep sees
        // every subtree before the record that needs its size and statistics.
        let mut summaries = vec![Summary::default(); nodes.len()];
        let mut pieces: Vec<Piece> = Vec::new();
        pieces.resize_with(nodes.len(), Piece::default);
        for (id, node) in nodes.iter().enumerate().rev() {
            let (summary, piece) = match *node {
                FlatNode::Leaf {
                    value,
                    weight,
                    squared_error,
                } => (
                    Summary {
                        size: 4,
                        weight,
                        prediction: value,
                        squared_error,
                    },
                    Piece {
                        bytes: value.to_le_bytes().to_vec(),
                        stats: None,
                    },
                ),
                FlatNode::Split {
                    split,
                    na,
                    prediction,
                    weight,
                    squared_error,
                    left,
                    right,
                } => {
                    let (l, r) = (summaries[left], summaries[right]);
                    let header = record_header(
                        split,
                        na,
                        nodes[left].is_leaf(),
                        nodes[right].is_leaf(),
                        l.size,
                    )?;
                    let summary = Summary {
                        size: header.len() + l.size + r.size,
                        weight: weight.unwrap_or(l.weight + r.weight),
                        prediction: prediction.unwrap_or_else(|| weighted_mean(&l, &r)),
                        squared_error,
                    };
                    let stats = [
                        l.weight,
                        r.weight,
                        l.prediction,
                        r.prediction,
                        l.squared_error,
                        r.squared_error,
                    ];
                    (
                        summary,
                        Piece {
                            bytes: header,
                            stats: Some(stats),
                        },
                    )
                }
            };
            summaries[id] = summary;
            pieces[id] = piece;
        }

        // Pre-order is also the byte order: a record, its left subtree, its right subtree.
        let mut primary = Vec::with_capacity(summaries.first().map_or(0, |s| s.size));
        for (id, piece) in pieces.iter().enumerate() {
            primary.extend(&piece.bytes);
            if let Some(stats) = piece.stats {
                aux.extend((id as u32).to_le_bytes());
                for value in stats {
                    aux.extend(value.to_le_bytes());
                }
            }
        }

        Ok(CompressedTree::new(primary, aux))
    }
}

impl Drop for TreeSketch {
    // Deep sketches are unlinked onto a heap stack instead of dropping recursively.
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_splits(self, &mut pending);
        while let Some(mut sketch) = pending.pop() {
            detach_splits(&mut sketch, &mut pending);
        }
    }
}

fn detach_splits(sketch: &mut TreeSketch, pending: &mut Vec<TreeSketch>) {
    if let TreeSketch::Split { left, right, .. } = sketch {
        for child in [left, right] {
            if matches!(**child, TreeSketch::Split { .. }) {
                pending.push(std::mem::replace(&mut **child, TreeSketch::leaf(0.0)));
            }
        }
    }
}

/// Encode a decoded tree back into blobs
pub fn encode_tree(tree: &DecodedTree) -> Result<CompressedTree, EncodeError> {
    TreeSketch::from_tree(tree).encode()
}

/// A sketch node in pre-order; ids are positions in the flattened list
#[derive(Clone, Copy)]
enum FlatNode<'a> {
    Leaf {
        value: f32,
        weight: f32,
        squared_error: f32,
    },
    Split {
        split: &'a Split,
        na: NaDir,
        prediction: Option<f32>,
        weight: Option<f32>,
        squared_error: f32,
        left: usize,
        right: usize,
    },
}

impl FlatNode<'_> {
    fn is_leaf(&self) -> bool {
        matches!(self, FlatNode::Leaf { .. })
    }
}

fn flatten(root: &TreeSketch) -> Vec<FlatNode<'_>> {
    let mut nodes: Vec<FlatNode<'_>> = Vec::new();
    let mut stack = vec![(root, None)];
    while let Some((sketch, parent)) = stack.pop() {
        let index = nodes.len();
        if let Some((parent, side)) = parent {
            if let Some(FlatNode::Split { left, right, .. }) = nodes.get_mut(parent) {
                match side {
                    Side::Left => *left = index,
                    Side::Right => *right = index,
                }
            }
        }

        nodes.push(match sketch {
            TreeSketch::Leaf {
                value,
                weight,
                squared_error,
            } => FlatNode::Leaf {
                value: *value,
                weight: *weight,
                squared_error: *squared_error,
            },
            TreeSketch::Split {
                split,
                na,
                prediction,
                weight,
                squared_error,
                left,
                right,
            } => {
                stack.push((&**right, Some((index, Side::Right))));
                stack.push((&**left, Some((index, Side::Left))));
                FlatNode::Split {
                    split,
                    na: *na,
                    prediction: *prediction,
                    weight: *weight,
                    squared_error: *squared_error,
                    left: index,
                    right: index,
                }
            }
        });
    }
    nodes
}

/// Encoded size and statistics of a subtree
#[derive(Debug, Clone, Copy, Default)]
struct Summary {
    size: usize,
    weight: f32,
    prediction: f32,
    squared_error: f32,
}

/// Bytes a node contributes to the primary blob, plus its aux values
#[derive(Default)]
struct Piece {
    bytes: Vec<u8>,
    stats: Option<[f32; 6]>,
}

fn weighted_mean(left: &Summary, right: &Summary) -> f32 {
    let (wl, wr) = (left.weight as f64, right.weight as f64);
    let (pl, pr) = (left.prediction as f64, right.prediction as f64);
    if wl + wr > 0.0 {
        ((wl * pl + wr * pr) / (wl + wr)) as f32
    } else {
        ((pl + pr) / 2.0) as f32
    }
}

/// Node type, column, NA byte, payload and left size field of one record
fn record_header(
    split: &Split,
    na: NaDir,
    left_leaf: bool,
    right_leaf: bool,
    left_size: usize,
) -> Result<Vec<u8>, EncodeError> {
    let column = u16::try_from(split.feature)
        .ok()
        .filter(|c| *c != SINGLE_LEAF_COLUMN)
        .ok_or(EncodeError::FeatureOutOfRange(split.feature))?;
    let (kind, payload) = split_payload(split, na)?;

    let size_width = if left_leaf {
        1
    } else {
        if left_size > u32::MAX as usize {
            return Err(EncodeError::SubtreeTooLarge(left_size));
        }
        size_width_for(left_size)
    };
    let node_type = NodeType {
        size_width,
        kind,
        left_leaf,
        right_leaf,
    };

    let mut header = Vec::with_capacity(4 + payload.len() + size_width);
    header.push(node_type.to_byte());
    header.extend(column.to_le_bytes());
    header.push(na.to_byte());
    header.extend(payload);
    if !left_leaf {
        header.extend(&(left_size as u32).to_le_bytes()[..size_width]);
    }
    Ok(header)
}

fn split_payload(split: &Split, na: NaDir) -> Result<(SplitKind, Vec<u8>), EncodeError> {
    match &split.condition {
        SplitCondition::Numeric { threshold } => {
            Ok((SplitKind::Numeric, threshold.to_le_bytes().to_vec()))
        }
        SplitCondition::NaVsRest => {
            if na == NaDir::None {
                return Err(EncodeError::NaVsRestWithoutDirection(split.feature));
            }
            Ok((SplitKind::NaVsRest, Vec::new()))
        }
        SplitCondition::Categorical { left_levels } => {
            let mut levels = left_levels.clone();
            levels.sort_unstable();
            levels.dedup();

            match (levels.first(), levels.last()) {
                (Some(_), Some(&max)) if max >= 32 => {
                    let min = levels[0];
                    let offset = u16::try_from(min - min % 8)
                        .map_err(|_| EncodeError::CategoryOutOfRange(min))?;
                    let span = (max - offset as u32) as usize / 8 + 1;
                    let byte_len =
                        u16::try_from(span).map_err(|_| EncodeError::CategoryOutOfRange(max))?;
                    let mut bits = vec![0u8; span];
                    for level in &levels {
                        let rel = (level - offset as u32) as usize;
                        bits[rel / 8] |= 1 << (rel % 8);
                    }
                    let mut payload = offset.to_le_bytes().to_vec();
                    payload.extend(byte_len.to_le_bytes());
                    payload.extend(bits);
                    Ok((SplitKind::LargeBitset, payload))
                }
                _ => {
                    let bits = levels.iter().fold(0u32, |acc, l| acc | (1u32 << *l));
                    Ok((SplitKind::SmallBitset, bits.to_le_bytes().to_vec()))
                }
            }
        }
    }
}
