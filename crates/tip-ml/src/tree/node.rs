use std::fmt::Write;

use crate::model::feature_name;

/// A node of a regression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        prediction: f64,
        impurity: f64,
        count: f64,
    },
    Internal {
        feature: usize,
        threshold: f64,
        gain: f64,
        prediction: f64,
        impurity: f64,
        count: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { prediction, .. } => return *prediction,
                Node::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// The depth of the subtree; a leaf has depth zero.
    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn num_nodes(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Internal { left, right, .. } => 1 + left.num_nodes() + right.num_nodes(),
        }
    }

    /// Adds the weighted impurity gain of every split to `importances`.
    pub(crate) fn accumulate_importances(&self, importances: &mut [f64]) {
        if let Node::Internal {
            feature,
            gain,
            count,
            left,
            right,
            ..
        } = self
        {
            importances[*feature] += gain * count;
            left.accumulate_importances(importances);
            right.accumulate_importances(importances);
        }
    }

    /// Writes the subtree in the `If (feature ...)` / `Predict: ...` layout.
    pub(crate) fn write_debug_string(
        &self,
        out: &mut String,
        indent: usize,
        feature_names: &[String],
    ) -> std::fmt::Result {
        let pad = " ".repeat(indent);
        match self {
            Node::Leaf { prediction, .. } => writeln!(out, "{pad}Predict: {prediction}"),
            Node::Internal {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                let name = feature_name(feature_names, *feature);
                writeln!(out, "{pad}If ({name} <= {threshold})")?;
                left.write_debug_string(out, indent + 1, feature_names)?;
                writeln!(out, "{pad}Else ({name} > {threshold})")?;
                right.write_debug_string(out, indent + 1, feature_names)
            }
        }
    }
}
