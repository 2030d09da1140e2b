//! Think-tree injection.
//!
//! Hosts that drive agent behavior from a decision tree can have the engine
//! evaluate agents from inside that tree, at a node inserted just before a
//! known anchor (the general work giver, for instance). The host tree is
//! not ours, so locating the insertion point is a structural search. When
//! no anchor is found the engine falls back to evaluating agents from its
//! own tick instead of failing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A node of the host's decision tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkNode {
    pub kind: String,
    #[serde(default)]
    pub children: Vec<ThinkNode>,
}

impl ThinkNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(kind: impl Into<String>, children: Vec<ThinkNode>) -> Self {
        Self {
            kind: kind.into(),
            children,
        }
    }

    /// Node at `path`, following child indices from this node.
    pub fn node_at(&self, path: &[usize]) -> Option<&ThinkNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut ThinkNode> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }

    /// Depth-first, pre-order search for the first node of `kind`.
    fn find(&self, kind: &str) -> Option<Vec<usize>> {
        if self.kind == kind {
            return Some(Vec::new());
        }
        for (index, child) in self.children.iter().enumerate() {
            if let Some(mut path) = child.find(kind) {
                path.insert(0, index);
                return Some(path);
            }
        }
        None
    }
}

/// Where to insert the evaluation node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionRule {
    /// Kind of the node the engine inserts
    pub node_kind: String,
    /// Anchor kinds in order of preference; the node goes right before the first found
    pub anchors: Vec<String>,
}

impl Default for InjectionRule {
    fn default() -> Self {
        Self {
            node_kind: "armory_equip_upgrade".to_string(),
            anchors: vec![
                "job_giver_work".to_string(),
                "job_giver_get_joy".to_string(),
                "job_giver_wander".to_string(),
            ],
        }
    }
}

/// Insertion point: the parent node's path and the child index to insert at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    pub parent: Vec<usize>,
    pub index: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InjectionError {
    #[error("no anchor node found (tried {0:?})")]
    AnchorNotFound(Vec<String>),
    #[error("evaluation node already present at {0:?}")]
    AlreadyInjected(Vec<usize>),
}

/// Finds where the evaluation node belongs.
pub fn locate(tree: &ThinkNode, rule: &InjectionRule) -> Result<InjectionPoint, InjectionError> {
    if let Some(path) = tree.find(&rule.node_kind) {
        return Err(InjectionError::AlreadyInjected(path));
    }
    for anchor in &rule.anchors {
        let Some(mut path) = tree.find(anchor) else {
            continue;
        };
        // The root itself cannot have a sibling inserted before it
        let Some(index) = path.pop() else {
            continue;
        };
        return Ok(InjectionPoint {
            parent: path,
            index,
        });
    }
    Err(InjectionError::AnchorNotFound(rule.anchors.clone()))
}

/// Inserts the evaluation node into the tree.
pub fn inject(tree: &mut ThinkNode, rule: &InjectionRule) -> Result<InjectionPoint, InjectionError> {
    let point = locate(tree, rule)?;
    let parent = tree
        .node_at_mut(&point.parent)
        .ok_or_else(|| InjectionError::AnchorNotFound(rule.anchors.clone()))?;
    parent
        .children
        .insert(point.index, ThinkNode::new(rule.node_kind.clone()));
    Ok(point)
}

/// How agent evaluations are triggered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EvaluationDriver {
    /// The host tree calls the engine for each agent it thinks for
    ThinkTree { node_path: Vec<usize> },
    /// The engine walks due agents from its own tick
    #[default]
    TickDriven,
}

impl EvaluationDriver {
    pub fn is_tick_driven(&self) -> bool {
        matches!(self, EvaluationDriver::TickDriven)
    }
}

/// Injects the evaluation node, falling back to tick-driven evaluation.
pub fn install(tree: &mut ThinkNode, rule: &InjectionRule) -> EvaluationDriver {
    match inject(tree, rule) {
        Ok(point) => {
            let mut node_path = point.parent;
            node_path.push(point.index);
            tracing::info!("Injected {} into think tree at {:?}", rule.node_kind, node_path);
            EvaluationDriver::ThinkTree { node_path }
        }
        Err(InjectionError::AlreadyInjected(node_path)) => {
            tracing::debug!("{} already present at {:?}", rule.node_kind, node_path);
            EvaluationDriver::ThinkTree { node_path }
        }
        Err(e) => {
            tracing::warn!("Think-tree injection failed: {}; evaluating from tick instead", e);
            EvaluationDriver::TickDriven
        }
    }
}
