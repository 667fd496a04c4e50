//! Search tree over program-sequence prefixes
//!
//! Nodes live in an arena and are never removed during a run. Children are
//! kept in program-ID order so every tie in selection resolves to the lowest
//! program ID.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ClusterId, ProgramId};

use super::space::ActionSpace;

/// Index of a node in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Parameters of the selection score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Weight of the UCB exploration term
    pub exploration_constant: f64,
    /// Weight of a child's last diversity score
    pub diversity_bonus: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            exploration_constant: std::f64::consts::SQRT_2,
            diversity_bonus: 0.1,
        }
    }
}

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// No children yet
    Unexpanded,
    /// At least one child created
    Expanded,
    /// No eligible next programs
    Terminal,
}

/// One prefix in the search tree
#[derive(Debug, Clone)]
pub struct Node {
    prefix: Vec<ProgramId>,
    parent: Option<NodeId>,
    children: BTreeMap<ProgramId, NodeId>,
    eligible: Vec<ProgramId>,
    visit_count: u64,
    total_value: f64,
    cluster_id: Option<ClusterId>,
    last_diversity: f64,
    failed: bool,
    exhausted: bool,
}

impl Node {
    fn new(prefix: Vec<ProgramId>, parent: Option<NodeId>, mut eligible: Vec<ProgramId>) -> Self {
        eligible.sort_unstable();
        eligible.dedup();
        Self {
            prefix,
            parent,
            children: BTreeMap::new(),
            eligible,
            visit_count: 0,
            total_value: 0.0,
            cluster_id: None,
            last_diversity: 0.0,
            failed: false,
            exhausted: false,
        }
    }

    pub fn prefix(&self) -> &[ProgramId] {
        &self.prefix
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &BTreeMap<ProgramId, NodeId> {
        &self.children
    }

    pub fn eligible(&self) -> &[ProgramId] {
        &self.eligible
    }

    pub fn visit_count(&self) -> u64 {
        self.visit_count
    }

    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    /// `total_value / visit_count`, or `None` before the first visit
    pub fn mean_value(&self) -> Option<f64> {
        (self.visit_count > 0).then(|| self.total_value / self.visit_count as f64)
    }

    pub fn cluster_id(&self) -> Option<ClusterId> {
        self.cluster_id
    }

    pub fn last_diversity(&self) -> f64 {
        self.last_diversity
    }

    /// Whether this node's rollout failed
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Whether selection can still find anything below this node
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn state(&self) -> NodeState {
        if self.eligible.is_empty() {
            NodeState::Terminal
        } else if self.children.is_empty() {
            NodeState::Unexpanded
        } else {
            NodeState::Expanded
        }
    }

    /// Eligible programs without a child yet, ascending
    pub fn untried(&self) -> impl Iterator<Item = ProgramId> + '_ {
        self.eligible
            .iter()
            .copied()
            .filter(|p| !self.children.contains_key(p))
    }

    fn has_untried(&self) -> bool {
        self.untried().next().is_some()
    }

    /// Created by an expansion but never evaluated
    pub fn is_pending(&self) -> bool {
        self.parent.is_some() && self.visit_count == 0 && !self.failed
    }
}

/// Result of walking the tree with the selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// First node on the path with an untried program
    Expand(NodeId),
    /// A child whose evaluation was cut short; run it before expanding below
    Evaluate(NodeId),
    /// Nothing left to explore anywhere in the tree
    Exhausted,
}

/// Greedy path by mean value
#[derive(Debug, Clone, PartialEq)]
pub struct BestPath {
    pub node: NodeId,
    pub programs: Vec<ProgramId>,
    pub mean_value: Option<f64>,
}

/// Arena-backed search tree
#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: Vec<Node>,
    policy: SelectionPolicy,
}

impl SearchTree {
    /// Create a tree whose root (empty prefix) may expand into `root_eligible`
    pub fn new(root_eligible: Vec<ProgramId>, policy: SelectionPolicy) -> Self {
        let mut root = Node::new(Vec::new(), None, root_eligible);
        root.exhausted = root.eligible.is_empty();
        Self {
            nodes: vec![root],
            policy,
        }
    }

    /// Create a tree rooted with the programs `space` allows first
    pub fn from_space(space: &dyn ActionSpace, policy: SelectionPolicy) -> Self {
        Self::new(space.next_programs(&[]), policy)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Node by ID. IDs are only produced by this tree, so they are always valid.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn child(&self, parent: NodeId, program: ProgramId) -> Option<NodeId> {
        self.node(parent).children.get(&program).copied()
    }

    /// Node for an exact prefix, if it has been created
    pub fn find(&self, prefix: &[ProgramId]) -> Option<NodeId> {
        prefix
            .iter()
            .try_fold(self.root(), |node, &program| self.child(node, program))
    }

    /// Deepest prefix length in the tree
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.prefix.len()).max().unwrap_or(0)
    }

    /// Walk from the root to the expansion point
    pub fn select(&self) -> Selection {
        let mut current = self.root();
        loop {
            let node = self.node(current);
            if node.exhausted {
                return Selection::Exhausted;
            }
            if node.is_pending() {
                return Selection::Evaluate(current);
            }
            if node.has_untried() {
                return Selection::Expand(current);
            }
            match self.best_child(current) {
                Some(next) => current = next,
                None => return Selection::Exhausted,
            }
        }
    }

    /// Selection score of `child` under a parent visited `parent_visits` times
    pub fn score(&self, child: NodeId, parent_visits: u64) -> f64 {
        let node = self.node(child);
        let Some(mean) = node.mean_value() else {
            return f64::INFINITY;
        };
        let ln_parent = (parent_visits.max(1) as f64).ln();
        let exploration =
            self.policy.exploration_constant * (ln_parent / node.visit_count as f64).sqrt();
        mean + exploration + self.policy.diversity_bonus * node.last_diversity
    }

    /// Highest-scoring non-exhausted child; ties go to the lowest program ID
    fn best_child(&self, parent: NodeId) -> Option<NodeId> {
        let parent_visits = self.node(parent).visit_count;
        let mut best: Option<(NodeId, f64)> = None;
        for &child in self.node(parent).children.values() {
            if self.node(child).exhausted {
                continue;
            }
            let score = self.score(child, parent_visits);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((child, score));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Create up to `width` children for the lowest untried programs of `at`
    pub fn expand(&mut self, at: NodeId, width: usize, space: &dyn ActionSpace) -> Vec<NodeId> {
        let picks: Vec<ProgramId> = self.node(at).untried().take(width.max(1)).collect();
        let mut created = Vec::with_capacity(picks.len());

        for program in picks {
            let mut prefix = self.node(at).prefix.clone();
            prefix.push(program);
            let eligible = space.next_programs(&prefix);

            let id = NodeId(self.nodes.len());
            self.nodes.push(Node::new(prefix, Some(at), eligible));
            self.nodes[at.0].children.insert(program, id);
            created.push(id);
        }

        created
    }

    /// Remember the behavioral cluster and diversity of a node's rollout
    pub fn record_assignment(&mut self, node: NodeId, cluster_id: ClusterId, diversity: f64) {
        let node = &mut self.nodes[node.0];
        node.cluster_id = Some(cluster_id);
        node.last_diversity = diversity;
    }

    /// Mark a node's rollout as failed; the branch is never expanded further
    pub fn mark_failed(&mut self, node: NodeId) {
        let node = &mut self.nodes[node.0];
        node.failed = true;
        node.exhausted = true;
    }

    /// Add one visit and `value` to every node from `from` up to the root
    pub fn backpropagate(&mut self, from: NodeId, value: f64) {
        let mut current = Some(from);
        while let Some(id) = current {
            let node = &mut self.nodes[id.0];
            node.visit_count += 1;
            node.total_value += value;
            current = node.parent;
            self.refresh_exhausted(id);
        }
    }

    fn refresh_exhausted(&mut self, id: NodeId) {
        let node = self.node(id);
        let exhausted = node.failed
            || (!node.has_untried()
                && node
                    .children
                    .values()
                    .all(|&child| self.node(child).exhausted));
        self.nodes[id.0].exhausted = exhausted;
    }

    /// IDs from `node` up to and including the root
    pub fn path_to_root(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = vec![node];
        let mut current = self.node(node).parent;
        while let Some(id) = current {
            path.push(id);
            current = self.node(id).parent;
        }
        path
    }

    /// Follow the highest-mean visited, non-failed child from the root
    pub fn best_path(&self) -> BestPath {
        let mut current = self.root();
        loop {
            let mut best: Option<(NodeId, f64)> = None;
            for &child in self.node(current).children.values() {
                let node = self.node(child);
                if node.failed {
                    continue;
                }
                if let Some(mean) = node.mean_value()
                    && best.is_none_or(|(_, best_mean)| mean > best_mean)
                {
                    best = Some((child, mean));
                }
            }
            match best {
                Some((child, _)) => current = child,
                None => break,
            }
        }

        let node = self.node(current);
        BestPath {
            node: current,
            programs: node.prefix.clone(),
            mean_value: if current == self.root() {
                None
            } else {
                node.mean_value()
            },
        }
    }
}
