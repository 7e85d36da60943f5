//! Cooper-Harvey-Kennedy iterative dominator computation (spec §4.C).

use std::collections::{BTreeMap, BTreeSet};

use crate::cfg::{BlockId, Cfg};

/// Dominance metadata for a [`Cfg`]: immediate dominators, the dominator
/// tree, dominance frontiers, and a preorder/postorder DFS labelling of the
/// dominator tree for O(1) domination tests (spec §4.C "Property").
#[derive(Debug, Clone)]
pub struct DominanceInfo {
    idom: BTreeMap<BlockId, Option<BlockId>>,
    children: BTreeMap<BlockId, Vec<BlockId>>,
    frontier: BTreeMap<BlockId, BTreeSet<BlockId>>,
    preorder: BTreeMap<BlockId, usize>,
    postorder: BTreeMap<BlockId, usize>,
}

impl DominanceInfo {
    /// Compute dominance metadata for `cfg`.
    #[must_use]
    pub fn compute(cfg: &Cfg) -> Self {
        let rpo = reverse_post_order(cfg);
        let idom = compute_immediate_dominators(cfg, &rpo);
        let children = build_dominator_tree(cfg, &idom);
        let frontier = compute_dominance_frontier(cfg, &idom);
        let (preorder, postorder) = label_dominator_tree(cfg.entry(), &children);
        Self {
            idom,
            children,
            frontier,
            preorder,
            postorder,
        }
    }

    /// `block`'s immediate dominator, or `None` for the entry block.
    #[must_use]
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied().flatten()
    }

    /// `block`'s children in the dominator tree.
    #[must_use]
    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children
            .get(&block)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `block`'s dominance frontier.
    #[must_use]
    pub fn dominance_frontier(&self, block: BlockId) -> &BTreeSet<BlockId> {
        static EMPTY: BTreeSet<BlockId> = BTreeSet::new();
        self.frontier.get(&block).unwrap_or(&EMPTY)
    }

    /// Whether `a` dominates `b` (reflexively: every block dominates itself).
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let (Some(&pre_a), Some(&post_a)) = (self.preorder.get(&a), self.postorder.get(&a)) else {
            return false;
        };
        let (Some(&pre_b), Some(&post_b)) = (self.preorder.get(&b), self.postorder.get(&b)) else {
            return false;
        };
        // `a` dominates `b` in the dominator tree iff `a`'s preorder/postorder
        // interval contains `b`'s.
        pre_a <= pre_b && post_b <= post_a
    }

    /// Whether `a` strictly dominates `b` (`a` dominates `b` and `a != b`).
    #[must_use]
    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Blocks in the dominator tree that were never reached from the entry
    /// (spec §4.F check 2 uses this to flag unreachable blocks).
    #[must_use]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.preorder.contains_key(&block)
    }
}

fn dfs_post_order(cfg: &Cfg) -> Vec<BlockId> {
    let mut visited = vec![false; cfg.blocks.len()];
    let mut order = Vec::new();
    let mut stack = vec![(cfg.entry(), 0usize)];
    visited[cfg.entry().0] = true;

    while let Some((block, next_succ)) = stack.pop() {
        if next_succ < cfg.blocks[block.0].successors.len() {
            let succ = cfg.blocks[block.0].successors[next_succ];
            stack.push((block, next_succ + 1));
            if !visited[succ.0] {
                visited[succ.0] = true;
                stack.push((succ, 0));
            }
        } else {
            order.push(block);
        }
    }
    order
}

/// Reverse post-order from the entry block, following successors.
fn reverse_post_order(cfg: &Cfg) -> Vec<BlockId> {
    let mut order = dfs_post_order(cfg);
    order.reverse();
    order
}

fn compute_immediate_dominators(
    cfg: &Cfg,
    rpo: &[BlockId],
) -> BTreeMap<BlockId, Option<BlockId>> {
    let rpo_number: BTreeMap<BlockId, usize> =
        rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();
    let mut idom: BTreeMap<BlockId, Option<BlockId>> = BTreeMap::new();
    idom.insert(cfg.entry(), Some(cfg.entry()));

    let mut changed = true;
    while changed {
        changed = false;
        for &block in rpo.iter() {
            if block == cfg.entry() {
                continue;
            }
            let preds = &cfg.blocks[block.0].predecessors;
            let mut new_idom = None;
            for &pred in preds {
                if idom.get(&pred).map(Option::is_some).unwrap_or(false) {
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => {
                            intersect(current, pred, &idom, &rpo_number).unwrap_or(current)
                        }
                    });
                }
            }
            if let Some(computed) = new_idom {
                if idom.get(&block).copied().flatten() != Some(computed) {
                    idom.insert(block, Some(computed));
                    changed = true;
                }
            }
        }
    }

    idom.insert(cfg.entry(), None);
    idom
}

/// Finger-pointer walk up the (partially built) dominator tree to find the
/// common dominator of `a` and `b`, using RPO numbers as the ordering.
fn intersect(
    mut a: BlockId,
    mut b: BlockId,
    idom: &BTreeMap<BlockId, Option<BlockId>>,
    rpo_number: &BTreeMap<BlockId, usize>,
) -> Option<BlockId> {
    while a != b {
        while rpo_number[&a] > rpo_number[&b] {
            a = idom.get(&a).copied().flatten()?;
        }
        while rpo_number[&b] > rpo_number[&a] {
            b = idom.get(&b).copied().flatten()?;
        }
    }
    Some(a)
}

fn build_dominator_tree(
    cfg: &Cfg,
    idom: &BTreeMap<BlockId, Option<BlockId>>,
) -> BTreeMap<BlockId, Vec<BlockId>> {
    let mut children: BTreeMap<BlockId, Vec<BlockId>> = BTreeMap::new();
    for i in 0..cfg.blocks.len() {
        children.insert(BlockId(i), Vec::new());
    }
    for (&block, &parent) in idom {
        if let Some(parent) = parent {
            if parent != block {
                children.entry(parent).or_default().push(block);
            }
        }
    }
    for list in children.values_mut() {
        list.sort();
    }
    children
}

fn compute_dominance_frontier(
    cfg: &Cfg,
    idom: &BTreeMap<BlockId, Option<BlockId>>,
) -> BTreeMap<BlockId, BTreeSet<BlockId>> {
    let mut frontier: BTreeMap<BlockId, BTreeSet<BlockId>> = BTreeMap::new();
    for i in 0..cfg.blocks.len() {
        let block = BlockId(i);
        let preds = &cfg.blocks[i].predecessors;
        if preds.len() < 2 {
            continue;
        }
        let Some(block_idom) = idom.get(&block).copied().flatten() else {
            continue;
        };
        for &pred in preds {
            if idom.get(&pred).map(Option::is_none).unwrap_or(true) && pred != cfg.entry() {
                continue;
            }
            let mut runner = pred;
            while runner != block_idom {
                frontier.entry(runner).or_default().insert(block);
                match idom.get(&runner).copied().flatten() {
                    Some(next) if next != runner => runner = next,
                    _ => break,
                }
            }
        }
    }
    frontier
}

fn label_dominator_tree(
    root: BlockId,
    children: &BTreeMap<BlockId, Vec<BlockId>>,
) -> (BTreeMap<BlockId, usize>, BTreeMap<BlockId, usize>) {
    let mut preorder = BTreeMap::new();
    let mut postorder = BTreeMap::new();
    let mut pre_counter = 0usize;
    let mut post_counter = 0usize;

    // (node, child index already visited)
    let mut stack = vec![(root, 0usize)];
    preorder.insert(root, pre_counter);
    pre_counter += 1;

    while let Some((node, next_child)) = stack.pop() {
        let empty = Vec::new();
        let kids = children.get(&node).unwrap_or(&empty);
        if next_child < kids.len() {
            let child = kids[next_child];
            stack.push((node, next_child + 1));
            preorder.insert(child, pre_counter);
            pre_counter += 1;
            stack.push((child, 0));
        } else {
            postorder.insert(node, post_counter);
            post_counter += 1;
        }
    }

    (preorder, postorder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::CfgBlock;

    fn cfg_from_edges(edges: Vec<Vec<usize>>) -> Cfg {
        let mut blocks: Vec<CfgBlock> = edges
            .iter()
            .enumerate()
            .map(|(i, succ)| CfgBlock {
                label: format!("b{i}"),
                start: i,
                end: i + 1,
                successors: succ.iter().map(|&s| BlockId(s)).collect(),
                predecessors: Vec::new(),
            })
            .collect();
        let mut predecessors = vec![Vec::new(); blocks.len()];
        for (i, block) in blocks.iter().enumerate() {
            for &succ in &block.successors {
                predecessors[succ.0].push(BlockId(i));
            }
        }
        for (block, preds) in blocks.iter_mut().zip(predecessors) {
            block.predecessors = preds;
        }
        Cfg {
            instructions: Vec::new(),
            blocks,
        }
    }

    #[test]
    fn straight_line_idom_chain() {
        let cfg = cfg_from_edges(vec![vec![1], vec![2], vec![]]);
        let dom = DominanceInfo::compute(&cfg);
        assert_eq!(dom.idom(BlockId(1)), Some(BlockId(0)));
        assert_eq!(dom.idom(BlockId(2)), Some(BlockId(1)));
        assert!(dom.dominates(BlockId(0), BlockId(2)));
    }

    #[test]
    fn diamond_idom_is_entry_for_merge_block() {
        // 0 -> 1, 2; 1 -> 3; 2 -> 3.
        let cfg = cfg_from_edges(vec![vec![1, 2], vec![3], vec![3], vec![]]);
        let dom = DominanceInfo::compute(&cfg);
        assert_eq!(dom.idom(BlockId(1)), Some(BlockId(0)));
        assert_eq!(dom.idom(BlockId(2)), Some(BlockId(0)));
        assert_eq!(dom.idom(BlockId(3)), Some(BlockId(0)));
        assert!(dom.dominates(BlockId(0), BlockId(3)));
        assert!(!dom.dominates(BlockId(1), BlockId(3)));
        assert!(!dom.dominates(BlockId(2), BlockId(3)));
    }

    #[test]
    fn diamond_merge_block_is_in_branch_frontiers() {
        let cfg = cfg_from_edges(vec![vec![1, 2], vec![3], vec![3], vec![]]);
        let dom = DominanceInfo::compute(&cfg);
        assert!(dom.dominance_frontier(BlockId(1)).contains(&BlockId(3)));
        assert!(dom.dominance_frontier(BlockId(2)).contains(&BlockId(3)));
        assert!(dom.dominance_frontier(BlockId(0)).is_empty());
    }

    #[test]
    fn loop_header_is_in_own_frontier() {
        // 0 -> 1; 1 -> 2, 1 (self loop via 2 back to 1); 2 -> 1, 3.
        let cfg = cfg_from_edges(vec![vec![1], vec![2], vec![1, 3], vec![]]);
        let dom = DominanceInfo::compute(&cfg);
        assert!(dom.dominance_frontier(BlockId(2)).contains(&BlockId(1)));
    }
}
