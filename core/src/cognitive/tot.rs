//! Tree of Thoughts search
//!
//! Breadth-first beam search over generated thoughts: each step expands
//! every frontier thought into k children, scores them, and keeps the best
//! b. Ties break deterministically by insertion order.

use crate::agents::evaluation::ThoughtEvaluatorAgent;
use crate::agents::AgentContext;
use crate::error::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Arena-allocated thought tree. Nodes refer to their parent by index, so
/// the parent chain is acyclic by construction.
pub struct ThoughtTree {
    nodes: Vec<ThoughtNode>,
}

pub struct ThoughtNode {
    pub state: String,
    pub parent: Option<usize>,
    pub score: f64,
}

impl ThoughtTree {
    pub fn with_root(state: impl Into<String>) -> Self {
        Self {
            nodes: vec![ThoughtNode {
                state: state.into(),
                parent: None,
                score: 0.0,
            }],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn add_child(&mut self, parent: usize, state: impl Into<String>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(ThoughtNode {
            state: state.into(),
            parent: Some(parent),
            score: 0.0,
        });
        id
    }

    pub fn node(&self, id: usize) -> &ThoughtNode {
        &self.nodes[id]
    }

    pub fn set_score(&mut self, id: usize, score: f64) {
        self.nodes[id].score = score;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The path of states from the root to `id`, inclusive.
    pub fn path_to(&self, id: usize) -> Vec<&str> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(i) = cursor {
            path.push(self.nodes[i].state.as_str());
            cursor = self.nodes[i].parent;
        }
        path.reverse();
        path
    }

    /// The highest-scoring node in the whole tree; the first-inserted wins
    /// on equal scores.
    pub fn best(&self) -> usize {
        let mut best = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.score > self.nodes[best].score {
                best = i;
            }
        }
        best
    }
}

pub struct TreeOfThoughtsAgent {
    ctx: AgentContext,
    evaluator: ThoughtEvaluatorAgent,
}

impl TreeOfThoughtsAgent {
    pub fn new(ctx: AgentContext, evaluator: ThoughtEvaluatorAgent) -> Self {
        Self { ctx, evaluator }
    }

    async fn generate_child(
        &self,
        query: &str,
        parent_state: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let context = format!(
            "Current thought: '{}'\nPropose the next step that develops this thought.",
            parent_state
        );
        self.ctx
            .complete(
                "THOUGHT_GENERATION_PROMPT",
                &[("query", query), ("context", context.as_str())],
                cancel,
            )
            .await
    }

    /// Run the search: `k` children per expansion, depth `t`, beam `b`.
    /// Returns the tree and the id of the best thought found.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        t: usize,
        b: usize,
        cancel: &CancellationToken,
    ) -> Result<(ThoughtTree, usize)> {
        let mut tree = ThoughtTree::with_root(query);
        let mut frontier = vec![tree.root()];

        for step in 1..=t {
            debug!(step, t, frontier = frontier.len(), "tree-of-thoughts step");

            let mut children: Vec<usize> = Vec::new();
            for &thought in &frontier {
                for _ in 0..k {
                    let state = self
                        .generate_child(query, &tree.node(thought).state, cancel)
                        .await?;
                    if state.is_empty() {
                        continue;
                    }
                    children.push(tree.add_child(thought, state));
                }
            }

            if children.is_empty() {
                warn!("no child thoughts produced; stopping the search early");
                break;
            }

            for &child in &children {
                let path = tree.path_to(child).join("\n -> ");
                let score = self.evaluator.score(query, &path, cancel).await?;
                tree.set_score(child, score);
            }

            // Stable sort keeps insertion order on score ties.
            children.sort_by(|&a, &b_id| {
                tree.node(b_id)
                    .score
                    .partial_cmp(&tree.node(a).score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            children.truncate(b);
            frontier = children;
        }

        let best = tree.best();
        info!(
            thoughts = tree.len(),
            best_score = tree.node(best).score,
            "tree-of-thoughts search finished"
        );
        Ok((tree, best))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_context;

    #[test]
    fn test_path_to_traverses_parent_chain() {
        let mut tree = ThoughtTree::with_root("Q");
        let a = tree.add_child(tree.root(), "A");
        let ab = tree.add_child(a, "AB");
        assert_eq!(tree.path_to(ab), vec!["Q", "A", "AB"]);
    }

    #[test]
    fn test_best_breaks_ties_by_insertion_order() {
        let mut tree = ThoughtTree::with_root("Q");
        let first = tree.add_child(tree.root(), "first");
        let second = tree.add_child(tree.root(), "second");
        tree.set_score(first, 0.8);
        tree.set_score(second, 0.8);
        assert_eq!(tree.best(), first);
    }

    #[tokio::test]
    async fn test_beam_search_finds_best_leaf() {
        // k=2, T=2, b=1 with scripted generations and evaluator scores:
        // A: 0.2, B: 0.9 -> beam keeps B; BA: 0.1, BB: 0.95 -> best is BB.
        let (ctx, _) = mock_context(vec![
            "A".to_string(),
            "B".to_string(),
            r#"{"score": 0.2}"#.to_string(),
            r#"{"score": 0.9}"#.to_string(),
            "BA".to_string(),
            "BB".to_string(),
            r#"{"score": 0.1}"#.to_string(),
            r#"{"score": 0.95}"#.to_string(),
        ]);
        let evaluator = ThoughtEvaluatorAgent::new(ctx.clone());
        let agent = TreeOfThoughtsAgent::new(ctx, evaluator);

        let (tree, best) = agent
            .search("solve it", 2, 2, 1, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tree.node(best).state, "BB");
        assert!((tree.node(best).score - 0.95).abs() < f64::EPSILON);
        // Root + A + B + BA + BB
        assert_eq!(tree.len(), 5);
    }

    #[tokio::test]
    async fn test_search_stops_when_no_children_generated() {
        // Mock returns empty strings once the script is exhausted, which
        // the search treats as "no children produced".
        let (ctx, _) = mock_context(vec![]);
        let evaluator = ThoughtEvaluatorAgent::new(ctx.clone());
        let agent = TreeOfThoughtsAgent::new(ctx, evaluator);

        let (tree, best) = agent
            .search("stalled", 2, 3, 2, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(best, tree.root());
    }
}
