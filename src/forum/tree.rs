//! Comment forests: building them from flat lists and rewriting them
//! without touching the original.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{Comment, CommentId, CommentNode, Forest};

/// Build a forest from comments that reference their parent by id.
///
/// Roots and siblings keep input order. A comment whose parent is missing,
/// is itself, or would close a parent cycle becomes a root, so every input
/// comment appears exactly once.
pub fn build(comments: &[Comment]) -> Forest {
  let index: HashMap<CommentId, usize> = comments
    .iter()
    .enumerate()
    .map(|(i, c)| (c.id, i))
    .collect();

  let mut parent: Vec<Option<usize>> = comments
    .iter()
    .map(|c| {
      c.parent_comment_id
        .filter(|p| *p != c.id)
        .and_then(|p| index.get(&p).copied())
    })
    .collect();

  break_cycles(&mut parent);

  let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
  let mut roots = Vec::new();
  for (i, p) in parent.iter().enumerate() {
    match p {
      Some(p) => children[*p].push(i),
      None => roots.push(i),
    }
  }

  roots
    .into_iter()
    .map(|i| assemble(i, comments, &children))
    .collect()
}

/// Cut the parent link that closes each cycle, turning that comment into a root.
fn break_cycles(parent: &mut [Option<usize>]) {
  #[derive(Clone, Copy, PartialEq)]
  enum Mark {
    Unvisited,
    OnPath,
    Done,
  }

  let mut marks = vec![Mark::Unvisited; parent.len()];
  let mut path = Vec::new();

  for start in 0..parent.len() {
    let mut current = start;
    while marks[current] == Mark::Unvisited {
      marks[current] = Mark::OnPath;
      path.push(current);
      match parent[current] {
        Some(p) if marks[p] == Mark::OnPath => {
          parent[current] = None;
          break;
        }
        Some(p) => current = p,
        None => break,
      }
    }
    for i in path.drain(..) {
      marks[i] = Mark::Done;
    }
  }
}

fn assemble(i: usize, comments: &[Comment], children: &[Vec<usize>]) -> Arc<CommentNode> {
  Arc::new(CommentNode {
    comment: comments[i].clone(),
    replies: children[i]
      .iter()
      .map(|&c| assemble(c, comments, children))
      .collect(),
  })
}

/// Replace the node with `target` by `update(node)`, anywhere in the forest.
///
/// Only the nodes on the path to the target are copied; every other subtree
/// is shared with the input. Returns the input unchanged (shared) when the
/// target is absent.
pub fn patch<F>(forest: &Forest, target: CommentId, update: F) -> Forest
where
  F: FnOnce(&CommentNode) -> CommentNode,
{
  let mut update = Some(update);
  patch_level(forest, target, &mut update).unwrap_or_else(|| forest.clone())
}

fn patch_level<F>(forest: &Forest, target: CommentId, update: &mut Option<F>) -> Option<Forest>
where
  F: FnOnce(&CommentNode) -> CommentNode,
{
  for (pos, node) in forest.iter().enumerate() {
    let replaced = if node.id() == target {
      update.take().map(|f| Arc::new(f(node)))
    } else {
      patch_level(&node.replies, target, update).map(|replies| {
        Arc::new(CommentNode {
          comment: node.comment.clone(),
          replies,
        })
      })
    };

    if let Some(replaced) = replaced {
      let mut next = forest.clone();
      next[pos] = replaced;
      return Some(next);
    }
  }
  None
}

/// Append `reply` to the replies of `parent`, at any depth.
/// `None` when the parent is not in the forest.
pub fn insert_reply(forest: &Forest, parent: CommentId, reply: CommentNode) -> Option<Forest> {
  find(forest, parent)?;
  Some(patch(forest, parent, |node| {
    let mut node = node.clone();
    node.replies.push(Arc::new(reply));
    node
  }))
}

/// Flag `best` as the best answer among the root comments and clear the flag
/// on every other root. Replies are left as they are.
pub fn mark_best_answer(forest: &Forest, best: CommentId) -> Forest {
  forest
    .iter()
    .map(|node| {
      let is_best = node.id() == best;
      if node.comment.best_answer == is_best {
        Arc::clone(node)
      } else {
        Arc::new(node.map_comment(|c| c.best_answer = is_best))
      }
    })
    .collect()
}

/// Depth-first lookup of a comment by id.
pub fn find(forest: &Forest, id: CommentId) -> Option<&Arc<CommentNode>> {
  forest.iter().find_map(|node| {
    if node.id() == id {
      Some(node)
    } else {
      find(&node.replies, id)
    }
  })
}

/// Every comment with its depth (roots at 0), in depth-first pre-order.
pub fn preorder(forest: &Forest) -> Vec<(usize, &Comment)> {
  let mut out = Vec::with_capacity(count(forest));
  let mut stack: Vec<(usize, &Arc<CommentNode>)> = forest.iter().rev().map(|n| (0, n)).collect();

  while let Some((depth, node)) = stack.pop() {
    out.push((depth, &node.comment));
    stack.extend(node.replies.iter().rev().map(|n| (depth + 1, n)));
  }
  out
}

/// Rebuild a forest from `preorder` output. A depth more than one below
/// the previous comment is clamped to make it a reply of that comment.
pub fn from_preorder<I>(items: I) -> Forest
where
  I: IntoIterator<Item = (usize, Comment)>,
{
  let mut roots = Forest::new();
  let mut open: Vec<CommentNode> = Vec::new();

  for (depth, comment) in items {
    while open.len() > depth {
      close_last(&mut open, &mut roots);
    }
    open.push(CommentNode::leaf(comment));
  }
  while !open.is_empty() {
    close_last(&mut open, &mut roots);
  }
  roots
}

fn close_last(open: &mut Vec<CommentNode>, roots: &mut Forest) {
  if let Some(node) = open.pop() {
    let node = Arc::new(node);
    match open.last_mut() {
      Some(parent) => parent.replies.push(node),
      None => roots.push(node),
    }
  }
}

/// Number of comments in the forest.
pub fn count(forest: &Forest) -> usize {
  forest.iter().map(|node| 1 + count(&node.replies)).sum()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn comment(id: u64, parent: Option<u64>) -> Comment {
    Comment {
      id: CommentId(id),
      parent_comment_id: parent.map(CommentId),
      content: format!("comment {}", id),
      ..Default::default()
    }
  }

  fn ids(forest: &Forest) -> Vec<u64> {
    forest.iter().map(|n| n.id().0).collect()
  }

  /// (id, parent id in the built forest) for every node, depth-first.
  fn placements(forest: &Forest, parent: Option<u64>, out: &mut Vec<(u64, Option<u64>)>) {
    for node in forest {
      out.push((node.id().0, parent));
      placements(&node.replies, Some(node.id().0), out);
    }
  }

  #[test]
  fn test_empty_input_builds_empty_forest() {
    assert!(build(&[]).is_empty());
  }

  #[test]
  fn test_orphan_is_demoted_to_root() {
    let forest = build(&[comment(1, None), comment(2, Some(1)), comment(3, Some(99))]);

    assert_eq!(ids(&forest), vec![1, 3]);
    assert_eq!(ids(&forest[0].replies), vec![2]);
    assert!(forest[0].replies[0].replies.is_empty());
    assert!(forest[1].replies.is_empty());
  }

  #[test]
  fn test_every_comment_placed_once_under_its_parent() {
    let input = vec![
      comment(5, Some(1)),
      comment(1, None),
      comment(2, Some(1)),
      comment(3, Some(2)),
      comment(4, Some(42)),
      comment(6, Some(3)),
    ];
    let forest = build(&input);

    let mut placed = Vec::new();
    placements(&forest, None, &mut placed);
    assert_eq!(placed.len(), input.len());
    assert_eq!(count(&forest), input.len());

    for c in &input {
      let (_, parent) = placed.iter().find(|(id, _)| *id == c.id.0).unwrap();
      let expected = c
        .parent_comment_id
        .filter(|p| input.iter().any(|other| other.id == *p))
        .map(|p| p.0);
      assert_eq!(*parent, expected, "comment {}", c.id);
    }
  }

  #[test]
  fn test_sibling_order_follows_input() {
    let forest = build(&[
      comment(1, None),
      comment(30, Some(1)),
      comment(10, Some(1)),
      comment(7, None),
      comment(20, Some(1)),
    ]);

    assert_eq!(ids(&forest), vec![1, 7]);
    assert_eq!(ids(&forest[0].replies), vec![30, 10, 20]);
  }

  #[test]
  fn test_reply_listed_before_parent_still_attaches() {
    let forest = build(&[comment(2, Some(1)), comment(1, None)]);
    assert_eq!(ids(&forest), vec![1]);
    assert_eq!(ids(&forest[0].replies), vec![2]);
  }

  #[test]
  fn test_build_is_deterministic() {
    let input = vec![comment(1, None), comment(2, Some(1)), comment(3, Some(2))];
    assert_eq!(build(&input), build(&input));
  }

  #[test]
  fn test_build_leaves_input_untouched() {
    let input = vec![comment(1, None), comment(2, Some(1))];
    let before = input.clone();
    let _ = build(&input);
    assert_eq!(input, before);
  }

  #[test]
  fn test_self_reference_becomes_root() {
    let forest = build(&[comment(1, Some(1)), comment(2, Some(1))]);
    assert_eq!(ids(&forest), vec![1]);
    assert_eq!(ids(&forest[0].replies), vec![2]);
  }

  #[test]
  fn test_parent_cycle_is_broken() {
    let forest = build(&[comment(3, Some(1)), comment(1, Some(2)), comment(2, Some(1))]);

    assert_eq!(count(&forest), 3);
    assert_eq!(ids(&forest), vec![2]);
    assert_eq!(ids(&forest[0].replies), vec![1]);
    assert_eq!(ids(&forest[0].replies[0].replies), vec![3]);
  }

  #[test]
  fn test_patch_replaces_nested_node_and_shares_the_rest() {
    let forest = build(&[
      comment(1, None),
      comment(2, Some(1)),
      comment(3, Some(1)),
      comment(4, None),
    ]);

    let patched = patch(&forest, CommentId(3), |node| {
      node.map_comment(|c| c.upvotes = 10)
    });

    assert_eq!(patched[0].replies[1].comment.upvotes, 10);
    assert_eq!(forest[0].replies[1].comment.upvotes, 0);
    assert!(Arc::ptr_eq(&patched[1], &forest[1]));
    assert!(Arc::ptr_eq(&patched[0].replies[0], &forest[0].replies[0]));
    assert!(!Arc::ptr_eq(&patched[0], &forest[0]));
  }

  #[test]
  fn test_patch_missing_target_returns_same_forest() {
    let forest = build(&[comment(1, None)]);
    let patched = patch(&forest, CommentId(9), |node| node.clone());
    assert!(Arc::ptr_eq(&patched[0], &forest[0]));
  }

  #[test]
  fn test_insert_reply_at_depth() {
    let forest = build(&[comment(1, None), comment(2, Some(1)), comment(3, Some(2))]);

    let inserted = insert_reply(&forest, CommentId(3), CommentNode::leaf(comment(8, Some(3))))
      .unwrap();
    let node = find(&inserted, CommentId(3)).unwrap();
    assert_eq!(ids(&node.replies), vec![8]);
    assert!(find(&forest, CommentId(8)).is_none());
  }

  #[test]
  fn test_mark_best_answer_only_among_roots() {
    let mut input = vec![
      comment(10, None),
      comment(11, None),
      comment(12, None),
      comment(13, Some(10)),
    ];
    input[0].best_answer = true;
    input[3].best_answer = true;
    let forest = build(&input);

    let marked = mark_best_answer(&forest, CommentId(11));
    let flags: Vec<bool> = marked.iter().map(|n| n.comment.best_answer).collect();
    assert_eq!(flags, vec![false, true, false]);
    assert!(marked[0].replies[0].comment.best_answer);
    assert!(Arc::ptr_eq(&marked[2], &forest[2]));
  }

  #[test]
  fn test_preorder_round_trip_keeps_broken_cycle_shape() {
    let forest = build(&[
      comment(3, Some(1)),
      comment(1, Some(2)),
      comment(2, Some(1)),
      comment(4, None),
      comment(5, Some(4)),
    ]);

    let flat: Vec<(usize, Comment)> = preorder(&forest)
      .into_iter()
      .map(|(depth, c)| (depth, c.clone()))
      .collect();
    let depths: Vec<usize> = flat.iter().map(|(d, _)| *d).collect();
    assert_eq!(depths, vec![0, 1, 2, 0, 1]);

    assert_eq!(from_preorder(flat), forest);
  }

  #[test]
  fn test_from_preorder_clamps_depth_jumps() {
    let forest = from_preorder(vec![(0, comment(1, None)), (3, comment(2, Some(1)))]);
    assert_eq!(ids(&forest), vec![1]);
    assert_eq!(ids(&forest[0].replies), vec![2]);
  }

  #[test]
  fn test_insert_reply_unknown_parent() {
    let forest = build(&[comment(1, None)]);
    assert!(insert_reply(&forest, CommentId(5), CommentNode::leaf(comment(6, Some(5)))).is_none());
  }
}
