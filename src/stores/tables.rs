//! The `#` tree store: arbitrary-depth nodes, leaves are scalars.
//!
//! The original carried two near-identical helper modules for this shape
//! (one used by the surface primitives, one used by the runner/events/io
//! topics). Both are consolidated here into a single set of path-walking
//! functions used everywhere a `#` path needs resolving.

use crate::error::{ShellError, ShellResult};
use std::collections::BTreeMap;

/// A tree node: either a leaf scalar or an interior mapping name -> node.
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(String),
    Interior(BTreeMap<String, Node>),
}

impl Node {
    pub fn new_interior() -> Self {
        Node::Interior(BTreeMap::new())
    }

    pub fn as_interior(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Interior(m) => Some(m),
            Node::Leaf(_) => None,
        }
    }

    fn as_interior_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match self {
            Node::Interior(m) => Some(m),
            Node::Leaf(_) => None,
        }
    }
}

/// Walk `path` under `root`, returning the node if every segment resolves.
pub fn node_get<'a>(root: &'a Node, path: &[String]) -> Option<&'a Node> {
    let mut cur = root;
    for p in path {
        let map = cur.as_interior()?;
        cur = map.get(p)?;
    }
    Some(cur)
}

/// Walk `path`, creating interior nodes as needed. Fails on a path collision
/// (an existing leaf where an interior is required).
pub fn node_ensure_interior<'a>(
    root: &'a mut Node,
    path: &[String],
) -> ShellResult<&'a mut BTreeMap<String, Node>> {
    let mut cur = root;
    for p in path {
        let map = cur
            .as_interior_mut()
            .ok_or_else(|| ShellError::Validation(format!("Path collision at '{p}'")))?;
        cur = map.entry(p.clone()).or_insert_with(Node::new_interior);
    }
    cur.as_interior_mut()
        .ok_or_else(|| ShellError::Validation("Path collision".to_string()))
}

/// List the lexicographically sorted children of an interior node.
pub fn node_ls(root: &Node, path: &[String]) -> ShellResult<Vec<String>> {
    let node = node_get(root, path).ok_or_else(|| ShellError::NotFound("Not found".to_string()))?;
    match node {
        Node::Interior(m) => Ok(m.keys().cloned().collect()),
        Node::Leaf(_) => Err(ShellError::Validation("ls expects dict node".to_string())),
    }
}

/// Overwrite the leaf at `path`, creating interiors along the way.
pub fn leaf_set(root: &mut Node, path: &[String], text: &str) -> ShellResult<()> {
    let (parent_path, key) = split_last(path)?;
    let parent = node_ensure_interior(root, parent_path)?;
    if matches!(parent.get(key), Some(Node::Interior(_))) {
        return Err(ShellError::Validation(
            "Cannot overwrite dict node with scalar".to_string(),
        ));
    }
    parent.insert(key.to_string(), Node::Leaf(text.to_string()));
    Ok(())
}

/// Append text to the leaf at `path` (empty/missing leaf treated as `""`).
pub fn leaf_append(root: &mut Node, path: &[String], text: &str) -> ShellResult<()> {
    let (parent_path, key) = split_last(path)?;
    let parent = node_ensure_interior(root, parent_path)?;
    let cur = match parent.get(key) {
        None => String::new(),
        Some(Node::Leaf(s)) => s.clone(),
        Some(Node::Interior(_)) => {
            return Err(ShellError::Validation(
                "Cannot overwrite dict node with scalar".to_string(),
            ))
        }
    };
    parent.insert(key.to_string(), Node::Leaf(cur + text));
    Ok(())
}

/// Remove the node at `path` (leaf or interior). Returns whether it existed.
pub fn node_rm(root: &mut Node, path: &[String]) -> ShellResult<bool> {
    let (parent_path, key) = split_last(path)?;
    let parent = match node_get_mut(root, parent_path) {
        Some(p) => p,
        None => return Ok(false),
    };
    match parent.as_interior_mut() {
        Some(m) => Ok(m.remove(key).is_some()),
        None => Ok(false),
    }
}

/// Remove and return the node at `path`, if any (used by `mv` to pop a
/// subtree/leaf before re-inserting it at the destination).
pub fn node_take(root: &mut Node, path: &[String]) -> ShellResult<Option<Node>> {
    let (parent_path, key) = split_last(path)?;
    let parent = match node_get_mut(root, parent_path) {
        Some(p) => p,
        None => return Ok(None),
    };
    match parent.as_interior_mut() {
        Some(m) => Ok(m.remove(key)),
        None => Ok(None),
    }
}

fn node_get_mut<'a>(root: &'a mut Node, path: &[String]) -> Option<&'a mut Node> {
    let mut cur = root;
    for p in path {
        cur = cur.as_interior_mut()?.get_mut(p)?;
    }
    Some(cur)
}

/// Overwrite the node at `path` wholesale (used by `cp #->#` and `mv #->#`).
pub fn node_set(root: &mut Node, path: &[String], node: Node) -> ShellResult<()> {
    let (parent_path, key) = split_last(path)?;
    let parent = node_ensure_interior(root, parent_path)?;
    parent.insert(key.to_string(), node);
    Ok(())
}

/// Return `(path, leaf text)` for every leaf under `base_path`, path-sorted.
pub fn walk_leaves(root: &Node, base_path: &[String]) -> Vec<(Vec<String>, String)> {
    let start = match node_get(root, base_path) {
        Some(n) => n,
        None => return Vec::new(),
    };
    let mut out = Vec::new();
    rec(base_path.to_vec(), start, &mut out);
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn rec(cur_path: Vec<String>, node: &Node, out: &mut Vec<(Vec<String>, String)>) {
    match node {
        Node::Interior(m) => {
            for (k, v) in m {
                let mut next = cur_path.clone();
                next.push(k.clone());
                rec(next, v, out);
            }
        }
        Node::Leaf(s) => out.push((cur_path, s.clone())),
    }
}

fn split_last(path: &[String]) -> ShellResult<(&[String], &str)> {
    match path.split_last() {
        Some((last, init)) => Ok((init, last.as_str())),
        None => Err(ShellError::Parse("Empty # path".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Vec<String> {
        s.split(':').map(str::to_string).collect()
    }

    #[test]
    fn set_then_get_leaf() {
        let mut root = Node::new_interior();
        leaf_set(&mut root, &p("a:b"), "hello").unwrap();
        assert!(matches!(node_get(&root, &p("a:b")), Some(Node::Leaf(s)) if s == "hello"));
    }

    #[test]
    fn leaf_append_accumulates() {
        let mut root = Node::new_interior();
        leaf_append(&mut root, &p("a"), "foo").unwrap();
        leaf_append(&mut root, &p("a"), "bar").unwrap();
        assert!(matches!(node_get(&root, &p("a")), Some(Node::Leaf(s)) if s == "foobar"));
    }

    #[test]
    fn collision_leaf_vs_interior() {
        let mut root = Node::new_interior();
        leaf_set(&mut root, &p("a"), "x").unwrap();
        assert!(node_ensure_interior(&mut root, &p("a:b")).is_err());
    }

    #[test]
    fn walk_leaves_sorted() {
        let mut root = Node::new_interior();
        leaf_set(&mut root, &p("b"), "2").unwrap();
        leaf_set(&mut root, &p("a"), "1").unwrap();
        let leaves = walk_leaves(&root, &[]);
        assert_eq!(leaves[0].0, p("a"));
        assert_eq!(leaves[1].0, p("b"));
    }
}
