/*
 * path.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Addressing elements by index paths.
//!
//! A [`NodePath`] lists, from some root element downwards, the index of each
//! step inside its parent's `children` vector (text children included). The
//! empty path addresses the root itself. Paths are only valid until the next
//! structural edit of an ancestor; callers re-search after every splice.

use crate::types::{XmlChild, XmlElement};

/// Child-index path from a root element to one of its descendants.
pub type NodePath = Vec<usize>;

/// Length of the longest common prefix of two paths.
pub fn common_prefix_len(a: &[usize], b: &[usize]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl XmlElement {
    /// Resolve a path to an element.
    pub fn element_at(&self, path: &[usize]) -> Option<&XmlElement> {
        let mut current = self;
        for &index in path {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    /// Resolve a path to an element, mutably.
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let mut current = self;
        for &index in path {
            current = current.children.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Path of the first element (pre-order, `self` included) matching `pred`.
    pub fn find_path<F>(&self, pred: F) -> Option<NodePath>
    where
        F: Fn(&XmlElement) -> bool,
    {
        let mut path = Vec::new();
        if find_path_in(self, &pred, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    /// Paths of every element (pre-order, `self` included) matching `pred`.
    ///
    /// Matching elements are not descended into.
    pub fn find_all_paths<F>(&self, pred: F) -> Vec<NodePath>
    where
        F: Fn(&XmlElement) -> bool,
    {
        let mut found = Vec::new();
        let mut path = Vec::new();
        collect_paths(self, &pred, &mut path, &mut found);
        found
    }

    /// Remove and return the child at `path` (which must not be empty).
    pub fn remove_at(&mut self, path: &[usize]) -> Option<XmlChild> {
        let (&last, parent_path) = path.split_last()?;
        let parent = self.element_at_mut(parent_path)?;
        if last < parent.children.len() {
            Some(parent.children.remove(last))
        } else {
            None
        }
    }

    /// Insert a child so that it ends up at `path`.
    ///
    /// Returns `false` when the parent does not exist or the index is past
    /// the end of its children.
    pub fn insert_at(&mut self, path: &[usize], child: XmlChild) -> bool {
        let Some((&last, parent_path)) = path.split_last() else {
            return false;
        };
        match self.element_at_mut(parent_path) {
            Some(parent) if last <= parent.children.len() => {
                parent.children.insert(last, child);
                true
            }
            _ => false,
        }
    }
}

fn find_path_in<F>(element: &XmlElement, pred: &F, path: &mut NodePath) -> bool
where
    F: Fn(&XmlElement) -> bool,
{
    if pred(element) {
        return true;
    }
    for (index, child) in element.children.iter().enumerate() {
        if let XmlChild::Element(e) = child {
            path.push(index);
            if find_path_in(e, pred, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

fn collect_paths<F>(element: &XmlElement, pred: &F, path: &mut NodePath, found: &mut Vec<NodePath>)
where
    F: Fn(&XmlElement) -> bool,
{
    if pred(element) {
        found.push(path.clone());
        return;
    }
    for (index, child) in element.children.iter().enumerate() {
        if let XmlChild::Element(e) = child {
            path.push(index);
            collect_paths(e, pred, path, found);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> XmlElement {
        // w:tbl > (w:tr > w:tc > w:p) x 2
        let row = |text: &str| {
            XmlElement::new("w:tr").with_child(
                XmlElement::new("w:tc").with_child(
                    XmlElement::new("w:p").with_child(
                        XmlElement::new("w:r").with_child(XmlElement::new("w:t").with_text(text)),
                    ),
                ),
            )
        };
        XmlElement::new("w:tbl")
            .with_child(XmlElement::new("w:tblPr"))
            .with_child(row("first"))
            .with_child(row("second"))
    }

    #[test]
    fn test_common_prefix_len() {
        assert_eq!(common_prefix_len(&[1, 2, 3], &[1, 2, 4]), 2);
        assert_eq!(common_prefix_len(&[1, 2], &[1, 2]), 2);
        assert_eq!(common_prefix_len(&[], &[0]), 0);
        assert_eq!(common_prefix_len(&[3], &[1]), 0);
    }

    #[test]
    fn test_find_path_and_resolve() {
        let tbl = table();
        let path = tbl
            .find_path(|e| e.is("w:p") && e.descendant_text("w:t") == "second")
            .unwrap();
        assert_eq!(path, vec![2, 0, 0]);
        assert_eq!(tbl.element_at(&path).unwrap().descendant_text("w:t"), "second");
        assert!(tbl.element_at(&[9]).is_none());
    }

    #[test]
    fn test_find_path_includes_root() {
        let tbl = table();
        assert_eq!(tbl.find_path(|e| e.is("w:tbl")), Some(vec![]));
    }

    #[test]
    fn test_find_all_paths() {
        let tbl = table();
        let paths = tbl.find_all_paths(|e| e.is("w:tr"));
        assert_eq!(paths, vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_remove_and_insert() {
        let mut tbl = table();
        let removed = tbl.remove_at(&[1]).unwrap();
        assert_eq!(tbl.children.len(), 2);
        assert!(tbl.insert_at(&[2], removed));
        assert_eq!(
            tbl.element_at(&[2]).unwrap().descendant_text("w:t"),
            "first"
        );
        assert!(!tbl.insert_at(&[7], XmlChild::Text(String::new())));
        assert!(tbl.remove_at(&[]).is_none());
    }
}
