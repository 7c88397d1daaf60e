//! Menu forest construction.
//!
//! Menu functions point at their parent through `functionparentid`. The
//! builder turns that flat list into an ordered forest:
//!
//! - a node whose parent is absent from the resolved set becomes a root,
//!   so an entry is never lost because its parent was not granted;
//! - a parent link that would close a cycle (including a node naming
//!   itself) is dropped and the node becomes a root;
//! - a node that would nest [`MAX_MENU_DEPTH`] levels deep or more is
//!   lifted to a root, so the forest depth stays bounded;
//! - siblings are sorted by `order`, then by id. Missing or malformed
//!   orders sort as 0.
//!
//! `isleaf` is passed through untouched; a leaf with children stays so.

use crate::ResolvedPermissionSet;
use catalog::{FunctionId, Menu};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// One entry of the menu forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuNode {
    #[serde(rename = "_id")]
    pub id: FunctionId,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub menu: Menu,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    pub fn order(&self) -> i64 {
        self.menu.order()
    }

    pub fn is_leaf(&self) -> bool {
        self.menu.is_leaf
    }

    pub fn child_ids(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.id.as_str()).collect()
    }
}

/// Something the builder had to work around.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "diagnostic", rename_all = "snake_case")]
pub enum MenuDiagnostic {
    /// `order` is present but not an integer; sorted as 0.
    MalformedOrder { function: FunctionId, value: Value },
    /// The parent is not in the resolved set; the node became a root.
    MissingParent {
        function: FunctionId,
        parent: FunctionId,
    },
    /// Following the parent would loop; the node became a root.
    ParentCycle {
        function: FunctionId,
        parent: FunctionId,
    },
    /// The node would nest deeper than `limit`; it became a root.
    DepthExceeded {
        function: FunctionId,
        parent: FunctionId,
        limit: usize,
    },
}

/// Deepest nesting a menu forest may have: roots sit at depth 0, and no
/// node sits at this depth or below.
pub const MAX_MENU_DEPTH: usize = 32;

/// Ordered menu roots plus the diagnostics raised while building them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MenuForest {
    pub roots: Vec<MenuNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<MenuDiagnostic>,
}

impl MenuForest {
    pub fn root_ids(&self) -> Vec<&str> {
        self.roots.iter().map(|r| r.id.as_str()).collect()
    }

    /// Total number of nodes in the forest.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Depth-first, pre-order walk yielding `(depth, node)`; roots have
    /// depth 0.
    pub fn iter(&self) -> DepthFirst<'_> {
        DepthFirst {
            stack: self.roots.iter().rev().map(|n| (0, n)).collect(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&MenuNode> {
        self.iter().map(|(_, n)| n).find(|n| n.id == id)
    }
}

pub struct DepthFirst<'a> {
    stack: Vec<(usize, &'a MenuNode)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a MenuNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|c| (depth + 1, c)));
        Some((depth, node))
    }
}

/// Builds a [`MenuForest`] from a resolved set.
#[derive(Debug, Clone, Default)]
pub struct MenuBuilder {
    app: Option<String>,
}

impl MenuBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only entries for `app`, plus entries without an app id.
    pub fn for_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn build(&self, set: &ResolvedPermissionSet) -> MenuForest {
        let entries: BTreeMap<&str, (&str, &Menu)> = set
            .menus()
            .filter(|(_, menu)| menu.applies_to(self.app.as_deref()))
            .map(|(f, menu)| (f.id(), (f.description(), menu)))
            .collect();
        let entries: Vec<(&str, &str, &Menu)> = entries
            .into_iter()
            .map(|(id, (description, menu))| (id, description, menu))
            .collect();
        let index: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, (id, _, _))| (*id, i))
            .collect();

        let mut diagnostics = Vec::new();
        for (id, _, menu) in &entries {
            if let catalog::MenuOrder::Malformed(value) = &menu.order {
                diagnostics.push(MenuDiagnostic::MalformedOrder {
                    function: id.to_string(),
                    value: value.clone(),
                });
            }
        }

        // Accept parent links in id order. A node without an accepted link
        // is the root of its tree, so a new link closes a loop exactly when
        // both ends are already in the same tree.
        let mut parents: Vec<Option<usize>> = vec![None; entries.len()];
        let mut trees = DisjointSets::new(entries.len());
        for (child, (id, _, menu)) in entries.iter().enumerate() {
            let Some(parent_id) = menu.parent_id.as_deref() else {
                continue;
            };
            let Some(&parent) = index.get(parent_id) else {
                diagnostics.push(MenuDiagnostic::MissingParent {
                    function: id.to_string(),
                    parent: parent_id.to_string(),
                });
                continue;
            };
            if !trees.union(child, parent) {
                diagnostics.push(MenuDiagnostic::ParentCycle {
                    function: id.to_string(),
                    parent: parent_id.to_string(),
                });
                continue;
            }
            parents[child] = Some(parent);
        }

        let depths = limit_depth(&entries, &mut parents, &mut diagnostics);

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        for (child, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                children[*parent].push(child);
            }
        }

        // Bottom-up: every child is built before its parent.
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by_key(|&i| Reverse(depths[i]));
        let mut built: Vec<Option<MenuNode>> = vec![None; entries.len()];
        for node in order {
            let mut nodes: Vec<MenuNode> = children[node]
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            sort_siblings(&mut nodes);
            let (id, description, menu) = entries[node];
            built[node] = Some(MenuNode {
                id: id.to_string(),
                description: description.to_string(),
                menu: menu.clone(),
                children: nodes,
            });
        }

        let mut roots: Vec<MenuNode> = parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .filter_map(|(i, _)| built[i].take())
            .collect();
        sort_siblings(&mut roots);

        let forest = MenuForest { roots, diagnostics };

        tracing::debug!(
            version = set.version(),
            nodes = entries.len(),
            roots = forest.roots.len(),
            diagnostics = forest.diagnostics.len(),
            "Built menu"
        );

        forest
    }
}

/// Build the menu for `set` with no app scoping.
pub fn build_menu(set: &ResolvedPermissionSet) -> MenuForest {
    MenuBuilder::new().build(set)
}

/// Depth of every node under the accepted `parents` links. A node that
/// would sit at [`MAX_MENU_DEPTH`] or deeper is detached and becomes a
/// root, starting a new tree.
fn limit_depth(
    entries: &[(&str, &str, &Menu)],
    parents: &mut [Option<usize>],
    diagnostics: &mut Vec<MenuDiagnostic>,
) -> Vec<usize> {
    let mut depths: Vec<Option<usize>> = vec![None; entries.len()];
    let mut path = Vec::new();
    for start in 0..entries.len() {
        // Walk up to the nearest node whose depth is known, then settle
        // the walked path from the top down.
        let mut current = start;
        while depths[current].is_none() {
            path.push(current);
            match parents[current] {
                Some(parent) => current = parent,
                None => break,
            }
        }
        while let Some(node) = path.pop() {
            let mut depth = match parents[node] {
                Some(parent) => depths[parent].map_or(0, |d| d + 1),
                None => 0,
            };
            if depth >= MAX_MENU_DEPTH {
                if let Some(parent) = parents[node].take() {
                    diagnostics.push(MenuDiagnostic::DepthExceeded {
                        function: entries[node].0.to_string(),
                        parent: entries[parent].0.to_string(),
                        limit: MAX_MENU_DEPTH,
                    });
                }
                depth = 0;
            }
            depths[node] = Some(depth);
        }
    }
    depths.into_iter().map(Option::unwrap_or_default).collect()
}

/// Union-find over node indices.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Merge the sets holding `a` and `b`. False if they already were one.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return false;
        }
        self.parent[a] = b;
        true
    }
}

fn sort_siblings(nodes: &mut [MenuNode]) {
    nodes.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id.cmp(&b.id)));
}
