use std::fmt::Display;

use super::{SourceTree, TypeTag};

/// Owned ordered labeled tree, mostly used to feed the matchers in tests and benches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTree {
    id: usize,
    kind: TypeTag,
    label: Option<String>,
    children: Vec<SimpleTree>,
}

impl SimpleTree {
    pub fn new(k: TypeTag, l: Option<&str>, c: Vec<SimpleTree>) -> Self {
        Self {
            id: 0,
            kind: k,
            label: l.map(|s| s.to_owned()),
            children: c,
        }
    }

    /// Renumbers every node with its pre-order position.
    pub fn with_preorder_ids(mut self) -> Self {
        fn aux(node: &mut SimpleTree, next: &mut usize) {
            node.id = *next;
            *next += 1;
            for c in &mut node.children {
                aux(c, next);
            }
        }
        let mut next = 0;
        aux(&mut self, &mut next);
        self
    }

    pub fn set_label(&mut self, l: Option<&str>) {
        self.label = l.map(|s| s.to_owned());
    }

    pub fn children_mut(&mut self) -> &mut Vec<SimpleTree> {
        &mut self.children
    }

    pub fn child(&self, i: usize) -> Option<&SimpleTree> {
        self.children.get(i)
    }

    /// Follows child positions from this node.
    pub fn at(&self, path: &[usize]) -> Option<&SimpleTree> {
        path.iter().try_fold(self, |n, i| n.child(*i))
    }
}

impl SourceTree for SimpleTree {
    fn id(&self) -> usize {
        self.id
    }

    fn kind(&self) -> TypeTag {
        self.kind
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn children(&self) -> impl Iterator<Item = &Self> {
        self.children.iter()
    }
}

pub struct DisplayTree<'a> {
    node: &'a SimpleTree,
    depth: usize,
}

impl<'a> DisplayTree<'a> {
    pub fn new(node: &'a SimpleTree) -> Self {
        Self { node, depth: 0 }
    }
}

impl Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = self.node;
        writeln!(
            f,
            "{}|-{}:{} \t#{}\ts{}\th{}",
            " ".repeat(self.depth),
            n.kind,
            n.label.as_deref().unwrap_or(""),
            n.id,
            n.size(),
            n.height(),
        )?;
        for c in &n.children {
            Display::fmt(
                &Self {
                    node: c,
                    depth: self.depth + 1,
                },
                f,
            )?;
        }
        Ok(())
    }
}
