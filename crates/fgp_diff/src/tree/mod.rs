pub mod simple_tree;
pub mod synthetic;

/// Type tags are only ever compared for equality.
pub type TypeTag = u16;

/// Read-only view of an input tree.
///
/// Ids must be unique within one tree, they are what the produced mapping
/// refers to.
pub trait SourceTree {
    fn id(&self) -> usize;
    fn kind(&self) -> TypeTag;
    fn label(&self) -> Option<&str>;
    fn children(&self) -> impl Iterator<Item = &Self>;

    fn size(&self) -> usize {
        1 + self.children().map(|c| c.size()).sum::<usize>()
    }

    /// leaves have height 1
    fn height(&self) -> usize {
        1 + self.children().map(|c| c.height()).max().unwrap_or(0)
    }
}
