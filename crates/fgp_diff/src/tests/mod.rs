macro_rules! tree {
    ( $k:expr ) => {
        crate::tree::simple_tree::SimpleTree::new($k, None, vec![])
    };
    ( $k:expr, $l:expr) => {
        crate::tree::simple_tree::SimpleTree::new($k, Some($l), vec![])
    };
    ( $k:expr, $l:expr; [$($x:expr),+ $(,)?]) => {
        crate::tree::simple_tree::SimpleTree::new($k, Some($l), vec![$($x),+])
    };
    ( $k:expr; [$($x:expr),+ $(,)?]) => {
        crate::tree::simple_tree::SimpleTree::new($k, None, vec![$($x),+])
    };
}
pub(crate) use tree;

mod fingerprint_matcher_tests;
mod refinement_tests;
