// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for constructing baseline [`Snapshot`](crate::Snapshot)
/// literals.
///
/// NOTE! This is mostly useful for tests and documentation; hosts build
/// production baselines through [`Snapshot::from_nodes`](crate::Snapshot::from_nodes).
///
/// A node is written `(id, definition)`, optionally with a payload
/// `(id, definition, payload)`, and optionally with child lists:
///
/// ```rust
/// use treetx::tree;
///
/// let snapshot = tree!((1, "document" => {
///     "children" => [
///         (2, "paragraph" => {
///             "inline" => [(3, "text", "hello"), (4, "text", "world")],
///         }),
///         (5, "divider"),
///     ],
/// }));
/// assert_eq!(snapshot.node_count(), 5);
/// ```
///
/// The literal is validated like any other input to
/// [`Snapshot::from_nodes`](crate::Snapshot::from_nodes): duplicate ids or
/// other shape violations panic.
#[macro_export]
macro_rules! tree {
    ( $root:tt ) => {{
        let mut nodes = ::std::vec::Vec::new();
        let root = $crate::tree!(@node nodes, $root);
        $crate::Snapshot::from_nodes(root, nodes).expect("tree literal is well-formed")
    }};

    // Leaf without payload
    (@node $nodes:ident, ($id:expr, $def:expr)) => {{
        let id = $crate::NodeId::new($id);
        $nodes.push($crate::SnapshotNode::new(id, $def));
        id
    }};

    // Leaf with payload
    (@node $nodes:ident, ($id:expr, $def:expr, $payload:expr)) => {{
        let id = $crate::NodeId::new($id);
        $nodes.push($crate::SnapshotNode::new(id, $def).with_payload($payload));
        id
    }};

    // Interior node (children are pushed before their parent; the
    // collected order is irrelevant to Snapshot::from_nodes)
    (@node $nodes:ident, ($id:expr, $def:expr => {
        $($label:expr => [ $($child:tt),* $(,)? ]),* $(,)?
    })) => {{
        let id = $crate::NodeId::new($id);
        #[allow(unused_mut)]
        let mut node = $crate::SnapshotNode::new(id, $def);
        $(
            let children: ::std::vec::Vec<$crate::NodeId> =
                ::std::vec![ $( $crate::tree!(@node $nodes, $child) ),* ];
            node = node.with_trait($crate::TraitLabel::new($label), children);
        )*
        $nodes.push(node);
        id
    }};

    // Interior node with payload
    (@node $nodes:ident, ($id:expr, $def:expr, $payload:expr => {
        $($label:expr => [ $($child:tt),* $(,)? ]),* $(,)?
    })) => {{
        let id = $crate::NodeId::new($id);
        #[allow(unused_mut)]
        let mut node = $crate::SnapshotNode::new(id, $def).with_payload($payload);
        $(
            let children: ::std::vec::Vec<$crate::NodeId> =
                ::std::vec![ $( $crate::tree!(@node $nodes, $child) ),* ];
            node = node.with_trait($crate::TraitLabel::new($label), children);
        )*
        $nodes.push(node);
        id
    }};
}
