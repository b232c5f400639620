use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use treetx::{
    BuildNode, Change, DetachedSequenceId, NodeId, Snapshot, SnapshotNode, StablePlace,
    StableRange, TraitLocation, Transaction,
};

/// A root with `width` children under one trait.
fn wide_baseline(width: u64) -> Snapshot {
    let root = NodeId::new(1);
    let children: Vec<NodeId> = (0..width).map(|i| NodeId::new(10 + i)).collect();
    let mut nodes = vec![SnapshotNode::new(root, "list").with_trait("items", children.clone())];
    nodes.extend(
        children
            .into_iter()
            .map(|id| SnapshotNode::new(id, "entry")),
    );
    Snapshot::from_nodes(root, nodes).expect("bench baseline is well-formed")
}

fn transaction_benches(c: &mut Criterion) {
    treetx::enable_determinism();

    for width in [64u64, 1024] {
        let baseline = wide_baseline(width);
        let middle = NodeId::new(10 + width / 2);
        let last = NodeId::new(10 + width - 1);

        c.bench_function(&format!("move_one_of_{width}"), |b| {
            b.iter(|| {
                let mut tx = Transaction::new(black_box(baseline.clone()));
                let moved = DetachedSequenceId::new(0);
                tx.apply(Change::detach_to(StableRange::only(middle), moved));
                tx.apply(Change::insert(moved, StablePlace::after(last)));
                black_box(tx.close())
            })
        });

        c.bench_function(&format!("build_insert_into_{width}"), |b| {
            b.iter(|| {
                let mut tx = Transaction::new(black_box(baseline.clone()));
                let built = DetachedSequenceId::new(0);
                tx.apply(Change::build(
                    [BuildNode::leaf(NodeId::new(5000), "entry")
                        .with_payload("fresh")
                        .into()],
                    built,
                ));
                tx.apply(Change::insert(
                    built,
                    StablePlace::at_start_of(TraitLocation::new(NodeId::new(1), "items")),
                ));
                black_box(tx.close())
            })
        });

        c.bench_function(&format!("set_value_in_{width}"), |b| {
            b.iter(|| {
                let mut tx = Transaction::new(black_box(baseline.clone()));
                tx.apply(Change::set_payload(middle, 42u64));
                black_box(tx.close())
            })
        });
    }
}

criterion_group!(benches, transaction_benches);
criterion_main!(benches);
