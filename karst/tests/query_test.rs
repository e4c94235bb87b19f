mod common;

use common::{collect_ints, create_table, int_desc, int_tuple, populate, setup};
use karst::exec::{
    AggOp, Aggregate, Delete, Filter, Insert, Join, JoinPredicate, Operator, Predicate, SeqScan,
    TupleList,
};
use karst::ExecError;
use limestone::tuple::{CompareOp, Field, FieldType, TupleDesc};

#[test]
fn scan_returns_rows_in_insertion_order() {
    let db = setup();
    let file = create_table(&db, "nums", int_desc(&["a", "b"]));
    populate(&db, file.id(), &[vec![1, 10], vec![2, 20], vec![3, 30]]);

    let tid = db.tm.begin();
    let mut scan = SeqScan::new(tid, file.id(), Some("nums"), &db.catalog, &db.pool).unwrap();
    scan.open().unwrap();
    assert_eq!(
        collect_ints(&mut scan),
        vec![vec![1, 10], vec![2, 20], vec![3, 30]]
    );

    scan.rewind().unwrap();
    assert_eq!(collect_ints(&mut scan).len(), 3);
    scan.close();
    db.pool.transaction_complete(tid, true).unwrap();
}

#[test]
fn scan_desc_is_alias_prefixed() {
    let db = setup();
    let mut desc_items = int_desc(&["id"]).iter().map(|(t, n)| (t, n.map(str::to_string))).collect::<Vec<_>>();
    desc_items.push((FieldType::Int, None));
    let file = create_table(&db, "t", TupleDesc::new(desc_items));

    let tid = db.tm.begin();
    let aliased = SeqScan::new(tid, file.id(), Some("u"), &db.catalog, &db.pool).unwrap();
    assert_eq!(aliased.tuple_desc().field_name(0), Some("u.id"));
    assert_eq!(aliased.tuple_desc().field_name(1), Some("u.null"));

    let bare = SeqScan::new(tid, file.id(), None, &db.catalog, &db.pool).unwrap();
    assert_eq!(bare.tuple_desc().field_name(0), Some("null.id"));
    assert_eq!(bare.tuple_desc().field_name(1), Some("null.null"));
    db.pool.transaction_complete(tid, true).unwrap();
}

#[test]
fn filter_over_scan_selects_matching_rows() {
    let db = setup();
    let file = create_table(&db, "nums", int_desc(&["a", "b"]));
    populate(
        &db,
        file.id(),
        &[vec![1, 5], vec![2, 50], vec![3, 7], vec![4, 99]],
    );

    let tid = db.tm.begin();
    let scan = SeqScan::new(tid, file.id(), Some("nums"), &db.catalog, &db.pool).unwrap();
    let mut filter = Filter::new(
        Predicate::new(1, CompareOp::Gt, Field::Int(10)),
        Box::new(scan),
    );
    filter.open().unwrap();
    assert_eq!(collect_ints(&mut filter), vec![vec![2, 50], vec![4, 99]]);
    filter.close();
    db.pool.transaction_complete(tid, true).unwrap();
}

#[test]
fn join_matches_rows_across_tables() {
    let db = setup();
    let left = create_table(&db, "orders", int_desc(&["user_id", "amount"]));
    let right = create_table(&db, "users", int_desc(&["id"]));
    populate(
        &db,
        left.id(),
        &[vec![1, 100], vec![2, 200], vec![1, 150], vec![9, 1]],
    );
    populate(&db, right.id(), &[vec![1], vec![2]]);

    let tid = db.tm.begin();
    let l = SeqScan::new(tid, left.id(), Some("o"), &db.catalog, &db.pool).unwrap();
    let r = SeqScan::new(tid, right.id(), Some("u"), &db.catalog, &db.pool).unwrap();
    let mut join = Join::new(
        JoinPredicate::new(0, CompareOp::Eq, 0),
        Box::new(l),
        Box::new(r),
    );
    assert_eq!(join.tuple_desc().field_name(2), Some("u.id"));

    join.open().unwrap();
    let mut rows = collect_ints(&mut join);
    rows.sort_unstable();
    assert_eq!(
        rows,
        vec![vec![1, 100, 1], vec![1, 150, 1], vec![2, 200, 2]]
    );
    join.close();
    db.pool.transaction_complete(tid, true).unwrap();
}

#[test]
fn grouped_aggregate_over_scan() {
    let db = setup();
    let file = create_table(&db, "sales", int_desc(&["region", "amount"]));
    populate(
        &db,
        file.id(),
        &[vec![1, 10], vec![2, 5], vec![1, 30], vec![2, 5], vec![2, 1]],
    );

    let tid = db.tm.begin();
    let scan = SeqScan::new(tid, file.id(), Some("s"), &db.catalog, &db.pool).unwrap();
    let mut agg = Aggregate::new(Box::new(scan), Some(0), 1, AggOp::Sum).unwrap();
    agg.open().unwrap();
    let mut rows = collect_ints(&mut agg);
    rows.sort_unstable();
    assert_eq!(rows, vec![vec![1, 40], vec![2, 11]]);
    agg.close();
    db.pool.transaction_complete(tid, true).unwrap();
}

#[test]
fn insert_emits_one_count_tuple_then_end_of_stream() {
    let db = setup();
    let file = create_table(&db, "t", int_desc(&["a"]));
    let desc = db.catalog.tuple_desc(file.id()).unwrap();

    let tid = db.tm.begin();
    let rows = vec![
        int_tuple(&desc, &[1]),
        int_tuple(&desc, &[2]),
        int_tuple(&desc, &[3]),
    ];
    let child = TupleList::new(desc.clone(), rows);
    let mut insert =
        Insert::new(tid, Box::new(child), file.id(), &db.catalog, &db.pool).unwrap();
    insert.open().unwrap();

    let first = insert.next().unwrap().expect("count tuple");
    assert_eq!(first.field(0), &Field::Int(3));
    assert!(insert.next().unwrap().is_none(), "second pull is empty");

    // rewinding resets the latch and drains the child again
    insert.rewind().unwrap();
    let again = insert.next().unwrap().expect("count tuple after rewind");
    assert_eq!(again.field(0), &Field::Int(3));
    insert.close();
    db.pool.transaction_complete(tid, true).unwrap();

    let tid2 = db.tm.begin();
    let mut scan = SeqScan::new(tid2, file.id(), None, &db.catalog, &db.pool).unwrap();
    scan.open().unwrap();
    assert_eq!(collect_ints(&mut scan).len(), 6);
    scan.close();
    db.pool.transaction_complete(tid2, true).unwrap();
}

#[test]
fn insert_rejects_mismatched_child_schema() {
    let db = setup();
    let file = create_table(&db, "t", int_desc(&["a"]));

    let tid = db.tm.begin();
    let wrong = std::sync::Arc::new(TupleDesc::unnamed(vec![FieldType::Str]));
    let child = TupleList::new(wrong, Vec::new());
    let result = Insert::new(tid, Box::new(child), file.id(), &db.catalog, &db.pool);
    assert!(matches!(
        result,
        Err(ExecError::Db(limestone::DbError::SchemaMismatch))
    ));
    db.pool.transaction_complete(tid, true).unwrap();
}

#[test]
fn delete_removes_the_selected_rows() {
    let db = setup();
    let file = create_table(&db, "t", int_desc(&["a"]));
    populate(&db, file.id(), &[vec![1], vec![2], vec![3], vec![4]]);

    let tid = db.tm.begin();
    let scan = SeqScan::new(tid, file.id(), Some("t"), &db.catalog, &db.pool).unwrap();
    let doomed = Filter::new(
        Predicate::new(0, CompareOp::Le, Field::Int(2)),
        Box::new(scan),
    );
    let mut delete = Delete::new(tid, Box::new(doomed), &db.pool);
    delete.open().unwrap();
    let count = delete.next().unwrap().expect("count tuple");
    assert_eq!(count.field(0), &Field::Int(2));
    delete.close();
    db.pool.transaction_complete(tid, true).unwrap();

    let tid2 = db.tm.begin();
    let mut scan = SeqScan::new(tid2, file.id(), None, &db.catalog, &db.pool).unwrap();
    scan.open().unwrap();
    let mut rows = collect_ints(&mut scan);
    rows.sort_unstable();
    assert_eq!(rows, vec![vec![3], vec![4]]);
    scan.close();
    db.pool.transaction_complete(tid2, true).unwrap();
}

#[test]
fn operators_refuse_pulls_when_not_open() {
    let db = setup();
    let file = create_table(&db, "t", int_desc(&["a"]));

    let tid = db.tm.begin();
    let mut scan = SeqScan::new(tid, file.id(), None, &db.catalog, &db.pool).unwrap();
    assert!(matches!(scan.next(), Err(ExecError::Closed)));
    scan.open().unwrap();
    scan.close();
    assert!(matches!(scan.next(), Err(ExecError::Closed)));
    db.pool.transaction_complete(tid, true).unwrap();
}
