use geo::Point;
use spatext::spatial::rect;
use spatext::{Config, DataObject, KnnQuery, Query, RangeQuery, SpatextIndex};

fn kw(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn index_512() -> SpatextIndex {
    let _ = env_logger::builder().is_test(true).try_init();
    let bounds = rect(0.0, 0.0, 512.0, 512.0).unwrap();
    SpatextIndex::new(bounds, Config::default()).unwrap()
}

fn object(id: u64, x: f64, y: f64, words: &[&str]) -> DataObject {
    DataObject::new(id, Point::new(x, y), kw(words), u64::MAX).unwrap()
}

#[test]
fn test_range_query_round_trip() {
    let mut index = index_512();

    let query = RangeQuery::new(
        1,
        kw(&["cafe", "wifi"]),
        rect(100.0, 100.0, 120.0, 120.0).unwrap(),
        u64::MAX,
    )
    .unwrap();
    index.insert(Query::Range(query)).unwrap();

    // Inside the range with a matching keyword.
    let inside = object(10, 110.0, 110.0, &["wifi", "parking"]);
    assert_eq!(index.search(&inside), vec![1]);

    // Same keywords, outside the range.
    let outside = object(11, 200.0, 200.0, &["wifi", "parking"]);
    assert!(index.search(&outside).is_empty());
}

#[test]
fn test_knn_radius_equals_kth_nearest_distance() {
    let mut index = index_512();

    let query = KnnQuery::new(5, kw(&["pizza"]), Point::new(256.0, 256.0), 3, u64::MAX).unwrap();
    let handle = index.insert(Query::Knn(query)).unwrap();

    // The first two candidates leave the radius unsettled and match.
    for (id, x) in [(1u64, 258.0), (2, 259.0)] {
        let matched = index.search(&object(id, x, 256.0, &["pizza"]));
        assert_eq!(matched, vec![5]);
    }
    // The third settles the radius at its own distance and triggers the
    // descent, so it is re-filed instead of reported.
    assert!(index.search(&object(3, 260.0, 256.0, &["pizza"])).is_empty());

    match index.query(handle) {
        Query::Knn(kq) => assert_eq!(kq.answer_radius(), 4.0),
        Query::Range(_) => unreachable!(),
    }

    // Later objects inside the settled radius are still results.
    assert_eq!(index.search(&object(4, 259.5, 256.0, &["pizza"])), vec![5]);
}

#[test]
fn test_knn_rejects_objects_beyond_settled_radius() {
    let mut index = index_512();
    let query = KnnQuery::new(5, kw(&["pizza"]), Point::new(256.0, 256.0), 2, u64::MAX).unwrap();
    index.insert(Query::Knn(query)).unwrap();

    index.search(&object(1, 257.0, 256.0, &["pizza"]));
    index.search(&object(2, 258.0, 256.0, &["pizza"]));

    // Radius settled at 2.0; a farther object is not a result.
    assert!(index.search(&object(3, 280.0, 256.0, &["pizza"])).is_empty());
    // A closer one still is.
    assert_eq!(index.search(&object(4, 256.5, 256.0, &["pizza"])), vec![5]);
}

#[test]
fn test_identical_queries_expire_independently() {
    let mut index = index_512();
    let r = rect(50.0, 50.0, 150.0, 150.0).unwrap();

    // Same range, same keywords, different lifetimes; the shared-list fast
    // path must not tie their fates together.
    index
        .insert(Query::Range(
            RangeQuery::new(1, kw(&["cafe"]), r, 3).unwrap(),
        ))
        .unwrap();
    index
        .insert(Query::Range(
            RangeQuery::new(2, kw(&["cafe"]), r, u64::MAX).unwrap(),
        ))
        .unwrap();

    let mut ids = index.search(&object(10, 100.0, 100.0, &["cafe"]));
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);

    // Clock is past query 1's expiration now.
    assert_eq!(index.search(&object(11, 100.0, 100.0, &["cafe"])), vec![2]);
    assert_eq!(index.search(&object(12, 100.0, 100.0, &["cafe"])), vec![2]);
}

#[test]
fn test_cleaning_converges_and_drops_cells() {
    let mut index = index_512();

    for id in 0..10 {
        let r = rect(10.0 * id as f64, 0.0, 10.0 * id as f64 + 50.0, 50.0).unwrap();
        index
            .insert(Query::Range(
                RangeQuery::new(id as u64, kw(&["cafe", "tea"]), r, 5).unwrap(),
            ))
            .unwrap();
    }
    assert!(index.cell_count() > 0);

    // Push the clock well past every expiration.
    for i in 0..10 {
        index.search(&object(i, 400.0, 400.0, &["unrelated"]));
    }

    // Bounded slices converge: after enough calls everything is reclaimed.
    // Replication means one query can be referenced from several cells, so
    // the removal count is at least the query count.
    let mut total = 0;
    for _ in 0..5000 {
        total += index.clean_next_entries();
        if index.cell_count() == 0 {
            break;
        }
    }
    assert!(total >= 10);
    assert_eq!(index.cell_count(), 0);
    assert_eq!(index.stats().cleaned_entries as usize, total);
}

#[test]
fn test_knn_descends_and_keeps_matching() {
    let mut index = index_512();
    let query = KnnQuery::new(9, kw(&["atm"]), Point::new(100.0, 100.0), 2, u64::MAX).unwrap();
    let handle = index.insert(Query::Knn(query)).unwrap();

    index.search(&object(1, 100.5, 100.0, &["atm"]));
    index.search(&object(2, 100.0, 101.0, &["atm"]));
    match index.query(handle) {
        Query::Knn(kq) => {
            assert_eq!(kq.answer_radius(), 1.0);
            assert!(kq.current_level() < index.config().max_level);
        }
        Query::Range(_) => unreachable!(),
    }
    assert!(index.stats().knn_descents > 0);

    // The query keeps matching from its new level.
    assert_eq!(index.search(&object(3, 100.2, 100.0, &["atm"])), vec![9]);
}

#[test]
fn test_push_to_lowest_descends_to_level_zero() {
    let bounds = rect(0.0, 0.0, 512.0, 512.0).unwrap();
    let config = Config::default().with_push_to_lowest(true);
    let mut index = SpatextIndex::new(bounds, config).unwrap();

    let query = KnnQuery::new(9, kw(&["atm"]), Point::new(100.0, 100.0), 1, u64::MAX).unwrap();
    let handle = index.insert(Query::Knn(query)).unwrap();
    index.search(&object(1, 101.0, 100.0, &["atm"]));

    match index.query(handle) {
        Query::Knn(kq) => assert_eq!(kq.current_level(), 0),
        Query::Range(_) => unreachable!(),
    }
    assert_eq!(index.search(&object(2, 100.5, 100.0, &["atm"])), vec![9]);
}

#[test]
fn test_stats_reflect_activity() {
    let mut index = index_512();
    index
        .insert(Query::Range(
            RangeQuery::new(
                1,
                kw(&["cafe"]),
                rect(0.0, 0.0, 50.0, 50.0).unwrap(),
                u64::MAX,
            )
            .unwrap(),
        ))
        .unwrap();
    index.search(&object(1, 10.0, 10.0, &["cafe"]));

    let stats = index.stats();
    assert_eq!(stats.queries_inserted, 1);
    assert_eq!(stats.objects_searched, 1);
    assert!(stats.cells > 0);
    assert!(stats.list_node_visits + stats.trie_node_visits > 0);
}

#[test]
fn test_config_json_round_trip() {
    let config = Config::default()
        .with_granularity(256)
        .with_max_level(8)
        .with_push_to_lowest(true);
    let json = config.to_json().unwrap();
    let parsed = Config::from_json(&json).unwrap();
    assert_eq!(parsed.grid_granularity, 256);
    assert_eq!(parsed.max_level, 8);
    assert!(parsed.push_to_lowest);
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_many_queries_many_objects() {
    let mut index = index_512();

    let words = ["cafe", "wifi", "tea", "pizza", "atm", "park"];
    let mut registered = Vec::new();
    for id in 0..200u64 {
        let x = (id % 16) as f64 * 32.0;
        let y = (id / 16) as f64 * 32.0;
        let r = rect(x, y, (x + 40.0).min(512.0), (y + 40.0).min(512.0)).unwrap();
        let w1 = words[(id % 6) as usize];
        let w2 = words[((id + 1) % 6) as usize];
        registered.push((r, [w1, w2]));
        index
            .insert(Query::Range(
                RangeQuery::new(id, kw(&[w1, w2]), r, u64::MAX).unwrap(),
            ))
            .unwrap();
    }

    // Every matched query must spatially contain the object and share a
    // keyword with it, and no query may be reported twice for one object.
    for oid in 0..50u64 {
        let x = (oid % 8) as f64 * 64.0 + 5.0;
        let y = (oid / 8) as f64 * 64.0 + 5.0;
        let word = words[(oid % 6) as usize];
        let obj = object(oid, x, y, &[word]);
        let mut ids = index.search(&obj);
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before, "duplicate matches for object {oid}");
        for id in ids {
            let (r, qwords) = &registered[id as usize];
            assert!(spatext::spatial::contains_point(r, &obj.location));
            assert!(qwords.contains(&word));
        }
    }
    assert!(index.average_list_size() >= 0.0);
}
