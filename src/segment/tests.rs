//! Tests for the segment map

use crate::segment::{Segment, SegmentMap, SegmentSource};

/// Collect the trimmed segments overlapping `range` with their offsets.
fn collect(map: &SegmentMap, range: std::ops::Range<u64>) -> Vec<(u64, Segment)> {
    let mut out = Vec::new();
    map.walk_range(range, &mut |off, seg| out.push((off, seg)));
    out
}

/// Segment lengths must always sum to the map length.
fn assert_consistent(map: &SegmentMap) {
    let segments = map.segments();
    let total: u64 = segments.iter().map(|(_, s)| s.len).sum();
    assert_eq!(total, map.len());
    let mut expected_offset = 0;
    for (off, seg) in &segments {
        assert_eq!(*off, expected_offset);
        assert!(seg.len > 0, "zero-length segment at {off}");
        expected_offset += seg.len;
    }
    // No two adjacent segments may continue one another.
    for pair in segments.windows(2) {
        assert!(
            !pair[0].1.continues(&pair[1].1),
            "uncoalesced seam at {}",
            pair[1].0
        );
    }
}

#[test]
fn test_initial_state() {
    let map = SegmentMap::new(63);
    assert_eq!(map.len(), 63);
    let segments = map.segments();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].1, Segment::backing(0, 63));

    let empty = SegmentMap::new(0);
    assert_eq!(empty.len(), 0);
    assert!(empty.is_empty());
    assert!(empty.segments().is_empty());
}

#[test]
fn test_insert_at_head() {
    let mut map = SegmentMap::new(10);
    map.insert(0, Segment::change(1, 0, 5));
    assert_eq!(map.len(), 15);
    let segments = map.segments();
    assert_eq!(segments[0].1, Segment::change(1, 0, 5));
    assert_eq!(segments[1], (5, Segment::backing(0, 10)));
    assert_consistent(&map);
}

#[test]
fn test_insert_splits_backing() {
    let mut map = SegmentMap::new(10);
    map.insert(4, Segment::change(1, 0, 3));
    assert_eq!(map.len(), 13);
    let segments = map.segments();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].1, Segment::backing(0, 4));
    assert_eq!(segments[1], (4, Segment::change(1, 0, 3)));
    assert_eq!(segments[2], (7, Segment::backing(4, 6)));
    assert_consistent(&map);
}

#[test]
fn test_insert_at_tail() {
    let mut map = SegmentMap::new(10);
    map.insert(10, Segment::change(1, 0, 2));
    assert_eq!(map.len(), 12);
    assert_eq!(map.segments()[1], (10, Segment::change(1, 0, 2)));
    assert_consistent(&map);
}

#[test]
fn test_delete_within_segment() {
    let mut map = SegmentMap::new(10);
    map.delete(3, 5);
    assert_eq!(map.len(), 5);
    let segments = map.segments();
    assert_eq!(segments[0].1, Segment::backing(0, 3));
    assert_eq!(segments[1], (3, Segment::backing(8, 2)));
    assert_consistent(&map);
}

#[test]
fn test_delete_across_segments() {
    let mut map = SegmentMap::new(10);
    map.insert(5, Segment::change(1, 0, 4));
    // Remove the tail of the first backing half, the whole insert, and the
    // head of the second half.
    map.delete(3, 8);
    assert_eq!(map.len(), 6);
    let segments = map.segments();
    assert_eq!(segments[0].1, Segment::backing(0, 3));
    assert_eq!(segments[1], (3, Segment::backing(6, 3)));
    assert_consistent(&map);
}

#[test]
fn test_delete_rejoins_contiguous_backing() {
    let mut map = SegmentMap::new(10);
    map.insert(5, Segment::change(1, 0, 4));
    // Deleting exactly the inserted run leaves backing[0,5) + backing[5,10),
    // which must coalesce back into a single segment.
    map.delete(5, 4);
    assert_eq!(map.len(), 10);
    let segments = map.segments();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].1, Segment::backing(0, 10));
}

#[test]
fn test_adjacent_change_spans_coalesce() {
    let mut map = SegmentMap::new(10);
    map.insert(3, Segment::change(1, 0, 4));
    map.insert(7, Segment::change(1, 4, 2));
    let segments = map.segments();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1], (3, Segment::change(1, 0, 6)));
    assert_consistent(&map);
}

#[test]
fn test_different_changes_do_not_coalesce() {
    let mut map = SegmentMap::new(10);
    map.insert(3, Segment::change(1, 0, 4));
    map.insert(7, Segment::change(2, 0, 2));
    assert_eq!(map.segments().len(), 4);
    assert_consistent(&map);
}

#[test]
fn test_walk_range_trims() {
    let mut map = SegmentMap::new(10);
    map.insert(4, Segment::change(1, 0, 3));
    // Logical: backing[0,4) change[4,7) backing[7,13)
    let visited = collect(&map, 2..9);
    assert_eq!(visited.len(), 3);
    assert_eq!(visited[0], (2, Segment::backing(2, 2)));
    assert_eq!(visited[1], (4, Segment::change(1, 0, 3)));
    assert_eq!(visited[2], (7, Segment::backing(4, 2)));
}

#[test]
fn test_walk_range_clamps_to_len() {
    let map = SegmentMap::new(5);
    let visited = collect(&map, 3..100);
    assert_eq!(visited, vec![(3, Segment::backing(3, 2))]);
    assert!(collect(&map, 5..8).is_empty());
}

#[test]
fn test_is_range_backing() {
    let mut map = SegmentMap::new(10);
    assert!(map.is_range_backing(0..10));
    map.insert(4, Segment::change(1, 0, 3));
    assert!(map.is_range_backing(0..4));
    assert!(!map.is_range_backing(0..5));
    assert!(map.is_range_backing(7..13));
}

#[test]
fn test_many_edits_stay_consistent() {
    let mut map = SegmentMap::new(1000);
    // Deterministic churn across the whole file.
    for i in 0..200u64 {
        let off = (i * 37) % map.len();
        map.insert(off, Segment::change(i as i64 + 1, 0, 1 + i % 7));
        assert_consistent(&map);
        if map.len() > 20 && i % 3 == 0 {
            let doff = (i * 53) % (map.len() - 10);
            map.delete(doff, 1 + i % 5);
            assert_consistent(&map);
        }
    }
}

#[test]
fn test_segment_slice() {
    let seg = Segment::backing(100, 50);
    let sliced = seg.slice(10, 20);
    assert_eq!(sliced, Segment::backing(110, 20));

    let seg = Segment::change(7, 5, 10);
    assert_eq!(seg.slice(2, 3), Segment::change(7, 7, 3));
}

#[test]
fn test_continues() {
    assert!(Segment::backing(0, 5).continues(&Segment::backing(5, 3)));
    assert!(!Segment::backing(0, 5).continues(&Segment::backing(6, 3)));
    assert!(Segment::change(1, 0, 4).continues(&Segment::change(1, 4, 1)));
    assert!(!Segment::change(1, 0, 4).continues(&Segment::change(2, 4, 1)));
    assert!(!Segment::backing(0, 4).continues(&Segment::change(1, 4, 1)));
    assert!(matches!(
        Segment::backing(3, 1).source,
        SegmentSource::Backing { offset: 3 }
    ));
}
