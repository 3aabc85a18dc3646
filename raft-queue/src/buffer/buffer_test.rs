use std::sync::Arc;

use pretty_assertions::assert_eq;
use validit::Validate;

use crate::buffer::OpBuffer;
use crate::OpId;
use crate::ReplicateOp;

fn op(term: u64, index: u64, payload_len: usize) -> Arc<ReplicateOp> {
    Arc::new(ReplicateOp::new(OpId::new(term, index), vec![0u8; payload_len]))
}

#[test]
fn append_and_boundaries() -> anyhow::Result<()> {
    let mut b = OpBuffer::new(OpId::MIN);

    assert_eq!(1, b.next_index());
    assert_eq!(OpId::MIN, b.last_id());
    assert_eq!(None, b.last_entry_id());
    assert!(b.is_empty());

    b.append(op(1, 1, 10));
    b.append(op(1, 2, 20));
    b.append(op(2, 3, 0));

    assert_eq!(4, b.next_index());
    assert_eq!(OpId::new(2, 3), b.last_id());
    assert_eq!(Some(OpId::new(2, 3)), b.last_entry_id());
    assert_eq!(3, b.len());
    assert_eq!(30 + 3 * 16, b.bytes());
    assert!(b.validate().is_ok());

    Ok(())
}

#[test]
fn iter_from_boundaries() -> anyhow::Result<()> {
    let mut b = OpBuffer::new(OpId::new(7, 50));
    for index in 51..=60 {
        b.append(op(7, index, 0));
    }

    let all: Vec<u64> = b.iter_from(50).expect("at the boundary").map(|o| o.id.index).collect();
    assert_eq!((51..=60).collect::<Vec<_>>(), all);

    let tail: Vec<u64> = b.iter_from(55).expect("inside").map(|o| o.id.index).collect();
    assert_eq!((56..=60).collect::<Vec<_>>(), tail);

    let none: Vec<u64> = b.iter_from(60).expect("at the tail").map(|o| o.id.index).collect();
    assert!(none.is_empty());

    let past: Vec<u64> = b.iter_from(99).expect("past the tail").map(|o| o.id.index).collect();
    assert!(past.is_empty());

    assert!(b.iter_from(49).is_none(), "below the trimmed prefix");

    Ok(())
}

#[test]
fn trim_upto_releases_bytes_and_advances_preceding() -> anyhow::Result<()> {
    let mut b = OpBuffer::new(OpId::MIN);
    for index in 1..=5 {
        b.append(op(1, index, 100));
    }
    let per_op = 100 + 16;

    let freed = b.trim_upto(2);
    assert_eq!(2 * per_op, freed);
    assert_eq!(OpId::new(1, 2), b.preceding_id());
    assert_eq!(3, b.len());
    assert_eq!(3 * per_op, b.bytes());
    assert!(b.validate().is_ok());

    // Trimming at the same point again is a no-op.
    assert_eq!(0, b.trim_upto(2));

    let freed = b.trim_upto(u64::MAX);
    assert_eq!(3 * per_op, freed);
    assert!(b.is_empty());
    assert_eq!(OpId::new(1, 5), b.preceding_id());
    assert_eq!(OpId::new(1, 5), b.last_id(), "last id falls back to preceding");
    assert_eq!(6, b.next_index());

    Ok(())
}

#[test]
fn term_at_covers_the_trim_boundary() -> anyhow::Result<()> {
    let mut b = OpBuffer::new(OpId::MIN);
    for index in 1..=10 {
        b.append(op((index - 1) / 7, index, 0));
    }

    assert_eq!(Some(0), b.term_at(0), "the preceding id answers");
    assert_eq!(Some(0), b.term_at(7));
    assert_eq!(Some(1), b.term_at(8));
    assert_eq!(Some(1), b.term_at(10));
    assert_eq!(None, b.term_at(11));

    b.trim_upto(8);
    assert_eq!(Some(1), b.term_at(8), "boundary term after trimming");
    assert_eq!(None, b.term_at(3));

    Ok(())
}
