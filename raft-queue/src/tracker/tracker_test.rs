use pretty_assertions::assert_eq;

use crate::error::DuplicatePeer;
use crate::error::UnknownPeer;
use crate::tracker::PeerTracker;
use crate::OpId;

#[test]
fn track_and_untrack() -> anyhow::Result<()> {
    let mut t = PeerTracker::default();

    t.track("a", OpId::MIN)?;
    assert_eq!(
        Err(DuplicatePeer { uuid: "a".to_string() }),
        t.track("a", OpId::MIN)
    );
    assert_eq!(1, t.len());

    let c = t.cursor("a").expect("tracked");
    assert_eq!(OpId::MIN, c.last_received());
    assert!(!c.synced(), "a fresh cursor is unsynced");

    t.untrack("a")?;
    assert_eq!(
        Err(UnknownPeer { uuid: "a".to_string() }),
        t.untrack("a")
    );
    assert!(t.cursor("a").is_none());

    Ok(())
}

#[test]
fn cursor_update_syncs_and_is_absolute() -> anyhow::Result<()> {
    let mut t = PeerTracker::default();
    t.track("a", OpId::new(3, 30))?;

    let c = t.cursor_mut("a").expect("tracked");
    c.update_received(OpId::new(7, 50));
    assert!(c.synced());
    assert_eq!(OpId::new(7, 50), c.last_received());

    // Reports are absolute; a lower one rewinds the cursor.
    c.update_received(OpId::new(2, 10));
    assert_eq!(OpId::new(2, 10), c.last_received());
    assert!(c.synced());

    Ok(())
}

#[test]
fn min_acked_index() -> anyhow::Result<()> {
    let mut t = PeerTracker::default();
    assert_eq!(None, t.min_acked_index());

    t.track("a", OpId::MIN)?;
    t.track("b", OpId::MIN)?;
    t.track("c", OpId::MIN)?;

    t.cursor_mut("a").expect("a").update_received(OpId::new(0, 5));
    t.cursor_mut("b").expect("b").update_received(OpId::new(1, 9));
    assert_eq!(Some(0), t.min_acked_index(), "unsynced c still holds it down");

    t.cursor_mut("c").expect("c").update_received(OpId::new(0, 3));
    assert_eq!(Some(3), t.min_acked_index());

    Ok(())
}

#[test]
fn quorum_acked_index() -> anyhow::Result<()> {
    let mut t = PeerTracker::default();
    t.track("a", OpId::MIN)?;
    t.track("b", OpId::MIN)?;
    t.track("c", OpId::MIN)?;

    // (peer, acked index) -> expected quorum index at majority 2
    let cases = [
        (("a", 5), Some(0)),
        (("b", 5), Some(5)),
        (("c", 10), Some(5)),
        (("a", 10), Some(10)),
    ];
    for ((uuid, index), want) in cases {
        t.cursor_mut(uuid).expect(uuid).update_received(OpId::new(0, index));
        assert_eq!(want, t.quorum_acked_index(2), "after acking {} on {}", index, uuid);
    }

    assert_eq!(Some(10), t.quorum_acked_index(1));
    assert_eq!(Some(5), t.quorum_acked_index(3));
    assert_eq!(None, t.quorum_acked_index(4), "not enough tracked peers");
    assert_eq!(None, t.quorum_acked_index(0));

    Ok(())
}
