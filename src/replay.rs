//! Sliding-window replay protection (§4.5).
//!
//! A circular bitmap of `W·8` slots indexed by `seqno mod (W·8)`. Bit value
//! 1 means "slot is late / not yet received"; 0 means "received" (or
//! outside the window). `inseqno` is the next-expected sequence number.

use crate::core::SptpsError;

/// The replay window. `W = 0` (an empty bitmap) disables replay protection
/// entirely: every sequence check is bypassed.
#[derive(Debug, Clone)]
pub struct ReplayWindow {
    window_bytes: usize,
    bitmap: Vec<u8>,
    inseqno: u32,
    farfuture: u32,
    received: u64,
}

impl ReplayWindow {
    /// Allocate a window of `window_bytes` bytes (`window_bytes * 8` slots).
    /// `0` disables replay protection.
    pub fn new(window_bytes: usize) -> Self {
        Self {
            window_bytes,
            bitmap: vec![0u8; window_bytes],
            inseqno: 0,
            farfuture: 0,
            received: 0,
        }
    }

    /// The next sequence number this window expects in order.
    pub fn inseqno(&self) -> u32 {
        self.inseqno
    }

    /// Number of records accepted so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    fn slots(&self) -> u32 {
        (self.window_bytes as u32) * 8
    }

    fn slot_index(&self, seqno: u32) -> usize {
        (seqno % self.slots()) as usize
    }

    fn is_late(&self, idx: usize) -> bool {
        self.bitmap[idx / 8] & (1 << (idx % 8)) != 0
    }

    fn set_late(&mut self, idx: usize) {
        self.bitmap[idx / 8] |= 1 << (idx % 8);
    }

    fn clear_late(&mut self, idx: usize) {
        self.bitmap[idx / 8] &= !(1 << (idx % 8));
    }

    fn mark_all_late(&mut self) {
        for byte in &mut self.bitmap {
            *byte = 0xff;
        }
    }

    /// Check (and, if `update_state`, admit) `seqno`. Verify-only callers
    /// (`verify_datagram`) pass `update_state = false`: the window's state
    /// is then left exactly as it was, regardless of the outcome.
    ///
    /// Sequence comparisons assume `seqno` never runs more than half the
    /// `u32` range ahead of or behind `inseqno`, which holds in practice —
    /// the rekey advisory fires at `seqno ≈ 2^30`, long before a 32-bit
    /// counter could wrap.
    pub fn check(&mut self, seqno: u32, update_state: bool) -> Result<(), SptpsError> {
        if self.window_bytes == 0 {
            return Ok(());
        }
        let slots = self.slots();

        if seqno == self.inseqno {
            if update_state {
                let idx = self.slot_index(seqno);
                self.clear_late(idx);
                self.inseqno = self.inseqno.wrapping_add(1);
                self.farfuture = 0;
                self.received += 1;
            }
            return Ok(());
        }

        let ahead = seqno.wrapping_sub(self.inseqno) < (u32::MAX / 2);
        if ahead {
            let distance = seqno.wrapping_sub(self.inseqno);
            if distance >= slots {
                let next_farfuture = self.farfuture.saturating_add(1);
                let threshold = (self.window_bytes as u32) / 4;
                if next_farfuture < threshold {
                    if update_state {
                        self.farfuture = next_farfuture;
                    }
                    return Err(SptpsError::ReplayDrop {
                        seqno,
                        reason: "far future, below tolerance",
                    });
                }
                // Peer has advanced past what this window can represent;
                // resynchronize. Packets older than the new window become
                // silently unreachable (documented trade-off, §9).
                if update_state {
                    self.mark_all_late();
                    let idx = self.slot_index(seqno);
                    self.clear_late(idx);
                    self.inseqno = seqno.wrapping_add(1);
                    self.farfuture = 0;
                    self.received += 1;
                }
                return Ok(());
            }

            if update_state {
                let mut s = self.inseqno;
                while s != seqno {
                    let idx = self.slot_index(s);
                    self.set_late(idx);
                    s = s.wrapping_add(1);
                }
                let idx = self.slot_index(seqno);
                self.clear_late(idx);
                self.inseqno = seqno.wrapping_add(1);
                self.farfuture = 0;
                self.received += 1;
            }
            return Ok(());
        }

        // seqno < inseqno
        let distance_back = self.inseqno.wrapping_sub(seqno);
        if distance_back > slots {
            return Err(SptpsError::ReplayDrop {
                seqno,
                reason: "outside window",
            });
        }
        let idx = self.slot_index(seqno);
        if !self.is_late(idx) {
            return Err(SptpsError::ReplayDrop {
                seqno,
                reason: "already received",
            });
        }
        if update_state {
            self.clear_late(idx);
            self.farfuture = 0;
            self.received += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_sequence_is_accepted() {
        let mut w = ReplayWindow::new(16);
        for seqno in 0..5u32 {
            w.check(seqno, true).unwrap();
        }
        assert_eq!(w.inseqno(), 5);
        assert_eq!(w.received(), 5);
    }

    #[test]
    fn scenario_s2_datagram_loss_and_reorder() {
        let mut w = ReplayWindow::new(16);
        for seqno in [0u32, 1, 2, 3, 4] {
            w.check(seqno, true).unwrap();
        }
        // 5 and 6 dropped; 7 arrives next.
        w.check(7, true).unwrap();
        assert_eq!(w.inseqno(), 8);
        // Late arrival of 6 is still within the window and accepted.
        w.check(6, true).unwrap();
        // Late arrival of 5 is accepted too, while the window is fresh.
        w.check(5, true).unwrap();
        // Once inseqno has moved far past the window, 5 is unreachable.
        for seqno in 8..(128 + 8) {
            w.check(seqno, true).unwrap();
        }
        assert!(w.check(5, true).is_err());
    }

    #[test]
    fn scenario_s3_replay_is_rejected() {
        let mut w = ReplayWindow::new(16);
        w.check(10, true).unwrap();
        let err = w.check(10, true).unwrap_err();
        assert!(matches!(err, SptpsError::ReplayDrop { seqno: 10, .. }));
    }

    #[test]
    fn scenario_s4_far_future_resynchronizes_after_three_drops() {
        let mut w = ReplayWindow::new(16);
        for seqno in 0..100u32 {
            w.check(seqno, true).unwrap();
        }
        assert_eq!(w.inseqno(), 100);

        // W/4 == 4; the first three attempts at the same far-future seqno
        // must be dropped, the fourth accepted.
        assert!(w.check(10_000, true).is_err());
        assert!(w.check(10_000, true).is_err());
        assert!(w.check(10_000, true).is_err());
        w.check(10_000, true).unwrap();
        assert_eq!(w.inseqno(), 10_001);
    }

    #[test]
    fn verify_only_never_mutates_state() {
        let mut w = ReplayWindow::new(16);
        w.check(5, true).unwrap();
        let before = w.clone();
        assert!(w.check(5, false).is_err()); // already received
        assert!(w.check(6, false).is_ok());
        assert!(w.check(200, false).is_err()); // far future, below tolerance
        assert_eq!(w.inseqno(), before.inseqno());
        assert_eq!(w.received(), before.received());
        assert_eq!(w.bitmap, before.bitmap);
    }

    #[test]
    fn zero_width_window_disables_replay_protection() {
        let mut w = ReplayWindow::new(0);
        w.check(0, true).unwrap();
        w.check(0, true).unwrap();
        w.check(1_000_000, true).unwrap();
        w.check(0, true).unwrap();
    }
}
