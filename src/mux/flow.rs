//! Per-channel flow-control windows
//!
//! Each channel carries a credit window in both directions. The send
//! window counts bytes the peer will still accept from us; it shrinks
//! as DATA goes out and grows on WINDOW_UPDATE. The receive side counts
//! consumed bytes and hands back credit once half the initial window
//! has been used.

/// Flow-control state for one channel
#[derive(Debug)]
pub struct FlowControl {
    send_window: u32,
    recv_window: u32,
    recv_window_initial: u32,
    recv_consumed: u32,
}

impl FlowControl {
    /// Create windows with the configured initial size in both directions
    pub fn new(window_size: u32) -> Self {
        FlowControl {
            send_window: window_size,
            recv_window: window_size,
            recv_window_initial: window_size,
            recv_consumed: 0,
        }
    }

    /// Bytes the peer will currently accept from us
    pub fn send_window(&self) -> u32 {
        self.send_window
    }

    /// Reserve up to `want` bytes of send credit, also clamped to the
    /// maximum frame payload. Returns 0 when the window is exhausted;
    /// the caller queues the excess until credit returns.
    pub fn reserve_send(&mut self, want: usize, max_payload: usize) -> usize {
        let chunk = want
            .min(max_payload)
            .min(self.send_window as usize);
        self.send_window -= chunk as u32;
        chunk
    }

    /// Apply a WINDOW_UPDATE increment from the peer
    pub fn add_send(&mut self, increment: u32) {
        self.send_window = self.send_window.saturating_add(increment);
    }

    /// Account for `len` received payload bytes. Returns the increment
    /// to send back as a WINDOW_UPDATE once at least half of the
    /// initial window has been consumed, or `None` if no update is due.
    pub fn note_received(&mut self, len: usize) -> Option<u32> {
        self.recv_consumed += len as u32;

        if self.recv_consumed >= self.recv_window_initial / 2 {
            let increment = self.recv_consumed;
            self.recv_window = self.recv_window.saturating_add(increment);
            self.recv_consumed = 0;
            Some(increment)
        } else {
            None
        }
    }

    #[cfg(test)]
    fn recv_consumed(&self) -> u32 {
        self.recv_consumed
    }

    #[cfg(test)]
    fn recv_window(&self) -> u32 {
        self.recv_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::frame::FRAME_MAX_PAYLOAD;

    #[test]
    fn test_reserve_send_decrements_window() {
        let mut flow = FlowControl::new(1000);

        assert_eq!(flow.reserve_send(300, FRAME_MAX_PAYLOAD), 300);
        assert_eq!(flow.send_window(), 700);

        // Clamped to the remaining window
        assert_eq!(flow.reserve_send(900, FRAME_MAX_PAYLOAD), 700);
        assert_eq!(flow.send_window(), 0);

        // Exhausted window yields nothing
        assert_eq!(flow.reserve_send(1, FRAME_MAX_PAYLOAD), 0);
    }

    #[test]
    fn test_reserve_send_clamps_to_max_payload() {
        let mut flow = FlowControl::new(1 << 20);
        assert_eq!(
            flow.reserve_send(FRAME_MAX_PAYLOAD + 1, FRAME_MAX_PAYLOAD),
            FRAME_MAX_PAYLOAD
        );
    }

    #[test]
    fn test_add_send_restores_credit() {
        let mut flow = FlowControl::new(100);
        flow.reserve_send(100, FRAME_MAX_PAYLOAD);
        assert_eq!(flow.send_window(), 0);

        flow.add_send(250);
        assert_eq!(flow.send_window(), 250);
    }

    #[test]
    fn test_note_received_below_threshold() {
        let mut flow = FlowControl::new(1024);

        assert_eq!(flow.note_received(100), None);
        assert_eq!(flow.recv_consumed(), 100);
        assert_eq!(flow.note_received(300), None);
        assert_eq!(flow.recv_consumed(), 400);
    }

    #[test]
    fn test_note_received_emits_update_at_half_window() {
        let mut flow = FlowControl::new(1024);

        // 600 >= 512: update due, counter drains
        assert_eq!(flow.note_received(600), Some(600));
        assert_eq!(flow.recv_consumed(), 0);
        assert_eq!(flow.recv_window(), 1024 + 600);

        // Repeats for the next batch
        assert_eq!(flow.note_received(600), Some(600));
        assert_eq!(flow.recv_consumed(), 0);
    }

    #[test]
    fn test_note_received_accumulates_to_threshold() {
        let mut flow = FlowControl::new(1024);

        assert_eq!(flow.note_received(400), None);
        assert_eq!(flow.note_received(112), Some(512));
        assert_eq!(flow.recv_consumed(), 0);
    }
}
