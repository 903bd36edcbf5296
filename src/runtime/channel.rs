//! Blocking channels with buffered and rendezvous semantics, plus the
//! non-blocking probes the select statement is built from.

use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::object::RtValue;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

struct ChanInner {
    buf: VecDeque<RtValue>,
    cap: usize,
    closed: bool,
    /// Receivers currently parked in `recv`. For rendezvous channels a send
    /// may only complete while a receiver is committed.
    recv_waiting: usize,
}

struct ChanState {
    inner: Mutex<ChanInner>,
    send_cv: Condvar,
    recv_cv: Condvar,
}

/// The outcome of a non-blocking receive probe.
pub enum TryRecv {
    Value(RtValue),
    Closed,
    Pending,
}

/// The outcome of a non-blocking send probe.
pub enum TrySend {
    Sent,
    Closed,
    Pending,
}

#[derive(Clone)]
pub struct ChannelValue {
    state: Arc<ChanState>,
}

impl fmt::Debug for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({:p})", Arc::as_ptr(&self.state))
    }
}

impl ChannelValue {
    pub fn new(cap: usize) -> Self {
        Self {
            state: Arc::new(ChanState {
                inner: Mutex::new(ChanInner {
                    buf: VecDeque::new(),
                    cap,
                    closed: false,
                    recv_waiting: 0,
                }),
                send_cv: Condvar::new(),
                recv_cv: Condvar::new(),
            }),
        }
    }

    pub fn same_channel(&self, other: &ChannelValue) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn can_send(inner: &ChanInner) -> bool {
        if inner.cap > 0 {
            inner.buf.len() < inner.cap
        } else {
            // Rendezvous: each parked receiver grants room for one value.
            inner.buf.len() < inner.recv_waiting
        }
    }

    /// Blocking send. Returns an error if the channel is or becomes closed.
    pub fn send(&self, value: RtValue) -> RuntimeResult<()> {
        let mut inner = self.state.inner.lock().expect("channel lock");
        loop {
            if inner.closed {
                return Err(RuntimeError::SendOnClosedChannel);
            }
            if Self::can_send(&inner) {
                inner.buf.push_back(value);
                self.state.recv_cv.notify_one();
                return Ok(());
            }
            inner = self.state.send_cv.wait(inner).expect("channel lock");
        }
    }

    /// Blocking receive. `None` means the channel is closed and drained.
    pub fn recv(&self) -> Option<RtValue> {
        let mut inner = self.state.inner.lock().expect("channel lock");
        loop {
            if let Some(value) = inner.buf.pop_front() {
                self.state.send_cv.notify_one();
                return Some(value);
            }
            if inner.closed {
                return None;
            }
            inner.recv_waiting += 1;
            // A sender may be parked waiting for a committed receiver.
            self.state.send_cv.notify_one();
            inner = self.state.recv_cv.wait(inner).expect("channel lock");
            inner.recv_waiting -= 1;
        }
    }

    pub fn try_send(&self, value: RtValue) -> TrySend {
        let mut inner = self.state.inner.lock().expect("channel lock");
        if inner.closed {
            return TrySend::Closed;
        }
        if Self::can_send(&inner) {
            inner.buf.push_back(value);
            self.state.recv_cv.notify_one();
            TrySend::Sent
        } else {
            TrySend::Pending
        }
    }

    pub fn try_recv(&self) -> TryRecv {
        let mut inner = self.state.inner.lock().expect("channel lock");
        if let Some(value) = inner.buf.pop_front() {
            self.state.send_cv.notify_one();
            return TryRecv::Value(value);
        }
        if inner.closed {
            TryRecv::Closed
        } else {
            TryRecv::Pending
        }
    }

    pub fn close(&self) -> RuntimeResult<()> {
        let mut inner = self.state.inner.lock().expect("channel lock");
        if inner.closed {
            return Err(RuntimeError::CloseOfClosedChannel);
        }
        inner.closed = true;
        self.state.send_cv.notify_all();
        self.state.recv_cv.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn buffered_send_does_not_block() {
        let ch = ChannelValue::new(1);
        ch.send(RtValue::Int(7)).expect("send");
        match ch.recv() {
            Some(RtValue::Int(7)) => {}
            other => panic!("unexpected receive: {:?}", other),
        }
    }

    #[test]
    fn unbuffered_send_waits_for_receiver() {
        let ch = ChannelValue::new(0);
        // No receiver yet, so a probe must report pending.
        assert!(matches!(ch.try_send(RtValue::Int(1)), TrySend::Pending));

        let ch2 = ch.clone();
        let sender = thread::spawn(move || {
            ch2.send(RtValue::Int(42)).expect("send");
        });
        thread::sleep(Duration::from_millis(10));
        match ch.recv() {
            Some(RtValue::Int(42)) => {}
            other => panic!("unexpected receive: {:?}", other),
        }
        sender.join().expect("sender thread");
    }

    #[test]
    fn rendezvous_pairs_senders_with_receivers() {
        let ch = ChannelValue::new(0);
        let mut receivers = Vec::new();
        for _ in 0..2 {
            let ch = ch.clone();
            receivers.push(thread::spawn(move || match ch.recv() {
                Some(RtValue::Int(v)) => v,
                other => panic!("unexpected receive: {:?}", other),
            }));
        }
        thread::sleep(Duration::from_millis(10));
        ch.send(RtValue::Int(1)).expect("first send");
        ch.send(RtValue::Int(2)).expect("second send");
        let mut got: Vec<i64> = receivers
            .into_iter()
            .map(|h| h.join().expect("receiver"))
            .collect();
        got.sort_unstable();
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn receive_on_closed_channel_drains_then_reports_closed() {
        let ch = ChannelValue::new(2);
        ch.send(RtValue::Int(1)).expect("send");
        ch.close().expect("close");
        assert!(matches!(ch.recv(), Some(RtValue::Int(1))));
        assert!(ch.recv().is_none());
    }

    #[test]
    fn send_on_closed_channel_errors() {
        let ch = ChannelValue::new(1);
        ch.close().expect("close");
        assert!(matches!(
            ch.send(RtValue::Int(1)),
            Err(RuntimeError::SendOnClosedChannel)
        ));
        assert!(matches!(
            ch.close(),
            Err(RuntimeError::CloseOfClosedChannel)
        ));
    }

    #[test]
    fn close_wakes_blocked_receiver() {
        let ch = ChannelValue::new(0);
        let ch2 = ch.clone();
        let receiver = thread::spawn(move || ch2.recv());
        thread::sleep(Duration::from_millis(10));
        ch.close().expect("close");
        assert!(receiver.join().expect("receiver").is_none());
    }
}
