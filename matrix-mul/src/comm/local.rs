//! In-process world: every rank is a thread and data moves by value over
//! [`crossbeam_channel`] channels, one inbox per rank.
//!
//! Sends are buffered, so an immediate send is complete as soon as it is issued.
//! A receive blocks until a matching message (same source, same channel) arrives;
//! messages that do not match are stashed for later receives. When a rank's
//! communicator is dropped it tells every peer, so a rank waiting on a peer that
//! already exited fails with [`Error::Disconnected`] instead of blocking forever.

use std::cell::RefCell;
use std::thread;

use crossbeam_channel::{self as cb};
use tracing::trace;

use super::{Communicator, Tag};
use crate::{Error, NumberType, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Scatter,
    Broadcast,
    Gather,
    Tagged(Tag),
    Hangup,
}

#[derive(Debug)]
struct Envelope {
    source: usize,
    channel: Channel,
    payload: Vec<NumberType>,
}

/// A fixed-size group of ranks living in the current process.
#[derive(Debug, Clone, Copy)]
pub struct LocalWorld {
    size: usize,
}

impl LocalWorld {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidRank { rank: 0, ranks: 0 });
        }
        Ok(LocalWorld { size })
    }

    /// Wires up one communicator per rank, in rank order.
    pub fn communicators(&self) -> Vec<LocalCommunicator> {
        let (senders, inboxes): (Vec<_>, Vec<_>) = (0..self.size).map(|_| cb::unbounded()).unzip();

        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalCommunicator {
                rank,
                peers: senders.clone(),
                inbox,
                stash: RefCell::new(Vec::new()),
            })
            .collect()
    }

    /// Runs `body` once per rank, each on its own thread, and returns the results in
    /// rank order once every rank has finished.
    ///
    /// * `body`: The per-rank program.
    pub fn run<T, F>(&self, body: F) -> Result<Vec<T>>
    where
        F: Fn(&LocalCommunicator) -> T + Sync,
        T: Send,
    {
        let body = &body;
        thread::scope(|scope| -> Result<Vec<T>> {
            let handles = self
                .communicators()
                .into_iter()
                .map(|comm| {
                    thread::Builder::new()
                        .name(format!("rank-{}", comm.rank))
                        .spawn_scoped(scope, move || body(&comm))
                })
                .collect::<std::io::Result<Vec<_>>>()?;

            handles
                .into_iter()
                .map(|handle| handle.join().map_err(|_| Error::RankPanicked))
                .collect()
        })
    }
}

/// One rank's endpoint in a [`LocalWorld`].
#[derive(Debug)]
pub struct LocalCommunicator {
    rank: usize,
    peers: Vec<cb::Sender<Envelope>>,
    inbox: cb::Receiver<Envelope>,
    stash: RefCell<Vec<Envelope>>,
}

impl LocalCommunicator {
    fn check_rank(&self, rank: usize) -> Result<()> {
        if rank < self.peers.len() {
            Ok(())
        } else {
            Err(Error::InvalidRank {
                rank,
                ranks: self.peers.len(),
            })
        }
    }

    fn post(&self, dest: usize, channel: Channel, payload: Vec<NumberType>) -> Result<()> {
        self.check_rank(dest)?;
        trace!(rank = self.rank, dest, ?channel, len = payload.len(), "post");
        self.peers[dest]
            .send(Envelope {
                source: self.rank,
                channel,
                payload,
            })
            .map_err(|_| Error::Disconnected(dest))
    }

    fn take(&self, source: usize, channel: Channel) -> Result<Vec<NumberType>> {
        self.check_rank(source)?;
        let mut stash = self.stash.borrow_mut();

        if let Some(pos) = stash
            .iter()
            .position(|e| e.source == source && e.channel == channel)
        {
            return Ok(stash.remove(pos).payload);
        }
        if stash
            .iter()
            .any(|e| e.source == source && e.channel == Channel::Hangup)
        {
            return Err(Error::Disconnected(source));
        }

        loop {
            let envelope = self.inbox.recv().map_err(|_| Error::Disconnected(source))?;
            if envelope.source == source {
                if envelope.channel == channel {
                    return Ok(envelope.payload);
                }
                if envelope.channel == Channel::Hangup {
                    stash.push(envelope);
                    return Err(Error::Disconnected(source));
                }
            }
            stash.push(envelope);
        }
    }

    fn receive_into(&self, source: usize, channel: Channel, buf: &mut [NumberType]) -> Result<()> {
        let payload = self.take(source, channel)?;
        if payload.len() != buf.len() {
            return Err(Error::LengthMismatch {
                peer: source,
                expected: buf.len(),
                actual: payload.len(),
            });
        }
        buf.copy_from_slice(&payload);
        trace!(rank = self.rank, source, ?channel, len = buf.len(), "received");
        Ok(())
    }
}

impl Drop for LocalCommunicator {
    fn drop(&mut self) {
        for (peer, tx) in self.peers.iter().enumerate() {
            if peer != self.rank {
                // the peer may be gone already
                let _ = tx.send(Envelope {
                    source: self.rank,
                    channel: Channel::Hangup,
                    payload: Vec::new(),
                });
            }
        }
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn scatter_into(
        &self,
        root: usize,
        send: Option<&[NumberType]>,
        recv: &mut [NumberType],
    ) -> Result<()> {
        self.check_rank(root)?;
        if self.rank != root {
            return self.receive_into(root, Channel::Scatter, recv);
        }

        let send = send.ok_or(Error::MissingRootBuffer)?;
        let chunk = recv.len();
        if send.len() != chunk * self.size() {
            return Err(Error::LengthMismatch {
                peer: root,
                expected: chunk * self.size(),
                actual: send.len(),
            });
        }

        for peer in 0..self.size() {
            let block = &send[peer * chunk..(peer + 1) * chunk];
            if peer == root {
                recv.copy_from_slice(block);
            } else {
                self.post(peer, Channel::Scatter, block.to_vec())?;
            }
        }
        Ok(())
    }

    fn broadcast_into(&self, root: usize, buf: &mut [NumberType]) -> Result<()> {
        self.check_rank(root)?;
        if self.rank != root {
            return self.receive_into(root, Channel::Broadcast, buf);
        }

        for peer in (0..self.size()).filter(|&peer| peer != root) {
            self.post(peer, Channel::Broadcast, buf.to_vec())?;
        }
        Ok(())
    }

    fn gather_into(
        &self,
        root: usize,
        send: &[NumberType],
        recv: Option<&mut [NumberType]>,
    ) -> Result<()> {
        self.check_rank(root)?;
        if self.rank != root {
            return self.post(root, Channel::Gather, send.to_vec());
        }

        let recv = recv.ok_or(Error::MissingRootBuffer)?;
        let chunk = send.len();
        if recv.len() != chunk * self.size() {
            return Err(Error::LengthMismatch {
                peer: root,
                expected: chunk * self.size(),
                actual: recv.len(),
            });
        }

        for peer in 0..self.size() {
            let block = &mut recv[peer * chunk..(peer + 1) * chunk];
            if peer == root {
                block.copy_from_slice(send);
            } else {
                self.receive_into(peer, Channel::Gather, block)?;
            }
        }
        Ok(())
    }

    fn immediate_send_all<F, R>(
        &self,
        messages: &[(usize, &[NumberType])],
        tag: Tag,
        while_pending: F,
    ) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        for (dest, data) in messages {
            self.post(*dest, Channel::Tagged(tag), data.to_vec())?;
        }
        Ok(while_pending())
    }

    fn immediate_receive_into(
        &self,
        source: usize,
        tag: Tag,
        buf: &mut [NumberType],
    ) -> Result<()> {
        self.receive_into(source, Channel::Tagged(tag), buf)
    }

    fn immediate_broadcast_into(&self, root: usize, buf: &mut [NumberType]) -> Result<()> {
        self.broadcast_into(root, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_world_is_rejected() {
        assert!(LocalWorld::new(0).is_err());
    }

    #[test]
    fn scatter_and_gather_preserve_rank_order() {
        let world = LocalWorld::new(4).unwrap();
        let results = world
            .run(|comm| -> Result<Option<Vec<f64>>> {
                let send: Vec<f64> = (0..8).map(|x| x as f64).collect();
                let mut local = vec![0.0; 2];
                let root_send = (comm.rank() == 0).then_some(&send[..]);
                comm.scatter_into(0, root_send, &mut local)?;
                assert_eq!(local, vec![2.0 * comm.rank() as f64, 2.0 * comm.rank() as f64 + 1.0]);

                for x in local.iter_mut() {
                    *x *= 10.0;
                }
                let mut gathered = vec![0.0; 8];
                if comm.rank() == 0 {
                    comm.gather_into(0, &local, Some(&mut gathered))?;
                    Ok(Some(gathered))
                } else {
                    comm.gather_into(0, &local, None)?;
                    Ok(None)
                }
            })
            .unwrap();

        let expected: Vec<f64> = (0..8).map(|x| x as f64 * 10.0).collect();
        assert_eq!(results[0].as_ref().unwrap(), &Some(expected));
        assert!(results[1..].iter().all(|r| matches!(r, Ok(None))));
    }

    #[test]
    fn broadcast_reaches_every_rank() {
        let world = LocalWorld::new(3).unwrap();
        let results = world
            .run(|comm| {
                let mut buf = if comm.rank() == 0 {
                    vec![1.5, 2.5]
                } else {
                    vec![0.0; 2]
                };
                comm.immediate_broadcast_into(0, &mut buf).map(|_| buf)
            })
            .unwrap();

        for buf in results {
            assert_eq!(buf.unwrap(), vec![1.5, 2.5]);
        }
    }

    #[test]
    fn tagged_messages_match_by_tag_not_arrival_order() {
        let world = LocalWorld::new(2).unwrap();
        let results = world
            .run(|comm| -> Result<(f64, f64)> {
                if comm.rank() == 1 {
                    comm.immediate_send_all(&[(0, &[2.0][..])], Tag::GatherOut, || ())?;
                    comm.immediate_send_all(&[(0, &[1.0][..])], Tag::ScatterIn, || ())?;
                    return Ok((0.0, 0.0));
                }
                let (mut first, mut second) = ([0.0], [0.0]);
                comm.immediate_receive_into(1, Tag::ScatterIn, &mut first)?;
                comm.immediate_receive_into(1, Tag::GatherOut, &mut second)?;
                Ok((first[0], second[0]))
            })
            .unwrap();

        assert_eq!(results[0].as_ref().unwrap(), &(1.0, 2.0));
    }

    #[test]
    fn while_pending_runs_once_sends_are_issued() {
        let world = LocalWorld::new(2).unwrap();
        let results = world
            .run(|comm| -> Result<u32> {
                if comm.rank() == 0 {
                    comm.immediate_send_all(&[(1, &[4.0, 5.0][..])], Tag::ScatterIn, || 7)
                } else {
                    let mut buf = [0.0; 2];
                    comm.immediate_receive_into(0, Tag::ScatterIn, &mut buf)?;
                    assert_eq!(buf, [4.0, 5.0]);
                    Ok(0)
                }
            })
            .unwrap();

        assert_eq!(results[0].as_ref().unwrap(), &7);
    }

    #[test]
    fn exited_peer_is_reported_instead_of_hanging() {
        let world = LocalWorld::new(2).unwrap();
        let results = world
            .run(|comm| {
                if comm.rank() == 0 {
                    let mut buf = [0.0; 4];
                    comm.immediate_receive_into(1, Tag::GatherOut, &mut buf)
                } else {
                    Ok(())
                }
            })
            .unwrap();

        assert!(matches!(results[0], Err(Error::Disconnected(1))));
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let world = LocalWorld::new(2).unwrap();
        let results = world
            .run(|comm| {
                if comm.rank() == 0 {
                    comm.immediate_send_all(&[(1, &[1.0, 2.0, 3.0][..])], Tag::ScatterIn, || ())
                } else {
                    let mut buf = [0.0; 2];
                    comm.immediate_receive_into(0, Tag::ScatterIn, &mut buf)
                }
            })
            .unwrap();

        assert!(matches!(
            results[1],
            Err(Error::LengthMismatch {
                peer: 0,
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn panicking_rank_fails_the_run() {
        let world = LocalWorld::new(2).unwrap();
        let result = world.run(|comm| {
            if comm.rank() == 1 {
                panic!("rank 1 gives up");
            }
        });

        assert!(matches!(result, Err(Error::RankPanicked)));
    }
}
