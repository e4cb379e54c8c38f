use std::{
    fmt,
    sync::{Arc, Weak},
};
use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, trace};
use crate::encoding::tlv::Block;
use crate::error::AbacError;
use super::{name::Name, packet::{Data, Interest}};

/// Responder registered for a prefix. Returning `None` leaves the Interest
/// unanswered, so the requester times out.
pub type InterestHandler = Arc<dyn Fn(Interest) -> BoxFuture<'static, Option<Data>> + Send + Sync>;

/// Wraps a synchronous closure as an [`InterestHandler`].
pub fn sync_handler<F>(f: F) -> InterestHandler
where
    F: Fn(Interest) -> Option<Data> + Send + Sync + 'static,
{
    Arc::new(move |interest| future::ready(f(interest)).boxed())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NackReason {
    NoRoute,
}

/// Why an Interest did not bring back Data.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RequestFailure {
    Nack(NackReason),
    Timeout,
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestFailure::Nack(reason) => write!(f, "nack ({:?})", reason),
            RequestFailure::Timeout => write!(f, "timeout"),
        }
    }
}

/// The request/response transport every role talks through.
#[async_trait]
pub trait Face: Send + Sync {
    /// Sends `interest` and waits at most its lifetime for matching Data.
    async fn express_interest(&self, interest: Interest) -> Result<Data, RequestFailure>;

    /// Routes Interests under `prefix` to `handler` until the returned
    /// registration is cancelled or dropped.
    fn set_interest_filter(&self, prefix: Name, handler: InterestHandler) -> RegisteredPrefix;
}

/// A live prefix registration.
pub struct RegisteredPrefix {
    prefix: Name,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl RegisteredPrefix {
    pub fn new(prefix: Name, cancel: impl FnOnce() + Send + Sync + 'static) -> RegisteredPrefix {
        RegisteredPrefix { prefix, cancel: Some(Box::new(cancel)) }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// Unregisters now instead of on drop.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            debug!(prefix = %self.prefix, "unregistering prefix");
            cancel();
        }
    }
}

impl Drop for RegisteredPrefix {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for RegisteredPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RegisteredPrefix({})", self.prefix)
    }
}

struct Route {
    id: u64,
    face: u64,
    prefix: Name,
    handler: InterestHandler,
}

#[derive(Default)]
struct ForwarderState {
    next_id: u64,
    routes: Vec<Route>,
    losses: Vec<(Name, usize)>,
}

impl ForwarderState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Consumes one injected loss covering `name`, if any.
    fn take_loss(&mut self, name: &Name) -> bool {
        match self.losses.iter_mut().find(|(prefix, count)| *count > 0 && prefix.is_prefix_of(name)) {
            Some((_, count)) => {
                *count -= 1;
                true
            }
            None => false,
        }
    }

    /// Longest-prefix match among routes owned by other faces.
    fn lookup(&self, from: u64, name: &Name) -> Option<InterestHandler> {
        self.routes
            .iter()
            .filter(|route| route.face != from && route.prefix.is_prefix_of(name))
            .max_by_key(|route| (route.prefix.len(), route.id))
            .map(|route| Arc::clone(&route.handler))
    }
}

enum Dispatch {
    Deliver(InterestHandler),
    Lost,
    NoRoute,
}

/// In-process forwarder connecting any number of [`MemoryFace`]s.
#[derive(Clone, Default)]
pub struct Forwarder {
    state: Arc<Mutex<ForwarderState>>,
}

impl Forwarder {
    pub fn new() -> Forwarder {
        Forwarder::default()
    }

    pub fn add_face(&self) -> Arc<MemoryFace> {
        let id = self.state.lock().next_id();
        Arc::new(MemoryFace { id, state: Arc::clone(&self.state) })
    }

    /// Silently drops the next `count` Interests under `prefix`.
    pub fn inject_loss(&self, prefix: Name, count: usize) {
        self.state.lock().losses.push((prefix, count));
    }

    pub fn route_count(&self) -> usize {
        self.state.lock().routes.len()
    }
}

/// One endpoint attached to a [`Forwarder`].
pub struct MemoryFace {
    id: u64,
    state: Arc<Mutex<ForwarderState>>,
}

impl MemoryFace {
    fn dispatch(&self, interest: &Interest) -> Dispatch {
        let mut state = self.state.lock();
        if state.take_loss(&interest.name) {
            return Dispatch::Lost;
        }
        match state.lookup(self.id, &interest.name) {
            Some(handler) => Dispatch::Deliver(handler),
            None => Dispatch::NoRoute,
        }
    }
}

fn through_wire(interest: &Interest) -> Result<Interest, AbacError> {
    Interest::wire_decode(&Block::decode(&interest.wire_encode().encode())?)
}

#[async_trait]
impl Face for MemoryFace {
    async fn express_interest(&self, interest: Interest) -> Result<Data, RequestFailure> {
        let deadline = Instant::now() + interest.lifetime;
        trace!(name = %interest.name, nonce = interest.nonce, "expressing interest");
        let handler = match self.dispatch(&interest) {
            Dispatch::Deliver(handler) => handler,
            Dispatch::NoRoute => {
                debug!(name = %interest.name, "no route");
                return Err(RequestFailure::Nack(NackReason::NoRoute));
            }
            Dispatch::Lost => {
                debug!(name = %interest.name, "interest lost");
                time::sleep_until(deadline).await;
                return Err(RequestFailure::Timeout);
            }
        };
        // both directions cross the forwarder in wire form
        let delivered = match through_wire(&interest) {
            Ok(delivered) => delivered,
            Err(failure) => {
                debug!(name = %interest.name, %failure, "undecodable interest");
                time::sleep_until(deadline).await;
                return Err(RequestFailure::Timeout);
            }
        };
        match time::timeout_at(deadline, handler(delivered)).await {
            Ok(Some(data)) if interest.matches(&data) => match Data::from_wire(&data.to_wire()) {
                Ok(data) => Ok(data),
                Err(failure) => {
                    debug!(name = %data.name, %failure, "undecodable data");
                    time::sleep_until(deadline).await;
                    Err(RequestFailure::Timeout)
                }
            },
            Ok(_) => {
                time::sleep_until(deadline).await;
                Err(RequestFailure::Timeout)
            }
            Err(_) => Err(RequestFailure::Timeout),
        }
    }

    fn set_interest_filter(&self, prefix: Name, handler: InterestHandler) -> RegisteredPrefix {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id();
            state.routes.push(Route { id, face: self.id, prefix: prefix.clone(), handler });
            id
        };
        debug!(prefix = %prefix, "registered prefix");
        let state: Weak<Mutex<ForwarderState>> = Arc::downgrade(&self.state);
        RegisteredPrefix::new(prefix, move || {
            if let Some(state) = state.upgrade() {
                state.lock().routes.retain(|route| route.id != id);
            }
        })
    }
}
