//! Named-data networking primitives: names, packets, faces and the
//! retry discipline used by every requester.
pub mod face;
pub mod name;
pub mod packet;
pub mod retry;

pub use self::face::{Face, Forwarder, MemoryFace, RegisteredPrefix, RequestFailure};
pub use self::name::Name;
pub use self::packet::{ContentType, Data, Interest};
pub use self::retry::express_with_retry;
