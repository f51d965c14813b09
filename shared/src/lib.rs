//! Types shared between the stayrank server and its clients: the domain
//! model (hotels, reviews, users), the framed wire protocol, and the error
//! taxonomy both sides agree on.

pub mod error;
pub mod model;
pub mod protocol;

pub use error::{ConfigurationError, DomainError, ProtocolError, TransportError};
pub use model::{Badge, Hotel, HotelRate, LocalRanking, Review, User};
pub use protocol::{FrameDecoder, Packet};
