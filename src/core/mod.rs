//! # Core Protocol Components
//!
//! Wire-level building blocks: primitives, the ABI tuple codec, relay frames and
//! export serialization.
//!
//! ## Components
//! - **Primitives**: `Address` and `U256`
//! - **ABI**: schema-driven tuple encoder/decoder shared with the foreign chain
//! - **Packet**: relay frame with magic bytes, channel, package type and sequence
//! - **Codec**: Tokio codec for framing packets over byte streams
//! - **Serialization**: bincode/JSON export of domain records
//!
//! ## Wire Format
//! ```text
//! relay frame: [Magic(4)] [Version(1)] [Channel(1)] [Type(1)] [Sequence(8)] [Length(4)] [Envelope(N)]
//! envelope:    [OperationType(1)] [ABI tuple]
//! ```
//!
//! ## Security
//! - Maximum frame payload: 1MB
//! - ABI offsets and lengths are checked before any slice or allocation

pub mod abi;
pub mod codec;
pub mod packet;
pub mod primitives;
pub mod serialization;
