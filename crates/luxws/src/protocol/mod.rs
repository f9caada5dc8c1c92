//! Protocol module containing the command strings, the XML element parser
//! and the reply envelope codec.

pub mod codec;
pub mod command;
pub mod xml;

pub use codec::{decode_reply, CodecError, Envelope};
pub use command::{Command, Kind};
pub use xml::{parse_document, Element, Node};
