//! Byte stream alias used for file content in and out of the storage layer.

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

/// A byte stream type used for reading and writing file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;
