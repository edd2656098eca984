//! Bounded source contract.

use crate::element::{Element, FetchError};
use async_trait::async_trait;
use std::collections::VecDeque;

/// A finite, restart-free element source backing a source vertex.
///
/// `poll_next` yields the source's elements in order, ending with exactly one
/// [`Element::Finishmark`]. A source that has nothing available *right now*
/// returns [`FetchError::NotReady`]; the caller polls again later.
#[async_trait]
pub trait Readable: Send {
    /// Pull the next element.
    async fn poll_next(&mut self) -> Result<Element, FetchError>;

    /// Release any resources held by the source.
    fn close(&mut self) {}
}

/// A [`Readable`] over an in-memory collection of records.
pub struct VecReadable {
    records: VecDeque<crate::Record>,
}

impl VecReadable {
    pub fn new(records: impl IntoIterator<Item = crate::Record>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Readable for VecReadable {
    async fn poll_next(&mut self) -> Result<Element, FetchError> {
        match self.records.pop_front() {
            Some(record) => Ok(Element::Record(record)),
            None => Ok(Element::Finishmark),
        }
    }
}
