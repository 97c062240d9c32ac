//! RangeLoader Trait
//!
//! Abstraction for data sources feeding the lazy cache: in-memory data,
//! closures, and the week calculator.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::FutureExt;
use futures::future::{BoxFuture, ready};

use crate::domain::week::{LifeSpan, WeekCell};
use crate::error::{Error, Result};

/// Trait for loading a contiguous range of items by index
pub trait RangeLoader: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    /// Load `range` (half-open). Items come back in index order; a short
    /// result leaves the trailing indices unresolved.
    fn load(&self, range: Range<usize>) -> BoxFuture<'static, Result<Vec<Self::Item>>>;
}

impl<L: RangeLoader> RangeLoader for Arc<L> {
    type Item = L::Item;

    fn load(&self, range: Range<usize>) -> BoxFuture<'static, Result<Vec<Self::Item>>> {
        (**self).load(range)
    }
}

/// Simple in-memory loader
pub struct VecLoader<R> {
    rows: Arc<Vec<R>>,
}

impl<R: Clone + Send + Sync + 'static> VecLoader<R> {
    /// Create a new VecLoader
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows: Arc::new(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R: Clone + Send + Sync + 'static> RangeLoader for VecLoader<R> {
    type Item = R;

    fn load(&self, range: Range<usize>) -> BoxFuture<'static, Result<Vec<R>>> {
        let result = match self.rows.get(range.clone()) {
            Some(rows) => Ok(rows.to_vec()),
            None => Err(Error::Load {
                start: range.start,
                end: range.end,
                message: format!("only {} rows available", self.rows.len()),
            }),
        };
        ready(result).boxed()
    }
}

/// Loader backed by an async closure
pub struct FnLoader<F> {
    f: F,
}

impl<F> FnLoader<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut, T> RangeLoader for FnLoader<F>
where
    F: Fn(Range<usize>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn load(&self, range: Range<usize>) -> BoxFuture<'static, Result<Vec<T>>> {
        (self.f)(range).boxed()
    }
}

/// Produces week cells for a life span, with status and age as of `today`
#[derive(Debug, Clone, Copy)]
pub struct LifeWeeksLoader {
    span: LifeSpan,
    today: NaiveDate,
}

impl LifeWeeksLoader {
    pub fn new(span: LifeSpan, today: NaiveDate) -> Self {
        Self { span, today }
    }

    /// Total number of cells, the grid's `total_items`
    pub fn total_items(&self) -> usize {
        self.span.total_weeks()
    }
}

impl RangeLoader for LifeWeeksLoader {
    type Item = WeekCell;

    fn load(&self, range: Range<usize>) -> BoxFuture<'static, Result<Vec<WeekCell>>> {
        let total = self.total_items();
        let result = if range.end > total {
            Err(Error::Load {
                start: range.start,
                end: range.end,
                message: format!("grid only has {total} weeks"),
            })
        } else {
            range.map(|i| self.span.week(i, self.today)).collect()
        };
        ready(result).boxed()
    }
}
