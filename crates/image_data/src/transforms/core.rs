use anyhow::{Context, Result};
use std::marker::PhantomData;

/// A single stage of the image pipeline, converting an `I` into an `O`.
///
/// Stages compose with `.then(...)` into one statically typed pipeline, e.g.
/// `Crop -> RandomHorizontalFlip -> ToTensor -> SubtractMean`.
///
/// `then()` requires the output of `self` to be the input of `next`, and both
/// stages to be concrete (`Sized`) types.
pub trait Transform<I, O>: Send + Sync {
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain::new(self, next)
    }
}

/// Two stages run back to back (`A` then `B`), `M` being the value passed between them.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        let mid = self.first.apply(input).with_context(|| {
            format!("Transform stage failed: {}", std::any::type_name::<A>())
        })?;
        self.second.apply(mid).with_context(|| {
            format!("Transform stage failed: {}", std::any::type_name::<B>())
        })
    }
}

/// A stage that is either present or skipped, so optional steps (crop,
/// mirror, resize) keep a single pipeline type.
impl<I, T> Transform<I, I> for Option<T>
where
    T: Transform<I, I>,
    I: Send,
{
    fn apply(&self, input: I) -> Result<I> {
        match self {
            Some(stage) => stage.apply(input),
            None => Ok(input),
        }
    }
}
