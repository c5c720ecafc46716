/// A deferred, possibly failing operation that is consumed when run.
///
/// This is the unit of work accepted by the parallel runner. Any
/// `FnOnce() -> Result<T, E>` closure is a `Computation`.
pub trait Computation {
    /// Value produced on success.
    type Output;
    /// Failure produced by the computation itself.
    type Error;
    /// Run the computation.
    ///
    /// # Errors
    /// Whatever the underlying operation reports.
    fn compute(self) -> Result<Self::Output, Self::Error>;
}

impl<F, T, E> Computation for F
where
    F: FnOnce() -> Result<T, E>,
{
    type Output = T;
    type Error = E;

    #[inline]
    fn compute(self) -> Result<T, E> {
        self()
    }
}

/// A function of one input that may be called through a shared reference,
/// possibly from several threads at once.
///
/// Implemented for every `Fn(In) -> Result<O, E>` closure.
pub trait Func<In> {
    /// Value produced on success.
    type Output;
    /// Failure produced by the function.
    type Error;
    /// Apply the function to `input`.
    ///
    /// # Errors
    /// Whatever the underlying function reports.
    fn apply(&self, input: In) -> Result<Self::Output, Self::Error>;
}

impl<F, In, O, E> Func<In> for F
where
    F: Fn(In) -> Result<O, E>,
{
    type Output = O;
    type Error = E;

    #[inline]
    fn apply(&self, input: In) -> Result<O, E> {
        self(input)
    }
}

/// A function of one input that needs exclusive access to run, i.e. one that
/// is not safe to call concurrently.
///
/// Implemented for every `FnMut(In) -> Result<O, E>` closure. Wrap it in
/// [`Synced`](crate::synced::Synced) to obtain a shareable [`Func`].
pub trait FuncMut<In> {
    /// Value produced on success.
    type Output;
    /// Failure produced by the function.
    type Error;
    /// Apply the function to `input`.
    ///
    /// # Errors
    /// Whatever the underlying function reports.
    fn apply_mut(&mut self, input: In) -> Result<Self::Output, Self::Error>;
}

impl<F, In, O, E> FuncMut<In> for F
where
    F: FnMut(In) -> Result<O, E>,
{
    type Output = O;
    type Error = E;

    #[inline]
    fn apply_mut(&mut self, input: In) -> Result<O, E> {
        self(input)
    }
}
