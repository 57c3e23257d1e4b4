/// The core trait for defining components in virodyn.
///
/// A `Component` takes an input and produces an output. Components should be
/// deterministic, always producing the same result for a given input, since
/// solvers call them many times per unit of simulated time and rely on
/// repeated calls agreeing.
///
/// ## Implementing `Component`
///
/// Implement the [`call()`] method, which takes an input and returns either an
/// output or an error. Each component defines its own `Error` type, allowing it
/// to decide what constitutes a failure within its domain.
///
/// [`call()`]: Component::call
pub trait Component {
    type Input;
    type Output;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Calls the component with the given input and returns a result.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the component cannot produce an output for
    /// this input.
    fn call(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;
}
