use crate::Component;

/// A [`Component`] whose output is the time derivative of `N` state values.
///
/// Solvers only see flat arrays. This trait is the bridge: it reads the
/// starting point out of a component input, rebuilds an input for every point
/// the solver wants to evaluate, and flattens the component output back into
/// a derivative array.
pub trait Integratable<const N: usize>: Component {
    /// Builds the input for evaluating the component at `state`.
    ///
    /// `initial_conditions` is the input the integration started from, so
    /// anything the solver doesn't track can be carried over from it. Solvers
    /// call this for every derivative evaluation, not just at reported steps.
    fn apply_state(initial_conditions: &Self::Input, state: State<N>) -> Self::Input;

    /// Reads the starting point of an integration from an input.
    fn extract_state(input: &Self::Input) -> State<N>;

    /// Flattens an output into `dy/dx`, in the same order as [`State::y`].
    fn extract_derivative(output: &Self::Output) -> [f64; N];
}

/// A point of an ODE solution: the independent variable and `N` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State<const N: usize> {
    pub x: f64,
    pub y: [f64; N],
}

impl<const N: usize> State<N> {
    /// Returns `true` if `x` and every value in `y` are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.iter().all(|v| v.is_finite())
    }
}
