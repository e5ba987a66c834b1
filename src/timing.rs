//! Wall clock measurement of solver calls.

use std::time::{Duration, Instant};

/// Call `f(input)` and measure how long it took.
///
/// Only the call itself is measured. Errors and panics of `f` go through untouched.
pub fn time_call<I, R>(input: I, f: impl FnOnce(I) -> R) -> (R, Duration) {
    let start = Instant::now();
    let result = f(input);
    (result, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_the_call() {
        let (value, elapsed) = time_call(20, |ms| {
            std::thread::sleep(Duration::from_millis(ms));
            ms * 2
        });
        assert_eq!(value, 40);
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn errors_are_returned_as_is() {
        let (result, _) = time_call((), |_| -> Result<(), &str> { Err("boom") });
        assert_eq!(result, Err("boom"));
    }
}
