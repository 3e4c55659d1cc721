//! Internal testing utilities for the opschema crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Utility for table-driven tests of schemas and inference functions.
///
/// Each test case is a struct, conventionally named `Case`, which implements
/// `Debug`. A collection of cases is run with [`test_each`](TestCases::test_each),
/// which catches panics from individual cases and reports all failing cases
/// together once every case has run.
///
/// ```
/// use opschema_testing::TestCases;
///
/// # fn test_append_dims() {
/// #[derive(Debug)]
/// struct Case {
///     shape: Vec<usize>,
///     extra: Vec<usize>,
///     expected: Vec<usize>,
/// }
///
/// let cases = [
///     Case { shape: vec![2, 3], extra: vec![5], expected: vec![2, 3, 5] },
///     Case { shape: vec![], extra: vec![], expected: vec![] },
/// ];
///
/// cases.test_each(|case| {
///     let mut out = case.shape.clone();
///     out.extend(&case.extra);
///     assert_eq!(out, case.expected);
/// });
/// # }
/// # test_append_dims();
/// ```
///
/// Cases and the values captured by the test closure must be unwind safe.
/// Schemas and descriptors are plain data, so this normally holds. Values
/// with interior mutability should be created inside the closure, or
/// wrapped in [`AssertUnwindSafe`](std::panic::AssertUnwindSafe).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case, catching any panics.
    ///
    /// Panics after all cases have run if any of them failed.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes an owned
    /// clone of each case to the test function.
    fn test_each_clone(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + Clone + UnwindSafe;
}

/// Panic with a summary of `failures` if it is non-empty.
fn report_failures<T: Debug>(failures: &[T]) {
    assert!(
        failures.is_empty(),
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(&failures);
    }

    fn test_each_clone(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Clone + Debug + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| {
                let value = case.clone();
                std::panic::catch_unwind(move || test(value)).is_err()
            })
            .collect();
        report_failures(&failures);
    }
}
