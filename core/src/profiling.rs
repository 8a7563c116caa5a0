//! Optional Tracy instrumentation.
//!
//! Enable the `profiling` Cargo feature to route these macros to
//! [Tracy](https://github.com/wolfpld/tracy). Without the feature every macro
//! expands to nothing.
//!
//! ```ignore
//! use uniforge_core::profiling::{profile_function, profile_scope};
//!
//! fn upload_all() {
//!     profile_function!();
//!
//!     {
//!         profile_scope!("merge_dirty_regions");
//!         // ...
//!     }
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, plot as tracy_plot, span};

/// Open a span that lasts until the end of the enclosing scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Open a span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Open a span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Function span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Open a span whose name is only known at runtime, such as a shader name.
///
/// Prefer [`profile_scope!`] for static names; this one allocates.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|c| c.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

/// Dynamic span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _ = $name;
    };
}

/// Plot a numeric value over time, e.g. bytes uploaded per frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

pub use profile_function;
pub use profile_plot;
pub use profile_scope;
pub use profile_scope_dynamic;

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        profile_scope!("test_scope");
        profile_scope_dynamic!("dynamic_scope");
        profile_function!();
        profile_plot!("test_value", 42.0);
    }
}
