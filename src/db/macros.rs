//! Macros for building parameters and dispatching over backends.

/// Build a `Vec<QueryParam>` from values convertible into [`QueryParam`].
///
/// # Example
///
/// ```
/// use dual_pool::{QueryParam, params};
///
/// let p = params![1, "alice", true, None::<i64>];
/// assert_eq!(p[1], QueryParam::String("alice".to_string()));
/// assert_eq!(p[3], QueryParam::Null);
/// ```
///
/// [`QueryParam`]: crate::models::QueryParam
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::models::QueryParam>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::models::QueryParam::from($value)),+]
    };
}

/// Generates match arms over the pool's `Backend` variants.
///
/// ```ignore
/// impl_backend_dispatch!(&self.backend, {
///     Networked(store) => store.close().await,
///     Embedded(store) => store.close().await,
/// });
/// ```
macro_rules! impl_backend_dispatch {
    ($backend:expr, { $($variant:ident($store:ident) => $body:expr),+ $(,)? }) => {
        match $backend {
            $(
                $crate::db::pool::Backend::$variant($store) => $body,
            )+
        }
    };
}

pub(crate) use impl_backend_dispatch;
