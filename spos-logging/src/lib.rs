// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Structured trace events: `spos_trace!("consensus.worker.message", {"round": 3})`

#[doc(hidden)]
pub use serde_json as __serde_json;
#[doc(hidden)]
pub use tracing as __tracing;

#[macro_export]
macro_rules! spos_trace {
    ($evt:expr, $params:tt) => {
        $crate::__tracing::trace!(
            "spos_trace:{}:{}",
            $evt,
            $crate::__serde_json::json!($params)
        );
    };
}
