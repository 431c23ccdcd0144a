//! Command handlers grouped by concern.

pub(crate) mod inspect;
pub(crate) mod lifecycle;
pub(crate) mod logs;
