// Content selection: which cards a study run shows, and in what order.
// `content_selector` is pure; `queries` feeds it from Postgres.

pub mod content_selector;
pub mod queries;

pub use content_selector::{ItemKind, SelectedItem};
