//! Order read models.

pub mod current_orders;
pub mod order_history;

pub use current_orders::CurrentOrdersView;
pub use order_history::OrderHistoryView;
