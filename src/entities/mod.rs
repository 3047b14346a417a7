pub mod product;
pub mod product_variant;
pub mod sale;
pub mod stock_history;
