pub mod period;
pub mod price_bar;
