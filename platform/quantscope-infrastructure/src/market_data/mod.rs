pub mod csv_prices;
