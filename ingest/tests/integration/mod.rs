mod information_test;
mod postgres_store_test;
