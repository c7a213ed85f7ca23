pub mod order_writer;
pub mod scenario_reader;
