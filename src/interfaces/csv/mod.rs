pub mod loan_writer;
pub mod payment_reader;
