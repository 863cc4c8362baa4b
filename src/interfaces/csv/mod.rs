pub mod command_reader;
pub mod directory_loader;
pub mod report_writer;
