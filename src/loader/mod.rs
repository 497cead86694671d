mod csv;

pub use csv::CsvTable;
