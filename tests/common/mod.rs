use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const SCENARIO_HEADER: [&str; 8] = [
    "type", "order", "customer", "phone", "method", "item", "quantity", "price",
];

/// Writes a scenario file with the standard header and the given rows.
pub fn write_scenario(path: &Path, rows: &[[&str; 8]]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(SCENARIO_HEADER)?;
    for row in rows {
        wtr.write_record(row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// A scenario with `orders` single-item orders, none of them confirmed.
pub fn generate_scenario(path: &Path, orders: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(SCENARIO_HEADER)?;
    for i in 1..=orders {
        wtr.write_record([
            "item",
            &format!("O-{i}"),
            &format!("Customer {i}"),
            "255712345678",
            "mobile",
            "Widget",
            "1",
            "1000",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
