use crate::cli::Source;
use crate::error::Result;
use crate::filter::{distinct_brands, FilterOptions};
use crate::fmt::{money, number};

pub fn run(source: &Source) -> Result<()> {
    println!("File:          {}", source.path.display());
    println!("Encoding:      {}", source.load.encoding);
    println!("Timestamp:     {}", source.load.timestamp_column);

    if !source.path.exists() {
        println!();
        println!("File not found. Run `paylens init <path>` or pass --file.");
        return Ok(());
    }

    let table = source.load()?;
    let all = table.all();
    let options = FilterOptions::from_records(&all);

    println!();
    println!("Rows:          {}", number(table.records.len()));
    println!("No timestamp:  {}", number(table.null_timestamps()));
    println!("No amount:     {}", number(table.missing_amounts()));
    match options.date_bounds {
        Some(b) => println!("Dates:         {} to {}", b.min, b.max),
        None => println!("Dates:         (none)"),
    }
    match options.amount_bounds {
        Some(b) => println!("Amounts:       {} to {}", money(b.min), money(b.max)),
        None => println!("Amounts:       (none)"),
    }
    println!("Brands:        {}", distinct_brands(&table.records).len());
    println!("Carriers:      {}", options.carriers.len());

    Ok(())
}
