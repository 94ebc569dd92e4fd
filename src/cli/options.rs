use colored::Colorize;
use comfy_table::Table;

use crate::cli::Source;
use crate::error::Result;
use crate::filter::{brand_subset, distinct_brands, services_for_carriers, BrandFilter, FilterOptions};
use crate::fmt::number;

pub fn run(source: &Source, brand: Option<&str>) -> Result<()> {
    let table = source.load()?;
    let brand = brand.map(BrandFilter::from_label).unwrap_or_default();
    let subset = brand_subset(&table.records, &brand);
    let options = FilterOptions::from_records(&subset);

    if matches!(brand, BrandFilter::All) {
        println!("{}", "Brands".bold());
        for b in distinct_brands(&table.records) {
            println!("  {b}");
        }
        println!();
    }

    if subset.is_empty() {
        println!("{}", format!("No transactions for {brand}.").yellow());
        return Ok(());
    }

    let mut out = Table::new();
    out.set_header(vec!["Carrier", "Services", "Rows"]);
    for carrier in &options.carriers {
        let services = services_for_carriers(&subset, std::slice::from_ref(carrier));
        let rows = subset.iter().filter(|r| &r.carrier == carrier).count();
        out.add_row(vec![carrier.clone(), services.join(", "), number(rows)]);
    }
    println!("{} ({})", "Carriers".bold(), brand);
    println!("{out}");
    Ok(())
}
