use anyhow::Result;
use dkanapi::{Client, SearchQuery, SortDirection};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Point it at a portal via DKANAPI_URL or a `.dkanapirc` file.
    let client = Client::from_env()?;

    let resource_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "d6d3e5ed-2a1b-4d7c-9fc3-5b2f4c1a7e90".to_string());

    let query = SearchQuery::new(resource_id)
        .filter_fields(["state", "year"])
        .filter_values([vec!["AK", "AL"], vec!["2020"]])
        .fields(["state", "year", "product_name", "units_reimbursed"])
        .sort("units_reimbursed", SortDirection::Descending)
        .max_records(250);

    let table = client.search(&query)?;
    println!("{} rows", table.len());
    for record in table.into_records().into_iter().take(5) {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
