//! Tables printed after each command.

use comfy_table::Table;
use ectss_deploy::{InitializationReport, NetworkAddressBook};

pub fn address_table(book: &NetworkAddressBook) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Artifact", "Address"]);
    for (name, address) in book.iter() {
        table.add_row(vec![
            name.as_str(),
            address.as_deref().unwrap_or("(not deployed)"),
        ]);
    }
    table
}

pub fn initialization_table(report: &InitializationReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Rule", "Artifact", "Outcome", "Detail"]);
    for rule in &report.rules {
        table.add_row(vec![
            rule.rule_id.clone(),
            rule.artifact.clone(),
            rule.outcome.to_string(),
            rule.outcome.detail().unwrap_or_default().to_string(),
        ]);
    }
    table
}
