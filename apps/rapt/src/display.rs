//! Transaction plan rendering

use comfy_table::{presets, Table};
use console::style;
use indicatif::HumanBytes;
use rapt_plan::{Category, TransactionPlan};

fn category_heading(category: Category) -> &'static str {
    match category {
        Category::Extra => "The following extra packages will be installed:",
        Category::Install => "The following NEW packages will be installed:",
        Category::Remove => "The following packages will be REMOVED:",
        Category::Upgrade => "The following packages will be upgraded:",
        Category::Downgrade => "The following packages will be DOWNGRADED:",
        Category::Keep => "The following packages have been kept back:",
        Category::Hold => "The following held packages will be changed:",
        Category::Essential => "WARNING: the following essential packages will be changed:",
    }
}

/// Print the plan summary: per-category package lists, a counters table,
/// and the download/disk totals.
pub fn render_plan(plan: &TransactionPlan) {
    for (category, names) in plan.lists() {
        if names.is_empty() {
            continue;
        }
        let heading = category_heading(category);
        if category == Category::Essential {
            println!("{}", style(heading).red().bold());
        } else {
            println!("{}", style(heading).bold());
        }
        println!("  {}", names.join(" "));
    }

    let c = plan.counters();
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    let mut has_rows = false;
    for (label, count) in [
        ("newly installed", c.install),
        ("upgraded", c.upgrade),
        ("to remove", c.remove),
        ("replaced", c.replace),
        ("reinstalled", c.reinstall),
        ("downgraded", c.downgrade),
    ] {
        if count > 0 {
            table.add_row([count.to_string(), label.to_string()]);
            has_rows = true;
        }
    }
    if has_rows {
        println!("{table}");
    }

    if plan.total_size() > 0 {
        println!(
            "Need to get {} of archives.",
            HumanBytes(plan.total_size())
        );
    }
    if !c.disk_size.is_empty() {
        println!("After this operation: {}.", c.disk_size);
    }
}
