use super::CaseSelection;
use anyhow::Result;
use clap::Args;
use console::style;
use qconv_crossval::ParameterSpace;

/// Print the case ids a selection expands to
#[derive(Args, Debug, Clone, Default)]
pub struct ListCommand {
    #[command(flatten)]
    pub selection: CaseSelection,

    /// Emit a JSON array instead of one id per line
    #[arg(long)]
    pub json: bool,
}

impl ListCommand {
    /// Selected case ids, rank by rank.
    pub fn case_ids(&self) -> Vec<String> {
        let filter = self.selection.filter();
        self.selection
            .ranks()
            .into_iter()
            .flat_map(|rank| ParameterSpace::for_rank(rank).filtered(&filter))
            .map(|case| case.id())
            .collect()
    }

    pub fn execute(&self) -> Result<()> {
        let ids = self.case_ids();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&ids)?);
            return Ok(());
        }
        for id in &ids {
            println!("{id}");
        }
        eprintln!("{}", style(format!("{} cases", ids.len())).dim());
        Ok(())
    }
}
