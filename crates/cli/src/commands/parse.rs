use clap::Args;
use xforms_xpath::parse_xpath;

use crate::util::CliResult;

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    #[arg(value_name = "XPATH")]
    pub expression: String,
}

pub fn run(args: &ParseArgs) -> CliResult<String> {
    Ok(parse_xpath(&args.expression)?.to_string())
}
