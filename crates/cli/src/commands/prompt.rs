//! `payassist prompt`: Render the prompt for a question, no LLM call.

use payassist_pipeline::prepare_unenriched;

use super::PromptArgs;

pub fn run(args: PromptArgs) -> anyhow::Result<()> {
    let prepared = prepare_unenriched(&args.to_request()?);
    println!("{}", prepared.render());
    Ok(())
}
