use serde_json::Value;
use signalwatch_core::{AccountId, VerificationFlow};

use crate::cli::PollArgs;
use crate::error::CliError;

pub fn run(args: &PollArgs, flow: &VerificationFlow) -> Result<Value, CliError> {
    let account_id = AccountId::new(args.account_id)?;
    let outcome = flow.poll(account_id)?;
    Ok(serde_json::to_value(outcome)?)
}
