use serde::Serialize;
use serde_json::Value;
use signalwatch_core::{Account, Candidate, VerificationFlow};

use crate::cli::RegisterArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct RegisterResponseData {
    account_id: i64,
    confirmation_link: String,
    account: Account,
}

pub fn run(args: &RegisterArgs, flow: &VerificationFlow) -> Result<Value, CliError> {
    let registration = flow.register(Candidate {
        name: args.name.clone(),
        email: args.email.clone(),
        phone: args.phone.clone(),
        password_hash: args.password_hash.clone(),
    })?;

    Ok(serde_json::to_value(RegisterResponseData {
        account_id: registration.account.id.get(),
        confirmation_link: registration.confirmation_link.to_string(),
        account: registration.account,
    })?)
}
