use std::io::{self, BufRead, Write};

use cnpj_config::shared::{PolicyChoice, PolicyConfig};
use cnpj_etl::loader::ResolvedPolicy;
use tracing::info;

const RECREATE_QUESTION: &str =
    "Drop and recreate tables whose columns differ from the configuration?";
const TRUNCATE_QUESTION: &str = "Remove the rows of tables that already hold data before loading?";

/// Resolves `ask` answers by prompting on the terminal.
pub fn resolve_policy(config: &PolicyConfig) -> io::Result<ResolvedPolicy> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stderr();

    resolve_policy_with(config, &mut input, &mut output)
}

pub fn resolve_policy_with<R: BufRead, W: Write>(
    config: &PolicyConfig,
    input: &mut R,
    output: &mut W,
) -> io::Result<ResolvedPolicy> {
    let policy = ResolvedPolicy {
        recreate_on_mismatch: resolve_choice(config.recreate, RECREATE_QUESTION, input, output)?,
        truncate_existing: resolve_choice(config.truncate, TRUNCATE_QUESTION, input, output)?,
    };
    info!(
        recreate = policy.recreate_on_mismatch,
        truncate = policy.truncate_existing,
        "resolved destructive operation policy"
    );

    Ok(policy)
}

/// Asks until the answer is understood. An empty answer or a closed input means no.
fn resolve_choice<R: BufRead, W: Write>(
    choice: PolicyChoice,
    question: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    match choice {
        PolicyChoice::Yes => return Ok(true),
        PolicyChoice::No => return Ok(false),
        PolicyChoice::Ask => {}
    }

    loop {
        write!(output, "{question} [y/N]: ")?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }

        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" | "s" | "sim" => return Ok(true),
            "" | "n" | "no" | "nao" | "não" => return Ok(false),
            other => writeln!(output, "unrecognized answer `{other}`, please type y or n")?,
        }
    }
}
