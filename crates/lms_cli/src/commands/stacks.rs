//! Stacks command - inspect deployed stacks.
//!
//! Lists every stack deployed in the active account/region with status
//! and creation time, then drops into a selection loop for per-stack
//! details. Output values that look like secret references can be
//! dereferenced on request; that is the only place a secret becomes
//! plaintext.

use std::io::{self, Write};

use anyhow::Result;
use aws_sdk_cloudformation::model::Stack;
use clap::Args;
use tracing::debug;

use crate::inspect::{
    format_date, format_time, is_secret_reference, region_and_account, StackInspector,
};

#[derive(Args)]
pub struct StacksArgs {
    /// Region to inspect; defaults to the ambient provider chain
    #[arg(short, long)]
    region: Option<String>,

    /// Never offer to reveal secret values
    #[arg(long)]
    no_reveal: bool,
}

pub async fn execute(args: StacksArgs) -> Result<()> {
    let inspector = StackInspector::new(args.region).await;

    // Authentication or permission failures surface here, verbatim,
    // before any interaction starts.
    let stacks = inspector.list_stacks().await?;
    let alias = inspector.account_alias().await;

    print_banner(&stacks, alias.as_deref());
    for (index, stack) in stacks.iter().enumerate() {
        let status = stack
            .stack_status()
            .map(|s| s.as_str())
            .unwrap_or("UNKNOWN");
        let created = stack
            .creation_time()
            .map(format_date)
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            " {}: {}  status: {}  created: {}",
            index,
            stack_name(stack),
            status,
            created
        );
    }

    loop {
        println!();
        let line = match prompt("Enter a number for details or q to quit: ")? {
            Some(line) => line,
            // EOF quits as cleanly as 'q' does.
            None => return Ok(()),
        };
        let choice = line.trim();
        if choice == "q" {
            return Ok(());
        }

        match choice.parse::<usize>().ok().and_then(|i| stacks.get(i)) {
            Some(stack) => print_stack_details(&inspector, stack, !args.no_reveal).await?,
            None => println!("Try again"),
        }
    }
}

/// One line of operator input; `None` on EOF. Locks stdin per call so
/// nothing non-Send is held across awaits.
fn prompt(message: &str) -> io::Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut buf = String::new();
    if io::stdin().read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim_end().to_string()))
}

fn stack_name(stack: &Stack) -> &str {
    stack.stack_name().unwrap_or("<unnamed>")
}

fn print_banner(stacks: &[Stack], alias: Option<&str>) {
    let located = stacks
        .first()
        .and_then(|s| s.stack_id())
        .and_then(region_and_account);

    println!();
    println!(" *************************************************");
    println!("                 DEPLOYED STACKS");
    if let Some((region, account)) = located {
        println!("                Region: {}", region);
        println!("             AccountID: {}", account);
    }
    if let Some(alias) = alias {
        println!("               Account: {}", alias);
    }
    println!(" *************************************************");
    println!();
}

async fn print_stack_details(
    inspector: &StackInspector,
    stack: &Stack,
    offer_reveal: bool,
) -> Result<()> {
    println!();
    println!("Stack Name: {}", stack_name(stack));
    // Optional fields never abort the listing.
    if let Some(description) = stack.description() {
        println!("Description: {}", description);
    }
    if let Some(updated) = stack.last_updated_time() {
        println!(
            "Updated: {} at: {}",
            format_date(updated),
            format_time(updated)
        );
    }

    println!("Outputs");
    let outputs = stack.outputs().unwrap_or_default();
    if outputs.is_empty() {
        println!(" None");
        return Ok(());
    }
    for output in outputs {
        let key = output.output_key().unwrap_or("<unnamed>");
        let value = output.output_value().unwrap_or("");
        println!(" {}: {}", key, value);

        if offer_reveal && is_secret_reference(value) {
            let answer = match prompt(&format!("   Reveal live value for {}? [y/N] ", key))? {
                Some(answer) => answer,
                None => return Ok(()),
            };
            if answer.trim().eq_ignore_ascii_case("y") {
                match inspector.reveal_secret(value).await {
                    Ok(secret) => println!("   {}: {}", key, secret),
                    Err(e) => {
                        debug!(error = %e, "secret lookup failed");
                        println!("   Could not resolve secret: {}", e);
                    }
                }
            }
        }
    }
    println!();
    Ok(())
}
