use std::path::PathBuf;

use alloy_primitives::Address;
use calltrace_tracer::contracts::ContractRegistry;
use clap::{Parser, Subcommand};
use eyre::Result;
use yansi::Paint;

use crate::opts::RegistryOpts;

/// CLI arguments for `calltrace contract`.
#[derive(Clone, Debug, Parser)]
pub struct ContractArgs {
    #[command(subcommand)]
    pub cmd: ContractSubcommand,

    #[command(flatten)]
    pub registry: RegistryOpts,
}

#[derive(Clone, Debug, Subcommand)]
pub enum ContractSubcommand {
    /// Register a contract library under its address.
    Add { address: Address, library_path: PathBuf },

    /// Request a breakpoint on a function of a registered contract.
    Breakpoint { address: Address, function: String },

    /// List the registered contracts.
    #[command(visible_alias = "ls")]
    List,

    /// Show the cross-contract call stack.
    Stack,

    /// Switch to a registered contract, or show the current one when omitted.
    Context { address: Option<Address> },

    /// Enter a contract call.
    Push { address: Address },

    /// Leave the innermost contract call.
    Pop,

    /// Replace the call stack, e.g. "main -> 0xaa.. -> 0xbb..".
    UpdateStack { description: String },
}

impl ContractArgs {
    pub fn run(self) -> Result<()> {
        let path = self.registry.registry_file()?;
        let mut registry = ContractRegistry::load(&path)?;
        trace!(?path, contracts = registry.len(), "loaded contract registry");

        let modified = apply(&mut registry, self.cmd)?;
        if modified {
            registry.save(&path)?;
        }
        Ok(())
    }
}

/// Run one subcommand against the registry. Returns whether the registry changed.
fn apply(registry: &mut ContractRegistry, cmd: ContractSubcommand) -> Result<bool> {
    match cmd {
        ContractSubcommand::Add { address, library_path } => {
            let info = registry.add(address, library_path);
            println!(
                "Added contract {} with library {}",
                address.cyan(),
                info.library_path.display()
            );
            Ok(true)
        }
        ContractSubcommand::Breakpoint { address, function } => {
            let info = registry.breakpoint(address, &function)?;
            println!(
                "Set breakpoint on {} in contract {} ({} breakpoints)",
                function.green(),
                address.cyan(),
                info.breakpoints.len()
            );
            Ok(true)
        }
        ContractSubcommand::List => {
            if registry.is_empty() {
                println!("No contracts registered");
            } else {
                println!("Registered contracts:");
                for info in registry.list() {
                    println!(
                        "  {} -> {} ({} breakpoints)",
                        info.address.cyan(),
                        info.library_path.display(),
                        info.breakpoints.len()
                    );
                }
            }
            Ok(false)
        }
        ContractSubcommand::Stack => {
            println!("Call stack: {}", registry.stack());
            if let Some(current) = registry.current_context() {
                println!("Current context: {current}");
            }
            Ok(false)
        }
        ContractSubcommand::Context { address: None } => {
            match registry.current_context() {
                Some(current) => println!("Current context: {current}"),
                None => println!("Current context: [main]"),
            }
            Ok(false)
        }
        ContractSubcommand::Context { address: Some(address) } => {
            let info = registry.set_context(address)?;
            println!("Switched context to contract {}", address.cyan());
            println!("Module: {}", info.library_path.display());
            Ok(true)
        }
        ContractSubcommand::Push { address } => {
            registry.push_context(address);
            println!("Call stack: {}", registry.stack());
            Ok(true)
        }
        ContractSubcommand::Pop => {
            registry.pop_context();
            println!("Call stack: {}", registry.stack());
            Ok(true)
        }
        ContractSubcommand::UpdateStack { description } => {
            registry.update_stack(&description)?;
            println!("Call stack: {}", registry.stack());
            Ok(true)
        }
    }
}
